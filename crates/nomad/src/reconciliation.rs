// Payment reconciliation: turn a gateway transaction into exactly one
// activated ledger entry.
//
// Verification may be called any number of times for the same reference
// (redirect, webhook, retries). The reference is unique on the ledger and is
// checked before activation, so repeats report the existing entry.

use chrono::NaiveDate;
use serde::Serialize;

use nomad_core::db::models::{Plan, Principal, Subscription, SubscriptionOwner};
use nomad_core::db::schema::tables;
use nomad_core::error::{ApiError, ErrorCode, NomadError, Result};
use nomad_core::notify::{Notification, NotificationKind};
use nomad_paystack::webhook::{is_supported_event, parse_webhook};
use nomad_paystack::{
    is_valid_reference, GatewayTransaction, InitializeTransactionRequest, PaymentGateway, PaystackError,
    PaystackOptions, TransactionMetadata,
};

use crate::context::NomadContext;
use crate::internal_adapter::InternalAdapter;
use crate::ledger::Ledger;
use crate::transaction::{deny, Decision, TransactionScope};

/// Where to send the customer to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInit {
    pub gateway_reference: String,
    pub redirect_target: String,
    pub access_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Activated,
    /// The reference was already on the ledger; nothing changed.
    AlreadyProcessed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub status: VerificationStatus,
    pub subscription_id: String,
    pub plan_name: String,
    pub start_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum WebhookOutcome {
    Ignored { event: String },
    Processed(VerificationResult),
}

pub struct Reconciliation<'a> {
    ctx: &'a NomadContext,
    gateway: &'a dyn PaymentGateway,
    options: &'a PaystackOptions,
}

impl<'a> Reconciliation<'a> {
    pub fn new(ctx: &'a NomadContext) -> Self {
        Self { ctx, gateway: ctx.gateway.as_ref(), options: &ctx.paystack }
    }

    /// Create a gateway transaction for `plan_id`, tagged with the buyer and
    /// plan so verification never depends on gateway-side plan setup.
    pub async fn initialize_payment(&self, principal: &Principal, plan_id: &str) -> Result<PaymentInit> {
        if !principal.role.can_check_in() {
            return Err(ErrorCode::RoleNotPermitted.into());
        }
        let Some(plan) = self.ctx.store().find_plan(plan_id).await? else {
            return Err(ErrorCode::PlanNotFound.into());
        };

        let request = InitializeTransactionRequest {
            email: principal.email.clone(),
            amount: plan.price,
            callback_url: Some(self.options.callback_url.clone()),
            metadata: TransactionMetadata {
                principal_id: Some(principal.id.clone()),
                plan_id: Some(plan.id.clone()),
                principal_email: Some(principal.email.clone()),
                plan_name: Some(plan.name.clone()),
            },
            plan: plan.external_billing_code.clone(),
        };
        let initialized = self.gateway.initialize_transaction(&request).await?;
        tracing::info!(
            principal_id = %principal.id,
            plan = %plan.name,
            reference = %initialized.reference,
            "payment initialized"
        );
        Ok(PaymentInit {
            gateway_reference: initialized.reference,
            redirect_target: initialized.authorization_url,
            access_code: initialized.access_code,
        })
    }

    /// Verify `reference` with the gateway and activate the plan it paid for.
    ///
    /// 1. Query the gateway (outside any transaction)
    /// 2. Require a successful payment
    /// 3. Resolve the plan: metadata `plan_id`, then the gateway plan code
    /// 4. Resolve the payer by the gateway-reported email
    /// 5. Report an already-recorded reference as processed
    /// 6. Activate through the ledger
    pub async fn verify_payment(&self, reference: &str) -> Result<VerificationResult> {
        let reference = reference.trim();
        if !is_valid_reference(reference) {
            return Err(ErrorCode::InvalidReference.into());
        }

        let transaction = self.gateway.get_transaction(reference).await?;
        if !transaction.status.is_success() {
            tracing::warn!(reference, status = ?transaction.status, "payment not successful");
            return Err(ApiError::with_message(
                ErrorCode::PaymentNotSuccessful,
                format!("Payment status: {:?}", transaction.status),
            )
            .into());
        }

        let mut scope = TransactionScope::begin(self.ctx).await?;
        let outcome = self.reconcile(&mut scope, &transaction).await;
        match scope.settle(outcome).await {
            // A concurrent verification won the insert.
            Err(e) if e.is_unique_violation(tables::SUBSCRIPTION, "paymentReference") => {
                self.already_processed(reference).await
            }
            other => other,
        }
    }

    async fn reconcile(
        &self,
        scope: &mut TransactionScope,
        transaction: &GatewayTransaction,
    ) -> Result<Decision<VerificationResult>> {
        let store = scope.store();
        let Some(plan) = resolve_plan(store, transaction).await? else {
            tracing::warn!(reference = %transaction.reference, "no catalog plan matches transaction");
            return deny(ErrorCode::PlanUnresolvable);
        };
        let Some(principal) = store.find_principal_by_email(&transaction.customer_email).await? else {
            tracing::warn!(reference = %transaction.reference, "payer email matches no principal");
            return deny(ErrorCode::PrincipalNotFound);
        };

        if let Some(existing) = store.find_subscription_by_reference(&transaction.reference).await? {
            tracing::info!(reference = %transaction.reference, "payment already reconciled");
            let plan_name = match store.find_plan(&existing.plan_id).await? {
                Some(p) => p.name,
                None => plan.name,
            };
            return Ok(Ok(summarize(existing, plan_name, VerificationStatus::AlreadyProcessed)));
        }

        let owner = SubscriptionOwner::Principal(principal.id.clone());
        let activated = match Ledger::new(self.ctx, store)
            .activate_subscription(&owner, &plan, Some(&transaction.reference))
            .await?
        {
            Ok(subscription) => subscription,
            Err(denial) => return Ok(Err(denial)),
        };

        scope.notify_after_commit(Notification::new(
            NotificationKind::PaymentConfirmed,
            principal.email.clone(),
            format!("{}: your {} plan is active", self.ctx.options.app_name, plan.name),
            format!(
                "We received your payment (reference {}). Your {} plan is active from {}.",
                transaction.reference, plan.name, activated.start_date
            ),
        ));
        Ok(Ok(summarize(activated, plan.name, VerificationStatus::Activated)))
    }

    async fn already_processed(&self, reference: &str) -> Result<VerificationResult> {
        let store = self.ctx.store();
        let Some(existing) = store.find_subscription_by_reference(reference).await? else {
            return Err(NomadError::Database(format!("reference {reference} collided but is not on the ledger")));
        };
        let plan_name = store.find_plan(&existing.plan_id).await?.map(|p| p.name).unwrap_or_default();
        Ok(summarize(existing, plan_name, VerificationStatus::AlreadyProcessed))
    }

    /// Verify a webhook delivery and reconcile `charge.success` events.
    pub async fn handle_webhook(&self, body: &[u8], signature: &str) -> Result<WebhookOutcome> {
        let event = parse_webhook(body, signature, &self.options.secret_key).map_err(|e| match e {
            PaystackError::Parse(detail) => {
                NomadError::Api(ApiError::with_message(ErrorCode::InvalidInput, format!("Malformed webhook: {detail}")))
            }
            other => other.into(),
        })?;
        if !is_supported_event(&event.event) {
            tracing::debug!(event = %event.event, "webhook event ignored");
            return Ok(WebhookOutcome::Ignored { event: event.event });
        }
        let Some(reference) = event.reference() else {
            return Err(ApiError::with_message(ErrorCode::InvalidReference, "Webhook carries no reference").into());
        };
        self.verify_payment(reference).await.map(WebhookOutcome::Processed)
    }
}

async fn resolve_plan(store: InternalAdapter<'_>, transaction: &GatewayTransaction) -> Result<Option<Plan>> {
    if let Some(plan_id) = transaction.metadata.plan_id.as_deref() {
        if let Some(plan) = store.find_plan(plan_id).await? {
            return Ok(Some(plan));
        }
        tracing::warn!(plan_id, "metadata plan not in catalog, trying gateway plan code");
    }
    match transaction.plan_code.as_deref() {
        Some(code) => store.find_plan_by_billing_code(code).await,
        None => Ok(None),
    }
}

fn summarize(subscription: Subscription, plan_name: String, status: VerificationStatus) -> VerificationResult {
    VerificationResult {
        status,
        subscription_id: subscription.id,
        plan_name,
        start_date: subscription.start_date,
    }
}
