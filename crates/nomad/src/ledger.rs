// Entitlement ledger.
//
// Tracks who holds which plan and how much of it they have used. Expiry is
// lazy: a lapsed row is flipped inactive the first time a decision reads it,
// inside the same transaction as that decision.

use std::collections::BTreeSet;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;

use nomad_core::db::models::{
    AccessTier, DaysAllowed, Plan, Principal, Subscription, SubscriptionOwner,
};
use nomad_core::db::schema::tables;
use nomad_core::error::{ApiError, ErrorCode, NomadError, Result};
use nomad_core::options::{CalendarOptions, LedgerOptions};
use nomad_core::utils::generate_id;

use crate::context::NomadContext;
use crate::internal_adapter::InternalAdapter;
use crate::transaction::{deny, Decision, TransactionScope};

/// An active subscription together with its plan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    pub subscription: Subscription,
    pub plan: Plan,
    /// Held through the principal's team rather than personally.
    pub via_team: bool,
}

/// Consumption of the current cycle, measured in distinct calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaUsage {
    pub distinct_days_used: u32,
    pub days_allowed: DaysAllowed,
    pub used_today: bool,
}

impl QuotaUsage {
    /// Re-entry on an already counted day is always allowed; a new day needs room.
    pub fn admits_visit(&self) -> bool {
        self.used_today || !self.days_allowed.exhausted_by(self.distinct_days_used)
    }

    /// Days used once today's visit is counted.
    pub fn days_used_after_visit(&self) -> u32 {
        if self.used_today {
            self.distinct_days_used
        } else {
            self.distinct_days_used + 1
        }
    }

    pub fn days_remaining(&self) -> Option<u32> {
        self.days_allowed.remaining(self.distinct_days_used)
    }
}

/// Ledger reads and writes against one storage handle at one instant.
pub struct Ledger<'a> {
    store: InternalAdapter<'a>,
    calendar: &'a CalendarOptions,
    options: &'a LedgerOptions,
    now: DateTime<Utc>,
}

impl<'a> Ledger<'a> {
    pub fn new(ctx: &'a NomadContext, store: InternalAdapter<'a>) -> Self {
        Self {
            store,
            calendar: &ctx.options.calendar,
            options: &ctx.options.ledger,
            now: ctx.now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn today(&self) -> NaiveDate {
        self.calendar.date_of(self.now)
    }

    pub fn store(&self) -> InternalAdapter<'a> {
        self.store
    }

    /// The single live active entry for `owner`.
    ///
    /// Lapsed rows are flipped inactive on the way. If integrity has slipped
    /// and several live rows are flagged active, the newest wins and the
    /// others are deactivated.
    pub async fn get_active_subscription(&self, owner: &SubscriptionOwner) -> Result<Option<Subscription>> {
        let today = self.today();
        let mut live: Option<Subscription> = None;
        for subscription in self.store.active_subscriptions(owner).await? {
            if subscription.has_lapsed(today) {
                self.store.deactivate_subscription(&subscription.id).await?;
                tracing::info!(
                    subscription_id = %subscription.id,
                    owner = owner.id(),
                    end_date = ?subscription.end_date,
                    "subscription lapsed, deactivated"
                );
                continue;
            }
            if let Some(older) = live.replace(subscription) {
                tracing::warn!(subscription_id = %older.id, owner = owner.id(), "duplicate active subscription, deactivating");
                self.store.deactivate_subscription(&older.id).await?;
            }
        }
        Ok(live)
    }

    /// The principal's own active subscription, else their team's.
    pub async fn resolve_entitlement(&self, principal: &Principal) -> Result<Option<Entitlement>> {
        let own = SubscriptionOwner::Principal(principal.id.clone());
        let (subscription, via_team) = match self.get_active_subscription(&own).await? {
            Some(s) => (s, false),
            None => match &principal.team_id {
                Some(team_id) => {
                    match self.get_active_subscription(&SubscriptionOwner::Team(team_id.clone())).await? {
                        Some(s) => (s, true),
                        None => return Ok(None),
                    }
                }
                None => return Ok(None),
            },
        };
        let plan = self.store.find_plan(&subscription.plan_id).await?.ok_or_else(|| {
            NomadError::Database(format!(
                "subscription {} references missing plan {}",
                subscription.id, subscription.plan_id
            ))
        })?;
        Ok(Some(Entitlement { subscription, plan, via_team }))
    }

    /// Distinct calendar days with at least one check-in since the
    /// subscription started. Team members are counted individually.
    pub async fn compute_quota_usage(&self, principal_id: &str, entitlement: &Entitlement) -> Result<QuotaUsage> {
        let start = entitlement.subscription.start_date;
        let since = self.calendar.start_of_day(start);
        let days: BTreeSet<NaiveDate> = self
            .store
            .check_ins_for_principal(principal_id, Some(since))
            .await?
            .iter()
            .map(|c| self.calendar.date_of(c.timestamp))
            .filter(|d| *d >= start)
            .collect();
        Ok(QuotaUsage {
            distinct_days_used: u32::try_from(days.len()).unwrap_or(u32::MAX),
            days_allowed: entitlement.plan.days_allowed(),
            used_today: days.contains(&self.today()),
        })
    }

    /// Deactivate whatever `owner` holds and start a new entry today.
    ///
    /// A payment reference already on the ledger is a `DuplicatePayment`
    /// denial and changes nothing.
    pub async fn activate_subscription(
        &self,
        owner: &SubscriptionOwner,
        plan: &Plan,
        payment_reference: Option<&str>,
    ) -> Result<Decision<Subscription>> {
        if let Some(reference) = payment_reference {
            if self.store.find_subscription_by_reference(reference).await?.is_some() {
                tracing::info!(reference, "payment reference already on the ledger");
                return deny(ErrorCode::DuplicatePayment);
            }
        }
        let replaced = self.store.deactivate_all(owner).await?;

        let start = self.today();
        let end = self
            .options
            .cycle_length_days
            .and_then(|days| start.checked_add_days(Days::new(u64::from(days))));
        let subscription = Subscription::new(
            generate_id(),
            owner,
            plan.id.clone(),
            start,
            end,
            payment_reference.map(str::to_string),
            self.now,
        );
        let created = self.store.create_subscription(&subscription).await?;
        tracing::info!(
            subscription_id = %created.id,
            owner = owner.id(),
            plan = %plan.name,
            replaced,
            "subscription activated"
        );
        Ok(Ok(created))
    }
}

/// Quota as shown to a subscriber.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub plan_name: String,
    pub access_tier: AccessTier,
    pub days_used: u32,
    pub days_allowed: DaysAllowed,
    /// `None` for unlimited plans.
    pub days_remaining: Option<u32>,
    pub used_today: bool,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub via_team: bool,
}

/// Current quota for `principal`, applying lazy expiry first.
pub async fn quota_status(ctx: &NomadContext, principal: &Principal) -> Result<QuotaStatus> {
    let scope = TransactionScope::begin(ctx).await?;
    let outcome = quota_status_in(ctx, &scope, principal).await;
    scope.settle(outcome).await
}

async fn quota_status_in(
    ctx: &NomadContext,
    scope: &TransactionScope,
    principal: &Principal,
) -> Result<Decision<QuotaStatus>> {
    let ledger = Ledger::new(ctx, scope.store());
    let Some(entitlement) = ledger.resolve_entitlement(principal).await? else {
        return deny(ErrorCode::NoActiveSubscription);
    };
    let usage = ledger.compute_quota_usage(&principal.id, &entitlement).await?;
    Ok(Ok(QuotaStatus {
        plan_name: entitlement.plan.name.clone(),
        access_tier: entitlement.plan.access_tier,
        days_used: usage.distinct_days_used,
        days_allowed: usage.days_allowed,
        days_remaining: usage.days_remaining(),
        used_today: usage.used_today,
        start_date: entitlement.subscription.start_date,
        end_date: entitlement.subscription.end_date,
        via_team: entitlement.via_team,
    }))
}

/// Activate `plan_id` for `owner` in its own transaction.
pub async fn activate_subscription(
    ctx: &NomadContext,
    owner: &SubscriptionOwner,
    plan_id: &str,
    payment_reference: Option<&str>,
) -> Result<Subscription> {
    let scope = TransactionScope::begin(ctx).await?;
    let outcome = async {
        let store = scope.store();
        let Some(plan) = store.find_plan(plan_id).await? else {
            return deny(ErrorCode::PlanNotFound);
        };
        Ledger::new(ctx, store).activate_subscription(owner, &plan, payment_reference).await
    }
    .await;
    match scope.settle(outcome).await {
        Err(e) if e.is_unique_violation(tables::SUBSCRIPTION, "paymentReference") => {
            Err(ApiError::new(ErrorCode::DuplicatePayment).into())
        }
        other => other,
    }
}
