// Principal provisioning.
//
// Creating a partner and the space they manage is an explicit, idempotent
// call. Running it twice for the same applicant returns what the first run
// created.

use serde::{Deserialize, Serialize};
use serde_json::json;

use nomad_core::db::models::{AccessTier, PartnerSpace, Principal, Role};
use nomad_core::error::{ApiError, ErrorCode, Result};
use nomad_core::notify::{Notification, NotificationKind};
use nomad_core::utils::{generate_id, is_valid_email, normalize_email};

use crate::context::NomadContext;
use crate::internal_adapter::InternalAdapter;
use crate::transaction::{deny, Decision, TransactionScope};

const DEFAULT_PAYOUT_PER_CHECKIN: i64 = 150_000;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerApplication {
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub space_name: String,
    pub address: String,
    pub access_tier: AccessTier,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub payout_per_checkin: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedPartner {
    pub principal: Principal,
    pub space: PartnerSpace,
    /// False when both already existed.
    pub created: bool,
}

pub(crate) fn new_principal(email: &str, display_name: Option<String>, role: Role, ctx: &NomadContext) -> Principal {
    Principal {
        id: generate_id(),
        email: normalize_email(email),
        display_name: display_name.filter(|n| !n.trim().is_empty()),
        photo_url: None,
        role,
        managed_space_id: None,
        team_id: None,
        created_at: ctx.now(),
    }
}

pub(crate) fn validate_email(email: &str) -> std::result::Result<String, ApiError> {
    let email = normalize_email(email);
    if is_valid_email(&email) {
        Ok(email)
    } else {
        Err(ApiError::new(ErrorCode::InvalidEmail))
    }
}

/// Create the partner principal and their space, then link them.
pub async fn provision_partner(ctx: &NomadContext, application: PartnerApplication) -> Result<ProvisionedPartner> {
    let email = validate_email(&application.email)?;
    if application.space_name.trim().is_empty() || application.address.trim().is_empty() {
        return Err(ApiError::with_message(ErrorCode::InvalidInput, "Space name and address are required").into());
    }
    let mut scope = TransactionScope::begin(ctx).await?;
    let outcome = provision_partner_in(ctx, &mut scope, &email, application).await;
    scope.settle(outcome).await
}

async fn provision_partner_in(
    ctx: &NomadContext,
    scope: &mut TransactionScope,
    email: &str,
    application: PartnerApplication,
) -> Result<Decision<ProvisionedPartner>> {
    let store = scope.store();

    let existing = match store.find_principal_by_email(email).await? {
        Some(existing) if existing.role != Role::Partner => return deny(ErrorCode::PrincipalAlreadyExists),
        Some(existing) => {
            if let Some(space) = managed_space(store, &existing).await? {
                tracing::debug!(principal_id = %existing.id, "partner already provisioned");
                return Ok(Ok(ProvisionedPartner { principal: existing, space, created: false }));
            }
            Some(existing)
        }
        None => None,
    };

    // Refuse a taken name before any write.
    let space_name = application.space_name.trim();
    let found = store.find_space_by_name(space_name).await?;
    if let Some(owner) = found.as_ref().and_then(|space| space.owner_id.as_deref()) {
        if existing.as_ref().map_or(true, |principal| principal.id != owner) {
            return deny(ErrorCode::SpaceNameTaken);
        }
    }

    let mut principal = match existing {
        Some(existing) => existing,
        None => {
            let principal = new_principal(email, application.display_name.clone(), Role::Partner, ctx);
            store.create_principal(&principal).await?
        }
    };
    let space = match found {
        Some(space) => space,
        None => {
            store
                .create_space(&PartnerSpace {
                    id: generate_id(),
                    name: space_name.to_string(),
                    address: application.address.trim().to_string(),
                    access_tier: application.access_tier,
                    amenities: application.amenities.clone(),
                    payout_per_checkin: application.payout_per_checkin.unwrap_or(DEFAULT_PAYOUT_PER_CHECKIN),
                    owner_id: None,
                    created_at: ctx.now(),
                })
                .await?
        }
    };

    let owned = store.set_space_owner(&space.id, &principal.id).await?;
    let space = owned.unwrap_or(space);
    if let Some(updated) = store
        .update_principal(&principal.id, json!({ "managedSpaceId": space.id }))
        .await?
    {
        principal = updated;
    }
    tracing::info!(principal_id = %principal.id, space_id = %space.id, "partner provisioned");

    let app_name = &ctx.options.app_name;
    scope.notify_after_commit(Notification::new(
        NotificationKind::PartnerApplicationReceived,
        principal.email.clone(),
        format!("{app_name}: your partner application was received"),
        format!("{} is now listed on {app_name}. You can validate member codes from your partner dashboard.", space.name),
    ));
    if let Some(admin) = ctx.options.admin_email.as_deref() {
        scope.notify_after_commit(Notification::new(
            NotificationKind::PartnerApplicationAdminNotice,
            admin,
            format!("{app_name}: new partner space {}", space.name),
            format!("{} ({}) registered {} at {}.", principal.email, principal.id, space.name, space.address),
        ));
    }
    Ok(Ok(ProvisionedPartner { principal, space, created: true }))
}

async fn managed_space(store: InternalAdapter<'_>, principal: &Principal) -> Result<Option<PartnerSpace>> {
    match principal.managed_space_id.as_deref() {
        Some(id) => store.find_space(id).await,
        None => Ok(None),
    }
}

/// Find or create a subscriber by email.
pub async fn provision_subscriber(ctx: &NomadContext, email: &str, display_name: Option<String>) -> Result<Principal> {
    let email = validate_email(email)?;
    let store = ctx.store();
    if let Some(existing) = store.find_principal_by_email(&email).await? {
        return Ok(existing);
    }
    let principal = new_principal(&email, display_name, Role::Subscriber, ctx);
    match store.create_principal(&principal).await {
        Ok(created) => {
            tracing::info!(principal_id = %created.id, "subscriber provisioned");
            Ok(created)
        }
        // Lost a race with a concurrent sign-up for the same address.
        Err(e) if e.is_unique_violation(nomad_core::db::schema::tables::PRINCIPAL, "email") => store
            .find_principal_by_email(&email)
            .await?
            .ok_or_else(|| ErrorCode::PrincipalNotFound.into()),
        Err(e) => Err(e),
    }
}

pub async fn list_spaces(ctx: &NomadContext) -> Result<Vec<PartnerSpace>> {
    ctx.store().list_spaces().await
}
