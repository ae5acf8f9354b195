// Gate protocol: a partner converts a code into a recorded visit.
//
// Everything issuance checked is checked again here. Minutes have passed
// since the code was issued and the holder's subscription may have lapsed.

use serde::Serialize;

use nomad_core::db::models::{CheckIn, Principal, Role};
use nomad_core::error::{ErrorCode, Result};
use nomad_core::utils::generate_id;

use crate::checkin::code::parse_code;
use crate::context::NomadContext;
use crate::ledger::Ledger;
use crate::profile::ProfileView;
use crate::transaction::{deny, Decision, TransactionScope};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionResult {
    pub check_in: CheckIn,
    pub space_name: String,
    /// The visitor, with quota already counting this visit.
    pub profile: ProfileView,
}

/// Redeem `code` at `space_id` on behalf of `partner`.
///
/// 1. The partner must manage `space_id`
/// 2. The code must belong to a token
/// 3. An expired token is deleted and refused
/// 4. The holder's entitlement is resolved again
/// 5. The plan tier must admit the space tier
/// 6. The quota must still admit today's visit
/// 7. The visit is recorded and the token consumed
pub async fn redeem(ctx: &NomadContext, partner: &Principal, code: &str, space_id: &str) -> Result<RedemptionResult> {
    let Some(code) = parse_code(code) else {
        return Err(ErrorCode::InvalidCode.into());
    };
    let scope = TransactionScope::begin(ctx).await?;
    let outcome = redeem_in(ctx, &scope, partner, &code, space_id).await;
    scope.settle(outcome).await
}

async fn redeem_in(
    ctx: &NomadContext,
    scope: &TransactionScope,
    partner: &Principal,
    code: &str,
    space_id: &str,
) -> Result<Decision<RedemptionResult>> {
    let store = scope.store();

    if partner.role != Role::Partner || partner.managed_space_id.as_deref() != Some(space_id) {
        tracing::warn!(partner_id = %partner.id, space_id, "redemption refused: space not managed by caller");
        return deny(ErrorCode::UnauthorizedSpace);
    }
    let Some(space) = store.find_space(space_id).await? else {
        return deny(ErrorCode::SpaceNotFound);
    };

    let Some(token) = store.find_token_by_code(code).await? else {
        return deny(ErrorCode::CodeNotFound);
    };

    let ledger = Ledger::new(ctx, store);
    if token.is_expired(ledger.now()) {
        store.delete_token(&token.id).await?;
        tracing::info!(principal_id = %token.principal_id, space_id, "redemption refused: code expired");
        return deny(ErrorCode::CodeExpired);
    }

    let Some(holder) = store.find_principal(&token.principal_id).await? else {
        store.delete_token(&token.id).await?;
        return deny(ErrorCode::PrincipalNotFound);
    };
    let Some(entitlement) = ledger.resolve_entitlement(&holder).await? else {
        tracing::info!(principal_id = %holder.id, space_id, "redemption refused: no active subscription");
        return deny(ErrorCode::NoActiveSubscription);
    };

    if !entitlement.plan.access_tier.admits(space.access_tier) {
        tracing::info!(
            principal_id = %holder.id,
            space_id,
            plan_tier = %entitlement.plan.access_tier,
            space_tier = %space.access_tier,
            "redemption refused: tier mismatch"
        );
        return deny(ErrorCode::TierMismatch);
    }

    let usage = ledger.compute_quota_usage(&holder.id, &entitlement).await?;
    if !usage.admits_visit() {
        tracing::info!(principal_id = %holder.id, space_id, "redemption refused: quota exceeded");
        return deny(ErrorCode::QuotaExceeded);
    }

    let check_in = store
        .create_check_in(&CheckIn {
            id: generate_id(),
            principal_id: holder.id.clone(),
            space_id: space.id.clone(),
            timestamp: ledger.now(),
        })
        .await?;
    store.delete_token(&token.id).await?;

    let profile = ProfileView::build(&ledger, &holder).await?;
    tracing::info!(principal_id = %holder.id, space_id, check_in_id = %check_in.id, "check-in recorded");
    Ok(Ok(RedemptionResult { check_in, space_name: space.name, profile }))
}
