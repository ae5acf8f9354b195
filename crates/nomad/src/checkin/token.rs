// Check-in token issuance.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use nomad_core::db::models::{CheckInToken, DaysAllowed};
use nomad_core::error::{ErrorCode, Result};
use nomad_core::utils::generate_id;

use crate::checkin::code::generate_code;
use crate::context::NomadContext;
use crate::ledger::Ledger;
use crate::transaction::{deny, Decision, TransactionScope};

/// A freshly issued code and the quota it was issued against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub plan_name: String,
    /// Includes today's visit.
    pub days_used: u32,
    pub days_total: DaysAllowed,
}

/// Issue a check-in code, superseding any code the principal already holds.
///
/// 1. Resolve the active subscription (own, then team)
/// 2. Compute quota usage
/// 3. Deny a new day once the quota is used up
/// 4. Delete any existing token for the principal
/// 5. Draw a code no live token holds
/// 6. Persist it with the configured lifetime
pub async fn issue_token(ctx: &NomadContext, principal_id: &str) -> Result<IssuedToken> {
    let scope = TransactionScope::begin(ctx).await?;
    let outcome = issue_in(ctx, &scope, principal_id).await;
    scope.settle(outcome).await
}

async fn issue_in(ctx: &NomadContext, scope: &TransactionScope, principal_id: &str) -> Result<Decision<IssuedToken>> {
    let store = scope.store();
    let Some(principal) = store.find_principal(principal_id).await? else {
        return deny(ErrorCode::PrincipalNotFound);
    };
    if !principal.role.can_check_in() {
        return deny(ErrorCode::RoleNotPermitted);
    }
    let ledger = Ledger::new(ctx, store);

    let Some(entitlement) = ledger.resolve_entitlement(&principal).await? else {
        tracing::info!(principal_id, "check-in denied: no active subscription");
        return deny(ErrorCode::NoActiveSubscription);
    };

    let usage = ledger.compute_quota_usage(&principal.id, &entitlement).await?;
    if !usage.admits_visit() {
        tracing::info!(
            principal_id,
            days_used = usage.distinct_days_used,
            days_allowed = %usage.days_allowed,
            "check-in denied: quota exceeded"
        );
        return deny(ErrorCode::QuotaExceeded);
    }

    let superseded = store.delete_tokens_for(&principal.id).await?;

    let now = ledger.now();
    let code = generate_code(store, ctx.codes.as_ref(), now, ctx.options.token.max_generation_attempts).await?;
    let token = store
        .create_token(&CheckInToken {
            id: generate_id(),
            principal_id: principal.id.clone(),
            code,
            created_at: now,
            expires_at: now + Duration::seconds(ctx.options.token.ttl_seconds),
        })
        .await?;

    tracing::info!(principal_id, superseded, expires_at = %token.expires_at, "check-in code issued");
    Ok(Ok(IssuedToken {
        code: token.code,
        expires_at: token.expires_at,
        plan_name: entitlement.plan.name,
        days_used: usage.days_used_after_visit(),
        days_total: usage.days_allowed,
    }))
}

/// Delete every expired token. Redemption already treats them as dead, so
/// this only reclaims storage.
pub async fn sweep_expired_tokens(ctx: &NomadContext) -> Result<i64> {
    let removed = ctx.store().delete_expired_tokens(ctx.now()).await?;
    if removed > 0 {
        tracing::debug!(removed, "expired check-in tokens swept");
    }
    Ok(removed)
}
