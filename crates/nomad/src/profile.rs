// Profile view: the one shape a principal is presented in.

use chrono::NaiveDate;
use serde::Serialize;

use nomad_core::db::models::{AccessTier, Principal, Role};
use nomad_core::error::{ErrorCode, Result};

use crate::context::NomadContext;
use crate::ledger::{Entitlement, Ledger, QuotaUsage};
use crate::transaction::{deny, Decision, TransactionScope};

pub const PROFILE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSummary {
    pub subscription_id: String,
    pub plan_id: String,
    pub plan_name: String,
    pub access_tier: AccessTier,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub via_team: bool,
}

impl SubscriptionSummary {
    pub fn of(entitlement: &Entitlement) -> Self {
        Self {
            subscription_id: entitlement.subscription.id.clone(),
            plan_id: entitlement.plan.id.clone(),
            plan_name: entitlement.plan.name.clone(),
            access_tier: entitlement.plan.access_tier,
            start_date: entitlement.subscription.start_date,
            end_date: entitlement.subscription.end_date,
            via_team: entitlement.via_team,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub version: u32,
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub photo_url: Option<String>,
    pub team_id: Option<String>,
    pub managed_space_id: Option<String>,
    pub subscription: Option<SubscriptionSummary>,
    pub quota: Option<QuotaUsage>,
}

impl ProfileView {
    /// Identity fields only.
    pub fn basic(principal: &Principal) -> Self {
        Self {
            version: PROFILE_VERSION,
            id: principal.id.clone(),
            email: principal.email.clone(),
            display_name: principal.display_name.clone(),
            role: principal.role,
            photo_url: principal.photo_url.clone(),
            team_id: principal.team_id.clone(),
            managed_space_id: principal.managed_space_id.clone(),
            subscription: None,
            quota: None,
        }
    }

    /// Identity plus entitlement, read through `ledger`.
    pub(crate) async fn build(ledger: &Ledger<'_>, principal: &Principal) -> Result<Self> {
        let mut view = Self::basic(principal);
        if !principal.role.can_check_in() {
            return Ok(view);
        }
        if let Some(entitlement) = ledger.resolve_entitlement(principal).await? {
            view.quota = Some(ledger.compute_quota_usage(&principal.id, &entitlement).await?);
            view.subscription = Some(SubscriptionSummary::of(&entitlement));
        }
        Ok(view)
    }
}

pub async fn get_profile(ctx: &NomadContext, principal_id: &str) -> Result<ProfileView> {
    let scope = TransactionScope::begin(ctx).await?;
    let outcome: Result<Decision<ProfileView>> = async {
        let ledger = Ledger::new(ctx, scope.store());
        match ledger.store().find_principal(principal_id).await? {
            Some(principal) => Ok(Ok(ProfileView::build(&ledger, &principal).await?)),
            None => deny(ErrorCode::PrincipalNotFound),
        }
    }
    .await;
    scope.settle(outcome).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_context;
    use nomad_core::db::models::SubscriptionOwner;

    #[tokio::test]
    async fn test_profile_includes_entitlement() {
        let (ctx, env) = test_context().await;
        let fx = env.fixtures();
        fx.plan("p8", "Explorer", 8, AccessTier::Standard).await.unwrap();
        fx.subscriber("u1", "ada@example.com").await.unwrap();
        fx.subscription("s1", SubscriptionOwner::Principal("u1".into()), "p8", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .await
            .unwrap();

        let view = get_profile(&ctx, "u1").await.unwrap();
        assert_eq!(view.version, PROFILE_VERSION);
        assert_eq!(view.subscription.as_ref().unwrap().plan_name, "Explorer");
        assert_eq!(view.quota.unwrap().distinct_days_used, 0);

        let json = serde_json::to_value(get_profile(&ctx, "u1").await.unwrap()).unwrap();
        assert_eq!(json["role"], "subscriber");
        assert_eq!(json["quota"]["daysAllowed"], 8);
    }

    #[tokio::test]
    async fn test_partner_profile_has_no_quota() {
        let (ctx, env) = test_context().await;
        let fx = env.fixtures();
        fx.space("sp", "Hub", AccessTier::Standard).await.unwrap();
        fx.partner("host", "host@hub.ng", "sp").await.unwrap();

        let view = get_profile(&ctx, "host").await.unwrap();
        assert_eq!(view.managed_space_id.as_deref(), Some("sp"));
        assert!(view.subscription.is_none());
        assert!(view.quota.is_none());
    }

    #[tokio::test]
    async fn test_unknown_principal() {
        let (ctx, _env) = test_context().await;
        assert_eq!(get_profile(&ctx, "nobody").await.unwrap_err().code(), ErrorCode::PrincipalNotFound);
    }
}
