// Plan catalog.

use serde::{Deserialize, Serialize};

use nomad_core::db::models::{AccessTier, Plan};
use nomad_core::db::schema::tables;
use nomad_core::error::{ApiError, ErrorCode, Result};
use nomad_core::utils::generate_id;

use crate::context::NomadContext;
use crate::transaction::{Decision, TransactionScope};

/// Administrative plan definition.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlan {
    pub name: String,
    /// Minor units.
    pub price: i64,
    pub included_days: u32,
    #[serde(default)]
    pub unlimited: bool,
    pub access_tier: AccessTier,
    #[serde(default)]
    pub external_billing_code: Option<String>,
}

impl NewPlan {
    fn validate(&self) -> std::result::Result<(), ApiError> {
        let invalid = |msg: &str| Err(ApiError::with_message(ErrorCode::InvalidPlan, msg));
        if self.name.trim().is_empty() {
            return invalid("Plan name is required");
        }
        if self.price < 0 {
            return invalid("Plan price cannot be negative");
        }
        if self.included_days < 1 {
            return invalid("Plan must include at least one day");
        }
        Ok(())
    }
}

/// Cheapest first.
pub async fn list_plans(ctx: &NomadContext) -> Result<Vec<Plan>> {
    ctx.store().list_plans().await
}

pub async fn get_plan(ctx: &NomadContext, id: &str) -> Result<Plan> {
    ctx.store().find_plan(id).await?.ok_or_else(|| ErrorCode::PlanNotFound.into())
}

pub async fn find_by_billing_code(ctx: &NomadContext, code: &str) -> Result<Option<Plan>> {
    ctx.store().find_plan_by_billing_code(code).await
}

pub async fn create_plan(ctx: &NomadContext, new_plan: NewPlan) -> Result<Plan> {
    new_plan.validate()?;
    let store = ctx.store();
    let name = new_plan.name.trim().to_string();
    if store.find_plan_by_name(&name).await?.is_some() {
        return Err(ErrorCode::PlanNameTaken.into());
    }
    let plan = Plan {
        id: generate_id(),
        name,
        price: new_plan.price,
        included_days: new_plan.included_days,
        unlimited: new_plan.unlimited,
        access_tier: new_plan.access_tier,
        external_billing_code: new_plan.external_billing_code.filter(|c| !c.trim().is_empty()),
        created_at: ctx.now(),
    };
    match store.create_plan(&plan).await {
        Err(e) if e.is_unique_violation(tables::PLAN, "name") => Err(ErrorCode::PlanNameTaken.into()),
        Ok(created) => {
            tracing::info!(plan_id = %created.id, name = %created.name, "plan created");
            Ok(created)
        }
        Err(e) => Err(e),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingCodeSync {
    pub updated: Vec<String>,
    /// Plan names with no catalog entry.
    pub missing: Vec<String>,
}

/// Re-link catalog plans to the gateway's plan codes, by plan name.
///
/// The whole batch is rejected, and nothing is written, if any code is blank.
pub async fn sync_billing_codes(ctx: &NomadContext, codes: &[(String, String)]) -> Result<BillingCodeSync> {
    if let Some((name, _)) = codes.iter().find(|(_, code)| code.trim().is_empty()) {
        return Err(ApiError::with_message(ErrorCode::InvalidInput, format!("Blank billing code for plan {name}")).into());
    }
    let scope = TransactionScope::begin(ctx).await?;
    let outcome: Result<Decision<BillingCodeSync>> = async {
        let store = scope.store();
        let mut report = BillingCodeSync::default();
        for (name, code) in codes {
            match store.find_plan_by_name(name.trim()).await? {
                Some(plan) => {
                    store.set_plan_billing_code(&plan.id, code.trim()).await?;
                    report.updated.push(plan.name);
                }
                None => report.missing.push(name.clone()),
            }
        }
        Ok(Ok(report))
    }
    .await;
    let report = scope.settle(outcome).await?;
    tracing::info!(updated = report.updated.len(), missing = report.missing.len(), "billing codes synced");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_context;
    use nomad_core::db::models::DaysAllowed;

    fn new_plan(name: &str, price: i64, days: u32) -> NewPlan {
        NewPlan {
            name: name.into(),
            price,
            included_days: days,
            unlimited: false,
            access_tier: AccessTier::Standard,
            external_billing_code: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_list_by_price() {
        let (ctx, _env) = test_context().await;
        create_plan(&ctx, new_plan("Pro", 5_000_000, 16)).await.unwrap();
        create_plan(&ctx, new_plan("Starter", 1_500_000, 4)).await.unwrap();
        let names: Vec<_> = list_plans(&ctx).await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Starter", "Pro"]);
    }

    #[tokio::test]
    async fn test_unlimited_is_explicit() {
        let (ctx, _env) = test_context().await;
        let big = create_plan(&ctx, new_plan("Thirty", 9_000_000, 30)).await.unwrap();
        assert_eq!(big.days_allowed(), DaysAllowed::Limited(30));

        let mut unlimited = new_plan("Infinite", 9_900_000, 1);
        unlimited.unlimited = true;
        let plan = create_plan(&ctx, unlimited).await.unwrap();
        assert_eq!(plan.days_allowed(), DaysAllowed::Unlimited);
    }

    #[tokio::test]
    async fn test_validation_and_name_conflict() {
        let (ctx, _env) = test_context().await;
        assert_eq!(create_plan(&ctx, new_plan("Zero", 100, 0)).await.unwrap_err().code(), ErrorCode::InvalidPlan);
        assert_eq!(create_plan(&ctx, new_plan("Neg", -1, 3)).await.unwrap_err().code(), ErrorCode::InvalidPlan);
        create_plan(&ctx, new_plan("Explorer", 100, 3)).await.unwrap();
        assert_eq!(
            create_plan(&ctx, new_plan(" Explorer ", 200, 3)).await.unwrap_err().code(),
            ErrorCode::PlanNameTaken
        );
    }

    #[tokio::test]
    async fn test_sync_billing_codes() {
        let (ctx, _env) = test_context().await;
        let plan = create_plan(&ctx, new_plan("Explorer", 100, 3)).await.unwrap();
        let report = sync_billing_codes(
            &ctx,
            &[("Explorer".into(), "PLN_exp".into()), ("Ghost".into(), "PLN_ghost".into())],
        )
        .await
        .unwrap();
        assert_eq!(report.updated, vec!["Explorer"]);
        assert_eq!(report.missing, vec!["Ghost"]);
        let found = find_by_billing_code(&ctx, "PLN_exp").await.unwrap().unwrap();
        assert_eq!(found.id, plan.id);
        assert_eq!(get_plan(&ctx, &plan.id).await.unwrap().external_billing_code.as_deref(), Some("PLN_exp"));
    }

    #[tokio::test]
    async fn test_blank_code_rejects_whole_batch() {
        let (ctx, _env) = test_context().await;
        let mut explorer = new_plan("Explorer", 100, 3);
        explorer.external_billing_code = Some("PLN_old".into());
        let plan = create_plan(&ctx, explorer).await.unwrap();

        let err = sync_billing_codes(
            &ctx,
            &[("Explorer".into(), "PLN_new".into()), ("Ghost".into(), "  ".into())],
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);
        assert_eq!(get_plan(&ctx, &plan.id).await.unwrap().external_billing_code.as_deref(), Some("PLN_old"));
        assert!(find_by_billing_code(&ctx, "PLN_new").await.unwrap().is_none());
    }
}
