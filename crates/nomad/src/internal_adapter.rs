// Internal adapter: typed operations over the raw storage `Adapter`.
//
// Everything above this layer works with models; everything below works with
// JSON records. The wrapper borrows whatever adapter it is given, so the same
// code runs against the base store or an open transaction.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use nomad_core::db::adapter::{Adapter, FindManyQuery, SortBy, WhereClause};
use nomad_core::db::models::*;
use nomad_core::db::schema::tables;
use nomad_core::error::Result;
use nomad_core::utils::normalize_email;

fn parse<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

fn parse_all<T: DeserializeOwned>(values: Vec<Value>) -> Result<Vec<T>> {
    values.into_iter().map(parse).collect()
}

fn record<T: Serialize>(model: &T) -> Result<Value> {
    Ok(serde_json::to_value(model)?)
}

fn by_id(id: &str) -> [WhereClause; 1] {
    [WhereClause::eq("id", id)]
}

/// Typed storage operations for every table the core owns.
#[derive(Clone, Copy)]
pub struct InternalAdapter<'a> {
    db: &'a dyn Adapter,
}

impl<'a> InternalAdapter<'a> {
    pub fn new(db: &'a dyn Adapter) -> Self {
        Self { db }
    }

    async fn find_one<T: DeserializeOwned>(&self, model: &str, clauses: &[WhereClause]) -> Result<Option<T>> {
        match self.db.find_one(model, clauses).await? {
            Some(v) => Ok(Some(parse(v)?)),
            None => Ok(None),
        }
    }

    async fn find_many<T: DeserializeOwned>(&self, model: &str, query: FindManyQuery) -> Result<Vec<T>> {
        parse_all(self.db.find_many(model, query).await?)
    }

    async fn insert<T: Serialize + DeserializeOwned>(&self, model: &str, value: &T) -> Result<T> {
        parse(self.db.create(model, record(value)?).await?)
    }

    async fn patch<T: DeserializeOwned>(&self, model: &str, id: &str, data: Value) -> Result<Option<T>> {
        match self.db.update(model, &by_id(id), data).await? {
            Some(v) => Ok(Some(parse(v)?)),
            None => Ok(None),
        }
    }

    // ─── Plans ───────────────────────────────────────────────────

    pub async fn find_plan(&self, id: &str) -> Result<Option<Plan>> {
        self.find_one(tables::PLAN, &by_id(id)).await
    }

    pub async fn find_plan_by_name(&self, name: &str) -> Result<Option<Plan>> {
        self.find_one(tables::PLAN, &[WhereClause::eq("name", name)]).await
    }

    pub async fn find_plan_by_billing_code(&self, code: &str) -> Result<Option<Plan>> {
        self.find_one(tables::PLAN, &[WhereClause::eq("externalBillingCode", code)]).await
    }

    /// All plans, cheapest first.
    pub async fn list_plans(&self) -> Result<Vec<Plan>> {
        self.find_many(tables::PLAN, FindManyQuery::default().sorted(SortBy::asc("price")))
            .await
    }

    pub async fn create_plan(&self, plan: &Plan) -> Result<Plan> {
        self.insert(tables::PLAN, plan).await
    }

    pub async fn set_plan_billing_code(&self, id: &str, code: &str) -> Result<Option<Plan>> {
        self.patch(tables::PLAN, id, json!({ "externalBillingCode": code })).await
    }

    // ─── Partner spaces ──────────────────────────────────────────

    pub async fn find_space(&self, id: &str) -> Result<Option<PartnerSpace>> {
        self.find_one(tables::PARTNER_SPACE, &by_id(id)).await
    }

    pub async fn find_space_by_name(&self, name: &str) -> Result<Option<PartnerSpace>> {
        self.find_one(tables::PARTNER_SPACE, &[WhereClause::eq("name", name)]).await
    }

    pub async fn list_spaces(&self) -> Result<Vec<PartnerSpace>> {
        self.find_many(tables::PARTNER_SPACE, FindManyQuery::default().sorted(SortBy::asc("name")))
            .await
    }

    pub async fn create_space(&self, space: &PartnerSpace) -> Result<PartnerSpace> {
        self.insert(tables::PARTNER_SPACE, space).await
    }

    pub async fn set_space_owner(&self, space_id: &str, owner_id: &str) -> Result<Option<PartnerSpace>> {
        self.patch(tables::PARTNER_SPACE, space_id, json!({ "ownerId": owner_id })).await
    }

    // ─── Principals ──────────────────────────────────────────────

    pub async fn find_principal(&self, id: &str) -> Result<Option<Principal>> {
        self.find_one(tables::PRINCIPAL, &by_id(id)).await
    }

    pub async fn find_principal_by_email(&self, email: &str) -> Result<Option<Principal>> {
        self.find_one(tables::PRINCIPAL, &[WhereClause::eq("email", normalize_email(email))])
            .await
    }

    pub async fn find_principals(&self, ids: &[String]) -> Result<Vec<Principal>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.iter().cloned().map(Value::String).collect();
        self.find_many(tables::PRINCIPAL, FindManyQuery::filter(vec![WhereClause::is_in("id", ids)]))
            .await
    }

    pub async fn create_principal(&self, principal: &Principal) -> Result<Principal> {
        self.insert(tables::PRINCIPAL, principal).await
    }

    pub async fn update_principal(&self, id: &str, data: Value) -> Result<Option<Principal>> {
        self.patch(tables::PRINCIPAL, id, data).await
    }

    pub async fn list_team_members(&self, team_id: &str) -> Result<Vec<Principal>> {
        self.find_many(
            tables::PRINCIPAL,
            FindManyQuery::filter(vec![WhereClause::eq("teamId", team_id)]).sorted(SortBy::asc("createdAt")),
        )
        .await
    }

    // ─── Teams and invitations ───────────────────────────────────

    pub async fn find_team(&self, id: &str) -> Result<Option<Team>> {
        self.find_one(tables::TEAM, &by_id(id)).await
    }

    pub async fn find_team_by_admin(&self, admin_id: &str) -> Result<Option<Team>> {
        self.find_one(tables::TEAM, &[WhereClause::eq("adminId", admin_id)]).await
    }

    pub async fn create_team(&self, team: &Team) -> Result<Team> {
        self.insert(tables::TEAM, team).await
    }

    pub async fn find_invitation(&self, id: &str) -> Result<Option<Invitation>> {
        self.find_one(tables::INVITATION, &by_id(id)).await
    }

    pub async fn find_pending_invitation(&self, team_id: &str, email: &str) -> Result<Option<Invitation>> {
        self.find_one(
            tables::INVITATION,
            &[
                WhereClause::eq("teamId", team_id).and(),
                WhereClause::eq("email", normalize_email(email)).and(),
                WhereClause::eq("status", InvitationStatus::Pending.as_str()),
            ],
        )
        .await
    }

    pub async fn list_invitations(&self, team_id: &str) -> Result<Vec<Invitation>> {
        self.find_many(
            tables::INVITATION,
            FindManyQuery::filter(vec![WhereClause::eq("teamId", team_id)]).sorted(SortBy::desc("createdAt")),
        )
        .await
    }

    pub async fn create_invitation(&self, invitation: &Invitation) -> Result<Invitation> {
        self.insert(tables::INVITATION, invitation).await
    }

    pub async fn set_invitation_status(&self, id: &str, status: InvitationStatus) -> Result<Option<Invitation>> {
        self.patch(tables::INVITATION, id, json!({ "status": status })).await
    }

    pub async fn delete_invitation(&self, id: &str) -> Result<bool> {
        self.db.delete(tables::INVITATION, &by_id(id)).await
    }

    // ─── Subscriptions ───────────────────────────────────────────

    /// Every row flagged active for `owner`, oldest first. Normally zero or one.
    pub async fn active_subscriptions(&self, owner: &SubscriptionOwner) -> Result<Vec<Subscription>> {
        self.find_many(
            tables::SUBSCRIPTION,
            FindManyQuery::filter(vec![
                WhereClause::eq(owner.field(), owner.id()).and(),
                WhereClause::eq("isActive", true),
            ])
            .sorted(SortBy::asc("createdAt")),
        )
        .await
    }

    pub async fn subscriptions_for(&self, owner: &SubscriptionOwner) -> Result<Vec<Subscription>> {
        self.find_many(
            tables::SUBSCRIPTION,
            FindManyQuery::filter(vec![WhereClause::eq(owner.field(), owner.id())])
                .sorted(SortBy::desc("createdAt")),
        )
        .await
    }

    pub async fn find_subscription_by_reference(&self, reference: &str) -> Result<Option<Subscription>> {
        self.find_one(tables::SUBSCRIPTION, &[WhereClause::eq("paymentReference", reference)])
            .await
    }

    pub async fn create_subscription(&self, subscription: &Subscription) -> Result<Subscription> {
        self.insert(tables::SUBSCRIPTION, subscription).await
    }

    pub async fn deactivate_subscription(&self, id: &str) -> Result<bool> {
        let updated: Option<Subscription> =
            self.patch(tables::SUBSCRIPTION, id, json!({ "isActive": false })).await?;
        Ok(updated.is_some())
    }

    /// Flip every active row for `owner` to inactive. Returns how many changed.
    pub async fn deactivate_all(&self, owner: &SubscriptionOwner) -> Result<i64> {
        self.db
            .update_many(
                tables::SUBSCRIPTION,
                &[
                    WhereClause::eq(owner.field(), owner.id()).and(),
                    WhereClause::eq("isActive", true),
                ],
                json!({ "isActive": false }),
            )
            .await
    }

    // ─── Check-in tokens ─────────────────────────────────────────

    pub async fn find_token_for(&self, principal_id: &str) -> Result<Option<CheckInToken>> {
        self.find_one(tables::CHECK_IN_TOKEN, &[WhereClause::eq("principalId", principal_id)])
            .await
    }

    pub async fn find_token_by_code(&self, code: &str) -> Result<Option<CheckInToken>> {
        self.find_one(tables::CHECK_IN_TOKEN, &[WhereClause::eq("code", code)]).await
    }

    pub async fn create_token(&self, token: &CheckInToken) -> Result<CheckInToken> {
        self.insert(tables::CHECK_IN_TOKEN, token).await
    }

    pub async fn delete_token(&self, id: &str) -> Result<bool> {
        self.db.delete(tables::CHECK_IN_TOKEN, &by_id(id)).await
    }

    pub async fn delete_tokens_for(&self, principal_id: &str) -> Result<i64> {
        self.db
            .delete_many(tables::CHECK_IN_TOKEN, &[WhereClause::eq("principalId", principal_id)])
            .await
    }

    /// Delete every token whose expiry is before `now`.
    pub async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> Result<i64> {
        self.db
            .delete_many(tables::CHECK_IN_TOKEN, &[WhereClause::lt("expiresAt", record(&now)?)])
            .await
    }

    // ─── Check-ins ───────────────────────────────────────────────

    pub async fn create_check_in(&self, check_in: &CheckIn) -> Result<CheckIn> {
        self.insert(tables::CHECK_IN, check_in).await
    }

    /// A principal's visits at or after `since`, newest first.
    pub async fn check_ins_for_principal(
        &self,
        principal_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<CheckIn>> {
        let mut clauses = vec![WhereClause::eq("principalId", principal_id)];
        if let Some(since) = since {
            clauses[0] = clauses[0].clone().and();
            clauses.push(WhereClause::gte("timestamp", record(&since)?));
        }
        self.find_many(
            tables::CHECK_IN,
            FindManyQuery::filter(clauses).sorted(SortBy::desc("timestamp")),
        )
        .await
    }

    /// A space's visits at or after `since`, newest first.
    pub async fn check_ins_for_space(
        &self,
        space_id: &str,
        since: Option<DateTime<Utc>>,
        limit: Option<i64>,
    ) -> Result<Vec<CheckIn>> {
        let mut clauses = vec![WhereClause::eq("spaceId", space_id)];
        if let Some(since) = since {
            clauses[0] = clauses[0].clone().and();
            clauses.push(WhereClause::gte("timestamp", record(&since)?));
        }
        let mut query = FindManyQuery::filter(clauses).sorted(SortBy::desc("timestamp"));
        query.limit = limit;
        self.find_many(tables::CHECK_IN, query).await
    }
}
