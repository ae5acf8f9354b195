// Seed helpers.
//
// Fixtures write models straight through the adapter, bypassing every
// business rule, so tests can set up states the public operations would
// refuse to produce (two active rows, pre-dated check-ins).

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::json;

use nomad_core::db::adapter::{Adapter, WhereClause};
use nomad_core::db::models::*;
use nomad_core::db::schema::tables;
use nomad_core::error::Result;

/// 2024-01-01T09:00:00Z, the instant every fixture is created at.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).single().unwrap_or_default()
}

#[derive(Clone, Copy)]
pub struct Fixtures<'a> {
    db: &'a dyn Adapter,
}

impl<'a> Fixtures<'a> {
    pub fn new(db: &'a dyn Adapter) -> Self {
        Self { db }
    }

    async fn insert<T: serde::Serialize>(&self, model: &str, value: &T) -> Result<()> {
        self.db.create(model, serde_json::to_value(value)?).await?;
        Ok(())
    }

    /// A finite plan priced at 25 000 NGN.
    pub async fn plan(&self, id: &str, name: &str, included_days: u32, tier: AccessTier) -> Result<Plan> {
        let plan = Plan {
            id: id.to_string(),
            name: name.to_string(),
            price: 2_500_000,
            included_days,
            unlimited: false,
            access_tier: tier,
            external_billing_code: None,
            created_at: fixed_time(),
        };
        self.insert(tables::PLAN, &plan).await?;
        Ok(plan)
    }

    pub async fn unlimited_plan(&self, id: &str, name: &str, tier: AccessTier) -> Result<Plan> {
        let plan = Plan {
            id: id.to_string(),
            name: name.to_string(),
            price: 7_500_000,
            included_days: 30,
            unlimited: true,
            access_tier: tier,
            external_billing_code: None,
            created_at: fixed_time(),
        };
        self.insert(tables::PLAN, &plan).await?;
        Ok(plan)
    }

    pub async fn space(&self, id: &str, name: &str, tier: AccessTier) -> Result<PartnerSpace> {
        let space = PartnerSpace {
            id: id.to_string(),
            name: name.to_string(),
            address: format!("{name}, Lagos"),
            access_tier: tier,
            amenities: vec!["wifi".to_string()],
            payout_per_checkin: 150_000,
            owner_id: None,
            created_at: fixed_time(),
        };
        self.insert(tables::PARTNER_SPACE, &space).await?;
        Ok(space)
    }

    fn principal(id: &str, email: &str, role: Role) -> Principal {
        Principal {
            id: id.to_string(),
            email: email.to_lowercase(),
            display_name: Some(id.to_string()),
            photo_url: None,
            role,
            managed_space_id: None,
            team_id: None,
            created_at: fixed_time(),
        }
    }

    pub async fn subscriber(&self, id: &str, email: &str) -> Result<Principal> {
        let principal = Self::principal(id, email, Role::Subscriber);
        self.insert(tables::PRINCIPAL, &principal).await?;
        Ok(principal)
    }

    /// A partner managing `space_id`, recorded as the space's owner.
    pub async fn partner(&self, id: &str, email: &str, space_id: &str) -> Result<Principal> {
        let mut principal = Self::principal(id, email, Role::Partner);
        principal.managed_space_id = Some(space_id.to_string());
        self.insert(tables::PRINCIPAL, &principal).await?;
        self.db
            .update(tables::PARTNER_SPACE, &[WhereClause::eq("id", space_id)], json!({ "ownerId": id }))
            .await?;
        Ok(principal)
    }

    /// A team whose admin principal is created alongside it.
    pub async fn team(&self, id: &str, name: &str, admin_id: &str, admin_email: &str, seats: u32) -> Result<(Team, Principal)> {
        let mut admin = Self::principal(admin_id, admin_email, Role::TeamAdmin);
        admin.team_id = Some(id.to_string());
        self.insert(tables::PRINCIPAL, &admin).await?;
        let team = Team {
            id: id.to_string(),
            name: name.to_string(),
            admin_id: admin_id.to_string(),
            seats,
            created_at: fixed_time(),
        };
        self.insert(tables::TEAM, &team).await?;
        Ok((team, admin))
    }

    pub async fn team_member(&self, id: &str, email: &str, team_id: &str) -> Result<Principal> {
        let mut principal = Self::principal(id, email, Role::TeamMember);
        principal.team_id = Some(team_id.to_string());
        self.insert(tables::PRINCIPAL, &principal).await?;
        Ok(principal)
    }

    /// An active, open-ended ledger entry.
    pub async fn subscription(
        &self,
        id: &str,
        owner: SubscriptionOwner,
        plan_id: &str,
        start_date: NaiveDate,
    ) -> Result<Subscription> {
        let subscription = Subscription::new(
            id.to_string(),
            &owner,
            plan_id.to_string(),
            start_date,
            None,
            None,
            fixed_time(),
        );
        self.insert(tables::SUBSCRIPTION, &subscription).await?;
        Ok(subscription)
    }

    /// Insert an arbitrary ledger entry as given.
    pub async fn raw_subscription(&self, subscription: &Subscription) -> Result<()> {
        self.insert(tables::SUBSCRIPTION, subscription).await
    }

    pub async fn check_in(&self, id: &str, principal_id: &str, space_id: &str, at: DateTime<Utc>) -> Result<CheckIn> {
        let check_in = CheckIn {
            id: id.to_string(),
            principal_id: principal_id.to_string(),
            space_id: space_id.to_string(),
            timestamp: at,
        };
        self.insert(tables::CHECK_IN, &check_in).await?;
        Ok(check_in)
    }

    pub async fn token(&self, principal_id: &str, code: &str, expires_at: DateTime<Utc>) -> Result<CheckInToken> {
        let token = CheckInToken {
            id: format!("tok-{principal_id}"),
            principal_id: principal_id.to_string(),
            code: code.to_string(),
            created_at: expires_at - chrono::Duration::minutes(5),
            expires_at,
        };
        self.insert(tables::CHECK_IN_TOKEN, &token).await?;
        Ok(token)
    }
}
