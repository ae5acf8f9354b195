// Read-only reports over the visit log.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::Serialize;

use nomad_core::db::models::{AccessTier, CheckIn, DaysAllowed, PartnerSpace, Principal, Role};
use nomad_core::error::{ErrorCode, Result};

use crate::context::NomadContext;
use crate::internal_adapter::InternalAdapter;
use crate::ledger::Ledger;
use crate::transaction::{deny, Decision, TransactionScope};

const PEAK_HOURS: std::ops::RangeInclusive<u32> = 8..=19;
const TOP_SPACES: usize = 3;
const WEEK: u64 = 7;

// ─── Partner reports ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerDashboard {
    pub space_id: String,
    pub space_name: String,
    pub unique_visitors_today: u32,
    pub check_ins_today: u32,
    /// Minor units.
    pub payout_today: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub check_in_id: String,
    pub principal_id: String,
    pub principal_email: Option<String>,
    pub timestamp: DateTime<Utc>,
}

async fn managed_space(store: InternalAdapter<'_>, partner: &Principal) -> Result<Decision<PartnerSpace>> {
    let Some(space_id) = partner.managed_space_id.as_deref().filter(|_| partner.role == Role::Partner) else {
        return deny(ErrorCode::RoleNotPermitted);
    };
    match store.find_space(space_id).await? {
        Some(space) => Ok(Ok(space)),
        None => deny(ErrorCode::SpaceNotFound),
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Today's traffic at the partner's space.
pub async fn dashboard_summary(ctx: &NomadContext, partner: &Principal) -> Result<PartnerDashboard> {
    let store = ctx.store();
    let space = managed_space(store, partner).await??;
    let calendar = &ctx.options.calendar;
    let today = ctx.today();

    let visits: Vec<CheckIn> = store
        .check_ins_for_space(&space.id, Some(calendar.start_of_day(today)), None)
        .await?
        .into_iter()
        .filter(|c| calendar.date_of(c.timestamp) == today)
        .collect();
    let visitors: HashSet<&str> = visits.iter().map(|c| c.principal_id.as_str()).collect();
    let check_ins_today = count(visits.len());

    Ok(PartnerDashboard {
        unique_visitors_today: count(visitors.len()),
        check_ins_today,
        payout_today: space.payout_per_checkin.saturating_mul(i64::from(check_ins_today)),
        space_id: space.id,
        space_name: space.name,
    })
}

/// Visits to the partner's space, newest first.
pub async fn report(ctx: &NomadContext, partner: &Principal, limit: Option<i64>) -> Result<Vec<ReportEntry>> {
    let store = ctx.store();
    let space = managed_space(store, partner).await??;
    let visits = store.check_ins_for_space(&space.id, None, limit).await?;

    let mut ids: Vec<String> = visits.iter().map(|c| c.principal_id.clone()).collect();
    ids.sort();
    ids.dedup();
    let emails: HashMap<String, String> = store
        .find_principals(&ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p.email))
        .collect();

    Ok(visits
        .into_iter()
        .map(|c| ReportEntry {
            principal_email: emails.get(&c.principal_id).cloned(),
            check_in_id: c.id,
            principal_id: c.principal_id,
            timestamp: c.timestamp,
        })
        .collect())
}

// ─── Subscriber analytics ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_check_ins: u32,
    pub this_month_check_ins: u32,
    pub this_month_days: u32,
    pub favourite_space: Option<String>,
    pub member_since: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionBlock {
    pub plan_name: String,
    pub days_total: DaysAllowed,
    pub days_used: u32,
    pub days_remaining: Option<u32>,
    pub access_tier: AccessTier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCount {
    pub date: NaiveDate,
    /// Short weekday name, e.g. `Mon`.
    pub weekday: String,
    pub check_ins: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourBucket {
    pub hour: u32,
    pub check_ins: u32,
    /// Share of all check-ins, 0 to 100, one decimal place.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceVisits {
    pub space_id: String,
    pub space_name: String,
    pub visits: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub overview: Overview,
    pub subscription: Option<SubscriptionBlock>,
    pub weekly_pattern: Vec<DayCount>,
    pub peak_hours: Vec<HourBucket>,
    pub top_spaces: Vec<SpaceVisits>,
}

fn percentage(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (f64::from(part) * 1000.0 / f64::from(whole)).round() / 10.0
}

/// Visit history and quota for a subscriber.
///
/// Runs in a transaction so a lapsed subscription is retired before it is
/// reported.
pub async fn analytics(ctx: &NomadContext, principal: &Principal) -> Result<Analytics> {
    let scope = TransactionScope::begin(ctx).await?;
    let outcome = analytics_in(ctx, &scope, principal).await;
    scope.settle(outcome).await
}

async fn analytics_in(ctx: &NomadContext, scope: &TransactionScope, principal: &Principal) -> Result<Decision<Analytics>> {
    if !principal.role.can_check_in() {
        return deny(ErrorCode::RoleNotPermitted);
    }
    let store = scope.store();
    let ledger = Ledger::new(ctx, store);
    let calendar = &ctx.options.calendar;
    let today = ledger.today();

    let visits = store.check_ins_for_principal(&principal.id, None).await?;
    let total = count(visits.len());

    let this_month: Vec<&CheckIn> = visits
        .iter()
        .filter(|c| {
            let d = calendar.date_of(c.timestamp);
            d.year() == today.year() && d.month() == today.month()
        })
        .collect();
    let this_month_days: HashSet<NaiveDate> = this_month.iter().map(|c| calendar.date_of(c.timestamp)).collect();

    let mut per_space: HashMap<&str, u32> = HashMap::new();
    for c in &visits {
        *per_space.entry(c.space_id.as_str()).or_default() += 1;
    }
    let mut ranked: Vec<(&str, u32)> = per_space.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.truncate(TOP_SPACES);

    let mut top_spaces = Vec::with_capacity(ranked.len());
    for (space_id, n) in ranked {
        let space_name = store
            .find_space(space_id)
            .await?
            .map(|s| s.name)
            .unwrap_or_else(|| space_id.to_string());
        top_spaces.push(SpaceVisits { space_id: space_id.to_string(), space_name, visits: n });
    }

    let mut per_day: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for offset in 0..WEEK {
        if let Some(d) = today.checked_sub_days(Days::new(offset)) {
            per_day.insert(d, 0);
        }
    }
    let mut per_hour: BTreeMap<u32, u32> = PEAK_HOURS.map(|h| (h, 0)).collect();
    for c in &visits {
        if let Some(n) = per_day.get_mut(&calendar.date_of(c.timestamp)) {
            *n += 1;
        }
        if let Some(n) = per_hour.get_mut(&calendar.hour_of(c.timestamp)) {
            *n += 1;
        }
    }

    let subscription = match ledger.resolve_entitlement(principal).await? {
        Some(entitlement) => {
            let usage = ledger.compute_quota_usage(&principal.id, &entitlement).await?;
            Some(SubscriptionBlock {
                plan_name: entitlement.plan.name.clone(),
                days_total: usage.days_allowed,
                days_used: usage.distinct_days_used,
                days_remaining: usage.days_remaining(),
                access_tier: entitlement.plan.access_tier,
            })
        }
        None => None,
    };

    Ok(Ok(Analytics {
        overview: Overview {
            total_check_ins: total,
            this_month_check_ins: count(this_month.len()),
            this_month_days: count(this_month_days.len()),
            favourite_space: top_spaces.first().map(|s| s.space_name.clone()),
            member_since: principal.created_at,
        },
        subscription,
        weekly_pattern: per_day
            .into_iter()
            .map(|(date, check_ins)| DayCount { date, weekday: date.format("%a").to_string(), check_ins })
            .collect(),
        peak_hours: per_hour
            .into_iter()
            .map(|(hour, check_ins)| HourBucket { hour, check_ins, percentage: percentage(check_ins, total) })
            .collect(),
        top_spaces,
    }))
}
