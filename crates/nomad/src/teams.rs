// Teams: one admin, pooled seats, one team subscription.
//
// Members draw on the team's subscription when they hold none of their own.
// Quota is still counted per member.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use nomad_core::db::models::{
    DaysAllowed, Invitation, InvitationStatus, Principal, Role, Subscription, SubscriptionOwner, Team,
};
use nomad_core::error::{ApiError, ErrorCode, Result};
use nomad_core::notify::{Notification, NotificationKind};
use nomad_core::utils::generate_id;

use crate::context::NomadContext;
use crate::internal_adapter::InternalAdapter;
use crate::ledger::{Entitlement, Ledger};
use crate::profile::SubscriptionSummary;
use crate::provisioning::{new_principal, validate_email};
use crate::transaction::{deny, Decision, TransactionScope};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSignup {
    pub admin_email: String,
    #[serde(default)]
    pub admin_name: Option<String>,
    pub team_name: String,
    /// Member seats, not counting the admin.
    pub seats: u32,
    pub plan_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSetup {
    pub team: Team,
    pub admin: Principal,
    pub subscription: Subscription,
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberUsage {
    pub principal_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub days_used: u32,
    pub used_today: bool,
    pub last_check_in: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamDashboard {
    pub team: Team,
    pub subscription: Option<SubscriptionSummary>,
    pub days_allowed: Option<DaysAllowed>,
    pub seats_used: u32,
    pub pending_invitations: u32,
    pub members: Vec<MemberUsage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingEntry {
    pub subscription_id: String,
    pub plan_name: Option<String>,
    /// Minor units.
    pub price: Option<i64>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
    pub payment_reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamBilling {
    pub team_id: String,
    pub seats: u32,
    /// Newest first.
    pub history: Vec<BillingEntry>,
}

/// The team `admin` runs. Anyone else is refused.
async fn require_admin_team(store: InternalAdapter<'_>, admin: &Principal) -> Result<Decision<Team>> {
    if admin.role != Role::TeamAdmin {
        return deny(ErrorCode::RoleNotPermitted);
    }
    match store.find_team_by_admin(&admin.id).await? {
        Some(team) => Ok(Ok(team)),
        None => deny(ErrorCode::TeamNotFound),
    }
}

/// Unwrap a decision or return the denial from the enclosing function.
macro_rules! decided {
    ($decision:expr) => {
        match $decision {
            Ok(value) => value,
            Err(denial) => return Ok(Err(denial)),
        }
    };
}

fn non_admin_members(members: &[Principal]) -> u32 {
    let count = members.iter().filter(|m| m.role != Role::TeamAdmin).count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

fn pending_count(invitations: &[Invitation]) -> u32 {
    let count = invitations.iter().filter(|i| i.status == InvitationStatus::Pending).count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// The team's live subscription, or a new one on `plan_id`.
async fn attach_in(ledger: &Ledger<'_>, team: &Team, plan_id: &str) -> Result<Decision<Subscription>> {
    let owner = SubscriptionOwner::Team(team.id.clone());
    if let Some(existing) = ledger.get_active_subscription(&owner).await? {
        tracing::debug!(team_id = %team.id, subscription_id = %existing.id, "team already subscribed");
        return Ok(Ok(existing));
    }
    let Some(plan) = ledger.store().find_plan(plan_id).await? else {
        return deny(ErrorCode::PlanNotFound);
    };
    ledger.activate_subscription(&owner, &plan, None).await
}

/// Provision the admin, the team and its subscription.
///
/// Signing up again with the same admin email returns the existing team.
pub async fn create_team(ctx: &NomadContext, signup: TeamSignup) -> Result<TeamSetup> {
    let email = validate_email(&signup.admin_email)?;
    if signup.team_name.trim().is_empty() {
        return Err(ApiError::with_message(ErrorCode::InvalidInput, "Team name is required").into());
    }
    if signup.seats == 0 {
        return Err(ApiError::with_message(ErrorCode::InvalidInput, "A team needs at least one seat").into());
    }
    let mut scope = TransactionScope::begin(ctx).await?;
    let outcome = create_team_in(ctx, &mut scope, &email, signup).await;
    scope.settle(outcome).await
}

async fn create_team_in(
    ctx: &NomadContext,
    scope: &mut TransactionScope,
    email: &str,
    signup: TeamSignup,
) -> Result<Decision<TeamSetup>> {
    let store = scope.store();
    let ledger = Ledger::new(ctx, store);

    let existing = store.find_principal_by_email(email).await?;
    if let Some(admin) = &existing {
        if admin.role != Role::TeamAdmin {
            return deny(ErrorCode::PrincipalAlreadyExists);
        }
        if let Some(team) = store.find_team_by_admin(&admin.id).await? {
            let subscription = decided!(attach_in(&ledger, &team, &signup.plan_id).await?);
            return Ok(Ok(TeamSetup { team, admin: admin.clone(), subscription, created: false }));
        }
    }

    let Some(plan) = store.find_plan(&signup.plan_id).await? else {
        return deny(ErrorCode::PlanNotFound);
    };
    let admin = match existing {
        Some(admin) => admin,
        None => {
            let admin = new_principal(email, signup.admin_name.clone(), Role::TeamAdmin, ctx);
            store.create_principal(&admin).await?
        }
    };
    let team = store
        .create_team(&Team {
            id: generate_id(),
            name: signup.team_name.trim().to_string(),
            admin_id: admin.id.clone(),
            seats: signup.seats,
            created_at: ctx.now(),
        })
        .await?;
    let linked = store.update_principal(&admin.id, json!({ "teamId": team.id })).await?;
    let admin = linked.unwrap_or(admin);
    let subscription = decided!(
        ledger
            .activate_subscription(&SubscriptionOwner::Team(team.id.clone()), &plan, None)
            .await?
    );
    tracing::info!(team_id = %team.id, admin_id = %admin.id, seats = team.seats, "team created");

    let app_name = &ctx.options.app_name;
    scope.notify_after_commit(Notification::new(
        NotificationKind::TeamCreated,
        admin.email.clone(),
        format!("{app_name}: {} is ready", team.name),
        format!(
            "Your team {} is on the {} plan with {} seats. Invite members from {}/team.",
            team.name, plan.name, team.seats, ctx.options.frontend_url
        ),
    ));
    Ok(Ok(TeamSetup { team, admin, subscription, created: true }))
}

/// Subscribe the admin's team to `plan_id`, unless it already holds a live subscription.
pub async fn attach_team_subscription(ctx: &NomadContext, admin: &Principal, plan_id: &str) -> Result<Subscription> {
    let scope = TransactionScope::begin(ctx).await?;
    let outcome: Result<Decision<Subscription>> = async {
        let store = scope.store();
        let team = decided!(require_admin_team(store, admin).await?);
        attach_in(&Ledger::new(ctx, store), &team, plan_id).await
    }
    .await;
    scope.settle(outcome).await
}

pub async fn list_members(ctx: &NomadContext, admin: &Principal) -> Result<Vec<Principal>> {
    let store = ctx.store();
    let team = require_admin_team(store, admin).await??;
    store.list_team_members(&team.id).await
}

/// Team subscription and every member's usage of it.
pub async fn team_dashboard(ctx: &NomadContext, admin: &Principal) -> Result<TeamDashboard> {
    let scope = TransactionScope::begin(ctx).await?;
    let outcome: Result<Decision<TeamDashboard>> = async {
        let store = scope.store();
        let team = decided!(require_admin_team(store, admin).await?);
        let ledger = Ledger::new(ctx, store);

        let entitlement = match ledger.get_active_subscription(&SubscriptionOwner::Team(team.id.clone())).await? {
            Some(subscription) => store
                .find_plan(&subscription.plan_id)
                .await?
                .map(|plan| Entitlement { subscription, plan, via_team: true }),
            None => None,
        };

        let members = store.list_team_members(&team.id).await?;
        let mut usage = Vec::with_capacity(members.len());
        for member in &members {
            let (days_used, used_today) = match &entitlement {
                Some(e) => {
                    let q = ledger.compute_quota_usage(&member.id, e).await?;
                    (q.distinct_days_used, q.used_today)
                }
                None => (0, false),
            };
            let last_check_in = store
                .check_ins_for_principal(&member.id, None)
                .await?
                .first()
                .map(|c| c.timestamp);
            usage.push(MemberUsage {
                principal_id: member.id.clone(),
                email: member.email.clone(),
                display_name: member.display_name.clone(),
                role: member.role,
                days_used,
                used_today,
                last_check_in,
            });
        }
        let invitations = store.list_invitations(&team.id).await?;

        Ok(Ok(TeamDashboard {
            subscription: entitlement.as_ref().map(SubscriptionSummary::of),
            days_allowed: entitlement.as_ref().map(|e| e.plan.days_allowed()),
            seats_used: non_admin_members(&members),
            pending_invitations: pending_count(&invitations),
            members: usage,
            team,
        }))
    }
    .await;
    scope.settle(outcome).await
}

pub async fn team_billing(ctx: &NomadContext, admin: &Principal) -> Result<TeamBilling> {
    let store = ctx.store();
    let team = require_admin_team(store, admin).await??;
    let mut history = Vec::new();
    for subscription in store.subscriptions_for(&SubscriptionOwner::Team(team.id.clone())).await? {
        let plan = store.find_plan(&subscription.plan_id).await?;
        history.push(BillingEntry {
            plan_name: plan.as_ref().map(|p| p.name.clone()),
            price: plan.as_ref().map(|p| p.price),
            subscription_id: subscription.id,
            start_date: subscription.start_date,
            end_date: subscription.end_date,
            is_active: subscription.is_active,
            payment_reference: subscription.payment_reference,
        });
    }
    Ok(TeamBilling { team_id: team.id, seats: team.seats, history })
}

/// Unlink a member from the admin's team and demote them to subscriber.
pub async fn remove_member(ctx: &NomadContext, admin: &Principal, member_id: &str) -> Result<Principal> {
    let mut scope = TransactionScope::begin(ctx).await?;
    let outcome = remove_member_in(ctx, &mut scope, admin, member_id).await;
    scope.settle(outcome).await
}

async fn remove_member_in(
    ctx: &NomadContext,
    scope: &mut TransactionScope,
    admin: &Principal,
    member_id: &str,
) -> Result<Decision<Principal>> {
    let store = scope.store();
    let team = decided!(require_admin_team(store, admin).await?);
    if member_id == admin.id {
        return deny(ErrorCode::CannotRemoveSelf);
    }
    let member = match store.find_principal(member_id).await? {
        Some(m) if m.team_id.as_deref() == Some(team.id.as_str()) => m,
        _ => return deny(ErrorCode::PrincipalNotFound),
    };
    let removed = store
        .update_principal(&member.id, json!({ "teamId": null, "role": Role::Subscriber }))
        .await?
        .ok_or_else(|| ApiError::new(ErrorCode::PrincipalNotFound))?;
    // Outstanding codes were issued against the team subscription.
    store.delete_tokens_for(&member.id).await?;
    tracing::info!(team_id = %team.id, member_id, "team member removed");

    scope.notify_after_commit(Notification::new(
        NotificationKind::TeamMemberRemoved,
        removed.email.clone(),
        format!("{}: you have left {}", ctx.options.app_name, team.name),
        format!("You are no longer a member of {}. Your own subscription, if any, is unaffected.", team.name),
    ));
    Ok(Ok(removed))
}

/// Invite `email` to the admin's team.
pub async fn invite(ctx: &NomadContext, admin: &Principal, email: &str) -> Result<Invitation> {
    let email = validate_email(email)?;
    let mut scope = TransactionScope::begin(ctx).await?;
    let outcome = invite_in(ctx, &mut scope, admin, &email).await;
    scope.settle(outcome).await
}

async fn invite_in(
    ctx: &NomadContext,
    scope: &mut TransactionScope,
    admin: &Principal,
    email: &str,
) -> Result<Decision<Invitation>> {
    let store = scope.store();
    let team = decided!(require_admin_team(store, admin).await?);

    if let Some(existing) = store.find_principal_by_email(email).await? {
        if existing.team_id.as_deref() == Some(team.id.as_str()) {
            return deny(ErrorCode::AlreadyTeamMember);
        }
    }
    if store.find_pending_invitation(&team.id, email).await?.is_some() {
        return deny(ErrorCode::InvitationAlreadyPending);
    }
    let members = store.list_team_members(&team.id).await?;
    let invitations = store.list_invitations(&team.id).await?;
    if non_admin_members(&members) + pending_count(&invitations) >= team.seats {
        return Ok(Err(ApiError::with_message(ErrorCode::InvalidInput, "Every seat on the team is taken")));
    }

    let invitation = store
        .create_invitation(&Invitation {
            id: generate_id(),
            team_id: team.id.clone(),
            email: email.to_string(),
            status: InvitationStatus::Pending,
            invited_by: admin.id.clone(),
            created_at: ctx.now(),
        })
        .await?;
    tracing::info!(team_id = %team.id, invitation_id = %invitation.id, "team invitation created");

    scope.notify_after_commit(Notification::new(
        NotificationKind::TeamInvitation,
        invitation.email.clone(),
        format!("{}: join {}", ctx.options.app_name, team.name),
        format!(
            "{} invited you to {}. Accept at {}/invitations/{}",
            admin.email, team.name, ctx.options.frontend_url, invitation.id
        ),
    ));
    Ok(Ok(invitation))
}

/// Newest first, all statuses.
pub async fn list_invitations(ctx: &NomadContext, admin: &Principal) -> Result<Vec<Invitation>> {
    let store = ctx.store();
    let team = require_admin_team(store, admin).await??;
    store.list_invitations(&team.id).await
}

pub async fn revoke_invitation(ctx: &NomadContext, admin: &Principal, invitation_id: &str) -> Result<()> {
    let scope = TransactionScope::begin(ctx).await?;
    let outcome: Result<Decision<()>> = async {
        let store = scope.store();
        let team = decided!(require_admin_team(store, admin).await?);
        match store.find_invitation(invitation_id).await? {
            Some(inv) if inv.team_id == team.id => {
                store.delete_invitation(&inv.id).await?;
                tracing::info!(team_id = %team.id, invitation_id, "team invitation revoked");
                Ok(Ok(()))
            }
            _ => deny(ErrorCode::InvitationNotFound),
        }
    }
    .await;
    scope.settle(outcome).await
}

/// Join the inviting team as a member.
///
/// A principal already on a team must be removed from it first.
pub async fn accept_invitation(ctx: &NomadContext, principal_id: &str, invitation_id: &str) -> Result<Principal> {
    let scope = TransactionScope::begin(ctx).await?;
    let outcome = accept_in(&scope, principal_id, invitation_id).await;
    scope.settle(outcome).await
}

async fn accept_in(scope: &TransactionScope, principal_id: &str, invitation_id: &str) -> Result<Decision<Principal>> {
    let store = scope.store();
    let Some(principal) = store.find_principal(principal_id).await? else {
        return deny(ErrorCode::PrincipalNotFound);
    };
    let invitation = match store.find_invitation(invitation_id).await? {
        Some(inv) if inv.status == InvitationStatus::Pending => inv,
        _ => return deny(ErrorCode::InvitationNotFound),
    };
    if invitation.email != principal.email {
        return deny(ErrorCode::Unauthorized);
    }
    if matches!(principal.role, Role::Partner | Role::TeamAdmin) {
        return deny(ErrorCode::RoleNotPermitted);
    }
    if principal.team_id.is_some() {
        return Ok(Err(ApiError::with_message(
            ErrorCode::AlreadyTeamMember,
            "Leave your current team before joining another",
        )));
    }
    if store.find_team(&invitation.team_id).await?.is_none() {
        return deny(ErrorCode::TeamNotFound);
    }

    let member = store
        .update_principal(
            &principal.id,
            json!({ "teamId": invitation.team_id, "role": Role::TeamMember }),
        )
        .await?
        .ok_or_else(|| ApiError::new(ErrorCode::PrincipalNotFound))?;
    store.set_invitation_status(&invitation.id, InvitationStatus::Accepted).await?;
    tracing::info!(team_id = %invitation.team_id, principal_id, "team invitation accepted");
    Ok(Ok(member))
}
