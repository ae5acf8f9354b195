//! End-to-end entitlement scenarios: issuance, redemption, quota and
//! payment verification through the public API.

mod common;

use chrono::Duration;

use common::{at, jan, Harness};
use nomad::{issue_token, redeem, Reconciliation, VerificationStatus};
use nomad_core::db::adapter::Adapter;
use nomad_core::db::models::{AccessTier, DaysAllowed, Subscription, SubscriptionOwner};
use nomad_core::error::ErrorCode;
use nomad_test_utils::success_transaction;

#[tokio::test]
async fn same_day_reentry_counts_one_day() {
    let h = Harness::new().await;
    let partner = h.standard_member().await;

    h.clock.set(at(1, 9));
    let first = issue_token(&h.ctx, "u1").await.unwrap();
    redeem(&h.ctx, &partner, &first.code, "sp").await.unwrap();

    h.clock.set(at(1, 15));
    let second = issue_token(&h.ctx, "u1").await.unwrap();
    assert_eq!(second.days_used, 1);
    redeem(&h.ctx, &partner, &second.code, "sp").await.unwrap();

    h.clock.set(at(2, 10));
    let third = issue_token(&h.ctx, "u1").await.unwrap();
    let result = redeem(&h.ctx, &partner, &third.code, "sp").await.unwrap();

    assert_eq!(result.profile.quota.unwrap().distinct_days_used, 2);
}

#[tokio::test]
async fn exhausted_quota_refuses_new_day_but_admits_reentry() {
    let h = Harness::new().await;
    let fx = h.fixtures();
    fx.plan("p2", "Starter", 2, AccessTier::Standard).await.unwrap();
    fx.space("sp", "Hub", AccessTier::Standard).await.unwrap();
    fx.subscriber("u1", "ada@example.com").await.unwrap();
    fx.subscription("s1", SubscriptionOwner::Principal("u1".into()), "p2", jan(1))
        .await
        .unwrap();
    fx.check_in("c1", "u1", "sp", at(1, 9)).await.unwrap();
    fx.check_in("c2", "u1", "sp", at(2, 9)).await.unwrap();

    h.clock.set(at(2, 17));
    let reentry = issue_token(&h.ctx, "u1").await.unwrap();
    assert_eq!(reentry.days_used, 2);
    assert_eq!(reentry.days_total, DaysAllowed::Limited(2));

    h.clock.set(at(3, 9));
    let err = issue_token(&h.ctx, "u1").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::QuotaExceeded);
}

#[tokio::test]
async fn unlimited_plan_never_runs_out() {
    let h = Harness::new().await;
    let fx = h.fixtures();
    fx.unlimited_plan("pu", "Nomad", AccessTier::Premium).await.unwrap();
    fx.space("sp", "Hub", AccessTier::Premium).await.unwrap();
    fx.subscriber("u1", "ada@example.com").await.unwrap();
    fx.subscription("s1", SubscriptionOwner::Principal("u1".into()), "pu", jan(1))
        .await
        .unwrap();
    for d in 1..=20 {
        fx.check_in(&format!("c{d}"), "u1", "sp", at(d, 9)).await.unwrap();
    }
    h.clock.set(at(21, 9));
    let issued = issue_token(&h.ctx, "u1").await.unwrap();
    assert_eq!(issued.days_total, DaysAllowed::Unlimited);
    assert_eq!(issued.days_used, 21);
}

#[tokio::test]
async fn no_subscription_is_denied() {
    let h = Harness::new().await;
    h.fixtures().subscriber("u1", "ada@example.com").await.unwrap();
    let err = issue_token(&h.ctx, "u1").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoActiveSubscription);
    assert!(h.ctx.store().find_token_for("u1").await.unwrap().is_none());
}

#[tokio::test]
async fn lapsed_subscription_is_retired_on_issuance() {
    let h = Harness::new().await;
    let fx = h.fixtures();
    fx.plan("p8", "Explorer", 8, AccessTier::Standard).await.unwrap();
    fx.subscriber("u1", "ada@example.com").await.unwrap();
    let lapsed = Subscription::new(
        "s1".into(),
        &SubscriptionOwner::Principal("u1".into()),
        "p8".into(),
        jan(1),
        Some(jan(5)),
        None,
        at(1, 9),
    );
    fx.raw_subscription(&lapsed).await.unwrap();

    h.clock.set(at(5, 20));
    assert!(issue_token(&h.ctx, "u1").await.is_ok());

    h.clock.set(at(6, 8));
    let err = issue_token(&h.ctx, "u1").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoActiveSubscription);
    assert_eq!(h.active_subscriptions("u1").await, 0);
}

#[tokio::test]
async fn one_live_token_per_principal() {
    let h = Harness::new().await;
    h.standard_member().await;
    for _ in 0..5 {
        issue_token(&h.ctx, "u1").await.unwrap();
    }
    let tokens = h
        .db
        .count(nomad_core::db::schema::tables::CHECK_IN_TOKEN, &[])
        .await
        .unwrap();
    assert_eq!(tokens, 1);
}

#[tokio::test]
async fn expired_code_is_refused_and_removed() {
    let h = Harness::new().await;
    let partner = h.standard_member().await;
    let issued = issue_token(&h.ctx, "u1").await.unwrap();
    h.clock.advance(Duration::minutes(6));

    let err = redeem(&h.ctx, &partner, &issued.code, "sp").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::CodeExpired);
    let again = redeem(&h.ctx, &partner, &issued.code, "sp").await.unwrap_err();
    assert_eq!(again.code(), ErrorCode::CodeNotFound);
}

#[tokio::test]
async fn payment_with_numeric_plan_metadata_activates_once() {
    let h = Harness::new().await;
    let fx = h.fixtures();
    fx.plan("7", "Explorer", 8, AccessTier::Standard).await.unwrap();
    fx.subscriber("u1", "ada@example.com").await.unwrap();
    h.gateway
        .with_transaction(success_transaction("T12345", "ada@example.com", Some("7")));

    let recon = Reconciliation::new(&h.ctx);
    let first = recon.verify_payment("T12345").await.unwrap();
    assert_eq!(first.status, VerificationStatus::Activated);
    assert_eq!(first.plan_name, "Explorer");

    let second = recon.verify_payment("T12345").await.unwrap();
    assert_eq!(second.status, VerificationStatus::AlreadyProcessed);
    assert_eq!(second.subscription_id, first.subscription_id);

    let all = h
        .ctx
        .store()
        .subscriptions_for(&SubscriptionOwner::Principal("u1".into()))
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(h.notifier.sent_to("ada@example.com").len(), 1);
}

#[tokio::test]
async fn new_payment_replaces_active_subscription() {
    let h = Harness::new().await;
    h.standard_member().await;
    h.fixtures().plan("p16", "Pro", 16, AccessTier::Premium).await.unwrap();
    h.gateway
        .with_transaction(success_transaction("T1", "ada@example.com", Some("p16")));

    Reconciliation::new(&h.ctx).verify_payment("T1").await.unwrap();

    let active = h
        .ctx
        .store()
        .active_subscriptions(&SubscriptionOwner::Principal("u1".into()))
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].plan_id, "p16");
}

#[tokio::test]
async fn premium_space_needs_premium_plan() {
    let h = Harness::new().await;
    let fx = h.fixtures();
    fx.plan("std", "Explorer", 8, AccessTier::Standard).await.unwrap();
    fx.plan("pre", "Executive", 8, AccessTier::Premium).await.unwrap();
    fx.space("vip", "Lounge", AccessTier::Premium).await.unwrap();
    let partner = fx.partner("host", "host@lounge.ng", "vip").await.unwrap();
    fx.subscriber("u1", "ada@example.com").await.unwrap();
    fx.subscriber("u2", "bo@example.com").await.unwrap();
    fx.subscription("s1", SubscriptionOwner::Principal("u1".into()), "std", jan(1))
        .await
        .unwrap();
    fx.subscription("s2", SubscriptionOwner::Principal("u2".into()), "pre", jan(1))
        .await
        .unwrap();

    let standard = issue_token(&h.ctx, "u1").await.unwrap();
    let err = redeem(&h.ctx, &partner, &standard.code, "vip").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::TierMismatch);

    let premium = issue_token(&h.ctx, "u2").await.unwrap();
    assert!(redeem(&h.ctx, &partner, &premium.code, "vip").await.is_ok());
}
