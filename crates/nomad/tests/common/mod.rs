// Shared harness for the integration suites.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use nomad::NomadContext;
use nomad_core::db::adapter::Adapter;
use nomad_core::db::models::{AccessTier, Principal, SubscriptionOwner};
use nomad_core::utils::time::ManualClock;
use nomad_memory::MemoryAdapter;
use nomad_paystack::PaystackOptions;
use nomad_test_utils::{fixed_time, FakeGateway, Fixtures, RecordingNotifier};

pub struct Harness {
    pub ctx: Arc<NomadContext>,
    pub db: Arc<MemoryAdapter>,
    pub clock: Arc<ManualClock>,
    pub gateway: Arc<FakeGateway>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub async fn new() -> Self {
        nomad_core::env::init_logger();
        let db = Arc::new(MemoryAdapter::new());
        let clock = Arc::new(ManualClock::new(fixed_time()));
        let gateway = Arc::new(FakeGateway::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = NomadContext::builder(db.clone(), gateway.clone())
            .paystack(PaystackOptions::new("sk_test_nomad"))
            .notifier(notifier.clone())
            .clock(clock.clone())
            .build()
            .await
            .unwrap();
        Self { ctx, db, clock, gateway, notifier }
    }

    pub fn fixtures(&self) -> Fixtures<'_> {
        Fixtures::new(self.db.as_ref() as &dyn Adapter)
    }

    /// Plan `p8` (8 days, STANDARD), space `sp` managed by `host`, and
    /// subscriber `u1` on `p8` since Jan 1.
    pub async fn standard_member(&self) -> Principal {
        let fx = self.fixtures();
        fx.plan("p8", "Explorer", 8, AccessTier::Standard).await.unwrap();
        fx.space("sp", "Hub", AccessTier::Standard).await.unwrap();
        let partner = fx.partner("host", "host@hub.ng", "sp").await.unwrap();
        fx.subscriber("u1", "ada@example.com").await.unwrap();
        fx.subscription("s1", SubscriptionOwner::Principal("u1".into()), "p8", jan(1))
            .await
            .unwrap();
        partner
    }

    pub async fn active_subscriptions(&self, principal_id: &str) -> usize {
        self.ctx
            .store()
            .active_subscriptions(&SubscriptionOwner::Principal(principal_id.into()))
            .await
            .unwrap()
            .len()
    }
}

pub fn jan(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

pub fn at(d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap()
}
