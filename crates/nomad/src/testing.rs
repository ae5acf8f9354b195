// In-crate test context over the memory adapter, a manual clock and a fake gateway.

use std::sync::Arc;

use nomad_core::db::adapter::Adapter;
use nomad_core::notify::Notifier;
use nomad_core::utils::time::ManualClock;
use nomad_memory::MemoryAdapter;
use nomad_paystack::PaystackOptions;
use nomad_test_utils::{fixed_time, FakeGateway, Fixtures};

use crate::context::NomadContext;

pub(crate) struct TestEnv {
    pub db: Arc<MemoryAdapter>,
    pub clock: Arc<ManualClock>,
    pub gateway: Arc<FakeGateway>,
}

impl TestEnv {
    pub fn fixtures(&self) -> Fixtures<'_> {
        Fixtures::new(self.db.as_ref() as &dyn Adapter)
    }
}

async fn build(notifier: Option<Arc<dyn Notifier>>) -> (Arc<NomadContext>, TestEnv) {
    let db = Arc::new(MemoryAdapter::new());
    let clock = Arc::new(ManualClock::new(fixed_time()));
    let gateway = Arc::new(FakeGateway::new());
    let mut builder = NomadContext::builder(db.clone(), gateway.clone())
        .paystack(PaystackOptions::new("sk_test_nomad"))
        .clock(clock.clone());
    if let Some(notifier) = notifier {
        builder = builder.notifier(notifier);
    }
    let ctx = builder.build().await.unwrap();
    (ctx, TestEnv { db, clock, gateway })
}

pub(crate) async fn test_context() -> (Arc<NomadContext>, TestEnv) {
    build(None).await
}

pub(crate) async fn test_context_with_notifier(notifier: Arc<dyn Notifier>) -> (Arc<NomadContext>, TestEnv) {
    build(Some(notifier)).await
}
