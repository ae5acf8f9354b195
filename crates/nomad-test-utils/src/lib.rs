// nomad-test-utils
//
// Shared test infrastructure:
// - `FakeGateway`, a scripted payment gateway that records what it was asked
// - `RecordingNotifier`, a notifier that keeps every message it was handed
// - `Fixtures`, seed helpers that write models straight through an adapter

pub mod fixtures;
pub mod gateway;
pub mod notifier;

pub use fixtures::{fixed_time, Fixtures};
pub use gateway::{random_reference, success_transaction, FakeGateway};
pub use notifier::RecordingNotifier;
