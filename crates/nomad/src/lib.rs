// nomad: the membership core
//
// Wires the plan catalog, entitlement ledger, check-in tokens, redemption
// and payment reconciliation over a storage adapter. Teams, provisioning and
// reports sit on top of the same ledger.

pub mod catalog;
pub mod checkin;
pub mod context;
pub mod internal_adapter;
pub mod ledger;
pub mod profile;
pub mod provisioning;
pub mod reconciliation;
pub mod reports;
pub mod teams;
pub mod transaction;

#[cfg(test)]
mod testing;

pub use checkin::code::{CodeSource, RandomCodeSource, ScriptedCodeSource};
pub use checkin::redemption::{redeem, RedemptionResult};
pub use checkin::token::{issue_token, sweep_expired_tokens, IssuedToken};
pub use context::{NomadContext, NomadContextBuilder};
pub use ledger::{quota_status, Entitlement, Ledger, QuotaStatus, QuotaUsage};
pub use profile::{get_profile, ProfileView};
pub use provisioning::{provision_partner, provision_subscriber, PartnerApplication, ProvisionedPartner};
pub use reconciliation::{PaymentInit, Reconciliation, VerificationResult, VerificationStatus, WebhookOutcome};
pub use teams::{TeamSetup, TeamSignup};
pub use transaction::{Decision, TransactionScope};
