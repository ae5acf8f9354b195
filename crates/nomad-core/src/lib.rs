//! Core types for the Nomad coworking membership platform: error taxonomy,
//! configuration, storage adapter trait and schema, persistent models,
//! clocks, and the notification collaborator.

pub mod db;
pub mod env;
pub mod error;
pub mod notify;
pub mod options;
pub mod utils;

// Re-exports for convenience
pub use db::adapter::{Adapter, TransactionAdapter};
pub use db::schema::NomadSchema;
pub use error::{ApiError, ErrorCategory, ErrorCode, HttpStatus, NomadError, Result};
pub use notify::{Notification, NotificationDispatcher, NotificationKind, Notifier};
pub use options::NomadOptions;
pub use utils::time::{Clock, ManualClock, SystemClock};
