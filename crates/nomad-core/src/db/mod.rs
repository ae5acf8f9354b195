pub mod adapter;
pub mod models;
pub mod schema;

pub use adapter::{
    Adapter, AdapterResult, Connector, FindManyQuery, Operator, SchemaStatus, SortBy,
    SortDirection, TransactionAdapter, WhereClause,
};
pub use models::{
    AccessTier, CheckIn, CheckInToken, DaysAllowed, Invitation, InvitationStatus, PartnerSpace,
    Plan, Principal, Role, Subscription, SubscriptionOwner, Team,
};
pub use schema::{tables, FieldType, NomadSchema, SchemaField, TableSchema};
