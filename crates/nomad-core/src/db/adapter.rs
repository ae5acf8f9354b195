// Storage adapter trait: the abstraction every persistence backend implements.
//
// Records are schema-agnostic `serde_json::Value` objects keyed by model name.
// The typed layer in the `nomad` crate converts between models and values.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db::schema::NomadSchema;
use crate::error::NomadError;

/// Result type for adapter operations.
pub type AdapterResult<T> = std::result::Result<T, NomadError>;

// ─── Where Clause ────────────────────────────────────────────────

/// Comparison operators for WHERE clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    #[default]
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    /// Value is in the given list.
    In,
}

/// A single WHERE condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhereClause {
    pub field: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub operator: Operator,
    /// Connector to the next clause. None means this is the last/only clause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector: Option<Connector>,
}

/// Logical connector between WHERE clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Connector {
    And,
    Or,
}

impl WhereClause {
    fn with_op(field: impl Into<String>, value: impl Into<serde_json::Value>, operator: Operator) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            operator,
            connector: None,
        }
    }

    /// Simple equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::with_op(field, value, Operator::Eq)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::with_op(field, value, Operator::Ne)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::with_op(field, value, Operator::Lt)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::with_op(field, value, Operator::Gte)
    }

    pub fn is_in(field: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        Self::with_op(field, serde_json::Value::Array(values), Operator::In)
    }

    /// Add an AND connector.
    pub fn and(mut self) -> Self {
        self.connector = Some(Connector::And);
        self
    }

    /// Add an OR connector.
    pub fn or(mut self) -> Self {
        self.connector = Some(Connector::Or);
        self
    }
}

// ─── Sort / Pagination ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortBy {
    pub field: String,
    pub direction: SortDirection,
}

impl SortBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Desc }
    }
}

/// Query parameters for `find_many`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindManyQuery {
    pub where_clauses: Vec<WhereClause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
}

impl FindManyQuery {
    pub fn filter(where_clauses: Vec<WhereClause>) -> Self {
        Self { where_clauses, ..Default::default() }
    }

    pub fn sorted(mut self, sort_by: SortBy) -> Self {
        self.sort_by = Some(sort_by);
        self
    }

    pub fn limited(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

// ─── Schema status ───────────────────────────────────────────────

/// Result of registering a schema with a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaStatus {
    UpToDate,
    /// Tables or constraints were created.
    Created { tables: Vec<String> },
}

// ─── Adapter Trait ───────────────────────────────────────────────

/// The storage adapter trait.
///
/// Implementations MUST enforce the unique fields declared by the schema
/// passed to [`Adapter::create_schema`], reporting a violation as
/// [`NomadError::UniqueViolation`] from `create`, `update` and `update_many`.
#[async_trait]
pub trait Adapter: Send + Sync + fmt::Debug {
    /// Create a new record. Returns the stored record.
    async fn create(&self, model: &str, data: serde_json::Value)
        -> AdapterResult<serde_json::Value>;

    async fn find_one(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
    ) -> AdapterResult<Option<serde_json::Value>>;

    async fn find_many(
        &self,
        model: &str,
        query: FindManyQuery,
    ) -> AdapterResult<Vec<serde_json::Value>>;

    async fn count(&self, model: &str, where_clauses: &[WhereClause]) -> AdapterResult<i64>;

    /// Update the first matching record with the fields in `data`.
    /// Returns the updated record, or `None` if nothing matched.
    async fn update(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
        data: serde_json::Value,
    ) -> AdapterResult<Option<serde_json::Value>>;

    /// Returns the number of affected rows.
    async fn update_many(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
        data: serde_json::Value,
    ) -> AdapterResult<i64>;

    /// Delete the first matching record. Returns whether one was removed.
    async fn delete(&self, model: &str, where_clauses: &[WhereClause]) -> AdapterResult<bool>;

    /// Returns the number of deleted rows.
    async fn delete_many(&self, model: &str, where_clauses: &[WhereClause]) -> AdapterResult<i64>;

    /// Register the tables and unique constraints.
    async fn create_schema(&self, schema: &NomadSchema) -> AdapterResult<SchemaStatus>;

    /// Begin a serializable transaction.
    async fn begin_transaction(&self) -> AdapterResult<Box<dyn TransactionAdapter>>;
}

/// Extension of [`Adapter`] for transaction contexts.
#[async_trait]
pub trait TransactionAdapter: Adapter {
    async fn commit(self: Box<Self>) -> AdapterResult<()>;

    async fn rollback(self: Box<Self>) -> AdapterResult<()>;

    /// View the transaction as a plain adapter for code written against `&dyn Adapter`.
    fn as_adapter(&self) -> &dyn Adapter;
}
