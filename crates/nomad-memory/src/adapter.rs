// In-memory storage adapter: HashMap-based store implementing the core Adapter trait.
//
// Records live in `HashMap<String, Vec<serde_json::Value>>` keyed by model name,
// behind a single `tokio::sync::Mutex`. A transaction takes that lock as an
// owned guard and holds it until commit, rollback or drop, so transactions are
// serialized against each other and against plain adapter calls.
//
// Unique fields registered through `create_schema` are enforced on every write.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};

use nomad_core::db::adapter::{
    Adapter, AdapterResult, Connector, FindManyQuery, Operator, SchemaStatus, SortDirection,
    TransactionAdapter, WhereClause,
};
use nomad_core::db::schema::NomadSchema;
use nomad_core::error::NomadError;

#[derive(Debug, Default, Clone)]
struct Store {
    tables: HashMap<String, Vec<Value>>,
    /// model -> unique field names (excluding `id`, which is always unique).
    unique: HashMap<String, Vec<String>>,
}

/// In-memory storage adapter. Data is lost when the last clone is dropped.
#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
    store: Arc<Mutex<Store>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an adapter with the schema's unique constraints already registered.
    pub fn with_schema(schema: &NomadSchema) -> Self {
        let mut store = Store::default();
        store.register(schema);
        Self { store: Arc::new(Mutex::new(store)) }
    }

    /// Copy of every table (for debugging/testing).
    pub async fn snapshot(&self) -> HashMap<String, Vec<Value>> {
        self.store.lock().await.tables.clone()
    }

    /// Record count for a specific model.
    pub async fn model_count(&self, model: &str) -> usize {
        self.store.lock().await.tables.get(model).map_or(0, Vec::len)
    }
}

// ─── Matching ────────────────────────────────────────────────────

/// Check if a record matches a set of WHERE clauses, evaluated left to right.
fn matches_where(record: &Value, clauses: &[WhereClause]) -> bool {
    let mut result = true;
    let mut pending_or = false;

    for clause in clauses {
        let field_val = record.get(&clause.field).unwrap_or(&Value::Null);
        let clause_match = match_operator(field_val, &clause.value, clause.operator);

        result = if pending_or { result || clause_match } else { result && clause_match };
        pending_or = matches!(clause.connector, Some(Connector::Or));
    }

    result
}

fn match_operator(field_val: &Value, target: &Value, op: Operator) -> bool {
    match op {
        Operator::Eq => field_val == target,
        Operator::Ne => field_val != target,
        Operator::Lt => compare_json(field_val, target) == Some(Ordering::Less),
        Operator::Lte => matches!(compare_json(field_val, target), Some(Ordering::Less | Ordering::Equal)),
        Operator::Gt => compare_json(field_val, target) == Some(Ordering::Greater),
        Operator::Gte => matches!(compare_json(field_val, target), Some(Ordering::Greater | Ordering::Equal)),
        Operator::In => target.as_array().is_some_and(|arr| arr.contains(field_val)),
    }
}

/// Order two JSON values. Strings that both parse as RFC 3339 timestamps are
/// compared as instants, since serialized precision varies between writers.
fn compare_json(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(an), Value::Number(bn)) => an.as_f64()?.partial_cmp(&bn.as_f64()?),
        (Value::String(a_s), Value::String(b_s)) => {
            match (
                DateTime::parse_from_rfc3339(a_s).map(|d| d.with_timezone(&Utc)),
                DateTime::parse_from_rfc3339(b_s).map(|d| d.with_timezone(&Utc)),
            ) {
                (Ok(ad), Ok(bd)) => Some(ad.cmp(&bd)),
                _ => Some(a_s.cmp(b_s)),
            }
        }
        (Value::Bool(ab), Value::Bool(bb)) => Some(ab.cmp(bb)),
        _ => None,
    }
}

fn sort_records(records: &mut [Value], query: &FindManyQuery) {
    if let Some(ref sort) = query.sort_by {
        records.sort_by(|a, b| {
            let av = a.get(&sort.field).unwrap_or(&Value::Null);
            let bv = b.get(&sort.field).unwrap_or(&Value::Null);
            let cmp = match (av.is_null(), bv.is_null()) {
                (false, false) => compare_json(av, bv).unwrap_or(Ordering::Equal),
                (false, true) => Ordering::Greater,
                (true, false) => Ordering::Less,
                (true, true) => Ordering::Equal,
            };
            match sort.direction {
                SortDirection::Asc => cmp,
                SortDirection::Desc => cmp.reverse(),
            }
        });
    }
}

/// Merge update data into an existing record.
fn merge_update(record: &mut Value, data: &Value) {
    if let (Some(rec_obj), Some(data_obj)) = (record.as_object_mut(), data.as_object()) {
        for (k, v) in data_obj {
            rec_obj.insert(k.clone(), v.clone());
        }
    }
}

// ─── Store operations ────────────────────────────────────────────

impl Store {
    fn register(&mut self, schema: &NomadSchema) -> Vec<String> {
        let mut created = Vec::new();
        for table in &schema.tables {
            if !self.tables.contains_key(&table.name) {
                self.tables.insert(table.name.clone(), Vec::new());
                created.push(table.name.clone());
            }
            let fields: Vec<String> = table
                .unique_fields()
                .filter(|f| *f != "id")
                .map(str::to_string)
                .collect();
            self.unique.insert(table.name.clone(), fields);
        }
        created
    }

    fn unique_fields(&self, model: &str) -> Vec<String> {
        let mut fields = vec!["id".to_string()];
        if let Some(extra) = self.unique.get(model) {
            fields.extend(extra.iter().cloned());
        }
        fields
    }

    /// Fail if `candidate` collides with any record in `records` other than
    /// the one at `skip`. Null values never collide.
    fn check_unique(
        fields: &[String],
        model: &str,
        records: &[Value],
        candidate: &Value,
        skip: Option<usize>,
    ) -> AdapterResult<()> {
        for field in fields {
            let value = match candidate.get(field) {
                Some(v) if !v.is_null() => v,
                _ => continue,
            };
            let clash = records
                .iter()
                .enumerate()
                .any(|(i, r)| Some(i) != skip && r.get(field) == Some(value));
            if clash {
                return Err(NomadError::UniqueViolation {
                    model: model.to_string(),
                    field: field.clone(),
                });
            }
        }
        Ok(())
    }

    fn create(&mut self, model: &str, data: Value) -> AdapterResult<Value> {
        let mut record = data;
        let obj = record
            .as_object_mut()
            .ok_or_else(|| NomadError::Database(format!("{model}: record must be a JSON object")))?;
        if obj.get("id").map_or(true, Value::is_null) {
            obj.insert("id".to_string(), Value::String(uuid::Uuid::new_v4().to_string()));
        }

        let fields = self.unique_fields(model);
        let records = self.tables.entry(model.to_string()).or_default();
        Self::check_unique(&fields, model, records, &record, None)?;
        records.push(record.clone());
        Ok(record)
    }

    fn find_one(&self, model: &str, where_clauses: &[WhereClause]) -> Option<Value> {
        self.tables
            .get(model)
            .and_then(|recs| recs.iter().find(|r| matches_where(r, where_clauses)).cloned())
    }

    fn find_many(&self, model: &str, query: &FindManyQuery) -> Vec<Value> {
        let mut result: Vec<Value> = self
            .tables
            .get(model)
            .map(|recs| recs.iter().filter(|r| matches_where(r, &query.where_clauses)).cloned().collect())
            .unwrap_or_default();

        sort_records(&mut result, query);

        let offset = query.offset.unwrap_or(0).max(0) as usize;
        let iter = result.into_iter().skip(offset);
        match query.limit {
            Some(limit) => iter.take(limit.max(0) as usize).collect(),
            None => iter.collect(),
        }
    }

    fn count(&self, model: &str, where_clauses: &[WhereClause]) -> i64 {
        self.tables
            .get(model)
            .map_or(0, |recs| recs.iter().filter(|r| matches_where(r, where_clauses)).count()) as i64
    }

    fn update(&mut self, model: &str, where_clauses: &[WhereClause], data: &Value) -> AdapterResult<Option<Value>> {
        let fields = self.unique_fields(model);
        let Some(recs) = self.tables.get_mut(model) else {
            return Ok(None);
        };
        let Some(idx) = recs.iter().position(|r| matches_where(r, where_clauses)) else {
            return Ok(None);
        };
        let mut candidate = recs[idx].clone();
        merge_update(&mut candidate, data);
        Self::check_unique(&fields, model, recs, &candidate, Some(idx))?;
        recs[idx] = candidate.clone();
        Ok(Some(candidate))
    }

    /// All-or-nothing: a uniqueness failure leaves the table untouched.
    fn update_many(&mut self, model: &str, where_clauses: &[WhereClause], data: &Value) -> AdapterResult<i64> {
        let fields = self.unique_fields(model);
        let Some(recs) = self.tables.get_mut(model) else {
            return Ok(0);
        };
        let mut working = recs.clone();
        let mut count = 0i64;
        for idx in 0..working.len() {
            if matches_where(&working[idx], where_clauses) {
                let mut candidate = working[idx].clone();
                merge_update(&mut candidate, data);
                Self::check_unique(&fields, model, &working, &candidate, Some(idx))?;
                working[idx] = candidate;
                count += 1;
            }
        }
        *recs = working;
        Ok(count)
    }

    fn delete(&mut self, model: &str, where_clauses: &[WhereClause]) -> bool {
        let Some(recs) = self.tables.get_mut(model) else {
            return false;
        };
        match recs.iter().position(|r| matches_where(r, where_clauses)) {
            Some(pos) => {
                recs.remove(pos);
                true
            }
            None => false,
        }
    }

    fn delete_many(&mut self, model: &str, where_clauses: &[WhereClause]) -> i64 {
        let Some(recs) = self.tables.get_mut(model) else {
            return 0;
        };
        let before = recs.len();
        recs.retain(|r| !matches_where(r, where_clauses));
        (before - recs.len()) as i64
    }

    fn schema_status(created: Vec<String>) -> SchemaStatus {
        if created.is_empty() {
            SchemaStatus::UpToDate
        } else {
            SchemaStatus::Created { tables: created }
        }
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn create(&self, model: &str, data: Value) -> AdapterResult<Value> {
        self.store.lock().await.create(model, data)
    }

    async fn find_one(&self, model: &str, where_clauses: &[WhereClause]) -> AdapterResult<Option<Value>> {
        Ok(self.store.lock().await.find_one(model, where_clauses))
    }

    async fn find_many(&self, model: &str, query: FindManyQuery) -> AdapterResult<Vec<Value>> {
        Ok(self.store.lock().await.find_many(model, &query))
    }

    async fn count(&self, model: &str, where_clauses: &[WhereClause]) -> AdapterResult<i64> {
        Ok(self.store.lock().await.count(model, where_clauses))
    }

    async fn update(&self, model: &str, where_clauses: &[WhereClause], data: Value) -> AdapterResult<Option<Value>> {
        self.store.lock().await.update(model, where_clauses, &data)
    }

    async fn update_many(&self, model: &str, where_clauses: &[WhereClause], data: Value) -> AdapterResult<i64> {
        self.store.lock().await.update_many(model, where_clauses, &data)
    }

    async fn delete(&self, model: &str, where_clauses: &[WhereClause]) -> AdapterResult<bool> {
        Ok(self.store.lock().await.delete(model, where_clauses))
    }

    async fn delete_many(&self, model: &str, where_clauses: &[WhereClause]) -> AdapterResult<i64> {
        Ok(self.store.lock().await.delete_many(model, where_clauses))
    }

    async fn create_schema(&self, schema: &NomadSchema) -> AdapterResult<SchemaStatus> {
        let created = self.store.lock().await.register(schema);
        Ok(Store::schema_status(created))
    }

    async fn begin_transaction(&self) -> AdapterResult<Box<dyn TransactionAdapter>> {
        let guard = self.store.clone().lock_owned().await;
        let backup = Store::clone(&guard);
        Ok(Box::new(MemoryTransactionAdapter {
            guard: Mutex::new(guard),
            backup: Some(backup),
        }))
    }
}

// ─── Transaction Adapter ─────────────────────────────────────────

/// In-memory transaction.
///
/// Holds the store lock for its whole lifetime and writes in place. A copy
/// taken at the start is restored on rollback, or on drop without commit.
struct MemoryTransactionAdapter {
    guard: Mutex<OwnedMutexGuard<Store>>,
    backup: Option<Store>,
}

impl std::fmt::Debug for MemoryTransactionAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransactionAdapter")
            .field("open", &self.backup.is_some())
            .finish()
    }
}

impl Drop for MemoryTransactionAdapter {
    fn drop(&mut self) {
        if let Some(backup) = self.backup.take() {
            tracing::debug!("memory transaction dropped without commit, rolling back");
            **self.guard.get_mut() = backup;
        }
    }
}

#[async_trait]
impl Adapter for MemoryTransactionAdapter {
    async fn create(&self, model: &str, data: Value) -> AdapterResult<Value> {
        self.guard.lock().await.create(model, data)
    }

    async fn find_one(&self, model: &str, where_clauses: &[WhereClause]) -> AdapterResult<Option<Value>> {
        Ok(self.guard.lock().await.find_one(model, where_clauses))
    }

    async fn find_many(&self, model: &str, query: FindManyQuery) -> AdapterResult<Vec<Value>> {
        Ok(self.guard.lock().await.find_many(model, &query))
    }

    async fn count(&self, model: &str, where_clauses: &[WhereClause]) -> AdapterResult<i64> {
        Ok(self.guard.lock().await.count(model, where_clauses))
    }

    async fn update(&self, model: &str, where_clauses: &[WhereClause], data: Value) -> AdapterResult<Option<Value>> {
        self.guard.lock().await.update(model, where_clauses, &data)
    }

    async fn update_many(&self, model: &str, where_clauses: &[WhereClause], data: Value) -> AdapterResult<i64> {
        self.guard.lock().await.update_many(model, where_clauses, &data)
    }

    async fn delete(&self, model: &str, where_clauses: &[WhereClause]) -> AdapterResult<bool> {
        Ok(self.guard.lock().await.delete(model, where_clauses))
    }

    async fn delete_many(&self, model: &str, where_clauses: &[WhereClause]) -> AdapterResult<i64> {
        Ok(self.guard.lock().await.delete_many(model, where_clauses))
    }

    async fn create_schema(&self, schema: &NomadSchema) -> AdapterResult<SchemaStatus> {
        let created = self.guard.lock().await.register(schema);
        Ok(Store::schema_status(created))
    }

    async fn begin_transaction(&self) -> AdapterResult<Box<dyn TransactionAdapter>> {
        Err(NomadError::Other("Nested transactions are not supported in the memory adapter".into()))
    }
}

#[async_trait]
impl TransactionAdapter for MemoryTransactionAdapter {
    async fn commit(mut self: Box<Self>) -> AdapterResult<()> {
        self.backup = None;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> AdapterResult<()> {
        if let Some(backup) = self.backup.take() {
            **self.guard.get_mut() = backup;
        }
        Ok(())
    }

    fn as_adapter(&self) -> &dyn Adapter {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nomad_core::db::adapter::SortBy;
    use nomad_core::db::schema::tables;
    use serde_json::json;

    fn schema_adapter() -> MemoryAdapter {
        MemoryAdapter::with_schema(&NomadSchema::default())
    }

    #[tokio::test]
    async fn test_create_and_find_one() {
        let adapter = MemoryAdapter::new();
        adapter.create("plan", json!({"id": "p1", "name": "Nomad"})).await.unwrap();

        let found = adapter.find_one("plan", &[WhereClause::eq("id", "p1")]).await.unwrap();
        assert_eq!(found.unwrap()["name"], "Nomad");
    }

    #[tokio::test]
    async fn test_create_auto_id() {
        let adapter = MemoryAdapter::new();
        let created = adapter.create("plan", json!({"name": "Flex"})).await.unwrap();
        assert!(created["id"].is_string());
    }

    #[tokio::test]
    async fn test_create_rejects_non_object() {
        let adapter = MemoryAdapter::new();
        let err = adapter.create("plan", json!([1, 2])).await.unwrap_err();
        assert!(matches!(err, NomadError::Database(_)));
    }

    #[tokio::test]
    async fn test_missing_field_matches_null() {
        let adapter = MemoryAdapter::new();
        adapter.create("principal", json!({"id": "u1"})).await.unwrap();
        let found = adapter
            .find_one("principal", &[WhereClause::eq("teamId", Value::Null)])
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_or_connector() {
        let adapter = MemoryAdapter::new();
        adapter.create("space", json!({"id": "s1", "tier": "STANDARD"})).await.unwrap();
        adapter.create("space", json!({"id": "s2", "tier": "PREMIUM"})).await.unwrap();
        adapter.create("space", json!({"id": "s3", "tier": "OTHER"})).await.unwrap();
        let n = adapter
            .count(
                "space",
                &[WhereClause::eq("tier", "STANDARD").or(), WhereClause::eq("tier", "PREMIUM")],
            )
            .await
            .unwrap();
        assert_eq!(n, 2);
    }

    #[tokio::test]
    async fn test_find_many_sorted_limited() {
        let adapter = MemoryAdapter::new();
        for (id, price) in [("a", 3), ("b", 1), ("c", 2)] {
            adapter.create("plan", json!({"id": id, "price": price})).await.unwrap();
        }
        let result = adapter
            .find_many("plan", FindManyQuery::default().sorted(SortBy::asc("price")).limited(2))
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0]["id"], "b");
        assert_eq!(result[1]["id"], "c");

        let q = FindManyQuery { offset: Some(2), ..Default::default() }.sorted(SortBy::asc("price"));
        let rest = adapter.find_many("plan", q).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0]["id"], "a");
    }

    #[tokio::test]
    async fn test_timestamps_compare_as_instants() {
        let adapter = MemoryAdapter::new();
        adapter.create("checkIn", json!({"id": "1", "timestamp": "2024-01-01T10:00:00.5Z"})).await.unwrap();
        adapter.create("checkIn", json!({"id": "2", "timestamp": "2024-01-01T10:00:01Z"})).await.unwrap();
        let rows = adapter
            .find_many("checkIn", FindManyQuery::default().sorted(SortBy::desc("timestamp")))
            .await
            .unwrap();
        assert_eq!(rows[0]["id"], "2");

        let n = adapter
            .count("checkIn", &[WhereClause::gte("timestamp", "2024-01-01T10:00:00+00:00")])
            .await
            .unwrap();
        assert_eq!(n, 2);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let adapter = MemoryAdapter::new();
        adapter.create("subscription", json!({"id": "s1", "isActive": true})).await.unwrap();
        adapter.create("subscription", json!({"id": "s2", "isActive": true})).await.unwrap();

        let updated = adapter
            .update("subscription", &[WhereClause::eq("id", "s1")], json!({"isActive": false}))
            .await
            .unwrap();
        assert_eq!(updated.unwrap()["isActive"], false);
        assert!(adapter
            .update("subscription", &[WhereClause::eq("id", "nope")], json!({}))
            .await
            .unwrap()
            .is_none());

        let n = adapter
            .update_many("subscription", &[WhereClause::eq("isActive", true)], json!({"isActive": false}))
            .await
            .unwrap();
        assert_eq!(n, 1);

        assert!(adapter.delete("subscription", &[WhereClause::eq("id", "s1")]).await.unwrap());
        assert!(!adapter.delete("subscription", &[WhereClause::eq("id", "s1")]).await.unwrap());
        assert_eq!(adapter.delete_many("subscription", &[]).await.unwrap(), 1);
        assert_eq!(adapter.model_count("subscription").await, 0);
    }

    #[tokio::test]
    async fn test_unique_fields_enforced_on_create() {
        let adapter = schema_adapter();
        adapter
            .create(tables::SUBSCRIPTION, json!({"id": "s1", "paymentReference": "ref-1"}))
            .await
            .unwrap();
        let err = adapter
            .create(tables::SUBSCRIPTION, json!({"id": "s2", "paymentReference": "ref-1"}))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation(tables::SUBSCRIPTION, "paymentReference"));

        // Nulls never collide.
        adapter
            .create(tables::SUBSCRIPTION, json!({"id": "s3", "paymentReference": null}))
            .await
            .unwrap();
        adapter
            .create(tables::SUBSCRIPTION, json!({"id": "s4", "paymentReference": null}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let adapter = MemoryAdapter::new();
        adapter.create("plan", json!({"id": "p1"})).await.unwrap();
        let err = adapter.create("plan", json!({"id": "p1"})).await.unwrap_err();
        assert!(err.is_unique_violation("plan", "id"));
    }

    #[tokio::test]
    async fn test_unique_fields_enforced_on_update() {
        let adapter = schema_adapter();
        adapter.create(tables::CHECK_IN_TOKEN, json!({"id": "t1", "principalId": "u1", "code": "111111"})).await.unwrap();
        adapter.create(tables::CHECK_IN_TOKEN, json!({"id": "t2", "principalId": "u2", "code": "222222"})).await.unwrap();
        let err = adapter
            .update(tables::CHECK_IN_TOKEN, &[WhereClause::eq("id", "t2")], json!({"code": "111111"}))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation(tables::CHECK_IN_TOKEN, "code"));

        // Rewriting a record with its own value is not a collision.
        adapter
            .update(tables::CHECK_IN_TOKEN, &[WhereClause::eq("id", "t1")], json!({"code": "111111"}))
            .await
            .unwrap();

        let err = adapter
            .update_many(tables::CHECK_IN_TOKEN, &[], json!({"code": "333333"}))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation(tables::CHECK_IN_TOKEN, "code"));
        let t1 = adapter.find_one(tables::CHECK_IN_TOKEN, &[WhereClause::eq("id", "t1")]).await.unwrap().unwrap();
        assert_eq!(t1["code"], "111111");
    }

    #[tokio::test]
    async fn test_schema_registration_status() {
        let adapter = MemoryAdapter::new();
        let first = adapter.create_schema(&NomadSchema::default()).await.unwrap();
        assert!(matches!(first, SchemaStatus::Created { .. }));
        let second = adapter.create_schema(&NomadSchema::default()).await.unwrap();
        assert_eq!(second, SchemaStatus::UpToDate);
    }

    #[tokio::test]
    async fn test_transaction_commit() {
        let adapter = MemoryAdapter::new();
        let tx = adapter.begin_transaction().await.unwrap();
        tx.create("plan", json!({"id": "p1"})).await.unwrap();
        assert_eq!(tx.count("plan", &[]).await.unwrap(), 1);
        tx.commit().await.unwrap();
        assert_eq!(adapter.model_count("plan").await, 1);
    }

    #[tokio::test]
    async fn test_transaction_rollback() {
        let adapter = MemoryAdapter::new();
        adapter.create("plan", json!({"id": "p0"})).await.unwrap();
        let tx = adapter.begin_transaction().await.unwrap();
        tx.create("plan", json!({"id": "p1"})).await.unwrap();
        tx.delete("plan", &[WhereClause::eq("id", "p0")]).await.unwrap();
        tx.rollback().await.unwrap();

        let snapshot = adapter.snapshot().await;
        assert_eq!(snapshot["plan"].len(), 1);
        assert_eq!(snapshot["plan"][0]["id"], "p0");
    }

    #[tokio::test]
    async fn test_transaction_drop_rolls_back() {
        let adapter = MemoryAdapter::new();
        {
            let tx = adapter.begin_transaction().await.unwrap();
            tx.create("plan", json!({"id": "p1"})).await.unwrap();
        }
        assert_eq!(adapter.model_count("plan").await, 0);
    }

    #[tokio::test]
    async fn test_nested_transaction_rejected() {
        let adapter = MemoryAdapter::new();
        let tx = adapter.begin_transaction().await.unwrap();
        assert!(tx.begin_transaction().await.is_err());
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_transactions_serialize() {
        let adapter = MemoryAdapter::with_schema(&NomadSchema::default());
        let mut handles = Vec::new();
        for i in 0..8 {
            let adapter = adapter.clone();
            handles.push(tokio::spawn(async move {
                let tx = adapter.begin_transaction().await.unwrap();
                let existing = tx.count("counter", &[]).await.unwrap();
                tokio::task::yield_now().await;
                tx.create("counter", json!({"id": format!("c{existing}"), "by": i})).await.unwrap();
                tx.commit().await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        // Each transaction saw every earlier commit, so no id was reused.
        assert_eq!(adapter.model_count("counter").await, 8);
    }
}
