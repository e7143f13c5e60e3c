use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use pgrule_core::ident::DEFAULT_TABLE_NAME;
use pgrule_core::{AdapterConfig, DatabasePool, PolicyError, Result, TableName};
use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};

use crate::codec;
use crate::filter::{select_statement, Filter};
use crate::matcher;
use crate::model::PolicyModel;
use crate::schema;
use crate::store::{PgStore, RelationalStore, Statement};

/// Sections written back by `save_policy`.
const SAVED_SECTIONS: [&str; 2] = ["p", "g"];

/// Storage contract called by the policy engine.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Loads every stored rule into `model`.
    async fn load_policy(&self, model: &mut dyn PolicyModel) -> Result<()>;

    /// Loads only the rules matching `filter`.
    async fn load_filtered_policy(&self, model: &mut dyn PolicyModel, filter: &Filter)
        -> Result<()>;

    /// Whether the most recent load was filtered.
    fn is_filtered(&self) -> bool;

    /// Replaces the stored rules with the `p` and `g` sections of `model`.
    async fn save_policy(&self, model: &dyn PolicyModel) -> Result<()>;

    async fn add_policy(&self, sec: &str, ptype: &str, rule: &[String]) -> Result<()>;

    async fn add_policies(&self, sec: &str, ptype: &str, rules: &[Vec<String>]) -> Result<()>;

    async fn remove_policy(&self, sec: &str, ptype: &str, rule: &[String]) -> Result<()>;

    async fn remove_policies(&self, sec: &str, ptype: &str, rules: &[Vec<String>])
        -> Result<()>;

    /// Removes rules whose fields starting at `field_index` equal `field_values`.
    async fn remove_filtered_policy(
        &self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: &[String],
    ) -> Result<()>;
}

/// Adapter persisting rules in a single Postgres table.
///
/// `save_policy` drops and rebuilds the table inside one transaction. Two
/// adapters saving the same table at the same time still race: the last
/// commit wins.
pub struct PgAdapter<S: RelationalStore = PgStore> {
    store: S,
    table: TableName,
    filtered: AtomicBool,
    closed: AtomicBool,
}

impl PgAdapter<PgStore> {
    /// Opens the pool described by `config`, provisioning the database when
    /// asked to, and makes sure the rule table exists.
    pub async fn connect(config: &AdapterConfig) -> Result<Self> {
        let table = config.table()?;
        let pool = DatabasePool::connect(config).await?;
        info!(table = %table, "connected to policy store");
        Self::with_store(PgStore::new(pool), table).await
    }

    /// Reuses an open pool. The table is named `prefix_table_name`; the name
    /// falls back to the default when absent or empty.
    pub async fn from_pool(
        pool: PgPool,
        prefix: Option<&str>,
        table_name: Option<&str>,
    ) -> Result<Self> {
        let name = table_name
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_TABLE_NAME);
        let table = TableName::new(prefix, name)?;
        Self::with_store(PgStore::new(DatabasePool::from_pool(pool)), table).await
    }
}

impl<S: RelationalStore> PgAdapter<S> {
    /// Wraps any store and ensures the rule table exists.
    pub async fn with_store(store: S, table: TableName) -> Result<Self> {
        let adapter = Self {
            store,
            table,
            filtered: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        };
        adapter.ensure_table().await?;
        Ok(adapter)
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn ensure_table(&self) -> Result<()> {
        for statement in schema::create_table(&self.table) {
            self.store
                .execute(&statement)
                .await
                .map_err(|err| match err {
                    PolicyError::Query(source) => PolicyError::schema(source),
                    other => other,
                })?;
        }
        debug!(table = %self.table, "rule table ready");
        Ok(())
    }

    /// Parses a loosely typed filter and loads the rules it selects.
    pub async fn load_filtered_policy_value(
        &self,
        model: &mut dyn PolicyModel,
        filter: &serde_json::Value,
    ) -> Result<()> {
        let filter = Filter::try_from(filter)?;
        self.load_filtered_policy(model, &filter).await
    }

    /// Releases the store. Later calls are no-ops and every other operation
    /// fails with `PolicyError::Closed`.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.store.close().await;
        info!(table = %self.table, "policy adapter closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(PolicyError::Closed);
        }
        Ok(())
    }

    async fn load_rows(&self, model: &mut dyn PolicyModel, statement: &Statement) -> Result<usize> {
        let rows = self.store.query(statement).await?;
        let mut loaded = 0;
        for row in &rows {
            let line = codec::decode(row);
            if line.is_empty() {
                warn!(id = row.id, "skipping rule row without a type");
                continue;
            }
            if model.load_rule(line)? {
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    async fn insert<R: AsRef<str> + Sync>(&self, ptype: &str, rule: &[R]) -> Result<()> {
        let statement = codec::insert_statement(&self.table, ptype, rule)?;
        self.store
            .execute(&statement)
            .await
            .map_err(|err| match err {
                PolicyError::DuplicateRule(_) => {
                    let mut line = vec![ptype];
                    line.extend(rule.iter().map(|field| field.as_ref()));
                    PolicyError::DuplicateRule(codec::rule_line(&line))
                }
                other => other,
            })?;
        Ok(())
    }

    async fn delete(&self, ptype: &str, fields: &[Option<String>]) -> Result<u64> {
        let statement = matcher::delete_statement(&self.table, ptype, fields);
        let removed = self.store.execute(&statement).await?;
        debug!(table = %self.table, ptype, removed, "deleted rules");
        Ok(removed)
    }
}

#[async_trait]
impl<S: RelationalStore> Adapter for PgAdapter<S> {
    #[instrument(skip_all)]
    async fn load_policy(&self, model: &mut dyn PolicyModel) -> Result<()> {
        self.ensure_open()?;
        let statement = select_statement(&self.table, &Filter::default());
        let loaded = self.load_rows(model, &statement).await?;
        self.filtered.store(false, Ordering::SeqCst);
        info!(table = %self.table, loaded, "loaded policy");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn load_filtered_policy(
        &self,
        model: &mut dyn PolicyModel,
        filter: &Filter,
    ) -> Result<()> {
        self.ensure_open()?;
        self.filtered.store(true, Ordering::SeqCst);
        let statement = select_statement(&self.table, filter);
        let loaded = self.load_rows(model, &statement).await?;
        info!(table = %self.table, loaded, "loaded filtered policy");
        Ok(())
    }

    fn is_filtered(&self) -> bool {
        self.filtered.load(Ordering::SeqCst)
    }

    #[instrument(skip_all)]
    async fn save_policy(&self, model: &dyn PolicyModel) -> Result<()> {
        self.ensure_open()?;
        let mut statements = vec![schema::drop_table(&self.table)];
        statements.extend(schema::create_table(&self.table));

        let mut saved = 0usize;
        for sec in SAVED_SECTIONS {
            for (ptype, rule) in model.section_rules(sec) {
                statements.push(codec::insert_statement(&self.table, &ptype, &rule)?);
                saved += 1;
            }
        }

        self.store.execute_batch(&statements).await?;
        info!(table = %self.table, saved, "saved policy");
        Ok(())
    }

    #[instrument(skip(self, rule))]
    async fn add_policy(&self, sec: &str, ptype: &str, rule: &[String]) -> Result<()> {
        self.ensure_open()?;
        self.insert(ptype, rule).await
    }

    #[instrument(skip(self, rules), fields(count = rules.len()))]
    async fn add_policies(&self, sec: &str, ptype: &str, rules: &[Vec<String>]) -> Result<()> {
        self.ensure_open()?;
        for rule in rules {
            self.insert(ptype, rule).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, rule))]
    async fn remove_policy(&self, sec: &str, ptype: &str, rule: &[String]) -> Result<()> {
        self.ensure_open()?;
        let fields = matcher::rule_fields(rule)?;
        self.delete(ptype, &fields).await?;
        Ok(())
    }

    #[instrument(skip(self, rules), fields(count = rules.len()))]
    async fn remove_policies(
        &self,
        sec: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> Result<()> {
        self.ensure_open()?;
        for rule in rules {
            let fields = matcher::rule_fields(rule)?;
            self.delete(ptype, &fields).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, field_values))]
    async fn remove_filtered_policy(
        &self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: &[String],
    ) -> Result<()> {
        self.ensure_open()?;
        let fields = matcher::project_window(field_index, field_values)?;
        self.delete(ptype, &fields).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::model::MemoryModel;
    use crate::rule::RuleRow;
    use crate::store::MockRelationalStore;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn schema_ready_store() -> MockRelationalStore {
        let mut store = MockRelationalStore::new();
        store
            .expect_execute()
            .withf(|statement| statement.sql.starts_with("CREATE"))
            .times(2)
            .returning(|_| Ok(0));
        store
    }

    async fn adapter_with(store: MockRelationalStore) -> PgAdapter<MockRelationalStore> {
        PgAdapter::with_store(store, TableName::default())
            .await
            .expect("adapter")
    }

    fn recording_execute(store: &mut MockRelationalStore) -> Arc<Mutex<Vec<Statement>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        store
            .expect_execute()
            .withf(|statement| !statement.sql.starts_with("CREATE"))
            .returning(move |statement| {
                sink.lock().unwrap().push(Statement::clone(statement));
                Ok(1)
            });
        log
    }

    #[tokio::test]
    async fn construction_ensures_the_table() {
        let adapter = adapter_with(schema_ready_store()).await;
        assert!(!adapter.is_filtered());
        assert!(!adapter.is_closed());
    }

    #[tokio::test]
    async fn failing_ddl_is_a_schema_error() {
        let mut store = MockRelationalStore::new();
        store
            .expect_execute()
            .returning(|_| Err(PolicyError::Query(sqlx::Error::PoolTimedOut)));
        let err = PgAdapter::with_store(store, TableName::default())
            .await
            .err()
            .expect("construction fails");
        assert!(matches!(err, PolicyError::Schema(_)));
    }

    #[tokio::test]
    async fn load_policy_feeds_decoded_rows_to_the_model() {
        let mut store = schema_ready_store();
        store
            .expect_query()
            .withf(|statement| !statement.sql.contains("WHERE") && statement.args.is_empty())
            .times(1)
            .returning(|_| {
                Ok(vec![
                    RuleRow::new("p", &["alice", "data1", "read"]),
                    RuleRow::new("g", &["alice", "admin"]),
                    RuleRow::default(),
                ])
            });
        let adapter = adapter_with(store).await;

        let mut model = MemoryModel::new();
        adapter.load_policy(&mut model).await.expect("load");

        assert_eq!(model.len(), 2);
        assert!(model.has_rule("p", &["alice", "data1", "read"]));
        assert!(model.has_rule("g", &["alice", "admin"]));
        assert!(!adapter.is_filtered());
    }

    #[tokio::test]
    async fn filtered_load_is_one_conjunctive_query() {
        let mut store = schema_ready_store();
        store
            .expect_query()
            .withf(|statement| {
                statement.sql.ends_with("WHERE p_type IN ($1) AND v1 IN ($2, $3) ORDER BY id")
                    && statement.args == ["p", "data1", "data2"]
            })
            .times(1)
            .returning(|_| Ok(vec![RuleRow::new("p", &["bob", "data2", "write"])]));
        let adapter = adapter_with(store).await;

        let filter = Filter::new()
            .with(crate::rule::Column::PType, ["p"])
            .with(crate::rule::Column::V1, ["data1", "data2"]);
        let mut model = MemoryModel::new();
        adapter
            .load_filtered_policy(&mut model, &filter)
            .await
            .expect("filtered load");

        assert!(adapter.is_filtered());
        assert!(model.has_rule("p", &["bob", "data2", "write"]));
    }

    #[tokio::test]
    async fn filtered_flag_is_set_without_matches_and_cleared_by_full_load() {
        let mut store = schema_ready_store();
        store.expect_query().times(2).returning(|_| Ok(Vec::new()));
        let adapter = adapter_with(store).await;
        let mut model = MemoryModel::new();

        let filter = Filter::new().with(crate::rule::Column::V0, ["nobody"]);
        adapter
            .load_filtered_policy(&mut model, &filter)
            .await
            .expect("filtered load");
        assert!(adapter.is_filtered());
        assert!(model.is_empty());

        adapter.load_policy(&mut model).await.expect("load");
        assert!(!adapter.is_filtered());
    }

    #[tokio::test]
    async fn malformed_filter_value_is_rejected_before_querying() {
        let mut store = schema_ready_store();
        store.expect_query().never();
        let adapter = adapter_with(store).await;

        let mut model = MemoryModel::new();
        let err = adapter
            .load_filtered_policy_value(&mut model, &serde_json::json!("p"))
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidFilter(_)));
        assert!(!adapter.is_filtered());
    }

    #[tokio::test]
    async fn save_policy_rebuilds_the_table_in_one_batch() {
        let mut store = schema_ready_store();
        let batches = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&batches);
        store
            .expect_execute_batch()
            .times(1)
            .returning(move |statements| {
                sink.lock().unwrap().push(statements.to_vec());
                Ok(())
            });
        let adapter = adapter_with(store).await;

        let mut model = MemoryModel::new();
        model.add_rule("p", "p", strings(&["alice", "data1", "read"]));
        model.add_rule("g", "g", strings(&["alice", "admin"]));
        model.add_rule("e", "e", strings(&["ignored"]));

        adapter.save_policy(&model).await.expect("save");

        let batches = batches.lock().unwrap();
        let batch = &batches[0];
        assert_eq!(batch.len(), 5);
        assert_eq!(batch[0].sql, "DROP TABLE IF EXISTS \"casbin_rule\"");
        assert!(batch[1].sql.starts_with("CREATE TABLE"));
        assert!(batch[2].sql.starts_with("CREATE UNIQUE INDEX"));
        assert_eq!(batch[3].args, vec!["p", "alice", "data1", "read"]);
        assert_eq!(batch[4].args, vec!["g", "alice", "admin"]);
    }

    #[tokio::test]
    async fn duplicate_insert_surfaces_the_rule() {
        let mut store = schema_ready_store();
        store
            .expect_execute()
            .withf(|statement| statement.sql.starts_with("INSERT"))
            .returning(|_| Err(PolicyError::DuplicateRule("unique_idx".into())));
        let adapter = adapter_with(store).await;

        let err = adapter
            .add_policy("p", "p", &strings(&["alice", "data1", "read"]))
            .await
            .unwrap_err();
        match err {
            PolicyError::DuplicateRule(line) => assert_eq!(line, "p, alice, data1, read"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn add_policies_stops_at_the_first_failure() {
        let mut store = schema_ready_store();
        let mut calls = 0;
        store
            .expect_execute()
            .withf(|statement| statement.sql.starts_with("INSERT"))
            .times(2)
            .returning(move |_| {
                calls += 1;
                if calls == 2 {
                    Err(PolicyError::DuplicateRule("unique_idx".into()))
                } else {
                    Ok(1)
                }
            });
        let adapter = adapter_with(store).await;

        let rules = vec![
            strings(&["alice", "data1", "read"]),
            strings(&["alice", "data1", "read"]),
            strings(&["bob", "data2", "write"]),
        ];
        let err = adapter.add_policies("p", "p", &rules).await.unwrap_err();
        assert!(err.is_duplicate());
    }

    #[tokio::test]
    async fn remove_policy_matches_the_given_prefix() {
        let mut store = schema_ready_store();
        let log = recording_execute(&mut store);
        let adapter = adapter_with(store).await;

        adapter
            .remove_policy("p", "p", &strings(&["alice", "data1"]))
            .await
            .expect("remove");
        adapter
            .remove_policies("g", "g", &[strings(&["alice", "admin"]), strings(&["bob"])])
            .await
            .expect("remove many");

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(
            log[0].sql,
            "DELETE FROM \"casbin_rule\" WHERE p_type = $1 AND v0 = $2 AND v1 = $3"
        );
        assert_eq!(log[0].args, vec!["p", "alice", "data1"]);
        assert_eq!(log[2].args, vec!["g", "bob"]);
    }

    #[tokio::test]
    async fn remove_filtered_policy_offsets_the_window() {
        let mut store = schema_ready_store();
        let log = recording_execute(&mut store);
        let adapter = adapter_with(store).await;

        adapter
            .remove_filtered_policy("p", "p", 1, &strings(&["data1", "read"]))
            .await
            .expect("remove filtered");

        let log = log.lock().unwrap();
        assert_eq!(
            log[0].sql,
            "DELETE FROM \"casbin_rule\" WHERE p_type = $1 AND v1 = $2 AND v2 = $3"
        );
        assert_eq!(log[0].args, vec!["p", "data1", "read"]);
    }

    #[tokio::test]
    async fn out_of_range_window_is_rejected_before_executing() {
        let mut store = schema_ready_store();
        let log = recording_execute(&mut store);
        let adapter = adapter_with(store).await;

        let err = adapter
            .remove_filtered_policy("p", "p", 5, &strings(&["a", "b"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidRule(_)));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn close_releases_the_store_once() {
        let mut store = schema_ready_store();
        store.expect_close().times(1).returning(|| ());
        let adapter = adapter_with(store).await;

        adapter.close().await;
        adapter.close().await;
        assert!(adapter.is_closed());

        let mut model = MemoryModel::new();
        let err = adapter.load_policy(&mut model).await.unwrap_err();
        assert!(matches!(err, PolicyError::Closed));
    }
}
