use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use cco_core::{
    Column, EntityKind, NewRecord, Predicate, PredicateValue, PriceRow, ProviderRow, Record,
    RegionRow, RowId, SavingPlanRow, SkuRow, Stored, TermRow,
};
use reqwest::StatusCode;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, info_span, Instrument};

pub const CRATE_NAME: &str = "cco-storage";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated on {kind}: {detail}")]
    UniqueViolation { kind: EntityKind, detail: String },
    #[error("foreign key violated on {kind}: {detail}")]
    ForeignKeyViolation { kind: EntityKind, detail: String },
    #[error("column {column:?} does not belong to {kind}")]
    ColumnMismatch { kind: EntityKind, column: Column },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Inserts are append-only: a structurally identical row inserted twice is
/// stored twice.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn create(&self, record: NewRecord) -> Result<Record, StoreError>;

    async fn find_one_where(
        &self,
        kind: EntityKind,
        predicate: Predicate,
    ) -> Result<Option<Record>, StoreError>;

    /// Returns rows removed from `kind` itself; descendants go by cascade.
    async fn delete(&self, kind: EntityKind, id: RowId) -> Result<u64, StoreError>;

    async fn count(&self, kind: EntityKind) -> Result<u64, StoreError>;
}

fn ensure_column(kind: EntityKind, column: Column) -> Result<(), StoreError> {
    if column.applies_to(kind) {
        Ok(())
    } else {
        Err(StoreError::ColumnMismatch { kind, column })
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    sequences: HashMap<EntityKind, RowId>,
    tables: BTreeMap<EntityKind, Vec<Record>>,
}

impl MemoryState {
    fn table(&self, kind: EntityKind) -> &[Record] {
        self.tables.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    fn exists(&self, kind: EntityKind, id: RowId) -> bool {
        self.table(kind).iter().any(|r| r.id() == id)
    }

    fn next_id(&mut self, kind: EntityKind) -> RowId {
        let seq = self.sequences.entry(kind).or_insert(0);
        *seq += 1;
        *seq
    }

    fn check_unique(&self, record: &NewRecord) -> Result<(), StoreError> {
        let (kind, predicate) = match record {
            NewRecord::Provider(r) => (
                EntityKind::Provider,
                Predicate::text(Column::ProviderName, r.name.clone()),
            ),
            NewRecord::Region(r) => (
                EntityKind::Region,
                Predicate::text(Column::RegionCode, r.code.clone()),
            ),
            _ => return Ok(()),
        };
        if self.table(kind).iter().any(|r| r.matches(&predicate)) {
            return Err(StoreError::UniqueViolation {
                kind,
                detail: format!("{:?} already present", predicate.value),
            });
        }
        Ok(())
    }

    fn cascade_delete(&mut self, kind: EntityKind, id: RowId) -> u64 {
        let Some(table) = self.tables.get_mut(&kind) else {
            return 0;
        };
        let Some(pos) = table.iter().position(|r| r.id() == id) else {
            return 0;
        };
        table.remove(pos);

        for child in kind.children() {
            let orphans = self
                .table(*child)
                .iter()
                .filter(|r| r.foreign_keys().contains(&(kind, id)))
                .map(Record::id)
                .collect::<Vec<_>>();
            for orphan in orphans {
                self.cascade_delete(*child, orphan);
            }
        }
        1
    }
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self, kind: EntityKind) -> Vec<Record> {
        self.state.lock().await.table(kind).to_vec()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn create(&self, record: NewRecord) -> Result<Record, StoreError> {
        let kind = record.kind();
        let mut state = self.state.lock().await;

        for (parent, parent_id) in record.foreign_keys() {
            if !state.exists(parent, parent_id) {
                return Err(StoreError::ForeignKeyViolation {
                    kind,
                    detail: format!("{parent} {parent_id} does not exist"),
                });
            }
        }
        state.check_unique(&record)?;

        let id = state.next_id(kind);
        let stored = record.into_stored(id);
        state.tables.entry(kind).or_default().push(stored.clone());
        Ok(stored)
    }

    async fn find_one_where(
        &self,
        kind: EntityKind,
        predicate: Predicate,
    ) -> Result<Option<Record>, StoreError> {
        ensure_column(kind, predicate.column)?;
        let state = self.state.lock().await;
        Ok(state
            .table(kind)
            .iter()
            .find(|r| r.matches(&predicate))
            .cloned())
    }

    async fn delete(&self, kind: EntityKind, id: RowId) -> Result<u64, StoreError> {
        Ok(self.state.lock().await.cascade_delete(kind, id))
    }

    async fn count(&self, kind: EntityKind) -> Result<u64, StoreError> {
        Ok(self.state.lock().await.table(kind).len() as u64)
    }
}

#[derive(Debug, Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        info!("connected to catalog database");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("catalog migrations applied");
        Ok(())
    }
}

fn map_write_error(kind: EntityKind, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        let detail = db.message().to_string();
        match db.code().as_deref() {
            Some("23505") => return StoreError::UniqueViolation { kind, detail },
            Some("23503") => return StoreError::ForeignKeyViolation { kind, detail },
            _ => {}
        }
    }
    StoreError::Database(err)
}

fn decode_record(kind: EntityKind, r: &PgRow) -> Result<Record, sqlx::Error> {
    let id: RowId = r.try_get("id")?;
    let created_at = r.try_get("created_at")?;
    let modified_at = r.try_get("modified_at")?;
    let disable_flag = r.try_get("disable_flag")?;

    let record = match kind {
        EntityKind::Provider => Record::Provider(Stored {
            id,
            row: ProviderRow {
                name: r.try_get("name")?,
                created_at,
                modified_at,
                disable_flag,
            },
        }),
        EntityKind::Region => Record::Region(Stored {
            id,
            row: RegionRow {
                provider_id: r.try_get("provider_id")?,
                code: r.try_get("code")?,
                created_at,
                modified_at,
                disable_flag,
            },
        }),
        EntityKind::Sku => Record::Sku(Stored {
            id,
            row: SkuRow {
                region_id: r.try_get("region_id")?,
                arm_sku_name: r.try_get("arm_sku_name")?,
                name: r.try_get("name")?,
                usage_type: r.try_get("usage_type")?,
                sku_code: r.try_get("sku_code")?,
                product_name: r.try_get("product_name")?,
                product_family: r.try_get("product_family")?,
                vcpu: r.try_get("vcpu")?,
                memory: r.try_get("memory")?,
                cpu_architecture_type: r.try_get("cpu_architecture_type")?,
                network: r.try_get("network")?,
                created_at,
                modified_at,
                disable_flag,
            },
        }),
        EntityKind::Price => Record::Price(Stored {
            id,
            row: PriceRow {
                sku_id: r.try_get("sku_id")?,
                retail_price: r.try_get("retail_price")?,
                unit: r.try_get("unit")?,
                effective_date: r.try_get("effective_date")?,
                created_at,
                modified_at,
                disable_flag,
            },
        }),
        EntityKind::Term => Record::Term(Stored {
            id,
            row: TermRow {
                sku_id: r.try_get("sku_id")?,
                price_id: r.try_get("price_id")?,
                offer_term_code: r.try_get("offer_term_code")?,
                purchase_option: r.try_get("purchase_option")?,
                lease_contract_length: r.try_get("lease_contract_length")?,
                offering_class: r.try_get("offering_class")?,
                discounted_sku: r.try_get("discounted_sku")?,
                discounted_rate: r.try_get("discounted_rate")?,
                created_at,
                modified_at,
                disable_flag,
            },
        }),
        EntityKind::SavingPlan => Record::SavingPlan(Stored {
            id,
            row: SavingPlanRow {
                region_id: r.try_get("region_id")?,
                sku: r.try_get("sku")?,
                discounted_sku: r.try_get("discounted_sku")?,
                lease_contract_length: r.try_get("lease_contract_length")?,
                discounted_rate: r.try_get("discounted_rate")?,
                created_at,
                modified_at,
                disable_flag,
            },
        }),
    };
    Ok(record)
}

impl PgCatalogStore {
    async fn insert(&self, record: &NewRecord) -> Result<RowId, sqlx::Error> {
        let id: RowId = match record {
            NewRecord::Provider(p) => {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO providers (name, created_at, modified_at, disable_flag)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id
                    "#,
                )
                .bind(&p.name)
                .bind(p.created_at)
                .bind(p.modified_at)
                .bind(p.disable_flag)
                .fetch_one(&self.pool)
                .await?
            }
            NewRecord::Region(g) => {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO regions (provider_id, code, created_at, modified_at, disable_flag)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING id
                    "#,
                )
                .bind(g.provider_id)
                .bind(&g.code)
                .bind(g.created_at)
                .bind(g.modified_at)
                .bind(g.disable_flag)
                .fetch_one(&self.pool)
                .await?
            }
            NewRecord::Sku(s) => {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO skus (
                        region_id, arm_sku_name, name, usage_type, sku_code, product_name,
                        product_family, vcpu, memory, cpu_architecture_type, network,
                        created_at, modified_at, disable_flag
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                    RETURNING id
                    "#,
                )
                .bind(s.region_id)
                .bind(&s.arm_sku_name)
                .bind(&s.name)
                .bind(&s.usage_type)
                .bind(&s.sku_code)
                .bind(&s.product_name)
                .bind(&s.product_family)
                .bind(s.vcpu)
                .bind(&s.memory)
                .bind(&s.cpu_architecture_type)
                .bind(&s.network)
                .bind(s.created_at)
                .bind(s.modified_at)
                .bind(s.disable_flag)
                .fetch_one(&self.pool)
                .await?
            }
            NewRecord::Price(p) => {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO prices (
                        sku_id, retail_price, unit, effective_date,
                        created_at, modified_at, disable_flag
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    RETURNING id
                    "#,
                )
                .bind(p.sku_id)
                .bind(p.retail_price)
                .bind(&p.unit)
                .bind(p.effective_date)
                .bind(p.created_at)
                .bind(p.modified_at)
                .bind(p.disable_flag)
                .fetch_one(&self.pool)
                .await?
            }
            NewRecord::Term(t) => {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO terms (
                        sku_id, price_id, offer_term_code, purchase_option,
                        lease_contract_length, offering_class, discounted_sku, discounted_rate,
                        created_at, modified_at, disable_flag
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                    RETURNING id
                    "#,
                )
                .bind(t.sku_id)
                .bind(t.price_id)
                .bind(&t.offer_term_code)
                .bind(&t.purchase_option)
                .bind(&t.lease_contract_length)
                .bind(&t.offering_class)
                .bind(&t.discounted_sku)
                .bind(t.discounted_rate)
                .bind(t.created_at)
                .bind(t.modified_at)
                .bind(t.disable_flag)
                .fetch_one(&self.pool)
                .await?
            }
            NewRecord::SavingPlan(s) => {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO saving_plans (
                        region_id, sku, discounted_sku, lease_contract_length, discounted_rate,
                        created_at, modified_at, disable_flag
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    RETURNING id
                    "#,
                )
                .bind(s.region_id)
                .bind(&s.sku)
                .bind(&s.discounted_sku)
                .bind(&s.lease_contract_length)
                .bind(s.discounted_rate)
                .bind(s.created_at)
                .bind(s.modified_at)
                .bind(s.disable_flag)
                .fetch_one(&self.pool)
                .await?
            }
        };
        Ok(id)
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn create(&self, record: NewRecord) -> Result<Record, StoreError> {
        let kind = record.kind();
        let id = self
            .insert(&record)
            .await
            .map_err(|err| map_write_error(kind, err))?;
        Ok(record.into_stored(id))
    }

    async fn find_one_where(
        &self,
        kind: EntityKind,
        predicate: Predicate,
    ) -> Result<Option<Record>, StoreError> {
        ensure_column(kind, predicate.column)?;
        // Table and column names come from fixed enums, never from input.
        let sql = format!(
            "SELECT * FROM {} WHERE {} = $1 ORDER BY id LIMIT 1",
            kind.table_name(),
            predicate.column.sql_name()
        );
        let query = sqlx::query(&sql);
        let query = match predicate.value {
            PredicateValue::Text(value) => query.bind(value),
            PredicateValue::Id(value) => query.bind(value),
        };
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.map(|r| decode_record(kind, &r)).transpose()?)
    }

    async fn delete(&self, kind: EntityKind, id: RowId) -> Result<u64, StoreError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", kind.table_name());
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|err| map_write_error(kind, err))?;
        Ok(result.rows_affected())
    }

    async fn count(&self, kind: EntityKind) -> Result<u64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", kind.table_name());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("invalid JSON document from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch_document(
        &self,
        url: &str,
        bearer_token: Option<&str>,
    ) -> Result<JsonValue, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self { client })
    }
}

impl HttpFetcher {
    async fn get_json(&self, url: &str, bearer_token: Option<&str>) -> Result<JsonValue, FetchError> {
        let mut request = self.client.get(url);
        if let Some(token) = bearer_token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        let status = resp.status();
        let final_url = resp.url().to_string();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: final_url,
            });
        }

        let body = resp.bytes().await?;
        debug!(bytes = body.len(), "fetched document");
        serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
            url: final_url,
            source,
        })
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch_document(
        &self,
        url: &str,
        bearer_token: Option<&str>,
    ) -> Result<JsonValue, FetchError> {
        let span = info_span!("http_fetch", url, authorized = bearer_token.is_some());
        self.get_json(url, bearer_token).instrument(span).await
    }
}

#[derive(Debug, Default)]
pub struct StaticDocumentFetcher {
    documents: HashMap<String, JsonValue>,
    requests: Mutex<Vec<(String, Option<String>)>>,
}

impl StaticDocumentFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, url: impl Into<String>, document: JsonValue) -> Self {
        self.documents.insert(url.into(), document);
        self
    }

    pub async fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl DocumentFetcher for StaticDocumentFetcher {
    async fn fetch_document(
        &self,
        url: &str,
        bearer_token: Option<&str>,
    ) -> Result<JsonValue, FetchError> {
        self.requests
            .lock()
            .await
            .push((url.to_string(), bearer_token.map(ToString::to_string)));
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::HttpStatus {
                status: StatusCode::NOT_FOUND.as_u16(),
                url: url.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 24, 12, 0, 0).single().unwrap()
    }

    fn sku_row(region_id: RowId, code: &str) -> SkuRow {
        SkuRow {
            region_id,
            arm_sku_name: "Standard_D2s_v3".into(),
            name: "Standard_D2s_v3".into(),
            usage_type: "Consumption".into(),
            sku_code: Some(code.into()),
            product_name: None,
            product_family: None,
            vcpu: 2,
            memory: "8".into(),
            cpu_architecture_type: "x64".into(),
            network: "2".into(),
            created_at: ts(),
            modified_at: ts(),
            disable_flag: false,
        }
    }

    async fn seeded() -> (InMemoryCatalogStore, RowId, RowId) {
        let store = InMemoryCatalogStore::new();
        let provider = store
            .create(NewRecord::Provider(ProviderRow::new("Azure", ts())))
            .await
            .unwrap();
        let region = store
            .create(NewRecord::Region(RegionRow::new(provider.id(), "eastus", ts())))
            .await
            .unwrap();
        (store, provider.id(), region.id())
    }

    #[tokio::test]
    async fn ids_are_generated_per_kind() {
        let (store, provider_id, region_id) = seeded().await;
        assert_eq!(provider_id, 1);
        assert_eq!(region_id, 1);
        let sku = store.create(NewRecord::Sku(sku_row(region_id, "A"))).await.unwrap();
        assert_eq!(sku.id(), 1);
    }

    #[tokio::test]
    async fn provider_and_region_names_are_unique() {
        let (store, provider_id, _) = seeded().await;
        let err = store
            .create(NewRecord::Provider(ProviderRow::new("Azure", ts())))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { kind: EntityKind::Provider, .. }));
        let err = store
            .create(NewRecord::Region(RegionRow::new(provider_id, "eastus", ts())))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { kind: EntityKind::Region, .. }));
    }

    #[tokio::test]
    async fn child_rows_require_existing_parent() {
        let (store, _, _) = seeded().await;
        let err = store
            .create(NewRecord::Price(PriceRow::placeholder(42, ts())))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation { kind: EntityKind::Price, .. }));
        assert_eq!(store.count(EntityKind::Price).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn skus_are_append_only() {
        let (store, _, region_id) = seeded().await;
        store.create(NewRecord::Sku(sku_row(region_id, "A"))).await.unwrap();
        store.create(NewRecord::Sku(sku_row(region_id, "A"))).await.unwrap();
        assert_eq!(store.count(EntityKind::Sku).await.unwrap(), 2);

        let first = store
            .find_one_where(EntityKind::Sku, Predicate::text(Column::SkuCode, "A"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.id(), 1);
    }

    #[tokio::test]
    async fn lookup_with_foreign_column_is_rejected() {
        let (store, _, _) = seeded().await;
        let err = store
            .find_one_where(EntityKind::Region, Predicate::text(Column::SkuCode, "A"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ColumnMismatch { .. }));
    }

    #[tokio::test]
    async fn deleting_provider_cascades_through_hierarchy() {
        let (store, provider_id, region_id) = seeded().await;
        let sku = store.create(NewRecord::Sku(sku_row(region_id, "A"))).await.unwrap();
        let price = store
            .create(NewRecord::Price(PriceRow::placeholder(sku.id(), ts())))
            .await
            .unwrap();
        store
            .create(NewRecord::Term(TermRow::for_lease(sku.id(), price.id(), "1 Year", ts())))
            .await
            .unwrap();
        store
            .create(NewRecord::SavingPlan(SavingPlanRow {
                region_id,
                sku: "A".into(),
                discounted_sku: "Standard_D2s_v3".into(),
                lease_contract_length: "1 Year".into(),
                discounted_rate: Some(0.05),
                created_at: ts(),
                modified_at: ts(),
                disable_flag: false,
            }))
            .await
            .unwrap();

        assert_eq!(store.delete(EntityKind::Provider, provider_id).await.unwrap(), 1);
        for kind in EntityKind::ALL {
            assert_eq!(store.count(kind).await.unwrap(), 0, "{kind} rows left behind");
        }
    }

    #[tokio::test]
    async fn deleting_price_keeps_sku_but_drops_terms() {
        let (store, _, region_id) = seeded().await;
        let sku = store.create(NewRecord::Sku(sku_row(region_id, "A"))).await.unwrap();
        let price = store
            .create(NewRecord::Price(PriceRow::placeholder(sku.id(), ts())))
            .await
            .unwrap();
        store
            .create(NewRecord::Term(TermRow::for_lease(sku.id(), price.id(), "3 Years", ts())))
            .await
            .unwrap();

        store.delete(EntityKind::Price, price.id()).await.unwrap();
        assert_eq!(store.count(EntityKind::Sku).await.unwrap(), 1);
        assert_eq!(store.count(EntityKind::Term).await.unwrap(), 0);
        assert_eq!(store.delete(EntityKind::Price, price.id()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn static_fetcher_records_requests_and_404s_unknown_urls() {
        let fetcher = StaticDocumentFetcher::new()
            .with_document("https://example.test/page1", json!({ "Items": [] }));
        let doc = fetcher
            .fetch_document("https://example.test/page1", Some("tok"))
            .await
            .unwrap();
        assert_eq!(doc, json!({ "Items": [] }));

        let err = fetcher
            .fetch_document("https://example.test/missing", None)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus { status: 404, .. }));
        assert_eq!(
            fetcher.requests().await,
            vec![
                ("https://example.test/page1".to_string(), Some("tok".to_string())),
                ("https://example.test/missing".to_string(), None),
            ]
        );
    }
}
