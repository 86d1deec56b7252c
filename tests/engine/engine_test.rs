//! End-to-end engine tests against a SQLite connector.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dataport::config::{MaskingMode, PoolSettings, Settings};
use dataport::crypto::{self, CredentialCipher};
use dataport::engine::{ErrorKind, QueryEngine, QueryError};
use dataport::model::{
    Connector, ConnectorConfig, ConnectorId, ConnectorStatus, Endpoint, EndpointId,
    FieldDefinition, FilterSpec, MaskingConfig, QueryDescription, SortSpec, TenantId,
};
use dataport::pool::{DataSource, DataSourceFactory, PoolError, R2d2DataSourceFactory};
use dataport::repository::InMemoryRepository;
use serde_json::json;
use tempfile::TempDir;

/// Wraps the real factory and counts creations.
struct CountingFactory {
    inner: R2d2DataSourceFactory,
    created: AtomicUsize,
}

impl DataSourceFactory for CountingFactory {
    fn create(&self, connector: &Connector) -> Result<Arc<dyn DataSource>, PoolError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        self.inner.create(connector)
    }
}

struct Fixture {
    _dir: TempDir,
    engine: QueryEngine,
    repo: Arc<InMemoryRepository>,
    factory: Arc<CountingFactory>,
    connector: Connector,
    tenant: TenantId,
}

impl Fixture {
    fn new(masking: MaskingMode) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crm.db");
        seed_database(&path);

        let key = crypto::generate_master_key().unwrap();
        let factory = Arc::new(CountingFactory {
            inner: R2d2DataSourceFactory::new(
                Arc::new(CredentialCipher::new(&key).unwrap()),
                PoolSettings::default(),
            ),
            created: AtomicUsize::new(0),
        });

        let mut settings = Settings::default();
        settings.engine.masking = masking;

        let repo = Arc::new(InMemoryRepository::new());
        let engine = QueryEngine::new(repo.clone(), repo.clone(), factory.clone(), &settings);

        let tenant = TenantId::new("acme");
        let mut connector = Connector::new(
            ConnectorId::generate(),
            tenant.clone(),
            "crm",
            ConnectorConfig::new()
                .with("driver", "sqlite")
                .with("databaseName", path.display().to_string()),
        );
        connector.approve();
        repo.upsert_connector(connector.clone());

        Self {
            _dir: dir,
            engine,
            repo,
            factory,
            connector,
            tenant,
        }
    }

    fn endpoint(&self, query: QueryDescription, fields: &[FieldDefinition]) -> EndpointId {
        let mut endpoint = Endpoint::new(
            EndpointId::generate(),
            self.tenant.clone(),
            self.connector.id,
            "customers",
            &query,
        )
        .unwrap();
        if !fields.is_empty() {
            endpoint = endpoint.with_fields(fields).unwrap();
        }
        let id = endpoint.id;
        self.repo.upsert_endpoint(endpoint);
        id
    }

    fn created(&self) -> usize {
        self.factory.created.load(Ordering::SeqCst)
    }
}

fn seed_database(path: &Path) {
    rusqlite::Connection::open(path)
        .unwrap()
        .execute_batch(
            "CREATE TABLE customers (
                 id INTEGER PRIMARY KEY,
                 name TEXT NOT NULL,
                 email TEXT,
                 ssn TEXT,
                 phone TEXT,
                 score INTEGER
             );
             INSERT INTO customers VALUES
                 (1, 'Ada Lovelace', 'ada.lovelace@example.com', '123-45-6789', '5551230001', 91),
                 (2, 'Grace Hopper', 'grace@example.com', '987-65-4321', '5551230002', 88),
                 (3, 'Alan Turing', 'alan@example.com', '111-22-3333', '5551230003', 72),
                 (4, 'Edsger Dijkstra', NULL, '444-55-6666', '5551230004', 65),
                 (5, 'Barbara Liskov', 'barbara@example.com', '777-88-9999', '5551230005', 99);",
        )
        .unwrap();
}

fn customer_fields() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition::new("name").aliased("fullName"),
        FieldDefinition::new("email").masked(MaskingConfig::partial("***@***.com")),
        FieldDefinition::new("ssn").masked(MaskingConfig::fixed(None)),
        FieldDefinition::new("phone").masked(MaskingConfig::partial("ShowLast4")),
    ]
}

#[test]
fn test_paginated_endpoint_with_post_fetch_masking() {
    let fixture = Fixture::new(MaskingMode::PostFetch);
    let id = fixture.endpoint(
        QueryDescription::builder("customers").sort(SortSpec::asc("id")),
        &customer_fields(),
    );

    let first = fixture.engine.execute_query(&fixture.tenant, &id, 0, 2).unwrap();
    assert_eq!(
        first,
        vec![
            json!({
                "fullName": "Ada Lovelace",
                "email": "a****e@example.com",
                "ssn": "*****",
                "phone": "******0001",
            })
            .as_object()
            .unwrap()
            .clone(),
            json!({
                "fullName": "Grace Hopper",
                "email": "g****e@example.com",
                "ssn": "*****",
                "phone": "******0002",
            })
            .as_object()
            .unwrap()
            .clone(),
        ]
    );

    let last = fixture.engine.execute_query(&fixture.tenant, &id, 2, 2).unwrap();
    assert_eq!(last.len(), 1);
    assert_eq!(last[0]["fullName"], json!("Barbara Liskov"));

    let beyond = fixture.engine.execute_query(&fixture.tenant, &id, 10, 2).unwrap();
    assert!(beyond.is_empty());

    // one pool, one metadata load, reused across pages
    assert_eq!(fixture.created(), 1);
    let stats = fixture.engine.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 2);
}

#[test]
fn test_in_sql_masking_returns_the_same_rows() {
    let post_fetch = Fixture::new(MaskingMode::PostFetch);
    let in_sql = Fixture::new(MaskingMode::InSql);
    let query = QueryDescription::builder("customers").sort(SortSpec::asc("id"));

    let a = post_fetch.endpoint(query.clone(), &customer_fields());
    let b = in_sql.endpoint(query, &customer_fields());

    let expected = post_fetch.engine.execute_query(&post_fetch.tenant, &a, 0, 5).unwrap();
    let actual = in_sql.engine.execute_query(&in_sql.tenant, &b, 0, 5).unwrap();
    assert_eq!(actual, expected);
    assert_eq!(actual[3]["email"], serde_json::Value::Null);
}

#[test]
fn test_in_sql_fixed_mask_keeps_null() {
    let post_fetch = Fixture::new(MaskingMode::PostFetch);
    let in_sql = Fixture::new(MaskingMode::InSql);
    let query = QueryDescription::builder("customers").sort(SortSpec::asc("id"));
    let fields = [
        FieldDefinition::new("id"),
        FieldDefinition::new("email").masked(MaskingConfig::fixed(Some("[hidden]"))),
    ];

    let a = post_fetch.endpoint(query.clone(), &fields);
    let b = in_sql.endpoint(query, &fields);

    let expected = post_fetch.engine.execute_query(&post_fetch.tenant, &a, 0, 5).unwrap();
    let actual = in_sql.engine.execute_query(&in_sql.tenant, &b, 0, 5).unwrap();
    assert_eq!(actual, expected);
    assert_eq!(actual[0]["email"], json!("[hidden]"));
    assert_eq!(actual[3]["email"], serde_json::Value::Null);
}

#[test]
fn test_filters_are_bound() {
    let fixture = Fixture::new(MaskingMode::PostFetch);
    let id = fixture.endpoint(
        QueryDescription::builder("customers")
            .filter(FilterSpec::new("score", "GTE", 88))
            .filter(FilterSpec::new("name", "LIKE", "%a%"))
            .sort(SortSpec::desc("score")),
        &[FieldDefinition::new("name"), FieldDefinition::new("score")],
    );

    let rows = fixture.engine.execute_query(&fixture.tenant, &id, 0, 10).unwrap();
    let names: Vec<&str> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["Barbara Liskov", "Ada Lovelace", "Grace Hopper"]);
    assert_eq!(rows[0]["score"], json!(99));
}

#[test]
fn test_raw_sql_endpoint_without_fields() {
    let fixture = Fixture::new(MaskingMode::PostFetch);
    let id = fixture.endpoint(
        QueryDescription::raw_sql("SELECT id, name FROM customers WHERE score > 80 ORDER BY id"),
        &[],
    );

    let rows = fixture.engine.execute_query(&fixture.tenant, &id, 1, 2).unwrap();
    assert_eq!(rows.len(), 1);
    let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
    assert_eq!(keys, ["id", "name"]);
    assert_eq!(rows[0]["name"], json!("Barbara Liskov"));
}

#[test]
fn test_unapproved_connector_never_reaches_the_pool() {
    let fixture = Fixture::new(MaskingMode::PostFetch);
    let mut pending = fixture.connector.clone();
    pending.status = ConnectorStatus::Init;
    fixture.repo.upsert_connector(pending.clone());
    let id = fixture.endpoint(QueryDescription::builder("customers"), &[]);

    let err = fixture.engine.execute_query(&fixture.tenant, &id, 0, 10).unwrap_err();
    assert!(matches!(err, QueryError::NotApproved { .. }));

    let err = fixture
        .engine
        .execute_test_query(&fixture.tenant, &pending, QueryDescription::builder("customers"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);

    let mut inactive = fixture.connector.clone();
    inactive.active = false;
    let err = fixture
        .engine
        .execute_test_query(&fixture.tenant, &inactive, QueryDescription::builder("customers"))
        .unwrap_err();
    assert!(matches!(err, QueryError::Inactive { .. }));

    assert_eq!(fixture.created(), 0);
}

#[test]
fn test_tenant_isolation() {
    let fixture = Fixture::new(MaskingMode::PostFetch);
    let id = fixture.endpoint(QueryDescription::builder("customers"), &[]);
    let intruder = TenantId::new("globex");

    let err = fixture.engine.execute_query(&intruder, &id, 0, 10).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = fixture
        .engine
        .find_connector(&intruder, &fixture.connector.id)
        .unwrap_err();
    assert!(matches!(err, QueryError::AccessDenied(_)));
    assert_eq!(fixture.created(), 0);
}

#[test]
fn test_missing_endpoint_and_bad_page() {
    let fixture = Fixture::new(MaskingMode::PostFetch);

    let err = fixture
        .engine
        .execute_query(&fixture.tenant, &EndpointId::generate(), 0, 10)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let id = fixture.endpoint(QueryDescription::builder("customers"), &[]);
    let err = fixture.engine.execute_query(&fixture.tenant, &id, 0, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_invalid_stored_query_is_a_validation_error() {
    let fixture = Fixture::new(MaskingMode::PostFetch);
    let id = fixture.endpoint(QueryDescription::builder("customers; DROP TABLE customers"), &[]);

    let err = fixture.engine.execute_query(&fixture.tenant, &id, 0, 10).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_execution_failure_names_the_endpoint() {
    let fixture = Fixture::new(MaskingMode::PostFetch);
    let id = fixture.endpoint(QueryDescription::builder("no_such_table"), &[]);

    let err = fixture.engine.execute_query(&fixture.tenant, &id, 0, 10).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(err.to_string().contains(&id.to_string()));
}

#[test]
fn test_test_query_returns_sql_and_rows() {
    let fixture = Fixture::new(MaskingMode::PostFetch);
    let connector = fixture
        .engine
        .find_connector(&fixture.tenant, &fixture.connector.id)
        .unwrap();

    let result = fixture
        .engine
        .execute_test_query(
            &fixture.tenant,
            &connector,
            QueryDescription::builder("customers")
                .filter(FilterSpec::new("score", "LT", 80))
                .sort(SortSpec::asc("id")),
        )
        .unwrap();
    assert_eq!(
        result.sql,
        "SELECT * FROM main.customers WHERE score < :p1 ORDER BY id ASC LIMIT 10"
    );
    assert_eq!(result.row_count, 2);
    assert_eq!(result.rows[0]["name"], json!("Alan Turing"));

    let raw = fixture
        .engine
        .execute_test_query(
            &fixture.tenant,
            &connector,
            QueryDescription::raw_sql("SELECT count(*) AS total FROM customers"),
        )
        .unwrap();
    assert_eq!(raw.sql, "SELECT count(*) AS total FROM customers LIMIT 10");
    assert_eq!(raw.rows[0]["total"], json!(5));
}

#[test]
fn test_invalidate_connector_recreates_pool() {
    let fixture = Fixture::new(MaskingMode::PostFetch);
    let id = fixture.endpoint(QueryDescription::builder("customers"), &[]);

    fixture.engine.execute_query(&fixture.tenant, &id, 0, 1).unwrap();
    assert!(fixture.engine.invalidate_connector(&fixture.connector.id));
    fixture.engine.execute_query(&fixture.tenant, &id, 0, 1).unwrap();
    assert_eq!(fixture.created(), 2);

    fixture.engine.invalidate_endpoint(&fixture.tenant, &id);
    fixture.engine.execute_query(&fixture.tenant, &id, 0, 1).unwrap();
    assert_eq!(fixture.engine.cache_stats().misses, 2);
}
