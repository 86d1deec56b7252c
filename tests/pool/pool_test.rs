use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use dataport::config::PoolSettings;
use dataport::crypto::{self, CredentialCipher};
use dataport::model::{Connector, ConnectorConfig, ConnectorId, Row, TenantId};
use dataport::pool::{
    ConnectionPoolManager, DataSource, DataSourceFactory, PoolError, R2d2DataSourceFactory,
    SourceError,
};
use dataport::sql::{BoundParam, Dialect, NamedParam};
use serde_json::json;

struct Static;

impl DataSource for Static {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn query(&self, _sql: &str, _params: &[NamedParam]) -> Result<Vec<Row>, SourceError> {
        Ok(Vec::new())
    }
}

/// Counts creations and holds each one open for a moment.
#[derive(Default)]
struct SlowCounting {
    created: AtomicUsize,
}

impl DataSourceFactory for SlowCounting {
    fn create(&self, _connector: &Connector) -> Result<Arc<dyn DataSource>, PoolError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        Ok(Arc::new(Static))
    }
}

fn connector(config: ConnectorConfig) -> Connector {
    let mut connector = Connector::new(ConnectorId::generate(), TenantId::new("acme"), "warehouse", config);
    connector.approve();
    connector
}

#[test]
fn test_concurrent_first_access_creates_one_pool() {
    let factory = Arc::new(SlowCounting::default());
    let pools = Arc::new(ConnectionPoolManager::new(factory.clone()));
    let connector = Arc::new(connector(ConnectorConfig::new()));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pools = Arc::clone(&pools);
            let connector = Arc::clone(&connector);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                pools.get_source(&connector).map(|_| ())
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    assert_eq!(pools.len(), 1);
}

/// Holds creation of the `slow` connector until released.
struct Gated {
    started: Barrier,
    release: Barrier,
}

impl DataSourceFactory for Gated {
    fn create(&self, connector: &Connector) -> Result<Arc<dyn DataSource>, PoolError> {
        if connector.name == "slow" {
            self.started.wait();
            self.release.wait();
        }
        Ok(Arc::new(Static))
    }
}

#[test]
fn test_slow_creation_does_not_block_other_connectors() {
    let factory = Arc::new(Gated {
        started: Barrier::new(2),
        release: Barrier::new(2),
    });
    let pools = Arc::new(ConnectionPoolManager::new(factory.clone()));
    let mut slow = connector(ConnectorConfig::new());
    slow.name = "slow".to_string();

    let pending = {
        let pools = Arc::clone(&pools);
        let slow = slow.clone();
        thread::spawn(move || pools.get_source(&slow).map(|_| ()))
    };
    factory.started.wait();

    // creation of `slow` is in progress; other connectors proceed
    for _ in 0..16 {
        let other = connector(ConnectorConfig::new());
        pools.get_source(&other).unwrap();
        assert!(pools.invalidate(&other.id));
    }
    assert!(!pools.is_cached(&slow.id));
    assert!(pools.is_empty());

    factory.release.wait();
    pending.join().unwrap().unwrap();
    assert!(pools.is_cached(&slow.id));
    assert_eq!(pools.len(), 1);
}

#[test]
fn test_pools_are_per_connector() {
    let factory = Arc::new(SlowCounting::default());
    let pools = ConnectionPoolManager::new(factory.clone());
    let first = connector(ConnectorConfig::new());
    let second = connector(ConnectorConfig::new());

    let a = pools.get_source(&first).unwrap();
    let b = pools.get_source(&second).unwrap();
    let a_again = pools.get_source(&first).unwrap();

    assert!(Arc::ptr_eq(&a, &a_again));
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(factory.created.load(Ordering::SeqCst), 2);
}

#[test]
fn test_invalidate_closes_and_recreates() {
    let factory = Arc::new(SlowCounting::default());
    let pools = ConnectionPoolManager::new(factory.clone());
    let connector = connector(ConnectorConfig::new());

    let before = pools.get_source(&connector).unwrap();
    assert!(pools.invalidate(&connector.id));
    assert!(!pools.is_cached(&connector.id));
    assert!(!pools.invalidate(&connector.id));

    let after = pools.get_source(&connector).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(factory.created.load(Ordering::SeqCst), 2);

    pools.invalidate_all();
    assert!(pools.is_empty());
}

#[test]
fn test_inactive_connector_refused() {
    let factory = Arc::new(SlowCounting::default());
    let pools = ConnectionPoolManager::new(factory.clone());
    let mut connector = connector(ConnectorConfig::new());
    connector.active = false;

    assert!(matches!(
        pools.get_source(&connector),
        Err(PoolError::Inactive(id)) if id == connector.id
    ));
    assert_eq!(factory.created.load(Ordering::SeqCst), 0);
}

// ----------------------------------------------------------------------------
// r2d2-backed sources
// ----------------------------------------------------------------------------

fn seed_database(path: &Path) {
    rusqlite::Connection::open(path)
        .unwrap()
        .execute_batch(
            "CREATE TABLE accounts (id INTEGER PRIMARY KEY, owner TEXT, balance REAL);
             INSERT INTO accounts VALUES (1, 'ada', 10.5), (2, 'grace', 99.0), (3, 'alan', NULL);",
        )
        .unwrap();
}

fn sqlite_config(path: &Path) -> ConnectorConfig {
    ConnectorConfig::new()
        .with("driver", "sqlite")
        .with("databaseName", path.display().to_string())
}

#[test]
fn test_sqlite_source_through_manager() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bank.db");
    seed_database(&path);

    let key = crypto::generate_master_key().unwrap();
    let factory = Arc::new(R2d2DataSourceFactory::new(
        Arc::new(CredentialCipher::new(&key).unwrap()),
        PoolSettings::default(),
    ));
    let pools = ConnectionPoolManager::new(factory);
    let connector = connector(sqlite_config(&path));

    let source = pools.get_source(&connector).unwrap();
    assert_eq!(source.dialect(), Dialect::Sqlite);

    let params = vec![
        ("p1".to_string(), BoundParam::Float(20.0)),
        ("limit".to_string(), BoundParam::Int(10)),
        ("offset".to_string(), BoundParam::Int(0)),
    ];
    let rows = source
        .query(
            "SELECT id, owner FROM main.accounts WHERE balance < :p1 ORDER BY id LIMIT :limit OFFSET :offset",
            &params,
        )
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["owner"], json!("ada"));

    let rows = source
        .query("SELECT balance FROM accounts WHERE id = 3", &[])
        .unwrap();
    assert_eq!(rows[0]["balance"], serde_json::Value::Null);
}

#[test]
fn test_encrypted_password_is_decrypted_before_connect() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bank.db");
    seed_database(&path);

    let key = crypto::generate_master_key().unwrap();
    let ciphertext = CredentialCipher::new(&key).unwrap().encrypt("s3cret").unwrap();
    let config = sqlite_config(&path).with("encrypted_password", ciphertext);

    let right = R2d2DataSourceFactory::new(Arc::new(CredentialCipher::new(&key).unwrap()), PoolSettings::default());
    assert!(right.create(&connector(config.clone())).is_ok());

    let other = crypto::generate_master_key().unwrap();
    let wrong = R2d2DataSourceFactory::new(Arc::new(CredentialCipher::new(&other).unwrap()), PoolSettings::default());
    assert!(matches!(
        wrong.create(&connector(config)),
        Err(PoolError::Creation { .. })
    ));
}

#[test]
fn test_failed_creation_is_not_cached() {
    let key = crypto::generate_master_key().unwrap();
    let factory = Arc::new(R2d2DataSourceFactory::new(
        Arc::new(CredentialCipher::new(&key).unwrap()),
        PoolSettings::default(),
    ));
    let pools = ConnectionPoolManager::new(factory);
    let connector = connector(ConnectorConfig::new().with("driver", "oracle"));

    let err = pools.get_source(&connector).err().unwrap();
    assert!(err.to_string().contains("Unsupported driver"));
    assert!(!pools.is_cached(&connector.id));
}
