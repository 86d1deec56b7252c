//! Dataport CLI - build and run endpoint queries
//!
//! Usage:
//!   dataport sql <query.json> [--dialect <dialect>] [--schema <schema>] [--paginated]
//!   dataport test-query --tenant <id> --connector <id> <query.json>
//!   dataport query --tenant <id> --endpoint <id> [--page <n>] [--size <n>]
//!   dataport encrypt-password [--password <value>]
//!   dataport keygen
//!
//! Connectors and endpoints for `test-query` and `query` come from the
//! `[[connectors]]` / `[[endpoints]]` sections of the config file.

use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use dataport::config::Settings;
use dataport::crypto::{self, CredentialCipher, MasterKey, MASTER_KEY_ENV};
use dataport::engine::QueryEngine;
use dataport::model::{ConnectorId, EndpointId, FieldDefinition, QueryDescription, TenantId};
use dataport::pool::R2d2DataSourceFactory;
use dataport::repository::InMemoryRepository;
use dataport::sql::{Dialect, Pagination, SqlBuilder, SqlDialect};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dataport")]
#[command(about = "Dataport - read-only, field-masked data endpoints over tenant databases")]
#[command(version)]
struct Cli {
    /// Config file (defaults to DATAPORT_CONFIG, ./dataport.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the SQL generated for a query description
    Sql {
        /// Path to the query description (JSON)
        file: PathBuf,

        /// SQL dialect to generate
        #[arg(short, long, default_value = "postgres")]
        dialect: DialectArg,

        /// Schema for unqualified tables (dialect default if omitted)
        #[arg(short, long)]
        schema: Option<String>,

        /// Emit LIMIT/OFFSET placeholders instead of a literal limit
        #[arg(long)]
        paginated: bool,

        /// Field definitions (JSON) to project and mask in SQL
        #[arg(long)]
        fields: Option<PathBuf>,
    },

    /// Run an unsaved query against a configured connector
    TestQuery {
        #[arg(long)]
        tenant: String,

        #[arg(long)]
        connector: ConnectorId,

        /// Path to the query description (JSON)
        file: PathBuf,
    },

    /// Run a configured endpoint for one page
    Query {
        #[arg(long)]
        tenant: String,

        #[arg(long)]
        endpoint: EndpointId,

        /// Page number (0-indexed)
        #[arg(long, default_value_t = 0)]
        page: u64,

        /// Page size
        #[arg(long, default_value_t = 10)]
        size: u64,
    },

    /// Encrypt a connector password with the master key
    EncryptPassword {
        /// Password to encrypt (read from stdin if omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Generate a new base64 master key
    Keygen,
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Postgres,
    Sqlite,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Sqlite => Dialect::Sqlite,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&settings);

    match cli.command {
        Commands::Sql {
            file,
            dialect,
            schema,
            paginated,
            fields,
        } => cmd_sql(file, dialect.into(), schema, paginated, fields),
        Commands::TestQuery {
            tenant,
            connector,
            file,
        } => cmd_test_query(&settings, TenantId::new(tenant), connector, file),
        Commands::Query {
            tenant,
            endpoint,
            page,
            size,
        } => cmd_query(&settings, TenantId::new(tenant), endpoint, page, size),
        Commands::EncryptPassword { password } => cmd_encrypt_password(password),
        Commands::Keygen => cmd_keygen(),
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings, dataport::config::SettingsError> {
    match path {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    }
}

/// `RUST_LOG` wins over `logging.filter`.
fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_json<T: serde::de::DeserializeOwned>(file: &Path) -> Result<T, String> {
    let content = fs::read_to_string(file)
        .map_err(|e| format!("Error reading file '{}': {}", file.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("Invalid JSON in '{}': {}", file.display(), e))
}

fn print_json<T: serde::Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_sql(
    file: PathBuf,
    dialect: Dialect,
    schema: Option<String>,
    paginated: bool,
    fields: Option<PathBuf>,
) -> ExitCode {
    let query: QueryDescription = match read_json(&file) {
        Ok(query) => query,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let fields: Vec<FieldDefinition> = match fields.as_deref().map(read_json).transpose() {
        Ok(fields) => fields.unwrap_or_default(),
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let schema = schema.unwrap_or_else(|| dialect.default_schema().to_string());
    let pagination = if paginated {
        Pagination::Placeholders
    } else {
        Pagination::Literal
    };

    let builder = SqlBuilder::new(dialect);
    let result = builder
        .build_masked(&query, &fields, pagination, &schema)
        .map(|masked| masked.query);

    match result {
        Ok(built) => {
            println!("{}", built.sql);
            for (name, value) in &built.params {
                println!("-- :{} = {}", name, value);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Validation error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_engine(settings: &Settings) -> Result<QueryEngine, String> {
    let repo = Arc::new(InMemoryRepository::from_settings(settings).map_err(|e| e.to_string())?);
    let master = MasterKey::from_env().map_err(|e| e.to_string())?;
    let cipher = CredentialCipher::from_master_key(&master).map_err(|e| e.to_string())?;
    let factory = Arc::new(R2d2DataSourceFactory::new(
        Arc::new(cipher),
        settings.pool.clone(),
    ));
    Ok(QueryEngine::new(repo.clone(), repo, factory, settings))
}

fn cmd_test_query(
    settings: &Settings,
    tenant: TenantId,
    connector: ConnectorId,
    file: PathBuf,
) -> ExitCode {
    let query: QueryDescription = match read_json(&file) {
        Ok(query) => query,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let engine = match build_engine(settings) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = engine
        .find_connector(&tenant, &connector)
        .and_then(|connector| engine.execute_test_query(&tenant, &connector, query));

    match result {
        Ok(result) => print_json(&result),
        Err(e) => {
            eprintln!("Query failed ({:?}): {}", e.kind(), e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_query(
    settings: &Settings,
    tenant: TenantId,
    endpoint: EndpointId,
    page: u64,
    size: u64,
) -> ExitCode {
    let engine = match build_engine(settings) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match engine.execute_query(&tenant, &endpoint, page, size) {
        Ok(rows) => print_json(&rows),
        Err(e) => {
            eprintln!("Query failed ({:?}): {}", e.kind(), e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_encrypt_password(password: Option<String>) -> ExitCode {
    let master = match MasterKey::from_env() {
        Ok(master) if master.is_persistent() => master,
        Ok(_) => {
            eprintln!(
                "{} must be set to a valid key; run `dataport keygen` to create one",
                MASTER_KEY_ENV
            );
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("Error loading master key: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let password = match password {
        Some(password) => password,
        None => {
            let mut line = String::new();
            if let Err(e) = io::stdin().lock().read_line(&mut line) {
                eprintln!("Error reading password: {}", e);
                return ExitCode::FAILURE;
            }
            line.trim_end_matches(&['\r', '\n'][..]).to_string()
        }
    };

    let result = CredentialCipher::from_master_key(&master)
        .and_then(|cipher| cipher.encrypt(&password));
    match result {
        Ok(ciphertext) => {
            println!("{}", ciphertext);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Encryption failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_keygen() -> ExitCode {
    match crypto::generate_master_key() {
        Ok(key) => {
            println!("{}", crypto::encode_key(&key));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Key generation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
