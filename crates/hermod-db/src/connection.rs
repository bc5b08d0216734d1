//! Database connection handling.

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

/// Connection settings for the SurrealDB backend, overridable through
/// `HERMOD_DB_*` environment variables.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Host and port of the WebSocket endpoint, without a scheme.
    pub url: String,
    /// Namespace to select after signing in.
    pub namespace: String,
    /// Database to select within the namespace.
    pub database: String,
    /// Root-level username.
    pub username: String,
    /// Root-level password.
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "hermod".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

impl DbConfig {
    /// Read settings from the environment, keeping the defaults for
    /// anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("HERMOD_DB_URL").unwrap_or(defaults.url),
            namespace: std::env::var("HERMOD_DB_NAMESPACE").unwrap_or(defaults.namespace),
            database: std::env::var("HERMOD_DB_DATABASE").unwrap_or(defaults.database),
            username: std::env::var("HERMOD_DB_USERNAME").unwrap_or(defaults.username),
            password: std::env::var("HERMOD_DB_PASSWORD").unwrap_or(defaults.password),
        }
    }
}

/// Owns the live SurrealDB client handle.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    /// Open a WebSocket connection, sign in as root, and select the
    /// configured namespace and database.
    pub async fn connect(config: &DbConfig) -> Result<Self, surrealdb::Error> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "opening SurrealDB connection"
        );

        let db = Surreal::new::<Ws>(&config.url).await?;
        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!("SurrealDB connection ready");
        Ok(Self { db })
    }

    /// The underlying client, for repositories and migrations.
    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }
}
