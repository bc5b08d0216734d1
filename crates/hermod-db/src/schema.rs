//! SurrealDB table definitions and the migration runner.
//!
//! Tables are SCHEMAFULL; structured sub-configs use FLEXIBLE object
//! fields. Record ids are UUID strings, and status-like columns carry
//! ASSERT constraints so bad writes fail at the database.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration bookkeeping
// -----------------------------------------------------------------------

/// DDL for the version-tracking table itself. Uses IF NOT EXISTS so it
/// can run unconditionally on every startup.
const TRACKING_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS schema_migrations SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE schema_migrations TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE schema_migrations TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE schema_migrations \
    TYPE datetime DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_schema_migrations_version \
    ON TABLE schema_migrations COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct AppliedMigration {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    ddl: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    ddl: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Instance groups (balancing pools)
-- =======================================================================
DEFINE TABLE instance_group SCHEMAFULL;
DEFINE FIELD name ON TABLE instance_group TYPE string;
DEFINE FIELD alias ON TABLE instance_group TYPE string;
DEFINE FIELD description ON TABLE instance_group TYPE option<string>;
DEFINE FIELD enabled ON TABLE instance_group TYPE bool DEFAULT true;
DEFINE FIELD instances ON TABLE instance_group TYPE array;
DEFINE FIELD instances.* ON TABLE instance_group TYPE string;
DEFINE FIELD created_at ON TABLE instance_group TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE instance_group TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_instance_group_name ON TABLE instance_group \
    COLUMNS name UNIQUE;
DEFINE INDEX idx_instance_group_alias ON TABLE instance_group \
    COLUMNS alias UNIQUE;

-- =======================================================================
-- External webhooks (event subscribers)
-- =======================================================================
DEFINE TABLE external_webhook SCHEMAFULL;
DEFINE FIELD name ON TABLE external_webhook TYPE string;
DEFINE FIELD url ON TABLE external_webhook TYPE string;
DEFINE FIELD description ON TABLE external_webhook TYPE option<string>;
DEFINE FIELD enabled ON TABLE external_webhook TYPE bool DEFAULT true;
DEFINE FIELD events ON TABLE external_webhook TYPE array;
DEFINE FIELD events.* ON TABLE external_webhook TYPE string;
DEFINE FIELD headers ON TABLE external_webhook TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD authentication ON TABLE external_webhook TYPE object \
    FLEXIBLE DEFAULT {};
DEFINE FIELD retry_config ON TABLE external_webhook TYPE object \
    FLEXIBLE DEFAULT {};
DEFINE FIELD security_config ON TABLE external_webhook TYPE object \
    FLEXIBLE DEFAULT {};
DEFINE FIELD filter_config ON TABLE external_webhook TYPE object \
    FLEXIBLE DEFAULT {};
DEFINE FIELD timeout_ms ON TABLE external_webhook TYPE int \
    DEFAULT 30000;
DEFINE FIELD total_executions ON TABLE external_webhook TYPE int \
    DEFAULT 0;
DEFINE FIELD successful_executions ON TABLE external_webhook TYPE int \
    DEFAULT 0;
DEFINE FIELD failed_executions ON TABLE external_webhook TYPE int \
    DEFAULT 0;
DEFINE FIELD last_execution_at ON TABLE external_webhook \
    TYPE option<datetime>;
DEFINE FIELD last_execution_status ON TABLE external_webhook \
    TYPE option<string> ASSERT $value IN [NONE, 'success', 'failed'];
DEFINE FIELD last_execution_error ON TABLE external_webhook \
    TYPE option<string>;
DEFINE FIELD created_at ON TABLE external_webhook TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE external_webhook TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_external_webhook_name ON TABLE external_webhook \
    COLUMNS name UNIQUE;
DEFINE INDEX idx_external_webhook_enabled ON TABLE external_webhook \
    COLUMNS enabled;
DEFINE INDEX idx_external_webhook_last_execution_at \
    ON TABLE external_webhook COLUMNS last_execution_at;
";

// -----------------------------------------------------------------------
// Runner
// -----------------------------------------------------------------------

/// Bring the database up to the latest schema version.
///
/// Looks up the highest version recorded in `schema_migrations` and
/// applies everything newer, recording each step. The DDL itself is
/// idempotent, so a crash between applying and recording only costs a
/// harmless re-run.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(TRACKING_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(format!("tracking table setup: {e}")))?;

    let mut result = db
        .query("SELECT * FROM schema_migrations ORDER BY version DESC LIMIT 1")
        .await?;
    let applied: Vec<AppliedMigration> = result.take(0)?;
    let current = applied.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        info!(
            version = migration.version,
            name = migration.name,
            "running schema migration"
        );

        db.query(migration.ddl).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "schema migration v{} ({}) failed: {e}",
                migration.version, migration.name,
            ))
        })?;

        db.query("CREATE schema_migrations SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "could not record migration v{}: {e}",
                    migration.version,
                ))
            })?;

        info!(version = migration.version, "schema migration done");
    }

    Ok(())
}
