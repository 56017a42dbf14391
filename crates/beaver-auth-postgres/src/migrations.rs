//! Embedded schema migrations.
//!
//! Migrations are compiled into the binary with `include_str!` and tracked in
//! the `_sqlx_migrations` table. To add one, create the SQL file under
//! `migrations/` and append it to `embedded_migrations!` below.

use std::borrow::Cow;

use sqlx_core::migrate::{Migration, MigrationType, Migrator};
use tracing::{info, instrument};

use crate::{PgPool, StorageError, StorageResult};

macro_rules! embedded_migrations {
    () => {
        &[
            (
                20250101000001i64,
                "users",
                include_str!("../migrations/20250101000001_users.sql"),
            ),
            (
                20250101000002i64,
                "refresh_tokens",
                include_str!("../migrations/20250101000002_refresh_tokens.sql"),
            ),
            (
                20250101000003i64,
                "consumed_continuations",
                include_str!("../migrations/20250101000003_consumed_continuations.sql"),
            ),
        ]
    };
}

fn build_migrations() -> Vec<Migration> {
    embedded_migrations!()
        .iter()
        .map(|(version, description, sql)| Migration {
            version: *version,
            description: Cow::Borrowed(description),
            migration_type: MigrationType::Simple,
            sql: Cow::Borrowed(sql),
            checksum: Cow::Borrowed(&[]),
            no_tx: false,
        })
        .collect()
}

/// Runs all pending migrations.
///
/// # Errors
///
/// Returns `StorageError::Migration` if a migration fails to apply.
#[instrument(skip(pool))]
pub async fn run(pool: &PgPool) -> StorageResult<()> {
    let migrations = build_migrations();
    info!(count = migrations.len(), "Running database migrations");

    let migrator = Migrator {
        migrations: Cow::Owned(migrations),
        ignore_missing: false,
        locking: true,
        no_tx: false,
    };

    migrator
        .run(pool)
        .await
        .map_err(|e| StorageError::Migration(e.to_string()))?;

    info!("Database migrations completed");
    Ok(())
}
