//! Consumed device-flow continuations.
//!
//! Rows are only needed until the continuation's own expiry; expired rows are
//! pruned opportunistically on insert.

use sqlx_core::query::query;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgConnection;
use time::OffsetDateTime;

use crate::StorageResult;

/// Marks a continuation as consumed on `conn`, normally inside the sign-in
/// transaction.
///
/// Returns `true` for the first caller and `false` for every later one. A
/// concurrent caller blocks on the unique key until the first transaction
/// commits or rolls back, so a rolled-back sign-in leaves the continuation
/// usable.
pub(crate) async fn consume_continuation(
    conn: &mut PgConnection,
    continuation_hash: &str,
    expires_at: OffsetDateTime,
) -> StorageResult<bool> {
    query("DELETE FROM consumed_continuations WHERE expires_at < NOW()")
        .execute(&mut *conn)
        .await?;

    let inserted: Option<String> = query_scalar(
        r#"
        INSERT INTO consumed_continuations (continuation_hash, expires_at)
        VALUES ($1, $2)
        ON CONFLICT (continuation_hash) DO NOTHING
        RETURNING continuation_hash
        "#,
    )
    .bind(continuation_hash)
    .bind(expires_at)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(inserted.is_some())
}
