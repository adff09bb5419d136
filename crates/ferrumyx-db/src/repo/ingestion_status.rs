//! `ingestion_status` rows plus the per-scope advisory lock that serializes
//! concurrent re-ingests of the same `(source_type, source_id)`.

use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::IngestionStatusRow;

/// Attempt a transaction-scoped advisory lock for this scope, held until
/// the transaction commits or rolls back. Returns `false` immediately
/// (never blocks) when another worker already holds the scope's lock —
/// callers surface `Conflict` in that case rather than queueing.
pub async fn try_lock_scope<'a>(
    tx: &mut Transaction<'a, Postgres>,
    source_type: &str,
    source_id: &str,
) -> Result<bool, sqlx::Error> {
    let key = format!("{source_type}:{source_id}");
    let (acquired,): (bool,) = sqlx::query_as("SELECT pg_try_advisory_xact_lock(hashtext($1))")
        .bind(key)
        .fetch_one(&mut **tx)
        .await?;
    Ok(acquired)
}

pub async fn get(
    pool: &PgPool,
    source_type: &str,
    source_id: &str,
) -> Result<Option<IngestionStatusRow>, sqlx::Error> {
    sqlx::query_as::<_, IngestionStatusRow>(
        "SELECT source_type, source_id, status, message, updated_at
         FROM ingestion_status WHERE source_type = $1 AND source_id = $2",
    )
    .bind(source_type)
    .bind(source_id)
    .fetch_optional(pool)
    .await
}

pub async fn list(pool: &PgPool) -> Result<Vec<IngestionStatusRow>, sqlx::Error> {
    sqlx::query_as::<_, IngestionStatusRow>(
        "SELECT source_type, source_id, status, message, updated_at FROM ingestion_status ORDER BY updated_at DESC",
    )
    .fetch_all(pool)
    .await
}

/// Upsert a status row, replacing (not merging) the prior `message`
/// payload, per §4.9's three-message sequence.
pub async fn set_status(
    pool: &PgPool,
    source_type: &str,
    source_id: &str,
    status: &str,
    message: Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO ingestion_status (source_type, source_id, status, message, updated_at)
         VALUES ($1, $2, $3, $4, now())
         ON CONFLICT (source_type, source_id)
         DO UPDATE SET status = EXCLUDED.status, message = EXCLUDED.message, updated_at = now()",
    )
    .bind(source_type)
    .bind(source_id)
    .bind(status)
    .bind(message)
    .execute(pool)
    .await?;
    Ok(())
}

/// Same upsert as [`set_status`], executed against a caller-owned
/// transaction so it commits atomically with whatever else that
/// transaction does (e.g. the delete+insert of an ingestion run).
pub async fn set_status_tx<'a>(
    tx: &mut Transaction<'a, Postgres>,
    source_type: &str,
    source_id: &str,
    status: &str,
    message: Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO ingestion_status (source_type, source_id, status, message, updated_at)
         VALUES ($1, $2, $3, $4, now())
         ON CONFLICT (source_type, source_id)
         DO UPDATE SET status = EXCLUDED.status, message = EXCLUDED.message, updated_at = now()",
    )
    .bind(source_type)
    .bind(source_id)
    .bind(status)
    .bind(message)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
