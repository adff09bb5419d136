//! Connection pool construction.

use sqlx::postgres::{PgPoolOptions, PgPool};

/// Build a `PgPool` bounded by the usual web-server defaults. Acquisition
/// and release are scoped per unit of work by `sqlx` itself — a connection
/// is returned to the pool on every exit path, including panics, because
/// `PoolConnection`'s `Drop` impl checks it back in.
pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(16)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .connect(database_url)
        .await
}
