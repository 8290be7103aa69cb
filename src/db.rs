use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;

/// Reconciliation is batch work: a handful of connections is plenty, and it
/// keeps the worker pool from overwhelming the source store.
pub async fn init_db(database_url: &str) -> MySqlPool {
    MySqlPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .expect("Failed to connect to database")
}
