use sea_orm::{ConnectOptions, Database, DatabaseConnection};

/// In-memory SQLite connection with a single pooled connection so every
/// statement sees the same database.
pub async fn memory_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1);
    Database::connect(options)
        .await
        .expect("in-memory sqlite database")
}
