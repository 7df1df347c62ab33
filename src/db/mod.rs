//! Database connection wrapper.
//!
//! Grounded on `main.rs`'s `Database::connect(&config.database_url)`
//! call site — the `Database` struct itself wasn't in the retrieval
//! pack.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }
}
