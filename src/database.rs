use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::OnceCell;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[from] sqlx::Error),
}

/// Lazily connected database handle. The pool is opened on the first
/// `ensure_connected` call and shared afterwards; a failed attempt is not
/// remembered, so the next call tries again.
pub struct Database {
    url: String,
    pool: OnceCell<SqlitePool>,
}

impl Database {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool: OnceCell::new(),
        }
    }

    pub async fn ensure_connected(&self) -> Result<&SqlitePool, DatabaseError> {
        self.pool
            .get_or_try_init(|| async {
                match SqlitePool::connect(&self.url).await {
                    Ok(pool) => {
                        tracing::info!("Database connected");
                        Ok(pool)
                    }
                    Err(e) => {
                        tracing::error!("Database connection error: {}", e);
                        Err(DatabaseError::ConnectionFailed(e))
                    }
                }
            })
            .await
    }

    /// Round-trips a trivial query on the shared pool.
    pub async fn ping(&self) -> Result<(), DatabaseError> {
        let pool = self.ensure_connected().await?;
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }
}

#[cfg(test)]
impl Database {
    pub fn is_connected(&self) -> bool {
        self.pool.initialized()
    }
}
