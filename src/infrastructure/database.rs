//! Pooled SQLite connection

use crate::infrastructure::config::AppConfig;
use di::{Ref, inject, injectable};
use log::{error, info};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use std::sync::RwLock;

static INSTALLED_POOL: RwLock<Option<SqlitePool>> = RwLock::new(None);

pub struct DatabaseConnection {
    connection: SqlitePool,
}

#[injectable]
impl DatabaseConnection {
    #[inject]
    pub fn create(config: Ref<AppConfig>) -> DatabaseConnection {
        if let Some(pool) = Self::installed_pool() {
            return DatabaseConnection { connection: pool };
        }

        let options = SqliteConnectOptions::from_str(&config.database_url).unwrap_or_else(|e| {
            error!("invalid DATABASE_URL `{}`: {e}", config.database_url);
            SqliteConnectOptions::new()
        });

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_lazy_with(options);

        DatabaseConnection { connection: pool }
    }
}

impl DatabaseConnection {
    pub fn from_pool(pool: SqlitePool) -> DatabaseConnection {
        DatabaseConnection { connection: pool }
    }

    /// Opens the pool for `database_url` and brings the schema up to date.
    pub async fn connect_and_migrate(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::migrate!().run(&pool).await?;
        info!("database migrations applied");

        Ok(pool)
    }

    /// Shares `pool` with every `DatabaseConnection` the container creates from now on.
    pub fn install_pool(pool: SqlitePool) {
        match INSTALLED_POOL.write() {
            Ok(mut guard) => *guard = Some(pool),
            Err(poisoned) => *poisoned.into_inner() = Some(pool),
        }
    }

    pub fn set_test_pool(pool: SqlitePool) {
        Self::install_pool(pool);
    }

    pub fn clear_test_pool() {
        match INSTALLED_POOL.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    fn installed_pool() -> Option<SqlitePool> {
        match INSTALLED_POOL.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Deref for DatabaseConnection {
    type Target = SqlitePool;

    fn deref(&self) -> &Self::Target {
        &self.connection
    }
}

impl DerefMut for DatabaseConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.connection
    }
}
