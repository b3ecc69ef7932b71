use crate::config::{AppConfig, AppConfigError};
use crate::errors::ServiceError;
use crate::metrics::{
    MetricsRegistry, DB_OPERATIONS_TOTAL, DB_OPERATION_DURATION, DB_OPERATION_ERRORS_TOTAL,
};
use futures::future::BoxFuture;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Idle timeout duration
    pub idle_timeout: Duration,
    /// Acquire connection timeout
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl DbConfig {
    /// Builds pool settings from the application config, resolving the database URL.
    pub fn from_app_config(cfg: &AppConfig) -> Result<Self, AppConfigError> {
        Ok(Self {
            url: cfg.database_url()?,
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        })
    }
}

/// Establishes a connection pool to the database with custom configuration
///
/// # Errors
/// Returns the driver error if the connection cannot be established
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, DbErr> {
    let mut opt = ConnectOptions::new(config.url.clone());

    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let db_pool = Database::connect(opt).await?;

    info!("Database connection pool established successfully");

    Ok(db_pool)
}

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> anyhow::Result<DbPool> {
    let db_cfg = DbConfig::from_app_config(cfg)?;
    Ok(establish_connection_with_config(&db_cfg).await?)
}

/// Store gateway: every query runs through [`DatabaseAccess::execute`], which logs,
/// records per-operation metrics and maps driver errors to [`ServiceError`].
#[derive(Debug, Clone)]
pub struct DatabaseAccess {
    pool: Arc<DbPool>,
    metrics: Arc<MetricsRegistry>,
}

impl DatabaseAccess {
    pub fn new(pool: Arc<DbPool>, metrics: Arc<MetricsRegistry>) -> Self {
        Self { pool, metrics }
    }

    /// Get a reference to the connection pool
    pub fn get_pool(&self) -> &DbPool {
        &self.pool
    }

    /// Execute query with metrics and logging
    pub async fn execute<F, T>(&self, operation: &str, f: F) -> Result<T, ServiceError>
    where
        F: for<'a> FnOnce(&'a DbPool) -> BoxFuture<'a, Result<T, DbErr>> + Send,
        T: Send,
    {
        let db = &*self.pool;
        let start = std::time::Instant::now();
        let labels = [("operation", operation)];

        debug!(operation = %operation, "Starting database operation");
        self.metrics
            .counter_with_labels(DB_OPERATIONS_TOTAL, &labels)
            .inc();

        let result = f(db).await.map_err(|e| {
            error!(operation = %operation, error = %e, "Database operation failed");
            self.metrics
                .counter_with_labels(DB_OPERATION_ERRORS_TOTAL, &labels)
                .inc();
            ServiceError::DatabaseError(e)
        });

        let elapsed = start.elapsed();
        self.metrics
            .histogram_with_labels(DB_OPERATION_DURATION, &labels)
            .observe_duration(elapsed);

        if result.is_ok() {
            debug!(operation = %operation, duration = ?elapsed, "Database operation completed successfully");
        }

        result
    }
}

/// Creates the products table if it does not exist yet
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbErr> {
    info!("Running database migrations");
    let start = std::time::Instant::now();

    let result = crate::migrator::Migrator::up(pool, None).await;

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => info!(
            "Database migrations completed successfully in {:?}",
            elapsed
        ),
        Err(e) => error!("Database migrations failed after {:?}: {}", elapsed, e),
    }

    result
}

/// Checks if the database connection is active
pub async fn check_connection(pool: &DbPool) -> Result<(), DbErr> {
    debug!("Checking database connection");
    let start = std::time::Instant::now();

    let result = pool.ping().await;

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => debug!("Database connection check successful in {:?}", elapsed),
        Err(e) => error!(
            "Database connection check failed after {:?}: {}",
            elapsed, e
        ),
    }

    result
}
