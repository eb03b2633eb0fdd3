//! Configuration module
//!
//! Environment-driven configuration for the API server, worker, and backend
//! selection. `Config::from_env()` is the single entry point; defaults keep
//! a development instance runnable with nothing but `DATA_BACKEND=memory`
//! and `STORAGE_BACKEND=memory`.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::constants::{
    DEFAULT_MAX_RECEIVE_COUNT, DEFAULT_VISIBILITY_TIMEOUT_SECS, GRANT_TTL_SECS,
    PROCESSED_JPEG_QUALITY, PROCESSED_MAX_DIMENSIONS,
};
use crate::storage_types::StorageBackend;

// Common constants
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Backend for the metadata store and the work queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataBackend {
    Postgres,
    Memory,
}

impl FromStr for DataBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(DataBackend::Postgres),
            "memory" => Ok(DataBackend::Memory),
            _ => Err(anyhow::anyhow!("Invalid data backend: {}", s)),
        }
    }
}

impl Display for DataBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DataBackend::Postgres => write!(f, "postgres"),
            DataBackend::Memory => write!(f, "memory"),
        }
    }
}

/// Base configuration shared by server and worker
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
    pub log_json: bool,
}

/// Pipeline configuration
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub base: BaseConfig,
    // Metadata store + work queue backend
    pub data_backend: DataBackend,
    pub database_url: Option<String>,
    // Blob storage configuration
    pub storage_backend: Option<StorageBackend>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO etc.)
    pub aws_region: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // Upload/download grants
    pub grant_ttl_secs: u64,
    // Request limits
    pub max_body_bytes: usize,
    // Queue behavior
    pub queue_visibility_timeout_secs: u64,
    pub queue_max_receive_count: u32,
    // Worker pool
    pub worker_enabled: bool,
    pub worker_max_workers: usize,
    pub worker_poll_interval_ms: u64,
    // Processed rendition parameters
    pub processed_max_width: u32,
    pub processed_max_height: u32,
    pub processed_jpeg_quality: u8,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<PipelineConfig>);

impl Config {
    fn as_pipeline(&self) -> &PipelineConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.as_pipeline().base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = PipelineConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_pipeline().validate()
    }

    // Convenience getters for common fields
    pub fn server_port(&self) -> u16 {
        self.as_pipeline().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_pipeline().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.as_pipeline().base.environment
    }

    pub fn log_json(&self) -> bool {
        self.as_pipeline().base.log_json
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_pipeline().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_pipeline().base.db_timeout_seconds
    }

    pub fn data_backend(&self) -> DataBackend {
        self.as_pipeline().data_backend
    }

    pub fn database_url(&self) -> Option<&str> {
        self.as_pipeline().database_url.as_deref()
    }

    pub fn storage_backend(&self) -> Option<StorageBackend> {
        self.as_pipeline().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.as_pipeline().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.as_pipeline().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.as_pipeline().s3_endpoint.as_deref()
    }

    pub fn aws_region(&self) -> Option<&str> {
        self.as_pipeline().aws_region.as_deref()
    }

    pub fn aws_access_key_id(&self) -> Option<&str> {
        self.as_pipeline().aws_access_key_id.as_deref()
    }

    pub fn aws_secret_access_key(&self) -> Option<&str> {
        self.as_pipeline().aws_secret_access_key.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.as_pipeline().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.as_pipeline().local_storage_base_url.as_deref()
    }

    pub fn grant_ttl_secs(&self) -> u64 {
        self.as_pipeline().grant_ttl_secs
    }

    pub fn max_body_bytes(&self) -> usize {
        self.as_pipeline().max_body_bytes
    }

    pub fn queue_visibility_timeout_secs(&self) -> u64 {
        self.as_pipeline().queue_visibility_timeout_secs
    }

    pub fn queue_max_receive_count(&self) -> u32 {
        self.as_pipeline().queue_max_receive_count
    }

    pub fn worker_enabled(&self) -> bool {
        self.as_pipeline().worker_enabled
    }

    pub fn worker_max_workers(&self) -> usize {
        self.as_pipeline().worker_max_workers
    }

    pub fn worker_poll_interval_ms(&self) -> u64 {
        self.as_pipeline().worker_poll_interval_ms
    }

    pub fn processed_max_width(&self) -> u32 {
        self.as_pipeline().processed_max_width
    }

    pub fn processed_max_height(&self) -> u32 {
        self.as_pipeline().processed_max_height
    }

    pub fn processed_jpeg_quality(&self) -> u8 {
        self.as_pipeline().processed_jpeg_quality
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        const MAX_BODY_KB: usize = 64;
        const WORKER_MAX_WORKERS: usize = 4;
        const WORKER_POLL_INTERVAL_MS: u64 = 1000;

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            environment,
            log_json: env::var("LOG_JSON")
                .unwrap_or_else(|_| "false".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(false),
        };

        let data_backend = env::var("DATA_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse::<DataBackend>()?;

        let storage_backend = env::var("STORAGE_BACKEND")
            .ok()
            .and_then(|s| s.parse::<StorageBackend>().ok());

        let config = PipelineConfig {
            base,
            data_backend,
            database_url: env::var("DATABASE_URL").ok(),
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            aws_region: env::var("AWS_REGION").ok(),
            aws_access_key_id: env::var("AWS_ACCESS_KEY_ID").ok(),
            aws_secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            grant_ttl_secs: env::var("GRANT_TTL_SECS")
                .unwrap_or_else(|_| GRANT_TTL_SECS.to_string())
                .parse()
                .unwrap_or(GRANT_TTL_SECS),
            max_body_bytes: env::var("MAX_BODY_KB")
                .unwrap_or_else(|_| MAX_BODY_KB.to_string())
                .parse::<usize>()
                .unwrap_or(MAX_BODY_KB)
                * 1024,
            queue_visibility_timeout_secs: env::var("QUEUE_VISIBILITY_TIMEOUT_SECS")
                .unwrap_or_else(|_| DEFAULT_VISIBILITY_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(DEFAULT_VISIBILITY_TIMEOUT_SECS),
            queue_max_receive_count: env::var("QUEUE_MAX_RECEIVE_COUNT")
                .unwrap_or_else(|_| DEFAULT_MAX_RECEIVE_COUNT.to_string())
                .parse()
                .unwrap_or(DEFAULT_MAX_RECEIVE_COUNT),
            worker_enabled: env::var("WORKER_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(true),
            worker_max_workers: env::var("WORKER_MAX_WORKERS")
                .unwrap_or_else(|_| WORKER_MAX_WORKERS.to_string())
                .parse()
                .unwrap_or(WORKER_MAX_WORKERS),
            worker_poll_interval_ms: env::var("WORKER_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| WORKER_POLL_INTERVAL_MS.to_string())
                .parse()
                .unwrap_or(WORKER_POLL_INTERVAL_MS),
            processed_max_width: env::var("PROCESSED_MAX_WIDTH")
                .unwrap_or_else(|_| PROCESSED_MAX_DIMENSIONS.0.to_string())
                .parse()
                .unwrap_or(PROCESSED_MAX_DIMENSIONS.0),
            processed_max_height: env::var("PROCESSED_MAX_HEIGHT")
                .unwrap_or_else(|_| PROCESSED_MAX_DIMENSIONS.1.to_string())
                .parse()
                .unwrap_or(PROCESSED_MAX_DIMENSIONS.1),
            processed_jpeg_quality: env::var("PROCESSED_JPEG_QUALITY")
                .unwrap_or_else(|_| PROCESSED_JPEG_QUALITY.to_string())
                .parse()
                .unwrap_or(PROCESSED_JPEG_QUALITY),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.data_backend == DataBackend::Postgres {
            let url = self.database_url.as_deref().ok_or_else(|| {
                anyhow::anyhow!("DATABASE_URL must be set when using the postgres data backend")
            })?;
            if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        // Validate blob storage backend configuration
        let backend = self.storage_backend.unwrap_or(StorageBackend::S3);
        match backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
            StorageBackend::Memory => {}
        }

        if self.grant_ttl_secs == 0 {
            return Err(anyhow::anyhow!("GRANT_TTL_SECS must be greater than zero"));
        }
        if self.queue_visibility_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "QUEUE_VISIBILITY_TIMEOUT_SECS must be greater than zero"
            ));
        }
        if self.queue_max_receive_count == 0 {
            return Err(anyhow::anyhow!(
                "QUEUE_MAX_RECEIVE_COUNT must be at least 1"
            ));
        }
        if self.worker_max_workers == 0 {
            return Err(anyhow::anyhow!("WORKER_MAX_WORKERS must be at least 1"));
        }
        if self.processed_jpeg_quality == 0 || self.processed_jpeg_quality > 100 {
            return Err(anyhow::anyhow!(
                "PROCESSED_JPEG_QUALITY must be between 1 and 100"
            ));
        }
        if self.processed_max_width == 0 || self.processed_max_height == 0 {
            return Err(anyhow::anyhow!(
                "PROCESSED_MAX_WIDTH and PROCESSED_MAX_HEIGHT must be greater than zero"
            ));
        }

        Ok(())
    }
}
