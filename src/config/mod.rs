//! Configuration module for the trip journal backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Signing key used when `TRIPS_JWT_SECRET` is unset.
pub const DEV_JWT_SECRET: &str = "dev-access-secret-change-in-production";
/// Signing key used when `TRIPS_JWT_REFRESH_SECRET` is unset.
pub const DEV_JWT_REFRESH_SECRET: &str = "dev-refresh-secret-change-in-production";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding trips.json and activities.json
    pub data_dir: PathBuf,
    /// Directory uploaded files are written to and served from
    pub uploads_dir: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Access token signing key
    pub jwt_secret: String,
    /// Refresh token signing key
    pub jwt_refresh_secret: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, std::net::AddrParseError> {
        dotenvy::dotenv().ok();

        let data_dir = env::var("TRIPS_DATA_DIR")
            .unwrap_or_else(|_| "./data".to_string())
            .into();

        let uploads_dir = env::var("TRIPS_UPLOADS_DIR")
            .unwrap_or_else(|_| "./uploads".to_string())
            .into();

        let bind_addr = env::var("TRIPS_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:4000".to_string())
            .parse()?;

        let jwt_secret =
            env::var("TRIPS_JWT_SECRET").unwrap_or_else(|_| DEV_JWT_SECRET.to_string());
        let jwt_refresh_secret = env::var("TRIPS_JWT_REFRESH_SECRET")
            .unwrap_or_else(|_| DEV_JWT_REFRESH_SECRET.to_string());

        let log_level = env::var("TRIPS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            data_dir,
            uploads_dir,
            bind_addr,
            jwt_secret,
            jwt_refresh_secret,
            log_level,
        })
    }

    /// Whether either signing key is still the development placeholder.
    pub fn uses_dev_secrets(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET || self.jwt_refresh_secret == DEV_JWT_REFRESH_SECRET
    }

    pub fn trips_path(&self) -> PathBuf {
        self.data_dir.join("trips.json")
    }

    pub fn activities_path(&self) -> PathBuf {
        self.data_dir.join("activities.json")
    }
}
