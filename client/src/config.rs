//! Configuration management for the client.

use jsync_engine::{Credential, ServiceType};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the journal service
    pub server_url: String,
    /// Account whose collections are synced
    pub account: String,
    /// Token presented to the journal service
    pub auth_token: Option<String>,
    /// SQLite connection URL of the collection registry
    pub database_url: String,
    /// Directory holding one store snapshot per collection
    pub data_dir: PathBuf,
    /// Service types to discover and sync
    pub services: Vec<ServiceType>,
    /// Timeout of every HTTP request
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_url = lookup("JSYNC_SERVER_URL").ok_or(ConfigError::Missing("JSYNC_SERVER_URL"))?;
        let account = lookup("JSYNC_ACCOUNT").ok_or(ConfigError::Missing("JSYNC_ACCOUNT"))?;

        let auth_token = lookup("JSYNC_AUTH_TOKEN").filter(|t| !t.is_empty());

        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://jsync.db?mode=rwc".to_string());

        let data_dir = lookup("JSYNC_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./jsync-data"));

        let services = match lookup("JSYNC_SERVICES") {
            Some(raw) => parse_services(&raw)?,
            None => vec![ServiceType::AddressBook],
        };

        let http_timeout = lookup("JSYNC_HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|| "30".to_string());
        let http_timeout = http_timeout
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or(ConfigError::Invalid {
                name: "JSYNC_HTTP_TIMEOUT_SECS",
                value: http_timeout,
            })?;

        Ok(Self {
            server_url,
            account,
            auth_token,
            database_url,
            data_dir,
            services,
            http_timeout,
        })
    }

    /// The credential for the journal service.
    ///
    /// A missing token means the account cannot be used for sync.
    pub fn credential(&self) -> jsync_engine::error::Result<Credential> {
        self.auth_token
            .as_deref()
            .map(Credential::new)
            .ok_or_else(|| {
                jsync_engine::Error::InvalidAccount(format!("no auth token for {}", self.account))
            })
    }
}

fn parse_services(raw: &str) -> Result<Vec<ServiceType>, ConfigError> {
    let mut services = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let service = ServiceType::parse(name).ok_or_else(|| ConfigError::Invalid {
            name: "JSYNC_SERVICES",
            value: name.to_string(),
        })?;
        if !services.contains(&service) {
            services.push(service);
        }
    }
    if services.is_empty() {
        return Err(ConfigError::Invalid {
            name: "JSYNC_SERVICES",
            value: raw.to_string(),
        });
    }
    Ok(services)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("Invalid {name} value: {value}")]
    Invalid { name: &'static str, value: String },
}
