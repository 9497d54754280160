//! Server configuration.

use std::time::Duration;

use ratewatch_common::{RatewatchError, Result};
use ratewatch_fx::SnapshotRateBasis;

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 8000,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database URL. `memory` selects the in-process store.
    pub database_url: String,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// How long a writer waits on a locked database.
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://ratewatch.db".to_string(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl StoreConfig {
    /// Whether the in-process store is selected.
    pub fn is_in_process(&self) -> bool {
        self.database_url == "memory"
    }
}

/// List pagination configuration.
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// Page size applied when a client asks for none. `None` returns whole lists.
    pub default_page_size: Option<usize>,
    /// Upper bound on a requested page size.
    pub max_page_size: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: None,
            max_page_size: 1000,
        }
    }
}

/// Trend computation configuration.
#[derive(Debug, Clone, Default)]
pub struct TrendConfig {
    /// Which day's rate daily snapshots report.
    pub snapshot_basis: SnapshotRateBasis,
}

/// Main server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP configuration.
    pub http: HttpConfig,
    /// Storage configuration.
    pub store: StoreConfig,
    /// Pagination configuration.
    pub pagination: PaginationConfig,
    /// Trend configuration.
    pub trend: TrendConfig,
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            store: StoreConfig::default(),
            pagination: PaginationConfig::default(),
            trend: TrendConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("RATEWATCH_LISTEN_ADDR") {
            config.http.listen_addr = addr;
        }

        if let Some(port) = lookup("RATEWATCH_LISTEN_PORT") {
            if let Ok(port) = port.parse() {
                config.http.listen_port = port;
            }
        }

        if let Some(url) = lookup("DATABASE_URL") {
            config.store.database_url = url;
        }

        if let Some(max) = lookup("RATEWATCH_MAX_CONNECTIONS") {
            if let Ok(max) = max.parse() {
                config.store.max_connections = max;
            }
        }

        if let Some(size) = lookup("RATEWATCH_PAGE_SIZE") {
            if let Ok(size) = size.parse() {
                config.pagination.default_page_size = Some(size);
            }
        }

        if let Some(basis) = lookup("RATEWATCH_SNAPSHOT_BASIS") {
            match basis.to_ascii_lowercase().as_str() {
                "call_date" => config.trend.snapshot_basis = SnapshotRateBasis::CallDate,
                "requested_date" => config.trend.snapshot_basis = SnapshotRateBasis::RequestedDate,
                _ => {}
            }
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.http.listen_port == 0 {
            return Err(invalid("Listen port cannot be 0"));
        }

        if self.store.database_url.is_empty() {
            return Err(invalid("Database URL cannot be empty"));
        }

        if self.store.max_connections == 0 {
            return Err(invalid("Max connections cannot be 0"));
        }

        if self.pagination.max_page_size == 0 {
            return Err(invalid("Max page size cannot be 0"));
        }

        if let Some(size) = self.pagination.default_page_size {
            if size == 0 || size > self.pagination.max_page_size {
                return Err(invalid(format!(
                    "Default page size must be between 1 and {}",
                    self.pagination.max_page_size
                )));
            }
        }

        Ok(())
    }

    /// Socket address string to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.http.listen_addr, self.http.listen_port)
    }
}

fn invalid(message: impl Into<String>) -> RatewatchError {
    RatewatchError::ConfigurationError(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
    }

    #[test]
    fn test_invalid_config() {
        let mut config = ServerConfig::default();
        config.http.listen_port = 0;
        assert!(matches!(
            config.validate(),
            Err(RatewatchError::ConfigurationError(_))
        ));

        let mut config = ServerConfig::default();
        config.pagination.default_page_size = Some(0);
        let err = config.validate().unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("RATEWATCH_LISTEN_PORT", "9100"),
            ("DATABASE_URL", "memory"),
            ("RATEWATCH_PAGE_SIZE", "25"),
            ("RATEWATCH_SNAPSHOT_BASIS", "requested_date"),
            ("RATEWATCH_MAX_CONNECTIONS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = ServerConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.http.listen_port, 9100);
        assert!(config.store.is_in_process());
        assert_eq!(config.pagination.default_page_size, Some(25));
        assert_eq!(config.trend.snapshot_basis, SnapshotRateBasis::RequestedDate);
        assert_eq!(config.store.max_connections, 5);
    }
}
