//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the host
//! application. All types derive Serde traits for deserialization from config
//! files, and `PartialEq` so reloads can report exactly which fields changed.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Worker thread pool settings.
    pub thread: ThreadConfig,

    /// Logging system settings.
    pub logger: LoggerConfig,

    /// Metrics, health checks, and tracing.
    pub monitoring: MonitoringConfig,

    /// Database backend and connection pool.
    pub database: DatabaseConfig,

    /// Network transport settings.
    pub network: NetworkConfig,
}

/// Thread pool configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ThreadConfig {
    /// Number of worker threads (0 = auto-detect).
    pub pool_size: usize,

    /// Task queue type: "mutex", "lockfree", "bounded".
    pub queue_type: String,

    /// Maximum queue size (for the bounded queue).
    pub max_queue_size: usize,

    /// Thread naming prefix.
    pub thread_name_prefix: String,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            pool_size: 0,
            queue_type: "lockfree".to_string(),
            max_queue_size: 10_000,
            thread_name_prefix: "worker".to_string(),
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Log level: "trace", "debug", "info", "warn", "error", "critical", "off".
    pub level: String,

    /// Writers to attach: "console", "file", "rotating_file", "network", "json".
    pub writers: Vec<String>,

    /// Enable async logging.
    #[serde(rename = "async")]
    pub async_logging: bool,

    /// Async buffer size in bytes.
    pub buffer_size: usize,

    /// Log file path (for file writers).
    pub file_path: String,

    /// Maximum file size in bytes (for rotating_file).
    pub max_file_size: usize,

    /// Maximum number of backup files (for rotating_file).
    pub max_backup_files: usize,

    /// Log format pattern.
    pub format_pattern: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            writers: vec!["console".to_string()],
            async_logging: true,
            buffer_size: 8192,
            file_path: "./logs/app.log".to_string(),
            max_file_size: 10 * 1024 * 1024,
            max_backup_files: 5,
            format_pattern: "[%Y-%m-%d %H:%M:%S.%e] [%l] [%t] %v".to_string(),
        }
    }
}

/// Distributed tracing configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Enable tracing.
    pub enabled: bool,

    /// Sampling rate (0.0 to 1.0).
    pub sampling_rate: f64,

    /// Exporter type: "otlp", "jaeger", "zipkin", "console".
    pub exporter: String,

    /// Exporter endpoint.
    pub endpoint: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sampling_rate: 0.1,
            exporter: "otlp".to_string(),
            endpoint: "http://localhost:4317".to_string(),
        }
    }
}

/// Monitoring system configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Enable monitoring.
    pub enabled: bool,

    /// Metrics collection interval in milliseconds.
    pub metrics_interval_ms: u64,

    /// Health check interval in milliseconds.
    pub health_check_interval_ms: u64,

    /// Tracing configuration.
    pub tracing: TracingConfig,

    /// Prometheus metrics port (0 to disable).
    pub prometheus_port: u16,

    /// Prometheus metrics path.
    pub prometheus_path: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            metrics_interval_ms: 5000,
            health_check_interval_ms: 30_000,
            tracing: TracingConfig::default(),
            prometheus_port: 9090,
            prometheus_path: "/metrics".to_string(),
        }
    }
}

/// Database connection pool configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Minimum pool size.
    pub min_size: usize,

    /// Maximum pool size.
    pub max_size: usize,

    /// Idle connection timeout in milliseconds.
    pub idle_timeout_ms: u64,

    /// Connection acquisition timeout in milliseconds.
    pub acquire_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 5,
            max_size: 20,
            idle_timeout_ms: 60_000,
            acquire_timeout_ms: 5000,
        }
    }
}

/// Database system configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Backend: "postgresql", "mysql", "sqlite", "mongodb", "redis".
    /// Empty means no database.
    pub backend: String,

    /// Connection string or URI.
    pub connection_string: String,

    /// Connection pool configuration.
    pub pool: PoolConfig,

    /// Enable query logging.
    pub log_queries: bool,

    /// Slow query threshold in milliseconds.
    pub slow_query_threshold_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: String::new(),
            connection_string: String::new(),
            pool: PoolConfig::default(),
            log_queries: false,
            slow_query_threshold_ms: 1000,
        }
    }
}

/// TLS/SSL configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Enable TLS.
    pub enabled: bool,

    /// TLS version: "1.2", "1.3".
    pub version: String,

    /// Certificate file path (PEM).
    pub cert_path: String,

    /// Private key file path (PEM).
    pub key_path: String,

    /// CA certificate path (for peer verification).
    pub ca_path: String,

    /// Verify peer certificate.
    pub verify_peer: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            version: "1.3".to_string(),
            cert_path: String::new(),
            key_path: String::new(),
            ca_path: String::new(),
            verify_peer: true,
        }
    }
}

/// Network system configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// TLS configuration.
    pub tls: TlsConfig,

    /// Compression type: "none", "lz4", "gzip", "deflate", "zstd".
    pub compression: String,

    /// Send/receive buffer size.
    pub buffer_size: usize,

    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Read/write timeout in milliseconds.
    pub io_timeout_ms: u64,

    /// Keep-alive interval in milliseconds.
    pub keepalive_interval_ms: u64,

    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            tls: TlsConfig::default(),
            compression: "lz4".to_string(),
            buffer_size: 65_536,
            connect_timeout_ms: 5000,
            io_timeout_ms: 30_000,
            keepalive_interval_ms: 15_000,
            max_connections: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let config = AppConfig::default();
        assert_eq!(config.logger.level, "info");
        assert_eq!(config.thread.queue_type, "lockfree");
        assert_eq!(config.thread.max_queue_size, 10_000);
        assert_eq!(config.monitoring.metrics_interval_ms, 5000);
        assert!(config.database.backend.is_empty());
        assert_eq!(config.network.compression, "lz4");
        assert_eq!(config.network.tls.version, "1.3");
    }

    #[test]
    fn default_configs_compare_equal() {
        assert_eq!(AppConfig::default(), AppConfig::default());
    }
}
