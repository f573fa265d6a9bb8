//! Configuration loading from disk.
//!
//! Values are resolved with the usual precedence: `HOTCFG_*` environment
//! variables override the file, which overrides built-in defaults. `${VAR}`
//! references inside the file are expanded from the process environment
//! before parsing; unset variables are left as written.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{self, ValidationIssue};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML (or does not match the schema).
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The file parsed but failed semantic validation.
    #[error("validation failed: {}", validation::join_issues(.0))]
    Validation(Vec<ValidationIssue>),
}

/// Load a configuration from a TOML file.
///
/// Missing keys fall back to defaults. The result is NOT validated; call
/// [`validation::validate`] on it before putting it into service.
pub fn load(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    load_str(&content)
}

/// Load a configuration from a TOML string.
pub fn load_str(content: &str) -> Result<AppConfig, ConfigError> {
    let expanded = expand_env_vars(content);
    let mut config: AppConfig = toml::from_str(&expanded)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Built-in defaults, used when no file exists yet.
pub fn defaults() -> AppConfig {
    AppConfig::default()
}

/// Replace `${VAR_NAME}` references with environment variable values.
///
/// Unset variables are left verbatim so the parse error (if any) points at
/// the original text.
pub fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find('}') {
            Some(end) => {
                let name = &rest[start + 2..start + 2 + end];
                match std::env::var(name) {
                    Ok(value) => out.push_str(&value),
                    Err(_) => out.push_str(&rest[start..start + end + 3]),
                }
                rest = &rest[start + end + 3..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

/// Apply `HOTCFG_*` environment variable overrides.
///
/// Values that fail to parse for the target type are ignored.
fn apply_env_overrides(config: &mut AppConfig) {
    // Thread configuration
    override_usize("HOTCFG_THREAD_POOL_SIZE", &mut config.thread.pool_size);
    override_string("HOTCFG_THREAD_QUEUE_TYPE", &mut config.thread.queue_type);
    override_usize("HOTCFG_THREAD_MAX_QUEUE_SIZE", &mut config.thread.max_queue_size);
    override_string("HOTCFG_THREAD_NAME_PREFIX", &mut config.thread.thread_name_prefix);

    // Logger configuration
    override_string("HOTCFG_LOGGER_LEVEL", &mut config.logger.level);
    override_bool("HOTCFG_LOGGER_ASYNC", &mut config.logger.async_logging);
    override_usize("HOTCFG_LOGGER_BUFFER_SIZE", &mut config.logger.buffer_size);
    override_string("HOTCFG_LOGGER_FILE_PATH", &mut config.logger.file_path);
    override_usize("HOTCFG_LOGGER_MAX_FILE_SIZE", &mut config.logger.max_file_size);
    override_usize("HOTCFG_LOGGER_MAX_BACKUP_FILES", &mut config.logger.max_backup_files);
    override_string("HOTCFG_LOGGER_FORMAT_PATTERN", &mut config.logger.format_pattern);
    override_list("HOTCFG_LOGGER_WRITERS", &mut config.logger.writers);

    // Monitoring configuration
    override_bool("HOTCFG_MONITORING_ENABLED", &mut config.monitoring.enabled);
    override_u64("HOTCFG_MONITORING_METRICS_INTERVAL_MS", &mut config.monitoring.metrics_interval_ms);
    override_u64("HOTCFG_MONITORING_HEALTH_CHECK_INTERVAL_MS", &mut config.monitoring.health_check_interval_ms);
    override_u16("HOTCFG_MONITORING_PROMETHEUS_PORT", &mut config.monitoring.prometheus_port);
    override_string("HOTCFG_MONITORING_PROMETHEUS_PATH", &mut config.monitoring.prometheus_path);
    override_bool("HOTCFG_MONITORING_TRACING_ENABLED", &mut config.monitoring.tracing.enabled);
    override_f64("HOTCFG_MONITORING_TRACING_SAMPLING_RATE", &mut config.monitoring.tracing.sampling_rate);
    override_string("HOTCFG_MONITORING_TRACING_EXPORTER", &mut config.monitoring.tracing.exporter);
    override_string("HOTCFG_MONITORING_TRACING_ENDPOINT", &mut config.monitoring.tracing.endpoint);

    // Database configuration
    override_string("HOTCFG_DATABASE_BACKEND", &mut config.database.backend);
    override_string("HOTCFG_DATABASE_CONNECTION_STRING", &mut config.database.connection_string);
    override_bool("HOTCFG_DATABASE_LOG_QUERIES", &mut config.database.log_queries);
    override_u64("HOTCFG_DATABASE_SLOW_QUERY_THRESHOLD_MS", &mut config.database.slow_query_threshold_ms);
    override_usize("HOTCFG_DATABASE_POOL_MIN_SIZE", &mut config.database.pool.min_size);
    override_usize("HOTCFG_DATABASE_POOL_MAX_SIZE", &mut config.database.pool.max_size);
    override_u64("HOTCFG_DATABASE_POOL_IDLE_TIMEOUT_MS", &mut config.database.pool.idle_timeout_ms);
    override_u64("HOTCFG_DATABASE_POOL_ACQUIRE_TIMEOUT_MS", &mut config.database.pool.acquire_timeout_ms);

    // Network configuration
    override_string("HOTCFG_NETWORK_COMPRESSION", &mut config.network.compression);
    override_usize("HOTCFG_NETWORK_BUFFER_SIZE", &mut config.network.buffer_size);
    override_u64("HOTCFG_NETWORK_CONNECT_TIMEOUT_MS", &mut config.network.connect_timeout_ms);
    override_u64("HOTCFG_NETWORK_IO_TIMEOUT_MS", &mut config.network.io_timeout_ms);
    override_u64("HOTCFG_NETWORK_KEEPALIVE_INTERVAL_MS", &mut config.network.keepalive_interval_ms);
    override_usize("HOTCFG_NETWORK_MAX_CONNECTIONS", &mut config.network.max_connections);
    override_bool("HOTCFG_NETWORK_TLS_ENABLED", &mut config.network.tls.enabled);
    override_string("HOTCFG_NETWORK_TLS_VERSION", &mut config.network.tls.version);
    override_string("HOTCFG_NETWORK_TLS_CERT_PATH", &mut config.network.tls.cert_path);
    override_string("HOTCFG_NETWORK_TLS_KEY_PATH", &mut config.network.tls.key_path);
    override_string("HOTCFG_NETWORK_TLS_CA_PATH", &mut config.network.tls.ca_path);
    override_bool("HOTCFG_NETWORK_TLS_VERIFY_PEER", &mut config.network.tls.verify_peer);
}

fn override_string(name: &str, target: &mut String) {
    if let Ok(value) = std::env::var(name) {
        *target = value;
    }
}

fn override_usize(name: &str, target: &mut usize) {
    if let Ok(value) = std::env::var(name) {
        if let Ok(parsed) = value.parse() {
            *target = parsed;
        }
    }
}

fn override_u64(name: &str, target: &mut u64) {
    if let Ok(value) = std::env::var(name) {
        if let Ok(parsed) = value.parse() {
            *target = parsed;
        }
    }
}

fn override_u16(name: &str, target: &mut u16) {
    if let Ok(value) = std::env::var(name) {
        if let Ok(parsed) = value.parse() {
            *target = parsed;
        }
    }
}

fn override_f64(name: &str, target: &mut f64) {
    if let Ok(value) = std::env::var(name) {
        if let Ok(parsed) = value.parse() {
            *target = parsed;
        }
    }
}

fn override_bool(name: &str, target: &mut bool) {
    if let Ok(value) = std::env::var(name) {
        match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => *target = true,
            "false" | "0" | "no" | "off" => *target = false,
            _ => {}
        }
    }
}

fn override_list(name: &str, target: &mut Vec<String>) {
    if let Ok(value) = std::env::var(name) {
        let items: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect();
        if !items.is_empty() {
            *target = items;
        }
    }
}
