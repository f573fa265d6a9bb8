//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check enum-valued fields against their allowed sets
//! - Validate value ranges (sampling rate, queue and pool sizes)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function over the config; warnings are logged but
//!   never fail the config

use std::fmt;

use crate::config::loader::ConfigError;
use crate::config::schema::{
    AppConfig, DatabaseConfig, LoggerConfig, MonitoringConfig, NetworkConfig, ThreadConfig,
};

const VALID_QUEUE_TYPES: &[&str] = &["mutex", "lockfree", "bounded"];
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "critical", "off"];
const VALID_WRITERS: &[&str] = &["console", "file", "rotating_file", "network", "json"];
const VALID_EXPORTERS: &[&str] = &["otlp", "jaeger", "zipkin", "console"];
const VALID_BACKENDS: &[&str] = &["postgresql", "mysql", "sqlite", "mongodb", "redis"];
const VALID_COMPRESSIONS: &[&str] = &["none", "lz4", "gzip", "deflate", "zstd"];
const VALID_TLS_VERSIONS: &[&str] = &["1.2", "1.3"];

/// A single finding from validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Dot-separated path of the offending field.
    pub field_path: String,

    /// Human-readable description.
    pub message: String,

    /// Warnings are reported but do not fail validation.
    pub warning: bool,
}

impl ValidationIssue {
    fn error(field_path: &str, message: String) -> Self {
        Self { field_path: field_path.to_string(), message, warning: false }
    }

    fn warn(field_path: &str, message: &str) -> Self {
        Self {
            field_path: field_path.to_string(),
            message: message.to_string(),
            warning: true,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field_path, self.message)
    }
}

/// Render a list of issues as a single comma-separated line.
pub(crate) fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate a configuration.
///
/// Warnings are logged through `tracing` and tolerated; any error-level issue
/// fails the whole config.
pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    let all = issues(config);

    for issue in all.iter().filter(|issue| issue.warning) {
        tracing::warn!(field = %issue.field_path, "{}", issue.message);
    }

    let errors: Vec<ValidationIssue> = all.into_iter().filter(|issue| !issue.warning).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation(errors))
    }
}

/// Collect every validation finding, errors and warnings alike.
pub fn issues(config: &AppConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    check_thread(&config.thread, &mut issues);
    check_logger(&config.logger, &mut issues);
    check_monitoring(&config.monitoring, &mut issues);
    check_database(&config.database, &mut issues);
    check_network(&config.network, &mut issues);

    issues
}

fn allowed(valid: &[&str], value: &str) -> bool {
    valid.contains(&value)
}

fn invalid_value(field: &str, value: &str, valid: &[&str]) -> ValidationIssue {
    ValidationIssue::error(
        field,
        format!("invalid value \"{}\", expected one of: {}", value, valid.join(", ")),
    )
}

fn check_thread(config: &ThreadConfig, issues: &mut Vec<ValidationIssue>) {
    if !allowed(VALID_QUEUE_TYPES, &config.queue_type) {
        issues.push(invalid_value("thread.queue_type", &config.queue_type, VALID_QUEUE_TYPES));
    }
    if config.max_queue_size == 0 {
        issues.push(ValidationIssue::error(
            "thread.max_queue_size",
            "queue size must be greater than 0".to_string(),
        ));
    }
}

fn check_logger(config: &LoggerConfig, issues: &mut Vec<ValidationIssue>) {
    if !allowed(VALID_LOG_LEVELS, &config.level) {
        issues.push(invalid_value("logger.level", &config.level, VALID_LOG_LEVELS));
    }
    for writer in &config.writers {
        if !allowed(VALID_WRITERS, writer) {
            issues.push(invalid_value("logger.writers", writer, VALID_WRITERS));
        }
    }
    if config.async_logging && config.buffer_size < 1024 {
        issues.push(ValidationIssue::warn(
            "logger.buffer_size",
            "buffer is very small for async logging; consider at least 1024 bytes",
        ));
    }
}

fn check_monitoring(config: &MonitoringConfig, issues: &mut Vec<ValidationIssue>) {
    if !(0.0..=1.0).contains(&config.tracing.sampling_rate) {
        issues.push(ValidationIssue::error(
            "monitoring.tracing.sampling_rate",
            "sampling rate must be between 0.0 and 1.0".to_string(),
        ));
    }
    if !allowed(VALID_EXPORTERS, &config.tracing.exporter) {
        issues.push(invalid_value(
            "monitoring.tracing.exporter",
            &config.tracing.exporter,
            VALID_EXPORTERS,
        ));
    }
    if config.metrics_interval_ms < 1000 {
        issues.push(ValidationIssue::warn(
            "monitoring.metrics_interval_ms",
            "metrics interval below 1s may cause performance issues",
        ));
    }
}

fn check_database(config: &DatabaseConfig, issues: &mut Vec<ValidationIssue>) {
    if !config.backend.is_empty() && !allowed(VALID_BACKENDS, &config.backend) {
        issues.push(invalid_value("database.backend", &config.backend, VALID_BACKENDS));
    }
    if config.pool.min_size > config.pool.max_size {
        issues.push(ValidationIssue::error(
            "database.pool",
            "min_size cannot be greater than max_size".to_string(),
        ));
    }
    if config.pool.max_size == 0 {
        issues.push(ValidationIssue::error(
            "database.pool.max_size",
            "pool max_size must be greater than 0".to_string(),
        ));
    }
}

fn check_network(config: &NetworkConfig, issues: &mut Vec<ValidationIssue>) {
    if !allowed(VALID_COMPRESSIONS, &config.compression) {
        issues.push(invalid_value("network.compression", &config.compression, VALID_COMPRESSIONS));
    }
    if !allowed(VALID_TLS_VERSIONS, &config.tls.version) {
        issues.push(invalid_value("network.tls.version", &config.tls.version, VALID_TLS_VERSIONS));
    }
    if config.buffer_size < 4096 {
        issues.push(ValidationIssue::warn(
            "network.buffer_size",
            "buffer below 4KB may cause performance issues",
        ));
    }
    if config.tls.enabled && config.tls.verify_peer && config.tls.ca_path.is_empty() {
        issues.push(ValidationIssue::warn(
            "network.tls.ca_path",
            "TLS verify_peer is set but no CA path is configured",
        ));
    }
}
