//! Field-level comparison of two configurations.
//!
//! Each section is compared field by field rather than through a generic
//! structural diff, so the reported paths stay stable even if the serde
//! representation changes.

use crate::config::schema::AppConfig;

/// Fields that take effect at runtime without a restart. Everything else is
/// committed on reload but only picked up by the next process start.
const HOT_RELOADABLE_FIELDS: &[&str] = &[
    "logger.level",
    "logger.file_path",
    "monitoring.metrics_interval_ms",
    "monitoring.tracing.sampling_rate",
];

/// Whether a field path may change at runtime without a restart.
pub fn is_hot_reloadable(field_path: &str) -> bool {
    HOT_RELOADABLE_FIELDS.contains(&field_path)
}

/// Compare two configurations and return the changed field paths, in schema
/// order.
pub fn changed_fields(old: &AppConfig, new: &AppConfig) -> Vec<String> {
    let mut changes = Vec::new();
    let mut record = |changed: bool, path: &str| {
        if changed {
            changes.push(path.to_string());
        }
    };

    // Thread config
    record(old.thread.pool_size != new.thread.pool_size, "thread.pool_size");
    record(old.thread.queue_type != new.thread.queue_type, "thread.queue_type");
    record(old.thread.max_queue_size != new.thread.max_queue_size, "thread.max_queue_size");
    record(
        old.thread.thread_name_prefix != new.thread.thread_name_prefix,
        "thread.thread_name_prefix",
    );

    // Logger config
    record(old.logger.level != new.logger.level, "logger.level");
    record(old.logger.writers != new.logger.writers, "logger.writers");
    record(old.logger.async_logging != new.logger.async_logging, "logger.async");
    record(old.logger.buffer_size != new.logger.buffer_size, "logger.buffer_size");
    record(old.logger.file_path != new.logger.file_path, "logger.file_path");
    record(old.logger.max_file_size != new.logger.max_file_size, "logger.max_file_size");
    record(old.logger.max_backup_files != new.logger.max_backup_files, "logger.max_backup_files");
    record(old.logger.format_pattern != new.logger.format_pattern, "logger.format_pattern");

    // Monitoring config
    record(old.monitoring.enabled != new.monitoring.enabled, "monitoring.enabled");
    record(
        old.monitoring.metrics_interval_ms != new.monitoring.metrics_interval_ms,
        "monitoring.metrics_interval_ms",
    );
    record(
        old.monitoring.health_check_interval_ms != new.monitoring.health_check_interval_ms,
        "monitoring.health_check_interval_ms",
    );
    record(
        old.monitoring.prometheus_port != new.monitoring.prometheus_port,
        "monitoring.prometheus_port",
    );
    record(
        old.monitoring.prometheus_path != new.monitoring.prometheus_path,
        "monitoring.prometheus_path",
    );
    record(
        old.monitoring.tracing.enabled != new.monitoring.tracing.enabled,
        "monitoring.tracing.enabled",
    );
    record(
        old.monitoring.tracing.sampling_rate != new.monitoring.tracing.sampling_rate,
        "monitoring.tracing.sampling_rate",
    );
    record(
        old.monitoring.tracing.exporter != new.monitoring.tracing.exporter,
        "monitoring.tracing.exporter",
    );
    record(
        old.monitoring.tracing.endpoint != new.monitoring.tracing.endpoint,
        "monitoring.tracing.endpoint",
    );

    // Database config
    record(old.database.backend != new.database.backend, "database.backend");
    record(
        old.database.connection_string != new.database.connection_string,
        "database.connection_string",
    );
    record(old.database.log_queries != new.database.log_queries, "database.log_queries");
    record(
        old.database.slow_query_threshold_ms != new.database.slow_query_threshold_ms,
        "database.slow_query_threshold_ms",
    );
    record(old.database.pool.min_size != new.database.pool.min_size, "database.pool.min_size");
    record(old.database.pool.max_size != new.database.pool.max_size, "database.pool.max_size");
    record(
        old.database.pool.idle_timeout_ms != new.database.pool.idle_timeout_ms,
        "database.pool.idle_timeout_ms",
    );
    record(
        old.database.pool.acquire_timeout_ms != new.database.pool.acquire_timeout_ms,
        "database.pool.acquire_timeout_ms",
    );

    // Network config
    record(old.network.compression != new.network.compression, "network.compression");
    record(old.network.buffer_size != new.network.buffer_size, "network.buffer_size");
    record(
        old.network.connect_timeout_ms != new.network.connect_timeout_ms,
        "network.connect_timeout_ms",
    );
    record(old.network.io_timeout_ms != new.network.io_timeout_ms, "network.io_timeout_ms");
    record(
        old.network.keepalive_interval_ms != new.network.keepalive_interval_ms,
        "network.keepalive_interval_ms",
    );
    record(
        old.network.max_connections != new.network.max_connections,
        "network.max_connections",
    );
    record(old.network.tls.enabled != new.network.tls.enabled, "network.tls.enabled");
    record(old.network.tls.version != new.network.tls.version, "network.tls.version");
    record(old.network.tls.cert_path != new.network.tls.cert_path, "network.tls.cert_path");
    record(old.network.tls.key_path != new.network.tls.key_path, "network.tls.key_path");
    record(old.network.tls.ca_path != new.network.tls.ca_path, "network.tls.ca_path");
    record(old.network.tls.verify_peer != new.network.tls.verify_peer, "network.tls.verify_peer");

    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_configs_have_no_changes() {
        let config = AppConfig::default();
        assert!(changed_fields(&config, &config).is_empty());
    }

    #[test]
    fn single_field_change_is_reported_by_path() {
        let old = AppConfig::default();
        let mut new = old.clone();
        new.logger.level = "debug".to_string();

        assert_eq!(changed_fields(&old, &new), vec!["logger.level"]);
    }

    #[test]
    fn changes_come_back_in_schema_order() {
        let old = AppConfig::default();
        let mut new = old.clone();
        new.network.compression = "zstd".to_string();
        new.thread.pool_size = 8;
        new.logger.file_path = "/var/log/app.log".to_string();

        assert_eq!(
            changed_fields(&old, &new),
            vec!["thread.pool_size", "logger.file_path", "network.compression"]
        );
    }

    #[test]
    fn nested_fields_have_dotted_paths() {
        let old = AppConfig::default();
        let mut new = old.clone();
        new.monitoring.tracing.sampling_rate = 0.5;
        new.database.pool.max_size = 40;

        assert_eq!(
            changed_fields(&old, &new),
            vec!["monitoring.tracing.sampling_rate", "database.pool.max_size"]
        );
    }

    #[test]
    fn hot_reloadable_classification() {
        assert!(is_hot_reloadable("logger.level"));
        assert!(is_hot_reloadable("monitoring.metrics_interval_ms"));
        assert!(!is_hot_reloadable("thread.pool_size"));
        assert!(!is_hot_reloadable("database.backend"));
    }
}
