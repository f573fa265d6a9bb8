//! Configuration schema, loading, and comparison.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read, ${VAR} expansion, HOTCFG_* env overrides)
//!     → validation.rs (semantic checks, warnings logged)
//!     → AppConfig (complete, defaulted)
//!
//! On reload the watcher compares old and new with diff.rs to report
//! exactly which field paths changed.
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a full reload
//! - All fields have defaults so a minimal (or missing) file still works
//! - Validation separates syntactic (serde) from semantic checks
//! - Loading does not validate; the reload pipeline runs the two steps
//!   separately so their failures are classified apart

pub mod diff;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::AppConfig;
