//! Shared types, error model, configuration, and persistence ports for Dossier.
//!
//! This crate is the foundation depended on by all other Dossier crates.
//! It provides:
//! - [`DossierError`]: the unified error type
//! - Domain types ([`SubjectQuery`], [`Finding`], [`SourceOutcome`], [`AggregateResult`])
//! - Persistence ports ([`AuditSink`], [`ResultStore`]) and their records
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod ports;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DorkSearchConfig, SanctionsConfig, ServerConfig, StorageConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_api_key,
};
pub use error::{DossierError, Result};
pub use ports::{AuditEvent, AuditEventKind, AuditSink, FindingRecord, ResultStore};
pub use types::{
    AggregateResult, Category, Finding, GradeBasis, IndividualDetails, PartialError,
    ReliabilityGrade, RunId, SourceKind, SourceOutcome, SourceStatus, SubjectQuery,
    UNKNOWN_SUBJECT,
};
