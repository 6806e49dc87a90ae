//! SQL migration definitions for the Dossier database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: audit_log, results",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Append-only audit trail
CREATE TABLE IF NOT EXISTS audit_log (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp           TEXT NOT NULL,
    event_type          TEXT NOT NULL,
    source_module       TEXT,
    target_subject_name TEXT NOT NULL,
    query_details       TEXT,
    result_summary      TEXT,
    notes               TEXT
);

CREATE INDEX IF NOT EXISTS idx_audit_subject ON audit_log(target_subject_name);

-- Graded findings
CREATE TABLE IF NOT EXISTS results (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id              TEXT NOT NULL,
    target_subject_name TEXT NOT NULL,
    data_category       TEXT NOT NULL,
    source_api          TEXT NOT NULL,
    reliability_score   TEXT NOT NULL CHECK (reliability_score IN ('A', 'B', 'C')),
    grade_basis         TEXT NOT NULL,
    content_json        TEXT NOT NULL,
    created_at          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_results_subject ON results(target_subject_name);
CREATE INDEX IF NOT EXISTS idx_results_run ON results(run_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
