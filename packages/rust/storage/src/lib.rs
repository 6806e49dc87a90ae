//! Turso Embedded / libSQL storage layer.
//!
//! The [`Storage`] struct wraps a libSQL database holding the append-only
//! audit trail and the graded findings of every run. It implements the
//! [`AuditSink`] and [`ResultStore`] ports used by the pipeline.
//!
//! **Access rules:**
//! - Pipeline (server or one-shot lookup): read-write via [`Storage::open`]
//! - Reporting and inspection: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dossier_shared::{
    AuditEvent, AuditEventKind, AuditSink, DossierError, FindingRecord, ReliabilityGrade, Result,
    ResultStore,
};
use libsql::{Connection, Database, params};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DossierError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DossierError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| DossierError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DossierError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| DossierError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        DossierError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(DossierError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Audit trail
    // -----------------------------------------------------------------------

    /// Append one audit event, stamped with the current UTC time.
    pub async fn insert_audit_event(&self, event: &AuditEvent) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        let query_details = event
            .query_details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DossierError::Storage(format!("unserializable query details: {e}")))?;

        self.conn
            .execute(
                "INSERT INTO audit_log (timestamp, event_type, source_module, target_subject_name,
                                        query_details, result_summary, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    now.as_str(),
                    event.kind.as_str(),
                    event.source_module.as_deref(),
                    event.subject.as_str(),
                    query_details.as_deref(),
                    event.result_summary.as_deref(),
                    event.notes.as_deref(),
                ],
            )
            .await
            .map_err(|e| DossierError::Storage(e.to_string()))?;
        Ok(())
    }

    /// List the audit trail for a subject in append order.
    pub async fn list_audit_events(&self, subject: &str) -> Result<Vec<StoredAuditEvent>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, timestamp, event_type, source_module, target_subject_name,
                        query_details, result_summary, notes
                 FROM audit_log WHERE target_subject_name = ?1 ORDER BY id",
                params![subject],
            )
            .await
            .map_err(|e| DossierError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_audit_event(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Findings
    // -----------------------------------------------------------------------

    /// Append one graded finding.
    pub async fn insert_finding(&self, record: &FindingRecord) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        let content = serde_json::to_string(&record.payload)
            .map_err(|e| DossierError::Storage(format!("unserializable finding: {e}")))?;

        self.conn
            .execute(
                "INSERT INTO results (run_id, target_subject_name, data_category, source_api,
                                      reliability_score, grade_basis, content_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.run_id.to_string(),
                    record.subject.as_str(),
                    record.category_label.as_str(),
                    record.source_name.as_str(),
                    record.grade.as_str(),
                    record.basis.as_str(),
                    content,
                    now.as_str(),
                ],
            )
            .await
            .map_err(|e| DossierError::Storage(e.to_string()))?;
        Ok(())
    }

    /// List the findings recorded for a subject, oldest first.
    pub async fn list_findings(&self, subject: &str) -> Result<Vec<StoredFinding>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, run_id, target_subject_name, data_category, source_api,
                        reliability_score, grade_basis, content_json, created_at
                 FROM results WHERE target_subject_name = ?1 ORDER BY id",
                params![subject],
            )
            .await
            .map_err(|e| DossierError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_finding(&row)?);
        }
        Ok(results)
    }

    /// Total number of persisted findings across all subjects.
    pub async fn count_findings(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM results", params![])
            .await
            .map_err(|e| DossierError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| DossierError::Storage(e.to_string()))?;
                Ok(count as u64)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(DossierError::Storage(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

#[async_trait]
impl AuditSink for Storage {
    async fn record(&self, event: AuditEvent) {
        if let Err(e) = self.insert_audit_event(&event).await {
            tracing::warn!(
                event_type = %event.kind,
                subject = %event.subject,
                error = %e,
                "failed to append audit event"
            );
        }
    }
}

#[async_trait]
impl ResultStore for Storage {
    async fn save_finding(&self, record: FindingRecord) {
        if let Err(e) = self.insert_finding(&record).await {
            tracing::warn!(
                source = %record.source_name,
                subject = %record.subject,
                error = %e,
                "failed to persist finding"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// An audit row as read back from the database.
#[derive(Debug, Clone)]
pub struct StoredAuditEvent {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub kind: AuditEventKind,
    pub source_module: Option<String>,
    pub subject: String,
    pub query_details: Option<serde_json::Value>,
    pub result_summary: Option<String>,
    pub notes: Option<String>,
}

/// A persisted finding as read back from the database.
#[derive(Debug, Clone)]
pub struct StoredFinding {
    pub id: i64,
    pub run_id: String,
    pub subject: String,
    pub data_category: String,
    pub source_api: String,
    pub grade: ReliabilityGrade,
    pub basis: String,
    pub content: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DossierError::Storage(format!("invalid date: {e}")))
}

fn parse_grade(s: &str) -> Result<ReliabilityGrade> {
    match s {
        "A" => Ok(ReliabilityGrade::A),
        "B" => Ok(ReliabilityGrade::B),
        "C" => Ok(ReliabilityGrade::C),
        other => Err(DossierError::Storage(format!(
            "invalid reliability score '{other}'"
        ))),
    }
}

/// Convert a database row to a [`StoredAuditEvent`].
fn row_to_audit_event(row: &libsql::Row) -> Result<StoredAuditEvent> {
    let kind: String = row
        .get(2)
        .map_err(|e| DossierError::Storage(e.to_string()))?;
    let query_details = match row.get::<String>(5).ok() {
        Some(raw) => Some(
            serde_json::from_str(&raw)
                .map_err(|e| DossierError::Storage(format!("invalid query details: {e}")))?,
        ),
        None => None,
    };

    Ok(StoredAuditEvent {
        id: row
            .get::<i64>(0)
            .map_err(|e| DossierError::Storage(e.to_string()))?,
        timestamp: parse_timestamp(
            &row.get::<String>(1)
                .map_err(|e| DossierError::Storage(e.to_string()))?,
        )?,
        kind: AuditEventKind::parse(&kind)
            .ok_or_else(|| DossierError::Storage(format!("unknown event type '{kind}'")))?,
        source_module: row.get::<String>(3).ok(),
        subject: row
            .get::<String>(4)
            .map_err(|e| DossierError::Storage(e.to_string()))?,
        query_details,
        result_summary: row.get::<String>(6).ok(),
        notes: row.get::<String>(7).ok(),
    })
}

/// Convert a database row to a [`StoredFinding`].
fn row_to_finding(row: &libsql::Row) -> Result<StoredFinding> {
    let content: String = row
        .get(7)
        .map_err(|e| DossierError::Storage(e.to_string()))?;

    Ok(StoredFinding {
        id: row
            .get::<i64>(0)
            .map_err(|e| DossierError::Storage(e.to_string()))?,
        run_id: row
            .get::<String>(1)
            .map_err(|e| DossierError::Storage(e.to_string()))?,
        subject: row
            .get::<String>(2)
            .map_err(|e| DossierError::Storage(e.to_string()))?,
        data_category: row
            .get::<String>(3)
            .map_err(|e| DossierError::Storage(e.to_string()))?,
        source_api: row
            .get::<String>(4)
            .map_err(|e| DossierError::Storage(e.to_string()))?,
        grade: parse_grade(
            &row.get::<String>(5)
                .map_err(|e| DossierError::Storage(e.to_string()))?,
        )?,
        basis: row
            .get::<String>(6)
            .map_err(|e| DossierError::Storage(e.to_string()))?,
        content: serde_json::from_str(&content)
            .map_err(|e| DossierError::Storage(format!("invalid content json: {e}")))?,
        created_at: parse_timestamp(
            &row.get::<String>(8)
                .map_err(|e| DossierError::Storage(e.to_string()))?,
        )?,
    })
}
