//! Persistence ports: the audit trail and the finding store.
//!
//! Both are append-only and infallible from the caller's point of view.
//! Implementations log and swallow their own failures so that a broken
//! database never changes what the pipeline returns.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{GradeBasis, ReliabilityGrade, RunId};

// ---------------------------------------------------------------------------
// Audit events
// ---------------------------------------------------------------------------

/// Every pipeline step that leaves a row in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    RequestReceived,
    InputError,
    ProcessingStarted,
    AdapterStarted,
    AdapterCompleted,
    AdapterEmptyResult,
    AdapterError,
    ResponseSent,
    CriticalError,
}

impl AuditEventKind {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestReceived => "request_received",
            Self::InputError => "input_error",
            Self::ProcessingStarted => "processing_started",
            Self::AdapterStarted => "adapter_started",
            Self::AdapterCompleted => "adapter_completed",
            Self::AdapterEmptyResult => "adapter_empty_result",
            Self::AdapterError => "adapter_error",
            Self::ResponseSent => "response_sent",
            Self::CriticalError => "critical_error",
        }
    }

    /// Parse the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "request_received" => Self::RequestReceived,
            "input_error" => Self::InputError,
            "processing_started" => Self::ProcessingStarted,
            "adapter_started" => Self::AdapterStarted,
            "adapter_completed" => Self::AdapterCompleted,
            "adapter_empty_result" => Self::AdapterEmptyResult,
            "adapter_error" => Self::AdapterError,
            "response_sent" => Self::ResponseSent,
            "critical_error" => Self::CriticalError,
            _ => return None,
        })
    }
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pipeline step. The timestamp is assigned by the store on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub kind: AuditEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_module: Option<String>,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_details: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl AuditEvent {
    pub fn new(kind: AuditEventKind, subject: impl Into<String>) -> Self {
        Self {
            kind,
            source_module: None,
            subject: subject.into(),
            query_details: None,
            result_summary: None,
            notes: None,
        }
    }

    pub fn source_module(mut self, module: impl Into<String>) -> Self {
        self.source_module = Some(module.into());
        self
    }

    pub fn query_details(mut self, details: serde_json::Value) -> Self {
        self.query_details = Some(details);
        self
    }

    pub fn result_summary(mut self, summary: impl Into<String>) -> Self {
        self.result_summary = Some(summary.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Append-only audit trail.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one event. Must not fail or panic; errors are logged by the implementation.
    async fn record(&self, event: AuditEvent);
}

// ---------------------------------------------------------------------------
// Finding store
// ---------------------------------------------------------------------------

/// A graded finding ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingRecord {
    pub run_id: RunId,
    pub subject: String,
    /// Coarse data category of the source (e.g. `sanctions_registry`).
    pub category_label: String,
    pub source_name: String,
    pub grade: ReliabilityGrade,
    pub basis: GradeBasis,
    /// The serialized [`Finding`](crate::Finding).
    pub payload: serde_json::Value,
}

/// Append-only store of graded findings.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Append one finding. Must not fail or panic; errors are logged by the implementation.
    async fn save_finding(&self, record: FindingRecord);
}
