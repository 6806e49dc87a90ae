//! One intake run: validate → fan out to sources → grade → persist → report.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{error, info, instrument};

use dossier_shared::{
    AggregateResult, AuditEvent, AuditEventKind, AuditSink, FindingRecord, Result, ResultStore,
    RunId, SourceOutcome, SourceStatus, SubjectQuery,
};
use dossier_sources::SourceAdapter;

use crate::scoring;

/// Result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    /// Full name the run was keyed on in audit and result rows.
    pub subject: String,
    /// Per-source outcomes, in adapter order.
    pub results: AggregateResult,
}

/// Drives every configured adapter for a subject and records the run.
pub struct Orchestrator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    audit: Arc<dyn AuditSink>,
    store: Arc<dyn ResultStore>,
}

impl Orchestrator {
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        audit: Arc<dyn AuditSink>,
        store: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            adapters,
            audit,
            store,
        }
    }

    /// Names of the configured adapters, in execution order.
    pub fn adapter_names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    /// Run the pipeline for `subject`.
    ///
    /// A blank subject is rejected with an input error before any adapter is
    /// called or any audit row is written. Adapter failures never fail the run;
    /// they show up as error outcomes in the report.
    #[instrument(skip_all, fields(subject = %subject.identifier()))]
    pub async fn run(&self, subject: &SubjectQuery) -> Result<RunReport> {
        subject.validate()?;

        let run_id = RunId::new();
        let name = subject.full_name();
        info!(%run_id, adapters = self.adapters.len(), "starting run");

        self.audit
            .record(
                AuditEvent::new(AuditEventKind::ProcessingStarted, &name)
                    .notes(format!("run {run_id}")),
            )
            .await;

        let details = json!({
            "given_name": subject.given_name(),
            "family_name": subject.family_name(),
        });
        for adapter in &self.adapters {
            self.audit
                .record(
                    AuditEvent::new(AuditEventKind::AdapterStarted, &name)
                        .source_module(adapter.name())
                        .query_details(details.clone()),
                )
                .await;
        }

        // --- Fan out ---
        let mut handles = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            let adapter = Arc::clone(adapter);
            let subject = subject.clone();
            handles.push(tokio::spawn(async move { adapter.lookup(&subject).await }));
        }

        // --- Collect in adapter order ---
        let mut outcomes: Vec<(String, SourceOutcome)> = Vec::with_capacity(handles.len());
        for (adapter, handle) in self.adapters.iter().zip(handles) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(source = adapter.name(), error = %e, "adapter task failed");
                    SourceOutcome::error(&name, format!("adapter task failed: {e}"))
                }
            };

            self.record_completion(adapter.as_ref(), &name, &outcome)
                .await;
            if outcome.status() == SourceStatus::Success {
                self.persist_findings(adapter.as_ref(), run_id, &name, &outcome)
                    .await;
            }
            outcomes.push((adapter.name().to_string(), outcome));
        }

        let results: AggregateResult = outcomes.into_iter().collect();
        info!(
            %run_id,
            sources = results.len(),
            findings = results.finding_count(),
            "run finished"
        );

        self.audit
            .record(
                AuditEvent::new(AuditEventKind::ResponseSent, &name)
                    .result_summary(format!(
                        "sources: {}, findings: {}",
                        results.len(),
                        results.finding_count()
                    ))
                    .notes(format!("run {run_id}")),
            )
            .await;

        Ok(RunReport {
            run_id,
            subject: name,
            results,
        })
    }

    async fn record_completion(
        &self,
        adapter: &dyn SourceAdapter,
        subject: &str,
        outcome: &SourceOutcome,
    ) {
        let kind = match outcome.status() {
            SourceStatus::Success => AuditEventKind::AdapterCompleted,
            SourceStatus::Empty => AuditEventKind::AdapterEmptyResult,
            SourceStatus::Error => AuditEventKind::AdapterError,
        };
        let mut event = AuditEvent::new(kind, subject)
            .source_module(adapter.name())
            .result_summary(outcome.summary());
        if let Some(message) = outcome.message() {
            event = event.notes(message);
        }
        self.audit.record(event).await;
    }

    async fn persist_findings(
        &self,
        adapter: &dyn SourceAdapter,
        run_id: RunId,
        subject: &str,
        outcome: &SourceOutcome,
    ) {
        for finding in outcome.findings() {
            let assessment = scoring::assess(finding, adapter.kind());
            let payload = match serde_json::to_value(finding) {
                Ok(payload) => payload,
                Err(e) => {
                    error!(source = adapter.name(), error = %e, "failed to serialize finding");
                    continue;
                }
            };
            self.store
                .save_finding(FindingRecord {
                    run_id,
                    subject: subject.to_string(),
                    category_label: adapter.data_category().to_string(),
                    source_name: adapter.name().to_string(),
                    grade: assessment.grade,
                    basis: assessment.basis,
                    payload,
                })
                .await;
        }
    }
}
