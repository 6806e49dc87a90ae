//! Birth-data "dork" adapter: targeted phrase searches on the open web.
//!
//! Six templates combine the quoted subject name with a birth-data phrase in
//! Italian and English. Templates run one after another with a fixed pause in
//! between; a failing template is recorded and the rest still run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use dossier_shared::{
    DorkSearchConfig, Finding, PartialError, Result, SourceKind, SourceOutcome, SubjectQuery,
};

use super::{EMPTY_QUERY_MESSAGE, SourceAdapter};
use crate::search::{HtmlSearchEngine, SearchEngine};

/// Phrases appended to the quoted name, one search each.
pub const BIRTH_DATA_PHRASES: [&str; 6] = [
    "nato il",
    "data di nascita",
    "luogo di nascita",
    "born on",
    "date of birth",
    "place of birth",
];

/// Lower bound for the pause between searches.
const MIN_INTER_CALL_DELAY: Duration = Duration::from_millis(1);

/// Build the templated queries for a subject, in execution order.
pub fn dork_queries(subject: &SubjectQuery) -> Vec<String> {
    let name = subject.full_name();
    BIRTH_DATA_PHRASES
        .iter()
        .map(|phrase| format!("\"{name}\" \"{phrase}\""))
        .collect()
}

/// Adapter running the birth-data templates through a [`SearchEngine`].
pub struct DorkSearchAdapter {
    engine: Arc<dyn SearchEngine>,
    results_per_template: usize,
    lang: String,
    inter_call_delay: Duration,
}

impl DorkSearchAdapter {
    /// Key under which this adapter's outcome is reported.
    pub const NAME: &'static str = "dork_search";

    /// Build the adapter around any search engine.
    pub fn new(engine: Arc<dyn SearchEngine>, config: &DorkSearchConfig) -> Self {
        Self {
            engine,
            results_per_template: config.results_per_template,
            lang: config.lang.clone(),
            inter_call_delay: Duration::from_millis(config.inter_call_delay_ms)
                .max(MIN_INTER_CALL_DELAY),
        }
    }

    /// Build the adapter with the HTML search engine described by `config`.
    pub fn from_config(config: &DorkSearchConfig) -> Result<Self> {
        let engine = HtmlSearchEngine::new(config)?;
        Ok(Self::new(Arc::new(engine), config))
    }
}

#[async_trait]
impl SourceAdapter for DorkSearchAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn kind(&self) -> SourceKind {
        SourceKind::WebSearch
    }

    fn data_category(&self) -> &str {
        "web_birth_data"
    }

    #[instrument(skip_all, fields(source = "dork_search", subject = %subject.full_name()))]
    async fn lookup(&self, subject: &SubjectQuery) -> SourceOutcome {
        let query = subject.full_name();
        if query.is_empty() {
            return SourceOutcome::error(query, EMPTY_QUERY_MESSAGE);
        }

        let dorks = dork_queries(subject);
        info!(templates = dorks.len(), "running birth-data searches");

        let mut findings: Vec<Finding> = Vec::new();
        let mut failures: Vec<PartialError> = Vec::new();
        let mut entries: Vec<Value> = Vec::new();

        for (i, dork) in dorks.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.inter_call_delay).await;
            }

            match self
                .engine
                .search(dork, self.results_per_template, &self.lang)
                .await
            {
                Ok(urls) => {
                    debug!(%dork, urls = urls.len(), "template finished");
                    for url in urls {
                        entries.push(json!({ "dork_query": dork, "url_found": url }));
                        findings.push(Finding::raw_url(url, dork.as_str()));
                    }
                }
                Err(e) => {
                    warn!(%dork, error = %e, "template failed");
                    entries.push(json!({ "dork_query": dork, "error": e.to_string() }));
                    failures.push(PartialError {
                        query: dork.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            urls = findings.len(),
            failed_templates = failures.len(),
            "birth-data searches finished"
        );

        let payload = Value::Array(entries);
        let outcome = if findings.is_empty() {
            SourceOutcome::empty(
                query,
                format!(
                    "no URLs found across {} templates ({} failed)",
                    dorks.len(),
                    failures.len()
                ),
            )
            .with_raw_payload(payload)
        } else {
            SourceOutcome::success(query, findings, payload)
        };
        outcome.with_partial_errors(failures)
    }
}
