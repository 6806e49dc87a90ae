//! Core domain types shared by the adapters, the orchestrator, and storage.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::error::{DossierError, Result};

/// Subject identifier used in logs and audit rows when the names are missing.
pub const UNKNOWN_SUBJECT: &str = "unknown subject";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// SubjectQuery
// ---------------------------------------------------------------------------

/// The person being looked up. Built once per request and never mutated.
///
/// Construction does not validate: the orchestrator calls [`SubjectQuery::validate`]
/// so that a blank subject is reported as an input error instead of a panic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectQuery {
    given_name: String,
    family_name: String,
    /// Alternative spellings. Reserved; no adapter reads them yet.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    variants: Vec<String>,
}

impl SubjectQuery {
    /// Build a subject from raw input, trimming both names.
    pub fn new(given_name: impl Into<String>, family_name: impl Into<String>) -> Self {
        Self {
            given_name: given_name.into().trim().to_string(),
            family_name: family_name.into().trim().to_string(),
            variants: Vec::new(),
        }
    }

    /// Attach name variants.
    pub fn with_variants(mut self, variants: Vec<String>) -> Self {
        self.variants = variants;
        self
    }

    pub fn given_name(&self) -> &str {
        &self.given_name
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    /// Check that both names are present.
    pub fn validate(&self) -> Result<()> {
        if self.given_name.is_empty() || self.family_name.is_empty() {
            return Err(DossierError::input(
                "given name and family name are required",
            ));
        }
        Ok(())
    }

    /// `"given family"`, trimmed. Empty when both names are blank.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
            .trim()
            .to_string()
    }

    /// Identity used for logging and audit rows.
    pub fn identifier(&self) -> String {
        if self.validate().is_ok() {
            self.full_name()
        } else {
            UNKNOWN_SUBJECT.to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// Finding
// ---------------------------------------------------------------------------

/// Coarse type of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Individual,
    Entity,
    Unknown,
    RawUrl,
}

impl Category {
    /// Map a declared upstream type (`"individual"`, `"ENTITY"`, ...) to a category.
    /// Anything unrecognised becomes [`Category::Unknown`].
    pub fn from_declared_type(declared: &str) -> Self {
        match declared.trim().to_ascii_lowercase().as_str() {
            "individual" => Self::Individual,
            "entity" => Self::Entity,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "Individual",
            Self::Entity => "Entity",
            Self::Unknown => "Unknown",
            Self::RawUrl => "RawUrl",
        }
    }
}

/// Person-specific fields, only ever present on [`Category::Individual`] findings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndividualDetails {
    #[serde(default)]
    pub birth_dates: Vec<String>,
    #[serde(default)]
    pub nationalities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub positions: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// One normalized piece of information about a subject from one source.
///
/// A finding carries no grade: grading depends on which source produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Stable identifier from the origin source. Never empty.
    pub source_id: String,
    /// Display name. Never empty.
    pub caption: String,
    pub category: Category,
    /// Upstream lists/datasets the item was found in.
    #[serde(default)]
    pub origin_datasets: Vec<String>,
    /// Upstream match score, typically in `[0, 1]`; 0 when absent.
    #[serde(default)]
    pub match_confidence: f64,
    /// Upstream match flag; true when the source returned the item at all.
    #[serde(default = "default_true")]
    pub is_match: bool,
    /// Free-text provenance, e.g. the search template that produced a URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Only set when `category == Individual`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<IndividualDetails>,
}

fn default_true() -> bool {
    true
}

impl Finding {
    /// A bare URL returned by a web search.
    pub fn raw_url(url: impl Into<String>, note: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            source_id: url.clone(),
            caption: url,
            category: Category::RawUrl,
            origin_datasets: Vec::new(),
            match_confidence: 0.0,
            is_match: true,
            note: Some(note.into()),
            details: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SourceOutcome
// ---------------------------------------------------------------------------

/// Terminal state of one adapter invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Success,
    Empty,
    Error,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Empty => "empty",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sub-query that failed without failing the whole adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialError {
    pub query: String,
    pub message: String,
}

/// Result of one adapter invocation.
///
/// Fields are private so the constructors can guarantee that `findings` is
/// non-empty exactly when `status` is [`SourceStatus::Success`].
#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    status: SourceStatus,
    query_echo: String,
    findings: Vec<Finding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    partial_errors: Vec<PartialError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_payload: Option<serde_json::Value>,
}

impl SourceOutcome {
    /// Successful lookup. Falls back to [`SourceOutcome::empty`] when `findings` is empty.
    pub fn success(
        query: impl Into<String>,
        findings: Vec<Finding>,
        raw_payload: serde_json::Value,
    ) -> Self {
        let query = query.into();
        if findings.is_empty() {
            return Self::empty(query, "source returned no findings")
                .with_raw_payload(raw_payload);
        }
        Self {
            status: SourceStatus::Success,
            query_echo: query,
            findings,
            message: None,
            partial_errors: Vec::new(),
            raw_payload: Some(raw_payload),
        }
    }

    /// The source answered but had nothing for this subject.
    pub fn empty(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: SourceStatus::Empty,
            query_echo: query.into(),
            findings: Vec::new(),
            message: Some(message.into()),
            partial_errors: Vec::new(),
            raw_payload: None,
        }
    }

    /// The lookup failed. Never carries findings or a payload.
    pub fn error(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: SourceStatus::Error,
            query_echo: query.into(),
            findings: Vec::new(),
            message: Some(message.into()),
            partial_errors: Vec::new(),
            raw_payload: None,
        }
    }

    /// Attach the untouched upstream response. Ignored on error outcomes.
    pub fn with_raw_payload(mut self, raw_payload: serde_json::Value) -> Self {
        if self.status != SourceStatus::Error {
            self.raw_payload = Some(raw_payload);
        }
        self
    }

    /// Attach sub-query failures.
    pub fn with_partial_errors(mut self, partial_errors: Vec<PartialError>) -> Self {
        self.partial_errors = partial_errors;
        self
    }

    pub fn status(&self) -> SourceStatus {
        self.status
    }

    pub fn query_echo(&self) -> &str {
        &self.query_echo
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn partial_errors(&self) -> &[PartialError] {
        &self.partial_errors
    }

    pub fn raw_payload(&self) -> Option<&serde_json::Value> {
        self.raw_payload.as_ref()
    }

    /// One-line summary for audit rows.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "status: {}, findings: {}",
            self.status,
            self.findings.len()
        );
        if !self.partial_errors.is_empty() {
            summary.push_str(&format!(", failed queries: {}", self.partial_errors.len()));
        }
        if let Some(message) = &self.message {
            summary.push_str(&format!(", message: {message}"));
        }
        summary
    }
}

// ---------------------------------------------------------------------------
// AggregateResult
// ---------------------------------------------------------------------------

/// Per-source outcomes for one subject, in adapter order.
///
/// Serializes as a JSON object keyed by source name.
#[derive(Debug, Clone, Default)]
pub struct AggregateResult {
    entries: Vec<(String, SourceOutcome)>,
}

impl AggregateResult {
    pub fn get(&self, source: &str) -> Option<&SourceOutcome> {
        self.entries
            .iter()
            .find(|(name, _)| name == source)
            .map(|(_, outcome)| outcome)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceOutcome)> {
        self.entries
            .iter()
            .map(|(name, outcome)| (name.as_str(), outcome))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total findings across all successful sources.
    pub fn finding_count(&self) -> usize {
        self.entries.iter().map(|(_, o)| o.findings().len()).sum()
    }
}

impl FromIterator<(String, SourceOutcome)> for AggregateResult {
    fn from_iter<I: IntoIterator<Item = (String, SourceOutcome)>>(iter: I) -> Self {
        let mut entries: Vec<(String, SourceOutcome)> = Vec::new();
        for (name, outcome) in iter {
            // Later duplicates replace earlier ones, keeping the first position.
            match entries.iter_mut().find(|(existing, _)| *existing == name) {
                Some(slot) => slot.1 = outcome,
                None => entries.push((name, outcome)),
            }
        }
        Self { entries }
    }
}

impl Serialize for AggregateResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(k, v)| (k, v)))
    }
}

// ---------------------------------------------------------------------------
// Grading vocabulary
// ---------------------------------------------------------------------------

/// Which family of source produced a finding; drives grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Sanctions,
    WebSearch,
}

/// Reliability of a finding, A being the most reliable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReliabilityGrade {
    A,
    B,
    C,
}

impl ReliabilityGrade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
        }
    }
}

impl fmt::Display for ReliabilityGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a grade was assigned. Separates weak matches from non-matches, which share grade C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeBasis {
    StrongMatch,
    GoodMatch,
    WeakMatch,
    NoMatch,
    Unverified,
}

impl GradeBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StrongMatch => "strong_match",
            Self::GoodMatch => "good_match",
            Self::WeakMatch => "weak_match",
            Self::NoMatch => "no_match",
            Self::Unverified => "unverified",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(id: &str) -> Finding {
        Finding {
            source_id: id.into(),
            caption: id.into(),
            category: Category::Entity,
            origin_datasets: vec![],
            match_confidence: 0.0,
            is_match: true,
            note: None,
            details: None,
        }
    }

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let parsed: RunId = id.to_string().parse().expect("parse RunId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn subject_trims_and_identifies() {
        let subject = SubjectQuery::new("  Mario ", "Rossi  ");
        assert_eq!(subject.given_name(), "Mario");
        assert_eq!(subject.full_name(), "Mario Rossi");
        assert_eq!(subject.identifier(), "Mario Rossi");
        assert!(subject.validate().is_ok());
    }

    #[test]
    fn blank_subject_is_input_error() {
        for (given, family) in [("", "Rossi"), ("Mario", "   "), ("", "")] {
            let subject = SubjectQuery::new(given, family);
            let err = subject.validate().unwrap_err();
            assert!(err.is_input());
            assert_eq!(subject.identifier(), UNKNOWN_SUBJECT);
        }
    }

    #[test]
    fn category_is_case_insensitive() {
        assert_eq!(Category::from_declared_type("individual"), Category::Individual);
        assert_eq!(Category::from_declared_type("INDIVIDUAL"), Category::Individual);
        assert_eq!(Category::from_declared_type("Entity"), Category::Entity);
        assert_eq!(Category::from_declared_type("vessel"), Category::Unknown);
        assert_eq!(Category::from_declared_type(""), Category::Unknown);
    }

    #[test]
    fn success_without_findings_becomes_empty() {
        let outcome = SourceOutcome::success("Mario Rossi", vec![], serde_json::json!([]));
        assert_eq!(outcome.status(), SourceStatus::Empty);
        assert!(outcome.findings().is_empty());
        assert!(outcome.message().is_some());
    }

    #[test]
    fn status_matches_findings() {
        let outcomes = [
            SourceOutcome::success("q", vec![finding("a")], serde_json::json!([{}])),
            SourceOutcome::empty("q", "nothing"),
            SourceOutcome::error("q", "timeout"),
        ];
        for outcome in &outcomes {
            assert_eq!(
                outcome.status() == SourceStatus::Success,
                !outcome.findings().is_empty()
            );
        }
    }

    #[test]
    fn error_outcome_drops_payload() {
        let outcome = SourceOutcome::error("q", "boom").with_raw_payload(serde_json::json!({}));
        assert!(outcome.raw_payload().is_none());
        assert_eq!(outcome.message(), Some("boom"));
    }

    #[test]
    fn aggregate_serializes_in_adapter_order() {
        let aggregate: AggregateResult = vec![
            ("sanctions".to_string(), SourceOutcome::empty("q", "none")),
            ("dork_search".to_string(), SourceOutcome::error("q", "down")),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_string(&aggregate).expect("serialize");
        let sanctions = json.find("\"sanctions\"").unwrap();
        let dorks = json.find("\"dork_search\"").unwrap();
        assert!(sanctions < dorks);
        assert_eq!(aggregate.get("dork_search").unwrap().status(), SourceStatus::Error);
        assert_eq!(aggregate.finding_count(), 0);
    }

    #[test]
    fn raw_url_finding_shape() {
        let f = Finding::raw_url("https://example.com/bio", "\"Mario Rossi\" \"born on\"");
        assert_eq!(f.category, Category::RawUrl);
        assert_eq!(f.caption, "https://example.com/bio");
        assert!(f.origin_datasets.is_empty());
        assert!(f.details.is_none());
    }
}
