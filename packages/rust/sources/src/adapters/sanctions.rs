//! Sanctions/watchlist adapter (sanctions.network fuzzy name search).
//!
//! The endpoint answers `GET ?name=<query>&limit=<n>` with a JSON array of
//! records. Field availability varies per upstream list, so every field read
//! here has an explicit default.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};
use url::Url;

use dossier_shared::{
    Category, DossierError, Finding, IndividualDetails, Result, SanctionsConfig, SourceKind,
    SourceOutcome, SubjectQuery,
};

use super::{EMPTY_QUERY_MESSAGE, LookupError, SourceAdapter, build_client};

/// Adapter for the sanctions search API.
pub struct SanctionsAdapter {
    client: Client,
    endpoint: Url,
    limit: u32,
    timeout: Duration,
    api_key: Option<String>,
}

impl SanctionsAdapter {
    /// Key under which this adapter's outcome is reported.
    pub const NAME: &'static str = "sanctions";

    /// Build the adapter. `api_key` is resolved by the caller at wiring time.
    pub fn new(config: &SanctionsConfig, api_key: Option<String>) -> Result<Self> {
        let endpoint = Url::parse(&config.api_url).map_err(|e| {
            DossierError::config(format!("invalid sanctions api_url '{}': {e}", config.api_url))
        })?;
        let timeout = Duration::from_secs(config.timeout_secs);

        Ok(Self {
            client: build_client(timeout)?,
            endpoint,
            limit: config.limit,
            timeout,
            api_key,
        })
    }

    /// Issue the single remote call and decode the body as JSON.
    async fn fetch(&self, query: &str) -> std::result::Result<Value, LookupError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("name", query)
            .append_pair("limit", &self.limit.to_string());
        let url_str = url.to_string();

        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LookupError::from_reqwest(&url_str, self.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status {
                url: url_str,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| LookupError::from_reqwest(&url_str, self.timeout, e))?;

        serde_json::from_str(&body).map_err(|e| LookupError::Parse {
            url: url_str,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl SourceAdapter for SanctionsAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Sanctions
    }

    fn data_category(&self) -> &str {
        "sanctions_registry"
    }

    #[instrument(skip_all, fields(source = "sanctions", subject = %subject.full_name()))]
    async fn lookup(&self, subject: &SubjectQuery) -> SourceOutcome {
        let query = subject.full_name();
        if query.is_empty() {
            return SourceOutcome::error(query, EMPTY_QUERY_MESSAGE);
        }

        info!("searching sanctions lists");
        match self.fetch(&query).await {
            Ok(body) => {
                let outcome = map_sanctions_response(&query, body);
                info!(
                    status = %outcome.status(),
                    findings = outcome.findings().len(),
                    "sanctions search finished"
                );
                outcome
            }
            Err(e) => {
                warn!(error = %e, "sanctions search failed");
                SourceOutcome::error(query, e.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Response mapping
// ---------------------------------------------------------------------------

/// Map a decoded response body into an outcome.
///
/// - non-array body, empty array, or no object entries → `Empty`
/// - otherwise → `Success` with one finding per object entry, in upstream order
pub fn map_sanctions_response(query: &str, body: Value) -> SourceOutcome {
    let findings: Vec<Finding> = match &body {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(record) => Some(map_record(query, record)),
                other => {
                    debug!(kind = value_kind(other), "skipping non-object sanctions entry");
                    None
                }
            })
            .collect(),
        other => {
            debug!(kind = value_kind(other), "unexpected sanctions response shape");
            Vec::new()
        }
    };

    if findings.is_empty() {
        return SourceOutcome::empty(query, "no results found or unexpected response format")
            .with_raw_payload(body);
    }
    SourceOutcome::success(query, findings, body)
}

/// Map one upstream record.
///
/// Defaults: `id` → `sn-<first name>` or `sn-unknown`; `names[0]` → the query;
/// `type` → Unknown; `source` → no datasets; `score` → 0; `match` → true.
fn map_record(query: &str, record: &Map<String, Value>) -> Finding {
    let first_name = record
        .get("names")
        .and_then(Value::as_array)
        .and_then(|names| names.first())
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let source_id = match record.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
        Some(Value::Number(id)) => id.to_string(),
        _ => format!("sn-{}", first_name.unwrap_or("unknown")),
    };

    let caption = first_name.unwrap_or(query).to_string();

    let category = record
        .get("type")
        .and_then(Value::as_str)
        .map(Category::from_declared_type)
        .unwrap_or(Category::Unknown);

    let origin_datasets = non_empty_str(record.get("source"))
        .map(|source| vec![source.to_string()])
        .unwrap_or_default();

    let match_confidence = record.get("score").and_then(Value::as_f64).unwrap_or(0.0);
    let is_match = record.get("match").and_then(Value::as_bool).unwrap_or(true);

    let details = (category == Category::Individual).then(|| IndividualDetails {
        birth_dates: string_list(record.get("birth_date")),
        nationalities: string_list(record.get("nationality")),
        summary: non_empty_str(record.get("summary")).map(str::to_string),
        positions: string_list(record.get("position")),
        aliases: string_list(record.get("aliases")),
    });

    Finding {
        source_id,
        caption,
        category,
        origin_datasets,
        match_confidence,
        is_match,
        note: None,
        details,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// A field that may be a single string or an array of strings.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| non_empty_str(Some(item)))
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_shared::SourceStatus;
    use serde_json::json;

    fn config_for(server: &wiremock::MockServer) -> SanctionsConfig {
        SanctionsConfig {
            api_url: format!("{}/rpc/search_sanctions", server.uri()),
            limit: 5,
            timeout_secs: 2,
            api_key_env: None,
        }
    }

    fn yanukovych() -> Value {
        json!([{
            "id": 4711,
            "names": ["Viktor Fedorovych Yanukovych", "Viktor Yanukovich"],
            "type": "individual",
            "source": "eu",
            "score": 0.9,
            "birth_date": "1950-07-09",
            "nationality": "UA",
            "position": ["Former President of Ukraine"],
            "aliases": ["Yanukovich"]
        }])
    }

    #[test]
    fn maps_individual_record() {
        let outcome = map_sanctions_response("Viktor Yanukovych", yanukovych());
        assert_eq!(outcome.status(), SourceStatus::Success);

        let finding = &outcome.findings()[0];
        assert_eq!(finding.source_id, "4711");
        assert_eq!(finding.caption, "Viktor Fedorovych Yanukovych");
        assert_eq!(finding.category, Category::Individual);
        assert_eq!(finding.origin_datasets, vec!["eu".to_string()]);
        assert_eq!(finding.match_confidence, 0.9);
        assert!(finding.is_match);

        let details = finding.details.as_ref().expect("individual details");
        assert_eq!(details.birth_dates, vec!["1950-07-09".to_string()]);
        assert_eq!(details.nationalities, vec!["UA".to_string()]);
        assert_eq!(details.positions, vec!["Former President of Ukraine".to_string()]);
        assert_eq!(details.aliases, vec!["Yanukovich".to_string()]);
        assert!(details.summary.is_none());
        assert_eq!(outcome.raw_payload(), Some(&yanukovych()));
    }

    #[test]
    fn missing_fields_get_defaults() {
        let body = json!([{ "names": [] }, {}]);
        let outcome = map_sanctions_response("Mario Rossi", body);
        assert_eq!(outcome.findings().len(), 2);

        let finding = &outcome.findings()[0];
        assert_eq!(finding.source_id, "sn-unknown");
        assert_eq!(finding.caption, "Mario Rossi");
        assert_eq!(finding.category, Category::Unknown);
        assert!(finding.origin_datasets.is_empty());
        assert_eq!(finding.match_confidence, 0.0);
        assert!(finding.is_match);
        assert!(finding.details.is_none());
    }

    #[test]
    fn id_falls_back_to_first_name() {
        let body = json!([{ "names": ["ACME Trading LLC"], "type": "ENTITY", "match": false }]);
        let outcome = map_sanctions_response("Acme Trading", body);
        let finding = &outcome.findings()[0];
        assert_eq!(finding.source_id, "sn-ACME Trading LLC");
        assert_eq!(finding.category, Category::Entity);
        assert!(!finding.is_match);
        assert!(finding.details.is_none(), "details are individual-only");
    }

    #[test]
    fn details_ignored_for_entities() {
        let body = json!([{ "id": "x1", "names": ["Acme"], "type": "entity", "birth_date": "1990" }]);
        let outcome = map_sanctions_response("Acme", body);
        assert!(outcome.findings()[0].details.is_none());
    }

    #[test]
    fn unrecognised_shapes_are_empty() {
        for body in [json!([]), json!({"error": "nope"}), json!(null), json!(["a", 1])] {
            let outcome = map_sanctions_response("Mario Rossi", body);
            assert_eq!(outcome.status(), SourceStatus::Empty);
            assert!(outcome.findings().is_empty());
            assert!(outcome.message().is_some());
        }
    }

    #[tokio::test]
    async fn lookup_against_mock_server() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/rpc/search_sanctions"))
            .and(wiremock::matchers::query_param("name", "Viktor Yanukovych"))
            .and(wiremock::matchers::query_param("limit", "5"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(yanukovych()))
            .mount(&server)
            .await;

        let adapter = SanctionsAdapter::new(&config_for(&server), None).unwrap();
        let outcome = adapter
            .lookup(&SubjectQuery::new("Viktor", "Yanukovych"))
            .await;

        assert_eq!(outcome.status(), SourceStatus::Success);
        assert_eq!(outcome.query_echo(), "Viktor Yanukovych");
        assert_eq!(outcome.findings().len(), 1);
    }

    #[tokio::test]
    async fn empty_list_is_empty_outcome() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let adapter = SanctionsAdapter::new(&config_for(&server), None).unwrap();
        let outcome = adapter.lookup(&SubjectQuery::new("Mario", "Rossi")).await;
        assert_eq!(outcome.status(), SourceStatus::Empty);
    }

    #[tokio::test]
    async fn http_error_is_error_outcome() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let adapter = SanctionsAdapter::new(&config_for(&server), None).unwrap();
        let outcome = adapter.lookup(&SubjectQuery::new("Mario", "Rossi")).await;

        assert_eq!(outcome.status(), SourceStatus::Error);
        assert!(outcome.findings().is_empty());
        assert!(outcome.raw_payload().is_none());
        assert!(outcome.message().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn invalid_json_is_error_outcome() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let adapter = SanctionsAdapter::new(&config_for(&server), None).unwrap();
        let outcome = adapter.lookup(&SubjectQuery::new("Mario", "Rossi")).await;

        assert_eq!(outcome.status(), SourceStatus::Error);
        assert!(outcome.message().unwrap().contains("invalid response"));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.timeout_secs = 1;
        let adapter = SanctionsAdapter::new(&config, None).unwrap();
        let outcome = adapter.lookup(&SubjectQuery::new("Mario", "Rossi")).await;

        assert_eq!(outcome.status(), SourceStatus::Error);
        assert!(outcome.message().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn refused_connection_is_error_outcome() {
        // Grab a free port, then close it so nothing is listening.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = SanctionsConfig {
            api_url: format!("http://127.0.0.1:{port}/rpc/search_sanctions"),
            timeout_secs: 5,
            ..SanctionsConfig::default()
        };

        let adapter = SanctionsAdapter::new(&config, None).unwrap();
        let outcome = adapter.lookup(&SubjectQuery::new("Mario", "Rossi")).await;

        assert_eq!(outcome.status(), SourceStatus::Error);
        assert!(outcome.findings().is_empty());
        assert!(outcome.raw_payload().is_none());
        let message = outcome.message().unwrap();
        assert!(message.contains("failed"), "unexpected message: {message}");
    }

    #[tokio::test]
    async fn blank_subject_never_calls_remote() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let adapter = SanctionsAdapter::new(&config_for(&server), None).unwrap();
        let outcome = adapter.lookup(&SubjectQuery::new("  ", "")).await;

        assert_eq!(outcome.status(), SourceStatus::Error);
        assert_eq!(outcome.message(), Some(EMPTY_QUERY_MESSAGE));
    }

    #[tokio::test]
    async fn api_key_is_sent_as_bearer() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::header("authorization", "Bearer s3cret"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(yanukovych()))
            .mount(&server)
            .await;

        let adapter =
            SanctionsAdapter::new(&config_for(&server), Some("s3cret".into())).unwrap();
        let outcome = adapter
            .lookup(&SubjectQuery::new("Viktor", "Yanukovych"))
            .await;
        assert_eq!(outcome.status(), SourceStatus::Success);
    }

    #[test]
    fn invalid_endpoint_is_config_error() {
        let config = SanctionsConfig {
            api_url: "not a url".into(),
            ..SanctionsConfig::default()
        };
        let err = SanctionsAdapter::new(&config, None).err().expect("config error");
        assert!(err.to_string().contains("invalid sanctions api_url"));
    }
}
