//! HTTP trigger for the intake pipeline.

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use dossier_core::Orchestrator;
use dossier_shared::{
    AggregateResult, AuditEvent, AuditEventKind, AuditSink, DossierError, RunId, SubjectQuery,
};

/// `source_module` recorded on trigger-level audit rows.
const TRIGGER_MODULE: &str = "trigger";

#[derive(Clone)]
pub(crate) struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub audit: Arc<dyn AuditSink>,
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/process_osint_data", post(process_osint_data))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Accepted request body. The Italian field names (`nome`, `cognome`) are
/// accepted too; when both spellings arrive, the English one wins.
#[derive(Debug, Default, Deserialize)]
struct IntakeRequest {
    #[serde(default)]
    given_name: Option<String>,
    #[serde(default)]
    nome: Option<String>,
    #[serde(default)]
    family_name: Option<String>,
    #[serde(default)]
    cognome: Option<String>,
    #[serde(default)]
    variants: Vec<String>,
}

impl IntakeRequest {
    fn into_subject(self) -> SubjectQuery {
        SubjectQuery::new(
            self.given_name.or(self.nome).unwrap_or_default(),
            self.family_name.or(self.cognome).unwrap_or_default(),
        )
        .with_variants(self.variants)
    }
}

#[derive(Debug, Serialize)]
struct IntakeResponse {
    status: &'static str,
    message: String,
    run_id: RunId,
    timestamp: String,
    aggregated_results: AggregateResult,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_data_received: Option<Value>,
}

type Reply<T> = (StatusCode, Json<T>);

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /health
async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /process_osint_data
async fn process_osint_data(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Reply<IntakeResponse>, Reply<ErrorResponse>> {
    // Keep whatever arrived, even if it is not JSON, for the audit trail.
    let raw: Value = serde_json::from_slice(&body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));
    let request: IntakeRequest = serde_json::from_value(raw.clone()).unwrap_or_else(|e| {
        debug!(error = %e, "request body did not decode, treating as empty");
        IntakeRequest::default()
    });

    let subject = request.into_subject();
    let identifier = subject.identifier();

    state
        .audit
        .record(
            AuditEvent::new(AuditEventKind::RequestReceived, &identifier)
                .source_module(TRIGGER_MODULE)
                .query_details(raw.clone()),
        )
        .await;

    if let Err(e) = subject.validate() {
        warn!(error = %e, "rejected intake request");
        state
            .audit
            .record(
                AuditEvent::new(AuditEventKind::InputError, &identifier)
                    .source_module(TRIGGER_MODULE)
                    .query_details(raw.clone())
                    .notes(e.to_string()),
            )
            .await;
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                status: "error",
                message: e.to_string(),
                raw_data_received: Some(raw),
            }),
        ));
    }

    // Run on its own task so a panic anywhere in the pipeline stays here.
    let orchestrator = Arc::clone(&state.orchestrator);
    let run_subject = subject.clone();
    let outcome = tokio::spawn(async move { orchestrator.run(&run_subject).await }).await;

    let failure = match outcome {
        Ok(Ok(report)) => {
            info!(run_id = %report.run_id, subject = %report.subject, "intake request served");
            return Ok((
                StatusCode::OK,
                Json(IntakeResponse {
                    status: "success",
                    message: format!("OSINT data processed for {}", report.subject),
                    run_id: report.run_id,
                    timestamp: Utc::now().to_rfc3339(),
                    aggregated_results: report.results,
                }),
            ));
        }
        Ok(Err(e)) => e.to_string(),
        Err(e) => DossierError::Pipeline(format!("task failed: {e}")).to_string(),
    };

    error!(subject = %identifier, error = %failure, "intake request failed");
    state
        .audit
        .record(
            AuditEvent::new(AuditEventKind::CriticalError, &identifier)
                .source_module(TRIGGER_MODULE)
                .notes(failure.clone()),
        )
        .await;

    Err((
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            status: "error",
            message: failure,
            raw_data_received: None,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use dossier_shared::{Finding, FindingRecord, ResultStore, SourceKind, SourceOutcome};
    use dossier_sources::SourceAdapter;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct UrlAdapter {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SourceAdapter for UrlAdapter {
        fn name(&self) -> &str {
            "dork_search"
        }
        fn kind(&self) -> SourceKind {
            SourceKind::WebSearch
        }
        fn data_category(&self) -> &str {
            "web_birth_data"
        }
        async fn lookup(&self, subject: &SubjectQuery) -> SourceOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            SourceOutcome::success(
                subject.full_name(),
                vec![Finding::raw_url("https://example.com/bio", "template")],
                serde_json::json!([]),
            )
        }
    }

    #[derive(Default)]
    struct RecordingAudit(Mutex<Vec<AuditEvent>>);

    #[async_trait]
    impl AuditSink for RecordingAudit {
        async fn record(&self, event: AuditEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    impl RecordingAudit {
        fn kinds(&self) -> Vec<AuditEventKind> {
            self.0.lock().unwrap().iter().map(|e| e.kind).collect()
        }
    }

    struct NullStore;

    #[async_trait]
    impl ResultStore for NullStore {
        async fn save_finding(&self, _record: FindingRecord) {}
    }

    struct ExplodingStore;

    #[async_trait]
    impl ResultStore for ExplodingStore {
        async fn save_finding(&self, _record: FindingRecord) {
            panic!("disk on fire");
        }
    }

    fn app(store: Arc<dyn ResultStore>) -> (Router, Arc<UrlAdapter>, Arc<RecordingAudit>) {
        let adapter = Arc::new(UrlAdapter {
            calls: AtomicUsize::new(0),
        });
        let audit = Arc::new(RecordingAudit::default());
        let orchestrator = Arc::new(Orchestrator::new(
            vec![adapter.clone()],
            audit.clone(),
            store,
        ));
        let router = router(AppState {
            orchestrator,
            audit: audit.clone(),
        });
        (router, adapter, audit)
    }

    fn post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/process_osint_data")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (app, _, _) = app(Arc::new(NullStore));
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["status"], "ok");
    }

    #[tokio::test]
    async fn missing_family_name_is_rejected() {
        let (app, adapter, audit) = app(Arc::new(NullStore));
        let resp = app.oneshot(post(r#"{"nome": "Mario"}"#)).await.unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["raw_data_received"]["nome"], "Mario");

        assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            audit.kinds(),
            vec![AuditEventKind::RequestReceived, AuditEventKind::InputError]
        );
        assert_eq!(audit.0.lock().unwrap()[0].subject, "unknown subject");
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let (app, adapter, audit) = app(Arc::new(NullStore));
        let resp = app.oneshot(post("not json")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["raw_data_received"], "not json");
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);
        assert_eq!(audit.kinds().len(), 2);
    }

    #[tokio::test]
    async fn italian_field_names_run_the_pipeline() {
        let (app, adapter, audit) = app(Arc::new(NullStore));
        let resp = app
            .oneshot(post(r#"{"nome": "Mario", "cognome": "Rossi"}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "success");
        assert!(json["run_id"].is_string());
        assert!(json["timestamp"].is_string());
        assert_eq!(json["aggregated_results"]["dork_search"]["status"], "success");
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);

        let kinds = audit.kinds();
        assert_eq!(kinds.first(), Some(&AuditEventKind::RequestReceived));
        assert_eq!(kinds.last(), Some(&AuditEventKind::ResponseSent));
        assert!(!kinds.contains(&AuditEventKind::CriticalError));
    }

    #[tokio::test]
    async fn english_field_names_are_accepted() {
        let (app, _, _) = app(Arc::new(NullStore));
        let resp = app
            .oneshot(post(r#"{"given_name": "Mario", "family_name": "Rossi"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn pipeline_panic_is_a_critical_error() {
        let (app, _, audit) = app(Arc::new(ExplodingStore));
        let resp = app
            .oneshot(post(r#"{"given_name": "Mario", "family_name": "Rossi"}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "error");
        assert!(json.get("raw_data_received").is_none());
        assert!(
            json["message"].as_str().unwrap().starts_with("pipeline error: task failed"),
            "unexpected message: {}",
            json["message"]
        );
        assert_eq!(audit.kinds().last(), Some(&AuditEventKind::CriticalError));
    }

    #[tokio::test]
    async fn both_field_spellings_are_accepted() {
        let (app, adapter, audit) = app(Arc::new(NullStore));
        let resp = app
            .oneshot(post(
                r#"{"nome": "Maria", "given_name": "Mario", "cognome": "Rossi"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(audit.0.lock().unwrap()[0].subject, "Mario Rossi");
    }
}
