use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use debtleads_core::config::validate_threshold;
use debtleads_core::{Amount, MatchStrategy, Settings};
use debtleads_pipeline::{Pipeline, PipelineError};
use debtleads_source::{DelimitedOptions, parse_delimited};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{DebtSource, JobReport, JobState, JobStore, ServiceError};

/// Largest accepted submission (plan exports can be sizeable).
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Shared between handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn JobStore>,
    pub debts: Arc<dyn DebtSource>,
}

impl AppState {
    pub fn new(settings: Settings, store: Arc<dyn JobStore>, debts: Arc<dyn DebtSource>) -> Self {
        Self {
            settings: Arc::new(settings),
            store,
            debts,
        }
    }
}

/// Build the router with CORS restricted to `settings.service.cors_origins`
/// (any origin when the list is empty).
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.service.cors_origins);
    Router::new()
        .route("/health", get(health))
        .route("/jobs", post(submit))
        .route("/jobs/:id", get(status))
        .route("/jobs/:id/result", get(result))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Bind `settings.service.bind` and serve until the process stops.
pub async fn serve(state: AppState) -> Result<(), ServiceError> {
    let addr = state.settings.service.bind.clone();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "job service listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// A validated submission.
struct Submission {
    minimum: Amount,
    strategy: Option<MatchStrategy>,
    plan_files: Vec<Vec<u8>>,
}

async fn read_submission(mut multipart: Multipart) -> Result<Submission, ServiceError> {
    let bad = |e: axum::extract::multipart::MultipartError| ServiceError::BadRequest(e.to_string());

    let mut minimum = None;
    let mut strategy = None;
    let mut plan_files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(bad)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "minimum_threshold" => {
                let text = field.text().await.map_err(bad)?;
                let value = Amount::parse(&text).ok_or_else(|| {
                    ServiceError::BadRequest(format!("minimum_threshold {text:?} is not a number"))
                })?;
                validate_threshold(value).map_err(|e| ServiceError::BadRequest(e.to_string()))?;
                minimum = Some(value);
            }
            "strategy" => {
                let text = field.text().await.map_err(bad)?;
                let parsed = text
                    .parse::<MatchStrategy>()
                    .map_err(|e| ServiceError::BadRequest(e.to_string()))?;
                strategy = Some(parsed);
            }
            "plan_file" => plan_files.push(field.bytes().await.map_err(bad)?.to_vec()),
            other => warn!(field = other, "ignoring unknown form field"),
        }
    }

    let minimum = minimum
        .ok_or_else(|| ServiceError::BadRequest("minimum_threshold is required".into()))?;
    if plan_files.is_empty() {
        let missing = PipelineError::InputNotFound("no plan_file was uploaded".into());
        return Err(ServiceError::BadRequest(missing.to_string()));
    }
    Ok(Submission {
        minimum,
        strategy,
        plan_files,
    })
}

async fn submit(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServiceError> {
    let submission = read_submission(multipart).await?;
    let id = state.store.create().await;
    info!(
        job = %id,
        minimum = %submission.minimum,
        plan_files = submission.plan_files.len(),
        "job submitted"
    );

    let store = Arc::clone(&state.store);
    tokio::spawn(async move {
        let outcome = run_job(&state, submission).await;
        let next = match outcome {
            Ok(report) => {
                info!(job = %id, debtors = report.debtor_count, "job finished");
                JobState::Done(Arc::new(report))
            }
            Err(e) => {
                error!(job = %id, error = %e, "job failed");
                JobState::Failed(e.to_string())
            }
        };
        store.finish(id, next).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "job_id": id, "status": "pending" })),
    ))
}

async fn run_job(state: &AppState, submission: Submission) -> Result<JobReport, ServiceError> {
    let raw = state.debts.load().await?;
    let settings = Arc::clone(&state.settings);
    tokio::task::spawn_blocking(move || -> Result<JobReport, ServiceError> {
        let options = DelimitedOptions::from_format(&settings.plans.format)?;
        let plans: Vec<RecordBatch> = submission
            .plan_files
            .iter()
            .map(|bytes| parse_delimited(bytes, &options))
            .collect::<Result<_, _>>()?;

        let mut pipeline = Pipeline::new(&settings)?.with_minimum(submission.minimum)?;
        if let Some(strategy) = submission.strategy {
            pipeline = pipeline.with_strategy(strategy);
        }
        let output = pipeline.run(&raw, Some(plans.as_slice()))?;
        let outcome = output
            .matches
            .ok_or_else(|| PipelineError::InputNotFound("plan tables were not matched".into()))?;
        Ok(JobReport {
            minimum_threshold: submission.minimum,
            debtor_count: output.debtors.len(),
            outcome,
        })
    })
    .await?
}

fn parse_id(raw: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw).map_err(|_| ServiceError::NotFound(raw.to_string()))
}

async fn status(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let id = parse_id(&raw)?;
    let job = state
        .store
        .get(id)
        .await
        .ok_or_else(|| ServiceError::NotFound(raw.clone()))?;
    let mut body = json!({ "job_id": id, "status": job.status() });
    if let JobState::Failed(message) = &job {
        body["error"] = json!(message);
    }
    Ok(Json(body))
}

async fn result(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let id = parse_id(&raw)?;
    match state.store.get(id).await {
        None => Err(ServiceError::NotFound(raw)),
        Some(JobState::Pending) => Err(ServiceError::NotReady(raw)),
        Some(JobState::Failed(message)) => Err(ServiceError::JobFailed { id: raw, message }),
        Some(JobState::Done(report)) => Ok(Json(json!({ "job_id": id, "result": *report }))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use arrow::array::{ArrayRef, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::MemoryJobStore;

    struct FixedDebts(RecordBatch);

    #[async_trait]
    impl DebtSource for FixedDebts {
        async fn load(&self) -> Result<RecordBatch, ServiceError> {
            Ok(self.0.clone())
        }
    }

    fn debts() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("CPF_CNPJ", DataType::Utf8, true),
            Field::new("NOME_DEVEDOR", DataType::Utf8, true),
            Field::new("UF_DEVEDOR", DataType::Utf8, true),
            Field::new("VALOR_CONSOLIDADO", DataType::Utf8, true),
        ]));
        let column = |values: Vec<&str>| -> ArrayRef { Arc::new(StringArray::from(values)) };
        RecordBatch::try_new(
            schema,
            vec![
                column(vec!["A/0001-1", "B/0001-1", "C/0001-1"]),
                column(vec!["ALFA LTDA", "BETA SA", "MUNICIPIO DE X"]),
                column(vec!["RS", "RS", "RS"]),
                column(vec!["200000,00", "300000,00", "900000,00"]),
            ],
        )
        .unwrap()
    }

    const PLAN_CSV: &str = "Painel\nExportado\n\
        CPF/CNPJ do Optante;Tipo de Negociação;Modalidade da Negociação;Situação da Negociação;\
        Qtde de Parcelas Concedidas;Qtde de Parcelas em Atraso;Valor Consolidado;Valor do Principal;\
        Valor da Multa;Valor dos Juros;Valor do Encargo Legal\n\
        A/0001-1;Transação;Edital;Em dia;60;0;150000;100000;20000;20000;10000\n";

    fn app() -> Router {
        router(AppState::new(
            Settings::default(),
            Arc::new(MemoryJobStore::new()),
            Arc::new(FixedDebts(debts())),
        ))
    }

    fn multipart(fields: &[(&str, &str)]) -> Request<Body> {
        let boundary = "debtleadsboundary";
        let mut body = String::new();
        for (name, value) in fields {
            let filename = if *name == "plan_file" {
                "; filename=\"painel do contribuinte.csv\""
            } else {
                ""
            };
            body.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"{filename}\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str(&format!("--{boundary}--\r\n"));
        Request::post("/jobs")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn get(app: &Router, uri: &str) -> axum::response::Response {
        app.clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn wait_for(app: &Router, id: &str) -> serde_json::Value {
        for _ in 0..100 {
            let body = json_body(get(app, &format!("/jobs/{id}")).await).await;
            if body["status"] != "pending" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} never finished");
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = get(&app(), "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn submit_poll_and_fetch_result() {
        let app = app();
        let response = app
            .clone()
            .oneshot(multipart(&[
                ("minimum_threshold", "100000"),
                ("plan_file", PLAN_CSV),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let id = json_body(response).await["job_id"]
            .as_str()
            .unwrap()
            .to_string();

        let status = wait_for(&app, &id).await;
        assert_eq!(status["status"], "done");

        let result = json_body(get(&app, &format!("/jobs/{id}/result")).await).await;
        let report = &result["result"];
        assert_eq!(report["strategy"], "row-level");
        assert_eq!(report["debtor_count"], 2);
        assert_eq!(report["matched"][0]["taxpayer_id"], "A/0001-1");
        assert_eq!(report["matched"][0]["status"], "Em dia");
        assert_eq!(report["unmatched"][0]["taxpayer_id"], "B/0001-1");
    }

    #[tokio::test]
    async fn summarized_strategy_can_be_requested() {
        let app = app();
        let response = app
            .clone()
            .oneshot(multipart(&[
                ("minimum_threshold", "100000"),
                ("strategy", "summary"),
                ("plan_file", PLAN_CSV),
            ]))
            .await
            .unwrap();
        let id = json_body(response).await["job_id"]
            .as_str()
            .unwrap()
            .to_string();
        wait_for(&app, &id).await;

        let result = json_body(get(&app, &format!("/jobs/{id}/result")).await).await;
        let debtors = result["result"]["debtors"].as_array().unwrap();
        assert_eq!(debtors.len(), 2);
        assert_eq!(debtors[0]["has_plan"], true);
        assert_eq!(debtors[1]["has_plan"], false);
    }

    #[tokio::test]
    async fn plan_without_id_column_fails_job_with_column_name() {
        let app = app();
        let response = app
            .clone()
            .oneshot(multipart(&[
                ("minimum_threshold", "100000"),
                ("plan_file", "a\nb\nCNPJ;Situação\nA/0001-1;Em dia\n"),
            ]))
            .await
            .unwrap();
        let id = json_body(response).await["job_id"]
            .as_str()
            .unwrap()
            .to_string();

        let status = wait_for(&app, &id).await;
        assert_eq!(status["status"], "failed");
        assert!(status["error"].as_str().unwrap().contains("CPF/CNPJ do Optante"));

        let response = get(&app, &format!("/jobs/{id}/result")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error"], "internal_error");
    }

    #[tokio::test]
    async fn rejects_bad_submissions() {
        let app = app();
        let no_plan = app
            .clone()
            .oneshot(multipart(&[("minimum_threshold", "100000")]))
            .await
            .unwrap();
        assert_eq!(no_plan.status(), StatusCode::BAD_REQUEST);

        let negative = app
            .clone()
            .oneshot(multipart(&[
                ("minimum_threshold", "-5"),
                ("plan_file", PLAN_CSV),
            ]))
            .await
            .unwrap();
        assert_eq!(negative.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let app = app();
        let response = get(&app, &format!("/jobs/{}", Uuid::new_v4())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = get(&app, "/jobs/not-a-uuid/result").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn result_before_completion_is_not_ready() {
        let store = Arc::new(MemoryJobStore::new());
        let id = store.create().await;
        let app = router(AppState::new(
            Settings::default(),
            store,
            Arc::new(FixedDebts(debts())),
        ));
        let response = get(&app, &format!("/jobs/{id}/result")).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(response).await["error"], "not_ready");
    }
}
