use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rocket::fs::FileServer;
use rocket::http::Status;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::{get, post, routes, Build, Rocket, State};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use common::ServerConfig;

use crate::cancel::CancelToken;
use crate::error::LensError;
use crate::pipeline::Pipeline;

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub pipeline: Arc<Pipeline>,
}

/// Response structure for `/api/v1/status`.
#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    uptime_seconds: i64,
    model: String,
    strategies: Vec<String>,
}

/// Request body for `/api/v1/analyze`: a URL or pasted page text.
#[derive(Deserialize)]
struct AnalyzeRequest {
    input: String,
}

type ApiError = (Status, Json<serde_json::Value>);

fn error_status(err: &LensError) -> Status {
    match err {
        LensError::InvalidInput(_) => Status::BadRequest,
        LensError::Acquisition(_) | LensError::Parse(_) => Status::UnprocessableEntity,
        LensError::ModelResponse(_) => Status::BadGateway,
        LensError::Cancelled => Status::ServiceUnavailable,
        LensError::Configuration(_) | LensError::Other(_) => Status::InternalServerError,
    }
}

/// Redirect root to static index.html
#[get("/")]
async fn index_redirect() -> Redirect {
    Redirect::to("/static/index.html")
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

/// Status endpoint returning uptime and the active model/strategy chain.
#[get("/api/v1/status")]
async fn status(state: &State<AppState>) -> Json<StatusResponse> {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    Json(StatusResponse {
        status: "ok",
        uptime_seconds: uptime,
        model: state.pipeline.model().to_string(),
        strategies: state
            .pipeline
            .strategy_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
    })
}

#[post("/api/v1/analyze", data = "<body>")]
async fn analyze(
    state: &State<AppState>,
    body: Json<AnalyzeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("analyze", %request_id);

    // No client-disconnect signal is available here; per-call timeouts still bound the work.
    let cancel = CancelToken::never();
    let outcome = state
        .pipeline
        .run(&body.input, &cancel)
        .instrument(span)
        .await;

    match outcome {
        Ok(result) => Ok(Json(serde_json::json!({ "result": result }))),
        Err(e) => Err((
            error_status(&e),
            Json(serde_json::json!({ "error": e.to_string(), "kind": e.kind() })),
        )),
    }
}

/// Assemble the Rocket instance; split from [`launch_rocket`] so tests can drive it locally.
pub fn build_rocket(state: AppState, server: &ServerConfig) -> Rocket<Build> {
    let fig = rocket::Config::figment()
        .merge(("address", server.bind.clone()))
        .merge(("port", server.port));

    let mut rocket = rocket::custom(fig)
        .manage(state)
        .mount("/", routes![health, status, analyze]);

    if let Some(dir) = &server.static_dir {
        rocket = rocket
            .mount("/", routes![index_redirect])
            .mount("/static", FileServer::from(dir.as_str()));
    }

    rocket
}

pub async fn launch_rocket(state: AppState, server: &ServerConfig) -> Result<()> {
    tracing::info!(bind = %server.bind, port = server.port, "Starting Rocket HTTP server");
    build_rocket(state, server)
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}
