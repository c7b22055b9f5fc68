//! HTTP surface for the news pipeline: the trigger endpoint used by the
//! manual "Generate Now" action, the scheduler endpoint invoked on a
//! fixed cadence, and a status check.

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, routing::post, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::db::Database;
use crate::fetch::PerplexityClient;
use crate::generator::{self, GenerationRequest};
use crate::image::UnsplashClient;
use crate::scheduler;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub llm: Arc<PerplexityClient>,
    pub images: Arc<UnsplashClient>,
}

impl AppState {
    pub fn new(db: Database, config: &Config) -> Self {
        let llm = Arc::new(PerplexityClient::new(
            &config.perplexity_api_key,
            &config.perplexity_api_url,
        ));
        let images = Arc::new(UnsplashClient::new(
            config.unsplash_access_key.as_deref(),
            &config.unsplash_api_url,
        ));
        AppState { db, llm, images }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct GenerateBody {
    group_id: Option<String>,
    is_manual_request: Option<bool>,
    user_id: Option<String>,
}

pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let app = Router::new()
        .route("/status", get(status_check))
        .route("/news/generate", post(generate_news))
        .route("/news/scheduled", post(scheduled_news))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Status check endpoint: build metadata for health probes.
async fn status_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "OK",
        "version": env!("CARGO_PKG_VERSION"),
        "built": option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
    }))
}

/// The trigger endpoint. Individual group failures come back inside
/// `results` with HTTP 200; a 500 is reserved for a top-level fault such
/// as the group query itself failing.
async fn generate_news(
    State(state): State<AppState>,
    body: Option<Json<GenerateBody>>,
) -> impl IntoResponse {
    let body = body.map(|Json(inner)| inner).unwrap_or_default();
    let request = GenerationRequest {
        group_id: body.group_id,
        is_manual: body.is_manual_request.unwrap_or(false),
        user_id: body.user_id,
    };

    match generator::run(&state.db, state.llm.as_ref(), state.images.as_ref(), request).await {
        Ok(report) => (StatusCode::OK, Json(json!(report))).into_response(),
        Err(err) => {
            error!("Error in news generation: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

/// The scheduler endpoint: no body, gates every enabled group by
/// frequency and dispatches the due ones.
async fn scheduled_news(State(state): State<AppState>) -> impl IntoResponse {
    match scheduler::run_scheduled(&state.db, state.llm.as_ref(), state.images.as_ref()).await {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({
                "message": report.message,
                "results": report.results,
                "timestamp": Utc::now().to_rfc3339(),
            })),
        )
            .into_response(),
        Err(err) => {
            error!("Error in scheduled news generation: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}
