use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use weathercache_core::{
    ObservationPatch, ResolvedDay, SummaryInput, WeatherError, WeatherObservation, WeatherService,
    WeatherSummary, export::CSV_FILENAME,
};

#[derive(Clone)]
pub struct AppState {
    service: Arc<WeatherService>,
}

impl AppState {
    pub fn new(service: WeatherService) -> Self {
        Self { service: Arc::new(service) }
    }
}

// --- Error Handling ---
#[derive(Debug)]
pub struct AppError(WeatherError);

impl From<WeatherError> for AppError {
    fn from(err: WeatherError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            WeatherError::InvalidRange { .. } | WeatherError::OutOfHorizon { .. } => {
                StatusCode::BAD_REQUEST
            }
            WeatherError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            WeatherError::LocationNotFound(_) | WeatherError::RecordNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            WeatherError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            WeatherError::Storage(_) | WeatherError::Export(_) => {
                tracing::error!("Internal error: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = serde_json::json!({ "error": self.0.to_string(), "kind": self.0.kind() });
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub location: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub location: String,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub patch: ObservationPatch,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub locations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: Option<WeatherSummary>,
}

async fn resolve_weather(
    State(state): State<AppState>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<Vec<ResolvedDay>>, AppError> {
    let today = chrono::Local::now().date_naive();
    let days = state
        .service
        .resolve_range(&req.location, req.start_date, req.end_date, today)
        .await?;
    Ok(Json(days))
}

async fn list_weather(
    State(state): State<AppState>,
) -> Result<Json<Vec<WeatherObservation>>, AppError> {
    Ok(Json(state.service.list_all()?))
}

async fn update_weather(
    State(state): State<AppState>,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<WeatherObservation>, AppError> {
    let updated = state
        .service
        .update_by_location_and_date(&req.location, req.date, &req.patch)?;
    Ok(Json(updated))
}

async fn update_weather_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<ObservationPatch>,
) -> Result<Json<WeatherObservation>, AppError> {
    Ok(Json(state.service.update_by_id(id, &patch)?))
}

async fn delete_weather(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.service.delete(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn export_csv(State(state): State<AppState>) -> Result<Response, AppError> {
    let csv = state.service.export_csv()?;
    let disposition = format!("attachment; filename={CSV_FILENAME}");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

async fn search_location(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<SearchResponse> {
    match state.service.search_locations(&query.q).await {
        Ok(locations) => Json(SearchResponse { locations, error: None }),
        Err(e) => Json(SearchResponse { locations: Vec::new(), error: Some(e.to_string()) }),
    }
}

async fn summarize(
    State(state): State<AppState>,
    Json(input): Json<SummaryInput>,
) -> Json<SummaryResponse> {
    Json(SummaryResponse { summary: state.service.summarize_day(&input).await })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/weather", post(resolve_weather).get(list_weather).patch(update_weather))
        .route("/weather/{id}", patch(update_weather_by_id).delete(delete_weather))
        .route("/export/csv", get(export_csv))
        .route("/search_location", get(search_location))
        .route("/summary", post(summarize))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(service: WeatherService, bind: &str) -> anyhow::Result<()> {
    let app = router(AppState::new(service));

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    tracing::info!("weathercache listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("weathercache stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
}
