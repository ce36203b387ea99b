use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    dashboard::{DashboardController, DashboardError, ViewState},
    database::Database,
    utils::ErrorResponse,
    widget::{WidgetDescriptor, WidgetLoader},
};

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub database: Arc<Database>,
    pub dashboard: Arc<DashboardController>,
    pub widget: Arc<WidgetLoader>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    pub location: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchRequest {
    pub location: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub database: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub generation: u64,
    pub state: ViewState,
}

fn dashboard_error(e: DashboardError) -> ApiError {
    let code = match e {
        DashboardError::EmptyLocation => "EMPTY_LOCATION",
    };
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(&e.to_string(), code)),
    )
}

// Route handlers
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.database.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!("Health check database ping failed: {}", e);
            "unavailable"
        }
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
    })
}

pub async fn get_dashboard(State(state): State<AppState>) -> Json<ViewState> {
    Json(state.dashboard.state())
}

pub async fn update_location(
    State(state): State<AppState>,
    Json(request): Json<LocationRequest>,
) -> Result<Json<ViewState>, ApiError> {
    state
        .dashboard
        .set_location(&request.location)
        .map_err(dashboard_error)?;
    Ok(Json(state.dashboard.state()))
}

// An empty body searches the current location; anything else must be a valid `SearchRequest`.
fn parse_search_request(body: &[u8]) -> Result<SearchRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(SearchRequest::default());
    }

    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!("Rejected search request body: {}", e);
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse::new(
                &format!("Invalid search request: {}", e),
                "INVALID_BODY",
            )),
        )
    })
}

pub async fn search(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<SearchResponse>), ApiError> {
    let request = parse_search_request(&body)?;

    let cycle = state
        .dashboard
        .begin_search(request.location.as_deref())
        .map_err(dashboard_error)?;
    let generation = cycle.generation;

    let dashboard = state.dashboard.clone();
    tokio::spawn(async move { dashboard.run(cycle).await });

    Ok((
        StatusCode::ACCEPTED,
        Json(SearchResponse {
            generation,
            state: state.dashboard.state(),
        }),
    ))
}

pub async fn get_widget(State(state): State<AppState>) -> Result<Json<WidgetDescriptor>, ApiError> {
    state.widget.load().cloned().map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("chat widget not configured", "WIDGET_DISABLED")),
        )
    })
}

// Create the router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/dashboard", get(get_dashboard))
        .route("/dashboard/location", put(update_location))
        .route("/dashboard/search", post(search))
        .route("/widget", get(get_widget))
        .with_state(state)
}
