use axum::Router;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod ai;
mod config;
mod dashboard;
mod database;
mod forecast;
mod routes;
mod utils;
mod widget;

use ai::{AdvisoryEnricher, AiClient};
use config::Config;
use dashboard::DashboardController;
use database::Database;
use forecast::openweather::OpenWeatherClient;
use routes::{create_router, AppState};
use widget::WidgetLoader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "farm_weather_advisor=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Missing DATABASE_URL stops startup here
    let config = Arc::new(Config::from_env()?);

    if config.weather_api_key.is_none() {
        tracing::warn!("WEATHER_API_KEY not set, weather fetches will fail");
    }
    if config.advisory_api_key.is_none() {
        tracing::warn!("ADVISORY_API_KEY not set, advisories will be unavailable");
    }

    let database = Arc::new(Database::new(config.database_url.clone()));

    let weather_client = Arc::new(OpenWeatherClient::new(config.as_ref().clone())?);
    let ai_client = Arc::new(AiClient::new(config.as_ref().clone())?);
    let enricher = AdvisoryEnricher::new(ai_client, config.advisory_timeout);

    let dashboard = Arc::new(DashboardController::new(
        weather_client,
        enricher,
        config.app_timezone,
        config.weather_timeout,
        &config.default_location,
    ));

    let widget = Arc::new(WidgetLoader::new(config.chatbot_app_id.clone()));
    widget.load();

    {
        let dashboard = dashboard.clone();
        tokio::spawn(async move {
            if let Err(e) = dashboard.mount().await {
                tracing::error!("Initial weather load skipped: {}", e);
            }
        });
    }

    let state = AppState {
        database,
        dashboard,
        widget,
    };

    let app: Router = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(config.bind_addr.as_str()).await?;
    tracing::info!("Server starting on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
