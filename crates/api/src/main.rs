use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rakshak_core::config::Settings;
use rakshak_core::domain::market::{AnalysisRequest, AnalysisResult, MarketPriceSummary, MarketRegion};
use rakshak_core::ingest::data_gov::DataGovClient;
use rakshak_core::{AnalysisError, MarketAnalyzer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let analyzer = match MarketAnalyzer::from_settings(&settings) {
        Ok(analyzer) => Arc::new(analyzer),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            return Err(e);
        }
    };

    // The market directory needs data.gov.in even when analysis runs on mock prices.
    let directory = match DataGovClient::from_settings(&settings) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!(error = %e, "data.gov.in not configured; market directory disabled");
            None
        }
    };

    tracing::info!(
        prices = analyzer.price_provider_name(),
        directory = directory.is_some(),
        "market analyzer ready"
    );

    let app = router(AppState {
        analyzer,
        directory,
    });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/market-analysis", post(get_market_analysis))
        .route("/markets/states", get(list_states))
        .route("/markets/states/:state", get(list_markets))
        .route("/markets/prices", get(get_latest_price))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    analyzer: Arc<MarketAnalyzer>,
    directory: Option<Arc<DataGovClient>>,
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
}

/// Error response carrying a user-presentable message.
#[derive(Debug)]
struct ApiFailure {
    status: StatusCode,
    message: String,
}

impl ApiFailure {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn directory_unavailable() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Market directory is not configured.",
        )
    }

    fn upstream(e: anyhow::Error) -> Self {
        sentry_anyhow::capture_anyhow(&e);
        tracing::error!(error = %format!("{e:#}"), "data.gov.in lookup failed");
        Self::new(
            StatusCode::BAD_GATEWAY,
            "Could not fetch live market data. Please try again.",
        )
    }
}

impl From<AnalysisError> for ApiFailure {
    fn from(err: AnalysisError) -> Self {
        Self::new(analysis_status(&err), err.to_string())
    }
}

impl From<JsonRejection> for ApiFailure {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!(error = %rejection.body_text(), "rejected market analysis body");
        Self::new(
            StatusCode::BAD_REQUEST,
            "Request body must be a JSON object with commodity, harvest time, crop condition and language.",
        )
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiError {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn analysis_status(err: &AnalysisError) -> StatusCode {
    match err {
        AnalysisError::Validation(_) => StatusCode::BAD_REQUEST,
        AnalysisError::NoData { .. } => StatusCode::NOT_FOUND,
        AnalysisError::Upstream { .. } | AnalysisError::Generation { .. } => {
            StatusCode::BAD_GATEWAY
        }
    }
}

async fn get_market_analysis(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Json<AnalysisResult>, ApiFailure> {
    let Json(request) = payload?;
    let result = state.analyzer.analyze(&request).await?;
    Ok(Json(result))
}

async fn list_states(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiFailure> {
    let Some(directory) = &state.directory else {
        return Err(ApiFailure::directory_unavailable());
    };

    let states = directory
        .distinct_states()
        .await
        .map_err(ApiFailure::upstream)?;
    Ok(Json(states))
}

async fn list_markets(
    State(state): State<AppState>,
    Path(market_state): Path<String>,
) -> Result<Json<Vec<String>>, ApiFailure> {
    let Some(directory) = &state.directory else {
        return Err(ApiFailure::directory_unavailable());
    };

    let markets = directory
        .markets_for_state(&market_state)
        .await
        .map_err(ApiFailure::upstream)?;
    Ok(Json(markets))
}

#[derive(Debug, Deserialize)]
struct PriceQuery {
    commodity: String,
    state: String,
    market: String,
}

async fn get_latest_price(
    State(state): State<AppState>,
    Query(query): Query<PriceQuery>,
) -> Result<Json<MarketPriceSummary>, ApiFailure> {
    let Some(directory) = &state.directory else {
        return Err(ApiFailure::directory_unavailable());
    };

    let (commodity, region) = validate_price_query(query)?;
    directory
        .latest_price(&commodity, &region)
        .await
        .map_err(ApiFailure::upstream)?
        .map(Json)
        .ok_or_else(|| {
            AnalysisError::NoData {
                commodity,
                region: Some(region),
            }
            .into()
        })
}

fn validate_price_query(query: PriceQuery) -> Result<(String, MarketRegion), ApiFailure> {
    let commodity = query.commodity.trim().to_string();
    let state = query.state.trim().to_string();
    let market = query.market.trim().to_string();
    if commodity.is_empty() || state.is_empty() || market.is_empty() {
        return Err(ApiFailure::new(
            StatusCode::BAD_REQUEST,
            "Commodity, State, and Market are required.",
        ));
    }
    Ok((commodity, MarketRegion { state, market }))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
