use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketdesk_core::analysis;
use marketdesk_core::analysis::highlights::Highlights;
use marketdesk_core::analysis::indicators::TechnicalSignal;
use marketdesk_core::analysis::RiskBuckets;
use marketdesk_core::domain::recommendation::{
    PositionDecision, Recommendation, RecommendationSnapshot,
};
use marketdesk_core::domain::stock::{OwnedSecurity, PriceHistory, StockListing, StockQuote};
use marketdesk_core::ingest::market::MarketDataClient;
use marketdesk_core::ingest::platform::PlatformClient;
use marketdesk_core::ingest::{HistoryRange, QuoteProvider};
use marketdesk_core::store::cache::{CacheKey, QuoteCache};
use marketdesk_core::store::FileStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = marketdesk_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let market = Arc::new(MarketDataClient::from_settings(&settings)?);

    // The dashboard stays useful without platform credentials: catalog reads
    // fall back to the store, and /api/portfolio answers 503.
    let platform: Option<Arc<PlatformClient>> = match PlatformClient::from_settings(&settings) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "platform client unavailable; starting in market-data-only mode");
            None
        }
    };

    let state = AppState {
        market,
        platform,
        store: FileStore::from_settings(&settings),
        cache: QuoteCache::from_env(),
    };

    let app = Router::new()
        .route("/", get(dashboard))
        .route("/healthz", get(healthz))
        .route("/api/stocks", get(get_stocks))
        .route("/api/stocks/:symbol", get(get_stock))
        .route("/api/stocks/:symbol/history", get(get_history))
        .route("/api/recommendations", get(get_recommendations))
        .route("/api/portfolio", get(get_portfolio))
        .route("/api/highlights", get(get_highlights))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "dashboard listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn dashboard() -> Html<&'static str> {
    Html(include_str!("dashboard.html"))
}

#[derive(Clone)]
struct AppState {
    market: Arc<MarketDataClient>,
    platform: Option<Arc<PlatformClient>>,
    store: FileStore,
    cache: QuoteCache,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn error_body(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (status, Json(ErrorBody { error: msg.into() }))
}

fn upstream_error(err: anyhow::Error) -> ApiError {
    sentry_anyhow::capture_anyhow(&err);
    tracing::error!(error = %err, "upstream fetch failed");
    error_body(StatusCode::BAD_GATEWAY, format!("{err:#}"))
}

fn internal_error(err: anyhow::Error) -> ApiError {
    sentry_anyhow::capture_anyhow(&err);
    tracing::error!(error = %err, "request failed");
    error_body(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
}

#[derive(Debug, Deserialize)]
struct DateParams {
    date: Option<String>,
}

fn parse_date_param(date: Option<String>) -> Result<Option<NaiveDate>, ApiError> {
    match date {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| error_body(StatusCode::BAD_REQUEST, format!("invalid date: {s}"))),
    }
}

async fn get_stocks(State(state): State<AppState>) -> Result<Json<Vec<StockListing>>, ApiError> {
    let key = CacheKey::new("*", "catalog");
    let value = state
        .cache
        .get_or_fetch(key, || async {
            let listings = catalog_with_fallback(&state).await?;
            serde_json::to_value(listings).map_err(anyhow::Error::from)
        })
        .await
        .map_err(upstream_error)?;

    let listings: Vec<StockListing> = serde_json::from_value(value).map_err(|e| internal_error(e.into()))?;
    Ok(Json(listings))
}

async fn catalog_with_fallback(state: &AppState) -> anyhow::Result<Vec<StockListing>> {
    if let Some(platform) = &state.platform {
        match platform.fetch_catalog(None).await {
            Ok(listings) if !listings.is_empty() => return Ok(listings),
            Ok(_) => tracing::warn!("platform catalog is empty; falling back to stored catalog"),
            Err(err) => {
                tracing::warn!(error = %err, "platform catalog fetch failed; falling back to stored catalog");
            }
        }
    }
    state
        .store
        .load_catalog()
        .context("no reachable platform and no stored catalog")
}

#[derive(Debug, Serialize)]
struct StockDetail {
    quote: StockQuote,
    recommendation: Recommendation,
}

async fn get_stock(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<StockDetail>, ApiError> {
    let key = CacheKey::new(&symbol, "quote");
    let value = state
        .cache
        .get_or_fetch(key, || async {
            let quote = state.market.fetch_quote(&symbol).await?;
            serde_json::to_value(quote).map_err(anyhow::Error::from)
        })
        .await
        .map_err(upstream_error)?;

    let quote: StockQuote = serde_json::from_value(value).map_err(|e| internal_error(e.into()))?;
    let recommendation = analysis::advise_quote(&quote);
    Ok(Json(StockDetail {
        quote,
        recommendation,
    }))
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    range: Option<String>,
}

#[derive(Debug, Serialize)]
struct HistoryDetail {
    history: PriceHistory,
    technical: Vec<TechnicalSignal>,
}

async fn get_history(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryDetail>, ApiError> {
    let range_str = params.range.unwrap_or_else(|| "1mo".to_string());
    let range = HistoryRange::parse(&range_str)
        .ok_or_else(|| error_body(StatusCode::BAD_REQUEST, format!("invalid range: {range_str}")))?;

    let key = CacheKey::new(&symbol, format!("history:{}", range.as_str()));
    let value = state
        .cache
        .get_or_fetch(key, || async {
            let history = state.market.fetch_history(&symbol, range).await?;
            serde_json::to_value(history).map_err(anyhow::Error::from)
        })
        .await
        .map_err(upstream_error)?;

    let history: PriceHistory = serde_json::from_value(value).map_err(|e| internal_error(e.into()))?;
    let technical = analysis::indicators::technical_signals(&history).map_err(internal_error)?;
    Ok(Json(HistoryDetail { history, technical }))
}

#[derive(Debug, Serialize)]
struct RecommendationsView {
    snapshot: RecommendationSnapshot,
    risk_buckets: RiskBuckets,
}

async fn get_recommendations(
    State(state): State<AppState>,
    Query(params): Query<DateParams>,
) -> Result<Json<RecommendationsView>, ApiError> {
    let as_of_date = parse_date_param(params.date)?;

    let snapshot = state
        .store
        .load_quote_snapshot(as_of_date)
        .map_err(internal_error)?
        .ok_or_else(|| {
            error_body(
                StatusCode::NOT_FOUND,
                "no stored quote snapshot; run the CLI with --action run_all first",
            )
        })?;

    let recommendations = analysis::build_snapshot(snapshot.as_of_date, &snapshot.quotes);
    let risk_buckets = analysis::risk_buckets(&snapshot.quotes);
    Ok(Json(RecommendationsView {
        snapshot: recommendations,
        risk_buckets,
    }))
}

#[derive(Debug, Serialize)]
struct PortfolioView {
    positions: Vec<OwnedSecurity>,
    decisions: Vec<PositionDecision>,
}

async fn get_portfolio(State(state): State<AppState>) -> Result<Json<PortfolioView>, ApiError> {
    let Some(platform) = &state.platform else {
        return Err(error_body(
            StatusCode::SERVICE_UNAVAILABLE,
            "platform is not configured",
        ));
    };
    if !platform.has_credentials() {
        return Err(error_body(
            StatusCode::SERVICE_UNAVAILABLE,
            "platform credentials are not configured",
        ));
    }

    let session = platform.login().await.map_err(upstream_error)?;
    let positions = platform
        .fetch_portfolio(&session)
        .await
        .map_err(upstream_error)?;

    let recommendations = state
        .store
        .load_quote_snapshot(None)
        .ok()
        .flatten()
        .map(|snap| analysis::analyze_quotes(&snap.quotes))
        .unwrap_or_default();
    let decisions = analysis::portfolio::decide_positions(&positions, &recommendations);

    Ok(Json(PortfolioView {
        positions,
        decisions,
    }))
}

async fn get_highlights(
    State(state): State<AppState>,
    Query(params): Query<DateParams>,
) -> Result<Json<Highlights>, ApiError> {
    let as_of_date = parse_date_param(params.date)?;

    let snapshot = state
        .store
        .load_quote_snapshot(as_of_date)
        .map_err(internal_error)?
        .ok_or_else(|| {
            error_body(
                StatusCode::NOT_FOUND,
                "no stored quote snapshot for that date",
            )
        })?;

    let highlights =
        analysis::highlights::compute_highlights(snapshot.as_of_date, &snapshot.quotes);
    Ok(Json(highlights))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &marketdesk_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
