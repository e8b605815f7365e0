use axum::{routing::get, Router};
use callrail_reporting::callrail_client::CallRailClient;
use callrail_reporting::config::Config;
use callrail_reporting::handlers::{self, AppState};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the reporting service.
///
/// Initializes logging, loads configuration, builds the CallRail client and
/// report cache, then serves the API with CORS, tracing and per-IP rate
/// limiting.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "callrail_reporting=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let client = CallRailClient::from_config(&config)?;
    tracing::info!(
        "✓ CallRail client initialized for account {}",
        client.account_id()
    );

    // Aggregate reports page through up to thousands of calls, keep them briefly
    let report_cache = Cache::builder()
        .time_to_live(Duration::from_secs(config.report_cache_ttl_secs))
        .max_capacity(1_000)
        .build();
    tracing::info!(
        "Report cache initialized ({}s TTL)",
        config.report_cache_ttl_secs
    );

    let app_state = Arc::new(AppState {
        client,
        config: config.clone(),
        report_cache,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let protected_routes = handlers::callrail_routes().layer(
        ServiceBuilder::new()
            .layer(RequestBodyLimitLayer::new(64 * 1024))
            .layer(GovernorLayer {
                config: governor_conf,
            }),
    );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
