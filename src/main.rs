use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quest_intel_api::apollo_storage::{ApolloStorageService, EnrichmentStore};
use quest_intel_api::config::Config;
use quest_intel_api::db::Database;
use quest_intel_api::db_storage::PgEnrichmentStore;
use quest_intel_api::handlers::{self, AppState};
use quest_intel_api::intelligence::UnifiedIntelligenceService;
use quest_intel_api::memory_storage::MemoryEnrichmentStore;
use quest_intel_api::services::{ApolloService, UnconfiguredCompanyProfile, UnconfiguredWebSearch};

/// Main entry point for the application.
///
/// Initializes tracing, configuration, the enrichment store (Postgres or
/// in-memory), the Apollo client and the intelligence services, then serves
/// the admin API with CORS, body-size, rate-limit and timeout layers.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quest_intel_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let store: Arc<dyn EnrichmentStore> = match config.database_url.as_deref() {
        Some(url) => {
            let db = Database::new(url).await?;
            db.ensure_schema().await?;
            tracing::info!("Database connection pool established");
            Arc::new(PgEnrichmentStore::new(db.pool))
        }
        None => {
            tracing::warn!("Using in-memory enrichment store, data is lost on restart");
            Arc::new(MemoryEnrichmentStore::new())
        }
    };
    let storage = Arc::new(ApolloStorageService::new(store));

    let apollo = match config.apollo_api_key {
        Some(_) => {
            let client = ApolloService::new(&config)?;
            tracing::info!("✓ Apollo client initialized: {}", config.apollo_base_url);
            Some(Arc::new(client))
        }
        None => None,
    };

    let intelligence = Arc::new(UnifiedIntelligenceService::new(
        storage.clone(),
        apollo,
        Arc::new(UnconfiguredWebSearch),
        Arc::new(UnconfiguredCompanyProfile),
    ));

    let app_state = Arc::new(AppState::new(config.clone(), storage, intelligence));

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let request_timeout = Duration::from_secs(config.request_timeout_secs);

    let app = handlers::router(app_state)
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB max payload
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                })
                // Requests running longer than REQUEST_TIMEOUT_SECS get a 408
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
