//! Formflow server

use formflow::config::Config;
use formflow::db::{self, FormStore, InMemoryStore, PgStore, SubmissionSink};
use formflow::handlers::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "formflow=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Starting Formflow");
    tracing::info!("Environment: {:?}", config.environment);

    // Select storage
    let (forms, submissions): (Arc<dyn FormStore>, Arc<dyn SubmissionSink>) =
        match &config.database_url {
            Some(url) => {
                tracing::info!("Connecting to database...");
                let pool = db::create_pool(url).await?;
                tracing::info!("Database connected");

                tracing::info!("Running database migrations...");
                db::run_migrations(&pool).await?;

                let store = Arc::new(PgStore::new(pool));
                (store.clone(), store)
            }
            None => {
                tracing::warn!("No database configured, using in-memory storage");
                let store = Arc::new(InMemoryStore::new());
                (store.clone(), store)
            }
        };

    let state = AppState {
        forms,
        submissions,
        is_production: config.is_production(),
        trusted_proxies: config.trusted_proxies.clone(),
        frame_ancestors: config.embed_frame_ancestors.clone(),
    };

    // Build CORS layer
    let cors = if config.is_production() {
        CorsLayer::new()
            .allow_origin(
                config
                    .cors_origins
                    .iter()
                    .filter_map(|o| o.parse().ok())
                    .collect::<Vec<_>>(),
            )
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::permissive()
    };

    let app = handlers::router(state, Some(&config.frontend_dir))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.max_body_size))
        .layer(cors);

    // Start server
    let addr = config.server_addr();
    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Frontend served from: {}", config.frontend_dir);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
