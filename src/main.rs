use axum::{routing::get, Extension, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod openrouter_client;
mod store;
mod token;

/// Shared state: the stores (each over the same pool, each query acquiring
/// its own connection) and the optional model client.
pub struct AppState {
    pub credentials: store::credentials::CredentialStore,
    pub chats: store::chat::ChatStore,
    pub timesheets: store::timesheet::TimesheetStore,
    pub model_client: Option<openrouter_client::OpenRouterClient>,
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_logging().expect("Failed to initialize logging");

    // Create the database connection pool and run migrations
    let db_pool = db::create_pool()
        .await
        .expect("Failed to create database pool.");

    // Initialize the OpenRouter client if an API key is provided
    let model_client = match std::env::var("OPENROUTER_API_KEY").ok() {
        Some(api_key) if !api_key.is_empty() => {
            tracing::info!("Initializing OpenRouter model client...");
            Some(openrouter_client::OpenRouterClient::new(api_key))
        }
        _ => {
            tracing::warn!("OPENROUTER_API_KEY not found. Chat answers will be unavailable.");
            None
        }
    };

    let shared_state = Arc::new(AppState {
        credentials: store::credentials::CredentialStore::new(db_pool.clone()),
        chats: store::chat::ChatStore::new(db_pool.clone()),
        timesheets: store::timesheet::TimesheetStore::new(db_pool),
        model_client,
    });

    // Build the application with all routes and shared state
    let app = Router::new()
        .merge(handlers::auth::auth_routes())
        .merge(handlers::chat::chat_routes())
        .merge(handlers::upload::upload_routes())
        .route("/health", get(health_check))
        .layer(axum::middleware::from_fn(
            middleware::logging::request_logging_middleware,
        ))
        .layer(CorsLayer::permissive())
        .layer(Extension(shared_state));

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind listener");
    tracing::info!("listening on {}", listener.local_addr().unwrap());
    axum::serve(listener, app).await.unwrap();
}

async fn health_check() -> axum::response::Json<serde_json::Value> {
    axum::response::Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,timesheet_reviewer=trace,sqlx=info,reqwest=info,hyper=info".to_string()
        } else {
            "info,timesheet_reviewer=info,sqlx=warn,reqwest=warn,hyper=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    // JSON logging for aggregation, human-readable for development
    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Timesheet Reviewer starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Build mode: {}",
        if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        }
    );

    Ok(())
}
