//! Nautilus Tenant API - Main Application Entry Point
//!
//! REST API server for the tenant-scoped surface of the Nautilus dive-shop
//! platform: API key management and the custom report builder.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: per-request API key with tenant-scoped permissions
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build HTTP router with routes and middleware
//! 5. Start server on configured port

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;

use tracing_subscriber::EnvFilter;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    // Tenant-scoped routes, gated by the API key authenticator
    let authenticated_routes = Router::new()
        // Key management
        .route("/api/v1/keys", post(handlers::api_keys::create_api_key))
        .route("/api/v1/keys", get(handlers::api_keys::list_api_keys))
        .route(
            "/api/v1/keys/{id}",
            delete(handlers::api_keys::revoke_api_key),
        )
        // Report builder
        .route("/api/v1/reports/tables", get(handlers::reports::list_tables))
        .route(
            "/api/v1/reports/tables/{table}/columns",
            get(handlers::reports::table_columns),
        )
        .route("/api/v1/reports", post(handlers::reports::create_report))
        .route("/api/v1/reports", get(handlers::reports::list_reports))
        .route("/api/v1/reports/{id}", get(handlers::reports::get_report))
        .route("/api/v1/reports/{id}", put(handlers::reports::update_report))
        .route(
            "/api/v1/reports/{id}",
            delete(handlers::reports::delete_report),
        )
        .route(
            "/api/v1/reports/{id}/run",
            post(handlers::reports::run_report),
        )
        .route(
            "/api/v1/reports/{id}/history",
            get(handlers::reports::execution_history),
        )
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            pool.clone(),
            middleware::auth::auth_middleware,
        ));

    // Combine authenticated routes with public routes
    let app = Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        // Merge authenticated routes
        .merge(authenticated_routes)
        // Add request tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        // Share database pool with all handlers via State extraction
        .with_state(pool);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Start serving HTTP requests
    axum::serve(listener, app).await?;

    Ok(())
}
