//! ISIS administration backend
//!
//! REST backend for student enrollment, teaching hours, RSE and ARION activities,
//! vacataires and special-category lists, with SQLite persistence and JWT sessions.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod ingest;
mod models;
mod stats;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api::records;
use auth::JwtKeys;
use config::{Config, LogFormat};
use db::Repository;
use errors::AppError;
use models::{
    ApprovalStatus, ArionSession, NewUser, Role, RseActivity, SpecialCategoryRecord, Student,
    TeachingUnitRecord, Vacataire,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub jwt: Arc<JwtKeys>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let (json_layer, pretty_layer) = match config.log_format {
        LogFormat::Json => (Some(fmt::layer().json()), None),
        LogFormat::Pretty => (None, Some(fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .init();

    tracing::info!("Starting ISIS administration backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    let secret = match &config.jwt_secret {
        Some(secret) => secret.clone(),
        None => {
            tracing::warn!(
                "No JWT secret configured (ISIS_JWT_SECRET). Tokens will not survive a restart!"
            );
            auth::random_secret()
        }
    };
    let jwt = Arc::new(JwtKeys::new(&secret, config.jwt_expiry_hours));

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    bootstrap_admin(&repo, &config).await?;

    let state = AppState {
        repo,
        jwt,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Create the configured admin account unless an admin already exists.
async fn bootstrap_admin(repo: &Repository, config: &Config) -> Result<(), AppError> {
    let Some(admin) = &config.admin_bootstrap else {
        return Ok(());
    };
    if repo.admin_exists().await? {
        tracing::debug!("Admin account present, skipping bootstrap");
        return Ok(());
    }

    let user = repo
        .create_user(&NewUser {
            username: admin.username.clone(),
            email: admin.email.clone(),
            password_hash: auth::hash_password(&admin.password, config.password_rounds),
            role: Role::Admin,
            approval_status: ApprovalStatus::Approved,
            is_active: true,
        })
        .await?;
    tracing::info!("Created admin account '{}'", user.username);
    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let keys = state.jwt.clone();

    // Bearer-protected routes
    let protected_routes = Router::new()
        // Session
        .route("/check-auth", get(api::auth::check_auth))
        .route("/logout", post(api::auth::logout))
        .route("/me", get(api::auth::me))
        // User management
        .route("/users", get(api::users::list_users))
        .route("/users/{id}/approval", post(api::users::set_approval))
        // Teaching hours
        .route(
            "/teaching-hours",
            get(records::list::<TeachingUnitRecord>)
                .post(api::teaching::create)
                .delete(api::teaching::delete_scope),
        )
        .route("/teaching-hours/upload", post(api::teaching::upload))
        .route("/teaching-hours/stats", get(api::teaching::stats))
        .route("/teaching-hours/graph-data", get(api::teaching::graph))
        .route(
            "/teaching-hours/academic-years",
            get(api::teaching::academic_years),
        )
        .route("/teaching-hours/levels", get(api::teaching::levels))
        .route("/teaching-hours/instructors", get(api::teaching::instructors))
        .route(
            "/teaching-hours/{id}",
            get(records::get::<TeachingUnitRecord>)
                .put(records::update::<TeachingUnitRecord>)
                .delete(records::delete::<TeachingUnitRecord>),
        )
        // Students
        .route(
            "/students",
            get(records::list::<Student>).post(records::create::<Student>),
        )
        .route("/students/upload", post(api::students::upload))
        .route("/students/import", post(records::import::<Student>))
        .route("/students/stats", get(api::students::stats))
        .route("/students/charts/{chart}", get(api::students::chart))
        .route("/students/years", get(api::students::years))
        .route("/students/levels", get(api::students::levels))
        .route(
            "/students/{id}",
            get(records::get::<Student>)
                .put(records::update::<Student>)
                .delete(records::delete::<Student>),
        )
        // RSE
        .route(
            "/rse",
            get(records::list::<RseActivity>).post(records::create::<RseActivity>),
        )
        .route("/rse/upload", post(api::rse::upload))
        .route("/rse/import", post(records::import::<RseActivity>))
        .route("/rse/stats", get(api::rse::stats))
        .route("/rse/charts/{chart}", get(api::rse::chart))
        .route(
            "/rse/{id}",
            get(records::get::<RseActivity>)
                .put(records::update::<RseActivity>)
                .delete(records::delete::<RseActivity>),
        )
        // ARION
        .route(
            "/arion",
            get(records::list::<ArionSession>).post(records::create::<ArionSession>),
        )
        .route("/arion/upload", post(api::arion::upload))
        .route("/arion/stats", get(api::arion::stats))
        .route("/arion/status-stats", get(api::arion::status_stats))
        .route("/arion/monthly", get(api::arion::monthly))
        .route(
            "/arion/{id}",
            get(records::get::<ArionSession>)
                .put(records::update::<ArionSession>)
                .delete(records::delete::<ArionSession>),
        )
        // Vacataires
        .route(
            "/vacataires",
            get(records::list::<Vacataire>).post(records::create::<Vacataire>),
        )
        .route("/vacataires/upload", post(api::vacataires::upload))
        .route("/vacataires/stats", get(api::vacataires::stats))
        .route(
            "/vacataires/{id}",
            get(records::get::<Vacataire>)
                .put(records::update::<Vacataire>)
                .delete(records::delete::<Vacataire>),
        )
        // Special categories
        .route(
            "/special-categories",
            get(records::list::<SpecialCategoryRecord>),
        )
        .route("/special-categories/upload", post(api::special::upload))
        .route(
            "/special-categories/{id}",
            delete(records::delete::<SpecialCategoryRecord>),
        )
        // Apply JWT auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::jwt_auth_layer(keys.clone(), req, next)
        }));

    // Registration and login (no auth required)
    let public_routes = Router::new()
        .route("/register", post(api::auth::register))
        .route("/login", post(api::auth::login));

    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .nest("/api", protected_routes.merge(public_routes))
        .route("/health", get(health_check))
        .route("/", get(service_status))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

async fn service_status() -> Json<Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}

#[cfg(test)]
mod tests;
