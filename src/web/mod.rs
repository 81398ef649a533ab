//! HTTP surface: routing, shared state, and the server loop.

pub mod extract;
pub mod flash;
pub mod handlers;
pub mod pages;

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use chrono::Duration;
use std::sync::Arc;
use tokio::{net::TcpListener, signal::ctrl_c};
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::Database;
use crate::encyclopedia::{EncyclopediaCache, WikipediaSource};
use crate::error::AppError;
use crate::identity::PasswordHasher;
use crate::session::SessionKey;

pub use extract::CurrentUser;

pub const SESSION_COOKIE: &str = "naturelog_session";

/// Room for the non-file multipart fields on top of the image ceiling.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub struct AppState {
    pub db: Arc<Database>,
    pub sessions: SessionKey,
    pub hasher: PasswordHasher,
    pub encyclopedia: Arc<EncyclopediaCache>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn from_config(config: &Config, db: Arc<Database>) -> Self {
        let max_age = Duration::hours(i64::from(config.server.session_max_age_hours));
        let sessions = match &config.server.session_secret {
            Some(secret) => SessionKey::new(secret.as_bytes(), max_age),
            None => {
                warn!("No session secret configured, sessions will not survive a restart");
                SessionKey::generate(max_age)
            }
        };
        let source = Arc::new(WikipediaSource::from_config(&config.encyclopedia));

        Self {
            db,
            sessions,
            hasher: PasswordHasher::new(config.security.password_iterations),
            encyclopedia: Arc::new(EncyclopediaCache::new(
                source,
                Duration::days(config.encyclopedia.ttl_days),
            )),
            max_upload_bytes: config.server.max_upload_bytes,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.max_upload_bytes + FORM_OVERHEAD_BYTES;

    Router::new()
        .route("/", get(handlers::observations::home))
        .route(
            "/register",
            get(handlers::account::register_page).post(handlers::account::register),
        )
        .route(
            "/login",
            get(handlers::account::login_page).post(handlers::account::login),
        )
        .route("/logout", get(handlers::account::logout))
        .route(
            "/profile",
            get(handlers::account::profile_page).post(handlers::account::edit_profile),
        )
        .route(
            "/upload",
            get(handlers::observations::upload_page).post(handlers::observations::upload),
        )
        .route("/image/{id}", get(handlers::observations::image))
        .route(
            "/my_observations",
            get(handlers::observations::my_observations),
        )
        .route(
            "/observations/{id}/delete",
            post(handlers::observations::delete),
        )
        .route("/feed", get(handlers::explore::feed_page))
        .route("/api/observations", get(handlers::explore::observations_geojson))
        .route("/search", get(handlers::explore::search))
        .route("/encyclopedia/{species}", get(handlers::explore::encyclopedia))
        .route("/healthz", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the store, bind, and serve until Ctrl+C or SIGTERM.
pub async fn serve(config: Config) -> Result<()> {
    let db_path = config.database.db_path();
    let db = Database::open(&db_path)?;
    db.initialize().context("Failed to initialize database schema")?;
    info!("Database opened at {:?}", db_path);

    let state = Arc::new(AppState::from_config(&config, Arc::new(db)));
    let app = build_router(state);

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow!("Server error: {e}"))?;

    info!("Server shut down");
    Ok(())
}

/// Run blocking store or upstream work off the async workers.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Store(anyhow!("Blocking task failed: {e}")))?
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
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
}
