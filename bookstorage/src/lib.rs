//! # bookstorage: request authentication and error presentation for BookStorage
//!
//! BookStorage is a self-hostable reading tracker. This crate is its HTTP core: who is calling,
//! whether they may reach a route, and what the client sees when something goes wrong.
//!
//! ## Request Flow
//!
//! Every request passes through the same stack, outermost first:
//!
//! 1. `TraceLayer` opens a span for the request.
//! 2. [`intercept::intercept_errors`] buffers whatever the rest of the stack produces. Responses
//!    with status 401, 403, 404, 405 or 500, and handler panics, are replaced by a uniform error:
//!    `{"error": "<kind>"}` under the API prefix (`/api/` by default), an HTML page elsewhere.
//! 3. For guarded routes, [`auth::middleware::require_authenticated`] or
//!    [`auth::middleware::require_admin`] decides whether the handler runs at all.
//! 4. The handler.
//!
//! A session is the `user_id` cookie holding the account id (see [`auth`] for the trust model).
//! Admin checks read the privilege flags through an [`auth::directory::UserDirectory`], backed in
//! production by SQLite via [`sqlx`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use bookstorage::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = bookstorage::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     bookstorage::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod intercept;
pub mod telemetry;
pub mod templates;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, middleware::from_fn_with_state, routing::get};
use bon::Builder;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, instrument, warn};

use crate::{
    api::handlers::{accounts, auth as auth_handlers, pages},
    auth::{
        directory::{SqliteUserDirectory, UserDirectory},
        middleware::{admin_only, authenticated},
    },
    db::{errors::DbError, handlers::Users, models::users::UserCreateDBRequest},
    intercept::intercept_errors,
    templates::Templates,
};

pub use config::Config;
pub use types::UserId;

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .directory(Arc::new(SqliteUserDirectory::new(pool)))
///     .templates(Templates::load()?.with_login_path(&config.auth.login_path))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub directory: Arc<dyn UserDirectory>,
    pub templates: Templates,
}

/// Get the bookstorage database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the super administrator if no account holds that role yet.
///
/// The password is stored exactly as configured, so it may be plaintext or a pre-computed
/// `pbkdf2:sha256` hash. Without a configured password nothing is created. Returns the id of the
/// new account, or `None` when nothing was created.
#[instrument(skip_all, fields(username = %config.superadmin_username))]
pub async fn create_initial_superadmin(config: &Config, db: &SqlitePool) -> Result<Option<UserId>, DbError> {
    let mut tx = db.begin().await?;
    let mut user_repo = Users::new(&mut tx);

    if user_repo.superadmin_exists().await? {
        return Ok(None);
    }

    let Some(password) = config.superadmin_password.as_deref() else {
        warn!("No super administrator exists and superadmin_password is not set; skipping creation");
        return Ok(None);
    };

    let id = user_repo
        .create(&UserCreateDBRequest {
            username: config.superadmin_username.clone(),
            password: password.to_string(),
            validated: true,
            is_admin: true,
            is_superadmin: true,
        })
        .await?;

    tx.commit().await?;
    info!(user_id = id, "Created super administrator");
    Ok(Some(id))
}

fn optional_duration(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Open the pool, run migrations and make sure a super administrator exists
pub async fn setup_database(config: &Config) -> anyhow::Result<SqlitePool> {
    let settings = &config.database.pool;
    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .idle_timeout(optional_duration(settings.idle_timeout_secs))
        .max_lifetime(optional_duration(settings.max_lifetime_secs))
        .connect(&config.database.url)
        .await?;

    migrator().run(&pool).await?;
    create_initial_superadmin(config, &pool).await?;
    Ok(pool)
}

/// Build the application router.
///
/// | route                       | guard         |
/// |-----------------------------|---------------|
/// | `GET /`                     | none          |
/// | `GET, POST /login`          | none          |
/// | `GET, POST /logout`         | none          |
/// | `GET /dashboard`            | authenticated |
/// | `GET /api/session`          | authenticated |
/// | `GET /admin/accounts`       | admin         |
/// | `GET /api/admin/accounts/{id}` | admin      |
///
/// Everything, including the 404 fallback, sits inside the error interceptor.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(pages::home))
        .route("/login", get(auth_handlers::login_page).post(auth_handlers::login))
        .route("/logout", get(auth_handlers::logout).post(auth_handlers::logout));

    let session_routes = authenticated(
        Router::new()
            .route("/dashboard", get(pages::dashboard))
            .route("/api/session", get(accounts::get_session)),
        &state,
    );

    let admin_routes = admin_only(
        Router::new()
            .route("/admin/accounts", get(pages::admin_accounts))
            .route("/api/admin/accounts/{id}", get(accounts::get_account_flags)),
        &state,
    );

    Router::new()
        .merge(public_routes)
        .merge(session_routes)
        .merge(admin_routes)
        .fallback(templates::not_found)
        .layer(from_fn_with_state(state.clone(), intercept_errors))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// The assembled server.
///
/// [`Application::new`] opens the database, runs migrations, creates the super administrator and
/// builds the router; [`Application::serve`] binds and runs until the shutdown future resolves.
pub struct Application {
    router: Router,
    config: Config,
    pool: SqlitePool,
}

impl Application {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pool = setup_database(&config).await?;

        let app_state = AppState::builder()
            .config(config.clone())
            .directory(Arc::new(SqliteUserDirectory::new(pool.clone())))
            .templates(Templates::load()?.with_login_path(&config.auth.login_path))
            .build();
        let router = build_router(app_state);

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> (axum_test::TestServer, SqlitePool) {
        let server = axum_test::TestServer::new(self.router).expect("Failed to create test server");
        (server, self.pool)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("BookStorage listening on http://{}", bind_addr);

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
