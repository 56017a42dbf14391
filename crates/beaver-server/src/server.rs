use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit, routing::get};
use beaver_auth::{AuthState, GitHubClient};
use beaver_auth_postgres::{PostgresAuthStorage, create_pool, migrations};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{config::AppConfig, handlers};

pub struct BeaverServer {
    addr: SocketAddr,
    app: Router,
}

/// Assembles the router: health check, auth routes, and the middleware stack.
pub fn build_app(cfg: &AppConfig, auth: AuthState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .merge(beaver_auth::http::router::<AuthState>())
        .with_state(auth)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &axum::http::Request<_>| {
                            tracing::info_span!(
                                "http.request",
                                http.method = %req.method(),
                                http.target = %req.uri().path(),
                                http.status_code = tracing::field::Empty,
                            )
                        })
                        .on_response(
                            |res: &axum::http::Response<_>,
                             latency: std::time::Duration,
                             span: &tracing::Span| {
                                span.record(
                                    "http.status_code",
                                    tracing::field::display(res.status().as_u16()),
                                );
                                tracing::info!(
                                    http.status = %res.status().as_u16(),
                                    elapsed_ms = %latency.as_millis(),
                                    "request handled"
                                );
                            },
                        ),
                )
                .layer(CorsLayer::permissive())
                .layer(CompressionLayer::new()),
        )
        .layer(DefaultBodyLimit::max(cfg.server.body_limit_bytes))
}

/// Wires the auth services against GitHub and PostgreSQL.
pub fn build_auth_state(cfg: &AppConfig, storage: &PostgresAuthStorage) -> anyhow::Result<AuthState> {
    let provider = Arc::new(GitHubClient::new(cfg.auth.github.clone())?);
    let state = AuthState::build(
        &cfg.auth,
        provider,
        Arc::new(storage.refresh_token_store()),
        Arc::new(storage.identity_store()),
    )?;
    Ok(state)
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Connects to the database, applies migrations, and builds the router.
    pub async fn build(self) -> anyhow::Result<BeaverServer> {
        let pool = create_pool(&self.config.database).await?;
        if self.config.database.run_migrations {
            migrations::run(&pool).await?;
        }

        let storage = PostgresAuthStorage::new(Arc::new(pool));
        let auth = build_auth_state(&self.config, &storage)?;
        let app = build_app(&self.config, auth);

        Ok(BeaverServer {
            addr: self.addr,
            app,
        })
    }
}

impl BeaverServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
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

    tracing::info!("shutdown signal received");
}
