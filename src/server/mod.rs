//! Mock users API server
//!
//! Serves an [`InMemoryUserSource`] over both listing contracts so the cache
//! can be exercised against a real HTTP endpoint.
//!
//! ```text
//! GET   /api/users            {users, totalCount}   filter, sort, page
//! GET   /api/users/paginated  {data, total, page, size}
//! GET   /api/users/{id}       User | 404
//! PATCH /api/users/{id}       User | 404 | 400
//! GET   /health               {status, users}
//! ```

pub mod handlers;

use crate::config::{DeckConfig, GeneratorSettings};
use crate::core::user::User;
use crate::storage::{GeneratorTask, InMemoryUserSource};
use anyhow::{Context, Result};
use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::get;
use handlers::AppState;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Builder for the mock server
///
/// # Example
///
/// ```ignore
/// MockServerBuilder::new()
///     .with_generated(2_500_000)
///     .with_allowed_origins(["http://localhost:5173"])
///     .serve("127.0.0.1:6969")
///     .await?;
/// ```
pub struct MockServerBuilder {
    users: Vec<User>,
    generated: Option<usize>,
    generator: GeneratorSettings,
    allowed_origins: Vec<String>,
    latency: Option<Duration>,
}

impl MockServerBuilder {
    pub fn new() -> Self {
        Self {
            users: Vec::new(),
            generated: None,
            generator: GeneratorSettings::default(),
            allowed_origins: Vec::new(),
            latency: None,
        }
    }

    /// Builder for the `server` and `generator` sections of `config`
    pub fn from_config(config: &DeckConfig) -> Self {
        Self::new()
            .with_generated(config.server.record_count)
            .with_generator_settings(config.generator.clone())
            .with_allowed_origins(config.server.allowed_origins.clone())
    }

    /// Serve a fixed dataset
    pub fn with_users(mut self, users: Vec<User>) -> Self {
        self.users = users;
        self.generated = None;
        self
    }

    /// Serve `count` generated users
    pub fn with_generated(mut self, count: usize) -> Self {
        self.generated = Some(count);
        self
    }

    pub fn with_generator_settings(mut self, settings: GeneratorSettings) -> Self {
        self.generator = settings;
        self
    }

    /// Restrict CORS to these origins; none allows any origin
    pub fn with_allowed_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    /// Delay every response
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn source(self) -> Result<(InMemoryUserSource, Vec<String>)> {
        let mut source = match self.generated {
            Some(count) => {
                InMemoryUserSource::from_generator(GeneratorTask::spawn(count, &self.generator))
                    .await?
            }
            None => InMemoryUserSource::new(self.users),
        };
        if let Some(latency) = self.latency {
            source = source.with_latency(latency);
        }
        Ok((source, self.allowed_origins))
    }

    /// Build the router
    pub async fn build(self) -> Result<Router> {
        let (source, origins) = self.source().await?;
        tracing::info!(users = source.len(), "mock dataset ready");
        router(source, &origins)
    }

    /// Serve the application with graceful shutdown
    ///
    /// This will:
    /// - Bind to the provided address
    /// - Start serving requests
    /// - Handle SIGTERM and SIGINT (Ctrl+C) for graceful shutdown
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build().await?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("cannot bind {}", addr))?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for MockServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Router over `source`, with request tracing and CORS
pub fn router(source: InMemoryUserSource, allowed_origins: &[String]) -> Result<Router> {
    let state = AppState { users: source };

    Ok(Router::new()
        .route("/api/users", get(handlers::list_users))
        .route("/api/users/paginated", get(handlers::paginated_users))
        .route(
            "/api/users/{id}",
            get(handlers::get_user).patch(handlers::update_user),
        )
        .route("/health", get(handlers::health))
        .layer(cors_layer(allowed_origins)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins = allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .with_context(|| format!("invalid allowed origin '{}'", origin))
            })
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE]))
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
