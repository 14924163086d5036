//! HTTP surface: routes, shared state and the listening server.
//!
//! | Route                        | Handler                 |
//! |------------------------------|-------------------------|
//! | `GET /`                      | [`handlers::index`]     |
//! | `POST /upload`               | [`handlers::upload`]    |
//! | `GET /download/{filename}`   | [`handlers::download`]  |

pub mod handlers;
pub mod page;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::Request;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{debug_span, Level};

use crate::config::Config;
use crate::files::FileStore;

pub use handlers::ApiError;

/// State shared by all handlers. Immutable after startup.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: FileStore,
}

impl AppState {
    /// Build the handler state from a loaded configuration.
    pub fn new(config: Config) -> Self {
        let store = FileStore::from_config(&config.storage);
        Self {
            config: Arc::new(config),
            store,
        }
    }

    /// Whether a client-supplied password equals the shared password.
    pub fn password_matches(&self, supplied: Option<&str>) -> bool {
        supplied == Some(self.config.auth.password.as_str())
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route(
            "/upload",
            post(handlers::upload).layer(DefaultBodyLimit::disable()),
        )
        .route("/download/{filename}", get(handlers::download))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    debug_span!(
                        "request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .with_state(state)
}

/// A bound HTTP listener ready to serve the application.
pub struct HttpServer {
    listener: TcpListener,
    state: AppState,
}

impl HttpServer {
    /// Bind the listener described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bind address is invalid or the socket cannot be bound.
    pub async fn bind(config: Config) -> Result<Self, io::Error> {
        let addr = config
            .socket_addr()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let listener = TcpListener::bind(addr).await?;

        Ok(Self {
            listener,
            state: AppState::new(config),
        })
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, io::Error> {
        self.listener.local_addr()
    }

    /// Serve requests until `shutdown` resolves, then drain in-flight requests.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = router(self.state);
        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
