//! HTTP surface.
//!
//! Every tool gets `POST <prefix>` (and `<prefix>/`) for conversions and
//! `GET <prefix>/file/:file_name` for downloads. Outputs are also served
//! statically under `/downloads/<tool>/<file>`.

pub mod form;
pub mod handlers;
pub mod response;

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::config::{Config, ServerConfig, Tool};
use crate::convert::ConverterRegistry;
use crate::error::Result;
use crate::fs::Storage;

pub use response::{BatchItem, BatchResponse, ConversionResponse, ErrorBody};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    pub download_base: Arc<Url>,
    pub converters: Arc<ConverterRegistry>,
    pub title: Arc<str>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        storage: Storage,
        download_base: Url,
        converters: ConverterRegistry,
        title: &str,
    ) -> Self {
        Self {
            storage: Arc::new(storage),
            download_base: Arc::new(download_base),
            converters: Arc::new(converters),
            title: Arc::from(title),
            started_at: Utc::now(),
        }
    }

    /// State with the production converters.
    pub fn from_config(config: &Config) -> Result<Self> {
        let storage = Storage::from_config(&config.storage);
        let converters = ConverterRegistry::standard(config, &storage);
        Ok(Self::new(
            storage,
            config.download_base()?,
            converters,
            &config.server.title,
        ))
    }
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    let headers = [header::CONTENT_TYPE, header::AUTHORIZATION];

    if config.cors_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(headers);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(true)
}

/// Routes for one tool.
fn tool_routes(router: Router<AppState>, tool: Tool) -> Router<AppState> {
    let convert = post(
        move |State(state): State<AppState>,
              multipart: std::result::Result<Multipart, MultipartRejection>| {
            handlers::convert(state, tool, multipart)
        },
    );
    let download = get(
        move |State(state): State<AppState>, Path(file_name): Path<String>| {
            handlers::download_file(state, tool, file_name)
        },
    );

    let prefix = tool.route();
    router
        .route(prefix, convert.clone())
        .route(&format!("{}/", prefix), convert)
        .route(&format!("{}/file/:file_name", prefix), download)
}

/// Build the application router.
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let outputs = ServeDir::new(state.storage.outputs_root());

    let router = Router::new()
        .route("/api/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/pdf-compress/batch", post(handlers::compress_batch))
        .route("/text-to-speech/languages", get(handlers::languages));

    Tool::ALL
        .into_iter()
        .fold(router, tool_routes)
        .nest_service("/downloads", outputs)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config))
        .with_state(state)
}

/// Bind and serve until Ctrl+C or SIGTERM.
pub async fn serve(config: &Config, state: AppState) -> Result<()> {
    let router = create_router(state, &config.server);
    let addr = config.bind_address();

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "could not listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}
