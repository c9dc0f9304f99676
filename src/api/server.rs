use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::extract::{MatchedPath, Request};
use axum::middleware::{Next, from_fn};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use http::{Method, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::api::handler::*;
use crate::state::AppState;
use crate::store::{ConfigError, StoreError};

pub type JsonResult<T> = core::result::Result<Json<T>, RouteError>;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
        .allow_origin(Any);

    let api_routes = Router::new()
        .route("/config", get(get_config).post(update_config))
        .route("/webhooks", get(list_webhooks).post(add_webhook))
        .route("/webhooks/{index}", put(update_webhook).delete(delete_webhook))
        .route("/check-now", post(check_now))
        .route("/test-webhook", post(test_webhook))
        .route("/status", get(get_status))
        .route("/clear-codes", post(clear_codes));

    Router::new()
        .nest("/api", api_routes)
        .route(
            "/",
            get(|| async { "hoyo code notifier: control surface lives under /api" }),
        )
        .route("/checkhealth", get(|| async { "SERVER_OK" }))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method();
                let uri = req.uri();

                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|matched| matched.as_str());

                tracing::debug_span!("api_request", ?method, ?uri, ?matched_path)
            }),
        )
        .layer(from_fn(log_route_errors))
        .layer(cors)
        .with_state(state)
}

/// Logs `RouteError`s stashed in response extensions by `IntoResponse`
#[instrument(skip(request, next), fields(uri = request.uri().to_string()))]
async fn log_route_errors(request: Request, next: Next) -> Response {
    let res = next.run(request).await;
    if let Some(err) = res.extensions().get::<Arc<RouteError>>() {
        if res.status().is_server_error() {
            tracing::error!(error = %err, "error occurred inside route handler");
        } else {
            tracing::warn!(error = %err, "rejected request");
        }
    }

    res
}

/// Binds the control surface and serves until `cancel` fires
#[instrument(skip(state, cancel))]
pub async fn start_server(
    state: Arc<AppState>,
    port: u16,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let socket_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), port);
    let listener = tokio::net::TcpListener::bind(socket_addr).await?;

    tracing::info!(
        server_url = &format!("http://127.0.0.1:{}", port),
        "server ready"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ConfigError> for RouteError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::DuplicateUrl(_) => RouteError::Conflict(err.to_string()),
            ConfigError::NotFound(_) => RouteError::NotFound(err.to_string()),
            ConfigError::EmptyUrl | ConfigError::InvalidWebhooks(_) => {
                RouteError::InvalidInput(err.to_string())
            }
        }
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            success: bool,
            message: String,
        }

        let status = match &self {
            RouteError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RouteError::NotFound(_) => StatusCode::NOT_FOUND,
            RouteError::Conflict(_) => StatusCode::CONFLICT,
            RouteError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            RouteError::Store(err) => format!("failed to save: {err}"),
            other => other.to_string(),
        };

        let mut response = (
            status,
            Json(ErrorResponse {
                success: false,
                message,
            }),
        )
            .into_response();
        response.extensions_mut().insert(Arc::new(self));

        response
    }
}
