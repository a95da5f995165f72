use crate::config::CorsConfig;
use crate::routes;
use crate::static_files;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the Axum application
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors);
    let max_upload = state.config.server.max_upload_bytes;

    Router::new()
        .route("/", get(routes::root))
        .route("/predict", post(routes::predict))
        .route("/health", get(routes::health))
        .route("/metrics", get(routes::metrics))
        .route("/ui", get(static_files::upload_page))
        .fallback(static_files::serve_static)
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Any origin, method and header with credentials, or an explicit origin list.
///
/// Credentials cannot be combined with a literal `*`, so the permissive
/// policy mirrors whatever the request asks for.
fn cors_layer(config: &CorsConfig) -> CorsLayer {
    if config.allow_any_origin {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(%origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Run the server until `shutdown` resolves
pub async fn run_server(
    state: AppState,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("NeuroScan listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
