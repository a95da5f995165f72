use axum::{
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
};
use rust_embed::Embed;

#[derive(Embed)]
#[folder = "web"]
struct WebAssets;

const UPLOAD_PAGE: &str = "index.html";

/// Browser upload page
pub async fn upload_page() -> Response {
    match <WebAssets as Embed>::get(UPLOAD_PAGE) {
        Some(content) => Html(String::from_utf8_lossy(&content.data).into_owned()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Serve embedded assets by path; anything else is a 404
pub async fn serve_static(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    match <WebAssets as Embed>::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.as_ref())],
                content.data.into_owned(),
            )
                .into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
