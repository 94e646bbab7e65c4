//! Dashboard assets
//!
//! Anything the router does not match is looked up under the static
//! directory. Unknown paths get `index.html` so client-side routes resolve.

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::{AppState, Error};

pub async fn serve(State(state): State<AppState>, uri: Uri) -> Response {
    let path = uri.path();
    if path.starts_with("/api/") {
        return Error::NotFound.into_response();
    }

    if let Some(file) = resolve(&state.static_dir, path) {
        if let Some(response) = read_file(&file).await {
            return response;
        }
    }

    match read_file(&state.static_dir.join("index.html")).await {
        Some(response) => response,
        None => Error::NotFound.into_response(),
    }
}

/// Map a request path onto the static directory, refusing anything that
/// would climb out of it
fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = Path::new(request_path.trim_start_matches('/'));
    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => resolved.push(segment),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (resolved != root).then_some(resolved)
}

async fn read_file(path: &Path) -> Option<Response> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    if !metadata.is_file() {
        return None;
    }
    let body = tokio::fs::read(path).await.ok()?;
    debug!(path = %path.display(), bytes = body.len(), "Serving static file");
    Some((StatusCode::OK, [(header::CONTENT_TYPE, content_type(path))], body).into_response())
}

fn content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
