//! Static file and SPA shell serving.

use std::path::{Path, PathBuf};

use axum::{
    body::Body,
    http::{header, Request, Uri},
    response::{IntoResponse, Response},
};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::http::response::AppError;

/// Serves files from a directory mounted under a path prefix.
#[derive(Debug, Clone)]
pub struct StaticMount {
    prefix: &'static str,
    dir: ServeDir,
}

impl StaticMount {
    pub fn new(prefix: &'static str, dir: impl AsRef<Path>) -> Self {
        Self {
            prefix,
            // Directory redirects would be built from the stripped path.
            dir: ServeDir::new(dir).append_index_html_on_directories(false),
        }
    }

    /// Serve the file for `request`. Missing files yield a 404 error body.
    pub async fn serve(&self, request: Request<Body>) -> Result<Response, AppError> {
        let (mut parts, body) = request.into_parts();
        parts.uri = strip_prefix(&parts.uri, self.prefix)?;
        let request = Request::from_parts(parts, body);

        let response = match self.dir.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        if response.status() == axum::http::StatusCode::NOT_FOUND {
            return Err(AppError::not_found("file not found"));
        }
        Ok(response.map(Body::new))
    }
}

/// Rewrite `/prefix/rest?q` to `/rest?q`.
fn strip_prefix(uri: &Uri, prefix: &str) -> Result<Uri, AppError> {
    let path = uri.path();
    let rest = path.strip_prefix(prefix.trim_end_matches('/')).unwrap_or(path);
    let rewritten = match uri.query() {
        Some(q) => format!("{}?{}", rest, q),
        None => rest.to_string(),
    };
    rewritten
        .parse()
        .map_err(|_| AppError::new("invalid request path").with_status(axum::http::StatusCode::BAD_REQUEST))
}

/// The SPA's HTML document, served for client-side routed paths.
#[derive(Debug, Clone)]
pub struct SpaShell {
    index: PathBuf,
}

impl SpaShell {
    pub fn new(ui_dir: impl AsRef<Path>) -> Self {
        Self {
            index: ui_dir.as_ref().join("index.html"),
        }
    }

    pub async fn serve(&self) -> Result<Response, AppError> {
        let html = tokio::fs::read(&self.index).await.map_err(|e| {
            tracing::warn!(path = %self.index.display(), error = %e, "SPA shell unavailable");
            AppError::from(e)
        })?;
        Ok(([(header::CONTENT_TYPE, "text/html")], html).into_response())
    }
}
