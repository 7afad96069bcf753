//! Static file serving from a public directory.

use std::path::{Component, Path, PathBuf};

use tracing::trace;

use crate::http::HttpResponse;

/// Serves files below a root directory.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    /// Serve files below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Respond with the file at `uri_path`, or `404 Not Found`.
    ///
    /// The file is streamed; it is closed once the response is written.
    pub async fn serve(&self, uri_path: &str) -> HttpResponse {
        let relative = sanitize(uri_path);
        let path = self.root.join(&relative);

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => return HttpResponse::not_found(&relative.to_string_lossy()),
        };
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(_) => return HttpResponse::not_found(&relative.to_string_lossy()),
        };

        HttpResponse::new(200)
            .with_header("content-type", mime_type(&path))
            .with_header("content-length", metadata.len().to_string())
            .with_reader(file)
            .on_release(move || trace!(path = %path.display(), "file released"))
    }
}

/// Resolve `uri_path` to a relative path that cannot leave the root.
///
/// `.` segments are dropped and `..` pops a segment, stopping at the root.
#[must_use]
pub fn sanitize(uri_path: &str) -> PathBuf {
    let mut segments: Vec<&str> = Vec::new();
    for segment in uri_path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    let mut path = PathBuf::new();
    for segment in segments {
        // Drive prefixes and the like never become part of the path.
        if matches!(Path::new(segment).components().next(), Some(Component::Normal(_))) {
            path.push(segment);
        }
    }
    path
}

/// Content type for a file extension.
#[must_use]
pub fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html" | "htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("svg") => "image/svg+xml",
        Some("txt") => "text/plain",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
