//! Static file serving.
//!
//! A [`FileServer`] serves files below one root directory. The dispatcher
//! keeps one per configured directory in a [`FileServers`] cache, created the
//! first time a route needs it.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderValue};
use http::request::Parts;
use http::{Method, StatusCode};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::ServeError;
use crate::mime;
use crate::response::{ResponseBody, full};

const INDEX_FILE: &str = "index.html";
const CACHE_CONTROL: &str = "public, max-age=3600";

/// Serves files from below `root`.
#[derive(Debug)]
pub struct FileServer {
    root: PathBuf,
}

impl FileServer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Serves `relative` (resolved against the root) with the given status
    /// and extra headers.
    pub async fn serve_file(
        &self,
        relative: impl AsRef<Path>,
        status: StatusCode,
        headers: HeaderMap,
        req: &Parts,
    ) -> Result<http::Response<ResponseBody>, ServeError> {
        let path = self.locate(relative.as_ref()).await?;
        self.respond(&path, status, headers, req).await
    }

    /// Serves the file the request path names.
    ///
    /// The whole request path is resolved against the root, so a directory
    /// route for `/assets/` over root `public` serves `public/assets/...`.
    /// Directories are answered with their `index.html`.
    pub async fn serve(&self, req: &Parts) -> Result<http::Response<ResponseBody>, ServeError> {
        let decoded = urlencoding::decode(req.uri.path()).map_err(|_| ServeError::not_found())?;
        let path = self.locate(Path::new(decoded.as_ref())).await?;
        self.respond(&path, StatusCode::OK, HeaderMap::new(), req).await
    }

    /// Maps `relative` onto a file below the root.
    async fn locate(&self, relative: &Path) -> Result<PathBuf, ServeError> {
        let mut path = self.root.clone();
        let mut depth = 0usize;
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    path.push(part);
                    depth += 1;
                }
                Component::ParentDir => {
                    if depth == 0 {
                        warn!(root = %self.root.display(), path = %relative.display(), "path escapes static root");
                        return Err(ServeError::forbidden());
                    }
                    path.pop();
                    depth -= 1;
                }
                Component::RootDir | Component::CurDir => {}
                Component::Prefix(_) => return Err(ServeError::forbidden()),
            }
        }

        let meta = fs::metadata(&path).await.map_err(ServeError::io)?;
        if meta.is_dir() {
            path.push(INDEX_FILE);
            let meta = fs::metadata(&path).await.map_err(ServeError::io)?;
            if !meta.is_file() {
                return Err(ServeError::not_found());
            }
        }
        Ok(path)
    }

    async fn respond(
        &self,
        path: &Path,
        status: StatusCode,
        mut headers: HeaderMap,
        req: &Parts,
    ) -> Result<http::Response<ResponseBody>, ServeError> {
        let content = fs::read(path).await.map_err(ServeError::io)?;
        debug!(file = %path.display(), bytes = content.len(), "serving static file");

        headers.entry(header::CONTENT_TYPE)
            .or_insert(HeaderValue::from_static(mime::content_type(path)));
        headers.entry(header::CACHE_CONTROL)
            .or_insert(HeaderValue::from_static(CACHE_CONTROL));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content.len()));

        let body = if req.method == Method::HEAD {
            full(Bytes::new())
        } else {
            full(Bytes::from(content))
        };
        let mut response = http::Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

// ── FileServers ───────────────────────────────────────────────────────────────

/// Directory → [`FileServer`], populated on first use and never evicted.
///
/// The set of directories is fixed by the route table, so the map stays
/// bounded. Construction happens under the lock: concurrent first requests
/// for the same directory share one instance.
#[derive(Debug, Default)]
pub struct FileServers {
    servers: Mutex<HashMap<PathBuf, Arc<FileServer>>>,
}

impl FileServers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, dir: &Path) -> Arc<FileServer> {
        let mut servers = self.servers.lock().unwrap_or_else(PoisonError::into_inner);
        let server = servers.entry(dir.to_path_buf()).or_insert_with(|| {
            debug!(dir = %dir.display(), "creating file server");
            Arc::new(FileServer::new(dir))
        });
        Arc::clone(server)
    }

    pub fn len(&self) -> usize {
        self.servers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
