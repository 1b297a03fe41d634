//! Web file contract: path rules, content types and HTTP status mapping
//! for the configuration files served next to the WebSocket endpoint.
//!
//! [`WebRoot`] implements GET/PUT/DELETE on a directory; the HTTP
//! transport only moves bytes and reports [`FileOutcome::status`].

use std::ffi::CStr;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use log::{info, warn};

/// Label of the FAT data partition holding the web files.
pub const WEB_PARTITION: &CStr = c"filesystem";
/// Served for `/`.
pub const DEFAULT_FILE: &str = "/index.html";
/// Longest accepted request path.
pub const MAX_PATH_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathError {
    /// Does not start with `/`.
    NotAbsolute,
    /// Contains a `..` segment.
    Traversal,
    TooLong,
}

/// Normalise a request URI to a file path: drop the query, map `/` to
/// [`DEFAULT_FILE`], reject anything that could leave the web root.
pub fn resolve(uri: &str) -> Result<&str, PathError> {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    if !path.starts_with('/') {
        return Err(PathError::NotAbsolute);
    }
    if path.len() > MAX_PATH_LEN {
        return Err(PathError::TooLong);
    }
    if path.split('/').any(|seg| seg == "..") {
        return Err(PathError::Traversal);
    }
    Ok(if path == "/" { DEFAULT_FILE } else { path })
}

pub fn content_type(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map_or("", |(_, e)| e);
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Result of a file operation, as the client sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Served,
    Created,
    Replaced,
    Deleted,
    NotFound,
    Busy,
    StorageFull,
    Failed,
}

impl FileOutcome {
    pub fn status(self) -> u16 {
        match self {
            Self::Served => 200,
            Self::Created => 201,
            Self::Replaced | Self::Deleted => 204,
            Self::NotFound => 404,
            Self::Failed => 500,
            Self::Busy => 503,
            Self::StorageFull => 507,
        }
    }
}

/// Files under one directory.
pub struct WebRoot {
    root: PathBuf,
}

impl WebRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn locate(&self, uri: &str) -> Option<PathBuf> {
        match resolve(uri) {
            Ok(path) => Some(self.root.join(path.trim_start_matches('/'))),
            Err(e) => {
                warn!("http: rejected path {:?}: {:?}", uri, e);
                None
            }
        }
    }

    /// Contents and content type of the file behind `uri`.
    pub fn get(&self, uri: &str) -> Result<(Vec<u8>, &'static str), FileOutcome> {
        let path = self.locate(uri).ok_or(FileOutcome::NotFound)?;
        match fs::read(&path) {
            Ok(body) => Ok((body, content_type(&path.to_string_lossy()))),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(FileOutcome::NotFound),
            Err(e) => {
                warn!("http: read {} failed: {}", path.display(), e);
                Err(FileOutcome::Failed)
            }
        }
    }

    /// Create or replace a file.  A failed write leaves no partial file.
    pub fn put(&self, uri: &str, body: &[u8]) -> FileOutcome {
        let Some(path) = self.locate(uri) else {
            return FileOutcome::NotFound;
        };
        let existed = path.is_file();
        let written = fs::File::create(&path).and_then(|mut f| {
            f.write_all(body)?;
            f.sync_all()
        });
        match written {
            Ok(()) => {
                info!("http: stored {} ({} bytes)", path.display(), body.len());
                if existed {
                    FileOutcome::Replaced
                } else {
                    FileOutcome::Created
                }
            }
            Err(e) => {
                warn!("http: write {} failed: {}", path.display(), e);
                let _ = fs::remove_file(&path);
                match e.kind() {
                    ErrorKind::NotFound => FileOutcome::NotFound,
                    ErrorKind::StorageFull => FileOutcome::StorageFull,
                    _ => FileOutcome::Failed,
                }
            }
        }
    }

    pub fn delete(&self, uri: &str) -> FileOutcome {
        let Some(path) = self.locate(uri) else {
            return FileOutcome::NotFound;
        };
        match fs::remove_file(&path) {
            Ok(()) => FileOutcome::Deleted,
            Err(e) if e.kind() == ErrorKind::NotFound => FileOutcome::NotFound,
            Err(e) => {
                warn!("http: delete {} failed: {}", path.display(), e);
                FileOutcome::Failed
            }
        }
    }
}
