//! On-disk cache of fetched page text, one JSON file per source.
//!
//! Layout under the cache root:
//! - `documents/<slug>-<sha12>.json` — a [`CachedDocument`]; the slug keeps files readable and
//!   the name digest keeps distinct source names from colliding after slugging.
//!
//! Writes go through a temp file and rename so a reader never sees a half-written document.
//! Re-fetching a source overwrites its file; there is no versioning.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::domain::CachedDocument;
use crate::error::{codes, AppError};

#[derive(Debug, Clone)]
pub struct DocumentCache {
    root: PathBuf,
}

impl DocumentCache {
    pub fn open(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    fn documents_dir(&self) -> PathBuf {
        self.root.join("documents")
    }

    pub fn ensure_dirs(&self) -> Result<(), AppError> {
        fs::create_dir_all(self.documents_dir()).map_err(|e| {
            AppError::new(codes::CACHE_WRITE_FAILED, "Failed to create cache directory")
                .with_details(format!("path={}; err={}", self.documents_dir().display(), e))
        })
    }

    /// File that holds the cached text for `source_name`.
    pub fn path_for(&self, source_name: &str) -> PathBuf {
        self.documents_dir().join(cache_file_name(source_name))
    }

    pub fn put(&self, doc: &CachedDocument) -> Result<PathBuf, AppError> {
        self.ensure_dirs()?;
        let path = self.path_for(&doc.source_name);
        write_json_atomic(&path, doc, codes::CACHE_WRITE_FAILED)?;
        debug!(source = %doc.source_name, path = %path.display(), bytes = doc.raw_text.len(), "cached document");
        Ok(path)
    }

    /// Strict read: a missing or corrupt file is an error.
    pub fn get(&self, source_name: &str) -> Result<CachedDocument, AppError> {
        let path = self.path_for(source_name);
        let raw = fs::read_to_string(&path).map_err(|e| {
            AppError::new(codes::CACHE_READ_FAILED, "Cached document not found")
                .with_details(format!("source={source_name}; path={}; err={e}", path.display()))
        })?;
        let doc: CachedDocument = serde_json::from_str(&raw).map_err(|e| {
            AppError::new(codes::CACHE_READ_FAILED, "Failed to decode cached document")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        if doc.source_name != source_name {
            return Err(AppError::new(
                codes::CACHE_READ_FAILED,
                "Cached document belongs to a different source",
            )
            .with_details(format!(
                "expected={source_name}; found={}",
                doc.source_name
            )));
        }
        Ok(doc)
    }

    /// Lenient read used by retrieval: anything unreadable counts as "not cached".
    pub fn load(&self, source_name: &str) -> Option<CachedDocument> {
        if !self.path_for(source_name).exists() {
            debug!(source = %source_name, "no cached document");
            return None;
        }
        match self.get(source_name) {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!(source = %source_name, error = %e, "ignoring unreadable cached document");
                None
            }
        }
    }
}

fn cache_file_name(source_name: &str) -> String {
    let digest = hex::encode(Sha256::digest(source_name.as_bytes()));
    let mut slug: String = source_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    while slug.contains("--") {
        slug = slug.replace("--", "-");
    }
    let slug = slug.trim_matches('-');
    let slug: String = slug.chars().take(48).collect();
    if slug.is_empty() {
        format!("{}.json", &digest[..12])
    } else {
        format!("{slug}-{}.json", &digest[..12])
    }
}

/// Serialize `value` as pretty JSON and move it into place at `path`.
pub fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    code: &str,
) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        AppError::new(code, "Failed to encode JSON").with_details(e.to_string())
    })?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json.as_bytes()).map_err(|e| {
        AppError::new(code, "Failed to write file")
            .with_details(format!("path={}; err={}", tmp.display(), e))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        AppError::new(code, "Failed to finalize file write")
            .with_details(format!("tmp={}; dest={}; err={}", tmp.display(), path.display(), e))
    })?;
    Ok(())
}
