//! Prep step: download each configured page, reduce it to plain text, cache it.
//!
//! A failing source never aborts the run. Its outcome is recorded and the next source is
//! attempted; only a cache directory that cannot be created is fatal.

use std::time::Duration;

use rai_core::cache::DocumentCache;
use rai_core::domain::{CachedDocument, Source};
use rai_core::error::{codes, AppError};
use rai_core::html::html_to_text;
use rai_core::timestamp::now_rfc3339_utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("raidemo/", env!("CARGO_PKG_VERSION"));

pub trait PageFetcher {
    /// Return the response body of `url`.
    fn fetch(&self, url: &str) -> Result<String, AppError>;
}

#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    timeout: Duration,
}

impl HttpPageFetcher {
    pub fn new() -> Self {
        Self {
            timeout: FETCH_TIMEOUT,
        }
    }
}

impl Default for HttpPageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PageFetcher for HttpPageFetcher {
    fn fetch(&self, url: &str) -> Result<String, AppError> {
        let resp = ureq::get(url)
            .set("User-Agent", USER_AGENT)
            .timeout(self.timeout)
            .call();
        match resp {
            Ok(r) => r.into_string().map_err(|e| {
                AppError::new(codes::FETCH_FAILED, "Failed to read page body")
                    .with_details(format!("url={url}; err={e}"))
            }),
            Err(ureq::Error::Status(status, _)) => Err(status_error(url, status)),
            Err(e) => Err(AppError::new(codes::FETCH_FAILED, "Failed to reach page")
                .with_details(format!("url={url}; err={e}"))),
        }
    }
}

fn status_error(url: &str, status: u16) -> AppError {
    let (code, message) = match status {
        401 | 403 => (codes::FETCH_DENIED, "Page requires authorization"),
        _ => (codes::FETCH_FAILED, "Page request failed"),
    };
    AppError::new(code, message).with_details(format!("url={url}; status={status}"))
}

/// Fetch one source and convert it to a cache record. Nothing is written.
pub fn fetch_document(source: &Source, fetcher: &dyn PageFetcher) -> Result<CachedDocument, AppError> {
    let body = fetcher.fetch(&source.url)?;
    let raw_text = html_to_text(&body);
    if raw_text.is_empty() {
        warn!(source = %source.name, url = %source.url, "page contained no text");
    }
    Ok(CachedDocument {
        source_name: source.name.clone(),
        url: source.url.clone(),
        raw_text,
        fetched_at: now_rfc3339_utc()?,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PrepStatus {
    Cached { path: String, chars: usize },
    Failed { code: String, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourcePrepOutcome {
    pub source_name: String,
    pub url: String,
    #[serde(flatten)]
    pub status: PrepStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrepReport {
    /// Same order as the configured sources.
    pub outcomes: Vec<SourcePrepOutcome>,
}

impl PrepReport {
    pub fn cached_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, PrepStatus::Cached { .. }))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SourcePrepOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, PrepStatus::Failed { .. }))
    }
}

pub fn prep_sources(
    sources: &[Source],
    fetcher: &dyn PageFetcher,
    cache: &DocumentCache,
) -> Result<PrepReport, AppError> {
    cache.ensure_dirs()?;

    let mut report = PrepReport::default();
    for source in sources {
        let result = fetch_document(source, fetcher).and_then(|doc| {
            let chars = doc.raw_text.chars().count();
            cache.put(&doc).map(|path| (path, chars))
        });
        let status = match result {
            Ok((path, chars)) => {
                info!(source = %source.name, chars, path = %path.display(), "cached source");
                PrepStatus::Cached {
                    path: path.display().to_string(),
                    chars,
                }
            }
            Err(e) => {
                warn!(source = %source.name, url = %source.url, error = %e, "skipping source");
                PrepStatus::Failed {
                    code: e.code,
                    message: e.message,
                }
            }
        };
        report.outcomes.push(SourcePrepOutcome {
            source_name: source.name.clone(),
            url: source.url.clone(),
            status,
        });
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denied_pages_are_distinguished_from_other_failures() {
        let url = "https://intranet.example/page";
        for status in [401, 403] {
            assert_eq!(status_error(url, status).code, codes::FETCH_DENIED);
        }
        for status in [404, 500] {
            let err = status_error(url, status);
            assert_eq!(err.code, codes::FETCH_FAILED);
            assert_eq!(
                err.details.as_deref(),
                Some(format!("url={url}; status={status}").as_str())
            );
        }
    }
}
