//! Process configuration.
//!
//! Everything the pipeline needs from the environment is resolved once into an immutable
//! [`AppConfig`] and passed down by reference. Inference and evaluation settings are kept
//! in separate structs because they address separate resources with separate credentials.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::Source;
use crate::error::{codes, AppError};

pub const DEFAULT_SOURCES_FILENAME: &str = "sources.json";
pub const DEFAULT_DATA_CACHE_PATH: &str = "./data_cache";
pub const DEFAULT_LOG_LEVEL: &str = "INFO";
pub const DEFAULT_SCENARIOS_PATH: &str = "evaluation/scenarios/default_scenarios.jsonl";
pub const DEFAULT_REPORTS_DIR: &str = "evaluation/reports";
pub const CONFIG_SOURCES_URL_ENV: &str = "CONFIG_SOURCES_URL";

pub const DEFAULT_CHUNK_SIZE_WORDS: usize = 300;
pub const DEFAULT_CHUNK_OVERLAP_WORDS: usize = 50;
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceConfig {
    pub endpoint: String,
    pub deployment_name: String,
    pub api_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationConfig {
    pub endpoint: String,
    /// Judge deployment for groundedness scoring.
    pub deployment_name: String,
    pub api_version: String,
    pub project_name: String,
    pub resource_group: String,
    pub subscription_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalSettings {
    pub chunk_size_words: usize,
    pub chunk_overlap_words: usize,
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            chunk_size_words: DEFAULT_CHUNK_SIZE_WORDS,
            chunk_overlap_words: DEFAULT_CHUNK_OVERLAP_WORDS,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl RetrievalSettings {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.chunk_size_words == 0 {
            return Err(AppError::new(
                codes::CONFIG_INVALID,
                "Chunk size must be at least one word",
            ));
        }
        if self.chunk_overlap_words >= self.chunk_size_words {
            return Err(AppError::new(
                codes::CONFIG_INVALID,
                "Chunk overlap must be smaller than chunk size",
            )
            .with_details(format!(
                "size={}; overlap={}",
                self.chunk_size_words, self.chunk_overlap_words
            )));
        }
        if self.top_k == 0 {
            return Err(AppError::new(codes::CONFIG_INVALID, "top_k must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub inference: InferenceConfig,
    pub evaluation: EvaluationConfig,
    pub sources: Vec<Source>,
    pub data_cache_path: PathBuf,
    pub log_level: String,
    pub scenarios_path: PathBuf,
    pub reports_dir: PathBuf,
    pub retrieval: RetrievalSettings,
}

impl AppConfig {
    /// Load from the process environment. Relative paths resolve against `base_dir`.
    pub fn from_env(base_dir: &Path) -> Result<Self, AppError> {
        Self::from_lookup(base_dir, |key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Blank values count as missing.
    pub fn from_lookup<F>(base_dir: &Path, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &str| {
            get(key).ok_or_else(|| {
                AppError::new(
                    codes::CONFIG_MISSING_ENV,
                    format!("Missing required environment variable: {key}"),
                )
            })
        };

        let inference = InferenceConfig {
            endpoint: require("AZURE_OPENAI_ENDPOINT")?,
            deployment_name: require("AZURE_OPENAI_CHAT_DEPLOYMENT_NAME")?,
            api_version: require("AZURE_OPENAI_API_VERSION")?,
        };

        // The judge deployment defaults to the chat deployment name and API version; the values
        // are copied, the evaluation scope never reads inference settings at runtime.
        let evaluation = EvaluationConfig {
            endpoint: require("EVAL_OPENAI_ENDPOINT")?,
            deployment_name: get("EVAL_OPENAI_DEPLOYMENT_NAME")
                .unwrap_or_else(|| inference.deployment_name.clone()),
            api_version: get("EVAL_OPENAI_API_VERSION")
                .unwrap_or_else(|| inference.api_version.clone()),
            project_name: require("EVAL_AZURE_AI_PROJECT_NAME")?,
            resource_group: require("EVAL_AZURE_RESOURCE_GROUP")?,
            subscription_id: require("EVAL_AZURE_SUBSCRIPTION_ID")?,
        };

        let sources = match get(CONFIG_SOURCES_URL_ENV) {
            Some(raw) => sources_from_override(&raw)?,
            None => load_sources_file(&base_dir.join("config").join(DEFAULT_SOURCES_FILENAME))?,
        };

        let retrieval = RetrievalSettings {
            chunk_size_words: parse_usize("CHUNK_SIZE_WORDS", get("CHUNK_SIZE_WORDS"))?
                .unwrap_or(DEFAULT_CHUNK_SIZE_WORDS),
            chunk_overlap_words: parse_usize("CHUNK_OVERLAP_WORDS", get("CHUNK_OVERLAP_WORDS"))?
                .unwrap_or(DEFAULT_CHUNK_OVERLAP_WORDS),
            top_k: parse_usize("RETRIEVAL_TOP_K", get("RETRIEVAL_TOP_K"))?.unwrap_or(DEFAULT_TOP_K),
        };
        retrieval.validate()?;

        let resolve = |raw: String| {
            let p = PathBuf::from(raw);
            if p.is_absolute() {
                p
            } else {
                base_dir.join(p)
            }
        };

        Ok(Self {
            inference,
            evaluation,
            sources,
            data_cache_path: resolve(
                get("DATA_CACHE_PATH").unwrap_or_else(|| DEFAULT_DATA_CACHE_PATH.to_string()),
            ),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            scenarios_path: resolve(
                get("SCENARIOS_PATH").unwrap_or_else(|| DEFAULT_SCENARIOS_PATH.to_string()),
            ),
            reports_dir: resolve(
                get("REPORTS_DIR").unwrap_or_else(|| DEFAULT_REPORTS_DIR.to_string()),
            ),
            retrieval,
        })
    }
}

fn parse_usize(key: &str, raw: Option<String>) -> Result<Option<usize>, AppError> {
    let Some(raw) = raw else { return Ok(None) };
    raw.parse::<usize>().map(Some).map_err(|e| {
        AppError::new(
            codes::CONFIG_INVALID,
            format!("{key} must be a non-negative integer"),
        )
        .with_details(format!("value={raw}; err={e}"))
    })
}

fn sources_from_override(raw: &str) -> Result<Vec<Source>, AppError> {
    let sources: Vec<Source> = raw
        .split(',')
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(|url| Source {
            name: url.to_string(),
            url: url.to_string(),
            description: "Configured via environment override".to_string(),
        })
        .collect();
    if sources.is_empty() {
        return Err(AppError::new(
            codes::CONFIG_SOURCES_INVALID,
            format!("{CONFIG_SOURCES_URL_ENV} is set but contains no URLs"),
        ));
    }
    validate_sources(&sources)?;
    Ok(sources)
}

/// Read and validate the ordered source list.
pub fn load_sources_file(path: &Path) -> Result<Vec<Source>, AppError> {
    let raw = fs::read_to_string(path).map_err(|e| {
        AppError::new(codes::CONFIG_SOURCES_INVALID, "Sources file not found")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
        AppError::new(codes::CONFIG_SOURCES_INVALID, "Invalid JSON in sources file")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    if !value.is_array() {
        return Err(AppError::new(
            codes::CONFIG_SOURCES_INVALID,
            "Sources file must contain a JSON array",
        )
        .with_details(format!("path={}", path.display())));
    }
    let sources: Vec<Source> = serde_json::from_value(value).map_err(|e| {
        AppError::new(
            codes::CONFIG_SOURCES_INVALID,
            "Sources entries must have name and url",
        )
        .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    validate_sources(&sources)?;
    Ok(sources)
}

fn validate_sources(sources: &[Source]) -> Result<(), AppError> {
    let mut seen = BTreeSet::new();
    for (i, s) in sources.iter().enumerate() {
        if s.name.trim().is_empty() {
            return Err(AppError::new(codes::CONFIG_SOURCES_INVALID, "Source name is required")
                .with_details(format!("index={i}")));
        }
        if !(s.url.starts_with("https://") || s.url.starts_with("http://")) {
            return Err(AppError::new(
                codes::CONFIG_SOURCES_INVALID,
                "Source url must be http(s)",
            )
            .with_details(format!("index={i}; url={}", s.url)));
        }
        // Cache files are keyed by name.
        if !seen.insert(s.name.as_str()) {
            return Err(AppError::new(
                codes::CONFIG_SOURCES_INVALID,
                "Source names must be unique",
            )
            .with_details(format!("name={}", s.name)));
        }
    }
    Ok(())
}
