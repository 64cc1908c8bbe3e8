//! Evaluation report files.
//!
//! One JSON array per category (`<category>_results.json`) plus a one-row CSV summary. Every
//! run overwrites the previous files; categories with no scenarios still get an empty array.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::write_json_atomic;
use crate::domain::{EvaluationOutcome, EvaluationResult, ScenarioCategory};
use crate::error::{codes, AppError};

pub const SUMMARY_REPORT_FILENAME: &str = "summary_report.csv";

pub fn report_path(reports_dir: &Path, category: ScenarioCategory) -> PathBuf {
    reports_dir.join(format!("{}_results.json", category.as_str()))
}

fn ensure_reports_dir(reports_dir: &Path) -> Result<(), AppError> {
    fs::create_dir_all(reports_dir).map_err(|e| {
        AppError::new(codes::REPORT_WRITE_FAILED, "Failed to create reports directory")
            .with_details(format!("path={}; err={}", reports_dir.display(), e))
    })
}

/// Write (overwrite) the report for a single category.
pub fn write_category_report(
    reports_dir: &Path,
    category: ScenarioCategory,
    results: &[EvaluationResult],
) -> Result<PathBuf, AppError> {
    ensure_reports_dir(reports_dir)?;
    if let Some(bad) = results.iter().find(|r| r.category != category) {
        return Err(AppError::new(
            codes::REPORT_WRITE_FAILED,
            "Result does not belong to this report category",
        )
        .with_details(format!(
            "report={category}; scenario_id={}; category={}",
            bad.scenario_id, bad.category
        )));
    }
    let path = report_path(reports_dir, category);
    write_json_atomic(&path, results, codes::REPORT_WRITE_FAILED)?;
    Ok(path)
}

pub fn read_category_report(path: &Path) -> Result<Vec<EvaluationResult>, AppError> {
    let raw = fs::read_to_string(path).map_err(|e| {
        AppError::new(codes::REPORT_READ_FAILED, "Failed to read report")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        AppError::new(codes::REPORT_READ_FAILED, "Failed to decode report")
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}

#[derive(Debug, Default)]
pub struct ReportWriteOutcome {
    pub written: Vec<(ScenarioCategory, PathBuf)>,
    pub failures: Vec<(ScenarioCategory, AppError)>,
}

impl ReportWriteOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Write one report per category. A failed file does not stop the remaining ones.
pub fn write_reports(reports_dir: &Path, results: &[EvaluationResult]) -> ReportWriteOutcome {
    let mut by_category: BTreeMap<ScenarioCategory, Vec<EvaluationResult>> = ScenarioCategory::ALL
        .iter()
        .map(|c| (*c, Vec::new()))
        .collect();
    for r in results {
        by_category.entry(r.category).or_default().push(r.clone());
    }

    let mut outcome = ReportWriteOutcome::default();
    for (category, rows) in by_category {
        match write_category_report(reports_dir, category, &rows) {
            Ok(path) => {
                info!(%category, rows = rows.len(), path = %path.display(), "wrote report");
                outcome.written.push((category, path));
            }
            Err(e) => {
                warn!(%category, error = %e, "report write failed");
                outcome.failures.push((category, e));
            }
        }
    }
    outcome
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryCounts {
    pub passed: u32,
    pub failed: u32,
    pub errored: u32,
}

impl CategoryCounts {
    pub fn total(&self) -> u32 {
        self.passed + self.failed + self.errored
    }
}

pub fn count_outcomes(
    results: &[EvaluationResult],
) -> BTreeMap<ScenarioCategory, CategoryCounts> {
    let mut out: BTreeMap<ScenarioCategory, CategoryCounts> = ScenarioCategory::ALL
        .iter()
        .map(|c| (*c, CategoryCounts::default()))
        .collect();
    for r in results {
        let c = out.entry(r.category).or_default();
        match r.outcome {
            EvaluationOutcome::Passed => c.passed += 1,
            EvaluationOutcome::Failed => c.failed += 1,
            EvaluationOutcome::Error => c.errored += 1,
        }
    }
    out
}

/// Row written to `summary_report.csv`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvaluationSummary {
    pub evaluation_timestamp: String,
    pub project: String,
    pub scenarios_file: String,
    pub groundedness_passed: u32,
    pub groundedness_failed: u32,
    pub groundedness_errored: u32,
    pub harmful_content_passed: u32,
    pub harmful_content_failed: u32,
    pub harmful_content_errored: u32,
}

impl EvaluationSummary {
    pub fn from_results(
        evaluation_timestamp: String,
        project: &str,
        scenarios_file: &Path,
        results: &[EvaluationResult],
    ) -> Self {
        let counts = count_outcomes(results);
        let g = counts
            .get(&ScenarioCategory::Groundedness)
            .copied()
            .unwrap_or_default();
        let h = counts
            .get(&ScenarioCategory::HarmfulContent)
            .copied()
            .unwrap_or_default();
        Self {
            evaluation_timestamp,
            project: project.to_string(),
            scenarios_file: scenarios_file.display().to_string(),
            groundedness_passed: g.passed,
            groundedness_failed: g.failed,
            groundedness_errored: g.errored,
            harmful_content_passed: h.passed,
            harmful_content_failed: h.failed,
            harmful_content_errored: h.errored,
        }
    }
}

pub fn write_summary_csv(
    reports_dir: &Path,
    summary: &EvaluationSummary,
) -> Result<PathBuf, AppError> {
    ensure_reports_dir(reports_dir)?;
    let path = reports_dir.join(SUMMARY_REPORT_FILENAME);
    let mut wtr = csv::Writer::from_path(&path).map_err(|e| {
        AppError::new(codes::REPORT_WRITE_FAILED, "Failed to create summary report")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    wtr.serialize(summary).map_err(|e| {
        AppError::new(codes::REPORT_WRITE_FAILED, "Failed to write summary report")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    wtr.flush().map_err(|e| {
        AppError::new(codes::REPORT_WRITE_FAILED, "Failed to flush summary report")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    Ok(path)
}
