use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rai_core::config::EvaluationConfig;
use rai_core::domain::{EvaluationResult, ScenarioCategory};
use rai_core::error::{codes, AppError};
use rai_core::report::{
    count_outcomes, write_reports, write_summary_csv, CategoryCounts, EvaluationSummary,
    ReportWriteOutcome,
};
use rai_core::scenario::load_scenarios;
use rai_core::timestamp::now_rfc3339_utc;
use tracing::{info, warn};

use super::Evaluator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    LoadingScenarios,
    /// Zero-based index of the record being evaluated.
    Evaluating(usize),
    Aggregating,
    WritingReport,
    Done,
    FailedLoad,
}

#[derive(Debug)]
pub struct EvaluationRunSummary {
    pub scenarios_file: PathBuf,
    /// One per scenario, in file order.
    pub results: Vec<EvaluationResult>,
    pub counts: BTreeMap<ScenarioCategory, CategoryCounts>,
    pub reports: ReportWriteOutcome,
    /// `None` when the summary CSV could not be written; the error is in `summary_error`.
    pub summary_csv: Option<PathBuf>,
    pub summary_error: Option<AppError>,
}

impl EvaluationRunSummary {
    pub fn errored(&self) -> impl Iterator<Item = &EvaluationResult> {
        self.results.iter().filter(|r| r.error.is_some())
    }
}

pub struct EvaluationRunner<'a> {
    groundedness: &'a dyn Evaluator,
    harmful_content: &'a dyn Evaluator,
    project_name: String,
    reports_dir: PathBuf,
    phase: RunPhase,
}

impl<'a> EvaluationRunner<'a> {
    pub fn new(
        groundedness: &'a dyn Evaluator,
        harmful_content: &'a dyn Evaluator,
        project_name: impl Into<String>,
        reports_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            groundedness,
            harmful_content,
            project_name: project_name.into(),
            reports_dir: reports_dir.into(),
            phase: RunPhase::Idle,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn evaluator_for(&self, category: ScenarioCategory) -> &'a dyn Evaluator {
        match category {
            ScenarioCategory::Groundedness => self.groundedness,
            ScenarioCategory::HarmfulContent => self.harmful_content,
        }
    }

    /// Evaluate every scenario in `scenarios_path` and write the reports.
    ///
    /// Only a scenario file that cannot be loaded fails the run (phase `FailedLoad`). A record
    /// whose evaluator fails gets an `error` result; report files that cannot be written are
    /// listed in the summary while the others are still written.
    pub fn run(&mut self, scenarios_path: &Path) -> Result<EvaluationRunSummary, AppError> {
        for category in ScenarioCategory::ALL {
            let wired = self.evaluator_for(category).category();
            if wired != category {
                return Err(AppError::new(codes::EVAL_FAILED, "Evaluator wired to the wrong category")
                    .with_details(format!("slot={category}; evaluator={wired}")));
            }
        }

        self.phase = RunPhase::LoadingScenarios;
        let records = match load_scenarios(scenarios_path) {
            Ok(r) => r,
            Err(e) => {
                self.phase = RunPhase::FailedLoad;
                return Err(e);
            }
        };
        info!(path = %scenarios_path.display(), scenarios = records.len(), "loaded scenarios");

        let mut results = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            self.phase = RunPhase::Evaluating(i);
            let evaluator = self.evaluator_for(record.category);
            let result = match evaluator.evaluate(record) {
                Ok(r) if r.scenario_id == record.scenario_id && r.category == record.category => r,
                Ok(r) => EvaluationResult::errored(
                    record,
                    AppError::new(codes::EVAL_FAILED, "Evaluator returned a result for another scenario")
                        .with_details(format!("got={}", r.scenario_id))
                        .to_string(),
                ),
                Err(e) => {
                    warn!(scenario_id = %record.scenario_id, category = %record.category, error = %e, "scenario evaluation failed");
                    EvaluationResult::errored(record, e.to_string())
                }
            };
            info!(scenario_id = %result.scenario_id, outcome = ?result.outcome, score = ?result.score, "evaluated scenario");
            results.push(result);
        }

        self.phase = RunPhase::Aggregating;
        let counts = count_outcomes(&results);

        self.phase = RunPhase::WritingReport;
        let reports = write_reports(&self.reports_dir, &results);
        let (summary_csv, summary_error) = match now_rfc3339_utc().and_then(|ts| {
            let summary =
                EvaluationSummary::from_results(ts, &self.project_name, scenarios_path, &results);
            write_summary_csv(&self.reports_dir, &summary)
        }) {
            Ok(p) => (Some(p), None),
            Err(e) => {
                warn!(error = %e, "summary report write failed");
                (None, Some(e))
            }
        };

        self.phase = RunPhase::Done;
        Ok(EvaluationRunSummary {
            scenarios_file: scenarios_path.to_path_buf(),
            results,
            counts,
            reports,
            summary_csv,
            summary_error,
        })
    }
}

/// The role assignment the evaluation identity needs before results can be logged to the
/// project's storage account.
pub fn storage_role_command(cfg: &EvaluationConfig) -> String {
    format!(
        "az role assignment create --role \"Storage Blob Data Contributor\" --scope /subscriptions/{}/resourceGroups/{} --assignee-principal-type User --assignee-object-id \"<user-object-id>\"",
        cfg.subscription_id, cfg.resource_group
    )
}
