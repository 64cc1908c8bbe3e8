use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::domain::{ScenarioCategory, ScenarioRecord};
use crate::error::{codes, AppError};

/// Wire shape of one JSONL line. Every field except `id` must be present.
#[derive(Debug, Deserialize)]
struct ScenarioLine {
    #[serde(default)]
    id: Option<String>,
    query: String,
    response: String,
    context: String,
    ground_truth: String,
    category: String,
}

/// Read and validate the scenario file. Any malformed line aborts the whole load.
pub fn load_scenarios(path: &Path) -> Result<Vec<ScenarioRecord>, AppError> {
    let text = fs::read_to_string(path).map_err(|e| {
        AppError::new(codes::SCENARIO_LOAD_FAILED, "Failed to read scenario file")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    parse_scenarios(&text)
}

/// Parse line-delimited scenario records. Blank lines are skipped; ids default to
/// `scenario-NNN` numbered by record position.
pub fn parse_scenarios(text: &str) -> Result<Vec<ScenarioRecord>, AppError> {
    let mut out = Vec::new();
    let mut seen_ids = BTreeSet::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let raw: ScenarioLine = serde_json::from_str(line).map_err(|e| {
            AppError::new(codes::SCENARIO_INVALID, "Malformed scenario record")
                .with_details(format!("line={line_no}; err={e}"))
        })?;

        let category = ScenarioCategory::parse(&raw.category).ok_or_else(|| {
            AppError::new(codes::SCENARIO_INVALID, "Unknown scenario category")
                .with_details(format!(
                    "line={line_no}; category={}; expected=groundedness|harmful_content",
                    raw.category
                ))
        })?;

        let required = |field: &str, value: &str| {
            if value.trim().is_empty() {
                Err(AppError::new(
                    codes::SCENARIO_INVALID,
                    format!("Scenario field {field} must not be empty"),
                )
                .with_details(format!("line={line_no}")))
            } else {
                Ok(())
            }
        };
        required("query", &raw.query)?;
        required("response", &raw.response)?;
        if category == ScenarioCategory::Groundedness {
            required("context", &raw.context)?;
        }

        let scenario_id = match raw.id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
            Some(id) => id,
            None => format!("scenario-{:03}", out.len() + 1),
        };
        if !seen_ids.insert(scenario_id.clone()) {
            return Err(AppError::new(codes::SCENARIO_INVALID, "Duplicate scenario id")
                .with_details(format!("line={line_no}; id={scenario_id}")));
        }

        out.push(ScenarioRecord {
            scenario_id,
            query: raw.query,
            response: raw.response,
            context: raw.context,
            ground_truth: raw.ground_truth,
            category,
        });
    }

    Ok(out)
}
