use serde::{Deserialize, Serialize};

/// A configured web page to fetch during the prep step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
}

/// Plain text extracted from one source, as persisted in the document cache.
///
/// Notes:
/// - `raw_text` has markup stripped and whitespace collapsed; chunk offsets index into it.
/// - `fetched_at` is an RFC3339 UTC timestamp; it changes on every re-fetch even when the
///   text does not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CachedDocument {
    pub source_name: String,
    pub url: String,
    pub raw_text: String,
    pub fetched_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioCategory {
    Groundedness,
    HarmfulContent,
}

impl ScenarioCategory {
    pub const ALL: [ScenarioCategory; 2] =
        [ScenarioCategory::Groundedness, ScenarioCategory::HarmfulContent];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioCategory::Groundedness => "groundedness",
            ScenarioCategory::HarmfulContent => "harmful_content",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "groundedness" => Some(ScenarioCategory::Groundedness),
            "harmful_content" => Some(ScenarioCategory::HarmfulContent),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScenarioCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fixed evaluation case loaded from the scenario file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScenarioRecord {
    pub scenario_id: String,
    pub query: String,
    pub response: String,
    pub context: String,
    pub ground_truth: String,
    pub category: ScenarioCategory,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationOutcome {
    Passed,
    Failed,
    /// The evaluator could not produce a score for this record.
    Error,
}

/// Per-scenario evaluator verdict. Exactly one per [`ScenarioRecord`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    pub scenario_id: String,
    pub category: ScenarioCategory,
    pub score: Option<f64>,
    pub outcome: EvaluationOutcome,
    pub error: Option<String>,
    pub raw_evaluator_output: serde_json::Value,
}

impl EvaluationResult {
    pub fn passed(&self) -> bool {
        self.outcome == EvaluationOutcome::Passed
    }

    /// Record-level failure marker; the batch keeps going.
    pub fn errored(record: &ScenarioRecord, error: impl Into<String>) -> Self {
        Self {
            scenario_id: record.scenario_id.clone(),
            category: record.category,
            score: None,
            outcome: EvaluationOutcome::Error,
            error: Some(error.into()),
            raw_evaluator_output: serde_json::Value::Null,
        }
    }
}
