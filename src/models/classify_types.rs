use crate::models::catalog_types::Label;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One ranked candidate as returned by a classifier.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Prediction {
    pub class_name: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PredictedLabel {
    Known(Label),
    Unrecognized(String),
}

impl PredictedLabel {
    pub fn matches(&self, actual: Label) -> bool {
        matches!(self, PredictedLabel::Known(label) if *label == actual)
    }
}

impl fmt::Display for PredictedLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictedLabel::Known(label) => write!(f, "{}", label),
            PredictedLabel::Unrecognized(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClassificationResult {
    Predicted {
        label: PredictedLabel,
        confidence: f32,
    },
    Error {
        message: String,
    },
}

impl ClassificationResult {
    pub fn is_correct(&self, actual: Label) -> bool {
        match self {
            ClassificationResult::Predicted { label, .. } => label.matches(actual),
            ClassificationResult::Error { .. } => false,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ClassificationResult::Error { .. })
    }
}

/// Contents of a model's `metadata.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub image_size: Option<u32>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub tm_version: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PageSummary {
    pub total: usize,
    pub correct: usize,
    pub accuracy: f32,
    pub low_accuracy_warning: bool,
    pub can_go_back: bool,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ModelStatus {
    pub loaded: bool,
    pub busy: bool,
    pub model_name: Option<String>,
    pub labels: Vec<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ClassifyProgress {
    pub current: usize,
    pub total: usize,
    pub current_file: String,
    pub correct: usize,
}
