pub mod classifier;
pub mod detector;

pub use classifier::LeafClassifier;
pub use detector::DiseaseDetector;

use shared::{ClassificationSummary, Detection, LeafClass};
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("preprocessing failed: {0}")]
    Preprocessing(String),
    #[error("model error: {0}")]
    Model(#[from] tch::TchError),
    #[error("unexpected model output: {0}")]
    UnexpectedOutput(String),
}

/// First-stage classifier seam. Implementations must be safe to share
/// read-only across concurrent requests.
pub trait Classify: Send + Sync {
    fn classify(&self, image: &[u8]) -> Result<ClassificationSummary, InferenceError>;
}

/// Second-stage detector seam. Returns zero or more localized detections
/// ordered by descending confidence.
pub trait Detect: Send + Sync {
    fn detect(&self, image: &[u8]) -> Result<Vec<Detection>, InferenceError>;
}

/// Collapses a softmaxed score vector into the summary the pipeline routes on.
/// Score order must match `LeafClass::ALL`.
pub fn summarize_scores(scores: &[f32]) -> Result<ClassificationSummary, InferenceError> {
    if scores.len() != LeafClass::ALL.len() {
        return Err(InferenceError::UnexpectedOutput(format!(
            "classifier returned {} scores for {} labels",
            scores.len(),
            LeafClass::ALL.len()
        )));
    }

    let mut best_idx = 0;
    for (i, score) in scores.iter().enumerate() {
        if *score > scores[best_idx] {
            best_idx = i;
        }
    }

    let mean_score = scores.iter().sum::<f32>() / scores.len() as f32;
    let all_scores: HashMap<LeafClass, f32> = LeafClass::ALL
        .iter()
        .zip(scores.iter())
        .map(|(class, score)| (*class, *score))
        .collect();

    Ok(ClassificationSummary {
        best_class: LeafClass::ALL[best_idx],
        best_score: scores[best_idx],
        mean_score,
        all_scores,
    })
}
