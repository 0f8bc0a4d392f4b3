use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    ClassificationSummary, CropCoordinates, Detection, FinalStatus, ImageSource, WorkflowStep,
};
use uuid::Uuid;

/// Canonical unit of work. Created after the first successful classification
/// pass and mutated in place on crop re-entry; the identity never changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: Uuid,
    pub caller_id: Uuid,
    pub image_hash: String,
    pub image_size: i64,
    pub image_source: ImageSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    pub classification: ClassificationSummary,
    /// `None` means the detector never ran; `Some(vec![])` means it ran and
    /// found nothing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detections: Option<Vec<Detection>>,
    pub workflow_step: WorkflowStep,
    pub final_status: FinalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_coordinates: Option<CropCoordinates>,
    pub processing_time_ms: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
