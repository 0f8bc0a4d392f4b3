use chrono::Utc;
use shared::{
    ClassificationSummary, CropCoordinates, Detection, FinalStatus, ImageSource,
    PredictionResponse, WorkflowStep,
};
use uuid::Uuid;

use super::routing;
use crate::db::models::PredictionRecord;
use crate::imaging::NormalizedImage;

/// Builds the canonical record for a first-pass prediction. Identity is
/// assigned here and never changes afterwards.
pub fn build_record(
    caller_id: Uuid,
    normalized: &NormalizedImage,
    source: ImageSource,
    classification: ClassificationSummary,
    detections: Option<Vec<Detection>>,
    image_path: Option<String>,
    processing_time_ms: i64,
) -> PredictionRecord {
    let workflow_step = workflow_for(&detections);
    let final_status =
        routing::final_status_for(classification.best_class, detections.as_deref());
    let now = Utc::now();

    PredictionRecord {
        id: Uuid::new_v4(),
        caller_id,
        image_hash: normalized.hash.clone(),
        image_size: normalized.bytes.len() as i64,
        image_source: source,
        image_path,
        classification,
        detections,
        workflow_step,
        final_status,
        crop_coordinates: None,
        processing_time_ms,
        created_at: now,
        updated_at: now,
    }
}

/// Applies a crop re-entry outcome onto the existing record. `id` and
/// `created_at` stay put; everything derived from the image is replaced by
/// the cropped pass.
pub fn apply_crop(
    record: &mut PredictionRecord,
    normalized: &NormalizedImage,
    crop_coordinates: CropCoordinates,
    classification: ClassificationSummary,
    detections: Option<Vec<Detection>>,
    image_path: Option<String>,
    processing_time_ms: i64,
) {
    record.image_hash = normalized.hash.clone();
    record.image_size = normalized.bytes.len() as i64;
    record.image_source = ImageSource::Crop;
    if image_path.is_some() {
        record.image_path = image_path;
    }
    record.workflow_step = workflow_for(&detections);
    record.final_status =
        routing::final_status_for(classification.best_class, detections.as_deref());
    record.classification = classification;
    record.detections = detections;
    record.crop_coordinates = Some(crop_coordinates);
    record.processing_time_ms = processing_time_ms;
    record.updated_at = Utc::now();
}

fn workflow_for(detections: &Option<Vec<Detection>>) -> WorkflowStep {
    if detections.is_some() {
        WorkflowStep::CnnYolo
    } else {
        WorkflowStep::CnnOnly
    }
}

/// The user-facing disease and confidence: the primary detection when the
/// detector found something, the healthy marker when it ran and found
/// nothing, the classifier's verdict otherwise.
pub fn derive_display(record: &PredictionRecord) -> (String, f32) {
    match record.detections.as_deref() {
        Some([first, ..]) => (first.class.clone(), first.confidence),
        Some([]) => (routing::HEALTHY_LABEL.to_string(), 1.0),
        None => (
            record.classification.best_class.to_string(),
            record.classification.best_score,
        ),
    }
}

pub fn to_response(
    record: &PredictionRecord,
    processing_time_ms: i64,
    cnn_time_ms: Option<i64>,
    yolo_time_ms: Option<i64>,
) -> PredictionResponse {
    let (disease, confidence) = derive_display(record);
    let severity = routing::severity_for(&disease).to_string();

    let (message, error) = match record.final_status {
        FinalStatus::NeedCrop => (
            Some("Please crop the leaf region of the image".to_string()),
            None,
        ),
        FinalStatus::NotPlant => (
            None,
            Some("The image does not appear to contain a plant leaf".to_string()),
        ),
        FinalStatus::YoloDetected => (None, None),
    };

    PredictionResponse {
        prediction_id: record.id,
        workflow: record.workflow_step,
        final_status: record.final_status,
        classification: record.classification.clone(),
        detections: record.detections.clone(),
        disease,
        confidence,
        severity,
        image_path: record.image_path.clone(),
        crop_coordinates: record.crop_coordinates,
        processing_time_ms,
        cnn_time_ms,
        yolo_time_ms,
        message,
        error,
    }
}
