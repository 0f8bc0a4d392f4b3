use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum_macros::{Display, EnumString};
use uuid::Uuid;

/// Closed label set produced by the first-stage leaf classifier. Routing is an
/// exhaustive match over this enum, so adding a label forces every destination
/// to be revisited at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeafClass {
    Others,
    PepperBell,
    Potato,
    Tomato,
    WholePlant,
}

impl LeafClass {
    /// Label order matches the classifier's output head.
    pub const ALL: [LeafClass; 5] = [
        LeafClass::Others,
        LeafClass::PepperBell,
        LeafClass::Potato,
        LeafClass::Tomato,
        LeafClass::WholePlant,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ImageSource {
    Upload,
    Camera,
    Gallery,
    Crop,
}

/// Whether the detector ran for a given prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkflowStep {
    CnnOnly,
    CnnYolo,
}

/// Terminal outcome of a prediction, derived from the classification (and the
/// detector run, when one happened).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinalStatus {
    YoloDetected,
    NeedCrop,
    NotPlant,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// One localized disease region from the second-stage detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Client-selected crop region, in pixels of the normalized image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropCoordinates {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSummary {
    pub best_class: LeafClass,
    pub best_score: f32,
    pub mean_score: f32,
    pub all_scores: HashMap<LeafClass, f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    /// Base64 image payload, optionally carrying a `data:<mime>;base64,` prefix.
    pub image: String,
    pub source: Option<ImageSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropPredictRequest {
    pub prediction_id: Uuid,
    pub crop_coordinates: CropCoordinates,
    pub cropped_image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction_id: Uuid,
    pub workflow: WorkflowStep,
    pub final_status: FinalStatus,
    pub classification: ClassificationSummary,
    /// Absent when the detector never ran; an empty list means it ran and
    /// found nothing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detections: Option<Vec<Detection>>,
    pub disease: String,
    pub confidence: f32,
    pub severity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_coordinates: Option<CropCoordinates>,
    pub processing_time_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnn_time_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yolo_time_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
