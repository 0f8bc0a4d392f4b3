use shared::{Detection, FinalStatus, LeafClass};

/// Response label for the zero-detections outcome.
pub const HEALTHY_LABEL: &str = "Healthy";

/// Next action after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAction {
    RunDetector,
    RequestCrop,
    Reject,
}

/// Single source of truth for where each label goes. Exhaustive on purpose:
/// a new label does not compile until it has a destination.
pub fn route(best_class: LeafClass) -> RouteAction {
    match best_class {
        LeafClass::PepperBell | LeafClass::Potato | LeafClass::Tomato => RouteAction::RunDetector,
        LeafClass::WholePlant => RouteAction::RequestCrop,
        LeafClass::Others => RouteAction::Reject,
    }
}

/// Terminal status for a classification outcome. Species labels are
/// `yolo_detected` whether or not the detector found anything; zero boxes is
/// still a detector verdict.
pub fn final_status_for(best_class: LeafClass, _detections: Option<&[Detection]>) -> FinalStatus {
    match best_class {
        LeafClass::PepperBell | LeafClass::Potato | LeafClass::Tomato => FinalStatus::YoloDetected,
        LeafClass::WholePlant => FinalStatus::NeedCrop,
        LeafClass::Others => FinalStatus::NotPlant,
    }
}

/// Best-effort severity string. Upstream never defined a real taxonomy, so
/// this intentionally stays two-valued.
pub fn severity_for(disease: &str) -> &'static str {
    if disease == HEALTHY_LABEL {
        "Healthy"
    } else {
        "Unknown"
    }
}
