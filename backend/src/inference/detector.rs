use super::{Detect, InferenceError};
use image::imageops::FilterType;
use shared::{BoundingBox, Detection};
use std::cmp::Ordering;
use std::sync::Mutex;
use tch::{CModule, Device, Kind, Tensor};

const INPUT_SIZE: u32 = 640;
const ROW_WIDTH: usize = 6;

/// Detector class table, fixed index -> disease name as exported with the
/// model weights.
pub const DETECTOR_CLASSES: [&str; 9] = [
    "Pepper_Bell_Bacterial_Spot",
    "Pepper_Bell_Spot_Severe",
    "Potato_Early_Blight",
    "Potato_Late_Blight",
    "Tomato_Bacterial_Spot",
    "Tomato_Early_Blight",
    "Tomato_Blight_Severe",
    "Tomato_Leaf_Mold",
    "Tomato_Septoria_Spot",
];

/// TorchScript disease detector. The export emits post-NMS rows of
/// `[x1, y1, x2, y2, confidence, class_index]`.
pub struct DiseaseDetector {
    module: Mutex<CModule>,
    device: Device,
    confidence_threshold: f32,
}

impl DiseaseDetector {
    pub fn load(model_path: &str, confidence_threshold: f32) -> Result<Self, InferenceError> {
        let device = Device::cuda_if_available();
        let module = CModule::load_on_device(model_path, device)?;
        log::info!("detector loaded from {} on {:?}", model_path, device);
        Ok(Self {
            module: Mutex::new(module),
            device,
            confidence_threshold,
        })
    }

    fn preprocess(&self, image: &[u8]) -> Result<Tensor, InferenceError> {
        let decoded = image::load_from_memory(image)
            .map_err(|e| InferenceError::Preprocessing(e.to_string()))?
            .to_rgb8();
        let resized = image::imageops::resize(&decoded, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

        let pixels = (INPUT_SIZE * INPUT_SIZE) as usize;
        let mut chw = vec![0f32; 3 * pixels];
        for (x, y, px) in resized.enumerate_pixels() {
            let offset = (y * INPUT_SIZE + x) as usize;
            for c in 0..3 {
                chw[c * pixels + offset] = px.0[c] as f32 / 255.0;
            }
        }

        let tensor = Tensor::from_slice(&chw)
            .view([1, 3, INPUT_SIZE as i64, INPUT_SIZE as i64])
            .to_device(self.device);
        Ok(tensor)
    }
}

impl Detect for DiseaseDetector {
    fn detect(&self, image: &[u8]) -> Result<Vec<Detection>, InferenceError> {
        let input = self.preprocess(image)?;
        let output = self.module.lock().unwrap().forward_ts(&[input])?;

        let flat = output.to_kind(Kind::Float).view([-1]);
        let num_elements = flat.size()[0] as usize;
        if num_elements % ROW_WIDTH != 0 {
            return Err(InferenceError::UnexpectedOutput(format!(
                "detector output has {} elements, not a multiple of {}",
                num_elements, ROW_WIDTH
            )));
        }
        let mut rows = vec![0f32; num_elements];
        flat.copy_data(&mut rows, num_elements);

        Ok(decode_rows(&rows, self.confidence_threshold))
    }
}

/// Turns raw detector rows into detections: drop rows under the confidence
/// threshold or with an out-of-table class index, then order by confidence
/// descending so the first detection is the primary one.
pub(crate) fn decode_rows(rows: &[f32], confidence_threshold: f32) -> Vec<Detection> {
    let mut detections = Vec::new();
    for row in rows.chunks_exact(ROW_WIDTH) {
        let confidence = row[4];
        if !confidence.is_finite() || confidence < confidence_threshold {
            continue;
        }
        // Casting a negative float to usize saturates to 0, which would
        // silently claim the first class; reject before rounding.
        if row[5] < 0.0 {
            log::warn!("detector emitted negative class index {}", row[5]);
            continue;
        }
        let class_idx = row[5].round() as usize;
        let Some(class) = DETECTOR_CLASSES.get(class_idx) else {
            log::warn!("detector emitted unknown class index {}", class_idx);
            continue;
        };
        detections.push(Detection {
            class: (*class).to_string(),
            confidence,
            bbox: BoundingBox {
                x1: row[0],
                y1: row[1],
                x2: row[2],
                y2: row[3],
            },
        });
    }
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });
    detections
}
