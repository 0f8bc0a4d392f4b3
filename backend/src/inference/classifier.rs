use super::{Classify, InferenceError, summarize_scores};
use image::imageops::FilterType;
use shared::ClassificationSummary;
use std::sync::Mutex;
use tch::{CModule, Device, Kind, Tensor};

const INPUT_SIZE: u32 = 224;
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// TorchScript leaf classifier. Loaded once at startup and shared across
/// requests; the module itself is guarded because libtorch forward calls are
/// not re-entrant on a single CModule.
pub struct LeafClassifier {
    module: Mutex<CModule>,
    device: Device,
}

impl LeafClassifier {
    pub fn load(model_path: &str) -> Result<Self, InferenceError> {
        let device = Device::cuda_if_available();
        let module = CModule::load_on_device(model_path, device)?;
        log::info!("classifier loaded from {} on {:?}", model_path, device);
        Ok(Self {
            module: Mutex::new(module),
            device,
        })
    }

    /// Decode, resize to the training resolution, and build a normalized
    /// NCHW float tensor.
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
                let v = px.0[c] as f32 / 255.0;
                chw[c * pixels + offset] = (v - MEAN[c]) / STD[c];
            }
        }

        let tensor = Tensor::from_slice(&chw)
            .view([1, 3, INPUT_SIZE as i64, INPUT_SIZE as i64])
            .to_device(self.device);
        Ok(tensor)
    }
}

impl Classify for LeafClassifier {
    fn classify(&self, image: &[u8]) -> Result<ClassificationSummary, InferenceError> {
        let input = self.preprocess(image)?;
        let output = self.module.lock().unwrap().forward_ts(&[input])?;

        let probs = output.softmax(-1, Kind::Float).view([-1]);
        let num_elements = probs.size()[0] as usize;
        let mut scores = vec![0f32; num_elements];
        probs.to_kind(Kind::Float).copy_data(&mut scores, num_elements);

        summarize_scores(&scores)
    }
}
