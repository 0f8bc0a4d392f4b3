use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub models: ModelConfig,
    pub normalize: NormalizeConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    pub classifier_path: String,
    pub detector_path: String,
    pub detector_confidence_threshold: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NormalizeConfig {
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: u8,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    pub dedup_ttl_secs: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            models: ModelConfig {
                classifier_path: "models/cnn_classifier.pt".to_string(),
                detector_path: "models/yolo_detector.pt".to_string(),
                detector_confidence_threshold: 0.25,
            },
            normalize: NormalizeConfig {
                width: 640,
                height: 640,
                jpeg_quality: 85,
                max_upload_bytes: 5 * 1024 * 1024,
            },
            cache: CacheConfig {
                dedup_ttl_secs: 3600,
            },
        }
    }
}

impl PipelineConfig {
    /// Loads `config/pipeline.yaml` next to the workspace root. A missing
    /// file falls back to defaults; a present but malformed file is an error
    /// so a typo does not silently revert thresholds.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let manifest_dir =
            std::env::var("CARGO_MANIFEST_DIR").map_err(|_| "Failed to get manifest directory")?;
        let config_path = format!("{}/../config/pipeline.yaml", manifest_dir);

        match std::fs::read_to_string(&config_path) {
            Ok(config_str) => {
                let config: PipelineConfig = serde_yaml::from_str(&config_str)?;
                Ok(config)
            }
            Err(_) => {
                log::info!("no config at {}, using defaults", config_path);
                Ok(Self::default())
            }
        }
    }
}
