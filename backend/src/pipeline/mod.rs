pub mod assembler;
pub mod routing;

use std::sync::Arc;
use std::time::Instant;

use shared::{CropCoordinates, ImageSource, PredictionResponse};
use uuid::Uuid;

use crate::cache::DedupCache;
use crate::db::{PredictionStore, RepositoryError};
use crate::imaging::{ImageNormalizer, NormalizeError};
use crate::inference::{Classify, Detect};
use crate::storage::ImageStore;
use routing::RouteAction;

#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    /// Malformed, oversized, or undecodable image. Nothing runs, nothing is
    /// persisted.
    #[error("invalid image: {0}")]
    Validation(#[from] NormalizeError),
    /// Crop follow-up referencing an identity that does not exist for this
    /// caller.
    #[error("unknown prediction id: {0}")]
    UnknownPrediction(Uuid),
    /// Classifier raised during inference. Fatal for the request; without a
    /// class there is nothing to route.
    #[error("classification failed: {0}")]
    Classification(String),
    /// Store read failed where the pipeline needed the answer (crop re-entry
    /// lookup). Store writes never surface here.
    #[error("prediction store error: {0}")]
    Store(#[from] RepositoryError),
}

/// Orchestrates one prediction: normalize, classify, route, optionally
/// detect, assemble, persist, cache. Owns the constructed-once stage and
/// collaborator handles; nothing here is ambient.
pub struct PredictionPipeline {
    normalizer: ImageNormalizer,
    classifier: Arc<dyn Classify>,
    detector: Arc<dyn Detect>,
    store: Arc<dyn PredictionStore>,
    images: Arc<dyn ImageStore>,
    cache: DedupCache,
}

impl PredictionPipeline {
    pub fn new(
        normalizer: ImageNormalizer,
        classifier: Arc<dyn Classify>,
        detector: Arc<dyn Detect>,
        store: Arc<dyn PredictionStore>,
        images: Arc<dyn ImageStore>,
        cache: DedupCache,
    ) -> Self {
        Self {
            normalizer,
            classifier,
            detector,
            store,
            images,
            cache,
        }
    }

    pub async fn predict(
        &self,
        image: &[u8],
        caller_id: Uuid,
        source: ImageSource,
    ) -> Result<PredictionResponse, PredictError> {
        let started = Instant::now();
        let normalized = self.normalizer.normalize(image)?;

        if let Some(hit) = self.cache.get(&normalized.hash, caller_id) {
            log::info!(
                "cache hit for hash {}, skipping inference",
                &normalized.hash[..8]
            );
            return Ok(hit);
        }

        let (classification, cnn_time_ms) = self.classify(&normalized.bytes)?;
        let (detections, yolo_time_ms) = self.maybe_detect(classification.best_class, &normalized.bytes);
        let image_path = self.upload_best_effort(caller_id, &normalized).await;

        let record = assembler::build_record(
            caller_id,
            &normalized,
            source,
            classification,
            detections,
            image_path,
            elapsed_ms(started),
        );

        // Serve over store: a failed write is logged, the caller still gets
        // the assembled result.
        let stored = match self.store.insert_or_existing(&record).await {
            Ok(stored) => stored,
            Err(e) => {
                log::error!("failed to persist prediction {}: {}", record.id, e);
                record
            }
        };

        let response = assembler::to_response(&stored, elapsed_ms(started), Some(cnn_time_ms), yolo_time_ms);
        self.cache
            .insert(normalized.hash, caller_id, response.clone());
        Ok(response)
    }

    /// Crop follow-up: re-runs the full pipeline on the cropped bytes and
    /// writes the outcome onto the referenced record. The identity must
    /// already exist; this path never creates one.
    pub async fn predict_with_crop(
        &self,
        prediction_id: Uuid,
        crop_coordinates: CropCoordinates,
        image: &[u8],
        caller_id: Uuid,
    ) -> Result<PredictionResponse, PredictError> {
        let started = Instant::now();

        let mut record = self
            .store
            .get(caller_id, prediction_id)
            .await?
            .ok_or(PredictError::UnknownPrediction(prediction_id))?;

        let normalized = self.normalizer.normalize(image)?;
        let (classification, cnn_time_ms) = self.classify(&normalized.bytes)?;
        let (detections, yolo_time_ms) = self.maybe_detect(classification.best_class, &normalized.bytes);
        let image_path = self.upload_best_effort(caller_id, &normalized).await;

        assembler::apply_crop(
            &mut record,
            &normalized,
            crop_coordinates,
            classification,
            detections,
            image_path,
            elapsed_ms(started),
        );

        if let Err(e) = self.store.update(&record).await {
            log::error!("failed to update prediction {}: {}", record.id, e);
        }

        let response = assembler::to_response(&record, elapsed_ms(started), Some(cnn_time_ms), yolo_time_ms);
        self.cache
            .insert(normalized.hash, caller_id, response.clone());
        Ok(response)
    }

    fn classify(
        &self,
        image: &[u8],
    ) -> Result<(shared::ClassificationSummary, i64), PredictError> {
        let cnn_started = Instant::now();
        let classification = self.classifier.classify(image).map_err(|e| {
            log::error!("classification failed: {}", e);
            PredictError::Classification(e.to_string())
        })?;
        let cnn_time_ms = elapsed_ms(cnn_started);
        log::info!(
            "classifier: {} ({:.4}) in {}ms",
            classification.best_class,
            classification.best_score,
            cnn_time_ms
        );
        Ok((classification, cnn_time_ms))
    }

    /// Runs the detector only when routing says so. A detector failure is
    /// recoverable: it degrades to zero detections instead of aborting the
    /// request, unlike a classifier failure.
    fn maybe_detect(
        &self,
        best_class: shared::LeafClass,
        image: &[u8],
    ) -> (Option<Vec<shared::Detection>>, Option<i64>) {
        match routing::route(best_class) {
            RouteAction::RunDetector => {
                let yolo_started = Instant::now();
                let detections = match self.detector.detect(image) {
                    Ok(detections) => {
                        log::info!("detector found {} region(s)", detections.len());
                        detections
                    }
                    Err(e) => {
                        log::error!("detection failed, continuing with zero detections: {}", e);
                        Vec::new()
                    }
                };
                (Some(detections), Some(elapsed_ms(yolo_started)))
            }
            RouteAction::RequestCrop | RouteAction::Reject => (None, None),
        }
    }

    async fn upload_best_effort(
        &self,
        caller_id: Uuid,
        normalized: &crate::imaging::NormalizedImage,
    ) -> Option<String> {
        match self
            .images
            .store_image(caller_id, &normalized.hash, &normalized.bytes)
            .await
        {
            Ok(location) => Some(location),
            Err(e) => {
                log::warn!("image upload failed, continuing without location: {}", e);
                None
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> i64 {
    started.elapsed().as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::PredictionRecord;
    use crate::inference::InferenceError;
    use crate::storage::StorageError;
    use async_trait::async_trait;
    use shared::{
        BoundingBox, ClassificationSummary, Detection, FinalStatus, LeafClass, WorkflowStep,
    };
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn summary_for(best_class: LeafClass, best_score: f32) -> ClassificationSummary {
        let mut all_scores = HashMap::new();
        for class in LeafClass::ALL {
            all_scores.insert(class, if class == best_class { best_score } else { 0.01 });
        }
        ClassificationSummary {
            best_class,
            best_score,
            mean_score: 0.2,
            all_scores,
        }
    }

    /// Returns a fixed sequence of classifications, then repeats the last.
    struct ScriptedClassifier {
        script: Mutex<Vec<ClassificationSummary>>,
        calls: AtomicUsize,
    }

    impl ScriptedClassifier {
        fn new(classes: &[(LeafClass, f32)]) -> Self {
            let mut script: Vec<ClassificationSummary> = classes
                .iter()
                .map(|(class, score)| summary_for(*class, *score))
                .collect();
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Classify for ScriptedClassifier {
        fn classify(&self, _image: &[u8]) -> Result<ClassificationSummary, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                Ok(script.pop().unwrap())
            } else {
                Ok(script.last().cloned().unwrap())
            }
        }
    }

    struct FailingClassifier {
        calls: AtomicUsize,
    }

    impl FailingClassifier {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Classify for FailingClassifier {
        fn classify(&self, _image: &[u8]) -> Result<ClassificationSummary, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(InferenceError::UnexpectedOutput(
                "stub classifier down".to_string(),
            ))
        }
    }

    enum DetectorBehavior {
        Return(Vec<Detection>),
        Fail,
    }

    struct StubDetector {
        behavior: DetectorBehavior,
        calls: AtomicUsize,
    }

    impl StubDetector {
        fn returning(detections: Vec<Detection>) -> Self {
            Self {
                behavior: DetectorBehavior::Return(detections),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                behavior: DetectorBehavior::Fail,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Detect for StubDetector {
        fn detect(&self, _image: &[u8]) -> Result<Vec<Detection>, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                DetectorBehavior::Return(detections) => Ok(detections.clone()),
                DetectorBehavior::Fail => Err(InferenceError::UnexpectedOutput(
                    "stub detector down".to_string(),
                )),
            }
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        records: Mutex<HashMap<Uuid, PredictionRecord>>,
    }

    impl MemoryStore {
        fn len(&self) -> usize {
            self.records.lock().unwrap().len()
        }

        fn get_by_id(&self, id: Uuid) -> Option<PredictionRecord> {
            self.records.lock().unwrap().get(&id).cloned()
        }
    }

    #[async_trait]
    impl PredictionStore for MemoryStore {
        async fn insert_or_existing(
            &self,
            record: &PredictionRecord,
        ) -> Result<PredictionRecord, RepositoryError> {
            let mut records = self.records.lock().unwrap();
            if let Some(existing) = records
                .values()
                .find(|r| r.caller_id == record.caller_id && r.image_hash == record.image_hash)
            {
                return Ok(existing.clone());
            }
            records.insert(record.id, record.clone());
            Ok(record.clone())
        }

        async fn get(
            &self,
            caller_id: Uuid,
            id: Uuid,
        ) -> Result<Option<PredictionRecord>, RepositoryError> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .get(&id)
                .filter(|r| r.caller_id == caller_id)
                .cloned())
        }

        async fn update(&self, record: &PredictionRecord) -> Result<(), RepositoryError> {
            self.records
                .lock()
                .unwrap()
                .insert(record.id, record.clone());
            Ok(())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl PredictionStore for FailingStore {
        async fn insert_or_existing(
            &self,
            _record: &PredictionRecord,
        ) -> Result<PredictionRecord, RepositoryError> {
            Err(RepositoryError::DynamoDb("store is down".to_string()))
        }

        async fn get(
            &self,
            _caller_id: Uuid,
            _id: Uuid,
        ) -> Result<Option<PredictionRecord>, RepositoryError> {
            Err(RepositoryError::DynamoDb("store is down".to_string()))
        }

        async fn update(&self, _record: &PredictionRecord) -> Result<(), RepositoryError> {
            Err(RepositoryError::DynamoDb("store is down".to_string()))
        }
    }

    struct MemoryImages;

    #[async_trait]
    impl ImageStore for MemoryImages {
        async fn store_image(
            &self,
            caller_id: Uuid,
            image_hash: &str,
            _bytes: &[u8],
        ) -> Result<String, StorageError> {
            Ok(format!("mem://{}/{}", caller_id, image_hash))
        }
    }

    fn test_image() -> Vec<u8> {
        let img = image::RgbImage::from_fn(6, 6, |x, y| {
            image::Rgb([(x * 40) as u8, (y * 40) as u8, 90])
        });
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn other_test_image() -> Vec<u8> {
        let img = image::RgbImage::from_fn(6, 6, |x, y| {
            image::Rgb([255 - (x * 40) as u8, (y * 40) as u8, 10])
        });
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn blight_detection() -> Detection {
        Detection {
            class: "Tomato_Blight_Severe".to_string(),
            confidence: 0.81,
            bbox: BoundingBox {
                x1: 10.0,
                y1: 10.0,
                x2: 80.0,
                y2: 90.0,
            },
        }
    }

    struct Harness {
        pipeline: PredictionPipeline,
        classifier: Arc<ScriptedClassifier>,
        detector: Arc<StubDetector>,
        store: Arc<MemoryStore>,
    }

    fn harness(classifier: ScriptedClassifier, detector: StubDetector, ttl_secs: i64) -> Harness {
        let classifier = Arc::new(classifier);
        let detector = Arc::new(detector);
        let store = Arc::new(MemoryStore::default());
        let pipeline = PredictionPipeline::new(
            ImageNormalizer::new(64, 64, 5 * 1024 * 1024, 85),
            classifier.clone(),
            detector.clone(),
            store.clone(),
            Arc::new(MemoryImages),
            DedupCache::new(ttl_secs),
        );
        Harness {
            pipeline,
            classifier,
            detector,
            store,
        }
    }

    #[actix_web::test]
    async fn non_plant_never_reaches_the_detector() {
        let h = harness(
            ScriptedClassifier::new(&[(LeafClass::Others, 0.95)]),
            StubDetector::returning(vec![blight_detection()]),
            3600,
        );
        let response = h
            .pipeline
            .predict(&test_image(), Uuid::new_v4(), ImageSource::Upload)
            .await
            .unwrap();

        assert_eq!(response.final_status, FinalStatus::NotPlant);
        assert_eq!(response.workflow, WorkflowStep::CnnOnly);
        assert!(response.detections.is_none());
        assert!(response.error.is_some());
        assert_eq!(h.detector.call_count(), 0);
    }

    #[actix_web::test]
    async fn whole_plant_requests_a_crop() {
        let h = harness(
            ScriptedClassifier::new(&[(LeafClass::WholePlant, 0.77)]),
            StubDetector::returning(vec![]),
            3600,
        );
        let response = h
            .pipeline
            .predict(&test_image(), Uuid::new_v4(), ImageSource::Camera)
            .await
            .unwrap();

        assert_eq!(response.final_status, FinalStatus::NeedCrop);
        assert_eq!(response.workflow, WorkflowStep::CnnOnly);
        assert!(response.crop_coordinates.is_none());
        assert!(response.message.is_some());
        assert_eq!(h.detector.call_count(), 0);
    }

    #[actix_web::test]
    async fn species_label_runs_detector_exactly_once() {
        let h = harness(
            ScriptedClassifier::new(&[(LeafClass::Tomato, 0.92)]),
            StubDetector::returning(vec![blight_detection()]),
            3600,
        );
        let response = h
            .pipeline
            .predict(&test_image(), Uuid::new_v4(), ImageSource::Upload)
            .await
            .unwrap();

        assert_eq!(h.detector.call_count(), 1);
        assert_eq!(response.workflow, WorkflowStep::CnnYolo);
        assert_eq!(response.final_status, FinalStatus::YoloDetected);
        assert_eq!(response.disease, "Tomato_Blight_Severe");
        assert!((response.confidence - 0.81).abs() < 1e-6);
    }

    #[actix_web::test]
    async fn zero_detections_is_healthy_not_an_error() {
        let h = harness(
            ScriptedClassifier::new(&[(LeafClass::Potato, 0.88)]),
            StubDetector::returning(vec![]),
            3600,
        );
        let response = h
            .pipeline
            .predict(&test_image(), Uuid::new_v4(), ImageSource::Upload)
            .await
            .unwrap();

        assert_eq!(response.disease, "Healthy");
        assert_eq!(response.confidence, 1.0);
        assert_eq!(response.severity, "Healthy");
        assert_eq!(response.final_status, FinalStatus::YoloDetected);
        assert_eq!(response.detections.as_deref(), Some(&[][..]));
    }

    #[actix_web::test]
    async fn detector_failure_degrades_to_zero_detections() {
        let h = harness(
            ScriptedClassifier::new(&[(LeafClass::Tomato, 0.92)]),
            StubDetector::failing(),
            3600,
        );
        let response = h
            .pipeline
            .predict(&test_image(), Uuid::new_v4(), ImageSource::Upload)
            .await
            .unwrap();

        assert_eq!(h.detector.call_count(), 1);
        assert_eq!(response.disease, "Healthy");
        assert_eq!(response.workflow, WorkflowStep::CnnYolo);
        assert_eq!(response.final_status, FinalStatus::YoloDetected);
    }

    #[actix_web::test]
    async fn classifier_failure_is_fatal_and_leaves_no_trace() {
        let classifier = Arc::new(FailingClassifier::new());
        let detector = Arc::new(StubDetector::returning(vec![blight_detection()]));
        let store = Arc::new(MemoryStore::default());
        let pipeline = PredictionPipeline::new(
            ImageNormalizer::new(64, 64, 5 * 1024 * 1024, 85),
            classifier.clone(),
            detector.clone(),
            store.clone(),
            Arc::new(MemoryImages),
            DedupCache::new(3600),
        );
        let caller = Uuid::new_v4();

        let err = pipeline
            .predict(&test_image(), caller, ImageSource::Upload)
            .await
            .unwrap_err();

        assert!(matches!(err, PredictError::Classification(_)));
        assert_eq!(detector.call_count(), 0);
        assert_eq!(store.len(), 0);

        // Failures are never cached: resubmitting the same image must reach
        // the classifier again.
        let err = pipeline
            .predict(&test_image(), caller, ImageSource::Upload)
            .await
            .unwrap_err();
        assert!(matches!(err, PredictError::Classification(_)));
        assert_eq!(classifier.call_count(), 2);
        assert_eq!(detector.call_count(), 0);
        assert_eq!(store.len(), 0);
    }

    #[actix_web::test]
    async fn repeated_submission_hits_the_cache() {
        let h = harness(
            ScriptedClassifier::new(&[(LeafClass::Tomato, 0.92)]),
            StubDetector::returning(vec![blight_detection()]),
            3600,
        );
        let caller = Uuid::new_v4();

        let first = h
            .pipeline
            .predict(&test_image(), caller, ImageSource::Upload)
            .await
            .unwrap();
        let second = h
            .pipeline
            .predict(&test_image(), caller, ImageSource::Upload)
            .await
            .unwrap();

        assert_eq!(first.prediction_id, second.prediction_id);
        assert_eq!(h.classifier.call_count(), 1);
        assert_eq!(h.detector.call_count(), 1);
    }

    #[actix_web::test]
    async fn cache_is_scoped_per_caller() {
        let h = harness(
            ScriptedClassifier::new(&[(LeafClass::Tomato, 0.92)]),
            StubDetector::returning(vec![]),
            3600,
        );

        h.pipeline
            .predict(&test_image(), Uuid::new_v4(), ImageSource::Upload)
            .await
            .unwrap();
        h.pipeline
            .predict(&test_image(), Uuid::new_v4(), ImageSource::Upload)
            .await
            .unwrap();

        assert_eq!(h.classifier.call_count(), 2);
    }

    #[actix_web::test]
    async fn expired_cache_recomputes_but_store_reconciles_identity() {
        // TTL zero: every submission recomputes, but the store hands back the
        // pre-existing record for the same hash and caller.
        let h = harness(
            ScriptedClassifier::new(&[(LeafClass::Tomato, 0.92)]),
            StubDetector::returning(vec![blight_detection()]),
            0,
        );
        let caller = Uuid::new_v4();

        let first = h
            .pipeline
            .predict(&test_image(), caller, ImageSource::Upload)
            .await
            .unwrap();
        let second = h
            .pipeline
            .predict(&test_image(), caller, ImageSource::Upload)
            .await
            .unwrap();

        assert_eq!(h.classifier.call_count(), 2);
        assert_eq!(first.prediction_id, second.prediction_id);
        assert_eq!(h.store.len(), 1);
    }

    #[actix_web::test]
    async fn crop_reentry_mutates_the_same_record() {
        let h = harness(
            ScriptedClassifier::new(&[(LeafClass::WholePlant, 0.77), (LeafClass::Potato, 0.88)]),
            StubDetector::returning(vec![]),
            3600,
        );
        let caller = Uuid::new_v4();

        let first = h
            .pipeline
            .predict(&test_image(), caller, ImageSource::Upload)
            .await
            .unwrap();
        assert_eq!(first.final_status, FinalStatus::NeedCrop);

        let crop = CropCoordinates {
            x: 100.0,
            y: 120.0,
            width: 220.0,
            height: 200.0,
        };
        let followup = h
            .pipeline
            .predict_with_crop(first.prediction_id, crop, &other_test_image(), caller)
            .await
            .unwrap();

        assert_eq!(followup.prediction_id, first.prediction_id);
        assert_eq!(followup.final_status, FinalStatus::YoloDetected);
        assert_eq!(followup.disease, "Healthy");
        assert_eq!(followup.confidence, 1.0);
        assert!(followup.crop_coordinates.is_some());
        assert_eq!(h.store.len(), 1);

        let record = h.store.get_by_id(first.prediction_id).unwrap();
        assert_eq!(record.image_source, ImageSource::Crop);
        assert_eq!(record.workflow_step, WorkflowStep::CnnYolo);
        assert!(record.crop_coordinates.is_some());
    }

    #[actix_web::test]
    async fn crop_reentry_with_unknown_id_touches_nothing() {
        let h = harness(
            ScriptedClassifier::new(&[(LeafClass::Potato, 0.88)]),
            StubDetector::returning(vec![]),
            3600,
        );
        let crop = CropCoordinates {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
        };

        let err = h
            .pipeline
            .predict_with_crop(Uuid::new_v4(), crop, &test_image(), Uuid::new_v4())
            .await
            .unwrap_err();

        assert!(matches!(err, PredictError::UnknownPrediction(_)));
        assert_eq!(h.classifier.call_count(), 0);
        assert_eq!(h.store.len(), 0);
    }

    #[actix_web::test]
    async fn crop_reentry_is_caller_scoped() {
        let h = harness(
            ScriptedClassifier::new(&[(LeafClass::WholePlant, 0.77)]),
            StubDetector::returning(vec![]),
            3600,
        );
        let owner = Uuid::new_v4();
        let first = h
            .pipeline
            .predict(&test_image(), owner, ImageSource::Upload)
            .await
            .unwrap();

        let crop = CropCoordinates {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
        };
        let err = h
            .pipeline
            .predict_with_crop(first.prediction_id, crop, &test_image(), Uuid::new_v4())
            .await
            .unwrap_err();

        assert!(matches!(err, PredictError::UnknownPrediction(_)));
    }

    #[actix_web::test]
    async fn persistence_failure_still_returns_a_result() {
        let classifier = Arc::new(ScriptedClassifier::new(&[(LeafClass::Tomato, 0.92)]));
        let pipeline = PredictionPipeline::new(
            ImageNormalizer::new(64, 64, 5 * 1024 * 1024, 85),
            classifier.clone(),
            Arc::new(StubDetector::returning(vec![blight_detection()])),
            Arc::new(FailingStore),
            Arc::new(MemoryImages),
            DedupCache::new(3600),
        );

        let response = pipeline
            .predict(&test_image(), Uuid::new_v4(), ImageSource::Upload)
            .await
            .unwrap();

        assert_eq!(response.disease, "Tomato_Blight_Severe");
        assert_eq!(response.final_status, FinalStatus::YoloDetected);
    }

    #[actix_web::test]
    async fn undecodable_image_is_rejected_before_inference() {
        let h = harness(
            ScriptedClassifier::new(&[(LeafClass::Tomato, 0.92)]),
            StubDetector::returning(vec![]),
            3600,
        );
        let err = h
            .pipeline
            .predict(b"not an image", Uuid::new_v4(), ImageSource::Upload)
            .await
            .unwrap_err();

        assert!(matches!(err, PredictError::Validation(_)));
        assert_eq!(h.classifier.call_count(), 0);
        assert_eq!(h.store.len(), 0);
    }
}
