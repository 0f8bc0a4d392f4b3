mod auth;
mod cache;
mod config;
mod db;
mod imaging;
mod inference;
mod pipeline;
mod routes;
mod storage;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use auth::jwt::JwtService;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_s3::Client as S3Client;
use cache::DedupCache;
use config::PipelineConfig;
use db::PredictionStore;
use db::prediction_repository::DynamoDbPredictionStore;
use imaging::ImageNormalizer;
use inference::classifier::LeafClassifier;
use inference::detector::DiseaseDetector;
use pipeline::PredictionPipeline;
use routes::configure_routes;
use std::env;
use std::sync::Arc;
use storage::s3_service::S3ImageStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv::dotenv().ok();

    let config = PipelineConfig::load().map_err(|e| {
        std::io::Error::other(format!("Failed to load pipeline config: {}", e))
    })?;

    let classifier = LeafClassifier::load(&config.models.classifier_path).map_err(|e| {
        std::io::Error::other(format!("Classifier loading failed: {:?}", e))
    })?;
    let detector = DiseaseDetector::load(
        &config.models.detector_path,
        config.models.detector_confidence_threshold,
    )
    .map_err(|e| std::io::Error::other(format!("Detector loading failed: {:?}", e)))?;
    log::info!("Both models loaded");

    let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
    let dynamodb_client = DynamoDbClient::new(&aws_config);
    let s3_client = S3Client::new(&aws_config);

    let predictions_table = env::var("DYNAMODB_PREDICTIONS_TABLE").unwrap().to_string();
    let s3_bucket = env::var("S3_BUCKET_NAME").unwrap().to_string();
    let jwt_secret = env::var("JWT_SECRET").unwrap().to_string();

    let store: Arc<dyn PredictionStore> =
        Arc::new(DynamoDbPredictionStore::new(dynamodb_client, predictions_table));
    let images = Arc::new(S3ImageStore::new(s3_client, s3_bucket));
    let jwt_service = JwtService::new(&jwt_secret);

    let normalizer = ImageNormalizer::new(
        config.normalize.width,
        config.normalize.height,
        config.normalize.max_upload_bytes,
        config.normalize.jpeg_quality,
    );
    let pipeline = Arc::new(PredictionPipeline::new(
        normalizer,
        Arc::new(classifier),
        Arc::new(detector),
        store.clone(),
        images,
        DedupCache::new(config.cache.dedup_ttl_secs),
    ));

    let port = env::var("PORT").unwrap_or_else(|_| "8081".to_string());
    let bind_address = format!("0.0.0.0:{}", port);
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(web::Data::new(pipeline.clone()))
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(jwt_service.clone()))
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
