use actix_web::{HttpResponse, web};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::error;
use serde::Serialize;
use shared::{CropPredictRequest, ImageSource, PredictRequest};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::db::PredictionStore;
use crate::pipeline::{PredictError, PredictionPipeline};

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/predict").route(web::post().to(predict)))
        .service(web::resource("/api/predict/crop").route(web::post().to(predict_crop)))
        .service(web::resource("/api/predictions/{prediction_id}").route(web::get().to(get_prediction)));
}

/// Accepts raw base64 or a browser-style data URL; everything before the
/// first comma of a `data:` payload is the media-type preamble.
fn decode_image_payload(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let encoded = if payload.starts_with("data:") {
        payload.split_once(',').map(|(_, rest)| rest).unwrap_or(payload)
    } else {
        payload
    };
    STANDARD.decode(encoded.trim())
}

fn predict_error_response(e: PredictError) -> HttpResponse {
    match e {
        PredictError::Validation(_) | PredictError::UnknownPrediction(_) => {
            HttpResponse::BadRequest().json(ErrorResponse {
                error: e.to_string(),
            })
        }
        PredictError::Classification(_) | PredictError::Store(_) => {
            error!("prediction failed: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Prediction failed".into(),
            })
        }
    }
}

async fn predict(
    caller: CallerIdentity,
    pipeline: web::Data<Arc<PredictionPipeline>>,
    request: web::Json<PredictRequest>,
) -> HttpResponse {
    let request = request.into_inner();
    let image = match decode_image_payload(&request.image) {
        Ok(image) => image,
        Err(e) => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: format!("Invalid base64 image payload: {}", e),
            });
        }
    };
    let source = request.source.unwrap_or(ImageSource::Upload);

    match pipeline.predict(&image, caller.0, source).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => predict_error_response(e),
    }
}

async fn predict_crop(
    caller: CallerIdentity,
    pipeline: web::Data<Arc<PredictionPipeline>>,
    request: web::Json<CropPredictRequest>,
) -> HttpResponse {
    let request = request.into_inner();
    let image = match decode_image_payload(&request.cropped_image) {
        Ok(image) => image,
        Err(e) => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: format!("Invalid base64 image payload: {}", e),
            });
        }
    };

    match pipeline
        .predict_with_crop(
            request.prediction_id,
            request.crop_coordinates,
            &image,
            caller.0,
        )
        .await
    {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => predict_error_response(e),
    }
}

async fn get_prediction(
    caller: CallerIdentity,
    store: web::Data<Arc<dyn PredictionStore>>,
    path: web::Path<String>,
) -> HttpResponse {
    let prediction_id = match Uuid::parse_str(&path.into_inner()) {
        Ok(id) => id,
        Err(_) => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: "Invalid prediction id".into(),
            });
        }
    };

    match store.get(caller.0, prediction_id).await {
        Ok(Some(record)) => HttpResponse::Ok().json(record),
        Ok(None) => HttpResponse::NotFound().json(ErrorResponse {
            error: format!("Prediction {} not found", prediction_id),
        }),
        Err(e) => {
            error!("failed to fetch prediction {}: {}", prediction_id, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to fetch prediction".into(),
            })
        }
    }
}
