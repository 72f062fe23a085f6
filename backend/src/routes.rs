use actix_files::Files;
use actix_multipart::{Field, Multipart, MultipartError};
use actix_web::{error::InternalError, web, HttpRequest, HttpResponse};
use futures::TryStreamExt;
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::Value;
use shared::{
    DiagnosisResponse, ErrorResponse, NewsArticle, NewsErrorResponse, NewsResponse,
    PredictionResponse,
};
use std::path::PathBuf;

use crate::diagnosis::prompt::{build_prompt, DEFAULT_PLANT_TYPE};
use crate::diagnosis::report::normalize_report;
use crate::diagnosis::{ImageInput, VisionError, VisionModel};
use crate::news::{NewsError, NewsService};
use crate::storage::upload_service::{UploadError, UploadService};
use crate::yield_model::{PredictionError, YieldPredictor};

pub const NO_IMAGE_ERROR: &str = "No image uploaded";

pub fn configure_routes(cfg: &mut web::ServiceConfig, upload_dir: PathBuf) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/predict").route(web::post().to(predict)))
        .service(web::resource("/predictdisease").route(web::post().to(predict_disease)))
        .service(web::resource("/api/v1/news").route(web::get().to(latest_news)))
        .service(
            web::resource("/api/v1/news/category/{category}")
                .route(web::get().to(news_by_category)),
        )
        .service(web::resource("/api/v1/news/search").route(web::get().to(search_news)))
        .service(Files::new("/uploads", upload_dir));
}

fn json_error_handler(err: actix_web::error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    warn!("Rejected JSON payload: {}", err);
    let response = HttpResponse::BadRequest().json(ErrorResponse::new(format!("Invalid JSON body: {}", err)));
    InternalError::from_response(err, response).into()
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

async fn predict(predictor: web::Data<YieldPredictor>, body: web::Json<Value>) -> HttpResponse {
    let record = match body.into_inner() {
        Value::Object(record) => record,
        other => {
            warn!("Prediction body is not a JSON object: {}", other);
            return HttpResponse::BadRequest()
                .json(ErrorResponse::new("Expected a JSON object of feature values"));
        }
    };

    match predictor.predict(&record) {
        Ok(predicted_yield) => {
            info!("Predicted yield {} from {} fields", predicted_yield, record.len());
            HttpResponse::Ok().json(PredictionResponse { predicted_yield })
        }
        Err(PredictionError::Feature(e)) => {
            warn!("Rejected prediction input: {}", e);
            HttpResponse::BadRequest().json(ErrorResponse::new(e.to_string()))
        }
        Err(e) => {
            error!("Model inference error: {:?}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::new("Prediction failed"))
        }
    }
}

#[derive(Debug)]
struct UploadedFile {
    file_name: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct DiagnosisForm {
    image: Option<UploadedFile>,
    plant_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum FormError {
    #[error("Invalid multipart payload: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Field '{field}' exceeds {limit} bytes")]
    TooLarge { field: String, limit: usize },
}

/// `plantType` and any other text field are small; only the image may use the upload cap.
const MAX_TEXT_FIELD_BYTES: usize = 1024;

async fn read_field(field: &mut Field, name: &str, limit: usize) -> Result<Vec<u8>, FormError> {
    let mut data = Vec::new();
    while let Some(chunk) = field.try_next().await? {
        if data.len() + chunk.len() > limit {
            return Err(FormError::TooLarge {
                field: name.to_string(),
                limit,
            });
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

async fn read_diagnosis_form(mut payload: Multipart, limit: usize) -> Result<DiagnosisForm, FormError> {
    let mut form = DiagnosisForm::default();

    loop {
        let mut field = match payload.try_next().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            // A body that is not multipart at all carries no image part.
            Err(
                e @ (MultipartError::ContentTypeMissing
                | MultipartError::ContentTypeParse
                | MultipartError::ContentTypeIncompatible
                | MultipartError::BoundaryMissing),
            ) => {
                log::debug!("Diagnosis body is not multipart: {}", e);
                return Ok(form);
            }
            Err(e) => return Err(e.into()),
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let file_name = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .map(str::to_string);
                let bytes = read_field(&mut field, &name, limit).await?;
                form.image = Some(UploadedFile { file_name, bytes });
            }
            "plantType" => {
                let data = read_field(&mut field, &name, MAX_TEXT_FIELD_BYTES).await?;
                form.plant_type = Some(String::from_utf8_lossy(&data).into_owned());
            }
            other => {
                log::debug!("Ignoring multipart field '{}'", other);
                while field.try_next().await?.is_some() {}
            }
        }
    }

    Ok(form)
}

async fn predict_disease(
    vision: web::Data<dyn VisionModel>,
    uploads: web::Data<UploadService>,
    payload: Multipart,
) -> HttpResponse {
    let form = match read_diagnosis_form(payload, uploads.max_size()).await {
        Ok(form) => form,
        Err(e @ FormError::TooLarge { .. }) => {
            warn!("{}", e);
            return HttpResponse::PayloadTooLarge().json(ErrorResponse::new(e.to_string()));
        }
        Err(e) => {
            warn!("{}", e);
            return HttpResponse::BadRequest().json(ErrorResponse::new(e.to_string()));
        }
    };

    let upload = match form.image.filter(|file| !file.bytes.is_empty()) {
        Some(upload) => upload,
        None => {
            warn!("Diagnosis request without an image");
            return HttpResponse::BadRequest().json(ErrorResponse::new(NO_IMAGE_ERROR));
        }
    };
    let plant_type = form
        .plant_type
        .unwrap_or_else(|| DEFAULT_PLANT_TYPE.to_string());

    info!(
        "Diagnosis request for plant type '{}' (client file {:?}, {} bytes)",
        plant_type,
        upload.file_name,
        upload.bytes.len()
    );

    let service = uploads.clone();
    let bytes = upload.bytes;
    let stored = web::block(move || {
        let image = service.validate_image(bytes)?;
        let stored = service.save(&image)?;
        Ok::<_, UploadError>((image, stored))
    })
    .await;

    let (image, stored) = match stored {
        Ok(Ok(saved)) => saved,
        Ok(Err(e)) => return upload_error_response(e),
        Err(e) => {
            error!("Upload worker failed: {:?}", e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::new("Failed to store upload"));
        }
    };
    info!("Saved diagnosis image as {}", stored.path.display());

    let prompt = build_prompt(&plant_type);
    let input = ImageInput {
        mime_type: image.mime_type(),
        data: &image.bytes,
    };

    match vision.generate(&prompt, input).await {
        Ok(text) => HttpResponse::Ok().json(DiagnosisResponse {
            result: normalize_report(&text),
            plant_type,
        }),
        Err(e) => vision_error_response(e),
    }
}

fn upload_error_response(err: UploadError) -> HttpResponse {
    match err {
        UploadError::FileTooLarge { .. } => {
            warn!("{}", err);
            HttpResponse::PayloadTooLarge().json(ErrorResponse::new(err.to_string()))
        }
        UploadError::InvalidImage(_) | UploadError::UnsupportedFormat => {
            warn!("Rejected upload: {}", err);
            HttpResponse::BadRequest()
                .json(ErrorResponse::new("Uploaded file is not a valid image"))
        }
        UploadError::Io(_) => {
            error!("Failed to store upload: {}", err);
            HttpResponse::InternalServerError().json(ErrorResponse::new("Failed to store upload"))
        }
    }
}

fn vision_error_response(err: VisionError) -> HttpResponse {
    match err {
        VisionError::NotConfigured => {
            error!("{}", err);
            HttpResponse::ServiceUnavailable()
                .json(ErrorResponse::new("Diagnosis service is not configured"))
        }
        _ => {
            error!("Vision model error: {}", err);
            HttpResponse::BadGateway().json(ErrorResponse::new(format!(
                "Failed to get diagnosis: {}",
                err
            )))
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

fn news_response(
    result: Result<Vec<NewsArticle>, NewsError>,
    category: Option<String>,
    query: Option<String>,
    failure_message: String,
) -> HttpResponse {
    match result {
        Ok(articles) => HttpResponse::Ok().json(NewsResponse {
            success: true,
            count: articles.len(),
            category,
            query,
            articles,
        }),
        Err(e) => {
            error!("{}: {}", failure_message, e);
            HttpResponse::InternalServerError().json(NewsErrorResponse {
                success: false,
                message: failure_message,
                error: Some(e.to_string()),
            })
        }
    }
}

async fn latest_news(news: web::Data<NewsService>) -> HttpResponse {
    let result = news.fetch(None).await;
    news_response(result, None, None, "Failed to fetch news".to_string())
}

async fn news_by_category(news: web::Data<NewsService>, path: web::Path<String>) -> HttpResponse {
    let category = path.into_inner().to_lowercase();
    let result = news.fetch(Some(category.as_str())).await;
    let message = format!("Failed to fetch {} news", category);
    news_response(result, Some(category), None, message)
}

async fn search_news(news: web::Data<NewsService>, query: web::Query<SearchQuery>) -> HttpResponse {
    let q = match query.into_inner().q.filter(|q| !q.trim().is_empty()) {
        Some(q) => q,
        None => {
            return HttpResponse::BadRequest().json(NewsErrorResponse {
                success: false,
                message: "Search query is required".to_string(),
                error: None,
            });
        }
    };
    let result = news.fetch(Some(q.as_str())).await;
    news_response(result, None, Some(q), "Failed to search news".to_string())
}
