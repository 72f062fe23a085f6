use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use backend::config::ServerConfig;
use backend::diagnosis::gemini_service::GeminiClient;
use backend::diagnosis::VisionModel;
use backend::news::NewsService;
use backend::routes::configure_routes;
use backend::storage::upload_service::UploadService;
use backend::yield_model::YieldPredictor;
use std::env;
use std::sync::Arc;

fn startup_error(context: &str, err: impl std::fmt::Debug) -> std::io::Error {
    log::error!("{}: {:?}", context, err);
    std::io::Error::other(format!("{}: {:?}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = ServerConfig::load().map_err(|e| startup_error("Invalid configuration", e))?;

    let predictor = YieldPredictor::load(&config.model)
        .map_err(|e| startup_error("Model loading failed", e))?;

    std::fs::create_dir_all(&config.uploads.dir)?;
    let upload_service = UploadService::new(config.uploads.dir.clone(), config.uploads.max_bytes);

    let gemini = GeminiClient::new(&config.gemini)
        .map_err(|e| startup_error("Failed to build vision model client", e))?;
    if gemini.is_configured() {
        log::info!("Vision model {} configured", config.gemini.model);
    } else {
        log::warn!("GEMINI_API_KEY is not set; /predictdisease will answer 503 until it is");
    }
    let vision: Arc<dyn VisionModel> = Arc::new(gemini);

    let news_service = NewsService::new(&config.news.feed_url)
        .map_err(|e| startup_error("Invalid news feed URL", e))?;

    let bind_address = config.bind_address();
    let cors_origin = config.cors_origin.clone();
    let upload_dir = config.uploads.dir.clone();

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        let cors = match &cors_origin {
            Some(origin) => Cors::default().allowed_origin(origin).supports_credentials(),
            None => Cors::default().allow_any_origin(),
        }
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![
            actix_web::http::header::ACCEPT,
            actix_web::http::header::CONTENT_TYPE,
        ])
        .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(predictor.clone()))
            .app_data(web::Data::from(vision.clone()))
            .app_data(web::Data::new(upload_service.clone()))
            .app_data(web::Data::new(news_service.clone()))
            .configure(|cfg| configure_routes(cfg, upload_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
