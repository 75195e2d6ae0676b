// HTTP entry point for the comic panel translation pipeline

use comic_workflow::{
    core::{config::Config, errors::PipelineError, types::*},
    orchestration::PipelineController,
    services::engines::EngineCaches,
    utils::image_ops,
};

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// One uploaded image and its processing session
struct ImageEntry {
    session: PipelineSession,
    source_language: String,
    target_language: String,
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    controller: Arc<PipelineController>,
    images: Arc<DashMap<String, Arc<Mutex<ImageEntry>>>>,
}

type ApiError = (StatusCode, String);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Arc::new(Config::new()?);

    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::new(format!(
        "comic_workflow={}",
        match config.server.log_level {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== COMIC PANEL TRANSLATION PIPELINE ===");

    let caches = Arc::new(EngineCaches::new());
    let controller = Arc::new(PipelineController::new(&config, Arc::clone(&caches)));

    let state = AppState {
        controller,
        images: Arc::new(DashMap::new()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/v1/upload", post(upload_image))
        .route("/api/v1/detect-blocks/:image_id", post(detect_blocks))
        .route("/api/v1/ocr/:image_id", post(ocr_image))
        .route("/api/v1/translate/:image_id", post(translate_image))
        .route("/api/v1/inpaint/:image_id", post(inpaint_image))
        .route("/api/v1/render/:image_id", post(render_image))
        .route("/api/v1/translate-all/:image_id", post(translate_all))
        .route("/api/v1/status/:image_id", get(image_status))
        .route("/api/v1/result/:image_id", get(image_result))
        .with_state(state)
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024))
        .layer(cors);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn blocks_of(session: &PipelineSession) -> Vec<TextBlockData> {
    session
        .regions
        .iter()
        .enumerate()
        .map(|(i, region)| TextBlockData::from_region(i, region))
        .collect()
}

fn entry_of(state: &AppState, image_id: &str) -> Result<Arc<Mutex<ImageEntry>>, ApiError> {
    state
        .images
        .get(image_id)
        .map(|entry| Arc::clone(entry.value()))
        .ok_or((StatusCode::NOT_FOUND, "Image not found".to_string()))
}

fn pipeline_error(e: PipelineError) -> ApiError {
    match e {
        PipelineError::PrerequisiteMissing { .. } => (StatusCode::BAD_REQUEST, e.to_string()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Upload an image with its language pair; returns the session id used by
/// every step endpoint.
async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    let mut image = None;
    let mut source_language = None;
    let mut target_language = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, format!("Read error: {}", e)))?;
                let decoded = image::load_from_memory(&data)
                    .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid image: {}", e)))?;
                image = Some(decoded.to_rgba8());
            }
            "source_language" => {
                source_language = field.text().await.ok();
            }
            "target_language" => {
                target_language = field.text().await.ok();
            }
            _ => {}
        }
    }

    let image = image.ok_or((StatusCode::BAD_REQUEST, "No file provided".to_string()))?;
    let image_id = uuid::Uuid::new_v4().to_string();

    let entry = ImageEntry {
        session: PipelineSession::new(image),
        source_language: source_language.unwrap_or_else(|| "Japanese".to_string()),
        target_language: target_language.unwrap_or_else(|| "English".to_string()),
    };
    state
        .images
        .insert(image_id.clone(), Arc::new(Mutex::new(entry)));

    info!("uploaded image {}", image_id);

    Ok(Json(ProcessResponse {
        image_id,
        blocks: Vec::new(),
        status: "uploaded".to_string(),
    }))
}

async fn detect_blocks(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let entry = entry_of(&state, &image_id)?;
    let mut entry = entry.lock().await;

    state
        .controller
        .detect(&mut entry.session)
        .await
        .map_err(pipeline_error)?;

    Ok(Json(ProcessResponse {
        image_id,
        blocks: blocks_of(&entry.session),
        status: entry.session.status_str().to_string(),
    }))
}

async fn ocr_image(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let entry = entry_of(&state, &image_id)?;
    let mut entry = entry.lock().await;
    let source = entry.source_language.clone();

    state
        .controller
        .recognize(&mut entry.session, &source)
        .await
        .map_err(pipeline_error)?;

    Ok(Json(ProcessResponse {
        image_id,
        blocks: blocks_of(&entry.session),
        status: entry.session.status_str().to_string(),
    }))
}

#[derive(Debug, Deserialize, Default)]
struct TranslateBody {
    #[serde(default)]
    extra_context: String,
}

async fn translate_image(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
    body: Option<Json<TranslateBody>>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let entry = entry_of(&state, &image_id)?;
    let mut entry = entry.lock().await;
    let source = entry.source_language.clone();
    let target = entry.target_language.clone();
    let extra_context = body.map(|b| b.0.extra_context).unwrap_or_default();

    state
        .controller
        .translate(&mut entry.session, &source, &target, &extra_context)
        .await
        .map_err(pipeline_error)?;

    Ok(Json(ProcessResponse {
        image_id,
        blocks: blocks_of(&entry.session),
        status: entry.session.status_str().to_string(),
    }))
}

#[derive(Debug, Deserialize, Default)]
struct InpaintBody {
    #[serde(default)]
    use_gpu: bool,
}

async fn inpaint_image(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
    body: Option<Json<InpaintBody>>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let entry = entry_of(&state, &image_id)?;
    let mut entry = entry.lock().await;
    let use_gpu = body.map(|b| b.0.use_gpu).unwrap_or(false);

    state
        .controller
        .inpaint(&mut entry.session, use_gpu)
        .await
        .map_err(pipeline_error)?;

    Ok(Json(ProcessResponse {
        image_id,
        blocks: blocks_of(&entry.session),
        status: entry.session.status_str().to_string(),
    }))
}

async fn render_image(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let entry = entry_of(&state, &image_id)?;
    let mut entry = entry.lock().await;

    state
        .controller
        .render(&mut entry.session)
        .map_err(pipeline_error)?;

    Ok(Json(ProcessResponse {
        image_id,
        blocks: blocks_of(&entry.session),
        status: entry.session.status_str().to_string(),
    }))
}

#[derive(Debug, Deserialize, Default)]
struct TranslateAllBody {
    #[serde(default)]
    extra_context: String,
    #[serde(default)]
    use_gpu: bool,
}

/// Kick off the full pipeline as a background unit of work; poll
/// `/status/:image_id` to follow progress.
async fn translate_all(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
    body: Option<Json<TranslateAllBody>>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let entry = entry_of(&state, &image_id)?;
    let params = body.map(|b| b.0).unwrap_or_default();
    let controller = Arc::clone(&state.controller);
    let task_id = image_id.clone();

    tokio::spawn(async move {
        let mut entry = entry.lock().await;
        let source = entry.source_language.clone();
        let target = entry.target_language.clone();

        if let Err(e) = controller
            .run_session(
                &mut entry.session,
                &source,
                &target,
                &params.extra_context,
                params.use_gpu,
            )
            .await
        {
            error!("full pipeline failed for {}: {}", task_id, e);
        }
    });

    Ok(Json(ProcessResponse {
        image_id,
        blocks: Vec::new(),
        status: "processing".to_string(),
    }))
}

async fn image_status(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let entry = entry_of(&state, &image_id)?;
    let entry = entry.lock().await;

    Ok(Json(serde_json::json!({
        "image_id": image_id,
        "status": entry.session.status_str(),
        "blocks": blocks_of(&entry.session),
        "error": entry.session.last_error,
    })))
}

/// Download the latest image produced for this session: the rendered image
/// once rendering completed, the inpainted one before that.
async fn image_result(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = entry_of(&state, &image_id)?;
    let entry = entry.lock().await;

    let image = entry
        .session
        .rendered
        .as_ref()
        .or(entry.session.inpainted.as_ref())
        .cloned()
        .ok_or((StatusCode::NOT_FOUND, "No processed image yet".to_string()))?;
    drop(entry);

    let png = image_ops::encode_png_async(image)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(([(axum::http::header::CONTENT_TYPE, "image/png")], png))
}
