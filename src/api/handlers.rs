use axum::{
    body::Bytes,
    extract::{Multipart, State},
    Json,
};
use image::ImageFormat;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    core::{
        chart::render_timeline,
        emotion::{classify_or_neutral, EmotionReading},
        personality::{score_personality, PersonalityResult},
        ranking::{rank, BlendedLabel, SimilarityResult},
        session::{
            best_moments, build_feedback, build_timeline, SessionRecord, DEFAULT_BEST_MOMENTS,
        },
    },
    error::{AppError, Result, ResultExt},
    utils::{decode_data_url, generate_filename, timestamped_filename, validate_file_extension},
    AppState,
};

use super::responses::{
    ApiResponse, EmotionResponse, HealthResponse, ReportResponse, SavedFrameResponse,
    SimilarityResponse,
};

/// Base64 frame sent by the webcam page
#[derive(Debug, Deserialize)]
pub struct FramePayload {
    /// Data URL or bare base64
    pub image: String,
}

/// Accumulated practice session
#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    /// Per-frame records in capture order
    #[serde(default)]
    pub emotion_history: Vec<SessionRecord>,
}

/// Match an uploaded photo against the animal catalog.
pub async fn analyze_similarity(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<ApiResponse<SimilarityResponse>> {
    let mut upload: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("").to_string();
        let content = field.bytes().await?;
        upload = Some((file_name, content));
    }

    let (file_name, content) =
        upload.ok_or_else(|| AppError::InvalidInput("이미지가 없습니다".to_string()))?;
    if file_name.is_empty() {
        return Err(AppError::InvalidInput("파일이 선택되지 않았습니다".to_string()));
    }
    if !validate_file_extension(&file_name, &state.config.allowed_extensions) {
        return Err(AppError::InvalidInput("유효하지 않은 파일 형식".to_string()));
    }
    if content.len() > state.config.max_upload_size {
        return Err(AppError::Validation(format!(
            "File exceeds the {} byte upload limit",
            state.config.max_upload_size
        )));
    }

    let path = state.config.upload_dir().join(timestamped_filename(&file_name));
    write_artifact(&path, &content).await?;
    log::info!("Stored upload {}", path.display());

    let user_image = state.config.public_url(&path);
    let worker = Arc::clone(&state);
    let (similar_faces, label, personality) =
        tokio::task::spawn_blocking(move || match_animals(&worker, &path)).await??;

    Ok(ApiResponse::success(SimilarityResponse {
        user_image,
        similar_faces,
        personality,
        result_title: label.title().to_string(),
    }))
}

fn match_animals(
    state: &AppState,
    path: &Path,
) -> Result<(Vec<SimilarityResult>, BlendedLabel, PersonalityResult)> {
    let embedder = state.embedder.as_ref();
    let catalog = state.catalog.get_or_build(embedder);
    if catalog.is_empty() {
        return Err(AppError::EmptyCatalog);
    }

    let query = embedder
        .embed_image(path)
        .map_err(|e| AppError::Analysis(e.to_string()))?;

    let mut results = rank(&query, catalog, state.config.top_k);
    for result in &mut results {
        result.image = state.config.public_url(Path::new(&result.image));
    }
    let label = BlendedLabel::from_results(&results);

    let personality =
        score_personality(&query, embedder).map_err(|e| AppError::Analysis(e.to_string()))?;

    Ok((results, label, personality))
}

/// Emotion reading for one webcam frame; never fails on model errors.
pub async fn analyze_emotion_realtime(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<FramePayload>,
) -> Result<ApiResponse<EmotionResponse>> {
    let bytes = decode_data_url(&payload.image)?;
    let extension = image_extension(&bytes).unwrap_or("jpg");
    let path = state
        .config
        .upload_dir()
        .join(format!("frame_{}.{}", Uuid::new_v4(), extension));
    write_artifact(&path, &bytes).await?;

    let worker = Arc::clone(&state);
    let emotion: EmotionReading = tokio::task::spawn_blocking(move || {
        let reading = classify_or_neutral(worker.classifier.as_ref(), &path);
        if let Err(e) = std::fs::remove_file(&path) {
            log::warn!("Failed to remove temporary frame {}: {}", path.display(), e);
        }
        reading
    })
    .await?;

    Ok(ApiResponse::success(EmotionResponse { emotion }))
}

/// Feedback, best moments and a timeline chart for a finished session.
pub async fn generate_practice_report(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ReportRequest>,
) -> Result<ApiResponse<ReportResponse>> {
    let history = request.emotion_history;
    if history.is_empty() {
        return Err(AppError::InvalidInput("데이터가 없습니다".to_string()));
    }

    let feedback = build_feedback(&history);
    let best_moments = best_moments(&history, DEFAULT_BEST_MOMENTS);
    let timeline = build_timeline(&history);

    let result_dir = state.config.result_dir();
    crate::utils::ensure_dir_exists(&result_dir)?;
    let path = result_dir.join(generate_filename("report", "png"));
    let chart_path = path.clone();
    tokio::task::spawn_blocking(move || render_timeline(&timeline, &chart_path)).await??;
    log::info!("Generated practice report {}", path.display());

    Ok(ApiResponse::success(ReportResponse {
        report_image: state.config.public_url(&path),
        feedback,
        best_moments,
    }))
}

/// Persist a best-moment frame exactly as received.
pub async fn save_best_frame(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<FramePayload>,
) -> Result<ApiResponse<SavedFrameResponse>> {
    let bytes = decode_data_url(&payload.image)?;
    let extension = image_extension(&bytes)
        .ok_or_else(|| AppError::InvalidInput("Payload is not a PNG or JPEG image".to_string()))?;

    let path: PathBuf = state
        .config
        .result_dir()
        .join(generate_filename("best_frame", extension));
    write_artifact(&path, &bytes).await?;

    Ok(ApiResponse::success(SavedFrameResponse {
        image_path: state.config.public_url(&path),
    }))
}

/// Service name, version and catalog readiness
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        name: crate::built_info::PKG_NAME,
        version: crate::built_info::PKG_VERSION,
        catalog_ready: state.catalog.is_built(),
    })
}

fn image_extension(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("png"),
        ImageFormat::Jpeg => Some("jpg"),
        _ => None,
    }
}

async fn write_artifact(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extension() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0];
        assert_eq!(image_extension(&png), Some("png"));
        assert_eq!(image_extension(&jpeg), Some("jpg"));
        assert_eq!(image_extension(b"hello world"), None);
    }
}
