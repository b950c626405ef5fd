use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::core::{
    emotion::EmotionReading,
    personality::PersonalityResult,
    ranking::SimilarityResult,
    session::{BestMoment, Feedback},
};

/// JSON envelope shared by every endpoint.
///
/// Payload fields sit next to `success`, e.g.
/// `{"success": true, "emotion": {...}}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request succeeded
    pub success: bool,
    /// Payload on success
    #[serde(flatten)]
    pub data: Option<T>,
    /// Message on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Successful response carrying `data`
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = if self.success {
            StatusCode::OK
        } else {
            StatusCode::BAD_REQUEST
        };

        (status, Json(self)).into_response()
    }
}

/// Result of `POST /analyze-similarity`
#[derive(Debug, Serialize)]
pub struct SimilarityResponse {
    /// URL of the stored upload
    pub user_image: String,
    /// Best catalog matches
    pub similar_faces: Vec<SimilarityResult>,
    /// Personality read of the photo
    pub personality: PersonalityResult,
    /// Title derived from the match categories
    pub result_title: String,
}

/// Result of `POST /analyze-emotion-realtime`
#[derive(Debug, Serialize)]
pub struct EmotionResponse {
    /// Reading for the submitted frame
    pub emotion: EmotionReading,
}

/// Result of `POST /generate-practice-report`
#[derive(Debug, Serialize)]
pub struct ReportResponse {
    /// URL of the rendered timeline chart
    pub report_image: String,
    /// Feedback card
    pub feedback: Feedback,
    /// Highest-confidence frames
    pub best_moments: Vec<BestMoment>,
}

/// Result of `POST /save-best-frame`
#[derive(Debug, Serialize)]
pub struct SavedFrameResponse {
    /// URL of the saved frame
    pub image_path: String,
}

/// Result of `GET /api/health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Package name
    pub name: &'static str,
    /// Package version
    pub version: &'static str,
    /// Whether catalog embeddings are ready
    pub catalog_ready: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_fields_are_top_level() {
        let response = ApiResponse::success(SavedFrameResponse {
            image_path: "/static/uploads/results/best_frame.png".to_string(),
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": true,
                "image_path": "/static/uploads/results/best_frame.png"
            })
        );
    }
}
