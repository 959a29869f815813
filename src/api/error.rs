//! JSON error envelope shared by all handlers

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::domain::ProductConfigError;
use crate::engine::{CompositorError, EditorError, FontError, SessionError, TextureError};

/// Error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ApiError,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        ErrorResponse {
            success: false,
            error: ApiError {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }
}

/// Build an error response with the given status
pub fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse::new(code, message))
}

fn config_error_code(e: &ProductConfigError) -> &'static str {
    match e {
        ProductConfigError::UnknownModel(_) => "MODEL_NOT_FOUND",
        ProductConfigError::WidthNotAllowed { .. } => "INVALID_CONFIG",
        ProductConfigError::LengthNotAllowed { .. } => "INVALID_CONFIG",
        ProductConfigError::UnknownMaterial { .. } => "MATERIAL_NOT_FOUND",
    }
}

/// Status and code for a session operation failure
fn classify(e: &SessionError) -> (StatusCode, &'static str) {
    match e {
        SessionError::Config(e) => (StatusCode::BAD_REQUEST, config_error_code(e)),
        SessionError::Editor(e) => match e {
            EditorError::EmptyText => (StatusCode::BAD_REQUEST, "EMPTY_TEXT"),
            EditorError::Font(FontError::NotInstalled(_)) => (StatusCode::BAD_REQUEST, "FONT_NOT_INSTALLED"),
            EditorError::Font(_) => (StatusCode::INTERNAL_SERVER_ERROR, "FONT_UNAVAILABLE"),
            EditorError::InvalidColor(_) => (StatusCode::BAD_REQUEST, "INVALID_COLOR"),
            EditorError::ImageDecode(_) => (StatusCode::BAD_REQUEST, "INVALID_IMAGE"),
            EditorError::ObjectNotFound(_) => (StatusCode::NOT_FOUND, "OBJECT_NOT_FOUND"),
            EditorError::NothingSelected => (StatusCode::CONFLICT, "NOTHING_SELECTED"),
        },
        SessionError::Texture(TextureError::Unavailable { .. }) => {
            (StatusCode::SERVICE_UNAVAILABLE, "TEXTURE_UNAVAILABLE")
        }
        SessionError::Texture(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TEXTURE_ERROR"),
        SessionError::Compositor(CompositorError::InvalidData(_) | CompositorError::DecodeFailed(_)) => {
            (StatusCode::BAD_REQUEST, "INVALID_IMAGE")
        }
        SessionError::Compositor(_) => (StatusCode::INTERNAL_SERVER_ERROR, "COMPOSITE_FAILED"),
        SessionError::Preview(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PREVIEW_CLOSED"),
        SessionError::EditorClosed => (StatusCode::CONFLICT, "EDITOR_NOT_OPEN"),
        SessionError::NotFound(_) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND"),
        SessionError::Capacity(_) => (StatusCode::SERVICE_UNAVAILABLE, "SESSION_LIMIT_REACHED"),
        SessionError::TaskFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TASK_FAILED"),
    }
}

/// Log and convert a session error into its JSON response
pub fn session_error(e: SessionError) -> HttpResponse {
    let (status, code) = classify(&e);
    error!(code = code, error = %e, "Session request failed");
    error_response(status, code, e.to_string())
}

/// Log and convert a configuration error into its JSON response
pub fn config_error(e: ProductConfigError) -> HttpResponse {
    let code = config_error_code(&e);
    let status = match &e {
        ProductConfigError::UnknownModel(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    };
    error!(code = code, error = %e, "Invalid configuration");
    error_response(status, code, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_session_errors_map_to_codes() {
        assert_eq!(
            classify(&SessionError::NotFound(Uuid::nil())),
            (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND")
        );
        assert_eq!(
            classify(&SessionError::Editor(EditorError::NothingSelected)),
            (StatusCode::CONFLICT, "NOTHING_SELECTED")
        );
        assert_eq!(
            classify(&SessionError::Capacity(1)).0,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            classify(&SessionError::TaskFailed("panicked".to_string())),
            (StatusCode::INTERNAL_SERVER_ERROR, "TASK_FAILED")
        );
    }

    #[test]
    fn test_error_body_shape() {
        let body = serde_json::to_value(ErrorResponse::new("INVALID_CONFIG", "bad width")).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "INVALID_CONFIG");
        assert_eq!(body["error"]["message"], "bad width");
    }
}
