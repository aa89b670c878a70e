//! Bridge 에러 타입

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Bridge 에러
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("core error: {0}")]
    Core(#[from] bwk_core::Error),
}

/// 에러 응답 JSON
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl BridgeError {
    /// 상태 코드, 에러 코드, 메시지
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            BridgeError::Unauthorized { message } => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message.clone())
            }
            BridgeError::NotFound { message } => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", message.clone())
            }
            BridgeError::Core(e) => {
                let status = StatusCode::from_u16(e.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() {
                    tracing::error!("Core error: {}", e);
                }
                (status, e.code(), e.to_string())
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.parts().0
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                request_id: crate::middleware::current_request_id(),
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_status() {
        let err: BridgeError = bwk_core::Error::access_denied("nope").into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let err: BridgeError = bwk_core::Error::FeatureDisabled {
            feature: "grant".to_string(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::NOT_IMPLEMENTED);

        let err = BridgeError::Unauthorized {
            message: "missing x-bwk-user".to_string(),
        };
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
