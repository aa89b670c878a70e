//! 공통 에러 타입
//!
//! Bulwark 전체에서 사용되는 에러 타입을 정의합니다.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Bulwark 공통 에러
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────────
    // Authorization Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("access denied: {reason}")]
    AccessDenied { reason: String },

    #[error("invalid resource: {message}")]
    InvalidResource { message: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // Grant/Revoke Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("feature disabled: {feature}")]
    FeatureDisabled { feature: String },

    #[error("remote admin error: {message}")]
    Remote { message: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // Policy Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("policy parse error: {message}")]
    PolicyParse { message: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // IO/Serialization Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// 접근 거부 에러 생성
    pub fn access_denied(reason: impl Into<String>) -> Self {
        Error::AccessDenied {
            reason: reason.into(),
        }
    }

    /// 입력 검증 에러 생성
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    /// 접근 거부 여부
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Error::AccessDenied { .. })
    }

    /// HTTP 상태 코드로 변환
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Error::Validation { .. }
            | Error::InvalidResource { .. }
            | Error::PolicyParse { .. }
            | Error::Yaml(_) => 400,

            // 403 Forbidden
            Error::AccessDenied { .. } => 403,

            // 501 Not Implemented
            Error::FeatureDisabled { .. } => 501,

            // 502 Bad Gateway
            Error::Remote { .. } => 502,
        }
    }

    /// 에러 코드 (클라이언트용)
    pub fn code(&self) -> &'static str {
        match self {
            Error::AccessDenied { .. } => "ACCESS_DENIED",
            Error::InvalidResource { .. } => "INVALID_RESOURCE",
            Error::Validation { .. } => "VALIDATION_ERROR",
            Error::FeatureDisabled { .. } => "FEATURE_DISABLED",
            Error::Remote { .. } => "REMOTE_ADMIN_ERROR",
            Error::PolicyParse { .. } => "POLICY_PARSE_ERROR",
            Error::Yaml(_) => "YAML_ERROR",
        }
    }
}
