//! 호스트 인증
//!
//! Bridge를 호출하는 호스트는 `x-bwk-api-key: {id}:{secret}` 또는
//! `Authorization: Bearer {id}:{secret}` 헤더로 자신을 증명해야 합니다.
//! 인증을 통과하기 전에는 identity 헤더(`x-bwk-user`, `x-bwk-groups`)를 읽지 않습니다.

use std::fmt;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::error::{BridgeError, Result};
use crate::state::AppState;

/// 호스트 API key 헤더
pub const API_KEY_HEADER: &str = "x-bwk-api-key";

/// 호스트 API key (`{id}:{secret}`)
#[derive(Clone)]
pub struct HostApiKey {
    pub id: String,
    secret: String,
}

impl HostApiKey {
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
        }
    }

    /// `{id}:{secret}` 파싱. secret에는 `:`가 들어갈 수 있습니다.
    pub fn from_header_value(value: &str) -> Option<Self> {
        let (id, secret) = value.trim().split_once(':')?;
        if id.is_empty() || secret.is_empty() {
            return None;
        }
        Some(Self::new(id, secret))
    }

    /// 제시된 key와 일치 여부 (secret은 상수 시간 비교)
    pub fn matches(&self, presented: &HostApiKey) -> bool {
        self.id == presented.id
            && bool::from(self.secret.as_bytes().ct_eq(presented.secret.as_bytes()))
    }
}

impl fmt::Debug for HostApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostApiKey")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// 헤더에서 호스트 key 추출 (`x-bwk-api-key` 우선, 다음 Bearer)
pub fn host_key_from_headers(headers: &HeaderMap) -> Option<HostApiKey> {
    if let Some(value) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        return HostApiKey::from_header_value(value);
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(HostApiKey::from_header_value)
}

/// 설정된 key 중 하나와 일치하는 key를 반환
///
/// 설정된 key가 없으면 모든 요청이 거부됩니다.
pub fn authenticate<'a>(keys: &'a [HostApiKey], headers: &HeaderMap) -> Result<&'a HostApiKey> {
    let presented = host_key_from_headers(headers).ok_or_else(|| BridgeError::Unauthorized {
        message: "No valid credentials provided".to_string(),
    })?;

    keys.iter()
        .find(|key| key.matches(&presented))
        .ok_or_else(|| BridgeError::Unauthorized {
            message: format!("Invalid api key '{}'", presented.id),
        })
}

/// 호스트 인증 미들웨어
pub async fn host_auth(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    // 개발 모드: 인증 우회
    if state.config.disable_auth {
        return next.run(req).await;
    }

    match authenticate(&state.config.api_keys, req.headers()) {
        Ok(key) => {
            tracing::debug!(key_id = %key.id, "host authenticated");
            next.run(req).await
        }
        Err(e) => {
            tracing::warn!("host authentication failed: {}", e);
            e.into_response()
        }
    }
}
