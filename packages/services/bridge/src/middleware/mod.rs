//! Bridge 미들웨어
//!
//! 요청 ID 부여와 호출자 identity 설치를 담당합니다.

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use bwk_core::identity::{CallContext, Identity};
use uuid::Uuid;

use crate::error::BridgeError;

/// 호출자 이름 헤더
pub const USER_HEADER: &str = "x-bwk-user";

/// 호출자 그룹 헤더 (콤마 구분)
pub const GROUPS_HEADER: &str = "x-bwk-groups";

#[derive(Clone, Debug)]
pub struct RequestId(#[allow(dead_code)] pub String);

tokio::task_local! {
    static REQUEST_ID: String;
}

pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|id| id.clone()).ok()
}

pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = Uuid::new_v4().to_string();
    req.extensions_mut().insert(RequestId(id.clone()));
    let mut resp = REQUEST_ID.scope(id.clone(), async move { next.run(req).await }).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        resp.headers_mut().insert("x-request-id", value);
    }
    resp
}

/// 헤더에서 호출 컨텍스트 추출
pub fn call_context_from_headers(headers: &HeaderMap) -> Option<CallContext> {
    let user = headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())?;

    let groups = headers
        .get(GROUPS_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(crate::config::parse_list)
        .unwrap_or_default();

    let remote_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Some(
        CallContext::new(Identity::new(user).with_groups(groups))
            .with_remote_address(remote_address),
    )
}

/// 호출자 identity를 요청 처리 범위에 설치
///
/// identity 헤더가 없는 요청은 system identity로 대체되지 않도록 거부합니다.
pub async fn call_identity(req: Request, next: Next) -> Response {
    let Some(ctx) = call_context_from_headers(req.headers()) else {
        return BridgeError::Unauthorized {
            message: format!("missing {} header", USER_HEADER),
        }
        .into_response();
    };

    tracing::debug!(user = %ctx.identity.short_name, "call identity installed");
    ctx.scope(next.run(req)).await
}
