//! /scanners/* 핸들러
//!
//! scanner open 시 읽기 권한을 검사하고 소유자를 등록합니다.
//! next/close는 등록된 소유자만 호출할 수 있습니다.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use bwk_core::filter::AuthorizationFilter;
use bwk_core::guard::ReadOp;
use bwk_core::scanner::ScannerId;
use serde::{Deserialize, Serialize};

use super::hooks::{to_family_map, FamiliesBody, HookResponse, RegionBody};
use crate::error::{BridgeError, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OpenScannerRequest {
    #[serde(flatten)]
    pub region: RegionBody,
    #[serde(default)]
    pub families: Option<FamiliesBody>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenScannerResponse {
    pub scanner_id: ScannerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<AuthorizationFilter>,
}

/// POST /scanners/open
pub async fn open(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OpenScannerRequest>,
) -> Result<Json<OpenScannerResponse>> {
    let region = request.region.to_region();
    let families = to_family_map(request.families.as_ref());

    let filter = state.guard.read(ReadOp::ScannerOpen, &region, &families)?;

    let scanner = state.guard.scanners().allocate_id();
    let lease = state.guard.scanner_opened(scanner);
    state.track_scanner(scanner, region.table.unwrap_or_default(), lease);
    tracing::debug!(scanner = %scanner, "scanner opened");

    Ok(Json(OpenScannerResponse {
        scanner_id: scanner,
        filter,
    }))
}

/// POST /scanners/:id/next
pub async fn next(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<HookResponse>> {
    let scanner = ScannerId(id);
    state.guard.scanner_next(scanner)?;

    if !state.touch_scanner(scanner) {
        return Err(unknown_scanner(scanner));
    }
    Ok(Json(HookResponse::allowed()))
}

/// POST /scanners/:id/close
pub async fn close(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<HookResponse>> {
    let scanner = ScannerId(id);
    state.guard.scanner_close(scanner)?;

    if !state.release_scanner(scanner) {
        return Err(unknown_scanner(scanner));
    }
    state.guard.scanner_closed(scanner);
    Ok(Json(HookResponse::allowed()))
}

fn unknown_scanner(scanner: ScannerId) -> BridgeError {
    BridgeError::NotFound {
        message: format!("scanner {} is not open (closed or expired)", scanner),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use bwk_core::identity::{CallContext, Identity};
    use serde_json::json;

    use super::*;
    use crate::state::tests::test_state;

    fn as_user(name: &str) -> CallContext {
        CallContext::new(Identity::new(name))
    }

    #[tokio::test]
    async fn test_scanner_lifecycle() {
        let (state, _) = test_state();
        let request: OpenScannerRequest = serde_json::from_value(json!({
            "table": "orders",
            "families": { "d": [] }
        }))
        .unwrap();

        let Json(opened) = as_user("alice")
            .scope(open(State(state.clone()), Json(request)))
            .await
            .unwrap();
        assert!(opened.filter.is_none());
        let id = opened.scanner_id.0;

        as_user("alice")
            .scope(next(State(state.clone()), Path(id)))
            .await
            .unwrap();

        let err = as_user("bob")
            .scope(next(State(state.clone()), Path(id)))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        as_user("alice")
            .scope(close(State(state.clone()), Path(id)))
            .await
            .unwrap();
        assert!(state.guard.scanners().is_empty());

        let err = as_user("alice")
            .scope(next(State(state), Path(id)))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_open_denied_registers_nothing() {
        let (state, _) = test_state();
        let request: OpenScannerRequest = serde_json::from_value(json!({
            "table": "users"
        }))
        .unwrap();

        let err = as_user("alice")
            .scope(open(State(state.clone()), Json(request)))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert!(state.scanners.is_empty());
    }
}
