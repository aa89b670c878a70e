//! /permissions/check 핸들러

use std::sync::Arc;

use axum::{extract::State, Json};
use bwk_core::guard::PermissionCheck;
use serde::Deserialize;

use super::hooks::{HookResponse, RegionBody};
use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckPermissionsRequest {
    #[serde(flatten)]
    pub region: RegionBody,
    pub permissions: Vec<PermissionCheck>,
}

/// POST /permissions/check
pub async fn check(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CheckPermissionsRequest>,
) -> Result<Json<HookResponse>> {
    state
        .guard
        .check_permissions(&request.region.to_region(), &request.permissions)?;
    Ok(Json(HookResponse::allowed()))
}
