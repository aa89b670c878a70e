//! /admin/grant, /admin/revoke 핸들러

use std::sync::Arc;

use axum::{extract::State, Json};
use bwk_core::grant::{GrantCommand, GrantRevokeRecord};
use bwk_core::identity::Identity;

use crate::error::Result;
use crate::state::AppState;

/// grantor (호출자 표시 이름)
fn grantor(state: &AppState) -> Option<String> {
    state.guard.active_identity().map(|Identity { short_name, .. }| short_name)
}

/// POST /admin/grant
pub async fn grant(
    State(state): State<Arc<AppState>>,
    Json(command): Json<GrantCommand>,
) -> Result<Json<GrantRevokeRecord>> {
    let grantor = grantor(&state);
    let record = state.grants.grant(&command, grantor.as_deref()).await?;
    Ok(Json(record))
}

/// POST /admin/revoke
pub async fn revoke(
    State(state): State<Arc<AppState>>,
    Json(command): Json<GrantCommand>,
) -> Result<Json<GrantRevokeRecord>> {
    let grantor = grantor(&state);
    let record = state.grants.revoke(&command, grantor.as_deref()).await?;
    Ok(Json(record))
}
