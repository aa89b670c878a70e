//! /hooks/* 핸들러
//!
//! 호스트가 연산 직전에 호출하는 권한 검사 엔드포인트입니다.
//! 호출자 identity는 미들웨어가 호출 컨텍스트로 설치해 둡니다.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, Json};
use bwk_core::filter::AuthorizationFilter;
use bwk_core::guard::{ClusterOp, ReadOp, ReadWriteOp, SchemaOp, WriteOp};
use bwk_core::permissions::RegionContext;
use bwk_core::resource::{normalize_families, FamilyMap};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::state::AppState;

/// family → column 목록 (빈 목록 = family 전체)
pub type FamiliesBody = BTreeMap<String, Vec<String>>;

/// region 정보
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionBody {
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub metadata_region: bool,
}

impl RegionBody {
    pub fn to_region(&self) -> RegionContext {
        RegionContext {
            table: self.table.clone(),
            is_metadata_region: self.metadata_region,
        }
    }
}

/// 요청 본문의 family map 정규화
pub fn to_family_map(families: Option<&FamiliesBody>) -> FamilyMap {
    match families {
        Some(families) => normalize_families(Some(families.iter().map(|(family, columns)| {
            (family.as_bytes(), Some(columns.iter().map(|c| c.as_bytes())))
        }))),
        None => FamilyMap::new(),
    }
}

/// 검사 결과
#[derive(Debug, Serialize)]
pub struct HookResponse {
    pub allowed: bool,

    /// 부분 허용일 때 결과에 적용할 필터
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<AuthorizationFilter>,
}

impl HookResponse {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            filter: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReadHookRequest {
    pub operation: ReadOp,
    #[serde(flatten)]
    pub region: RegionBody,
    #[serde(default)]
    pub families: Option<FamiliesBody>,
}

/// POST /hooks/read
pub async fn read(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ReadHookRequest>,
) -> Result<Json<HookResponse>> {
    let families = to_family_map(request.families.as_ref());
    let filter = state
        .guard
        .read(request.operation, &request.region.to_region(), &families)?;
    Ok(Json(HookResponse {
        allowed: true,
        filter,
    }))
}

#[derive(Debug, Deserialize)]
pub struct WriteHookRequest {
    pub operation: WriteOp,
    #[serde(flatten)]
    pub region: RegionBody,
    #[serde(default)]
    pub families: Option<FamiliesBody>,
}

/// POST /hooks/write
pub async fn write(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WriteHookRequest>,
) -> Result<Json<HookResponse>> {
    let families = to_family_map(request.families.as_ref());
    state
        .guard
        .write(request.operation, &request.region.to_region(), &families)?;
    Ok(Json(HookResponse::allowed()))
}

#[derive(Debug, Deserialize)]
pub struct ReadWriteHookRequest {
    pub operation: ReadWriteOp,
    #[serde(flatten)]
    pub region: RegionBody,
    #[serde(default)]
    pub families: Option<FamiliesBody>,
}

/// POST /hooks/read-write
pub async fn read_write(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ReadWriteHookRequest>,
) -> Result<Json<HookResponse>> {
    let families = to_family_map(request.families.as_ref());
    state
        .guard
        .read_write(request.operation, &request.region.to_region(), &families)?;
    Ok(Json(HookResponse::allowed()))
}

#[derive(Debug, Deserialize)]
pub struct SchemaHookRequest {
    pub operation: SchemaOp,
    pub table: String,
}

/// POST /hooks/schema
pub async fn schema(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SchemaHookRequest>,
) -> Result<Json<HookResponse>> {
    state.guard.schema(request.operation, &request.table)?;
    Ok(Json(HookResponse::allowed()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterHookRequest {
    pub operation: ClusterOp,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub other_information: Option<String>,
}

/// POST /hooks/cluster
pub async fn cluster(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ClusterHookRequest>,
) -> Result<Json<HookResponse>> {
    state.guard.cluster(
        request.operation,
        request.table.as_deref(),
        request.other_information.as_deref(),
    )?;
    Ok(Json(HookResponse::allowed()))
}

/// POST /hooks/open
pub async fn open(
    State(state): State<Arc<AppState>>,
    Json(region): Json<RegionBody>,
) -> Result<Json<HookResponse>> {
    state.guard.open(&region.to_region())?;
    Ok(Json(HookResponse::allowed()))
}

#[derive(Debug, Deserialize)]
pub struct TableDescriptorsRequest {
    #[serde(default)]
    pub tables: Vec<String>,
}

/// POST /hooks/table-descriptors
pub async fn table_descriptors(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TableDescriptorsRequest>,
) -> Result<Json<HookResponse>> {
    state.guard.get_table_descriptors(&request.tables)?;
    Ok(Json(HookResponse::allowed()))
}

#[cfg(test)]
mod tests {
    use bwk_core::identity::{CallContext, Identity};
    use serde_json::json;

    use super::*;
    use crate::state::tests::test_state;

    fn alice() -> CallContext {
        CallContext::new(Identity::new("alice"))
    }

    #[test]
    fn test_parse_read_request() {
        let request: ReadHookRequest = serde_json::from_value(json!({
            "operation": "scannerOpen",
            "table": "orders",
            "families": { "d": [], "m": ["a", ""], "": ["x"] }
        }))
        .unwrap();
        assert_eq!(request.operation, ReadOp::ScannerOpen);
        assert!(!request.region.metadata_region);

        let families = to_family_map(request.families.as_ref());
        assert_eq!(families.len(), 2);
        assert!(families["d"].is_empty());
        assert_eq!(families["m"].len(), 1);
    }

    #[tokio::test]
    async fn test_read_hook_returns_filter() {
        let (state, sink) = test_state();
        let request: ReadHookRequest = serde_json::from_value(json!({
            "operation": "get",
            "table": "orders",
            "families": { "d": [], "m": [] }
        }))
        .unwrap();

        let Json(response) = alice()
            .scope(read(State(state), Json(request)))
            .await
            .unwrap();
        assert!(response.allowed);

        let filter = serde_json::to_value(response.filter.unwrap()).unwrap();
        assert_eq!(filter, json!({ "allowed_columns": { "d": null } }));
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_write_hook_denied() {
        let (state, _) = test_state();
        let request: WriteHookRequest = serde_json::from_value(json!({
            "operation": "put",
            "table": "orders",
            "families": { "m": ["x"] }
        }))
        .unwrap();

        let err = alice()
            .scope(write(State(state), Json(request)))
            .await
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_cluster_hook() {
        let (state, _) = test_state();
        let request: ClusterHookRequest = serde_json::from_value(json!({
            "operation": "balance"
        }))
        .unwrap();

        let ops = CallContext::new(Identity::new("olga").with_groups(vec!["ops".to_string()]));
        let Json(response) = ops
            .scope(cluster(State(state.clone()), Json(request)))
            .await
            .unwrap();
        assert!(response.allowed);

        let request: SchemaHookRequest = serde_json::from_value(json!({
            "operation": "createTable",
            "table": "orders"
        }))
        .unwrap();
        assert!(alice().scope(schema(State(state), Json(request))).await.is_err());
    }
}
