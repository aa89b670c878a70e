//! 결과 필터
//!
//! 부분 허용일 때 하위 row/cell iterator가 적용할 필터를 만듭니다.
//! 호출자가 이미 붙여 둔 필터가 있으면 AND로 결합합니다.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::permissions::FamilyAccessResult;

/// family → 허용 column 집합
///
/// 값이 `None`이면 family 안의 모든 column을 허용합니다.
/// key가 없는 family는 아무것도 허용되지 않습니다.
pub type AllowedColumns = BTreeMap<String, Option<BTreeSet<String>>>;

/// 필터가 검사하는 cell 좌표
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef<'a> {
    pub family: &'a str,
    pub column: &'a str,
}

impl<'a> CellRef<'a> {
    pub fn new(family: &'a str, column: &'a str) -> Self {
        Self { family, column }
    }
}

/// cell 필터
pub trait CellFilter: Send + Sync + fmt::Debug {
    /// cell을 결과에 포함할지 여부
    fn admits(&self, cell: CellRef<'_>) -> bool;
}

/// 권한 기반 필터
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationFilter {
    allowed_columns: AllowedColumns,
}

impl AuthorizationFilter {
    pub fn new(allowed_columns: AllowedColumns) -> Self {
        Self { allowed_columns }
    }

    pub fn allowed_columns(&self) -> &AllowedColumns {
        &self.allowed_columns
    }
}

impl CellFilter for AuthorizationFilter {
    fn admits(&self, cell: CellRef<'_>) -> bool {
        match self.allowed_columns.get(cell.family) {
            None => false,
            Some(None) => true,
            Some(Some(columns)) => columns.contains(cell.column),
        }
    }
}

/// 모든 필터를 통과해야 하는 필터 목록 (AND)
#[derive(Debug, Clone)]
pub struct FilterList {
    filters: Vec<Arc<dyn CellFilter>>,
}

impl FilterList {
    pub fn must_pass_all(filters: Vec<Arc<dyn CellFilter>>) -> Self {
        Self { filters }
    }

    pub fn filters(&self) -> &[Arc<dyn CellFilter>] {
        &self.filters
    }
}

impl CellFilter for FilterList {
    fn admits(&self, cell: CellRef<'_>) -> bool {
        self.filters.iter().all(|f| f.admits(cell))
    }
}

/// 평가 결과로부터 필터 생성
///
/// - 전부 허용 → `None` (필터 불필요)
/// - 일부 허용 → 허용 column 필터
/// - 전부 거부 → `AccessDenied`
pub fn synthesize(result: &FamilyAccessResult) -> Result<Option<AuthorizationFilter>> {
    if result.everything_accessible {
        Ok(None)
    } else if result.something_accessible {
        Ok(Some(AuthorizationFilter::new(result.allowed_columns.clone())))
    } else {
        Err(Error::access_denied(
            result
                .denial_reason
                .clone()
                .unwrap_or_else(|| "Insufficient permissions".to_string()),
        ))
    }
}

/// 새 필터와 기존 필터를 AND로 결합
///
/// 기존 필터가 없으면 새 필터를 그대로 돌려줍니다.
pub fn combine_filters(
    filter: Arc<dyn CellFilter>,
    existing: Option<Arc<dyn CellFilter>>,
) -> Arc<dyn CellFilter> {
    match existing {
        Some(existing) => Arc::new(FilterList::must_pass_all(vec![filter, existing])),
        None => filter,
    }
}
