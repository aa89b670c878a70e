//! 접근 평가기
//!
//! family → column map으로 표현된 요청을 family/column 단위 판정으로 나누어 평가하고,
//! 전체 허용/부분 허용/거부와 감사 이벤트를 집계합니다.

use std::collections::BTreeSet;
use std::fmt;

use super::action::Action;
use super::audit::{AuditEvent, AuditSink};
use super::request::AccessRequest;
use super::session::{AuthorizationSession, PolicyOracle};
use crate::config::GuardConfig;
use crate::error::{Error, Result};
use crate::filter::{self, AllowedColumns, AuthorizationFilter};
use crate::identity::{CallContext, Identity};
use crate::resource::{describe_families, FamilyMap, ResourceCoordinate};

/// 호스트가 알려 주는 region 정보
#[derive(Debug, Clone, Default)]
pub struct RegionContext {
    /// region이 속한 테이블 (확인할 수 없으면 None)
    pub table: Option<String>,

    /// 메타데이터 region 여부
    pub is_metadata_region: bool,
}

impl RegionContext {
    pub fn for_table(table: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            is_metadata_region: false,
        }
    }

    /// 메타데이터 region
    pub fn metadata(table: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            is_metadata_region: true,
        }
    }

    /// 테이블 이름 (빈 문자열은 없는 것으로 취급)
    pub fn table_name(&self) -> Option<&str> {
        self.table.as_deref().filter(|t| !t.is_empty())
    }
}

/// 연산 전체에 대한 집계 결과
#[derive(Debug, Clone, Default)]
pub struct FamilyAccessResult {
    pub everything_accessible: bool,
    pub something_accessible: bool,

    /// 허용된 판정들의 감사 이벤트 (순서 유지)
    pub granted_events: Vec<AuditEvent>,

    /// 마지막으로 관찰된 거부의 감사 이벤트
    pub denied_event: Option<AuditEvent>,

    /// 부분 허용일 때만 의미 있음
    pub allowed_columns: AllowedColumns,

    pub denial_reason: Option<String>,
}

impl FamilyAccessResult {
    /// 감사 없이 전체 허용 (fast path)
    pub fn allowed_without_audit() -> Self {
        Self {
            everything_accessible: true,
            something_accessible: true,
            ..Default::default()
        }
    }
}

impl fmt::Display for FamilyAccessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "everythingIsAccessible={}, somethingIsAccessible={}, accessAllowedEvents={}, accessDeniedEvent={}, allowedColumns={:?}, denialReason={:?}",
            self.everything_accessible,
            self.something_accessible,
            self.granted_events.len(),
            self.denied_event.is_some(),
            self.allowed_columns,
            self.denial_reason
        )
    }
}

/// 접근 평가기
///
/// 호출마다 새로 만들며, 호출 간에 공유하는 상태가 없습니다.
pub struct AccessEvaluator<'a> {
    oracle: &'a dyn PolicyOracle,
    config: &'a GuardConfig,
    audit_sink: &'a dyn AuditSink,
}

impl<'a> AccessEvaluator<'a> {
    /// 새 평가기 생성
    pub fn new(
        oracle: &'a dyn PolicyOracle,
        config: &'a GuardConfig,
        audit_sink: &'a dyn AuditSink,
    ) -> Self {
        Self {
            oracle,
            config,
            audit_sink,
        }
    }

    /// 현재 호출자
    ///
    /// 호출 컨텍스트가 없으면 system identity로 대체합니다.
    pub fn active_identity(&self) -> Option<Identity> {
        match CallContext::current() {
            Some(ctx) => Some(ctx.identity),
            None => self.config.system_user_name().map(Identity::new),
        }
    }

    fn remote_address(&self) -> Option<String> {
        CallContext::current_remote_address()
    }

    /// identity 확정 (없으면 감사 없이 거부)
    fn require_identity(&self, operation: &str, action: Action, table: Option<&str>) -> Result<Identity> {
        self.active_identity().ok_or_else(|| {
            tracing::error!(
                operation,
                action = %action,
                "Unexpected: no user associated with request, access denied, not audited"
            );
            Error::access_denied(format!(
                "No user associated with request ({}) for action: {} on table: {}",
                operation,
                action,
                table.unwrap_or("")
            ))
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Fast path
    // ─────────────────────────────────────────────────────────────────────────

    /// super-user 또는 메타데이터 읽기면 감사 없이 허용
    pub fn can_skip_for_table(&self, identity: &Identity, action: Action, table: Option<&str>) -> bool {
        if self.config.is_super_user(&identity.short_name) {
            tracing::debug!(user = %identity.short_name, "can_skip: superuser access allowed, not audited");
            return true;
        }
        if self.is_access_for_metadata_read(action, table) {
            tracing::debug!("can_skip: metadata read access always allowed, not audited");
            return true;
        }
        false
    }

    /// 메타데이터 region 읽기, 또는 global create 권한으로 메타데이터 쓰기
    pub fn can_skip_for_region(
        &self,
        operation: &str,
        identity: &Identity,
        action: Action,
        region: &RegionContext,
    ) -> bool {
        if !self.is_metadata_region(region) {
            return false;
        }

        if action.is_read() {
            tracing::debug!("can_skip: read access for metadata tables allowed, not audited");
            return true;
        }

        if action.is_write() {
            // global create 권한 확인 (감사 기록 없음)
            let request = AccessRequest::builder(operation, Action::Create, identity.clone())
                .remote_address(self.remote_address());
            let session = AuthorizationSession::new(self.oracle, request);
            if session.authorize_table().is_authorized() {
                tracing::debug!(user = %identity.short_name, "can_skip: user has global create access, allowed");
                return true;
            }
        }

        false
    }

    fn is_access_for_metadata_read(&self, action: Action, table: Option<&str>) -> bool {
        action.is_read() && table.is_some_and(|t| self.config.is_metadata_table(t))
    }

    fn is_metadata_region(&self, region: &RegionContext) -> bool {
        region.is_metadata_region
            || region
                .table_name()
                .is_some_and(|t| self.config.is_metadata_table(t))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Evaluation
    // ─────────────────────────────────────────────────────────────────────────

    /// family map 평가
    ///
    /// region의 테이블을 확인할 수 없을 때만 실패합니다 (감사 없이 거부).
    /// family는 이름순으로 처리하고, 여러 거부가 있으면 마지막 거부가 보고됩니다.
    pub fn evaluate(
        &self,
        operation: &str,
        action: Action,
        region: &RegionContext,
        families: &FamilyMap,
    ) -> Result<FamilyAccessResult> {
        tracing::debug!(
            "evaluate: entered: operation[{}], access[{}], families[{}]",
            operation,
            action,
            describe_families(families)
        );

        let Some(table) = region.table_name() else {
            tracing::error!(
                operation,
                action = %action,
                "evaluate: couldn't determine table from region context, access denied, not audited"
            );
            return Err(Error::access_denied(format!(
                "Insufficient permissions for operation '{}', action: {}",
                operation, action
            )));
        };

        let identity = self.require_identity(operation, action, Some(table))?;

        if self.can_skip_for_table(&identity, action, Some(table))
            || self.can_skip_for_region(operation, &identity, action, region)
        {
            let result = FamilyAccessResult::allowed_without_audit();
            tracing::debug!(
                "evaluate: exiting: operation[{}], access[{}], verdict[{}] (fast path)",
                operation,
                action,
                result
            );
            return Ok(result);
        }

        let request = AccessRequest::builder(operation, action, identity.clone())
            .remote_address(self.remote_address())
            .table(Some(table.to_string()));
        let session = AuthorizationSession::new(self.oracle, request);

        let result = if families.is_empty() {
            tracing::debug!("evaluate: empty families collection, table level access is desired");
            evaluate_table(&session, &identity, operation, table)
        } else {
            evaluate_families(&session, &identity, operation, table, families)
        };

        tracing::debug!(
            "evaluate: exiting: operation[{}], access[{}], families[{}], verdict[{}]",
            operation,
            action,
            describe_families(families),
            result
        );
        Ok(result)
    }

    /// 읽기 경로: 감사 이벤트를 내보내고 필요하면 필터를 돌려줌
    ///
    /// 전부 허용이면 `None`, 일부 허용이면 필터, 전부 거부면 `AccessDenied`.
    pub fn authorize_access(
        &self,
        operation: &str,
        action: Action,
        region: &RegionContext,
        families: &FamilyMap,
    ) -> Result<Option<AuthorizationFilter>> {
        let result = self.evaluate(operation, action, region, families)?;

        if result.something_accessible {
            // 일부만 허용되더라도 허용된 접근은 기록
            self.audit_sink.log_events(&result.granted_events);
        } else if let Some(event) = &result.denied_event {
            self.audit_sink.log_event(event);
        }

        let filter = filter::synthesize(&result)?;
        match &filter {
            None => tracing::debug!("authorize_access: exiting: no filter returned since all access was allowed"),
            Some(_) => tracing::debug!("authorize_access: exiting: filter returned since some access was allowed"),
        }
        Ok(filter)
    }

    /// 쓰기/관리 경로: 전부 허용이 아니면 거부
    pub fn require_permission(
        &self,
        operation: &str,
        action: Action,
        region: &RegionContext,
        families: &FamilyMap,
    ) -> Result<()> {
        let result = self.evaluate(operation, action, region, families)?;

        if result.everything_accessible {
            self.audit_sink.log_events(&result.granted_events);
            tracing::debug!("require_permission: exiting: all access was allowed");
            Ok(())
        } else {
            if let Some(event) = &result.denied_event {
                self.audit_sink.log_event(event);
            }
            tracing::debug!("require_permission: exiting: denied as everything wasn't accessible");
            Err(Error::access_denied(result.denial_reason.unwrap_or_else(|| {
                format!("Insufficient permissions for operation '{}', action: {}", operation, action)
            })))
        }
    }

    /// 단일 좌표 검사 (global/table/family/column)
    ///
    /// `resource`가 `None`이면 global scope 검사입니다.
    pub fn authorize_single(
        &self,
        operation: &str,
        other_information: Option<&str>,
        action: Action,
        resource: Option<ResourceCoordinate>,
    ) -> Result<()> {
        let table = resource.as_ref().map(|r| r.table_name());
        tracing::debug!(
            "authorize_single: entering: operation[{}], info[{:?}], access[{}], resource[{:?}]",
            operation,
            other_information,
            action,
            resource
        );

        let identity = self.require_identity(operation, action, table)?;
        if self.can_skip_for_table(&identity, action, table) {
            tracing::debug!("authorize_single: exiting: operation[{}], allowed[true], reason[can skip auth check]", operation);
            return Ok(());
        }

        let request = AccessRequest::builder(operation, action, identity)
            .other_information(other_information.map(str::to_string))
            .remote_address(self.remote_address())
            .table(table.map(str::to_string));
        let session = AuthorizationSession::new(self.oracle, request).audit_sink(self.audit_sink);
        let verdict = session.authorize(&session.request().build(resource));

        tracing::debug!(
            "authorize_single: exiting: operation[{}], allowed[{}], reason[{:?}]",
            operation,
            verdict.allowed,
            verdict.reason
        );
        session.publish_results(&verdict)
    }
}

/// 테이블 수준 단일 판정
fn evaluate_table(
    session: &AuthorizationSession<'_>,
    identity: &Identity,
    operation: &str,
    table: &str,
) -> FamilyAccessResult {
    let verdict = session.authorize_table();
    let authorized = verdict.allowed;

    let mut result = FamilyAccessResult {
        everything_accessible: authorized,
        something_accessible: authorized,
        ..Default::default()
    };

    if authorized {
        result.granted_events.extend(verdict.audit);
    } else {
        result.denied_event = verdict.audit;
        result.denial_reason = Some(format!(
            "Insufficient permissions for user '{}', action: {}, tableName:{}, no column families found.",
            identity.short_name, operation, table
        ));
    }
    result
}

/// family/column 단위 판정 집계
fn evaluate_families(
    session: &AuthorizationSession<'_>,
    identity: &Identity,
    operation: &str,
    table: &str,
    families: &FamilyMap,
) -> FamilyAccessResult {
    let mut result = FamilyAccessResult {
        everything_accessible: true,
        something_accessible: false,
        ..Default::default()
    };

    for (family, columns) in families {
        tracing::debug!("evaluate: processing family: {}", family);

        if columns.is_empty() {
            let verdict = session.authorize_family(family);
            if verdict.allowed {
                result.something_accessible = true;
                result.granted_events.extend(verdict.audit);
                result.allowed_columns.insert(family.clone(), None);
            } else {
                result.everything_accessible = false;
                result.denied_event = verdict.audit;
                result.denial_reason = Some(format!(
                    "Insufficient permissions for user '{}', action: {}, tableName:{}, family:{}, no columns found.",
                    identity.short_name, operation, table, family
                ));
            }
            continue;
        }

        let mut accessible_columns = BTreeSet::new();
        for column in columns {
            let verdict = session.authorize_column(family, column);
            if verdict.allowed {
                result.something_accessible = true;
                result.granted_events.extend(verdict.audit);
                accessible_columns.insert(column.clone());
            } else {
                result.everything_accessible = false;
                result.denied_event = verdict.audit;
                result.denial_reason = Some(format!(
                    "Insufficient permissions for user '{}', action: {}, tableName:{}, family:{}, column: {}",
                    identity.short_name, operation, table, family, column
                ));
            }
        }
        if !accessible_columns.is_empty() {
            result
                .allowed_columns
                .insert(family.clone(), Some(accessible_columns));
        }
    }

    result
}
