//! 접근 요청과 판정
//!
//! 요청은 Oracle 호출 한 번마다 새로 만들어지는 불변 값입니다.

use serde::Serialize;

use super::action::Action;
use super::audit::AuditEvent;
use crate::identity::Identity;
use crate::resource::ResourceCoordinate;

/// 접근 요청
///
/// `resource`가 `None`이면 클러스터 전체(global scope)에 대한 요청입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessRequest {
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_information: Option<String>,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceCoordinate>,
    pub identity: Identity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_address: Option<String>,
}

impl AccessRequest {
    /// 빌더 생성
    pub fn builder(operation: impl Into<String>, action: Action, identity: Identity) -> AccessRequestBuilder {
        AccessRequestBuilder::new(operation, action, identity)
    }

    pub fn table(&self) -> Option<&str> {
        self.resource.as_ref().map(|r| r.table_name())
    }

    pub fn family(&self) -> Option<&str> {
        self.resource.as_ref().and_then(|r| r.family_name())
    }

    pub fn column(&self) -> Option<&str> {
        self.resource.as_ref().and_then(|r| r.column_name())
    }

    pub fn is_global(&self) -> bool {
        self.resource.is_none()
    }
}

/// 접근 요청 빌더
///
/// 호출 단위로 변하지 않는 필드를 담아 두고, 검사마다 `build_*`로 새 요청을 만듭니다.
#[derive(Debug, Clone)]
pub struct AccessRequestBuilder {
    operation: String,
    other_information: Option<String>,
    action: Action,
    identity: Identity,
    remote_address: Option<String>,
    table: Option<String>,
}

impl AccessRequestBuilder {
    pub fn new(operation: impl Into<String>, action: Action, identity: Identity) -> Self {
        Self {
            operation: operation.into(),
            other_information: None,
            action,
            identity,
            remote_address: None,
            table: None,
        }
    }

    /// 부가 정보 설정
    pub fn other_information(mut self, info: Option<String>) -> Self {
        self.other_information = info;
        self
    }

    /// 원격 주소 설정
    pub fn remote_address(mut self, remote_address: Option<String>) -> Self {
        self.remote_address = remote_address;
        self
    }

    /// 대상 테이블 설정 (빈 문자열은 global scope)
    pub fn table(mut self, table: Option<String>) -> Self {
        self.table = table.filter(|t| !t.is_empty());
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// 테이블 수준 요청 (테이블이 없으면 global scope)
    pub fn build_table(&self) -> AccessRequest {
        self.build(
            self.table
                .as_ref()
                .map(|table| ResourceCoordinate::table(table.as_str())),
        )
    }

    /// Column family 수준 요청
    pub fn build_family(&self, family: &str) -> AccessRequest {
        let resource = self
            .table
            .as_ref()
            .map(|table| ResourceCoordinate::family(table.as_str(), family));
        self.build(resource)
    }

    /// Column 수준 요청
    pub fn build_column(&self, family: &str, column: &str) -> AccessRequest {
        let resource = self
            .table
            .as_ref()
            .map(|table| ResourceCoordinate::column(table.as_str(), family, column));
        self.build(resource)
    }

    /// 임의 좌표 요청
    pub fn build(&self, resource: Option<ResourceCoordinate>) -> AccessRequest {
        AccessRequest {
            operation: self.operation.clone(),
            other_information: self.other_information.clone(),
            action: self.action,
            resource,
            identity: self.identity.clone(),
            remote_address: self.remote_address.clone(),
        }
    }
}

/// 판정 결과
///
/// Oracle 호출 한 번의 결과이며, 감사 이벤트를 명시적으로 함께 돌려줍니다.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub allowed: bool,
    pub reason: Option<String>,
    pub audit: Option<AuditEvent>,
}

impl Verdict {
    /// 허용 판정
    pub fn allow(audit: Option<AuditEvent>) -> Self {
        Self {
            allowed: true,
            reason: None,
            audit,
        }
    }

    /// 거부 판정
    pub fn deny(reason: impl Into<String>, audit: Option<AuditEvent>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            audit,
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.allowed
    }

    pub fn denial_reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}
