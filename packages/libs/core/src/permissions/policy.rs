//! 정적 정책 정의 및 참조 Oracle
//!
//! `policy.yaml`의 구조를 정의하고, 이를 그대로 판정하는 `StaticPolicyOracle`을 제공합니다.
//!
//! ```yaml
//! policies:
//!   - name: analysts-read
//!     users: [alice]
//!     groups: [analysts]
//!     actions: [read]
//!     resource:
//!       table: orders
//!       families: [d]
//!       columns: [amount]
//!   - name: ops-admin
//!     groups: [ops]
//!     actions: [admin, create]   # resource 생략 = global
//! audit:
//!   exclude_tables: [scratch]
//! ```
//!
//! 정책은 자신의 리소스와 그 하위 전체를 덮습니다 (global ⊇ table ⊇ family ⊇ column).
//! 이름은 정확히 일치해야 하며 wildcard는 지원하지 않습니다.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::action::Action;
use super::audit::AuditEvent;
use super::request::{AccessRequest, Verdict};
use super::session::PolicyOracle;
use crate::error::{Error, Result};
use crate::identity::Identity;

/// 전체 정책 문서
///
/// `policy.yaml` 파일의 루트 구조입니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default)]
    pub policies: Vec<PolicyRule>,

    #[serde(default)]
    pub audit: AuditSettings,
}

/// 정책 규칙 하나
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    pub name: String,

    /// 허용 사용자 (표시 이름)
    #[serde(default)]
    pub users: Vec<String>,

    /// 허용 그룹
    #[serde(default)]
    pub groups: Vec<String>,

    /// 허용 접근 종류
    pub actions: Vec<Action>,

    /// 대상 리소스 (생략하면 global)
    #[serde(default)]
    pub resource: PolicyResource,
}

/// 정책 리소스
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyResource {
    /// None = global
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    /// 비어 있으면 테이블 전체
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub families: BTreeSet<String>,

    /// 비어 있으면 지정된 family 전체
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub columns: BTreeSet<String>,
}

/// 감사 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditSettings {
    /// 감사 이벤트를 만들지 않을 테이블
    #[serde(default)]
    pub exclude_tables: BTreeSet<String>,
}

impl PolicyResource {
    /// global 리소스 여부
    pub fn is_global(&self) -> bool {
        self.table.is_none()
    }

    /// 요청 리소스를 덮는지 검사
    ///
    /// 정책 리소스가 요청 리소스와 같거나 그 상위일 때만 true입니다.
    pub fn covers(&self, request: &AccessRequest) -> bool {
        let Some(table) = &self.table else {
            return true;
        };
        let Some(resource) = &request.resource else {
            return false;
        };
        if resource.table_name() != table {
            return false;
        }
        if self.families.is_empty() {
            return true;
        }

        let Some(family) = resource.family_name() else {
            return false;
        };
        if !self.families.contains(family) {
            return false;
        }
        if self.columns.is_empty() {
            return true;
        }

        match resource.column_name() {
            Some(column) => self.columns.contains(column),
            None => false,
        }
    }
}

impl PolicyRule {
    /// 주체가 규칙 대상인지
    pub fn applies_to(&self, identity: &Identity) -> bool {
        self.users.iter().any(|u| u == &identity.short_name)
            || self.groups.iter().any(|g| identity.in_group(g))
    }

    /// 요청과 일치하는지
    pub fn matches(&self, request: &AccessRequest) -> bool {
        self.actions.contains(&request.action)
            && self.applies_to(&request.identity)
            && self.resource.covers(request)
    }
}

impl PolicyDocument {
    /// YAML 파싱 + 검증
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let document: PolicyDocument = serde_yaml::from_str(yaml)?;
        document.validate()?;
        Ok(document)
    }

    /// 파일에서 로드
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| Error::PolicyParse {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::from_yaml(&yaml)
    }

    /// 구조 검증
    pub fn validate(&self) -> Result<()> {
        let mut names = BTreeSet::new();
        for rule in &self.policies {
            if rule.name.trim().is_empty() {
                return Err(Error::PolicyParse {
                    message: "policy name must not be empty".to_string(),
                });
            }
            if !names.insert(rule.name.as_str()) {
                return Err(Error::PolicyParse {
                    message: format!("duplicate policy name '{}'", rule.name),
                });
            }
            if rule.actions.is_empty() {
                return Err(Error::PolicyParse {
                    message: format!("policy '{}' grants no actions", rule.name),
                });
            }
            if rule.users.is_empty() && rule.groups.is_empty() {
                return Err(Error::PolicyParse {
                    message: format!("policy '{}' has no users or groups", rule.name),
                });
            }

            let resource = &rule.resource;
            if resource.table.as_deref().is_some_and(str::is_empty) {
                return Err(Error::PolicyParse {
                    message: format!("policy '{}' has an empty table name", rule.name),
                });
            }
            if resource.is_global() && !resource.families.is_empty() {
                return Err(Error::PolicyParse {
                    message: format!("policy '{}' lists families without a table", rule.name),
                });
            }
            if resource.families.is_empty() && !resource.columns.is_empty() {
                return Err(Error::PolicyParse {
                    message: format!("policy '{}' lists columns without a column family", rule.name),
                });
            }
        }
        Ok(())
    }
}

/// 정적 정책 Oracle
///
/// 일치하는 첫 규칙이 있으면 허용, 없으면 거부합니다.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicyOracle {
    document: PolicyDocument,
}

impl StaticPolicyOracle {
    pub fn new(document: PolicyDocument) -> Self {
        Self { document }
    }

    /// YAML 문자열에서 생성
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        PolicyDocument::from_yaml(yaml).map(Self::new)
    }

    /// 파일에서 생성
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let oracle = PolicyDocument::load(path).map(Self::new)?;
        tracing::info!("Loaded {} policies", oracle.document.policies.len());
        Ok(oracle)
    }

    pub fn document(&self) -> &PolicyDocument {
        &self.document
    }

    /// 감사 대상 여부
    fn is_audited(&self, request: &AccessRequest) -> bool {
        match request.table() {
            Some(table) => !self.document.audit.exclude_tables.contains(table),
            None => true,
        }
    }
}

impl PolicyOracle for StaticPolicyOracle {
    fn decide(&self, request: &AccessRequest) -> Verdict {
        let matched = self.document.policies.iter().find(|rule| rule.matches(request));
        let audited = self.is_audited(request);

        match matched {
            Some(rule) => {
                let audit = audited.then(|| {
                    AuditEvent::for_request(request, true, Some(format!("policy: {}", rule.name)))
                });
                Verdict::allow(audit)
            }
            None => {
                let audit = audited.then(|| AuditEvent::for_request(request, false, None));
                // 사유는 호출 지점이 요청 필드로 구성
                Verdict {
                    allowed: false,
                    reason: None,
                    audit,
                }
            }
        }
    }
}
