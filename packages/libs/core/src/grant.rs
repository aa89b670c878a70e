//! Grant/Revoke 변환
//!
//! 호스트의 grant/revoke 명령을 정책 admin 서비스가 받는 권한 변경 레코드로 바꿉니다.
//! 전체 경로는 `GuardConfig::update_policies_on_grant_revoke`가 켜져 있을 때만 동작합니다.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::config::GuardConfig;
use crate::error::{Error, Result};
use crate::permissions::Action;

/// principal이 그룹임을 나타내는 접두사
pub const GROUP_PREFIX: &str = "@";

/// global scope에서 table/family/column 자리에 쓰는 값
const ALL: &str = "*";

/// 권한 범위
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionScope {
    Global,
    Table,
    Namespace,
}

impl PermissionScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionScope::Global => "global",
            PermissionScope::Table => "table",
            PermissionScope::Namespace => "namespace",
        }
    }
}

/// 부여/회수 대상 권한
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPermission {
    /// 사용자 이름, 또는 `@` 접두사가 붙은 그룹 이름
    pub principal: String,

    pub scope: Option<PermissionScope>,

    /// 권한 코드 (R/W/X/C/A) 또는 이름 (read, write, ...)
    #[serde(default)]
    pub actions: Vec<String>,

    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

/// grant/revoke 명령
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrantCommand {
    #[serde(default)]
    pub permission: Option<UserPermission>,
}

/// 사용자/그룹과 권한 목록
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermMap {
    pub user_list: Vec<String>,
    pub group_list: Vec<String>,
    pub perm_list: Vec<String>,
}

impl PermMap {
    pub fn add_user(&mut self, user: &str) {
        push_unique(&mut self.user_list, user);
    }

    pub fn add_group(&mut self, group: &str) {
        push_unique(&mut self.group_list, group);
    }

    pub fn add_perm(&mut self, perm: &str) {
        push_unique(&mut self.perm_list, perm);
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// 정규화된 권한 변경 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRevokeRecord {
    pub grantor: Option<String>,
    pub repository_name: String,
    pub repository_type: String,
    pub tables: String,
    pub column_families: String,
    pub columns: String,
    pub perm_map: PermMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Grant,
    Revoke,
}

impl Kind {
    fn as_str(&self) -> &'static str {
        match self {
            Kind::Grant => "grant",
            Kind::Revoke => "revoke",
        }
    }
}

/// grant 명령 변환
pub fn translate_grant(
    command: &GrantCommand,
    grantor: Option<&str>,
    repository_name: &str,
) -> Result<GrantRevokeRecord> {
    translate(Kind::Grant, command, grantor, repository_name)
}

/// revoke 명령 변환 (항상 네 권한 모두 회수)
pub fn translate_revoke(
    command: &GrantCommand,
    grantor: Option<&str>,
    repository_name: &str,
) -> Result<GrantRevokeRecord> {
    translate(Kind::Revoke, command, grantor, repository_name)
}

fn translate(
    kind: Kind,
    command: &GrantCommand,
    grantor: Option<&str>,
    repository_name: &str,
) -> Result<GrantRevokeRecord> {
    let op = kind.as_str();

    let Some(permission) = &command.permission else {
        return Err(Error::validation(format!("{}(): invalid data - permission is null", op)));
    };

    let principal = permission.principal.trim();
    if principal.is_empty() {
        return Err(Error::validation(format!("{}(): invalid data - username empty", op)));
    }

    if kind == Kind::Grant && permission.actions.is_empty() {
        return Err(Error::validation(format!("{}(): invalid data - no action specified", op)));
    }

    let (tables, column_families, columns) = match permission.scope {
        Some(PermissionScope::Global) => (ALL.to_string(), ALL.to_string(), ALL.to_string()),
        Some(PermissionScope::Table) => (
            permission.table.clone().unwrap_or_default(),
            permission.family.clone().unwrap_or_default(),
            permission.column.clone().unwrap_or_default(),
        ),
        other => {
            tracing::warn!(
                "{}(): ignoring type '{}'",
                op,
                other.map(|s| s.as_str()).unwrap_or("unknown")
            );
            (String::new(), String::new(), String::new())
        }
    };

    if tables.is_empty() && column_families.is_empty() && columns.is_empty() {
        return Err(Error::validation(format!(
            "{}(): table/columnFamily/columnQualifier not specified",
            op
        )));
    }

    let mut perm_map = PermMap::default();
    match principal.strip_prefix(GROUP_PREFIX) {
        Some(group) => perm_map.add_group(group),
        None => perm_map.add_user(principal),
    }

    match kind {
        Kind::Grant => {
            for raw in &permission.actions {
                match parse_action(raw) {
                    Some(action) => perm_map.add_perm(action.permission_name()),
                    None => tracing::warn!(
                        "{}(): ignoring action '{}' for user '{}'",
                        op,
                        raw,
                        principal
                    ),
                }
            }
            if perm_map.perm_list.is_empty() {
                return Err(Error::validation(format!("{}(): invalid data - no action specified", op)));
            }
        }
        Kind::Revoke => {
            for action in Action::ALL {
                perm_map.add_perm(action.permission_name());
            }
        }
    }

    Ok(GrantRevokeRecord {
        grantor: grantor.map(str::to_string),
        repository_name: repository_name.to_string(),
        repository_type: "hbase".to_string(),
        tables,
        column_families,
        columns,
        perm_map,
    })
}

/// 한 글자 코드 또는 이름에서 접근 종류 파싱
fn parse_action(raw: &str) -> Option<Action> {
    let raw = raw.trim();
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(code), None) => Action::from_code(code.to_ascii_uppercase()),
        _ => Action::from_str(raw),
    }
}

/// 정책 admin 서비스
pub trait PolicyAdmin: Send + Sync {
    fn grant_privilege(&self, record: &GrantRevokeRecord) -> impl Future<Output = Result<()>> + Send;

    fn revoke_privilege(&self, record: &GrantRevokeRecord) -> impl Future<Output = Result<()>> + Send;
}

/// 레코드를 로그로만 남기는 admin (원격 admin이 설정되지 않은 경우)
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyPolicyAdmin;

impl PolicyAdmin for LogOnlyPolicyAdmin {
    async fn grant_privilege(&self, record: &GrantRevokeRecord) -> Result<()> {
        tracing::info!(tables = %record.tables, perms = ?record.perm_map.perm_list, "grant translated (no remote admin configured)");
        Ok(())
    }

    async fn revoke_privilege(&self, record: &GrantRevokeRecord) -> Result<()> {
        tracing::info!(tables = %record.tables, "revoke translated (no remote admin configured)");
        Ok(())
    }
}

/// 설정 플래그로 제어되는 grant/revoke 서비스
pub struct GrantRevokeService<A> {
    admin: A,
    enabled: bool,
    repository_name: String,
}

impl<A: PolicyAdmin> GrantRevokeService<A> {
    /// 새 서비스 생성
    pub fn new(config: &GuardConfig, admin: A) -> Self {
        Self {
            admin,
            enabled: config.update_policies_on_grant_revoke,
            repository_name: config.repository_name.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// grant 처리
    pub async fn grant(&self, command: &GrantCommand, grantor: Option<&str>) -> Result<GrantRevokeRecord> {
        self.ensure_enabled("grant")?;
        let record = translate_grant(command, grantor, &self.repository_name).inspect_err(|e| {
            tracing::warn!("grant() failed: {}", e);
        })?;
        self.admin.grant_privilege(&record).await.inspect_err(|e| {
            tracing::warn!("grant() failed: {}", e);
        })?;
        Ok(record)
    }

    /// revoke 처리
    pub async fn revoke(&self, command: &GrantCommand, grantor: Option<&str>) -> Result<GrantRevokeRecord> {
        self.ensure_enabled("revoke")?;
        let record = translate_revoke(command, grantor, &self.repository_name).inspect_err(|e| {
            tracing::warn!("revoke() failed: {}", e);
        })?;
        self.admin.revoke_privilege(&record).await.inspect_err(|e| {
            tracing::warn!("revoke() failed: {}", e);
        })?;
        Ok(record)
    }

    fn ensure_enabled(&self, op: &str) -> Result<()> {
        if self.enabled {
            Ok(())
        } else {
            tracing::debug!("{}(): policy updates on grant/revoke are disabled", op);
            Err(Error::FeatureDisabled {
                feature: "grant/revoke policy updates".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn command(scope: Option<PermissionScope>, principal: &str, actions: &[&str]) -> GrantCommand {
        GrantCommand {
            permission: Some(UserPermission {
                principal: principal.to_string(),
                scope,
                actions: actions.iter().map(|a| a.to_string()).collect(),
                table: Some("orders".to_string()),
                family: Some("d".to_string()),
                column: None,
                namespace: None,
            }),
        }
    }

    #[derive(Default)]
    struct RecordingAdmin {
        records: Mutex<Vec<(String, GrantRevokeRecord)>>,
    }

    impl PolicyAdmin for RecordingAdmin {
        async fn grant_privilege(&self, record: &GrantRevokeRecord) -> Result<()> {
            self.records.lock().unwrap().push(("grant".to_string(), record.clone()));
            Ok(())
        }

        async fn revoke_privilege(&self, record: &GrantRevokeRecord) -> Result<()> {
            self.records.lock().unwrap().push(("revoke".to_string(), record.clone()));
            Ok(())
        }
    }

    #[test]
    fn test_grant_group_global() {
        let record = translate_grant(
            &command(Some(PermissionScope::Global), "@analysts", &["R", "X", "W"]),
            Some("admin"),
            "bulwark",
        )
        .unwrap();

        assert_eq!(record.tables, "*");
        assert_eq!(record.column_families, "*");
        assert_eq!(record.columns, "*");
        assert_eq!(record.perm_map.group_list, vec!["analysts"]);
        assert!(record.perm_map.user_list.is_empty());
        // X(exec)는 무시
        assert_eq!(record.perm_map.perm_list, vec!["READ", "WRITE"]);
        assert_eq!(record.grantor.as_deref(), Some("admin"));
    }

    #[test]
    fn test_grant_table_scope_user() {
        let record = translate_grant(
            &command(Some(PermissionScope::Table), "bob", &["read", "admin"]),
            None,
            "bulwark",
        )
        .unwrap();
        assert_eq!(record.tables, "orders");
        assert_eq!(record.column_families, "d");
        assert_eq!(record.columns, "");
        assert_eq!(record.perm_map.user_list, vec!["bob"]);
        assert_eq!(record.perm_map.perm_list, vec!["READ", "ADMIN"]);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["permMap"]["userList"][0], "bob");
        assert_eq!(json["repositoryName"], "bulwark");
    }

    #[test]
    fn test_revoke_lists_all_actions() {
        let record = translate_revoke(
            &command(Some(PermissionScope::Table), "bob", &[]),
            Some("admin"),
            "bulwark",
        )
        .unwrap();
        assert_eq!(record.perm_map.perm_list, vec!["READ", "WRITE", "CREATE", "ADMIN"]);
    }

    #[test]
    fn test_validation_failures() {
        let err = translate_grant(&GrantCommand::default(), None, "r").unwrap_err();
        assert_eq!(err.to_string(), "validation error: grant(): invalid data - permission is null");

        let err = translate_grant(&command(Some(PermissionScope::Table), " ", &["R"]), None, "r").unwrap_err();
        assert!(err.to_string().contains("username empty"));

        let err = translate_grant(&command(Some(PermissionScope::Table), "bob", &[]), None, "r").unwrap_err();
        assert!(err.to_string().contains("no action specified"));

        // 인식되지 않는 코드만 있으면 빈 권한 목록으로 보내지 않음
        let err = translate_grant(&command(Some(PermissionScope::Table), "bob", &["Z", "execute"]), None, "r").unwrap_err();
        assert_eq!(err.to_string(), "validation error: grant(): invalid data - no action specified");
        assert_eq!(err.status_code(), 400);

        // namespace scope는 무시되어 대상이 비게 됨
        let err = translate_revoke(&command(Some(PermissionScope::Namespace), "bob", &[]), None, "r").unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation error: revoke(): table/columnFamily/columnQualifier not specified"
        );
    }

    #[tokio::test]
    async fn test_service_flag_gates_translation() {
        let disabled = GrantRevokeService::new(&GuardConfig::default(), RecordingAdmin::default());
        let err = disabled
            .grant(&command(Some(PermissionScope::Global), "bob", &["R"]), Some("admin"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "FEATURE_DISABLED");
        assert!(disabled.admin.records.lock().unwrap().is_empty());

        let config = GuardConfig {
            update_policies_on_grant_revoke: true,
            ..GuardConfig::default()
        };
        let enabled = GrantRevokeService::new(&config, RecordingAdmin::default());
        enabled
            .grant(&command(Some(PermissionScope::Global), "bob", &["R"]), Some("admin"))
            .await
            .unwrap();
        enabled
            .revoke(&command(Some(PermissionScope::Table), "bob", &[]), Some("admin"))
            .await
            .unwrap();

        let records = enabled.admin.records.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, "grant");
        assert_eq!(records[1].1.repository_name, "bulwark");
    }
}
