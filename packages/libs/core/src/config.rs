//! 평가 엔진 설정

use serde::{Deserialize, Serialize};

use crate::identity::resolve_system_user;

/// 기본 메타데이터 테이블 이름
///
/// 기존 HBase 배포의 카탈로그 테이블은 `hbase:meta`입니다. 이 목록은 두 이름을 모두
/// 포함하지만, 다른 이름을 쓰는 배포에서 설정을 옮길 때는 `metadata_tables`를 명시해야
/// 메타데이터 region 보호가 유지됩니다.
pub const DEFAULT_METADATA_TABLES: [&str; 4] = ["system:meta", "hbase:meta", ".META.", "-ROOT-"];

/// 평가 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// super-user 목록 (표시 이름 정확히 일치)
    #[serde(default)]
    pub super_users: Vec<String>,

    /// grant/revoke 변환 경로 활성화 여부
    #[serde(default)]
    pub update_policies_on_grant_revoke: bool,

    /// 정책 admin 서비스에서 이 저장소를 가리키는 이름
    #[serde(default = "default_repository_name")]
    pub repository_name: String,

    /// 예약된 메타데이터 테이블
    #[serde(default = "default_metadata_tables")]
    pub metadata_tables: Vec<String>,

    /// 호출 컨텍스트가 없을 때 사용할 system identity (없으면 `$USER`)
    #[serde(default)]
    pub system_user: Option<String>,
}

fn default_repository_name() -> String {
    "bulwark".to_string()
}

fn default_metadata_tables() -> Vec<String> {
    DEFAULT_METADATA_TABLES.iter().map(|t| t.to_string()).collect()
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            super_users: Vec::new(),
            update_policies_on_grant_revoke: false,
            repository_name: default_repository_name(),
            metadata_tables: default_metadata_tables(),
            system_user: None,
        }
    }
}

impl GuardConfig {
    /// super-user 목록 설정 (공백 제거, 빈 항목 무시)
    pub fn with_super_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.super_users = users
            .into_iter()
            .map(|u| u.as_ref().trim().to_string())
            .filter(|u| !u.is_empty())
            .collect();
        for user in &self.super_users {
            tracing::info!("Adding super user ({})", user);
        }
        self
    }

    pub fn is_super_user(&self, short_name: &str) -> bool {
        self.super_users.iter().any(|u| u == short_name)
    }

    pub fn is_metadata_table(&self, table: &str) -> bool {
        self.metadata_tables.iter().any(|t| t == table)
    }

    /// system identity 이름
    pub fn system_user_name(&self) -> Option<String> {
        resolve_system_user(self.system_user.as_deref())
    }
}
