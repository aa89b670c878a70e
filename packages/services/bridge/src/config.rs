//! Bridge 설정

use std::env;
use std::net::IpAddr;

use bwk_core::GuardConfig;

use crate::auth::HostApiKey;

/// Bridge 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 바인드 주소
    pub host: IpAddr,

    /// 서버 포트
    pub port: u16,

    /// 호스트 API key 목록
    pub api_keys: Vec<HostApiKey>,

    /// 호스트 인증 비활성화 (개발 모드)
    pub disable_auth: bool,

    /// 정책 파일 경로 (policy.yaml)
    pub policy_path: String,

    /// super-user 목록
    pub super_users: Vec<String>,

    /// grant/revoke 정책 갱신 활성화
    pub grant_revoke_enabled: bool,

    /// 정책 admin 서비스의 저장소 이름
    pub repository_name: String,

    /// 원격 정책 admin URL (없으면 로그만 남김)
    pub admin_url: Option<String>,

    /// 원격 admin 호출 타임아웃 (초)
    pub admin_timeout_secs: u64,

    /// 유휴 scanner 만료 시간 (초)
    pub scanner_idle_secs: u64,

    /// system identity (없으면 $USER)
    pub system_user: Option<String>,
}

impl Config {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: env::var("BWK_BRIDGE_HOST")
                .unwrap_or_else(|_| "127.0.0.1".to_string())
                .parse()?,

            port: env::var("BWK_BRIDGE_PORT")
                .unwrap_or_else(|_| "3100".to_string())
                .parse()?,

            api_keys: env::var("BWK_API_KEYS")
                .ok()
                .map(|v| parse_api_keys(&v))
                .transpose()?
                .unwrap_or_default(),

            disable_auth: env::var("BWK_DISABLE_AUTH")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),

            policy_path: env::var("BWK_POLICY_PATH")
                .unwrap_or_else(|_| "config/policy.yaml".to_string()),

            super_users: env::var("BWK_SUPER_USERS")
                .ok()
                .map(|v| parse_list(&v))
                .unwrap_or_default(),

            grant_revoke_enabled: env::var("BWK_GRANT_REVOKE_ENABLED")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),

            repository_name: env::var("BWK_REPOSITORY_NAME")
                .unwrap_or_else(|_| "bulwark".to_string()),

            admin_url: env::var("BWK_ADMIN_URL")
                .ok()
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty()),

            admin_timeout_secs: env::var("BWK_ADMIN_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),

            scanner_idle_secs: env::var("BWK_SCANNER_IDLE_SECS")
                .unwrap_or_else(|_| "600".to_string())
                .parse()
                .unwrap_or(600),

            system_user: env::var("BWK_SYSTEM_USER").ok().filter(|s| !s.is_empty()),
        })
    }

    /// 평가 엔진 설정
    pub fn guard_config(&self) -> GuardConfig {
        GuardConfig {
            update_policies_on_grant_revoke: self.grant_revoke_enabled,
            repository_name: self.repository_name.clone(),
            system_user: self.system_user.clone(),
            ..GuardConfig::default()
        }
        .with_super_users(&self.super_users)
    }
}

/// 콤마 구분 목록
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// 콤마 구분 `{id}:{secret}` 목록
pub fn parse_api_keys(value: &str) -> anyhow::Result<Vec<HostApiKey>> {
    parse_list(value)
        .iter()
        .map(|entry| {
            HostApiKey::from_header_value(entry).ok_or_else(|| {
                let id = entry.split(':').next().unwrap_or_default();
                anyhow::anyhow!("Invalid BWK_API_KEYS entry '{}' (expected id:secret)", id)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list(" root, ops ,,"), vec!["root", "ops"]);
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_parse_api_keys() {
        let keys = parse_api_keys("regionserver:abc, master:x:y").unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[1].id, "master");
        assert!(keys[1].matches(&HostApiKey::new("master", "x:y")));

        let err = parse_api_keys("regionserver:abc,broken").unwrap_err();
        assert!(err.to_string().contains("'broken'"));
    }

    #[test]
    fn test_guard_config() {
        let config = Config {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3100,
            api_keys: Vec::new(),
            disable_auth: false,
            policy_path: "policy.yaml".to_string(),
            super_users: vec!["root".to_string()],
            grant_revoke_enabled: true,
            repository_name: "prod".to_string(),
            admin_url: None,
            admin_timeout_secs: 10,
            scanner_idle_secs: 600,
            system_user: Some("hbase".to_string()),
        };
        let guard = config.guard_config();
        assert!(guard.is_super_user("root"));
        assert!(guard.update_policies_on_grant_revoke);
        assert_eq!(guard.repository_name, "prod");
        assert_eq!(guard.system_user_name().as_deref(), Some("hbase"));
        assert!(guard.is_metadata_table("system:meta"));
    }
}
