//! CLI 설정
//!
//! 우선순위: 명령줄 옵션 > `~/.bwk/config.json` > 환경변수.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// CLI 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Bridge URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge_url: Option<String>,

    /// 호출자 이름 (grant/revoke의 grantor)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Bridge 호스트 API key (`{id}:{secret}`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// 로컬 검사에 쓸 정책 파일
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
}

impl CliConfig {
    fn config_path() -> anyhow::Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?;
        Ok(home.join(".bwk").join("config.json"))
    }

    /// 설정 로드 (파일이 없으면 빈 설정)
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config file {}: {}", path.display(), e))
    }

    /// 명령줄 옵션 적용
    pub fn with_overrides(mut self, bridge: Option<String>, user: Option<String>, policy: Option<String>) -> Self {
        self.bridge_url = bridge.or(self.bridge_url);
        self.user = user.or(self.user);
        self.policy = policy.or(self.policy);
        self
    }

    pub fn bridge_url(&self) -> anyhow::Result<String> {
        self.bridge_url
            .clone()
            .or_else(|| env_value("BWK_BRIDGE_URL"))
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| anyhow::anyhow!("Bridge URL not configured. Use --bridge or set BWK_BRIDGE_URL"))
    }

    pub fn user(&self) -> anyhow::Result<String> {
        self.user
            .clone()
            .filter(|u| !u.is_empty())
            .or_else(|| env_value("BWK_USER"))
            .or_else(|| env_value("USER"))
            .ok_or_else(|| anyhow::anyhow!("User not configured. Use --as or set BWK_USER"))
    }

    /// 호스트 API key (bridge가 인증을 끈 경우 없어도 됨)
    pub fn api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| env_value("BWK_API_KEY"))
    }

    pub fn policy_path(&self) -> anyhow::Result<String> {
        self.policy
            .clone()
            .or_else(|| env_value("BWK_POLICY_PATH"))
            .ok_or_else(|| anyhow::anyhow!("Policy file not specified. Use --policy or set BWK_POLICY_PATH"))
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_override_config_file() {
        let config: CliConfig = serde_json::from_str(
            r#"{"bridge_url": "http://bridge.local:3100/", "user": "admin", "api_key": "cli:s3cret"}"#,
        )
        .unwrap();
        assert_eq!(config.bridge_url().unwrap(), "http://bridge.local:3100");
        assert_eq!(config.api_key().as_deref(), Some("cli:s3cret"));

        let config = config.with_overrides(
            Some("http://other:3100".to_string()),
            None,
            Some("policy.yaml".to_string()),
        );
        assert_eq!(config.bridge_url().unwrap(), "http://other:3100");
        assert_eq!(config.user().unwrap(), "admin");
        assert_eq!(config.policy_path().unwrap(), "policy.yaml");
    }
}
