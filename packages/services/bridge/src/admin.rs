//! 원격 정책 admin 클라이언트

use std::time::Duration;

use bwk_core::grant::{GrantRevokeRecord, LogOnlyPolicyAdmin, PolicyAdmin};
use bwk_core::{Error, Result};
use reqwest::Client;

/// HTTP 정책 admin
///
/// `{base}/grant`, `{base}/revoke`로 레코드를 JSON POST합니다.
#[derive(Debug, Clone)]
pub struct HttpPolicyAdmin {
    client: Client,
    base_url: String,
}

impl HttpPolicyAdmin {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, op: &str) -> String {
        format!("{}/{}", self.base_url, op)
    }

    async fn post(&self, op: &str, record: &GrantRevokeRecord) -> Result<()> {
        let url = self.endpoint(op);
        let resp = self
            .client
            .post(&url)
            .json(record)
            .send()
            .await
            .map_err(|e| Error::Remote {
                message: format!("{} request to {} failed: {}", op, url, e),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Remote {
                message: format!("{} failed ({}): {}", op, status, text),
            });
        }

        tracing::info!(tables = %record.tables, grantor = ?record.grantor, "{} sent to policy admin", op);
        Ok(())
    }
}

impl PolicyAdmin for HttpPolicyAdmin {
    async fn grant_privilege(&self, record: &GrantRevokeRecord) -> Result<()> {
        self.post("grant", record).await
    }

    async fn revoke_privilege(&self, record: &GrantRevokeRecord) -> Result<()> {
        self.post("revoke", record).await
    }
}

/// 설정에 따라 선택되는 admin
#[derive(Debug, Clone)]
pub enum AdminBackend {
    Http(HttpPolicyAdmin),
    LogOnly(LogOnlyPolicyAdmin),
}

impl AdminBackend {
    /// URL이 있으면 HTTP, 없으면 로그만
    pub fn from_url(url: Option<&str>, timeout: Duration) -> anyhow::Result<Self> {
        match url {
            Some(url) => Ok(AdminBackend::Http(HttpPolicyAdmin::new(url, timeout)?)),
            None => Ok(AdminBackend::LogOnly(LogOnlyPolicyAdmin)),
        }
    }
}

impl PolicyAdmin for AdminBackend {
    async fn grant_privilege(&self, record: &GrantRevokeRecord) -> Result<()> {
        match self {
            AdminBackend::Http(admin) => admin.grant_privilege(record).await,
            AdminBackend::LogOnly(admin) => admin.grant_privilege(record).await,
        }
    }

    async fn revoke_privilege(&self, record: &GrantRevokeRecord) -> Result<()> {
        match self {
            AdminBackend::Http(admin) => admin.revoke_privilege(record).await,
            AdminBackend::LogOnly(admin) => admin.revoke_privilege(record).await,
        }
    }
}
