//! Bridge HTTP 클라이언트

use anyhow::Context as _;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::CliConfig;

/// 호출자 이름 헤더 (bridge와 동일)
const USER_HEADER: &str = "x-bwk-user";

/// 호스트 API key 헤더 (bridge와 동일)
const API_KEY_HEADER: &str = "x-bwk-api-key";

/// 호스트 key와 호출자 이름을 실어 보내는 Bridge 클라이언트
pub struct BridgeClient {
    client: Client,
    base_url: String,
    user: String,
    api_key: Option<String>,
}

impl BridgeClient {
    pub fn from_config(config: &CliConfig) -> anyhow::Result<Self> {
        let api_key = config.api_key();
        if api_key.is_none() {
            tracing::warn!("No BWK_API_KEY configured, the bridge will reject the request unless auth is disabled");
        }
        Ok(Self {
            client: Client::new(),
            base_url: config.bridge_url()?,
            user: config.user()?,
            api_key,
        })
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let req = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header(USER_HEADER, &self.user);
        match &self.api_key {
            Some(key) => req.header(API_KEY_HEADER, key),
            None => req,
        }
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> anyhow::Result<T> {
        let resp = self.post(path).json(body).send().await.context("request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("request failed ({}): {}", status, text));
        }
        resp.json::<T>().await.context("invalid json response")
    }
}
