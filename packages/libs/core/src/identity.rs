//! 호출 주체(Identity)와 호출 컨텍스트
//!
//! 인바운드 호출마다 한 번 identity를 확정해 task-local 컨텍스트에 심어 둡니다.
//! 컨텍스트가 없는 내부 작업(백그라운드 작업 등)은 프로세스 system identity로 대체합니다.

use std::future::Future;

use serde::{Deserialize, Serialize};

/// 요청 주체
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// 짧은 표시 이름 (super-user 목록, scanner 소유자 비교에 사용)
    pub short_name: String,

    /// 소속 그룹
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Identity {
    pub fn new(short_name: impl Into<String>) -> Self {
        Self {
            short_name: short_name.into(),
            groups: Vec::new(),
        }
    }

    /// 그룹 설정
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }

    /// 특정 그룹 소속 여부
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

/// 호출 컨텍스트
///
/// 하나의 인바운드 호출 동안 유지되는 identity와 원격 주소입니다.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub identity: Identity,
    pub remote_address: Option<String>,
}

tokio::task_local! {
    static CALL_CONTEXT: CallContext;
}

impl CallContext {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            remote_address: None,
        }
    }

    /// 원격 주소 설정
    pub fn with_remote_address(mut self, remote_address: Option<String>) -> Self {
        self.remote_address = remote_address;
        self
    }

    /// 비동기 작업 범위에 컨텍스트 설치
    pub async fn scope<F>(self, f: F) -> F::Output
    where
        F: Future,
    {
        CALL_CONTEXT.scope(self, f).await
    }

    /// 동기 클로저 범위에 컨텍스트 설치
    pub fn sync_scope<F, R>(self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        CALL_CONTEXT.sync_scope(self, f)
    }

    /// 현재 설치된 컨텍스트
    pub fn current() -> Option<CallContext> {
        CALL_CONTEXT.try_with(|ctx| ctx.clone()).ok()
    }

    /// 컨텍스트 안에서 실행 중인지 여부
    pub fn in_call_context() -> bool {
        CALL_CONTEXT.try_with(|_| ()).is_ok()
    }

    /// 현재 호출자의 표시 이름
    pub fn current_user_name() -> Option<String> {
        CALL_CONTEXT
            .try_with(|ctx| ctx.identity.short_name.clone())
            .ok()
    }

    /// 현재 호출자의 원격 주소
    pub fn current_remote_address() -> Option<String> {
        CALL_CONTEXT
            .try_with(|ctx| ctx.remote_address.clone())
            .ok()
            .flatten()
    }
}

/// 프로세스 system identity 이름 결정
///
/// 명시 설정이 우선이며, 없으면 `$USER`를 사용합니다.
pub fn resolve_system_user(configured: Option<&str>) -> Option<String> {
    configured
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var("USER").ok().filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_scope() {
        assert!(!CallContext::in_call_context());
        assert_eq!(CallContext::current_user_name(), None);

        let ctx = CallContext::new(Identity::new("alice"))
            .with_remote_address(Some("10.0.0.7".to_string()));
        ctx.sync_scope(|| {
            assert!(CallContext::in_call_context());
            assert_eq!(CallContext::current_user_name().as_deref(), Some("alice"));
            assert_eq!(
                CallContext::current_remote_address().as_deref(),
                Some("10.0.0.7")
            );
        });

        assert!(!CallContext::in_call_context());
    }

    #[tokio::test]
    async fn test_async_scope() {
        let name = CallContext::new(Identity::new("bob"))
            .scope(async { CallContext::current_user_name() })
            .await;
        assert_eq!(name.as_deref(), Some("bob"));
    }

    #[test]
    fn test_groups_and_system_user() {
        let identity = Identity::new("carol").with_groups(vec!["analysts".to_string()]);
        assert!(identity.in_group("analysts"));
        assert!(!identity.in_group("admins"));

        assert_eq!(resolve_system_user(Some(" hbase ")).as_deref(), Some("hbase"));
    }
}
