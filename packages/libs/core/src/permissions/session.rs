//! 권한 세션
//!
//! 한 호출 동안 변하지 않는 필드(operation, identity, action, table 등)를 들고,
//! 검사마다 새 요청을 만들어 Oracle에 넘깁니다.

use super::audit::AuditSink;
use super::request::{AccessRequest, AccessRequestBuilder, Verdict};
use crate::error::{Error, Result};

/// 정책 판정 Oracle
///
/// 단일 (user, resource, action) 요청에 대해 허용/거부를 결정합니다.
/// 감사 이벤트는 부수효과가 아니라 반환값(`Verdict::audit`)으로 돌려줍니다.
pub trait PolicyOracle: Send + Sync {
    fn decide(&self, request: &AccessRequest) -> Verdict;
}

impl<T: PolicyOracle + ?Sized> PolicyOracle for std::sync::Arc<T> {
    fn decide(&self, request: &AccessRequest) -> Verdict {
        (**self).decide(request)
    }
}

/// 권한 세션
pub struct AuthorizationSession<'a> {
    oracle: &'a dyn PolicyOracle,
    request: AccessRequestBuilder,
    audit_sink: Option<&'a dyn AuditSink>,
}

impl<'a> AuthorizationSession<'a> {
    /// 감사 sink 없는 세션 생성
    pub fn new(oracle: &'a dyn PolicyOracle, request: AccessRequestBuilder) -> Self {
        Self {
            oracle,
            request,
            audit_sink: None,
        }
    }

    /// 감사 sink 설정
    pub fn audit_sink(mut self, sink: &'a dyn AuditSink) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    pub fn request(&self) -> &AccessRequestBuilder {
        &self.request
    }

    /// 테이블 수준 검사 (테이블이 없으면 global scope)
    pub fn authorize_table(&self) -> Verdict {
        self.authorize(&self.request.build_table())
    }

    /// Column family 수준 검사
    pub fn authorize_family(&self, family: &str) -> Verdict {
        self.authorize(&self.request.build_family(family))
    }

    /// Column 수준 검사
    pub fn authorize_column(&self, family: &str, column: &str) -> Verdict {
        self.authorize(&self.request.build_column(family, column))
    }

    /// 완성된 요청 검사
    pub fn authorize(&self, request: &AccessRequest) -> Verdict {
        let verdict = self.oracle.decide(request);
        tracing::trace!(
            operation = %request.operation,
            action = %request.action,
            resource = ?request.resource,
            user = %request.identity.short_name,
            allowed = verdict.allowed,
            "authorize"
        );
        verdict
    }

    /// 판정의 감사 이벤트를 sink로 내보냄 (단일 판정 호출 지점용)
    ///
    /// 거부 판정이면 이벤트를 기록한 뒤 `AccessDenied`를 돌려줍니다.
    pub fn publish_results(&self, verdict: &Verdict) -> Result<()> {
        if let (Some(sink), Some(event)) = (self.audit_sink, verdict.audit.as_ref()) {
            sink.log_event(event);
        }

        if verdict.allowed {
            Ok(())
        } else {
            Err(Error::access_denied(self.denial_reason(verdict)))
        }
    }

    /// 거부 사유 (Oracle이 사유를 주지 않으면 요청 필드로 구성)
    pub fn denial_reason(&self, verdict: &Verdict) -> String {
        if let Some(reason) = verdict.denial_reason() {
            return reason.to_string();
        }
        let mut reason = format!(
            "Insufficient permissions for user '{}', action: {}",
            self.request.identity().short_name,
            self.request.operation()
        );
        match self.request.table_name() {
            Some(table) => reason.push_str(&format!(", tableName:{}", table)),
            None => reason.push_str(", scope:global"),
        }
        reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::permissions::action::Action;
    use crate::permissions::audit::{AuditEvent, MemoryAuditSink};

    struct FamilyOnlyOracle;

    impl PolicyOracle for FamilyOnlyOracle {
        fn decide(&self, request: &AccessRequest) -> Verdict {
            let allowed = request.family() == Some("d") && request.column().is_none();
            let audit = Some(AuditEvent::for_request(request, allowed, None));
            if allowed {
                Verdict::allow(audit)
            } else {
                Verdict::deny("not allowed", audit)
            }
        }
    }

    #[test]
    fn test_session_checks() {
        let builder = AccessRequest::builder("get", Action::Read, Identity::new("alice"))
            .table(Some("orders".to_string()));
        let session = AuthorizationSession::new(&FamilyOnlyOracle, builder);

        assert!(!session.authorize_column("d", "amount").is_authorized());
        assert!(session.authorize_family("d").is_authorized());
        let verdict = session.authorize_table();
        assert!(!verdict.is_authorized());
        assert_eq!(verdict.denial_reason(), Some("not allowed"));
    }

    #[test]
    fn test_publish_results() {
        let sink = MemoryAuditSink::new();
        let builder = AccessRequest::builder("get", Action::Read, Identity::new("alice"))
            .table(Some("orders".to_string()));

        let unaudited = AuthorizationSession::new(&FamilyOnlyOracle, builder.clone());
        let verdict = unaudited.authorize_family("d");
        unaudited.publish_results(&verdict).unwrap();
        assert!(sink.is_empty());

        let session = AuthorizationSession::new(&FamilyOnlyOracle, builder).audit_sink(&sink);
        let verdict = session.authorize_family("d");
        session.publish_results(&verdict).unwrap();
        assert_eq!(sink.events().len(), 1);
        assert!(sink.events()[0].allowed);

        // 거부도 기록한 뒤 AccessDenied
        let verdict = session.authorize_table();
        let err = session.publish_results(&verdict).unwrap_err();
        assert!(err.is_access_denied());
        assert_eq!(err.to_string(), "access denied: not allowed");
        assert_eq!(sink.events().len(), 2);
        assert!(!sink.events()[1].allowed);
    }
}
