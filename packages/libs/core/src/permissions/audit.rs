//! 감사(audit) 이벤트와 sink
//!
//! 판정마다 만들어진 이벤트는 평가기가 허용/거부로 분류한 뒤,
//! 호출이 끝날 때 `AuditSink`로 한 번에 내보냅니다.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::action::Action;
use super::request::AccessRequest;

/// 감사 이벤트
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub operation: String,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_address: Option<String>,
    pub event_time: DateTime<Utc>,
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_information: Option<String>,
}

impl AuditEvent {
    /// 요청과 판정으로부터 이벤트 생성
    pub fn for_request(request: &AccessRequest, allowed: bool, reason: Option<String>) -> Self {
        Self {
            operation: request.operation.clone(),
            action: request.action,
            table: request.table().map(str::to_string),
            family: request.family().map(str::to_string),
            column: request.column().map(str::to_string),
            user: request.identity.short_name.clone(),
            remote_address: request.remote_address.clone(),
            event_time: Utc::now(),
            allowed,
            reason,
            other_information: request.other_information.clone(),
        }
    }
}

/// 감사 이벤트 출력 대상
pub trait AuditSink: Send + Sync {
    /// 이벤트 하나 기록
    fn log_event(&self, event: &AuditEvent);

    /// 이벤트 여러 개 기록
    fn log_events(&self, events: &[AuditEvent]) {
        for event in events {
            self.log_event(event);
        }
    }
}

/// `bwk::audit` target으로 JSON 한 줄씩 기록하는 sink
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn log_event(&self, event: &AuditEvent) {
        match serde_json::to_string(event) {
            Ok(json) => tracing::info!(target: "bwk::audit", "{}", json),
            Err(e) => tracing::warn!(target: "bwk::audit", "Failed to serialize audit event: {}", e),
        }
    }
}

/// 메모리에 쌓아 두는 sink (CLI 출력, 테스트용)
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 기록된 이벤트 복사본
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// 기록된 이벤트를 꺼내고 비움
    pub fn take(&self) -> Vec<AuditEvent> {
        std::mem::take(
            &mut *self
                .events
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn log_event(&self, event: &AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;

    #[test]
    fn test_event_from_request() {
        let request = AccessRequest::builder("put", Action::Write, Identity::new("alice"))
            .remote_address(Some("10.0.0.1".to_string()))
            .table(Some("orders".to_string()))
            .build_column("d", "amount");

        let event = AuditEvent::for_request(&request, false, Some("denied".to_string()));
        assert_eq!(event.table.as_deref(), Some("orders"));
        assert_eq!(event.family.as_deref(), Some("d"));
        assert_eq!(event.column.as_deref(), Some("amount"));
        assert_eq!(event.user, "alice");
        assert!(!event.allowed);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["action"], "write");
        assert!(json.get("other_information").is_none());
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemoryAuditSink::new();
        let request = AccessRequest::builder("get", Action::Read, Identity::new("bob")).build_table();
        let event = AuditEvent::for_request(&request, true, None);

        sink.log_events(&[event.clone(), event]);
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.take().len(), 2);
        assert!(sink.is_empty());
    }
}
