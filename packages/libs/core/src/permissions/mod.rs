//! 접근 권한 평가
//!
//! # 개요
//!
//! 호스트 연산을 (table, family, column) 단위 요청으로 나누어 Oracle에 묻고,
//! 결과를 전체 허용/부분 허용/거부로 집계합니다.
//!
//! # 모듈 구조
//!
//! - `action`: 접근 종류
//! - `request`: 불변 요청과 판정
//! - `audit`: 감사 이벤트와 sink
//! - `session`: Oracle trait과 권한 세션
//! - `evaluator`: family map 평가기
//! - `policy`: 정적 YAML 정책 Oracle

mod action;
mod audit;
mod evaluator;
mod policy;
mod request;
mod session;

pub use action::Action;
pub use audit::{AuditEvent, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use evaluator::{AccessEvaluator, FamilyAccessResult, RegionContext};
pub use policy::{AuditSettings, PolicyDocument, PolicyResource, PolicyRule, StaticPolicyOracle};
pub use request::{AccessRequest, AccessRequestBuilder, Verdict};
pub use session::{AuthorizationSession, PolicyOracle};
