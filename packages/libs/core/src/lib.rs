//! bwk-core: Bulwark 권한 평가 핵심 라이브러리
//!
//! 이 크레이트는 Bridge와 CLI가 공유하는 권한 평가 엔진을 제공합니다.
//!
//! # 모듈 구조
//!
//! - `permissions`: 요청/판정, Oracle trait, 평가기, 정적 YAML 정책
//! - `filter`: 부분 허용 결과 필터
//! - `scanner`: scanner 소유자 레지스트리
//! - `grant`: grant/revoke 변환
//! - `guard`: 호스트 hook 진입점
//! - `identity`: 호출 주체와 task-local 호출 컨텍스트
//! - `resource`: table/family/column 좌표
//! - `config`: 평가 엔진 설정
//! - `error`: 공통 에러 타입

pub mod config;
pub mod error;
pub mod filter;
pub mod grant;
pub mod guard;
pub mod identity;
pub mod permissions;
pub mod resource;
pub mod scanner;

pub use config::GuardConfig;
pub use error::{Error, Result};
pub use guard::AccessGuard;
