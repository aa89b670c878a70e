//! HTTP 핸들러

pub mod grants;
pub mod health;
pub mod hooks;
pub mod permissions;
pub mod scanners;
