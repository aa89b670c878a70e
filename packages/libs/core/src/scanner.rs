//! Scanner 소유자 레지스트리
//!
//! 열린 scanner(cursor)마다 연 사용자를 기록해 두고, 이후 next/close 호출이
//! 같은 사용자에게서 왔는지 확인합니다.
//!
//! 등록은 `ScannerLease`에 묶여 있어 lease가 drop되면 자동으로 해제됩니다.
//! 같은 handle이 재사용되더라도 이전 lease는 새 등록을 지우지 못합니다.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identity::{CallContext, Identity};

/// Scanner handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScannerId(pub u64);

impl fmt::Display for ScannerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct Registration {
    owner: String,
    generation: u64,
}

#[derive(Debug, Default)]
struct RegistryInner {
    owners: DashMap<ScannerId, Registration>,
    next_generation: AtomicU64,
    next_id: AtomicU64,
}

/// Scanner 소유자 레지스트리 (복제해도 같은 저장소를 공유)
#[derive(Debug, Clone, Default)]
pub struct ScannerRegistry {
    inner: Arc<RegistryInner>,
}

/// 등록 lease
///
/// drop되면 자신이 만든 등록만 해제합니다.
#[derive(Debug)]
#[must_use = "dropping the lease unregisters the scanner"]
pub struct ScannerLease {
    registry: ScannerRegistry,
    scanner: ScannerId,
    generation: u64,
}

impl ScannerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 새 scanner handle 할당
    pub fn allocate_id(&self) -> ScannerId {
        ScannerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// scanner 소유자 등록
    ///
    /// identity가 없거나 표시 이름이 비어 있으면 아무것도 하지 않습니다.
    pub fn register(&self, scanner: ScannerId, identity: Option<&Identity>) -> Option<ScannerLease> {
        let owner = identity
            .map(|i| i.short_name.as_str())
            .filter(|name| !name.is_empty())?;

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        self.inner.owners.insert(
            scanner,
            Registration {
                owner: owner.to_string(),
                generation,
            },
        );
        tracing::debug!(scanner = %scanner, owner, "Registered scanner owner");

        Some(ScannerLease {
            registry: self.clone(),
            scanner,
            generation,
        })
    }

    /// 등록된 소유자
    pub fn owner(&self, scanner: ScannerId) -> Option<String> {
        self.inner.owners.get(&scanner).map(|r| r.owner.clone())
    }

    /// 호출자가 소유자인지 확인
    ///
    /// 호출 컨텍스트 밖(내부 작업)에서는 항상 통과합니다.
    pub fn check_owner(&self, scanner: ScannerId) -> Result<()> {
        match CallContext::current() {
            Some(ctx) => self.check_owner_for(scanner, &ctx.identity.short_name),
            None => Ok(()),
        }
    }

    /// 명시한 호출자로 소유자 확인
    pub fn check_owner_for(&self, scanner: ScannerId, caller: &str) -> Result<()> {
        match self.owner(scanner) {
            Some(owner) if owner != caller => {
                tracing::debug!(scanner = %scanner, %owner, caller, "Scanner owner mismatch");
                Err(Error::access_denied(format!(
                    "User '{}' is not the scanner owner!",
                    caller
                )))
            }
            _ => Ok(()),
        }
    }

    /// 등록 해제 (scanner close 이후)
    pub fn unregister(&self, scanner: ScannerId) {
        if self.inner.owners.remove(&scanner).is_some() {
            tracing::debug!(scanner = %scanner, "Unregistered scanner owner");
        }
    }

    pub fn len(&self) -> usize {
        self.inner.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.owners.is_empty()
    }
}

impl ScannerLease {
    pub fn scanner(&self) -> ScannerId {
        self.scanner
    }
}

impl Drop for ScannerLease {
    fn drop(&mut self) {
        let generation = self.generation;
        let removed = self
            .registry
            .inner
            .owners
            .remove_if(&self.scanner, |_, r| r.generation == generation);
        if removed.is_some() {
            tracing::debug!(scanner = %self.scanner, "Scanner lease dropped, owner unregistered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_context<R>(user: &str, f: impl FnOnce() -> R) -> R {
        CallContext::new(Identity::new(user)).sync_scope(f)
    }

    #[test]
    fn test_scanner_ownership() {
        let registry = ScannerRegistry::new();
        let scanner = registry.allocate_id();
        let _lease = registry.register(scanner, Some(&Identity::new("alice"))).unwrap();

        let err = in_context("bob", || registry.check_owner(scanner)).unwrap_err();
        assert_eq!(err.to_string(), "access denied: User 'bob' is not the scanner owner!");
        in_context("alice", || registry.check_owner(scanner)).unwrap();

        // 컨텍스트 밖에서는 검사하지 않음
        registry.check_owner(scanner).unwrap();

        registry.unregister(scanner);
        assert!(registry.is_empty());
        in_context("bob", || registry.check_owner(scanner)).unwrap();

        let _again = registry.register(scanner, Some(&Identity::new("bob"))).unwrap();
        in_context("bob", || registry.check_owner(scanner)).unwrap();
        assert!(in_context("alice", || registry.check_owner(scanner)).is_err());
    }

    #[test]
    fn test_register_without_name_is_noop() {
        let registry = ScannerRegistry::new();
        assert!(registry.register(ScannerId(1), None).is_none());
        assert!(registry.register(ScannerId(1), Some(&Identity::new(""))).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lease_drop_unregisters() {
        let registry = ScannerRegistry::new();
        let scanner = ScannerId(7);

        let lease = registry.register(scanner, Some(&Identity::new("alice"))).unwrap();
        assert_eq!(registry.owner(scanner).as_deref(), Some("alice"));
        drop(lease);
        assert_eq!(registry.owner(scanner), None);
    }

    #[test]
    fn test_stale_lease_keeps_newer_registration() {
        let registry = ScannerRegistry::new();
        let scanner = ScannerId(7);

        let stale = registry.register(scanner, Some(&Identity::new("alice"))).unwrap();
        registry.unregister(scanner);
        let fresh = registry.register(scanner, Some(&Identity::new("bob"))).unwrap();

        drop(stale);
        assert_eq!(registry.owner(scanner).as_deref(), Some("bob"));
        assert_eq!(fresh.scanner(), scanner);
        drop(fresh);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_allocate_ids_are_unique() {
        let registry = ScannerRegistry::new();
        let clone = registry.clone();
        let a = registry.allocate_id();
        let b = clone.allocate_id();
        assert_ne!(a, b);
    }
}
