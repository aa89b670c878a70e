//! Bridge 앱 상태

use std::sync::Arc;
use std::time::{Duration, Instant};

use bwk_core::grant::GrantRevokeService;
use bwk_core::permissions::{AuditSink, PolicyOracle, StaticPolicyOracle, TracingAuditSink};
use bwk_core::scanner::{ScannerId, ScannerLease};
use bwk_core::AccessGuard;
use dashmap::DashMap;

use crate::admin::AdminBackend;
use crate::config::Config;

/// 열린 scanner
///
/// lease를 들고 있는 동안만 소유자 등록이 유지됩니다.
pub struct OpenScanner {
    pub table: String,
    pub last_used: Instant,
    _lease: Option<ScannerLease>,
}

/// 앱 상태
///
/// 모든 핸들러에서 공유하는 상태입니다.
pub struct AppState {
    /// 설정
    pub config: Config,

    /// 권한 평가 진입점
    pub guard: AccessGuard,

    /// grant/revoke 서비스
    pub grants: GrantRevokeService<AdminBackend>,

    /// 열린 scanner (id → lease)
    pub scanners: DashMap<ScannerId, OpenScanner>,
}

impl AppState {
    /// 새 상태 생성
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let oracle = StaticPolicyOracle::load(&config.policy_path)?;
        let admin = AdminBackend::from_url(
            config.admin_url.as_deref(),
            Duration::from_secs(config.admin_timeout_secs),
        )?;
        Ok(Self::with_parts(
            config.clone(),
            Arc::new(oracle),
            Arc::new(TracingAuditSink),
            admin,
        ))
    }

    /// 구성 요소를 직접 지정해 생성
    pub fn with_parts(
        config: Config,
        oracle: Arc<dyn PolicyOracle>,
        audit_sink: Arc<dyn AuditSink>,
        admin: AdminBackend,
    ) -> Self {
        let guard_config = config.guard_config();
        let grants = GrantRevokeService::new(&guard_config, admin);
        Self {
            config,
            guard: AccessGuard::new(oracle, guard_config, audit_sink),
            grants,
            scanners: DashMap::new(),
        }
    }

    /// scanner 보관
    pub fn track_scanner(&self, scanner: ScannerId, table: String, lease: Option<ScannerLease>) {
        self.scanners.insert(
            scanner,
            OpenScanner {
                table,
                last_used: Instant::now(),
                _lease: lease,
            },
        );
    }

    /// 사용 시각 갱신 (없으면 false)
    pub fn touch_scanner(&self, scanner: ScannerId) -> bool {
        match self.scanners.get_mut(&scanner) {
            Some(mut open) => {
                open.last_used = Instant::now();
                true
            }
            None => false,
        }
    }

    /// scanner 제거 (lease drop으로 소유자 등록도 해제)
    pub fn release_scanner(&self, scanner: ScannerId) -> bool {
        self.scanners.remove(&scanner).is_some()
    }

    /// 유휴 scanner 만료
    pub fn expire_idle_scanners(&self, max_idle: Duration) -> usize {
        let before = self.scanners.len();
        self.scanners
            .retain(|_, open| open.last_used.elapsed() < max_idle);
        let expired = before.saturating_sub(self.scanners.len());
        if expired > 0 {
            tracing::info!("Expired {} idle scanners", expired);
        }
        expired
    }

    /// 유휴 scanner 정리 작업 시작
    pub fn spawn_scanner_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let state = Arc::clone(self);
        let max_idle = Duration::from_secs(state.config.scanner_idle_secs);
        let period = (max_idle / 4).max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                state.expire_idle_scanners(max_idle);
            }
        })
    }
}
