//! 호스트 hook 진입점
//!
//! 호스트의 데이터/스키마/클러스터 연산 hook을 접근 종류와 리소스 범위로 매핑해
//! 평가기에 넘깁니다. 호출마다 평가기를 새로 만들고, scanner 레지스트리만 호출 간에 공유합니다.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::GuardConfig;
use crate::error::{Error, Result};
use crate::filter::{combine_filters, AuthorizationFilter, CellFilter};
use crate::identity::Identity;
use crate::permissions::{AccessEvaluator, Action, AuditSink, PolicyOracle, RegionContext};
use crate::resource::{FamilyMap, ResourceCoordinate};
use crate::scanner::{ScannerId, ScannerLease, ScannerRegistry};

/// 읽기 연산
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadOp {
    Get,
    Exists,
    GetClosestRowBefore,
    ScannerOpen,
}

impl ReadOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadOp::Get => "get",
            ReadOp::Exists => "exists",
            ReadOp::GetClosestRowBefore => "getClosestRowBefore",
            ReadOp::ScannerOpen => "scannerOpen",
        }
    }

    /// 부분 허용 시 필터로 결과를 줄이는 연산인지
    ///
    /// 나머지 읽기 연산은 전부 허용이 아니면 거부합니다.
    pub fn is_filtered(&self) -> bool {
        matches!(self, ReadOp::Get | ReadOp::ScannerOpen)
    }
}

/// 쓰기 연산
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteOp {
    Put,
    Delete,
    Append,
    Increment,
    BulkLoadHFile,
    PrepareBulkLoad,
    CleanupBulkLoad,
}

impl WriteOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteOp::Put => "put",
            WriteOp::Delete => "delete",
            WriteOp::Append => "append",
            WriteOp::Increment => "increment",
            WriteOp::BulkLoadHFile => "bulkLoadHFile",
            WriteOp::PrepareBulkLoad => "prePrepareBulkLoad",
            WriteOp::CleanupBulkLoad => "preCleanupBulkLoad",
        }
    }
}

/// 읽기 후 쓰기 연산 (read, write 모두 필요)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadWriteOp {
    CheckAndPut,
    CheckAndDelete,
    IncrementColumnValue,
}

impl ReadWriteOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadWriteOp::CheckAndPut => "checkAndPut",
            ReadWriteOp::CheckAndDelete => "checkAndDelete",
            ReadWriteOp::IncrementColumnValue => "incrementColumnValue",
        }
    }
}

/// 스키마 관리 연산 (테이블 수준 create 필요)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SchemaOp {
    CreateTable,
    DeleteTable,
    ModifyTable,
    EnableTable,
    DisableTable,
    AddColumn,
    ModifyColumn,
    DeleteColumn,
    Flush,
    Compact,
    CompactSelection,
}

impl SchemaOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaOp::CreateTable => "createTable",
            SchemaOp::DeleteTable => "deleteTable",
            SchemaOp::ModifyTable => "modifyTable",
            SchemaOp::EnableTable => "enableTable",
            SchemaOp::DisableTable => "disableTable",
            SchemaOp::AddColumn => "addColumn",
            SchemaOp::ModifyColumn => "modifyColumn",
            SchemaOp::DeleteColumn => "deleteColumn",
            SchemaOp::Flush => "flush",
            SchemaOp::Compact => "compact",
            SchemaOp::CompactSelection => "compactSelection",
        }
    }
}

/// 클러스터 관리 연산 (admin 필요)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClusterOp {
    // ─────────────────────────────────────────────────────────────────────────
    // Global scope
    // ─────────────────────────────────────────────────────────────────────────
    Balance,
    BalanceSwitch,
    Shutdown,
    StopMaster,
    Stop,
    CloneSnapshot,
    DeleteSnapshot,
    CreateNamespace,
    DeleteNamespace,
    ModifyNamespace,

    // ─────────────────────────────────────────────────────────────────────────
    // Table scope
    // ─────────────────────────────────────────────────────────────────────────
    Snapshot,
    RestoreSnapshot,
    Move,
    Assign,
    Unassign,
    RegionOffline,
    Split,
    Close,
    MergeRegions,
}

impl ClusterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterOp::Balance => "balance",
            ClusterOp::BalanceSwitch => "balanceSwitch",
            ClusterOp::Shutdown => "shutdown",
            ClusterOp::StopMaster => "stopMaster",
            ClusterOp::Stop => "stop",
            ClusterOp::CloneSnapshot => "cloneSnapshot",
            ClusterOp::DeleteSnapshot => "deleteSnapshot",
            ClusterOp::CreateNamespace => "createNamespace",
            ClusterOp::DeleteNamespace => "deleteNamespace",
            ClusterOp::ModifyNamespace => "modifyNamespace",
            ClusterOp::Snapshot => "snapshot",
            ClusterOp::RestoreSnapshot => "restoreSnapshot",
            ClusterOp::Move => "move",
            ClusterOp::Assign => "assign",
            ClusterOp::Unassign => "unassign",
            ClusterOp::RegionOffline => "regionOffline",
            ClusterOp::Split => "split",
            ClusterOp::Close => "close",
            ClusterOp::MergeRegions => "mergeRegions",
        }
    }

    /// 테이블 범위 연산 여부
    pub fn is_table_scoped(&self) -> bool {
        matches!(
            self,
            ClusterOp::Snapshot
                | ClusterOp::RestoreSnapshot
                | ClusterOp::Move
                | ClusterOp::Assign
                | ClusterOp::Unassign
                | ClusterOp::RegionOffline
                | ClusterOp::Split
                | ClusterOp::Close
                | ClusterOp::MergeRegions
        )
    }
}

/// checkPermissions 요청 항목
///
/// `table`이 없으면 region 테이블에 대한 테이블 수준 검사입니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionCheck {
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub column: Option<String>,
    pub actions: Vec<Action>,
}

/// 호스트 hook 진입점
#[derive(Clone)]
pub struct AccessGuard {
    oracle: Arc<dyn PolicyOracle>,
    config: Arc<GuardConfig>,
    audit_sink: Arc<dyn AuditSink>,
    scanners: ScannerRegistry,
}

impl AccessGuard {
    /// 새 guard 생성
    pub fn new(
        oracle: Arc<dyn PolicyOracle>,
        config: GuardConfig,
        audit_sink: Arc<dyn AuditSink>,
    ) -> Self {
        tracing::debug!(super_users = ?config.super_users, "AccessGuard started");
        Self {
            oracle,
            config: Arc::new(config),
            audit_sink,
            scanners: ScannerRegistry::new(),
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn scanners(&self) -> &ScannerRegistry {
        &self.scanners
    }

    fn evaluator(&self) -> AccessEvaluator<'_> {
        AccessEvaluator::new(self.oracle.as_ref(), &self.config, self.audit_sink.as_ref())
    }

    /// 현재 호출자 (없으면 system identity)
    pub fn active_identity(&self) -> Option<Identity> {
        self.evaluator().active_identity()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Data operations
    // ─────────────────────────────────────────────────────────────────────────

    /// 읽기 hook
    ///
    /// 전부 허용이면 `None`, 부분 허용이면 권한 필터를 돌려줍니다.
    /// 필터 없는 읽기 연산은 전부 허용이 아니면 거부합니다.
    pub fn read(
        &self,
        op: ReadOp,
        region: &RegionContext,
        families: &FamilyMap,
    ) -> Result<Option<AuthorizationFilter>> {
        let evaluator = self.evaluator();

        if !op.is_filtered() {
            evaluator.require_permission(op.as_str(), Action::Read, region, families)?;
            return Ok(None);
        }

        let filter = evaluator.authorize_access(op.as_str(), Action::Read, region, families)?;
        match &filter {
            None => tracing::debug!("{}: access allowed for all families/columns", op.as_str()),
            Some(_) => tracing::debug!("{}: access allowed for some of the families/columns", op.as_str()),
        }
        Ok(filter)
    }

    /// 읽기 hook (호스트 필터 결합)
    ///
    /// 결과에 붙일 필터를 돌려줍니다. 권한 필터가 필요 없으면 `existing`을 그대로 돌려줍니다.
    pub fn read_with_filter(
        &self,
        op: ReadOp,
        region: &RegionContext,
        families: &FamilyMap,
        existing: Option<Arc<dyn CellFilter>>,
    ) -> Result<Option<Arc<dyn CellFilter>>> {
        match self.read(op, region, families)? {
            None => Ok(existing),
            Some(filter) => Ok(Some(combine_filters(Arc::new(filter), existing))),
        }
    }

    /// 쓰기 hook
    pub fn write(&self, op: WriteOp, region: &RegionContext, families: &FamilyMap) -> Result<()> {
        self.evaluator()
            .require_permission(op.as_str(), Action::Write, region, families)
    }

    /// 읽기 후 쓰기 hook
    pub fn read_write(&self, op: ReadWriteOp, region: &RegionContext, families: &FamilyMap) -> Result<()> {
        let evaluator = self.evaluator();
        evaluator.require_permission(op.as_str(), Action::Read, region, families)?;
        evaluator.require_permission(op.as_str(), Action::Write, region, families)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scanner lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// scanner 열림 이후: 소유자 등록
    pub fn scanner_opened(&self, scanner: ScannerId) -> Option<ScannerLease> {
        let identity = self.active_identity();
        self.scanners.register(scanner, identity.as_ref())
    }

    /// scanner next 이전
    pub fn scanner_next(&self, scanner: ScannerId) -> Result<()> {
        self.scanners.check_owner(scanner)
    }

    /// scanner close 이전
    pub fn scanner_close(&self, scanner: ScannerId) -> Result<()> {
        self.scanners.check_owner(scanner)
    }

    /// scanner close 이후: 소유자 해제
    pub fn scanner_closed(&self, scanner: ScannerId) {
        self.scanners.unregister(scanner);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Schema & cluster administration
    // ─────────────────────────────────────────────────────────────────────────

    /// 스키마 관리 hook
    pub fn schema(&self, op: SchemaOp, table: &str) -> Result<()> {
        let resource = (!table.is_empty()).then(|| ResourceCoordinate::table(table));
        self.evaluator()
            .authorize_single(op.as_str(), None, Action::Create, resource)
    }

    /// 클러스터 관리 hook
    ///
    /// 테이블 범위 연산에 테이블이 없으면 global scope로 검사합니다.
    pub fn cluster(&self, op: ClusterOp, table: Option<&str>, other_information: Option<&str>) -> Result<()> {
        let resource = if op.is_table_scoped() {
            table
                .filter(|t| !t.is_empty())
                .map(|t| ResourceCoordinate::table(t))
        } else {
            None
        };
        self.evaluator()
            .authorize_single(op.as_str(), other_information, Action::Admin, resource)
    }

    /// region open hook
    ///
    /// 메타데이터 region은 system 또는 super-user만 열 수 있습니다.
    pub fn open(&self, region: &RegionContext) -> Result<()> {
        let Some(table) = region.table_name() else {
            tracing::error!("open: region has no table, access denied");
            return Err(Error::access_denied(
                "Insufficient permissions for operation 'open', action: admin",
            ));
        };

        if region.is_metadata_region || self.config.is_metadata_table(table) {
            return self.require_system_or_super_user();
        }

        self.evaluator()
            .authorize_single("open", None, Action::Admin, Some(ResourceCoordinate::table(table)))
    }

    fn require_system_or_super_user(&self) -> Result<()> {
        self.check_system_or_super_user(self.config.system_user_name().as_deref())
    }

    /// system identity를 알 수 없으면 super-user만 통과합니다.
    fn check_system_or_super_user(&self, system_user: Option<&str>) -> Result<()> {
        let active = self
            .active_identity()
            .map(|i| i.short_name)
            .unwrap_or_default();

        if system_user.is_none() {
            tracing::error!("Unable to obtain the current user, authorization checks for internal operations will not work correctly!");
        }

        let is_system = !active.is_empty() && system_user == Some(active.as_str());
        if is_system || self.config.is_super_user(&active) {
            Ok(())
        } else {
            Err(Error::access_denied(format!(
                "User '{}' is not system or super user.",
                active
            )))
        }
    }

    /// 테이블 descriptor 조회 hook
    ///
    /// 목록이 비어 있으면 global admin, 아니면 각 테이블의 create가 필요합니다.
    pub fn get_table_descriptors(&self, tables: &[String]) -> Result<()> {
        let evaluator = self.evaluator();
        if tables.is_empty() {
            return evaluator.authorize_single("getTableDescriptors", Some("*"), Action::Admin, None);
        }
        for table in tables {
            evaluator.authorize_single(
                "getTableDescriptors",
                None,
                Action::Create,
                Some(ResourceCoordinate::table(table.as_str())),
            )?;
        }
        Ok(())
    }

    /// checkPermissions
    ///
    /// 테이블이 지정된 항목은 region 테이블과 같아야 합니다.
    pub fn check_permissions(&self, region: &RegionContext, checks: &[PermissionCheck]) -> Result<()> {
        let evaluator = self.evaluator();
        let region_table = region.table_name().unwrap_or("");

        for check in checks {
            match check.table.as_deref().filter(|t| !t.is_empty()) {
                Some(requested) => {
                    if requested != region_table {
                        return Err(Error::access_denied(format!(
                            "This method can only execute at the table specified in TablePermission. Table of the region:{} , requested table:{}",
                            region_table, requested
                        )));
                    }

                    let coordinate = ResourceCoordinate::from_parts(
                        requested,
                        check.family.as_deref(),
                        check.column.as_deref(),
                    )?;
                    let mut families = FamilyMap::new();
                    if let Some(family) = coordinate.family_name() {
                        let columns = families.entry(family.to_string()).or_default();
                        if let Some(column) = coordinate.column_name() {
                            columns.insert(column.to_string());
                        }
                    }

                    for action in &check.actions {
                        evaluator.require_permission("checkPermissions", *action, region, &families)?;
                    }
                }
                None => {
                    let resource = (!region_table.is_empty()).then(|| ResourceCoordinate::table(region_table));
                    for action in &check.actions {
                        evaluator.authorize_single("checkPermissions", None, *action, resource.clone())?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::CellRef;
    use crate::identity::CallContext;
    use crate::permissions::{MemoryAuditSink, StaticPolicyOracle};
    use crate::resource::families_only;

    const POLICY: &str = r#"
policies:
  - name: alice-orders
    users: [alice]
    actions: [read, write]
    resource:
      table: orders
      families: [d]
  - name: alice-orders-meta
    users: [alice]
    actions: [read]
    resource:
      table: orders
      families: [m]
      columns: [created]
  - name: dba-orders
    groups: [dba]
    actions: [create, admin]
    resource:
      table: orders
  - name: ops
    groups: [ops]
    actions: [admin]
"#;

    fn guard(sink: Arc<MemoryAuditSink>) -> AccessGuard {
        let oracle = StaticPolicyOracle::from_yaml(POLICY).unwrap();
        let config = GuardConfig {
            system_user: Some("hbase".to_string()),
            ..GuardConfig::default()
        }
        .with_super_users(["root"]);
        AccessGuard::new(Arc::new(oracle), config, sink)
    }

    fn as_user<R>(name: &str, groups: &[&str], f: impl FnOnce() -> R) -> R {
        let identity = Identity::new(name).with_groups(groups.iter().map(|g| g.to_string()).collect());
        CallContext::new(identity).sync_scope(f)
    }

    fn families(spec: &[(&str, &[&str])]) -> FamilyMap {
        spec.iter()
            .map(|(f, cols)| (f.to_string(), cols.iter().map(|c| c.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_get_attaches_combined_filter() {
        let sink = Arc::new(MemoryAuditSink::new());
        let guard = guard(sink.clone());
        let region = RegionContext::for_table("orders");

        #[derive(Debug)]
        struct NotDeleted;
        impl CellFilter for NotDeleted {
            fn admits(&self, cell: CellRef<'_>) -> bool {
                cell.column != "deleted"
            }
        }

        let filter = as_user("alice", &[], || {
            guard
                .read_with_filter(
                    ReadOp::Get,
                    &region,
                    &families(&[("d", &[]), ("m", &["created", "secret"])]),
                    Some(Arc::new(NotDeleted)),
                )
                .unwrap()
                .unwrap()
        });

        assert!(filter.admits(CellRef::new("d", "amount")));
        assert!(!filter.admits(CellRef::new("d", "deleted")));
        assert!(filter.admits(CellRef::new("m", "created")));
        assert!(!filter.admits(CellRef::new("m", "secret")));
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_exists_requires_everything() {
        let guard = guard(Arc::new(MemoryAuditSink::new()));
        let region = RegionContext::for_table("orders");

        as_user("alice", &[], || {
            assert!(guard
                .read(ReadOp::Exists, &region, &families_only(["d"]))
                .unwrap()
                .is_none());
            let err = guard
                .read(ReadOp::Exists, &region, &families_only(["d", "m"]))
                .unwrap_err();
            assert!(err.is_access_denied());
        });
    }

    #[test]
    fn test_read_write_needs_both() {
        let guard = guard(Arc::new(MemoryAuditSink::new()));
        let region = RegionContext::for_table("orders");

        as_user("alice", &[], || {
            guard
                .read_write(ReadWriteOp::CheckAndPut, &region, &families(&[("d", &["amount"])]))
                .unwrap();
            // m:created는 read만 허용
            let err = guard
                .read_write(ReadWriteOp::CheckAndPut, &region, &families(&[("m", &["created"])]))
                .unwrap_err();
            assert!(err.to_string().contains("column: created"));
            guard.write(WriteOp::Put, &region, &families(&[("d", &["amount"])])).unwrap();
        });
    }

    #[test]
    fn test_schema_and_cluster_ops() {
        let sink = Arc::new(MemoryAuditSink::new());
        let guard = guard(sink.clone());

        as_user("dave", &["dba"], || {
            guard.schema(SchemaOp::CreateTable, "orders").unwrap();
            guard.cluster(ClusterOp::Split, Some("orders"), None).unwrap();
            assert!(guard.schema(SchemaOp::DeleteTable, "users").is_err());
            assert!(guard.cluster(ClusterOp::Balance, None, None).is_err());
        });

        as_user("olga", &["ops"], || {
            guard.cluster(ClusterOp::Balance, None, None).unwrap();
            guard.cluster(ClusterOp::CreateNamespace, None, Some("analytics")).unwrap();
        });

        let events = sink.events();
        assert_eq!(events.len(), 6);
        assert_eq!(events[5].operation, "createNamespace");
        assert_eq!(events[5].other_information.as_deref(), Some("analytics"));
        assert_eq!(events[5].table, None);
    }

    #[test]
    fn test_scanner_hooks() {
        let guard = guard(Arc::new(MemoryAuditSink::new()));
        let scanner = guard.scanners().allocate_id();

        let lease = as_user("alice", &[], || guard.scanner_opened(scanner)).unwrap();
        as_user("alice", &[], || guard.scanner_next(scanner)).unwrap();
        assert!(as_user("bob", &[], || guard.scanner_close(scanner)).is_err());

        as_user("alice", &[], || guard.scanner_close(scanner)).unwrap();
        guard.scanner_closed(scanner);
        drop(lease);
        assert!(guard.scanners().is_empty());
    }

    #[test]
    fn test_open_region() {
        let guard = guard(Arc::new(MemoryAuditSink::new()));

        let meta = RegionContext::metadata("system:meta");
        as_user("hbase", &[], || guard.open(&meta)).unwrap();
        as_user("root", &[], || guard.open(&meta)).unwrap();
        let err = as_user("alice", &[], || guard.open(&meta)).unwrap_err();
        assert_eq!(err.to_string(), "access denied: User 'alice' is not system or super user.");

        let orders = RegionContext::for_table("orders");
        as_user("dave", &["dba"], || guard.open(&orders)).unwrap();
        assert!(as_user("alice", &[], || guard.open(&orders)).is_err());
        assert!(as_user("dave", &["dba"], || guard.open(&RegionContext::default())).is_err());
    }

    #[test]
    fn test_open_metadata_without_system_user_is_denied() {
        let sink = Arc::new(MemoryAuditSink::new());
        let oracle = StaticPolicyOracle::from_yaml(POLICY).unwrap();
        let config = GuardConfig {
            system_user: None,
            ..GuardConfig::default()
        }
        .with_super_users(["root"]);
        let guard = AccessGuard::new(Arc::new(oracle), config, sink);
        let meta = RegionContext::metadata("system:meta");

        // $USER 유무와 관계없이 접근 거부(403)로 끝나야 함
        let err = as_user("alice", &[], || guard.open(&meta)).unwrap_err();
        assert!(matches!(err, Error::AccessDenied { .. }));
        assert_eq!(err.status_code(), 403);

        // system identity를 전혀 알 수 없는 경우
        let err = as_user("alice", &[], || guard.check_system_or_super_user(None)).unwrap_err();
        assert!(matches!(err, Error::AccessDenied { .. }));
        assert_eq!(err.status_code(), 403);
        as_user("root", &[], || guard.check_system_or_super_user(None)).unwrap();
    }

    #[test]
    fn test_get_table_descriptors() {
        let guard = guard(Arc::new(MemoryAuditSink::new()));

        as_user("dave", &["dba"], || {
            guard.get_table_descriptors(&["orders".to_string()]).unwrap();
            assert!(guard.get_table_descriptors(&[]).is_err());
        });
        as_user("olga", &["ops"], || guard.get_table_descriptors(&[])).unwrap();
    }

    #[test]
    fn test_check_permissions() {
        let guard = guard(Arc::new(MemoryAuditSink::new()));
        let region = RegionContext::for_table("orders");

        as_user("alice", &[], || {
            let ok = PermissionCheck {
                table: Some("orders".to_string()),
                family: Some("d".to_string()),
                column: Some("amount".to_string()),
                actions: vec![Action::Read, Action::Write],
            };
            guard.check_permissions(&region, &[ok]).unwrap();

            let other_table = PermissionCheck {
                table: Some("users".to_string()),
                actions: vec![Action::Read],
                ..Default::default()
            };
            let err = guard.check_permissions(&region, &[other_table]).unwrap_err();
            assert!(err.to_string().contains("Table of the region:orders , requested table:users"));

            let orphan_column = PermissionCheck {
                table: Some("orders".to_string()),
                column: Some("amount".to_string()),
                actions: vec![Action::Read],
                ..Default::default()
            };
            let err = guard.check_permissions(&region, &[orphan_column]).unwrap_err();
            assert_eq!(err.code(), "INVALID_RESOURCE");

            let table_level = PermissionCheck {
                actions: vec![Action::Read],
                ..Default::default()
            };
            assert!(guard.check_permissions(&region, &[table_level]).is_err());
        });
    }
}
