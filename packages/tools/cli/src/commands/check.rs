//! 로컬 권한 검사
//!
//! 정책 파일을 직접 읽어 Bridge 없이 판정을 재현합니다.
//! 판정, 부분 허용 필터, 발생한 감사 이벤트를 출력합니다.

use bwk_core::filter::AuthorizationFilter;
use bwk_core::identity::{CallContext, Identity};
use bwk_core::permissions::{AccessEvaluator, Action, MemoryAuditSink, RegionContext, StaticPolicyOracle};
use bwk_core::resource::FamilyMap;
use bwk_core::GuardConfig;
use serde_json::json;

use super::OutputFormat;

/// 검사 입력
pub struct CheckArgs {
    pub user: String,
    pub groups: Vec<String>,
    pub super_users: Vec<String>,
    pub operation: String,
    pub action: String,
    pub table: Option<String>,
    pub metadata_region: bool,
    pub families: Vec<String>,
}

/// `family` 또는 `family:col1,col2` 형식의 목록을 family map으로 변환
pub fn parse_family_specs(specs: &[String]) -> anyhow::Result<FamilyMap> {
    let mut families = FamilyMap::new();
    for spec in specs {
        let (family, columns) = match spec.split_once(':') {
            Some((family, columns)) => (family.trim(), Some(columns)),
            None => (spec.trim(), None),
        };
        if family.is_empty() {
            anyhow::bail!("Empty column family in '{}'", spec);
        }

        let entry = families.entry(family.to_string()).or_default();
        if let Some(columns) = columns {
            entry.extend(
                columns
                    .split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string),
            );
        }
    }
    Ok(families)
}

pub fn run(policy_path: &str, args: CheckArgs, format: OutputFormat) -> anyhow::Result<()> {
    let oracle = StaticPolicyOracle::load(policy_path)?;
    tracing::debug!(
        "check: loaded {} policies from {}",
        oracle.document().policies.len(),
        policy_path
    );
    let config = GuardConfig::default().with_super_users(&args.super_users);
    let sink = MemoryAuditSink::new();

    let action = Action::from_str(&args.action)
        .ok_or_else(|| anyhow::anyhow!("Unknown action '{}' (expected read, write, create or admin)", args.action))?;
    let families = parse_family_specs(&args.families)?;
    let region = match args.table {
        Some(table) if args.metadata_region => RegionContext::metadata(table),
        Some(table) => RegionContext::for_table(table),
        None => RegionContext::default(),
    };

    let identity = Identity::new(args.user).with_groups(args.groups);
    let outcome = CallContext::new(identity).sync_scope(|| {
        let evaluator = AccessEvaluator::new(&oracle, &config, &sink);
        evaluator.authorize_access(&args.operation, action, &region, &families)
    });

    let events = sink.take();
    match format {
        OutputFormat::Json => {
            let body = match &outcome {
                Ok(filter) => json!({
                    "allowed": true,
                    "filter": filter,
                    "auditEvents": events,
                }),
                Err(e) => json!({
                    "allowed": false,
                    "reason": e.to_string(),
                    "auditEvents": events,
                }),
            };
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text => {
            match &outcome {
                Ok(None) => println!("ALLOWED"),
                Ok(Some(filter)) => {
                    println!("ALLOWED (filtered)");
                    print_filter(filter);
                }
                Err(e) => println!("DENIED: {}", e),
            }
            if events.is_empty() {
                println!("Audit events: (none)");
            } else {
                println!("Audit events:");
                for event in &events {
                    let resource = [event.table.as_deref(), event.family.as_deref(), event.column.as_deref()]
                        .into_iter()
                        .flatten()
                        .collect::<Vec<_>>()
                        .join(":");
                    println!(
                        "  [{}] {} {} {} by {}{}",
                        if event.allowed { "allow" } else { "deny" },
                        event.operation,
                        event.action,
                        if resource.is_empty() { "*" } else { resource.as_str() },
                        event.user,
                        event.reason.as_deref().map(|r| format!(" ({})", r)).unwrap_or_default()
                    );
                }
            }
        }
    }

    if outcome.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_filter(filter: &AuthorizationFilter) {
    println!("Visible cells:");
    for (family, columns) in filter.allowed_columns() {
        match columns {
            None => println!("  {}: *", family),
            Some(columns) => println!(
                "  {}: {}",
                family,
                columns.iter().cloned().collect::<Vec<_>>().join(", ")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_family_specs() {
        let specs = vec![
            "d".to_string(),
            "m:amount, currency".to_string(),
            "m:note".to_string(),
        ];
        let families = parse_family_specs(&specs).unwrap();

        assert!(families["d"].is_empty());
        let m: Vec<_> = families["m"].iter().map(String::as_str).collect();
        assert_eq!(m, vec!["amount", "currency", "note"]);
    }

    #[test]
    fn test_parse_family_specs_rejects_empty_family() {
        let err = parse_family_specs(&[":amount".to_string()]).unwrap_err();
        assert!(err.to_string().contains("Empty column family"));
    }
}
