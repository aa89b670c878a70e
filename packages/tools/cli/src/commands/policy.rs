//! 정책 파일 명령어

use bwk_core::permissions::{PolicyDocument, PolicyRule};

use super::OutputFormat;

pub fn validate(path: &str, format: OutputFormat) -> anyhow::Result<()> {
    let document = PolicyDocument::load(path)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        OutputFormat::Text => {
            println!("Policy file is valid: {} ({} policies)", path, document.policies.len());
            for rule in &document.policies {
                println!("  {}", describe_rule(rule));
            }
            if !document.audit.exclude_tables.is_empty() {
                let excluded: Vec<_> = document.audit.exclude_tables.iter().cloned().collect();
                println!("Audit excluded tables: {}", excluded.join(", "));
            }
        }
    }
    Ok(())
}

fn describe_rule(rule: &PolicyRule) -> String {
    let principals: Vec<String> = rule
        .users
        .iter()
        .cloned()
        .chain(rule.groups.iter().map(|g| format!("@{}", g)))
        .collect();
    let actions: Vec<&str> = rule.actions.iter().map(|a| a.as_str()).collect();

    let resource = match &rule.resource.table {
        None => "*".to_string(),
        Some(table) => {
            let mut parts = vec![table.clone()];
            if !rule.resource.families.is_empty() {
                parts.push(rule.resource.families.iter().cloned().collect::<Vec<_>>().join("|"));
            }
            if !rule.resource.columns.is_empty() {
                parts.push(rule.resource.columns.iter().cloned().collect::<Vec<_>>().join("|"));
            }
            parts.join(":")
        }
    };

    format!(
        "{}: [{}] {} on {}",
        rule.name,
        principals.join(", "),
        actions.join(","),
        resource
    )
}
