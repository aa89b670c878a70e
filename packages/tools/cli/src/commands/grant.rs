//! grant/revoke 명령어 (Bridge `/admin/*` 호출)

use bwk_core::grant::{GrantCommand, GrantRevokeRecord, PermissionScope, UserPermission};

use super::http::BridgeClient;
use super::OutputFormat;
use crate::config::CliConfig;

/// 부여/회수 대상
pub struct PermissionArgs {
    pub principal: String,
    pub scope: Option<PermissionScope>,
    pub actions: Option<String>,
    pub table: Option<String>,
    pub family: Option<String>,
    pub column: Option<String>,
    pub namespace: Option<String>,
}

impl PermissionArgs {
    fn into_command(self) -> GrantCommand {
        let actions = self
            .actions
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        GrantCommand {
            permission: Some(UserPermission {
                principal: self.principal,
                scope: self.scope,
                actions,
                table: self.table,
                family: self.family,
                column: self.column,
                namespace: self.namespace,
            }),
        }
    }
}

pub async fn grant(config: &CliConfig, args: PermissionArgs, format: OutputFormat) -> anyhow::Result<()> {
    send(config, "grant", args, format).await
}

pub async fn revoke(config: &CliConfig, args: PermissionArgs, format: OutputFormat) -> anyhow::Result<()> {
    send(config, "revoke", args, format).await
}

async fn send(config: &CliConfig, op: &str, args: PermissionArgs, format: OutputFormat) -> anyhow::Result<()> {
    let client = BridgeClient::from_config(config)?;
    let command = args.into_command();

    let record: GrantRevokeRecord = client
        .post_json(&format!("/admin/{}", op), &command)
        .await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
        OutputFormat::Text => {
            println!("{} submitted for repository '{}'.", op, record.repository_name);
            println!("  tables:  {}", record.tables);
            println!("  families: {}", record.column_families);
            println!("  columns: {}", record.columns);
            if !record.perm_map.user_list.is_empty() {
                println!("  users:   {}", record.perm_map.user_list.join(", "));
            }
            if !record.perm_map.group_list.is_empty() {
                println!("  groups:  {}", record.perm_map.group_list.join(", "));
            }
            if !record.perm_map.perm_list.is_empty() {
                println!("  perms:   {}", record.perm_map.perm_list.join(", "));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_command_splits_actions() {
        let args = PermissionArgs {
            principal: "@analysts".to_string(),
            scope: Some(PermissionScope::Table),
            actions: Some("R, W,".to_string()),
            table: Some("orders".to_string()),
            family: Some("d".to_string()),
            column: None,
            namespace: None,
        };

        let command = args.into_command();
        let permission = command.permission.unwrap();
        assert_eq!(permission.actions, vec!["R", "W"]);
        assert_eq!(permission.table.as_deref(), Some("orders"));
    }
}
