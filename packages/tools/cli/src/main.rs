//! Bulwark CLI (`bwk`)
//!
//! 정책 파일 검증, 로컬 권한 검사, Bridge를 통한 grant/revoke를 수행하는 운영 도구입니다.

use bwk_core::grant::PermissionScope;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::OutputFormat;
use config::CliConfig;

#[derive(Parser)]
#[command(name = "bwk")]
#[command(author, version, about = "Bulwark CLI - access control tool for Bulwark", long_about = None)]
struct Cli {
    /// Bridge URL (overrides config file and BWK_BRIDGE_URL)
    #[arg(long, global = true)]
    bridge: Option<String>,

    /// Caller name sent to the Bridge (overrides config file and BWK_USER)
    #[arg(long = "as", global = true)]
    as_user: Option<String>,

    /// Policy file (overrides config file and BWK_POLICY_PATH)
    #[arg(long, global = true)]
    policy: Option<String>,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    // ─────────────────────────────────────────────────────────────────────────
    // Policy
    // ─────────────────────────────────────────────────────────────────────────
    /// Manage policy files
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },

    /// Evaluate an operation against the policy file locally
    Check {
        /// Caller name
        #[arg(long)]
        user: String,

        /// Caller groups (comma-separated)
        #[arg(long, value_delimiter = ',')]
        groups: Vec<String>,

        /// Super-users (comma-separated)
        #[arg(long, value_delimiter = ',')]
        super_users: Vec<String>,

        /// Operation name recorded in audit events
        #[arg(long, default_value = "get")]
        operation: String,

        /// Access type (read, write, create, admin)
        #[arg(long, default_value = "read")]
        action: String,

        /// Table of the region
        #[arg(long)]
        table: Option<String>,

        /// Treat the region as a metadata region
        #[arg(long)]
        metadata_region: bool,

        /// Column family, optionally with columns (family or family:col1,col2)
        #[arg(long = "family")]
        families: Vec<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Grant & Revoke
    // ─────────────────────────────────────────────────────────────────────────
    /// Grant a permission through the Bridge
    Grant(PermissionOpts),

    /// Revoke a permission through the Bridge
    Revoke(PermissionOpts),
}

#[derive(Subcommand)]
enum PolicyAction {
    /// Parse and validate a policy file
    Validate {
        /// Policy file (defaults to --policy)
        path: Option<String>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ScopeArg {
    Global,
    Table,
    Namespace,
}

impl From<ScopeArg> for PermissionScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::Global => PermissionScope::Global,
            ScopeArg::Table => PermissionScope::Table,
            ScopeArg::Namespace => PermissionScope::Namespace,
        }
    }
}

#[derive(Args)]
struct PermissionOpts {
    /// User name, or group name prefixed with '@'
    #[arg(long)]
    principal: String,

    #[arg(long, value_enum)]
    scope: Option<ScopeArg>,

    /// Permission codes or names (comma-separated, e.g. R,W or read,write)
    #[arg(long)]
    actions: Option<String>,

    #[arg(long)]
    table: Option<String>,
    #[arg(long)]
    family: Option<String>,
    #[arg(long)]
    column: Option<String>,
    #[arg(long)]
    namespace: Option<String>,
}

impl From<PermissionOpts> for commands::grant::PermissionArgs {
    fn from(opts: PermissionOpts) -> Self {
        Self {
            principal: opts.principal,
            scope: opts.scope.map(Into::into),
            actions: opts.actions,
            table: opts.table,
            family: opts.family,
            column: opts.column,
            namespace: opts.namespace,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // 설정 로드 (CLI 옵션 > config file > env)
    let config = CliConfig::load()?.with_overrides(cli.bridge, cli.as_user, cli.policy);

    // 명령 실행
    match cli.command {
        Commands::Policy { action } => match action {
            PolicyAction::Validate { path } => {
                let path = match path {
                    Some(path) => path,
                    None => config.policy_path()?,
                };
                commands::policy::validate(&path, cli.format)
            }
        },

        Commands::Check {
            user,
            groups,
            super_users,
            operation,
            action,
            table,
            metadata_region,
            families,
        } => commands::check::run(
            &config.policy_path()?,
            commands::check::CheckArgs {
                user,
                groups,
                super_users,
                operation,
                action,
                table,
                metadata_region,
                families,
            },
            cli.format,
        ),

        Commands::Grant(opts) => {
            commands::grant::grant(&config, opts.into(), cli.format).await
        }
        Commands::Revoke(opts) => {
            commands::grant::revoke(&config, opts.into(), cli.format).await
        }
    }
}
