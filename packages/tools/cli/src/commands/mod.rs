//! CLI 명령어 구현

pub mod check;
pub mod grant;
pub mod http;
pub mod policy;

/// 출력 형식
#[derive(Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
