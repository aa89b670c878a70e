//! 접근 종류 (read / write / create / admin)

use std::fmt;

use serde::{Deserialize, Serialize};

/// 접근 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Write,
    Create,
    Admin,
}

impl Action {
    /// grant/revoke로 바꿀 수 있는 전체 목록
    pub const ALL: [Action; 4] = [Action::Read, Action::Write, Action::Create, Action::Admin];

    /// 문자열에서 파싱
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "read" => Some(Action::Read),
            "write" => Some(Action::Write),
            "create" => Some(Action::Create),
            "admin" => Some(Action::Admin),
            _ => None,
        }
    }

    /// 한 글자 코드에서 파싱 (R/W/C/A)
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'R' => Some(Action::Read),
            'W' => Some(Action::Write),
            'C' => Some(Action::Create),
            'A' => Some(Action::Admin),
            _ => None,
        }
    }

    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::Create => "create",
            Action::Admin => "admin",
        }
    }

    /// 정책 admin 레코드용 이름
    pub fn permission_name(&self) -> &'static str {
        match self {
            Action::Read => "READ",
            Action::Write => "WRITE",
            Action::Create => "CREATE",
            Action::Admin => "ADMIN",
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, Action::Read)
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Action::Write)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
