//! 리소스 좌표 (table → column family → column)
//!
//! 보호 대상 저장소의 3단계 계층 주소와, 호스트가 넘겨주는 family map을
//! 평가기가 쓰는 형태로 정규화하는 유틸리티를 제공합니다.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

/// 리소스 좌표
///
/// table은 항상 존재하고, column은 family가 있을 때만 지정할 수 있습니다.
/// 생성자를 통해서만 만들 수 있으므로 family 없는 column은 표현되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceCoordinate {
    table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    column: Option<String>,
}

impl ResourceCoordinate {
    /// 테이블 수준 좌표
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            family: None,
            column: None,
        }
    }

    /// Column family 수준 좌표
    pub fn family(table: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            family: Some(family.into()),
            column: None,
        }
    }

    /// Column 수준 좌표
    pub fn column(
        table: impl Into<String>,
        family: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            family: Some(family.into()),
            column: Some(column.into()),
        }
    }

    /// 선택적 필드로부터 좌표 생성
    ///
    /// 빈 문자열은 지정되지 않은 것으로 취급합니다.
    pub fn from_parts(
        table: &str,
        family: Option<&str>,
        column: Option<&str>,
    ) -> Result<Self> {
        if table.is_empty() {
            return Err(Error::InvalidResource {
                message: "table is required".to_string(),
            });
        }
        let family = family.filter(|f| !f.is_empty());
        let column = column.filter(|c| !c.is_empty());

        match (family, column) {
            (None, None) => Ok(Self::table(table)),
            (Some(f), None) => Ok(Self::family(table, f)),
            (Some(f), Some(c)) => Ok(Self::column(table, f, c)),
            (None, Some(c)) => Err(Error::InvalidResource {
                message: format!("column '{}' specified without a column family", c),
            }),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn family_name(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn column_name(&self) -> Option<&str> {
        self.column.as_deref()
    }
}

impl fmt::Display for ResourceCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table)?;
        if let Some(family) = &self.family {
            write!(f, ":{}", family)?;
        }
        if let Some(column) = &self.column {
            write!(f, ":{}", column)?;
        }
        Ok(())
    }
}

/// 정규화된 family map
///
/// key는 비어 있지 않은 family 이름이고, 값이 빈 집합이면 family 전체 접근을 뜻합니다.
/// BTreeMap이므로 순회 순서는 family/column 이름의 사전순으로 고정됩니다.
pub type FamilyMap = BTreeMap<String, BTreeSet<String>>;

/// 호스트가 넘긴 family map을 정규화
///
/// - `None`이면 빈 map (테이블 수준 요청)
/// - 비어 있는 family key는 로그를 남기고 무시
/// - column 목록이 없거나 비어 있으면 빈 집합 (family 수준 요청)
pub fn normalize_families<I, K, C, Q>(families: Option<I>) -> FamilyMap
where
    I: IntoIterator<Item = (K, Option<C>)>,
    K: AsRef<[u8]>,
    C: IntoIterator<Item = Q>,
    Q: AsRef<[u8]>,
{
    let mut result = FamilyMap::new();
    let Some(families) = families else {
        return result;
    };

    for (key, columns) in families {
        let family = String::from_utf8_lossy(key.as_ref()).into_owned();
        if family.is_empty() {
            tracing::error!("Unexpected input: empty column family key in families map, ignoring");
            continue;
        }

        let entry = result.entry(family).or_default();
        if let Some(columns) = columns {
            for column in columns {
                let column = column.as_ref();
                if !column.is_empty() {
                    entry.insert(String::from_utf8_lossy(column).into_owned());
                }
            }
        }
    }

    result
}

/// family 이름 목록만으로 family map 생성 (family 수준 요청)
pub fn families_only<I, K>(families: I) -> FamilyMap
where
    I: IntoIterator<Item = K>,
    K: AsRef<[u8]>,
{
    normalize_families(Some(
        families
            .into_iter()
            .map(|family| (family, None::<Vec<Vec<u8>>>)),
    ))
}

/// 디버그 로그용 family map 요약
pub fn describe_families(families: &FamilyMap) -> String {
    let parts: Vec<String> = families
        .iter()
        .map(|(family, columns)| {
            if columns.is_empty() {
                format!("{}=[*]", family)
            } else {
                let cols: Vec<&str> = columns.iter().map(|c| c.as_str()).collect();
                format!("{}=[{}]", family, cols.join(","))
            }
        })
        .collect();
    format!("{{{}}}", parts.join(", "))
}
