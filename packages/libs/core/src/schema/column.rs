//! 컬럼 메타데이터
//!
//! 테이블별 컬럼의 NULL 허용 여부를 정의합니다.

use serde::{Deserialize, Serialize};

/// 컬럼 정의
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// 컬럼 이름
    pub name: String,

    /// NULL 허용 여부
    #[serde(default)]
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            nullable,
        }
    }
}

/// 테이블의 컬럼 메타데이터
///
/// DB에서 한 번 조회한 뒤 캐시되어 재사용됩니다. 컬럼 순서는 DB가 보고한 순서를 유지합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumns {
    /// 테이블 이름
    pub table: String,

    /// 컬럼 목록
    pub columns: Vec<Column>,
}

impl TableColumns {
    pub fn new(table: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            table: table.into(),
            columns,
        }
    }

    /// 컬럼 조회
    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// 컬럼 존재 여부
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// NULL 허용 여부 (`None` = 알 수 없는 컬럼)
    pub fn accepts_null(&self, name: &str) -> Option<bool> {
        self.get(name).map(|c| c.nullable)
    }

    /// 모든 컬럼 이름
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }
}
