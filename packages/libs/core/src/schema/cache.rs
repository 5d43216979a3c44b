//! 스키마 캐시
//!
//! 테이블별 컬럼 메타데이터를 프로세스 수명 동안 보관합니다.
//! 스키마가 바뀌면 호출자가 `invalidate`로 무효화해야 합니다.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::column::TableColumns;

/// 컬럼 메타데이터 캐시 (table → columns)
///
/// 여러 호출자가 동시에 읽을 수 있습니다. 같은 테이블을 동시에 채우면 마지막 쓰기가 남습니다.
#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: RwLock<HashMap<String, Arc<TableColumns>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 캐시 조회
    pub fn get(&self, table: &str) -> Option<Arc<TableColumns>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(table).cloned()
    }

    /// 캐시 저장 (last writer wins)
    pub fn insert(&self, columns: TableColumns) -> Arc<TableColumns> {
        let columns = Arc::new(columns);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(columns.table.clone(), Arc::clone(&columns));
        tracing::debug!(table = %columns.table, columns = columns.len(), "schema cache filled");
        columns
    }

    /// 테이블 하나 무효화
    pub fn invalidate(&self, table: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(table).is_some()
    }

    /// 전체 무효화
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
