//! 페이지네이션
//!
//! # 모듈 구조
//!
//! - `offset`: LIMIT/OFFSET 페이지 (임의 페이지 접근, 깊은 offset은 DB 비용 증가)
//! - `seek`: keyset(seek) 페이지 (커서 기반, 재시작 가능한 순방향 반복)

mod offset;
mod seek;

pub use offset::{OffsetPageState, OffsetPagedQuery};
pub use seek::{SeekCursor, SeekPage, SeekPageState, SeekPagedQuery, SeekPages};

use async_trait::async_trait;

use rk_core::config::DEFAULT_PAGE_SIZE as CONFIG_DEFAULT_PAGE_SIZE;
use rk_core::{Error, Result};

use crate::builder::SelectQuery;
use crate::helper::QueryHelper;
use crate::params::Row;

/// 기본 페이지 크기
pub const DEFAULT_PAGE_SIZE: u64 = CONFIG_DEFAULT_PAGE_SIZE;

/// 페이지 쿼리 공통 인터페이스
#[async_trait]
pub trait Paginate: Send {
    /// 페이지 토큰 (offset: 페이지 번호, seek: 커서)
    type Token: Send;

    /// 한 페이지 조회
    ///
    /// `all_results`가 true면 페이지 제한 없이 전체 결과를 반환하고 페이지 상태를 바꾸지 않습니다.
    async fn get_results(&mut self, token: Self::Token, all_results: bool) -> Result<Vec<Row>>;

    fn page_size(&self) -> u64;

    /// 전체 결과 수 (생성 시점)
    fn result_count(&self) -> u64;

    /// 전체 페이지 수
    fn pages(&self) -> u64;
}

/// 페이지 쿼리 공통 상태
///
/// 생성 시 페이지 크기를 검증하고 전체 결과 수를 한 번 계산합니다.
#[derive(Debug, Clone)]
pub struct PagedQuery<'h> {
    helper: &'h QueryHelper,
    query: SelectQuery,
    id_column: String,
    page_size: u64,
    result_count: u64,
    pages: u64,
}

impl<'h> PagedQuery<'h> {
    pub async fn new(
        helper: &'h QueryHelper,
        query: SelectQuery,
        page_size: u64,
        id_column: Option<&str>,
    ) -> Result<Self> {
        if page_size < 1 {
            return Err(Error::invalid("Page size must be greater than 0"));
        }

        let id_column = id_column
            .map(str::to_string)
            .unwrap_or_else(|| helper.config().id_column.clone());
        let result_count = helper.count_select(&query, Some(&id_column)).await?;

        Ok(Self {
            helper,
            query,
            id_column,
            page_size,
            result_count,
            pages: page_count(result_count, page_size),
        })
    }

    pub fn helper(&self) -> &'h QueryHelper {
        self.helper
    }

    /// 페이지 제한이 적용되지 않은 원본 쿼리
    pub fn query(&self) -> &SelectQuery {
        &self.query
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn result_count(&self) -> u64 {
        self.result_count
    }

    pub fn pages(&self) -> u64 {
        self.pages
    }
}

/// ceil(count / page_size)
fn page_count(result_count: u64, page_size: u64) -> u64 {
    result_count.div_ceil(page_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{FilterMap, OrderBy, SelectColumns};
    use crate::testing;

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(205, 50), 5);
        assert_eq!(page_count(200, 50), 4);
        assert_eq!(page_count(1, 50), 1);
        assert_eq!(page_count(0, 50), 0);
    }

    #[tokio::test]
    async fn test_new_validates_page_size() {
        let helper = testing::seeded_helper(3).await;
        let err = PagedQuery::new(&helper, SelectQuery::new("items"), 0, None)
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[tokio::test]
    async fn test_new_counts_once() {
        let helper = testing::seeded_helper(7).await;
        let query = helper
            .build_select(
                "items",
                SelectColumns::All,
                &FilterMap::empty().with("category", "odd"),
                &OrderBy::none(),
            )
            .await
            .unwrap();

        let paged = PagedQuery::new(&helper, query, 3, Some("id")).await.unwrap();
        assert_eq!(paged.result_count(), 4);
        assert_eq!(paged.pages(), 2);
        assert_eq!(paged.page_size(), 3);
        assert_eq!(paged.id_column(), "id");
    }
}
