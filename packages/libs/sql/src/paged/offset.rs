//! LIMIT/OFFSET 페이지

use async_trait::async_trait;
use serde::Serialize;

use rk_core::{Error, Result};

use super::{Paginate, PagedQuery};
use crate::builder::SelectQuery;
use crate::helper::QueryHelper;
use crate::params::Row;

/// 직렬화용 상태 스냅샷
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OffsetPageState {
    pub page_size: u64,
    pub result_count: u64,
    pub pages: u64,
    pub page: u64,
    pub prev: u64,
    pub next: u64,
}

/// LIMIT/OFFSET 페이지 쿼리
///
/// 페이지 번호는 1부터 시작합니다. `prev` / `next`의 0은 "없음"입니다.
#[derive(Debug, Clone)]
pub struct OffsetPagedQuery<'h> {
    inner: PagedQuery<'h>,
    page: u64,
    prev: u64,
    next: u64,
}

impl<'h> OffsetPagedQuery<'h> {
    pub async fn new(helper: &'h QueryHelper, query: SelectQuery, page_size: u64) -> Result<Self> {
        Self::with_id_column(helper, query, page_size, None).await
    }

    pub async fn with_id_column(
        helper: &'h QueryHelper,
        query: SelectQuery,
        page_size: u64,
        id_column: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            inner: PagedQuery::new(helper, query, page_size, id_column).await?,
            page: 0,
            prev: 0,
            next: 0,
        })
    }

    /// 마지막으로 조회한 페이지 (아직 없으면 0)
    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn prev(&self) -> u64 {
        self.prev
    }

    pub fn next(&self) -> u64 {
        self.next
    }

    pub fn state(&self) -> OffsetPageState {
        OffsetPageState {
            page_size: self.inner.page_size(),
            result_count: self.inner.result_count(),
            pages: self.inner.pages(),
            page: self.page,
            prev: self.prev,
            next: self.next,
        }
    }

    /// 페이지 조회
    ///
    /// `page < 1` 또는 `page > pages`면 `InvalidArgument`. 결과가 없어도 1페이지는 조회할 수 있습니다.
    pub async fn get_results(&mut self, page: u64, all_results: bool) -> Result<Vec<Row>> {
        let last_page = self.inner.pages().max(1);
        if page < 1 || page > last_page {
            return Err(Error::invalid(format!(
                "Page must be between 1 and {last_page}"
            )));
        }

        let helper = self.inner.helper();
        if all_results {
            return helper.fetch_all(self.inner.query()).await;
        }

        let page_size = self.inner.page_size();
        let mut query = self.inner.query().clone();
        query
            .set_limit(Some(page_size))
            .set_offset(Some((page - 1) * page_size));
        let rows = helper.fetch_all(&query).await?;

        self.page = page;
        self.prev = if page > 1 { page - 1 } else { 0 };
        self.next = if page < self.inner.pages() { page + 1 } else { 0 };
        Ok(rows)
    }
}

#[async_trait]
impl<'h> Paginate for OffsetPagedQuery<'h> {
    type Token = u64;

    async fn get_results(&mut self, page: u64, all_results: bool) -> Result<Vec<Row>> {
        OffsetPagedQuery::get_results(self, page, all_results).await
    }

    fn page_size(&self) -> u64 {
        self.inner.page_size()
    }

    fn result_count(&self) -> u64 {
        self.inner.result_count()
    }

    fn pages(&self) -> u64 {
        self.inner.pages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{FilterMap, OrderBy, SelectColumns};
    use crate::testing;

    async fn paged(helper: &QueryHelper, page_size: u64) -> OffsetPagedQuery<'_> {
        let query = helper
            .build_select(
                "items",
                SelectColumns::All,
                &FilterMap::empty(),
                &OrderBy::none().asc("id"),
            )
            .await
            .unwrap();
        OffsetPagedQuery::new(helper, query, page_size).await.unwrap()
    }

    fn ids(rows: &[Row]) -> Vec<i64> {
        rows.iter().map(|r| r["id"].as_i64().unwrap()).collect()
    }

    #[tokio::test]
    async fn test_pages() {
        let helper = testing::seeded_helper(205).await;
        let mut query = paged(&helper, 50).await;
        assert_eq!(query.pages(), 5);
        assert_eq!(query.result_count(), 205);

        let rows = query.get_results(1, false).await.unwrap();
        assert_eq!(rows.len(), 50);
        assert_eq!((query.page(), query.prev(), query.next()), (1, 0, 2));

        let rows = query.get_results(5, false).await.unwrap();
        assert_eq!(ids(&rows), vec![201, 202, 203, 204, 205]);
        assert_eq!((query.page(), query.prev(), query.next()), (5, 4, 0));
    }

    #[tokio::test]
    async fn test_out_of_range() {
        let helper = testing::seeded_helper(205).await;
        let mut query = paged(&helper, 50).await;

        assert!(query.get_results(0, false).await.unwrap_err().is_invalid_argument());
        assert!(query.get_results(6, false).await.unwrap_err().is_invalid_argument());
        assert_eq!(query.page(), 0);
    }

    #[tokio::test]
    async fn test_all_results_keeps_state() {
        let helper = testing::seeded_helper(12).await;
        let mut query = paged(&helper, 5).await;
        query.get_results(2, false).await.unwrap();

        let rows = query.get_results(1, true).await.unwrap();
        assert_eq!(rows.len(), 12);
        assert_eq!(ids(&rows)[..3], [1, 2, 3]);
        assert_eq!(query.page(), 2);
    }

    #[tokio::test]
    async fn test_empty_result_set() {
        let helper = testing::seeded_helper(0).await;
        let mut query = paged(&helper, 10).await;
        assert_eq!(query.pages(), 0);
        assert!(query.get_results(1, false).await.unwrap().is_empty());
        assert_eq!(query.next(), 0);
        assert!(query.get_results(2, false).await.is_err());
    }

    #[tokio::test]
    async fn test_state_serialization() {
        let helper = testing::seeded_helper(205).await;
        let mut query = paged(&helper, 50).await;
        query.get_results(3, false).await.unwrap();

        let json = serde_json::to_value(query.state()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "pageSize": 50,
                "resultCount": 205,
                "pages": 5,
                "page": 3,
                "prev": 2,
                "next": 4,
            })
        );
    }
}
