//! Keyset (seek) 페이지
//!
//! OFFSET 대신 마지막 row의 정렬 키 값 이후를 조건으로 조회합니다.
//! 커서는 `{"컬럼": 값, ...}` 형태의 compact JSON 텍스트이며, 저장했다가
//! 새 반복자의 시작점으로 다시 넘길 수 있습니다.
//!
//! 동시 쓰기에 대한 격리는 없습니다. 커서 뒤로 이동한 row는 건너뛸 수 있고,
//! 커서 앞에 새로 들어온 row는 이후 페이지에 나타납니다.

use std::fmt;

use async_trait::async_trait;
use sea_query::{Condition, Expr};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use rk_core::{Error, Result};

use super::{Paginate, PagedQuery};
use crate::builder::{qualify, SelectQuery};
use crate::compiler::{column_ref, scalar_value, ColumnTarget};
use crate::helper::QueryHelper;
use crate::params::{base_column, OrderBy, Row, SortOrder};

/// Seek 커서 (정렬 컬럼 → 마지막 값, 정렬 순서 유지)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeekCursor(Map<String, Value>);

impl SeekCursor {
    /// 커서 텍스트 파싱. JSON 객체가 아니면 `InvalidArgument`
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str::<Map<String, Value>>(text)
            .map(Self)
            .map_err(|e| Error::invalid(format!("invalid seek cursor '{text}': {e}")))
    }

    /// row에서 주어진 컬럼 값을 순서대로 읽음
    pub fn from_row<'a>(row: &Row, columns: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut values = Map::new();
        for column in columns {
            let value = row.get(column).ok_or_else(|| {
                Error::invalid(format!("seek column '{column}' is missing from the result row"))
            })?;
            if value.is_null() {
                return Err(Error::invalid(format!("seek column '{column}' is NULL")));
            }
            values.insert(column.to_string(), value.clone());
        }
        Ok(Self(values))
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_token(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SeekCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

/// 직렬화용 상태 스냅샷
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeekPageState {
    pub page_size: u64,
    pub result_count: u64,
    pub pages: u64,
    pub last_result: Option<String>,
}

/// Keyset 페이지 쿼리
#[derive(Debug, Clone)]
pub struct SeekPagedQuery<'h> {
    inner: PagedQuery<'h>,
    /// 최종 정렬 (id tie-breaker 포함, alias 적용)
    ordering: OrderBy,
    /// 마지막 페이지를 만든 커서
    current_key: Option<String>,
    /// 다음 페이지 커서
    last_result: Option<String>,
    exhausted: bool,
}

impl<'h> SeekPagedQuery<'h> {
    pub async fn new(helper: &'h QueryHelper, query: SelectQuery, page_size: u64) -> Result<Self> {
        Self::with_id_column(helper, query, page_size, None).await
    }

    /// GROUP BY가 있으면 `InvalidArgument`
    pub async fn with_id_column(
        helper: &'h QueryHelper,
        mut query: SelectQuery,
        page_size: u64,
        id_column: Option<&str>,
    ) -> Result<Self> {
        if query.has_group_by() {
            return Err(Error::invalid("seek paging is not supported for grouped queries"));
        }

        let id_column = id_column
            .map(str::to_string)
            .unwrap_or_else(|| helper.config().id_column.clone());
        let ordering = seek_ordering(query.order_by(), &id_column);
        query.set_order_by(ordering.clone());

        let inner = PagedQuery::new(helper, query, page_size, Some(&id_column)).await?;
        let exhausted = inner.result_count() == 0;
        Ok(Self {
            inner,
            ordering,
            current_key: None,
            last_result: None,
            exhausted,
        })
    }

    pub fn ordering(&self) -> &OrderBy {
        &self.ordering
    }

    pub fn current_key(&self) -> Option<&str> {
        self.current_key.as_deref()
    }

    /// 다음 페이지 커서 (없으면 마지막 페이지였음)
    pub fn last_result(&self) -> Option<&str> {
        self.last_result.as_deref()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn state(&self) -> SeekPageState {
        SeekPageState {
            page_size: self.inner.page_size(),
            result_count: self.inner.result_count(),
            pages: self.inner.pages(),
            last_result: self.last_result.clone(),
        }
    }

    /// 커서 이후 한 페이지 조회 (`None`이면 처음부터)
    pub async fn get_results(&mut self, key: Option<&str>, all_results: bool) -> Result<Vec<Row>> {
        let helper = self.inner.helper();
        if all_results {
            return helper.fetch_all(self.inner.query()).await;
        }

        let cursor = key.map(SeekCursor::parse).transpose()?;
        if self.inner.result_count() == 0 {
            self.current_key = key.map(str::to_string);
            self.last_result = None;
            self.exhausted = true;
            return Ok(Vec::new());
        }

        let page_size = self.inner.page_size();
        let mut query = self.inner.query().clone();
        if let Some(cursor) = &cursor {
            query.and_where(seek_condition(&self.ordering, cursor)?);
        }
        query.set_limit(Some(page_size)).set_offset(None);

        let rows = helper.fetch_all(&query).await?;
        let next = match rows.last() {
            Some(last) if rows.len() as u64 == page_size => Some(
                SeekCursor::from_row(last, self.ordering.iter().map(|(c, _)| base_column(c)))?
                    .to_token(),
            ),
            _ => None,
        };

        tracing::debug!(
            table = query.table(),
            rows = rows.len(),
            cursor = key,
            next = next.as_deref(),
            "seek page"
        );
        self.current_key = key.map(str::to_string);
        self.exhausted = next.is_none();
        self.last_result = next;
        Ok(rows)
    }

    /// `start` 커서부터 순방향 반복 (`None`이면 처음부터)
    pub fn iter_pages(&mut self, start: Option<String>) -> SeekPages<'_, 'h> {
        let exhausted = self.inner.result_count() == 0;
        SeekPages {
            query: self,
            cursor: start,
            exhausted,
        }
    }
}

#[async_trait]
impl<'h> Paginate for SeekPagedQuery<'h> {
    type Token = Option<String>;

    async fn get_results(&mut self, key: Option<String>, all_results: bool) -> Result<Vec<Row>> {
        SeekPagedQuery::get_results(self, key.as_deref(), all_results).await
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

/// 한 페이지와 그 페이지의 커서
#[derive(Debug, Clone, PartialEq)]
pub struct SeekPage {
    /// 이 페이지를 만든 커서
    pub key: Option<String>,
    pub rows: Vec<Row>,
    /// 다음 페이지 커서
    pub next: Option<String>,
}

/// 재시작 가능한 페이지 반복자
///
/// 빈 페이지를 만나거나 짧은 페이지 다음에 끝납니다.
#[derive(Debug)]
pub struct SeekPages<'q, 'h> {
    query: &'q mut SeekPagedQuery<'h>,
    cursor: Option<String>,
    exhausted: bool,
}

impl<'q, 'h> SeekPages<'q, 'h> {
    /// 다음에 요청할 커서 (중단 후 재시작용)
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub async fn next_page(&mut self) -> Result<Option<SeekPage>> {
        if self.exhausted {
            return Ok(None);
        }

        let key = self.cursor.take();
        let rows = self.query.get_results(key.as_deref(), false).await?;
        if rows.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }

        let next = self.query.last_result().map(str::to_string);
        self.exhausted = next.is_none();
        self.cursor = next.clone();
        Ok(Some(SeekPage { key, rows, next }))
    }
}

/// 정렬이 없으면 `main.<id> ASC`, id가 빠져 있으면 마지막 방향으로 덧붙임
fn seek_ordering(order_by: &OrderBy, id_column: &str) -> OrderBy {
    let mut ordering = OrderBy(
        order_by
            .iter()
            .map(|(column, order)| (qualify(column), *order))
            .collect(),
    );
    if !ordering.contains(id_column) {
        let direction = ordering.iter().last().map_or(SortOrder::Asc, |(_, o)| *o);
        ordering.push(qualify(id_column), direction);
    }
    ordering
}

/// c1..cn, v1..vn → OR_k (c1 = v1 AND ... AND c(k-1) = v(k-1) AND ck >|< vk)
fn seek_condition(ordering: &OrderBy, cursor: &SeekCursor) -> Result<Condition> {
    let columns: Vec<(&str, SortOrder)> = ordering.iter().map(|(c, o)| (c.as_str(), *o)).collect();
    let matches = cursor.len() == columns.len()
        && columns
            .iter()
            .all(|(column, _)| cursor.get(base_column(column)).is_some());
    if !matches {
        let expected: Vec<&str> = columns.iter().map(|(c, _)| base_column(c)).collect();
        return Err(Error::invalid(format!(
            "seek cursor {cursor} does not match ordering columns {expected:?}"
        )));
    }

    let mut values = Vec::with_capacity(columns.len());
    for (column, _) in &columns {
        let name = base_column(column);
        let value = cursor.get(name).unwrap_or(&Value::Null);
        if value.is_null() {
            return Err(Error::invalid(format!("seek cursor value for '{name}' is NULL")));
        }
        values.push(scalar_value(name, value)?);
    }

    let mut any = Condition::any();
    for (k, (column, order)) in columns.iter().enumerate() {
        let mut all = Condition::all();
        for (prefix, value) in columns[..k].iter().zip(&values) {
            all = all.add(Expr::col(column_ref(prefix.0, ColumnTarget::Qualified)).eq(value.clone()));
        }
        let target = Expr::col(column_ref(column, ColumnTarget::Qualified));
        all = all.add(match order {
            SortOrder::Asc => target.gt(values[k].clone()),
            SortOrder::Desc => target.lt(values[k].clone()),
        });
        any = any.add(all);
    }
    Ok(any)
}
