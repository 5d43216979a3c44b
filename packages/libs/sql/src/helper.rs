//! Query helper
//!
//! 필터 맵으로 SELECT / UPDATE / DELETE 디스크립터를 만들고, modifier 파이프라인을
//! 적용한 뒤 백엔드에서 실행합니다. 스키마 캐시와 modifier 레지스트리를 소유합니다.

use std::sync::Arc;

use sea_query::Values;

use rk_core::schema::{SchemaCache, TableColumns};
use rk_core::{Config, Error, Result};

use crate::backend::{self, Backend, Dialect, ExecResult};
use crate::builder::{DeleteQuery, Query, SelectQuery, UpdateQuery, COUNT_ALIAS};
use crate::compiler::{self, value_expr, ColumnTarget, CompiledWhere};
use crate::modifier::{ModifierContext, ModifierRegistry, QueryModifier};
use crate::params::{FilterMap, Operator, OrderBy, Row, SelectColumns};

/// helper 설정 (`Config`의 일부)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperConfig {
    /// mass insert/upsert 한 문장당 최대 row 수
    pub max_batch_rows: usize,
    /// 한 문장당 최대 바인딩 파라미터 수
    pub max_bind_params: usize,
    /// 식별자 컬럼
    pub id_column: String,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for HelperConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_batch_rows: config.max_batch_rows,
            max_bind_params: config.max_bind_params,
            id_column: config.id_column.clone(),
        }
    }
}

/// Query helper
///
/// `Send + Sync`이므로 `Arc`로 공유할 수 있습니다. 쿼리 디스크립터는 값이므로
/// 같은 디스크립터를 여러 곳에서 쓰려면 복제하면 됩니다.
pub struct QueryHelper {
    backend: Arc<dyn Backend>,
    cache: Arc<SchemaCache>,
    modifiers: ModifierRegistry,
    config: HelperConfig,
}

impl std::fmt::Debug for QueryHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryHelper")
            .field("dialect", &self.backend.dialect())
            .field("modifiers", &self.modifiers)
            .field("config", &self.config)
            .finish()
    }
}

impl QueryHelper {
    pub fn new(backend: Arc<dyn Backend>, cache: Arc<SchemaCache>, config: HelperConfig) -> Self {
        Self {
            backend,
            cache,
            modifiers: ModifierRegistry::new(),
            config,
        }
    }

    /// 설정에 맞는 백엔드에 연결
    pub async fn connect(config: &Config) -> Result<Self> {
        let backend = backend::connect(config).await?;
        tracing::info!(dialect = ?backend.dialect(), "connected");
        Ok(Self::new(
            backend,
            Arc::new(SchemaCache::new()),
            HelperConfig::from(config),
        ))
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn dialect(&self) -> Dialect {
        self.backend.dialect()
    }

    pub fn config(&self) -> &HelperConfig {
        &self.config
    }

    /// 스키마 캐시 (무효화용)
    pub fn schema_cache(&self) -> &Arc<SchemaCache> {
        &self.cache
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Modifiers
    // ─────────────────────────────────────────────────────────────────────────

    /// modifier 등록. 같은 id가 이미 있으면 false
    pub fn add_modifier(&self, modifier: Arc<dyn QueryModifier>) -> bool {
        self.modifiers.add(modifier)
    }

    /// modifier 해제. 해제된 것이 없으면 false
    pub fn remove_modifier(&self, id: &str) -> bool {
        self.modifiers.remove(id)
    }

    pub fn modifiers(&self) -> &ModifierRegistry {
        &self.modifiers
    }

    /// 등록된 modifier를 순서대로 적용
    pub async fn apply_modifiers(&self, query: Query) -> Result<Query> {
        if self.modifiers.is_empty() {
            return Ok(query);
        }
        let table = query.table().to_string();
        let columns = self.get_db_columns(&table).await?;
        let ctx = ModifierContext {
            table: &table,
            columns: Some(&columns),
        };
        self.modifiers.apply(query, &ctx)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Schema
    // ─────────────────────────────────────────────────────────────────────────

    /// 테이블 컬럼 메타데이터 (캐시 우선)
    ///
    /// 컬럼이 하나도 없으면 (테이블이 없으면) `InvalidArgument`
    pub async fn get_db_columns(&self, table: &str) -> Result<Arc<TableColumns>> {
        if let Some(columns) = self.cache.get(table) {
            tracing::debug!(table, "schema cache hit");
            return Ok(columns);
        }
        self.refresh_db_columns(table).await
    }

    /// DB에서 다시 읽어 캐시 갱신
    pub async fn refresh_db_columns(&self, table: &str) -> Result<Arc<TableColumns>> {
        let columns = self.backend.table_columns(table).await?;
        if columns.is_empty() {
            return Err(Error::invalid(format!("table '{table}' has no columns")));
        }
        Ok(self.cache.insert(TableColumns::new(table, columns)))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builders
    // ─────────────────────────────────────────────────────────────────────────

    /// 필터 맵 컴파일
    ///
    /// NULL 값을 가진 조건이 있을 때만 컬럼 메타데이터를 조회합니다.
    pub async fn process_where(
        &self,
        table: &str,
        filter: &FilterMap,
        target: ColumnTarget,
    ) -> Result<CompiledWhere> {
        let conditions = filter.conditions()?;
        let columns = if conditions.iter().any(|c| c.needs_nullability()) {
            Some(self.get_db_columns(table).await?)
        } else {
            None
        };
        compiler::compile(&conditions, columns.as_deref(), target)
    }

    /// SELECT 생성 (`FROM table AS main`)
    pub async fn build_select(
        &self,
        table: &str,
        columns: SelectColumns,
        filter: &FilterMap,
        order_by: &OrderBy,
    ) -> Result<SelectQuery> {
        let mut query = SelectQuery::new(table);
        query
            .set_columns(columns)
            .set_conditions(self.process_where(table, filter, ColumnTarget::Qualified).await?)
            .set_order_by(order_by.clone());

        self.apply_modifiers(query.into()).await?.into_select()
    }

    /// UPDATE 생성
    ///
    /// 빈 assignments, 연산자가 붙은 assignment 키, 빈 where는 `InvalidArgument`.
    pub async fn build_update(
        &self,
        table: &str,
        assignments: &FilterMap,
        filter: &FilterMap,
    ) -> Result<UpdateQuery> {
        if assignments.is_empty() {
            return Err(Error::invalid("update requires at least one column to set"));
        }
        if filter.is_empty() {
            return Err(Error::invalid(format!(
                "refusing to update every row of '{table}' without a where clause"
            )));
        }

        let mut query = UpdateQuery::new(
            table,
            self.process_where(table, filter, ColumnTarget::Unqualified).await?,
        );
        for (key, value) in assignments.iter() {
            let (column, operator) = Operator::split_key(key);
            if operator != Operator::Eq || column.is_empty() {
                return Err(Error::invalid(format!(
                    "update key '{key}' must be a plain column name"
                )));
            }
            query.set(column, value_expr(column, value)?);
        }

        self.apply_modifiers(query.into()).await?.into_update()
    }

    /// DELETE 생성
    ///
    /// modifier가 의도를 바꿀 수 있으므로 (soft delete) `Query`를 반환합니다.
    pub async fn build_delete(&self, table: &str, filter: &FilterMap) -> Result<Query> {
        if filter.is_empty() {
            return Err(Error::invalid(format!(
                "refusing to delete every row of '{table}' without a where clause"
            )));
        }
        let query = DeleteQuery::new(
            table,
            self.process_where(table, filter, ColumnTarget::Unqualified).await?,
        );
        self.apply_modifiers(query.into()).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Execution
    // ─────────────────────────────────────────────────────────────────────────

    /// 결과 row 수
    ///
    /// SELECT가 아니거나 GROUP BY가 있으면 `InvalidArgument`. 원본 쿼리는 바뀌지 않습니다.
    pub async fn get_count(&self, query: &Query, id_column: Option<&str>) -> Result<u64> {
        let Some(select) = query.as_select() else {
            return Err(Error::invalid(format!(
                "count requires a SELECT query, got {}",
                query.kind()
            )));
        };
        self.count_select(select, id_column).await
    }

    pub(crate) async fn count_select(
        &self,
        query: &SelectQuery,
        id_column: Option<&str>,
    ) -> Result<u64> {
        if query.has_group_by() {
            return Err(Error::invalid("count is ambiguous for a grouped query"));
        }

        let id_column = id_column.unwrap_or(&self.config.id_column);
        let (sql, values) = self.dialect().build(&query.to_count_statement(id_column));
        let rows = self.fetch(&sql, values, &query.conditions().named_params()).await?;

        let count = count_from_rows(&rows)?;
        tracing::debug!(table = query.table(), count, "counted rows");
        Ok(count)
    }

    /// SELECT 실행
    pub async fn fetch_all(&self, query: &SelectQuery) -> Result<Vec<Row>> {
        let (sql, values) = self.dialect().build(&query.to_statement());
        self.fetch(&sql, values, &query.conditions().named_params()).await
    }

    /// UPDATE / DELETE 실행, 영향받은 row 수 반환
    pub async fn execute(&self, query: &Query) -> Result<u64> {
        let (sql, values) = match query {
            Query::Select(_) => {
                return Err(Error::invalid("execute expects an UPDATE or DELETE query"));
            }
            Query::Update(update) => self.dialect().build(&update.to_statement()),
            Query::Delete(delete) => self.dialect().build(&delete.to_statement()),
        };
        let result = self.exec(&sql, values, &query.named_params()).await?;
        Ok(result.rows_affected)
    }

    /// unique 제약 위반(중복 키) 여부
    pub fn is_duplicate_exception(&self, error: &Error) -> bool {
        match error {
            Error::ConstraintViolation { .. } => true,
            Error::Backend(source) => backend::is_duplicate_error(source),
            _ => false,
        }
    }

    pub(crate) async fn fetch(
        &self,
        sql: &str,
        values: Values,
        params: &[&str],
    ) -> Result<Vec<Row>> {
        tracing::debug!(sql, ?params, "fetch");
        let rows = self.backend.fetch_all(sql, values).await?;
        tracing::debug!(rows = rows.len(), "fetched");
        Ok(rows)
    }

    pub(crate) async fn exec(
        &self,
        sql: &str,
        values: Values,
        params: &[&str],
    ) -> Result<ExecResult> {
        tracing::debug!(sql, ?params, "execute");
        let result = self.backend.execute(sql, values).await?;
        tracing::debug!(rows_affected = result.rows_affected, "executed");
        Ok(result)
    }
}

/// count 결과 row에서 `row_count` 읽기
fn count_from_rows(rows: &[Row]) -> Result<u64> {
    let value = rows
        .first()
        .and_then(|row| row.get(COUNT_ALIAS))
        .ok_or_else(|| Error::invalid(format!("count query returned no '{COUNT_ALIAS}' column")))?;
    value.as_u64().ok_or_else(|| {
        Error::invalid(format!(
            "count query returned a non-integer '{COUNT_ALIAS}': {value}"
        ))
    })
}
