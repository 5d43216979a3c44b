//! 쿼리 디스크립터
//!
//! SELECT / UPDATE / DELETE / INSERT를 검사 가능한 상태(조건, 정렬, 그룹, limit/offset)로
//! 보관하고, 실행 시점에 sea-query 문장으로 렌더링합니다.
//! 디스크립터는 평범한 값이므로 count 경로는 복제본을 사용합니다.

use sea_query::{
    Asterisk, Condition, DeleteStatement, Expr, Func, Iden, InsertStatement, OnConflict, Order,
    SelectStatement, SimpleExpr, UpdateStatement,
};

use rk_core::{Error, Result};

use crate::compiler::{column_ref, ColumnTarget, CompiledWhere};
use crate::params::{OrderBy, SelectColumns, SortOrder};

/// SELECT의 기본 테이블 alias
pub const MAIN_ALIAS: &str = "main";

/// count 결과 컬럼 alias
pub const COUNT_ALIAS: &str = "row_count";

/// 동적 테이블/컬럼 식별자
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DynIden(String);

impl DynIden {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl Iden for DynIden {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "{}", self.0).unwrap();
    }
}

/// 쿼리 의도
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Update,
    Delete,
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryKind::Select => write!(f, "SELECT"),
            QueryKind::Update => write!(f, "UPDATE"),
            QueryKind::Delete => write!(f, "DELETE"),
        }
    }
}

/// 실행 전 쿼리 (modifier 파이프라인의 입력/출력)
#[derive(Debug, Clone)]
pub enum Query {
    Select(SelectQuery),
    Update(UpdateQuery),
    Delete(DeleteQuery),
}

impl Query {
    pub fn kind(&self) -> QueryKind {
        match self {
            Query::Select(_) => QueryKind::Select,
            Query::Update(_) => QueryKind::Update,
            Query::Delete(_) => QueryKind::Delete,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Query::Select(q) => &q.table,
            Query::Update(q) => &q.table,
            Query::Delete(q) => &q.table,
        }
    }

    pub fn as_select(&self) -> Option<&SelectQuery> {
        match self {
            Query::Select(q) => Some(q),
            _ => None,
        }
    }

    /// SELECT가 아니면 `InvalidArgument`
    pub fn into_select(self) -> Result<SelectQuery> {
        match self {
            Query::Select(q) => Ok(q),
            other => Err(Error::invalid(format!(
                "expected a SELECT query, got {}",
                other.kind()
            ))),
        }
    }

    /// UPDATE가 아니면 `InvalidArgument`
    pub fn into_update(self) -> Result<UpdateQuery> {
        match self {
            Query::Update(q) => Ok(q),
            other => Err(Error::invalid(format!(
                "expected an UPDATE query, got {}",
                other.kind()
            ))),
        }
    }

    /// 바인딩 순서대로의 파라미터 이름 (로그용)
    pub fn named_params(&self) -> Vec<&str> {
        match self {
            Query::Select(q) => q.conditions.named_params(),
            Query::Update(q) => {
                let mut names: Vec<&str> = q.assignments.iter().map(|a| a.column.as_str()).collect();
                names.extend(q.conditions.named_params());
                names
            }
            Query::Delete(q) => q.conditions.named_params(),
        }
    }
}

impl From<SelectQuery> for Query {
    fn from(query: SelectQuery) -> Self {
        Query::Select(query)
    }
}

impl From<UpdateQuery> for Query {
    fn from(query: UpdateQuery) -> Self {
        Query::Update(query)
    }
}

impl From<DeleteQuery> for Query {
    fn from(query: DeleteQuery) -> Self {
        Query::Delete(query)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SELECT
// ─────────────────────────────────────────────────────────────────────────────

/// SELECT 디스크립터 (`FROM table AS main`)
#[derive(Debug, Clone)]
pub struct SelectQuery {
    table: String,
    columns: SelectColumns,
    conditions: CompiledWhere,
    extra_where: Vec<Condition>,
    order_by: OrderBy,
    group_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: SelectColumns::All,
            conditions: CompiledWhere::new(),
            extra_where: Vec::new(),
            order_by: OrderBy::none(),
            group_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &SelectColumns {
        &self.columns
    }

    pub fn set_columns(&mut self, columns: SelectColumns) -> &mut Self {
        self.columns = columns;
        self
    }

    pub fn conditions(&self) -> &CompiledWhere {
        &self.conditions
    }

    pub fn set_conditions(&mut self, conditions: CompiledWhere) -> &mut Self {
        self.conditions = conditions;
        self
    }

    /// 추가 조건 (modifier, seek 조건 등). 기존 조건과 AND로 결합됩니다.
    pub fn and_where(&mut self, condition: impl Into<Condition>) -> &mut Self {
        self.extra_where.push(condition.into());
        self
    }

    pub fn and_where_expr(&mut self, expr: SimpleExpr) -> &mut Self {
        self.extra_where.push(Condition::all().add(expr));
        self
    }

    pub fn extra_where(&self) -> &[Condition] {
        &self.extra_where
    }

    pub fn order_by(&self) -> &OrderBy {
        &self.order_by
    }

    pub fn set_order_by(&mut self, order_by: OrderBy) -> &mut Self {
        self.order_by = order_by;
        self
    }

    pub fn group_by(&self) -> &[String] {
        &self.group_by
    }

    pub fn add_group_by(&mut self, column: impl Into<String>) -> &mut Self {
        self.group_by.push(column.into());
        self
    }

    pub fn has_group_by(&self) -> bool {
        !self.group_by.is_empty()
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn set_limit(&mut self, limit: Option<u64>) -> &mut Self {
        self.limit = limit;
        self
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn set_offset(&mut self, offset: Option<u64>) -> &mut Self {
        self.offset = offset;
        self
    }

    /// count 쿼리용 복제본
    ///
    /// projection을 `COUNT(main.<id>)`로 바꾸고 정렬/limit/offset을 제거합니다.
    /// 조건과 그룹은 그대로 유지되며 원본은 변경되지 않습니다.
    pub fn to_count_statement(&self, id_column: &str) -> SelectStatement {
        let mut counted = self.clone();
        counted.order_by = OrderBy::none();
        counted.limit = None;
        counted.offset = None;

        let mut statement = counted.base_statement();
        statement.expr_as(
            Func::count(Expr::col(column_ref(
                &qualify(id_column),
                ColumnTarget::Qualified,
            ))),
            DynIden::new(COUNT_ALIAS),
        );
        statement
    }

    /// sea-query 문장 생성
    pub fn to_statement(&self) -> SelectStatement {
        let mut statement = self.base_statement();

        match &self.columns {
            SelectColumns::All => {
                statement.column((DynIden::new(MAIN_ALIAS), Asterisk));
            }
            SelectColumns::Columns(columns) => {
                for column in columns {
                    if is_raw_expression(column) {
                        statement.expr(Expr::cust(column.as_str()));
                    } else {
                        statement.column(column_ref(column, ColumnTarget::Qualified));
                    }
                }
            }
        }

        statement
    }

    /// FROM / WHERE / GROUP BY / ORDER BY / LIMIT / OFFSET
    fn base_statement(&self) -> SelectStatement {
        let mut statement = sea_query::Query::select();
        statement.from_as(DynIden::new(self.table.as_str()), DynIden::new(MAIN_ALIAS));

        for expr in self.conditions.exprs() {
            statement.and_where(expr.clone());
        }
        for condition in &self.extra_where {
            statement.cond_where(condition.clone());
        }

        for column in &self.group_by {
            statement.group_by_col(column_ref(column, ColumnTarget::Qualified));
        }

        for (column, order) in self.order_by.iter() {
            statement.order_by(column_ref(column, ColumnTarget::Qualified), sort(*order));
        }

        if let Some(limit) = self.limit {
            statement.limit(limit);
        }
        if let Some(offset) = self.offset {
            statement.offset(offset);
        }

        statement
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// UPDATE
// ─────────────────────────────────────────────────────────────────────────────

/// SET 절 항목
#[derive(Debug, Clone)]
pub struct Assignment {
    pub column: String,
    pub value: SimpleExpr,
}

/// UPDATE 디스크립터
#[derive(Debug, Clone)]
pub struct UpdateQuery {
    table: String,
    assignments: Vec<Assignment>,
    conditions: CompiledWhere,
    extra_where: Vec<Condition>,
}

impl UpdateQuery {
    pub fn new(table: impl Into<String>, conditions: CompiledWhere) -> Self {
        Self {
            table: table.into(),
            assignments: Vec::new(),
            conditions,
            extra_where: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn set(&mut self, column: impl Into<String>, value: SimpleExpr) -> &mut Self {
        self.assignments.push(Assignment {
            column: column.into(),
            value,
        });
        self
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn conditions(&self) -> &CompiledWhere {
        &self.conditions
    }

    pub fn and_where(&mut self, condition: impl Into<Condition>) -> &mut Self {
        self.extra_where.push(condition.into());
        self
    }

    pub fn to_statement(&self) -> UpdateStatement {
        let mut statement = sea_query::Query::update();
        statement.table(DynIden::new(self.table.as_str()));

        for assignment in &self.assignments {
            statement.value(
                DynIden::new(crate::params::base_column(&assignment.column)),
                assignment.value.clone(),
            );
        }
        for expr in self.conditions.exprs() {
            statement.and_where(expr.clone());
        }
        for condition in &self.extra_where {
            statement.cond_where(condition.clone());
        }

        statement
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DELETE
// ─────────────────────────────────────────────────────────────────────────────

/// DELETE 디스크립터
#[derive(Debug, Clone)]
pub struct DeleteQuery {
    table: String,
    conditions: CompiledWhere,
    extra_where: Vec<Condition>,
}

impl DeleteQuery {
    pub fn new(table: impl Into<String>, conditions: CompiledWhere) -> Self {
        Self {
            table: table.into(),
            conditions,
            extra_where: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn conditions(&self) -> &CompiledWhere {
        &self.conditions
    }

    pub fn and_where(&mut self, condition: impl Into<Condition>) -> &mut Self {
        self.extra_where.push(condition.into());
        self
    }

    /// 같은 조건을 가진 UPDATE로 변환 (soft delete)
    pub fn into_update(self) -> UpdateQuery {
        UpdateQuery {
            table: self.table,
            assignments: Vec::new(),
            conditions: self.conditions,
            extra_where: self.extra_where,
        }
    }

    pub fn to_statement(&self) -> DeleteStatement {
        let mut statement = sea_query::Query::delete();
        statement.from_table(DynIden::new(self.table.as_str()));

        for expr in self.conditions.exprs() {
            statement.and_where(expr.clone());
        }
        for condition in &self.extra_where {
            statement.cond_where(condition.clone());
        }

        statement
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// INSERT
// ─────────────────────────────────────────────────────────────────────────────

/// 다중 row INSERT 디스크립터 (한 배치)
#[derive(Debug, Clone)]
pub struct InsertQuery {
    table: String,
    columns: Vec<String>,
    rows: Vec<Vec<SimpleExpr>>,
    conflict_target: Option<String>,
}

impl InsertQuery {
    pub fn new(table: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            table: table.into(),
            columns,
            rows: Vec::new(),
            conflict_target: None,
        }
    }

    /// 충돌 시 UPDATE (insert-or-update)
    pub fn on_conflict_update(mut self, id_column: impl Into<String>) -> Self {
        self.conflict_target = Some(id_column.into());
        self
    }

    pub fn push_row(&mut self, values: Vec<SimpleExpr>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(Error::invalid(format!(
                "row has {} values but {} columns were declared",
                values.len(),
                self.columns.len()
            )));
        }
        self.rows.push(values);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_statement(&self) -> Result<InsertStatement> {
        let mut statement = sea_query::Query::insert();
        statement
            .into_table(DynIden::new(self.table.as_str()))
            .columns(self.columns.iter().map(|c| DynIden::new(c.as_str())));

        for row in &self.rows {
            statement
                .values(row.iter().cloned())
                .map_err(|e| Error::invalid(format!("invalid insert row: {e}")))?;
        }

        if let Some(target) = &self.conflict_target {
            let updates: Vec<DynIden> = self
                .columns
                .iter()
                .filter(|c| c.as_str() != target)
                .map(|c| DynIden::new(c.as_str()))
                .collect();

            let mut on_conflict = OnConflict::column(DynIden::new(target.as_str()));
            if updates.is_empty() {
                on_conflict.do_nothing();
            } else {
                on_conflict.update_columns(updates);
            }
            statement.on_conflict(on_conflict);
        }

        Ok(statement)
    }
}

/// 괄호나 공백이 있으면 raw 표현식 (`COUNT(*)`, `main.a AS b` 등)
fn is_raw_expression(column: &str) -> bool {
    column.contains('(') || column.contains(char::is_whitespace) || column == "*"
}

/// alias가 없으면 `main.` 추가
pub(crate) fn qualify(column: &str) -> String {
    if column.contains('.') {
        column.to_string()
    } else {
        format!("{MAIN_ALIAS}.{column}")
    }
}

pub(crate) fn sort(order: SortOrder) -> Order {
    match order {
        SortOrder::Asc => Order::Asc,
        SortOrder::Desc => Order::Desc,
    }
}
