//! 쿼리 modifier 파이프라인
//!
//! 등록된 modifier는 등록 순서대로 helper가 만드는 모든 쿼리에 적용됩니다.
//! 같은 `id()`를 가진 modifier는 하나만 등록될 수 있습니다.

use std::fmt::Debug;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use sea_query::{Expr, SimpleExpr};

use rk_core::schema::TableColumns;
use rk_core::Result;

use crate::builder::{Query, MAIN_ALIAS};
use crate::compiler::{column_ref, ColumnTarget};

/// modifier에 전달되는 컨텍스트
#[derive(Debug, Clone, Copy)]
pub struct ModifierContext<'a> {
    /// 쿼리 대상 테이블
    pub table: &'a str,
    /// 테이블 컬럼 메타데이터
    pub columns: Option<&'a TableColumns>,
}

/// 실행 전 쿼리를 재작성하는 modifier
pub trait QueryModifier: Debug + Send + Sync {
    /// 중복 등록 판정에 쓰이는 고정 식별자
    fn id(&self) -> &'static str;

    /// 쿼리 재작성
    fn modify(&self, query: Query, ctx: &ModifierContext<'_>) -> Result<Query>;
}

/// modifier 레지스트리 (등록 순서 유지, id 기준 중복 제거)
#[derive(Debug, Default)]
pub struct ModifierRegistry {
    modifiers: RwLock<Vec<Arc<dyn QueryModifier>>>,
}

impl ModifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 등록. 같은 id가 이미 있으면 false
    pub fn add(&self, modifier: Arc<dyn QueryModifier>) -> bool {
        let mut modifiers = self.modifiers.write().unwrap_or_else(PoisonError::into_inner);
        if modifiers.iter().any(|m| m.id() == modifier.id()) {
            tracing::warn!(modifier = modifier.id(), "query modifier already registered");
            return false;
        }
        tracing::debug!(modifier = modifier.id(), "query modifier registered");
        modifiers.push(modifier);
        true
    }

    /// 해제. 해제된 것이 없으면 false
    pub fn remove(&self, id: &str) -> bool {
        let mut modifiers = self.modifiers.write().unwrap_or_else(PoisonError::into_inner);
        let before = modifiers.len();
        modifiers.retain(|m| m.id() != id);
        modifiers.len() != before
    }

    pub fn contains(&self, id: &str) -> bool {
        self.modifiers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|m| m.id() == id)
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// 등록 순서대로 적용
    pub fn apply(&self, query: Query, ctx: &ModifierContext<'_>) -> Result<Query> {
        // 적용 중에 add/remove가 막히지 않도록 스냅샷을 사용
        let modifiers: Vec<_> = self
            .modifiers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        modifiers
            .iter()
            .try_fold(query, |query, modifier| modifier.modify(query, ctx))
    }
}

/// Soft delete
///
/// - SELECT: `main.<column> IS NULL` 조건 추가 (쿼리가 이미 해당 컬럼을 조건으로 쓰면 제외)
/// - DELETE: `<column>`을 현재 시각으로 설정하는 UPDATE로 변환
///
/// 메타데이터에 해당 컬럼이 없는 테이블은 건드리지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftDelete {
    column: String,
}

impl SoftDelete {
    pub const ID: &'static str = "soft_delete";
    pub const DEFAULT_COLUMN: &'static str = "deleted_at";

    pub fn new() -> Self {
        Self::with_column(Self::DEFAULT_COLUMN)
    }

    pub fn with_column(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    fn applies_to(&self, ctx: &ModifierContext<'_>) -> bool {
        ctx.columns.is_some_and(|c| c.contains(&self.column))
    }
}

impl Default for SoftDelete {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryModifier for SoftDelete {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn modify(&self, query: Query, ctx: &ModifierContext<'_>) -> Result<Query> {
        if !self.applies_to(ctx) {
            return Ok(query);
        }

        match query {
            Query::Select(mut select) => {
                if !select.conditions().references(&self.column) {
                    let column = format!("{MAIN_ALIAS}.{}", self.column);
                    select.and_where_expr(Expr::col(column_ref(&column, ColumnTarget::Qualified)).is_null());
                }
                Ok(Query::Select(select))
            }
            Query::Delete(delete) => {
                let mut update = delete.into_update();
                let now: SimpleExpr = Expr::val(Utc::now()).into();
                update.set(self.column.as_str(), now);
                tracing::debug!(table = ctx.table, column = %self.column, "delete rewritten as soft delete");
                Ok(Query::Update(update))
            }
            update @ Query::Update(_) => Ok(update),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rk_core::schema::Column;
    use sea_query::SqliteQueryBuilder;

    use crate::builder::{DeleteQuery, SelectQuery};
    use crate::compiler::{compile, CompiledWhere};
    use crate::params::FilterMap;

    fn columns(with_deleted_at: bool) -> TableColumns {
        let mut cols = vec![Column::new("id", false), Column::new("name", false)];
        if with_deleted_at {
            cols.push(Column::new("deleted_at", true));
        }
        TableColumns::new("items", cols)
    }

    #[derive(Debug)]
    struct Limit(u64);

    impl QueryModifier for Limit {
        fn id(&self) -> &'static str {
            "limit"
        }

        fn modify(&self, query: Query, _ctx: &ModifierContext<'_>) -> Result<Query> {
            match query {
                Query::Select(mut select) => {
                    let limit = select.limit().map_or(self.0, |l| l.min(self.0));
                    select.set_limit(Some(limit));
                    Ok(Query::Select(select))
                }
                other => Ok(other),
            }
        }
    }

    #[test]
    fn test_add_is_idempotent() {
        let registry = ModifierRegistry::new();
        assert!(registry.add(Arc::new(SoftDelete::new())));
        assert!(!registry.add(Arc::new(SoftDelete::new())));
        assert!(!registry.add(Arc::new(SoftDelete::with_column("removed_at"))));
        assert!(registry.contains(SoftDelete::ID));
    }

    #[test]
    fn test_remove() {
        let registry = ModifierRegistry::new();
        assert!(!registry.remove(SoftDelete::ID));

        registry.add(Arc::new(SoftDelete::new()));
        assert!(registry.remove(SoftDelete::ID));
        assert!(!registry.remove(SoftDelete::ID));
        assert!(registry.is_empty());

        // 해제 후 다시 등록 가능
        assert!(registry.add(Arc::new(SoftDelete::new())));
    }

    #[test]
    fn test_apply_in_registration_order() {
        let registry = ModifierRegistry::new();
        registry.add(Arc::new(Limit(10)));
        registry.add(Arc::new(SoftDelete::new()));

        let cols = columns(true);
        let ctx = ModifierContext {
            table: "items",
            columns: Some(&cols),
        };
        let query = registry
            .apply(SelectQuery::new("items").into(), &ctx)
            .unwrap()
            .into_select()
            .unwrap();

        assert_eq!(
            query.to_statement().to_string(SqliteQueryBuilder),
            r#"SELECT "main".* FROM "items" AS "main" WHERE "main"."deleted_at" IS NULL LIMIT 10"#
        );
    }

    #[test]
    fn test_soft_delete_select() {
        let cols = columns(true);
        let ctx = ModifierContext {
            table: "items",
            columns: Some(&cols),
        };

        let query = SoftDelete::new()
            .modify(SelectQuery::new("items").into(), &ctx)
            .unwrap()
            .into_select()
            .unwrap();
        assert_eq!(query.extra_where().len(), 1);

        // 호출자가 deleted_at을 직접 조건으로 쓰면 그대로 둠
        let filter = FilterMap::empty().with("deleted_at !=", serde_json::Value::Null);
        let mut explicit = SelectQuery::new("items");
        explicit.set_conditions(
            compile(&filter.conditions().unwrap(), Some(&cols), ColumnTarget::Qualified).unwrap(),
        );
        let query = SoftDelete::new()
            .modify(explicit.into(), &ctx)
            .unwrap()
            .into_select()
            .unwrap();
        assert!(query.extra_where().is_empty());
    }

    #[test]
    fn test_soft_delete_rewrites_delete() {
        let cols = columns(true);
        let ctx = ModifierContext {
            table: "items",
            columns: Some(&cols),
        };
        let filter = FilterMap::empty().with("id", 3);
        let delete = DeleteQuery::new(
            "items",
            compile(&filter.conditions().unwrap(), None, ColumnTarget::Unqualified).unwrap(),
        );

        let update = SoftDelete::new()
            .modify(delete.into(), &ctx)
            .unwrap()
            .into_update()
            .unwrap();
        assert_eq!(update.assignments().len(), 1);
        assert_eq!(update.assignments()[0].column, "deleted_at");

        let sql = update.to_statement().to_string(SqliteQueryBuilder);
        assert!(sql.starts_with(r#"UPDATE "items" SET "deleted_at" = '"#), "{sql}");
        assert!(sql.ends_with(r#"WHERE "id" = 3"#), "{sql}");
    }

    #[test]
    fn test_soft_delete_skips_tables_without_column() {
        let cols = columns(false);
        let ctx = ModifierContext {
            table: "items",
            columns: Some(&cols),
        };
        let query = SoftDelete::new()
            .modify(DeleteQuery::new("items", CompiledWhere::new()).into(), &ctx)
            .unwrap();
        assert!(matches!(query, Query::Delete(_)));
    }
}
