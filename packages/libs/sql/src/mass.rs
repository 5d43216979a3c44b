//! Mass operations
//!
//! 여러 row에 대한 INSERT / UPDATE / DELETE / UPSERT를 가능한 적은 문장으로 실행합니다.
//! 트랜잭션을 열지 않으므로 중간 배치에서 실패하면 앞선 배치는 반영된 채로 에러가 반환됩니다.

use std::collections::BTreeSet;

use rk_core::{Error, Result};

use crate::builder::InsertQuery;
use crate::compiler::value_expr;
use crate::helper::QueryHelper;
use crate::params::{FilterMap, Row};

/// `mass_upsert` 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertResult {
    /// 영향받은 row 수 (insert + update, 백엔드 기준)
    pub rows_affected: u64,
    /// 마지막 auto-increment id (지원하지 않는 백엔드는 None)
    pub last_insert_id: Option<i64>,
}

impl QueryHelper {
    /// 다중 row INSERT
    ///
    /// 첫 row의 키가 컬럼 목록이 되며, 모든 row가 같은 키를 가져야 합니다.
    /// 반환값은 삽입된 row 수입니다.
    pub async fn mass_insert(&self, table: &str, rows: &[Row]) -> Result<u64> {
        Ok(self.insert_batches(table, rows, false).await?.rows_affected)
    }

    /// 다중 row UPSERT (식별자 컬럼 충돌 시 나머지 컬럼 UPDATE)
    pub async fn mass_upsert(&self, table: &str, rows: &[Row]) -> Result<UpsertResult> {
        self.insert_batches(table, rows, true).await
    }

    /// 조건에 맞는 모든 row UPDATE
    pub async fn mass_update(
        &self,
        table: &str,
        assignments: &FilterMap,
        filter: &FilterMap,
    ) -> Result<u64> {
        let query = self.build_update(table, assignments, filter).await?;
        let affected = self.execute(&query.into()).await?;
        tracing::info!(table, affected, "mass update");
        Ok(affected)
    }

    /// 조건에 맞는 모든 row DELETE (soft delete modifier가 있으면 UPDATE)
    ///
    /// 빈 where는 `InvalidArgument`.
    pub async fn mass_delete(&self, table: &str, filter: &FilterMap) -> Result<u64> {
        let query = self.build_delete(table, filter).await?;
        let affected = self.execute(&query).await?;
        tracing::info!(table, affected, kind = %query.kind(), "mass delete");
        Ok(affected)
    }

    async fn insert_batches(&self, table: &str, rows: &[Row], upsert: bool) -> Result<UpsertResult> {
        let Some(first) = rows.first() else {
            return Ok(UpsertResult::default());
        };

        let columns: Vec<String> = first.keys().cloned().collect();
        if columns.is_empty() {
            return Err(Error::invalid("rows must have at least one column"));
        }
        validate_columns(&columns, rows)?;

        let batch_size = batch_size(
            self.config().max_batch_rows,
            self.config().max_bind_params,
            columns.len(),
        );
        let id_column = self.config().id_column.clone();

        // 실행 전에 모든 배치를 만들어 값 오류를 먼저 드러냄
        let mut batches = Vec::new();
        for chunk in rows.chunks(batch_size) {
            let mut insert = InsertQuery::new(table, columns.clone());
            if upsert {
                insert = insert.on_conflict_update(id_column.as_str());
            }
            for row in chunk {
                let values = columns
                    .iter()
                    .map(|column| value_expr(column, &row[column.as_str()]))
                    .collect::<Result<Vec<_>>>()?;
                insert.push_row(values)?;
            }
            batches.push(insert.to_statement()?);
        }

        let mut result = UpsertResult::default();
        for (index, statement) in batches.iter().enumerate() {
            let (sql, values) = self.dialect().build(statement);
            let exec = self
                .exec(&sql, values, &[])
                .await
                .map_err(|e| classify_duplicate(table, e))?;

            tracing::debug!(
                table,
                batch = index + 1,
                batches = batches.len(),
                rows_affected = exec.rows_affected,
                "insert batch"
            );
            result.rows_affected += exec.rows_affected;
            if self.dialect().reports_last_insert_id() {
                result.last_insert_id = exec.last_insert_id.or(result.last_insert_id);
            }
        }

        tracing::info!(
            table,
            rows = rows.len(),
            rows_affected = result.rows_affected,
            upsert,
            "mass insert"
        );
        Ok(result)
    }
}

/// 모든 row가 첫 row와 같은 키 집합을 가지는지 확인
fn validate_columns(columns: &[String], rows: &[Row]) -> Result<()> {
    let expected: BTreeSet<&str> = columns.iter().map(String::as_str).collect();
    for (index, row) in rows.iter().enumerate() {
        let keys: BTreeSet<&str> = row.keys().map(String::as_str).collect();
        if keys != expected {
            return Err(Error::invalid(format!(
                "row {index} has columns {keys:?}, expected {expected:?}"
            )));
        }
    }
    Ok(())
}

/// 배치 크기 = min(최대 row 수, 파라미터 한도 / 컬럼 수), 최소 1
fn batch_size(max_rows: usize, max_params: usize, column_count: usize) -> usize {
    let by_params = max_params / column_count.max(1);
    max_rows.min(by_params).max(1)
}

/// 중복 키 에러는 `ConstraintViolation`으로 분류, 나머지는 그대로
fn classify_duplicate(table: &str, error: Error) -> Error {
    match error {
        Error::Backend(source) if crate::backend::is_duplicate_error(&source) => {
            Error::ConstraintViolation {
                table: table.to_string(),
                source,
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::params::{OrderBy, SelectColumns};
    use crate::testing;

    fn row(value: serde_json::Value) -> Row {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn item(id: i64, name: &str) -> Row {
        row(json!({ "id": id, "name": name, "category": "new", "score": id }))
    }

    async fn names(helper: &QueryHelper) -> Vec<String> {
        let query = helper
            .build_select(
                "items",
                SelectColumns::list(["main.name"]),
                &FilterMap::empty(),
                &OrderBy::none().asc("id"),
            )
            .await
            .unwrap();
        helper
            .fetch_all(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_batch_size() {
        assert_eq!(batch_size(500, 32766, 4), 500);
        assert_eq!(batch_size(500, 10, 4), 2);
        assert_eq!(batch_size(500, 3, 4), 1);
        assert_eq!(batch_size(2, 32766, 4), 2);
    }

    #[tokio::test]
    async fn test_mass_insert() {
        let helper = testing::seeded_helper(0).await;
        let inserted = helper
            .mass_insert("items", &[item(1, "a"), item(2, "b")])
            .await
            .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(names(&helper).await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_mass_insert_empty() {
        let helper = testing::seeded_helper(0).await;
        assert_eq!(helper.mass_insert("items", &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mass_insert_batches_keep_order() {
        let helper = testing::helper_with(|config| config.max_batch_rows = 2).await;
        let rows: Vec<Row> = (1..=5).map(|i| item(i, &format!("n{i}"))).collect();

        assert_eq!(helper.mass_insert("items", &rows).await.unwrap(), 5);
        assert_eq!(names(&helper).await, vec!["n1", "n2", "n3", "n4", "n5"]);
    }

    #[tokio::test]
    async fn test_mass_insert_null_values() {
        let helper = testing::seeded_helper(0).await;
        let rows = vec![row(
            json!({ "id": 1, "name": "a", "category": "c", "score": 1, "note": null }),
        )];
        assert_eq!(helper.mass_insert("items", &rows).await.unwrap(), 1);

        let query = helper
            .build_select(
                "items",
                SelectColumns::All,
                &FilterMap::empty().with("note", json!(null)),
                &OrderBy::none(),
            )
            .await
            .unwrap();
        assert_eq!(helper.fetch_all(&query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mass_insert_heterogeneous_rows() {
        let helper = testing::helper_with(|config| config.max_batch_rows = 1).await;
        let rows = vec![
            item(1, "a"),
            row(json!({ "id": 2, "name": "b", "category": "c" })),
        ];

        let err = helper.mass_insert("items", &rows).await.unwrap_err();
        assert!(err.is_invalid_argument());
        // 아무것도 실행되지 않음
        assert!(names(&helper).await.is_empty());
    }

    #[tokio::test]
    async fn test_mass_insert_duplicate() {
        let helper = testing::seeded_helper(3).await;
        let err = helper
            .mass_insert("items", &[item(2, "dup")])
            .await
            .unwrap_err();

        assert_eq!(err.code(), "CONSTRAINT_VIOLATION");
        assert!(helper.is_duplicate_exception(&err));
    }

    #[tokio::test]
    async fn test_mass_upsert() {
        let helper = testing::seeded_helper(2).await;
        let result = helper
            .mass_upsert("items", &[item(2, "updated"), item(3, "inserted")])
            .await
            .unwrap();

        assert_eq!(result.rows_affected, 2);
        assert_eq!(result.last_insert_id, Some(3));
        assert_eq!(names(&helper).await, vec!["item-001", "updated", "inserted"]);
    }

    #[tokio::test]
    async fn test_mass_update() {
        let helper = testing::seeded_helper(6).await;
        let affected = helper
            .mass_update(
                "items",
                &FilterMap::empty().with("name", "renamed").with("note", json!(null)),
                &FilterMap::empty().with("id <=", 2),
            )
            .await
            .unwrap();
        assert_eq!(affected, 2);

        let query = helper
            .build_select(
                "items",
                SelectColumns::All,
                &FilterMap::empty().with("name", "renamed").with("note", json!(null)),
                &OrderBy::none(),
            )
            .await
            .unwrap();
        assert_eq!(helper.fetch_all(&query).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_mass_delete() {
        let helper = testing::seeded_helper(6).await;
        let err = helper
            .mass_delete("items", &FilterMap::empty())
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());

        let deleted = helper
            .mass_delete("items", &FilterMap::empty().with("category", "odd"))
            .await
            .unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(names(&helper).await.len(), 3);
    }

    #[tokio::test]
    async fn test_mass_delete_soft() {
        let helper = testing::seeded_helper(4).await;
        helper.add_modifier(std::sync::Arc::new(crate::modifier::SoftDelete::new()));

        let deleted = helper
            .mass_delete("items", &FilterMap::empty().with("id >", 2))
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(names(&helper).await, vec!["item-001", "item-002"]);

        // row는 남아 있고 deleted_at이 채워짐
        helper.remove_modifier(crate::modifier::SoftDelete::ID);
        let query = helper
            .build_select(
                "items",
                SelectColumns::All,
                &FilterMap::empty().with("deleted_at !=", json!(null)),
                &OrderBy::none(),
            )
            .await
            .unwrap();
        assert_eq!(helper.fetch_all(&query).await.unwrap().len(), 2);
    }
}
