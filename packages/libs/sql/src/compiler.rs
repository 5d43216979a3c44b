//! WHERE 절 컴파일러
//!
//! 파싱된 `Condition` 목록과 테이블 컬럼 메타데이터를 받아 sea-query 표현식과
//! 바인딩 파라미터 목록으로 변환합니다. 모든 값은 파라미터로 바인딩되며,
//! SQL 문자열에 직접 들어가는 값은 `IS NULL` / `IS NOT NULL` / `NULL` 토큰뿐입니다.

use std::collections::HashSet;

use sea_query::{ColumnRef, Expr, IntoColumnRef, Keyword, SimpleExpr};
use serde_json::Value;

use rk_core::schema::TableColumns;
use rk_core::{Error, Result};

use crate::builder::DynIden;
use crate::params::{base_column, Condition, Operator};

/// 컬럼 참조 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnTarget {
    /// `main.status` 처럼 alias를 유지 (SELECT)
    Qualified,
    /// alias 제거 (UPDATE / DELETE는 alias 없는 단일 테이블)
    Unqualified,
}

/// 이름이 붙은 바인딩 파라미터
///
/// IN 조건은 시퀀스 전체가 하나의 파라미터 목록으로 묶입니다.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    pub name: String,
    pub values: Vec<sea_query::Value>,
}

/// 컴파일된 조건 하나 (SQL 조각 + 파라미터)
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    /// 조건 대상 컬럼 (원본 표기)
    pub column: String,
    pub operator: Operator,
    pub expr: SimpleExpr,
    pub params: Vec<BoundParam>,
}

impl CompiledCondition {
    /// 이 조건이 가리키는 alias 제외 컬럼 이름
    pub fn base_column(&self) -> &str {
        base_column(&self.column)
    }
}

/// 컴파일된 WHERE 절 (AND로 결합되는 조건 목록)
#[derive(Debug, Clone, Default)]
pub struct CompiledWhere {
    conditions: Vec<CompiledCondition>,
}

impl CompiledWhere {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn conditions(&self) -> &[CompiledCondition] {
        &self.conditions
    }

    pub fn push(&mut self, condition: CompiledCondition) {
        self.conditions.push(condition);
    }

    /// 컬럼(alias 무시)에 대한 조건이 있는지
    pub fn references(&self, column: &str) -> bool {
        let wanted = base_column(column);
        self.conditions.iter().any(|c| c.base_column() == wanted)
    }

    /// 바인딩 순서대로의 파라미터 이름
    pub fn named_params(&self) -> Vec<&str> {
        self.conditions
            .iter()
            .flat_map(|c| c.params.iter().map(|p| p.name.as_str()))
            .collect()
    }

    pub fn params(&self) -> impl Iterator<Item = &BoundParam> {
        self.conditions.iter().flat_map(|c| c.params.iter())
    }

    pub fn exprs(&self) -> impl Iterator<Item = &SimpleExpr> {
        self.conditions.iter().map(|c| &c.expr)
    }
}

/// 조건 목록 컴파일
///
/// `columns`는 NULL 값을 가진 조건이 있을 때만 필요합니다.
pub fn compile(
    conditions: &[Condition],
    columns: Option<&TableColumns>,
    target: ColumnTarget,
) -> Result<CompiledWhere> {
    let mut names = ParamNames::default();
    let mut compiled = CompiledWhere::new();

    for condition in conditions {
        compiled.push(compile_condition(condition, columns, target, &mut names)?);
    }

    Ok(compiled)
}

fn compile_condition(
    condition: &Condition,
    columns: Option<&TableColumns>,
    target: ColumnTarget,
    names: &mut ParamNames,
) -> Result<CompiledCondition> {
    let column = column_ref(&condition.column, target);
    let base = condition.base_column();
    let op = condition.operator;

    let (expr, params) = match (&condition.value, op) {
        (Value::Array(items), Operator::Eq | Operator::Ne) => {
            let values = items
                .iter()
                .map(|item| scalar_value(&condition.column, item))
                .collect::<Result<Vec<_>>>()?;
            let role = if op == Operator::Eq { "In" } else { "NotIn" };
            let name = names.claim(base, role);

            let col = Expr::col(column);
            let expr = if op == Operator::Eq {
                col.is_in(values.clone())
            } else {
                col.is_not_in(values.clone())
            };
            (expr, vec![BoundParam { name, values }])
        }

        (value, Operator::Between | Operator::NotBetween) => {
            let (low, high) = match value {
                Value::Array(items) if items.len() == 2 => (
                    scalar_value(&condition.column, &items[0])?,
                    scalar_value(&condition.column, &items[1])?,
                ),
                _ => {
                    return Err(Error::invalid(format!(
                        "BETWEEN value must be a 2 item array (column '{}')",
                        condition.column
                    )))
                }
            };
            let low_name = names.claim_exact(format!("{base}GreaterThan"));
            let high_name = names.claim_exact(format!("{base}LessThan"));

            let col = Expr::col(column);
            let expr = if op == Operator::Between {
                col.between(low.clone(), high.clone())
            } else {
                col.not_between(low.clone(), high.clone())
            };
            (
                expr,
                vec![
                    BoundParam {
                        name: low_name,
                        values: vec![low],
                    },
                    BoundParam {
                        name: high_name,
                        values: vec![high],
                    },
                ],
            )
        }

        (Value::Null, Operator::Eq | Operator::Ne) => {
            let accepts_null = columns.and_then(|c| c.accepts_null(base)).unwrap_or(false);
            if !accepts_null {
                return Err(Error::invalid(format!(
                    "column '{}' does not accept NULL",
                    condition.column
                )));
            }
            let col = Expr::col(column);
            let expr = if op == Operator::Eq {
                col.is_null()
            } else {
                col.is_not_null()
            };
            (expr, Vec::new())
        }

        (Value::Null, _) => {
            return Err(Error::invalid(format!(
                "NULL cannot be compared with '{}' (column '{}')",
                op.as_sql(),
                condition.column
            )))
        }

        (value, Operator::Like | Operator::NotLike) => {
            let pattern = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => {
                    return Err(Error::invalid(format!(
                        "{} value must be a string (column '{}')",
                        op.as_sql(),
                        condition.column
                    )))
                }
            };
            let name = names.claim(base, op.role());

            let col = Expr::col(column);
            let expr = if op == Operator::Like {
                col.like(pattern.as_str())
            } else {
                col.not_like(pattern.as_str())
            };
            (
                expr,
                vec![BoundParam {
                    name,
                    values: vec![pattern.into()],
                }],
            )
        }

        (Value::Array(_), _) => {
            return Err(Error::invalid(format!(
                "array value is not allowed with '{}' (column '{}')",
                op.as_sql(),
                condition.column
            )))
        }

        (value, _) => {
            let bound = scalar_value(&condition.column, value)?;
            let name = names.claim(base, op.role());

            let col = Expr::col(column);
            let expr = match op {
                Operator::Eq => col.eq(bound.clone()),
                Operator::Ne => col.ne(bound.clone()),
                Operator::Lt => col.lt(bound.clone()),
                Operator::Lte => col.lte(bound.clone()),
                Operator::Gt => col.gt(bound.clone()),
                Operator::Gte => col.gte(bound.clone()),
                Operator::Like
                | Operator::NotLike
                | Operator::Between
                | Operator::NotBetween => unreachable!("handled above"),
            };
            (
                expr,
                vec![BoundParam {
                    name,
                    values: vec![bound],
                }],
            )
        }
    };

    Ok(CompiledCondition {
        column: condition.column.clone(),
        operator: op,
        expr,
        params,
    })
}

/// 컬럼 이름 → sea-query 컬럼 참조
///
/// `main.status`는 `Qualified`일 때 `(main, status)`, `Unqualified`일 때 `status`가 됩니다.
pub fn column_ref(column: &str, target: ColumnTarget) -> ColumnRef {
    match (column.split_once('.'), target) {
        (Some((alias, name)), ColumnTarget::Qualified) => {
            (DynIden::new(alias), DynIden::new(name)).into_column_ref()
        }
        (Some((_, name)), ColumnTarget::Unqualified) => DynIden::new(name).into_column_ref(),
        (None, _) => DynIden::new(column).into_column_ref(),
    }
}

/// JSON 스칼라 → 바인딩 값
///
/// 객체는 JSON 텍스트로 바인딩됩니다. 배열과 NULL은 허용하지 않습니다.
pub fn scalar_value(column: &str, value: &Value) -> Result<sea_query::Value> {
    match value {
        Value::String(s) => Ok(s.clone().into()),
        Value::Bool(b) => Ok((*b).into()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i.into())
            } else if n.is_u64() {
                Err(Error::invalid(format!(
                    "integer {n} is out of range (column '{column}')"
                )))
            } else if let Some(f) = n.as_f64() {
                Ok(f.into())
            } else {
                Ok(n.to_string().into())
            }
        }
        Value::Object(_) => Ok(value.to_string().into()),
        Value::Array(_) => Err(Error::invalid(format!(
            "nested arrays are not allowed (column '{column}')"
        ))),
        Value::Null => Err(Error::invalid(format!(
            "NULL cannot be bound as a parameter (column '{column}')"
        ))),
    }
}

/// SET / VALUES 에 쓰이는 값 표현식 (NULL은 키워드)
pub fn value_expr(column: &str, value: &Value) -> Result<SimpleExpr> {
    match value {
        Value::Null => Ok(SimpleExpr::Keyword(Keyword::Null)),
        other => Ok(Expr::val(scalar_value(column, other)?).into()),
    }
}

/// 한 문장 안에서 파라미터 이름 중복 방지
#[derive(Debug, Default)]
struct ParamNames {
    used: HashSet<String>,
}

impl ParamNames {
    /// 기본 이름 → 역할 suffix → 숫자 suffix 순으로 시도
    fn claim(&mut self, base: &str, role: &str) -> String {
        if self.used.insert(base.to_string()) {
            return base.to_string();
        }
        self.claim_exact(format!("{base}{role}"))
    }

    fn claim_exact(&mut self, candidate: String) -> String {
        if self.used.insert(candidate.clone()) {
            return candidate;
        }
        let mut n = 2;
        loop {
            let numbered = format!("{candidate}{n}");
            if self.used.insert(numbered.clone()) {
                return numbered;
            }
            n += 1;
        }
    }
}
