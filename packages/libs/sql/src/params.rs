//! 쿼리 파라미터
//!
//! 필터 맵(`column[+operator] → value`)과 정렬/컬럼 지정을 파싱합니다.
//! 키의 연산자 suffix는 SQL 생성 전에 한 번만 `Condition`으로 파싱됩니다.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use rk_core::{Error, Result};

/// 결과 row (column → value, 컬럼 순서 유지)
pub type Row = Map<String, Value>;

/// 필터 맵
///
/// 각 키는 독립적으로 평가되어 AND로 결합됩니다.
///
/// # 예시
///
/// ```json
/// { "status": "active" }              // status = 'active'
/// { "age >=": 18 }                    // age >= 18
/// { "tags": ["a", "b"] }              // tags IN ('a', 'b')
/// { "tags !=": ["a", "b"] }           // tags NOT IN ('a', 'b')
/// { "score BETWEEN": [5, 10] }        // score BETWEEN 5 AND 10
/// { "deleted_at": null }              // deleted_at IS NULL (nullable 컬럼만)
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterMap(pub Map<String, Value>);

impl FilterMap {
    /// 빈 필터
    pub fn empty() -> Self {
        Self(Map::new())
    }

    /// 필터가 비어있는지
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 조건 추가 (builder)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// 조건 추가
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// 모든 키를 `Condition`으로 파싱
    pub fn conditions(&self) -> Result<Vec<Condition>> {
        self.0
            .iter()
            .map(|(key, value)| Condition::parse(key, value.clone()))
            .collect()
    }
}

impl From<Map<String, Value>> for FilterMap {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for FilterMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// 비교 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// 같음 (기본, 배열이면 IN)
    Eq,
    /// 같지 않음 (`!=` / `<>`, 배열이면 NOT IN)
    Ne,
    /// 보다 작음
    Lt,
    /// 보다 작거나 같음
    Lte,
    /// 보다 큼
    Gt,
    /// 보다 크거나 같음
    Gte,
    /// LIKE 패턴
    Like,
    /// NOT LIKE 패턴
    NotLike,
    /// BETWEEN low AND high
    Between,
    /// NOT BETWEEN low AND high
    NotBetween,
}

/// 기호 연산자 (긴 것부터)
const SYMBOL_OPERATORS: [(&str, Operator); 6] = [
    ("<=", Operator::Lte),
    (">=", Operator::Gte),
    ("!=", Operator::Ne),
    ("<>", Operator::Ne),
    ("<", Operator::Lt),
    (">", Operator::Gt),
];

impl Operator {
    /// SQL 표기
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NOT BETWEEN",
        }
    }

    /// 파라미터 이름 충돌 시 붙는 역할 이름
    pub fn role(&self) -> &'static str {
        match self {
            Operator::Eq => "Equal",
            Operator::Ne => "NotEqual",
            Operator::Lt => "LessThan",
            Operator::Lte => "LessThanOrEqual",
            Operator::Gt => "GreaterThan",
            Operator::Gte => "GreaterThanOrEqual",
            Operator::Like => "Like",
            Operator::NotLike => "NotLike",
            Operator::Between => "Between",
            Operator::NotBetween => "NotBetween",
        }
    }

    /// 키에서 연산자 suffix 분리
    ///
    /// (컬럼, 연산자) 를 반환합니다. 단어 연산자는 공백으로 컬럼과 구분되어야 합니다.
    pub fn split_key(key: &str) -> (&str, Operator) {
        let key = key.trim();

        if let Some((rest, op)) = split_word_operator(key) {
            return (rest.trim_end(), op);
        }

        for (symbol, op) in SYMBOL_OPERATORS {
            if let Some(rest) = key.strip_suffix(symbol) {
                return (rest.trim_end(), op);
            }
        }

        (key, Operator::Eq)
    }
}

/// `LIKE` / `BETWEEN` (앞에 `NOT`이 올 수 있음) suffix 분리
fn split_word_operator(key: &str) -> Option<(&str, Operator)> {
    let (head, last) = rsplit_word(key)?;
    let (positive, negative) = if last.eq_ignore_ascii_case("LIKE") {
        (Operator::Like, Operator::NotLike)
    } else if last.eq_ignore_ascii_case("BETWEEN") {
        (Operator::Between, Operator::NotBetween)
    } else {
        return None;
    };

    match rsplit_word(head) {
        Some((column, word)) if word.eq_ignore_ascii_case("NOT") => Some((column, negative)),
        _ => Some((head, positive)),
    }
}

/// 마지막 공백 구분 단어 분리 (앞부분이 비면 None)
fn rsplit_word(s: &str) -> Option<(&str, &str)> {
    let (head, last) = s.trim_end().rsplit_once(char::is_whitespace)?;
    let head = head.trim_end();
    if head.is_empty() {
        return None;
    }
    Some((head, last))
}

/// 파싱된 필터 조건
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// 원본 키
    pub key: String,
    /// 컬럼 (alias 포함 가능, 예: `main.status`)
    pub column: String,
    /// 연산자
    pub operator: Operator,
    /// 값
    pub value: Value,
}

impl Condition {
    /// 키/값 쌍 파싱
    pub fn parse(key: &str, value: Value) -> Result<Self> {
        let (column, operator) = Operator::split_key(key);
        if column.is_empty() {
            return Err(Error::invalid(format!(
                "filter key '{key}' does not name a column"
            )));
        }

        Ok(Self {
            key: key.to_string(),
            column: column.to_string(),
            operator,
            value,
        })
    }

    /// alias를 제외한 컬럼 이름 (`main.status` → `status`)
    pub fn base_column(&self) -> &str {
        base_column(&self.column)
    }

    /// NULL 허용 여부 확인이 필요한 조건인지
    pub fn needs_nullability(&self) -> bool {
        self.value.is_null()
    }
}

/// alias를 제외한 컬럼 이름
pub fn base_column(column: &str) -> &str {
    match column.split_once('.') {
        Some((_, rest)) => rest,
        None => column,
    }
}

/// 정렬 순서
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl std::str::FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(SortOrder::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(SortOrder::Desc)
        } else {
            Err(Error::invalid(format!("invalid sort order: {s}")))
        }
    }
}

/// 정렬 목록 (순서 유지)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderBy(pub Vec<(String, SortOrder)>);

impl OrderBy {
    pub fn none() -> Self {
        Self(Vec::new())
    }

    pub fn asc(mut self, column: impl Into<String>) -> Self {
        self.0.push((column.into(), SortOrder::Asc));
        self
    }

    pub fn desc(mut self, column: impl Into<String>) -> Self {
        self.0.push((column.into(), SortOrder::Desc));
        self
    }

    pub fn push(&mut self, column: impl Into<String>, order: SortOrder) {
        self.0.push((column.into(), order));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, SortOrder)> {
        self.0.iter()
    }

    /// 컬럼 포함 여부 (alias 무시)
    pub fn contains(&self, column: &str) -> bool {
        let wanted = base_column(column);
        self.0.iter().any(|(c, _)| base_column(c) == wanted)
    }
}

/// SELECT 컬럼 지정
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectColumns {
    /// 기본 테이블의 모든 컬럼 (`main.*`)
    #[default]
    All,
    /// 특정 컬럼 목록 (raw 표현식 허용)
    Columns(Vec<String>),
}

impl SelectColumns {
    pub fn list<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SelectColumns::Columns(columns.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_key_unicode_whitespace() {
        let condition = Condition::parse("name\u{a0}LIKE", json!("x%")).unwrap();
        assert_eq!(condition.column, "name");
        assert_eq!(condition.operator, Operator::Like);

        let condition = Condition::parse("note\u{3000}NOT\u{a0}BETWEEN", json!([1, 2])).unwrap();
        assert_eq!(condition.column, "note");
        assert_eq!(condition.operator, Operator::NotBetween);

        // 연산자가 아닌 마지막 단어는 컬럼 이름의 일부
        let condition = Condition::parse("이름\u{3000}값", json!(1)).unwrap();
        assert_eq!(condition.column, "이름\u{3000}값");
        assert_eq!(condition.operator, Operator::Eq);

        let condition = Condition::parse("점수\u{3000}>=", json!(1)).unwrap();
        assert_eq!(condition.column, "점수");
        assert_eq!(condition.operator, Operator::Gte);
    }

    #[test]
    fn test_split_key_symbols() {
        assert_eq!(Operator::split_key("age"), ("age", Operator::Eq));
        assert_eq!(Operator::split_key("age <"), ("age", Operator::Lt));
        assert_eq!(Operator::split_key("age <="), ("age", Operator::Lte));
        assert_eq!(Operator::split_key("age>="), ("age", Operator::Gte));
        assert_eq!(Operator::split_key("age >"), ("age", Operator::Gt));
        assert_eq!(Operator::split_key("age !="), ("age", Operator::Ne));
        assert_eq!(Operator::split_key("age <>"), ("age", Operator::Ne));
    }

    #[test]
    fn test_split_key_words() {
        assert_eq!(Operator::split_key("name LIKE"), ("name", Operator::Like));
        assert_eq!(
            Operator::split_key("name NOT LIKE"),
            ("name", Operator::NotLike)
        );
        assert_eq!(
            Operator::split_key("  main.score   not   between "),
            ("main.score", Operator::NotBetween)
        );
        assert_eq!(
            Operator::split_key("score BETWEEN"),
            ("score", Operator::Between)
        );
    }

    #[test]
    fn test_split_key_word_needs_whitespace() {
        // 단어 연산자는 컬럼 이름의 일부가 될 수 없음
        assert_eq!(Operator::split_key("unlike"), ("unlike", Operator::Eq));
        assert_eq!(Operator::split_key("LIKE"), ("LIKE", Operator::Eq));
        assert_eq!(Operator::split_key("NOT LIKE"), ("NOT", Operator::Like));
    }

    #[test]
    fn test_condition_parse() {
        let condition = Condition::parse(" main.age >= ", json!(18)).unwrap();
        assert_eq!(condition.column, "main.age");
        assert_eq!(condition.base_column(), "age");
        assert_eq!(condition.operator, Operator::Gte);
        assert_eq!(condition.value, json!(18));
    }

    #[test]
    fn test_condition_empty_column() {
        let err = Condition::parse(">=", json!(1)).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_filter_map_keeps_order() {
        let filter = FilterMap::empty()
            .with("b", 1)
            .with("a >", 2)
            .with("c", json!(null));

        let keys: Vec<_> = filter.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a >", "c"]);

        let conditions = filter.conditions().unwrap();
        assert_eq!(conditions[1].operator, Operator::Gt);
        assert!(conditions[2].needs_nullability());
    }

    #[test]
    fn test_filter_map_deserialization() {
        let filter: FilterMap =
            serde_json::from_str(r#"{"status": "active", "age >=": 18, "tags": ["a", "b"]}"#)
                .unwrap();
        assert_eq!(filter.len(), 3);
        assert_eq!(filter.0["tags"], json!(["a", "b"]));
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!("ASC".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert_eq!("desc".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert!("sideways".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_order_by_contains_ignores_alias() {
        let order = OrderBy::none().asc("main.name").desc("id");
        assert!(order.contains("name"));
        assert!(order.contains("main.id"));
        assert!(!order.contains("email"));
    }
}
