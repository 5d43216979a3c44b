//! CLI 명령어 구현

pub mod columns;
pub mod count;
pub mod page;
pub mod seek;

use anyhow::Context as _;
use serde_json::{Map, Value};

use rk_sql::{FilterMap, OrderBy, Row, SortOrder};

use crate::OutputFormat;

/// `--where` JSON → 필터 맵
pub fn parse_filter(filter: Option<&str>) -> anyhow::Result<FilterMap> {
    let Some(text) = filter else {
        return Ok(FilterMap::empty());
    };
    let map: Map<String, Value> =
        serde_json::from_str(text).context("--where must be a JSON object")?;
    Ok(FilterMap(map))
}

/// `--order col[:asc|desc]` 목록 → 정렬
pub fn parse_order(order: &[String]) -> anyhow::Result<OrderBy> {
    let mut order_by = OrderBy::none();
    for item in order {
        let (column, direction) = match item.split_once(':') {
            Some((column, direction)) => (column, direction.parse::<SortOrder>()?),
            None => (item.as_str(), SortOrder::Asc),
        };
        if column.is_empty() {
            anyhow::bail!("empty column in --order '{item}'");
        }
        order_by.push(column, direction);
    }
    Ok(order_by)
}

/// row 목록 출력 (text: row당 JSON 한 줄)
pub fn print_rows(rows: &[Row]) {
    for row in rows {
        println!("{}", Value::Object(row.clone()));
    }
}

pub fn print_json(value: &Value, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => println!("{value}"),
    }
    Ok(())
}
