//! Count 명령어

use serde_json::json;

use rk_sql::{OrderBy, QueryHelper, SelectColumns};

use super::{parse_filter, print_json};
use crate::OutputFormat;

pub async fn run(
    helper: &QueryHelper,
    table: &str,
    filter: Option<&str>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let filter = parse_filter(filter)?;
    let query = helper
        .build_select(table, SelectColumns::All, &filter, &OrderBy::none())
        .await?;
    let count = helper.get_count(&query.into(), None).await?;

    match format {
        OutputFormat::Json => print_json(&json!({ "table": table, "count": count }), format)?,
        OutputFormat::Text => println!("{count}"),
    }
    Ok(())
}
