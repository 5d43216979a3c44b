//! Seek 명령어 (keyset 페이지)

use serde_json::{json, Value};

use rk_sql::{QueryHelper, SeekPagedQuery, SelectColumns};

use super::{parse_filter, parse_order, print_json, print_rows};
use crate::{OutputFormat, QueryArgs};

pub async fn run(
    helper: &QueryHelper,
    args: &QueryArgs,
    cursor: Option<String>,
    page_size: u64,
    all_pages: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let filter = parse_filter(args.filter.as_deref())?;
    let order_by = parse_order(&args.order)?;
    let query = helper
        .build_select(&args.table, SelectColumns::All, &filter, &order_by)
        .await?;

    let mut paged = SeekPagedQuery::new(helper, query, page_size).await?;

    if !all_pages {
        let rows = paged.get_results(cursor.as_deref(), false).await?;
        match format {
            OutputFormat::Json => {
                print_json(&json!({ "state": paged.state(), "rows": rows }), format)?;
            }
            OutputFormat::Text => {
                print_rows(&rows);
                match paged.last_result() {
                    Some(next) => println!("-- next cursor: {next}"),
                    None => println!("-- last page"),
                }
            }
        }
        return Ok(());
    }

    let mut pages = paged.iter_pages(cursor);
    let mut collected = Vec::new();
    let mut count = 0usize;
    while let Some(page) = pages.next_page().await? {
        count += 1;
        tracing::debug!(page = count, rows = page.rows.len(), "seek page fetched");
        match format {
            OutputFormat::Json => collected.push(json!({
                "key": page.key,
                "rows": page.rows,
                "next": page.next,
            })),
            OutputFormat::Text => {
                println!("-- page {count} (cursor: {})", page.key.as_deref().unwrap_or("-"));
                print_rows(&page.rows);
            }
        }
    }

    match format {
        OutputFormat::Json => print_json(&Value::Array(collected), format)?,
        OutputFormat::Text => println!("-- {count} page(s)"),
    }
    Ok(())
}
