//! Page 명령어 (offset 페이지)

use serde_json::json;

use rk_sql::{OffsetPagedQuery, QueryHelper, SelectColumns};

use super::{parse_filter, parse_order, print_json, print_rows};
use crate::{OutputFormat, QueryArgs};

pub async fn run(
    helper: &QueryHelper,
    args: &QueryArgs,
    page: u64,
    page_size: u64,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let filter = parse_filter(args.filter.as_deref())?;
    let order_by = parse_order(&args.order)?;
    let query = helper
        .build_select(&args.table, SelectColumns::All, &filter, &order_by)
        .await?;

    let mut paged = OffsetPagedQuery::new(helper, query, page_size).await?;
    let rows = paged.get_results(page, false).await?;
    let state = paged.state();

    match format {
        OutputFormat::Json => {
            print_json(&json!({ "state": state, "rows": rows }), format)?;
        }
        OutputFormat::Text => {
            print_rows(&rows);
            println!(
                "-- page {}/{} ({} rows, page size {}), prev: {}, next: {}",
                state.page,
                state.pages.max(1),
                state.result_count,
                state.page_size,
                or_none(state.prev),
                or_none(state.next),
            );
        }
    }
    Ok(())
}

fn or_none(page: u64) -> String {
    if page == 0 {
        "-".to_string()
    } else {
        page.to_string()
    }
}
