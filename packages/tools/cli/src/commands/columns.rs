//! Columns 명령어

use rk_sql::QueryHelper;

use crate::OutputFormat;

pub async fn run(helper: &QueryHelper, table: &str, format: OutputFormat) -> anyhow::Result<()> {
    let columns = helper.get_db_columns(table).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&columns.columns)?);
        }
        OutputFormat::Text => {
            println!("Columns of '{}' ({}):", table, columns.len());
            for column in &columns.columns {
                let null = if column.nullable { "NULL" } else { "NOT NULL" };
                println!("  {:<32} {}", column.name, null);
            }
        }
    }
    Ok(())
}
