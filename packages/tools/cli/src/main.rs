//! rowkit CLI (`rk`)
//!
//! 필터 맵으로 테이블을 조회하고 offset / seek 페이지를 확인하는 운영 도구입니다.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rk_core::Config;
use rk_sql::QueryHelper;

mod commands;

#[derive(Parser)]
#[command(name = "rk")]
#[command(author, version, about = "rowkit CLI - filter-map queries and pagination", long_about = None)]
struct Cli {
    /// Database URL (sqlite:... / postgres://...)
    #[arg(long, global = true, env = "RK_DATABASE_URL")]
    database_url: Option<String>,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// 조회 공통 옵션
#[derive(clap::Args, Debug, Clone)]
pub struct QueryArgs {
    /// Table name
    table: String,

    /// Filter map as JSON object (e.g. '{"score >": 10, "category": ["a","b"]}')
    #[arg(long = "where")]
    filter: Option<String>,

    /// Ordering column, repeatable (col[:asc|desc])
    #[arg(long = "order")]
    order: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show column metadata of a table
    Columns { table: String },

    /// Count rows matching a filter
    Count {
        table: String,
        #[arg(long = "where")]
        filter: Option<String>,
    },

    /// Fetch one offset page
    Page {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long, default_value = "1")]
        page: u64,
        #[arg(long)]
        page_size: Option<u64>,
    },

    /// Fetch seek (keyset) pages
    Seek {
        #[command(flatten)]
        query: QueryArgs,
        /// Cursor returned by a previous page
        #[arg(long)]
        cursor: Option<String>,
        #[arg(long)]
        page_size: Option<u64>,
        /// Walk every page from the cursor to the end
        #[arg(long)]
        all_pages: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rk=info,rk_sql=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // 설정 로드 (CLI 옵션 > 환경변수)
    let mut config = Config::from_env()?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }
    tracing::debug!(
        database = %redact_url(&config.database_url),
        max_connections = config.max_connections,
        default_page_size = config.default_page_size,
        id_column = %config.id_column,
        "config loaded"
    );

    let helper = QueryHelper::connect(&config).await?;
    let format = cli.format;

    match cli.command {
        Commands::Columns { table } => commands::columns::run(&helper, &table, format).await,
        Commands::Count { table, filter } => {
            commands::count::run(&helper, &table, filter.as_deref(), format).await
        }
        Commands::Page {
            query,
            page,
            page_size,
        } => {
            let page_size = page_size.unwrap_or(config.default_page_size);
            commands::page::run(&helper, &query, page, page_size, format).await
        }
        Commands::Seek {
            query,
            cursor,
            page_size,
            all_pages,
        } => {
            let page_size = page_size.unwrap_or(config.default_page_size);
            commands::seek::run(&helper, &query, cursor, page_size, all_pages, format).await
        }
    }
}

/// 로그용 URL (`user:password@` 제거)
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}****{}", &url[..scheme_end + 3], &url[at..])
        }
        _ => url.to_string(),
    }
}
