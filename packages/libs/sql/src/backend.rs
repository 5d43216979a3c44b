//! DB 백엔드
//!
//! sea-query가 렌더링한 SQL과 값을 sqlx로 실행하고, 결과 row를 JSON 맵으로 변환합니다.
//! SQLite와 PostgreSQL을 지원합니다.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use sea_query::{PostgresQueryBuilder, QueryStatementWriter, SqliteQueryBuilder, Values};
use sea_query_binder::SqlxValues;
use serde_json::Value;
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as _, Row as _, TypeInfo as _, ValueRef as _};

use rk_core::schema::Column;
use rk_core::{Config, Error, Result};

use crate::params::Row;

/// SQL 방언
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// 문장 렌더링 (SQL + 위치 기반 파라미터)
    pub fn build<S: QueryStatementWriter>(self, statement: &S) -> (String, Values) {
        match self {
            Dialect::Sqlite => statement.build(SqliteQueryBuilder),
            Dialect::Postgres => statement.build(PostgresQueryBuilder),
        }
    }

    /// 마지막 auto-increment id를 보고하는지
    pub fn reports_last_insert_id(self) -> bool {
        matches!(self, Dialect::Sqlite)
    }
}

/// 실행 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

/// 백엔드 추상화
#[async_trait]
pub trait Backend: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// 결과 row를 반환하는 문장 실행
    async fn fetch_all(&self, sql: &str, values: Values) -> Result<Vec<Row>>;

    /// 결과 row가 없는 문장 실행
    async fn execute(&self, sql: &str, values: Values) -> Result<ExecResult>;

    /// 테이블 컬럼 메타데이터 (테이블이 없으면 빈 목록)
    async fn table_columns(&self, table: &str) -> Result<Vec<Column>>;
}

/// URL scheme에 맞는 백엔드 연결
pub async fn connect(config: &Config) -> Result<Arc<dyn Backend>> {
    let url = config.database_url.as_str();
    if url.starts_with("sqlite:") {
        let backend = SqliteBackend::connect(url, config.max_connections).await?;
        Ok(Arc::new(backend))
    } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        let backend = PgBackend::connect(url, config.max_connections).await?;
        Ok(Arc::new(backend))
    } else {
        Err(Error::Config {
            key: "RK_DATABASE_URL".to_string(),
            message: format!("unsupported database url: {url}"),
        })
    }
}

/// unique 제약 위반 여부
///
/// sqlx의 분류를 우선 사용하고, 드라이버별 에러 코드/메시지로 보완합니다.
pub fn is_duplicate_error(error: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db) = error else {
        return false;
    };
    if db.is_unique_violation() {
        return true;
    }

    // 23505: PostgreSQL unique_violation
    // 1062: MySQL ER_DUP_ENTRY
    // 2067 / 1555: SQLite CONSTRAINT_UNIQUE / CONSTRAINT_PRIMARYKEY
    if matches!(
        db.code().as_deref(),
        Some("23505" | "1062" | "2067" | "1555")
    ) {
        return true;
    }

    let message = db.message();
    message.contains("UNIQUE constraint failed") || message.contains("Duplicate entry")
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite 백엔드
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 연결
    ///
    /// 메모리 DB는 커넥션마다 별도 DB가 되므로 커넥션 하나를 계속 유지합니다.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = if url.contains(":memory:") || url.contains("mode=memory") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        };
        let pool = options.connect(url).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn fetch_all(&self, sql: &str, values: Values) -> Result<Vec<Row>> {
        let rows = sqlx::query_with::<sqlx::Sqlite, _>(sql, SqlxValues(values))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(sqlite_row_to_json).collect()
    }

    async fn execute(&self, sql: &str, values: Values) -> Result<ExecResult> {
        let result = sqlx::query_with::<sqlx::Sqlite, _>(sql, SqlxValues(values))
            .execute(&self.pool)
            .await?;
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: Some(result.last_insert_rowid()),
        })
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<Column>> {
        let rows = sqlx::query(r#"SELECT name, "notnull", pk FROM pragma_table_info(?1) ORDER BY cid"#)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let name: String = row.try_get("name")?;
                let not_null: i64 = row.try_get("notnull")?;
                let pk: i64 = row.try_get("pk")?;
                Ok(Column::new(name, not_null == 0 && pk == 0))
            })
            .collect()
    }
}

fn sqlite_row_to_json(row: &SqliteRow) -> Result<Row> {
    let mut obj = Row::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let raw = row.try_get_raw(idx)?;

        let value = if raw.is_null() {
            Value::Null
        } else {
            // 저장 클래스(INTEGER/REAL/TEXT/BLOB)를 기준으로, BOOLEAN은 선언 타입으로 구분
            let storage = raw.type_info().name().to_ascii_uppercase();
            let declared = column.type_info().name().to_ascii_uppercase();
            match storage.as_str() {
                "INTEGER" if declared == "BOOLEAN" => Value::Bool(row.try_get::<bool, _>(idx)?),
                "INTEGER" => Value::from(row.try_get::<i64, _>(idx)?),
                "REAL" => serde_json::Number::from_f64(row.try_get::<f64, _>(idx)?)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                "BLOB" => Value::String(
                    base64::engine::general_purpose::STANDARD
                        .encode(row.try_get::<Vec<u8>, _>(idx)?),
                ),
                _ => Value::String(row.try_get::<String, _>(idx)?),
            }
        };

        obj.insert(column.name().to_string(), value);
    }
    Ok(obj)
}

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL 백엔드
#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Backend for PgBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn fetch_all(&self, sql: &str, values: Values) -> Result<Vec<Row>> {
        let rows = sqlx::query_with::<sqlx::Postgres, _>(sql, SqlxValues(values))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(pg_row_to_json).collect()
    }

    async fn execute(&self, sql: &str, values: Values) -> Result<ExecResult> {
        let result = sqlx::query_with::<sqlx::Postgres, _>(sql, SqlxValues(values))
            .execute(&self.pool)
            .await?;
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: None,
        })
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<Column>> {
        let rows = sqlx::query(
            r#"SELECT column_name::text AS name, is_nullable::text AS nullable
               FROM information_schema.columns
               WHERE table_schema = current_schema() AND table_name = $1
               ORDER BY ordinal_position"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let name: String = row.try_get("name")?;
                let nullable: String = row.try_get("nullable")?;
                Ok(Column::new(name, nullable == "YES"))
            })
            .collect()
    }
}

fn pg_row_to_json(row: &PgRow) -> Result<Row> {
    let mut obj = Row::new();
    for column in row.columns() {
        let name = column.name();
        let type_name = column.type_info().name().to_ascii_uppercase();
        let value = match type_name.as_str() {
            "INT2" => row.try_get::<Option<i16>, _>(name)?.map(Value::from),
            "INT4" => row.try_get::<Option<i32>, _>(name)?.map(Value::from),
            "INT8" => row.try_get::<Option<i64>, _>(name)?.map(Value::from),
            "FLOAT4" => row
                .try_get::<Option<f32>, _>(name)?
                .and_then(|v| serde_json::Number::from_f64(f64::from(v)))
                .map(Value::Number),
            "FLOAT8" => row
                .try_get::<Option<f64>, _>(name)?
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            "BOOL" => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool),
            "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(name)?,
            "UUID" => row
                .try_get::<Option<uuid::Uuid>, _>(name)?
                .map(|v| Value::String(v.to_string())),
            "TIMESTAMPTZ" => row
                .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)?
                .map(|v| Value::String(v.to_rfc3339())),
            "TIMESTAMP" => row
                .try_get::<Option<chrono::NaiveDateTime>, _>(name)?
                .map(|v| Value::String(v.and_utc().to_rfc3339())),
            "DATE" => row
                .try_get::<Option<chrono::NaiveDate>, _>(name)?
                .map(|v| Value::String(v.to_string())),
            "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "CITEXT" => {
                row.try_get::<Option<String>, _>(name)?.map(Value::String)
            }
            "BYTEA" => row
                .try_get::<Option<Vec<u8>>, _>(name)?
                .map(|v| Value::String(base64::engine::general_purpose::STANDARD.encode(v))),
            // 정밀도 보존을 위해 문자열
            "NUMERIC" => row
                .try_get::<Option<rust_decimal::Decimal>, _>(name)?
                .map(|v| Value::String(v.to_string())),
            "TIME" => row
                .try_get::<Option<chrono::NaiveTime>, _>(name)?
                .map(|v| Value::String(v.to_string())),
            "INTERVAL" => row
                .try_get::<Option<PgInterval>, _>(name)?
                .map(|v| Value::String(interval_to_iso8601(&v))),
            // 그 외에는 텍스트로 읽을 수 있는 타입만 허용
            _ => match row.try_get::<Option<String>, _>(name) {
                Ok(v) => v.map(Value::String),
                Err(_) => {
                    return Err(Error::UnsupportedType {
                        column: name.to_string(),
                        type_name,
                    })
                }
            },
        }
        .unwrap_or(Value::Null);

        obj.insert(name.to_string(), value);
    }
    Ok(obj)
}

/// ISO 8601 duration (`P1Y2M3DT4H5M6.5S`)
fn interval_to_iso8601(interval: &PgInterval) -> String {
    let mut out = String::from("P");
    let (years, months) = (interval.months / 12, interval.months % 12);
    if years != 0 {
        out.push_str(&format!("{years}Y"));
    }
    if months != 0 {
        out.push_str(&format!("{months}M"));
    }
    if interval.days != 0 {
        out.push_str(&format!("{}D", interval.days));
    }

    let micros = interval.microseconds;
    if micros != 0 || out.len() == 1 {
        out.push('T');
        let (hours, rest) = (micros / 3_600_000_000, micros % 3_600_000_000);
        let (minutes, rest) = (rest / 60_000_000, rest % 60_000_000);
        if hours != 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes != 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if rest != 0 || (hours == 0 && minutes == 0) {
            let (secs, frac) = (rest / 1_000_000, (rest % 1_000_000).abs());
            if frac == 0 {
                out.push_str(&format!("{secs}S"));
            } else {
                let sign = if rest < 0 && secs == 0 { "-" } else { "" };
                let frac = format!("{frac:06}");
                out.push_str(&format!("{sign}{secs}.{}S", frac.trim_end_matches('0')));
            }
        }
    }
    out
}
