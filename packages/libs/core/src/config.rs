//! rowkit 설정
//!
//! 환경변수(`RK_*`)에서 로드합니다. 값이 없으면 기본값을 사용합니다.

use std::env;
use std::str::FromStr;

use crate::error::{Error, Result};

pub const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_MAX_BATCH_ROWS: usize = 500;
/// SQLite 3.32+ 의 바인딩 파라미터 상한
pub const DEFAULT_MAX_BIND_PARAMS: usize = 32766;
pub const DEFAULT_PAGE_SIZE: u64 = 100;
pub const DEFAULT_ID_COLUMN: &str = "id";

/// rowkit 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// DB 연결 URL (`sqlite:` / `postgres://`)
    pub database_url: String,

    /// 커넥션 풀 크기
    pub max_connections: u32,

    /// mass insert/upsert 한 문장당 최대 row 수
    pub max_batch_rows: usize,

    /// 한 문장당 최대 바인딩 파라미터 수
    pub max_bind_params: usize,

    /// 기본 페이지 크기
    pub default_page_size: u64,

    /// 식별자 컬럼 (count, upsert 충돌 대상, seek 기본 정렬)
    pub id_column: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_batch_rows: DEFAULT_MAX_BATCH_ROWS,
            max_bind_params: DEFAULT_MAX_BIND_PARAMS,
            default_page_size: DEFAULT_PAGE_SIZE,
            id_column: DEFAULT_ID_COLUMN.to_string(),
        }
    }
}

impl Config {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 임의의 key → value 조회 함수로 설정 로드
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            database_url: lookup("RK_DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),

            max_connections: parse_or(&lookup, "RK_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,

            max_batch_rows: parse_or(&lookup, "RK_MAX_BATCH_ROWS", DEFAULT_MAX_BATCH_ROWS)?,

            max_bind_params: parse_or(&lookup, "RK_MAX_BIND_PARAMS", DEFAULT_MAX_BIND_PARAMS)?,

            default_page_size: parse_or(&lookup, "RK_DEFAULT_PAGE_SIZE", DEFAULT_PAGE_SIZE)?,

            id_column: lookup("RK_ID_COLUMN")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_ID_COLUMN.to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let positive = [
            ("RK_MAX_CONNECTIONS", self.max_connections as u64),
            ("RK_MAX_BATCH_ROWS", self.max_batch_rows as u64),
            ("RK_MAX_BIND_PARAMS", self.max_bind_params as u64),
            ("RK_DEFAULT_PAGE_SIZE", self.default_page_size),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(Error::Config {
                    key: key.to_string(),
                    message: "must be greater than 0".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| Error::Config {
            key: key.to_string(),
            message: format!("'{raw}': {e}"),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.id_column, "id");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("RK_DATABASE_URL", "postgres://localhost/app"),
            ("RK_MAX_BATCH_ROWS", "50"),
            ("RK_DEFAULT_PAGE_SIZE", " 25 "),
            ("RK_ID_COLUMN", "user_id"),
        ]))
        .unwrap();

        assert_eq!(config.database_url, "postgres://localhost/app");
        assert_eq!(config.max_batch_rows, 50);
        assert_eq!(config.default_page_size, 25);
        assert_eq!(config.id_column, "user_id");
    }

    #[test]
    fn test_invalid_number() {
        let err = Config::from_lookup(lookup_from(&[("RK_MAX_BATCH_ROWS", "many")])).unwrap_err();
        match err {
            Error::Config { key, .. } => assert_eq!(key, "RK_MAX_BATCH_ROWS"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let err = Config::from_lookup(lookup_from(&[("RK_DEFAULT_PAGE_SIZE", "0")])).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
