//! rk-sql: 필터 맵 기반 쿼리 헬퍼
//!
//! `{"컬럼 연산자": 값}` 형태의 필터 맵을 WHERE 조건으로 컴파일하고,
//! SELECT / UPDATE / DELETE / 다중 row INSERT 를 만들어 실행합니다.
//! 결과 집합은 offset 또는 keyset(seek) 방식으로 페이지를 나눌 수 있습니다.
//! 모든 값은 SeaQuery 파라미터로 바인딩됩니다.
//!
//! # 모듈 구조
//!
//! - `params`: 필터 맵, 연산자, 정렬, 컬럼 지정
//! - `compiler`: 필터 맵 → WHERE 조건 컴파일
//! - `builder`: 쿼리 디스크립터 (SELECT/UPDATE/DELETE/INSERT)
//! - `modifier`: 실행 전 쿼리 재작성 파이프라인 (soft delete)
//! - `helper`: 빌드/실행/스키마 캐시를 묶은 facade
//! - `mass`: mass insert/update/upsert/delete
//! - `paged`: offset / seek 페이지 쿼리
//! - `backend`: SQLite / PostgreSQL 실행 seam

pub mod backend;
pub mod builder;
pub mod compiler;
pub mod helper;
pub mod mass;
pub mod modifier;
pub mod paged;
pub mod params;

#[cfg(test)]
mod testing;

pub use backend::{Backend, Dialect, ExecResult, PgBackend, SqliteBackend};
pub use builder::{DeleteQuery, InsertQuery, Query, QueryKind, SelectQuery, UpdateQuery};
pub use compiler::{ColumnTarget, CompiledWhere};
pub use helper::{HelperConfig, QueryHelper};
pub use mass::UpsertResult;
pub use modifier::{ModifierContext, QueryModifier, SoftDelete};
pub use paged::{
    OffsetPageState, OffsetPagedQuery, Paginate, SeekCursor, SeekPage, SeekPageState,
    SeekPagedQuery, SeekPages, DEFAULT_PAGE_SIZE,
};
pub use params::{FilterMap, Operator, OrderBy, Row, SelectColumns, SortOrder};
