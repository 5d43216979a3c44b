//! 테이블 메타데이터
//!
//! # 모듈 구조
//!
//! - `column`: 컬럼/테이블 메타데이터 (NULL 허용 여부)
//! - `cache`: 테이블별 메타데이터 캐시

mod cache;
mod column;

pub use cache::SchemaCache;
pub use column::{Column, TableColumns};
