//! rk-core: rowkit 공통 핵심 라이브러리
//!
//! 이 크레이트는 rk-sql과 CLI가 공유하는 핵심 타입을 제공합니다.
//!
//! # 모듈 구조
//!
//! - `schema`: 테이블 컬럼 메타데이터 및 스키마 캐시
//! - `config`: 환경변수 기반 설정
//! - `error`: 공통 에러 타입

pub mod config;
pub mod error;
pub mod schema;

pub use config::Config;
pub use error::{Error, Result};
