//! 공통 에러 타입
//!
//! rowkit 전체에서 사용되는 에러 타입을 정의합니다.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// rowkit 공통 에러
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────────
    // Argument Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // Constraint Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("duplicate key on table '{table}': {source}")]
    ConstraintViolation {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────────
    // Backend Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("backend error: {0}")]
    Backend(#[from] sqlx::Error),

    #[error("unsupported column type '{type_name}' for column '{column}'")]
    UnsupportedType { column: String, type_name: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // Config Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("invalid configuration {key}: {message}")]
    Config { key: String, message: String },
}

impl Error {
    /// `InvalidArgument` 생성 헬퍼
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            message: message.into(),
        }
    }

    /// 에러 코드 (호출자 분류용)
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Error::ConstraintViolation { .. } => "CONSTRAINT_VIOLATION",
            Error::Backend(_) => "BACKEND_FAILURE",
            Error::UnsupportedType { .. } => "UNSUPPORTED_TYPE",
            Error::Config { .. } => "CONFIG_ERROR",
        }
    }

    /// 호출자 입력 오류 여부
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidArgument { .. })
    }
}
