//! 테스트용 인메모리 SQLite 픽스처

use std::sync::Arc;

use rk_core::schema::SchemaCache;

use crate::backend::SqliteBackend;
use crate::helper::{HelperConfig, QueryHelper};

const SCHEMA: &str = r#"
CREATE TABLE items (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    score INTEGER NOT NULL,
    active BOOLEAN NOT NULL DEFAULT 0,
    note TEXT,
    deleted_at DATETIME
)
"#;

/// `items` 테이블만 있는 빈 DB
pub(crate) async fn sqlite_backend() -> SqliteBackend {
    let backend = SqliteBackend::connect("sqlite::memory:", 1)
        .await
        .expect("open in-memory sqlite");
    sqlx::query(SCHEMA)
        .execute(backend.pool())
        .await
        .expect("create items table");
    backend
}

/// `items`에 `1..=count` row를 채운 helper
///
/// - name: `item-001` 형식
/// - category: 짝수 id는 `even`, 홀수 id는 `odd`
/// - score: id와 같음
/// - active: id가 3의 배수일 때 true
/// - note: 짝수 id만 값이 있음
pub(crate) async fn seeded_helper(count: i64) -> QueryHelper {
    let backend = sqlite_backend().await;
    for id in 1..=count {
        sqlx::query(
            "INSERT INTO items (id, name, category, score, active, note) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(format!("item-{id:03}"))
        .bind(if id % 2 == 0 { "even" } else { "odd" })
        .bind(id)
        .bind(id % 3 == 0)
        .bind((id % 2 == 0).then(|| format!("note {id}")))
        .execute(backend.pool())
        .await
        .expect("seed items");
    }
    helper(backend, HelperConfig::default())
}

/// 설정을 바꾼 helper (빈 `items`)
pub(crate) async fn helper_with(configure: impl FnOnce(&mut HelperConfig)) -> QueryHelper {
    let mut config = HelperConfig::default();
    configure(&mut config);
    helper(sqlite_backend().await, config)
}

fn helper(backend: SqliteBackend, config: HelperConfig) -> QueryHelper {
    QueryHelper::new(Arc::new(backend), Arc::new(SchemaCache::new()), config)
}
