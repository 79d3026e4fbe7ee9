//! PostgreSQL integration tests.
//!
//! Each test creates its own uniquely named session table and drops it
//! afterwards. Run with `DATABASE_URL=... cargo test -- --ignored`.

#![allow(clippy::panic, clippy::unwrap_used, clippy::expect_used, missing_docs)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, json};
use sqlx::PgPool;

use sessiond::config::{PartialPoolOptions, PartialStoreOptions, StoreOptions, resolve};
use sessiond::domain::{HealthMonitor, SessionCookie, SessionData};
use sessiond::error::StoreError;
use sessiond::persistence::schema::quote_ident;
use sessiond::persistence::{BootstrapOutcome, PgSessionStore, SessionStore};
use sessiond::service::Sweeper;

struct Fixture {
    store: Arc<PgSessionStore>,
    _sweeper: Option<Sweeper>,
    admin: PgPool,
    table: String,
}

impl Fixture {
    async fn open() -> Option<Self> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping PostgreSQL test");
            return None;
        };
        let table = format!("sessions_test_{}", uuid::Uuid::new_v4().simple());

        let mut overrides = PartialStoreOptions {
            pool: PartialPoolOptions {
                database_url: Some(url.clone()),
                max_connections: Some(2),
                ..PartialPoolOptions::default()
            },
            ..PartialStoreOptions::default()
        };
        overrides.schema.table_name = Some(table.clone());
        let options = resolve(StoreOptions::default(), overrides);

        let (store, sweeper) = PgSessionStore::open(&options, HealthMonitor::new())
            .await
            .expect("store should open");
        let admin = PgPool::connect(&url).await.expect("admin pool");

        Some(Self {
            store,
            _sweeper: sweeper,
            admin,
            table,
        })
    }

    async fn raw_row(&self, id: &str) -> (i64, Option<String>) {
        let sql = format!(
            "SELECT expires, attributes FROM {} WHERE session_id = $1",
            quote_ident(&self.table)
        );
        sqlx::query_as::<_, (i64, Option<String>)>(&sql)
            .bind(id)
            .fetch_one(&self.admin)
            .await
            .expect("row should exist")
    }

    async fn teardown(self) {
        let sql = format!("DROP TABLE IF EXISTS {}", quote_ident(&self.table));
        sqlx::query(&sql).execute(&self.admin).await.expect("drop table");
    }
}

fn expiring_at(epoch_secs: i64, attributes: serde_json::Value) -> SessionData {
    let Some(at) = DateTime::<Utc>::from_timestamp(epoch_secs, 0) else {
        panic!("valid timestamp");
    };
    let serde_json::Value::Object(attributes) = attributes else {
        panic!("attributes must be an object");
    };
    SessionData {
        cookie: Some(SessionCookie {
            expires: Some(at),
            extra: Map::new(),
        }),
        attributes,
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn set_then_get_round_trips() {
    let Some(fx) = Fixture::open().await else {
        return;
    };
    let session = expiring_at(4_102_444_800, json!({ "user": { "id": 7 }, "flash": null }));

    fx.store.set("sid-1", &session).await.unwrap();
    let loaded = fx.store.get("sid-1").await.unwrap();
    assert_eq!(loaded, Some(session));

    fx.teardown().await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn set_overwrites_in_place() {
    let Some(fx) = Fixture::open().await else {
        return;
    };
    fx.store
        .set("sid", &expiring_at(1_000, json!({ "v": 1 })))
        .await
        .unwrap();
    fx.store
        .set("sid", &expiring_at(2_000, json!({ "v": 2 })))
        .await
        .unwrap();

    assert_eq!(fx.store.length().await.unwrap(), 1);
    let (expires, data) = fx.raw_row("sid").await;
    assert_eq!(expires, 2_000);
    assert!(data.unwrap_or_default().contains("\"v\":2"));

    fx.teardown().await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn touch_changes_only_expiry() {
    let Some(fx) = Fixture::open().await else {
        return;
    };
    fx.store
        .set("sid", &expiring_at(1_000, json!({ "cart": [1, 2] })))
        .await
        .unwrap();
    let before = fx.store.get("sid").await.unwrap();

    fx.store
        .touch("sid", &expiring_at(5_000, json!({ "cart": [] })))
        .await
        .unwrap();

    let after = fx.store.get("sid").await.unwrap();
    assert_eq!(before, after);
    let (expires, _) = fx.raw_row("sid").await;
    assert_eq!(expires, 5_000);

    fx.teardown().await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn touch_and_destroy_of_unknown_id_succeed() {
    let Some(fx) = Fixture::open().await else {
        return;
    };
    fx.store
        .touch("ghost", &SessionData::default())
        .await
        .unwrap();
    fx.store.destroy("ghost").await.unwrap();
    assert_eq!(fx.store.length().await.unwrap(), 0);

    fx.teardown().await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn destroy_then_get_is_none() {
    let Some(fx) = Fixture::open().await else {
        return;
    };
    fx.store.set("sid", &SessionData::default()).await.unwrap();
    fx.store.destroy("sid").await.unwrap();

    assert_eq!(fx.store.get("sid").await.unwrap(), None);

    fx.teardown().await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn sweep_removes_rows_strictly_before_reference() {
    let Some(fx) = Fixture::open().await else {
        return;
    };
    fx.store.set("a", &expiring_at(100, json!({}))).await.unwrap();
    fx.store.set("b", &expiring_at(200, json!({}))).await.unwrap();
    fx.store.set("edge", &expiring_at(150, json!({}))).await.unwrap();

    let removed = fx.store.clear_expired_before(150).await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(fx.store.get("a").await.unwrap(), None);
    assert!(fx.store.get("b").await.unwrap().is_some());
    assert!(fx.store.get("edge").await.unwrap().is_some());

    fx.teardown().await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn bootstrap_against_existing_table_is_success() {
    let Some(fx) = Fixture::open().await else {
        return;
    };
    assert_eq!(fx.store.ensure_table().await, BootstrapOutcome::AlreadyExists);
    assert!(!fx.store.pool().health().current().is_fatal());

    fx.teardown().await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn corrupt_payload_is_reported_with_session_id() {
    let Some(fx) = Fixture::open().await else {
        return;
    };
    let sql = format!(
        "INSERT INTO {} (session_id, expires, attributes) VALUES ($1, $2, $3)",
        quote_ident(&fx.table)
    );
    sqlx::query(&sql)
        .bind("broken")
        .bind(i64::MAX)
        .bind("{not json")
        .execute(&fx.admin)
        .await
        .unwrap();

    let err = fx.store.get("broken").await.unwrap_err();
    assert!(matches!(err, StoreError::CorruptSession { ref session_id } if session_id == "broken"));

    fx.teardown().await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn stored_null_payload_is_no_session() {
    let Some(fx) = Fixture::open().await else {
        return;
    };
    let sql = format!(
        "INSERT INTO {} (session_id, expires, attributes) VALUES ($1, $2, $3)",
        quote_ident(&fx.table)
    );
    sqlx::query(&sql)
        .bind("void")
        .bind(i64::MAX)
        .bind("null")
        .execute(&fx.admin)
        .await
        .unwrap();

    assert_eq!(fx.store.get("void").await.unwrap(), None);

    fx.teardown().await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn explicit_null_cookie_round_trips() {
    let Some(fx) = Fixture::open().await else {
        return;
    };
    let session: SessionData = serde_json::from_value(json!({ "cookie": null, "n": 1 })).unwrap();

    fx.store.set("sid", &session).await.unwrap();
    let (_, data) = fx.raw_row("sid").await;
    assert_eq!(data.as_deref(), Some(r#"{"cookie":null,"n":1}"#));

    fx.teardown().await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn clear_deletes_everything() {
    let Some(fx) = Fixture::open().await else {
        return;
    };
    fx.store.set("a", &SessionData::default()).await.unwrap();
    fx.store.set("b", &SessionData::default()).await.unwrap();
    assert_eq!(fx.store.length().await.unwrap(), 2);

    fx.store.clear().await.unwrap();
    assert_eq!(fx.store.length().await.unwrap(), 0);

    fx.teardown().await;
}
