//! PostgreSQL session document store behaviour.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use userhub_core::session::{CookieMeta, SessionPatch, SessionRecord};
use userhub_db::repositories::SessionRepo;
use userhub_db::SessionStore;
use uuid::Uuid;

fn record(user_id: Uuid) -> SessionRecord {
    SessionRecord::new(user_id, "pg@x.com", Uuid::new_v4(), Utc::now(), Duration::days(365))
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_set_merges_into_existing_document(pool: PgPool) {
    let store = SessionRepo::new(pool);
    let mut rec = record(Uuid::new_v4());
    rec.refresh_jti = Some(Uuid::new_v4());
    store.set(&rec).await.unwrap();

    let mut second = rec.clone();
    second.refresh_jti = None;
    second.email = "other@x.com".to_string();
    store.set(&second).await.unwrap();

    let found = store.get(rec.session_id).await.unwrap().unwrap();
    assert_eq!(found.email, "other@x.com");
    assert_eq!(found.refresh_jti, rec.refresh_jti);
    assert!(found.last_access.is_some());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_get_destroys_expired_document(pool: PgPool) {
    let store = SessionRepo::new(pool);
    let mut rec = record(Uuid::new_v4());
    rec.cookie = Some(CookieMeta::expired(Utc::now() - Duration::minutes(5)));
    store.set(&rec).await.unwrap();

    assert!(store.get(rec.session_id).await.unwrap().is_none());
    assert_eq!(store.length().await.unwrap(), 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_patch_only_writes_named_fields(pool: PgPool) {
    let store = SessionRepo::new(pool);
    let rec = record(Uuid::new_v4());
    store.set(&rec).await.unwrap();

    let now = Utc::now();
    assert!(store.patch(rec.session_id, &SessionPatch::revocation(now)).await.unwrap());
    assert!(!store.patch(Uuid::new_v4(), &SessionPatch::revocation(now)).await.unwrap());

    let found = store.get(rec.session_id).await.unwrap().unwrap();
    assert!(!found.is_active);
    assert_eq!(found.email, rec.email);
    assert_eq!(found.expires_at, rec.expires_at);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_rotate_refresh_rejects_stale_jti(pool: PgPool) {
    let store = SessionRepo::new(pool);
    let first = Uuid::new_v4();
    let mut rec = record(Uuid::new_v4());
    rec.refresh_jti = Some(first);
    store.set(&rec).await.unwrap();

    let second = Uuid::new_v4();
    assert!(store.rotate_refresh(rec.session_id, first, second).await.unwrap());
    assert!(!store.rotate_refresh(rec.session_id, first, Uuid::new_v4()).await.unwrap());

    let found = store.get(rec.session_id).await.unwrap().unwrap();
    assert_eq!(found.refresh_jti, Some(second));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_bulk_deletes_and_clear(pool: PgPool) {
    let store = SessionRepo::new(pool);
    let owner = Uuid::new_v4();
    let records = [record(owner), record(owner), record(Uuid::new_v4()), record(Uuid::new_v4())];
    for rec in &records {
        store.set(rec).await.unwrap();
    }

    assert_eq!(store.destroy_many(&[]).await.unwrap(), 0);
    assert_eq!(store.destroy_many(&[records[2].session_id]).await.unwrap(), 1);
    assert_eq!(store.destroy_for_user(owner).await.unwrap(), 2);
    assert_eq!(store.all().await.unwrap().len(), 1);
    assert_eq!(store.clear().await.unwrap(), 1);
    assert_eq!(store.length().await.unwrap(), 0);
}
