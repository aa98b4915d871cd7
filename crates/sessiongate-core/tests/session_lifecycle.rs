use std::sync::Arc;
use std::thread;

use chrono::{Duration, Utc};
use sessiongate_core::auth::{SessionAuth, SessionDbAuth};
use sessiongate_core::store::{
    Criteria, Expiring, JsonFileRecordStore, ManualClock, MemorySessionStore,
    PersistedSessionStore, Record, RecordStore,
};
use sessiongate_core::users::RecordUserRepo;
use sessiongate_core::{
    AccountService, Argon2Hasher, AuthStrategy, Hasher, RequestParts, SessionDuration,
    SessionStore, StoreError, UserRepo,
};

const COOKIE: &str = "session_id";

fn fast_hasher() -> Arc<dyn Hasher> {
    Arc::new(Argon2Hasher::with_params(8, 1, 1).unwrap())
}

/// Record store whose backend is always down
struct UnreachableStore;

impl RecordStore for UnreachableStore {
    fn search(&self, _criteria: &Criteria) -> Result<Vec<Record>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    fn save(&self, _record: &Record) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    fn delete(&self, _record: &Record) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

#[test]
fn test_round_trip_for_every_store() {
    let stores: Vec<Box<dyn SessionStore>> = vec![
        Box::new(MemorySessionStore::new()),
        Box::new(Expiring::new(MemorySessionStore::new(), SessionDuration::from_secs(60))),
        Box::new(PersistedSessionStore::new(
            sessiongate_core::store::MemoryRecordStore::new(),
        )),
        Box::new(Expiring::new(
            PersistedSessionStore::new(sessiongate_core::store::MemoryRecordStore::new()),
            SessionDuration::from_secs(60),
        )),
    ];

    for store in stores {
        for user_id in ["u1", "user-with-dashes", "42"] {
            let token = store.create(user_id).unwrap().unwrap();
            assert_eq!(store.user_id_for_session(&token).unwrap().as_deref(), Some(user_id));
            assert!(store.destroy(&token).unwrap());
            assert!(!store.destroy(&token).unwrap());
            assert!(store.lookup(&token).unwrap().is_none());
        }
        assert!(store.create("").unwrap().is_none());
    }
}

#[test]
fn test_never_expiring_session_scenario() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = Expiring::with_clock(
        MemorySessionStore::new(),
        SessionDuration::NEVER,
        clock.clone(),
    );

    let token = store.create("u1").unwrap().unwrap();
    clock.advance(Duration::days(365 * 50));
    assert_eq!(store.user_id_for_session(&token).unwrap().as_deref(), Some("u1"));

    assert!(store.destroy(&token).unwrap());
    assert!(store.user_id_for_session(&token).unwrap().is_none());
}

#[test]
fn test_persisted_expiry_through_strategy() {
    let users: Arc<dyn UserRepo> = Arc::new(RecordUserRepo::new(
        sessiongate_core::store::MemoryRecordStore::new(),
    ));
    let accounts = AccountService::new(users.clone(), fast_hasher());
    let bob = accounts.register_user("bob@example.com", "pw").unwrap();

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = Expiring::with_clock(
        PersistedSessionStore::new(sessiongate_core::store::MemoryRecordStore::new()),
        SessionDuration::from_secs(10),
        clock.clone(),
    );
    let auth = SessionAuth::new(store, COOKIE, users);

    let token = auth.create_session(&bob.id).unwrap().unwrap();
    let req = RequestParts::new("/api/v1/users/me").with_cookie(COOKIE, token.to_string());
    let created = auth
        .store()
        .inner()
        .lookup(&token)
        .unwrap()
        .unwrap()
        .created_at
        .unwrap();

    clock.set(created + Duration::seconds(9));
    assert_eq!(auth.current_user(&req).unwrap(), Some(bob));

    clock.set(created + Duration::seconds(11));
    assert!(auth.current_user(&req).unwrap().is_none());

    // Expired but still stored, so logout still finds and removes it
    assert!(auth.destroy_session(&req).unwrap());
    assert!(!auth.destroy_session(&req).unwrap());
}

#[test]
fn test_db_sessions_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let users: Arc<dyn UserRepo> =
        Arc::new(RecordUserRepo::new(JsonFileRecordStore::open(dir.path(), "users").unwrap()));
    let accounts = AccountService::new(users.clone(), fast_hasher());
    let bob = accounts.register_user("bob@example.com", "pw").unwrap();

    let token = {
        let records = JsonFileRecordStore::open(dir.path(), "sessions").unwrap();
        let auth: SessionDbAuth<JsonFileRecordStore> = SessionAuth::new(
            Expiring::new(PersistedSessionStore::new(records), SessionDuration::from_secs(3600)),
            COOKIE,
            users.clone(),
        );
        auth.create_session(&bob.id).unwrap().unwrap()
    };

    let records = JsonFileRecordStore::open(dir.path(), "sessions").unwrap();
    let auth: SessionDbAuth<JsonFileRecordStore> = SessionAuth::new(
        Expiring::new(PersistedSessionStore::new(records), SessionDuration::from_secs(3600)),
        COOKIE,
        users,
    );
    let req = RequestParts::new("/").with_header("Cookie", format!("{}={}", COOKIE, token));
    assert_eq!(auth.current_user(&req).unwrap(), Some(bob));
    assert!(auth.destroy_session(&req).unwrap());
    assert!(auth.current_user(&req).unwrap().is_none());
}

#[test]
fn test_store_failure_is_not_absence() {
    let store = PersistedSessionStore::new(UnreachableStore);
    assert!(matches!(store.create("u1"), Err(StoreError::Unavailable(_))));

    let token = sessiongate_core::SessionToken::generate();
    assert!(matches!(store.lookup(&token), Err(StoreError::Unavailable(_))));
    assert!(matches!(store.destroy(&token), Err(StoreError::Unavailable(_))));

    let users: Arc<dyn UserRepo> = Arc::new(RecordUserRepo::new(UnreachableStore));
    let auth = SessionAuth::new(MemorySessionStore::new(), COOKIE, users);
    let token = auth.create_session("u1").unwrap().unwrap();
    let req = RequestParts::new("/").with_cookie(COOKIE, token.to_string());
    assert!(matches!(auth.current_user(&req), Err(StoreError::Unavailable(_))));
}

#[test]
fn test_concurrent_create_and_destroy() {
    let store = MemorySessionStore::new();
    let threads = 8;
    let per_thread = 200;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let store = store.clone();
            thread::spawn(move || {
                let mut kept = Vec::new();
                for i in 0..per_thread {
                    let user_id = format!("user-{}-{}", t, i);
                    let token = store.create(&user_id).unwrap().unwrap();
                    if i % 2 == 0 {
                        assert!(store.destroy(&token).unwrap());
                    } else {
                        kept.push((token, user_id));
                    }
                }
                kept
            })
        })
        .collect();

    let kept: Vec<_> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();

    assert_eq!(kept.len(), threads * per_thread / 2);
    assert_eq!(store.len(), kept.len());
    for (token, user_id) in kept {
        assert_eq!(store.user_id_for_session(&token).unwrap(), Some(user_id));
    }
}

#[test]
fn test_concurrent_strategy_access() {
    let users: Arc<dyn UserRepo> = Arc::new(RecordUserRepo::new(
        sessiongate_core::store::MemoryRecordStore::new(),
    ));
    let auth = Arc::new(SessionAuth::new(
        Expiring::new(MemorySessionStore::new(), SessionDuration::from_secs(60)),
        COOKIE,
        users,
    ));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let auth = Arc::clone(&auth);
            thread::spawn(move || {
                for i in 0..100 {
                    let token = auth.create_session(&format!("{}-{}", t, i)).unwrap().unwrap();
                    let req = RequestParts::new("/").with_cookie(COOKIE, token.to_string());
                    assert!(auth.user_id_for_session(&token.to_string()).unwrap().is_some());
                    assert!(auth.destroy_session(&req).unwrap());
                    assert!(auth.user_id_for_session(&token.to_string()).unwrap().is_none());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(auth.store().inner().is_empty());
}
