//! Integration tests for account registration
//!
//! These run the registry over an in-memory store whose upsert applies the
//! subject-dedup condition and the insert under one lock, matching the
//! conditional upsert the MongoDB store issues.

use async_trait::async_trait;
use bson::oid::ObjectId;
use std::sync::{Arc, Mutex};

use habitd::auth::Identity;
use habitd::db::schemas::{RegisterInput, UserDoc};
use habitd::db::UserStore;
use habitd::engine::{RegistrationOutcome, UserRegistry};
use habitd::types::HabitError;

#[derive(Default)]
struct MemoryUserStore {
    users: Mutex<Vec<UserDoc>>,
}

impl MemoryUserStore {
    fn count(&self) -> usize {
        self.users.lock().unwrap().len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn upsert(&self, mut user: UserDoc) -> habitd::Result<bool> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.subject_id == user.subject_id) {
            return Ok(false);
        }
        user.id = Some(ObjectId::new());
        users.push(user);
        Ok(true)
    }

    async fn find_by_subject(&self, subject_id: &str) -> habitd::Result<Option<UserDoc>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.subject_id == subject_id)
            .cloned())
    }
}

fn setup() -> (UserRegistry, Arc<MemoryUserStore>) {
    let store = Arc::new(MemoryUserStore::default());
    (UserRegistry::new(store.clone()), store)
}

fn identity(email: &str, name: &str, subject: &str) -> Identity {
    Identity {
        email: email.to_string(),
        display_name: name.to_string(),
        subject_id: subject.to_string(),
    }
}

#[tokio::test]
async fn test_register_stamps_from_identity() {
    let (registry, store) = setup();
    let alice = identity("alice@x.com", "Alice", "uid-1");

    let input = RegisterInput {
        photo_url: Some("https://x.com/a.png".into()),
    };
    let outcome = registry.register(input, Some(&alice)).await.unwrap();

    let RegistrationOutcome::Created(user) = outcome else {
        panic!("expected first registration to create a record");
    };
    assert_eq!(user.email, "alice@x.com");
    assert_eq!(user.full_name, "Alice");
    assert_eq!(user.subject_id, "uid-1");
    assert_eq!(user.photo_url.as_deref(), Some("https://x.com/a.png"));
    assert!(user.id.is_some());
    assert_eq!(store.count(), 1);
}

#[tokio::test]
async fn test_register_requires_identity() {
    let (registry, store) = setup();

    let err = registry
        .register(RegisterInput::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, HabitError::Unauthenticated));
    assert_eq!(store.count(), 0);
}

#[tokio::test]
async fn test_repeat_registration_is_a_noop() {
    let (registry, store) = setup();
    let alice = identity("alice@x.com", "Alice", "uid-1");

    let input = RegisterInput {
        photo_url: Some("https://x.com/old.png".into()),
    };
    registry.register(input, Some(&alice)).await.unwrap();

    // Same subject, new display name and photo: the stored record wins
    let renamed = identity("alice@x.com", "Alice Cooper", "uid-1");
    let input = RegisterInput {
        photo_url: Some("https://x.com/new.png".into()),
    };
    let outcome = registry.register(input, Some(&renamed)).await.unwrap();

    let RegistrationOutcome::AlreadyRegistered(user) = outcome else {
        panic!("expected repeat registration to be a no-op");
    };
    assert_eq!(user.full_name, "Alice");
    assert_eq!(user.photo_url.as_deref(), Some("https://x.com/old.png"));
    assert_eq!(store.count(), 1);
}

#[tokio::test]
async fn test_distinct_subjects_register_separately() {
    let (registry, store) = setup();
    let alice = identity("alice@x.com", "Alice", "uid-1");
    let bob = identity("bob@x.com", "Bob", "uid-2");

    registry
        .register(RegisterInput::default(), Some(&alice))
        .await
        .unwrap();
    let outcome = registry
        .register(RegisterInput::default(), Some(&bob))
        .await
        .unwrap();

    assert!(matches!(outcome, RegistrationOutcome::Created(_)));
    assert_eq!(store.count(), 2);
}

#[tokio::test]
async fn test_registration_body_cannot_impersonate() {
    let (registry, _) = setup();
    let alice = identity("alice@x.com", "Alice", "uid-1");

    // A body carrying someone else's identity fields: only the photo
    // survives deserialization
    let input: RegisterInput = serde_json::from_str(
        r#"{"email": "mallory@x.com", "fullName": "Mallory", "firebaseUID": "uid-999", "photoURL": "https://x.com/m.png"}"#,
    )
    .unwrap();

    let outcome = registry.register(input, Some(&alice)).await.unwrap();
    let RegistrationOutcome::Created(user) = outcome else {
        panic!("expected a created record");
    };
    assert_eq!(user.email, "alice@x.com");
    assert_eq!(user.subject_id, "uid-1");
    assert_eq!(user.photo_url.as_deref(), Some("https://x.com/m.png"));
}
