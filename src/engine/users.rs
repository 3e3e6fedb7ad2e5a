//! Account registration rules

use bson::DateTime;
use std::sync::Arc;
use tracing::info;

use crate::auth::Identity;
use crate::db::schemas::{RegisterInput, UserDoc};
use crate::db::UserStore;
use crate::types::{HabitError, Result};

/// Result of reporting a successful sign-up
#[derive(Debug, Clone)]
pub enum RegistrationOutcome {
    /// First report for this subject; a record was created
    Created(UserDoc),
    /// A record for this subject already existed; nothing changed
    AlreadyRegistered(UserDoc),
}

/// Persists one user record per authenticated subject
pub struct UserRegistry {
    store: Arc<dyn UserStore>,
}

impl UserRegistry {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Record the caller's account after a successful sign-up with the
    /// identity provider. Identity fields come from the verified token,
    /// never from the body; repeat calls for the same subject are no-ops.
    pub async fn register(
        &self,
        input: RegisterInput,
        identity: Option<&Identity>,
    ) -> Result<RegistrationOutcome> {
        let identity = identity.ok_or(HabitError::Unauthenticated)?;

        let user = UserDoc {
            id: None,
            email: identity.email.clone(),
            full_name: identity.display_name.clone(),
            photo_url: input.photo_url,
            subject_id: identity.subject_id.clone(),
            created_at: DateTime::now(),
        };

        let created = self.store.upsert(user).await?;
        let stored = self
            .store
            .find_by_subject(&identity.subject_id)
            .await?
            .ok_or_else(|| HabitError::Database("Registered user not readable back".into()))?;

        if created {
            info!(
                "User registered: {} (subject: {})",
                identity.email, identity.subject_id
            );
            Ok(RegistrationOutcome::Created(stored))
        } else {
            Ok(RegistrationOutcome::AlreadyRegistered(stored))
        }
    }
}
