//! Habit access-control and mutation rules

use bson::{oid::ObjectId, DateTime};
use chrono::{Duration, Local, NaiveDateTime, NaiveTime, TimeZone, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::Identity;
use crate::db::schemas::{Category, CreateHabitInput, HabitDoc, HabitPatch};
use crate::db::{HabitQuery, HabitStore};
use crate::types::{HabitError, Result};

/// How many habits the featured listing returns
pub const FEATURED_LIMIT: i64 = 6;

const MAX_TITLE_CHARS: usize = 100;
const MAX_DESCRIPTION_CHARS: usize = 500;

/// Result of marking a habit complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// A new completion timestamp was appended
    Recorded(DateTime),
    /// The habit was already completed today; nothing changed
    AlreadyCompleted,
}

/// The engine. One instance per process, shared across requests; it holds
/// no mutable state of its own.
pub struct HabitEngine {
    store: Arc<dyn HabitStore>,
}

impl HabitEngine {
    pub fn new(store: Arc<dyn HabitStore>) -> Self {
        Self { store }
    }

    /// The 6 newest public habits, newest first
    pub async fn list_featured(&self) -> Result<Vec<HabitDoc>> {
        self.store
            .list(HabitQuery {
                public_only: true,
                limit: Some(FEATURED_LIMIT),
                ..Default::default()
            })
            .await
    }

    /// All public habits, newest first, optionally narrowed by a
    /// case-insensitive substring over title/description and an exact
    /// category. Both filters compose conjunctively.
    pub async fn list_public(
        &self,
        search: Option<String>,
        category: Option<Category>,
    ) -> Result<Vec<HabitDoc>> {
        self.store
            .list(HabitQuery {
                public_only: true,
                search: search.filter(|s| !s.is_empty()),
                category,
                ..Default::default()
            })
            .await
    }

    /// All habits owned by the caller, newest first
    pub async fn list_owned(&self, identity: Option<&Identity>) -> Result<Vec<HabitDoc>> {
        let identity = identity.ok_or(HabitError::Unauthenticated)?;

        self.store
            .list(HabitQuery {
                owner_email: Some(identity.email.clone()),
                ..Default::default()
            })
            .await
    }

    /// Fetch a single habit. Private habits are visible only to their owner.
    pub async fn get_detail(&self, id: &str, identity: Option<&Identity>) -> Result<HabitDoc> {
        let oid = parse_id(id)?;
        let habit = self
            .store
            .find_by_id(oid)
            .await?
            .ok_or(HabitError::NotFound)?;

        if !habit.is_public && !is_owner(&habit, identity) {
            return Err(HabitError::Forbidden);
        }

        Ok(habit)
    }

    /// Create a habit from validated client input. The engine stamps owner
    /// fields and the creation timestamp; clients cannot supply them.
    pub async fn create(
        &self,
        input: CreateHabitInput,
        identity: Option<&Identity>,
    ) -> Result<ObjectId> {
        let identity = identity.ok_or(HabitError::Unauthenticated)?;
        validate_create(&input)?;

        let habit = HabitDoc {
            id: None,
            title: input.title,
            description: input.description,
            category: input.category,
            reminder_time: input.reminder_time,
            image: input.image,
            owner_email: identity.email.clone(),
            owner_name: identity.display_name.clone(),
            is_public: input.is_public.unwrap_or(true),
            completion_history: Vec::new(),
            created_at: DateTime::now(),
        };

        let id = self.store.insert(habit).await?;
        info!("Habit created: {} (owner: {})", id, identity.email);
        Ok(id)
    }

    /// Merge-apply a patch to an owned habit. Protected fields cannot
    /// appear in the patch type; success is reported whether or not any
    /// value actually changed.
    pub async fn update(
        &self,
        id: &str,
        patch: HabitPatch,
        identity: Option<&Identity>,
    ) -> Result<()> {
        let identity = identity.ok_or(HabitError::Unauthenticated)?;
        let oid = parse_id(id)?;
        validate_patch(&patch)?;

        let habit = self
            .store
            .find_by_id(oid)
            .await?
            .ok_or(HabitError::NotFound)?;
        if habit.owner_email != identity.email {
            return Err(HabitError::Forbidden);
        }

        if patch.is_empty() {
            return Ok(());
        }

        // Ownership is re-checked inside the update filter; a record that
        // vanished since the read surfaces as NotFound.
        let matched = self
            .store
            .update_fields(oid, &identity.email, &patch)
            .await?;
        if !matched {
            return Err(HabitError::NotFound);
        }

        debug!("Habit updated: {} (owner: {})", oid, identity.email);
        Ok(())
    }

    /// Permanently remove an owned habit
    pub async fn delete(&self, id: &str, identity: Option<&Identity>) -> Result<()> {
        let identity = identity.ok_or(HabitError::Unauthenticated)?;
        let oid = parse_id(id)?;

        let habit = self
            .store
            .find_by_id(oid)
            .await?
            .ok_or(HabitError::NotFound)?;
        if habit.owner_email != identity.email {
            return Err(HabitError::Forbidden);
        }

        let deleted = self.store.delete(oid, &identity.email).await?;
        if !deleted {
            // Vanished between the ownership check and the delete
            return Err(HabitError::NotFound);
        }

        info!("Habit deleted: {} (owner: {})", oid, identity.email);
        Ok(())
    }

    /// Mark an owned habit complete for today. At most one completion is
    /// recorded per calendar day (local midnight boundary); a second
    /// attempt the same day is a success no-op.
    pub async fn complete(
        &self,
        id: &str,
        identity: Option<&Identity>,
    ) -> Result<CompletionOutcome> {
        let identity = identity.ok_or(HabitError::Unauthenticated)?;
        let oid = parse_id(id)?;

        let habit = self
            .store
            .find_by_id(oid)
            .await?
            .ok_or(HabitError::NotFound)?;
        if habit.owner_email != identity.email {
            return Err(HabitError::Forbidden);
        }

        let now = Local::now();
        let (day_start, day_end) = local_day_bounds(now);

        let already_today = habit.completion_history.iter().any(|t| {
            let instant = t.to_chrono();
            instant >= day_start && instant < day_end
        });
        if already_today {
            return Ok(CompletionOutcome::AlreadyCompleted);
        }

        // The history carries the raw completion moment, not the
        // day-normalized one; the same-day condition rides in the store
        // filter, so the check and the append are atomic.
        let at = DateTime::from_chrono(now.with_timezone(&Utc));
        let pushed = self
            .store
            .push_completion(
                oid,
                &identity.email,
                at,
                DateTime::from_chrono(day_start),
                DateTime::from_chrono(day_end),
            )
            .await?;

        if pushed {
            info!("Habit completed: {} (owner: {})", oid, identity.email);
            return Ok(CompletionOutcome::Recorded(at));
        }

        // Lost a race: either a concurrent completion landed first, or the
        // record was deleted. Re-read to tell the two apart.
        match self.store.find_by_id(oid).await? {
            Some(_) => Ok(CompletionOutcome::AlreadyCompleted),
            None => Err(HabitError::NotFound),
        }
    }
}

fn parse_id(id: &str) -> Result<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| HabitError::InvalidId(id.to_string()))
}

fn is_owner(habit: &HabitDoc, identity: Option<&Identity>) -> bool {
    identity.is_some_and(|i| i.email == habit.owner_email)
}

fn validate_create(input: &CreateHabitInput) -> Result<()> {
    check_title(&input.title)?;
    check_description(&input.description)?;
    if input.reminder_time.trim().is_empty() {
        return Err(HabitError::InvalidInput("reminderTime is required".into()));
    }
    Ok(())
}

fn validate_patch(patch: &HabitPatch) -> Result<()> {
    if let Some(ref title) = patch.title {
        check_title(title)?;
    }
    if let Some(ref description) = patch.description {
        check_description(description)?;
    }
    if let Some(ref reminder_time) = patch.reminder_time {
        if reminder_time.trim().is_empty() {
            return Err(HabitError::InvalidInput("reminderTime cannot be empty".into()));
        }
    }
    Ok(())
}

fn check_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(HabitError::InvalidInput("title is required".into()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(HabitError::InvalidInput(format!(
            "title cannot be more than {} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(())
}

fn check_description(description: &str) -> Result<()> {
    if description.trim().is_empty() {
        return Err(HabitError::InvalidInput("description is required".into()));
    }
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(HabitError::InvalidInput(format!(
            "description cannot be more than {} characters",
            MAX_DESCRIPTION_CHARS
        )));
    }
    Ok(())
}

/// Bounds of "today" as UTC instants: the local calendar day containing
/// `now`, from local midnight (inclusive) to the next (exclusive).
fn local_day_bounds(
    now: chrono::DateTime<Local>,
) -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>) {
    let date = now.date_naive();
    let start = resolve_local(date.and_time(NaiveTime::MIN), now);
    let end = resolve_local((date + Duration::days(1)).and_time(NaiveTime::MIN), now);
    (start, end)
}

/// Map a naive local time to UTC, preferring the earlier instant when DST
/// makes it ambiguous; when it does not exist at all, fall back to `now`.
fn resolve_local(naive: NaiveDateTime, fallback: chrono::DateTime<Local>) -> chrono::DateTime<Utc> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or(fallback)
        .with_timezone(&Utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::Category;

    fn valid_input() -> CreateHabitInput {
        CreateHabitInput {
            title: "Morning Run".into(),
            description: "5k before work".into(),
            category: Category::Fitness,
            reminder_time: "06:30".into(),
            image: None,
            is_public: None,
        }
    }

    #[test]
    fn test_create_validation_limits() {
        assert!(validate_create(&valid_input()).is_ok());

        let mut long_title = valid_input();
        long_title.title = "x".repeat(101);
        assert!(validate_create(&long_title).is_err());

        let mut long_description = valid_input();
        long_description.description = "x".repeat(501);
        assert!(validate_create(&long_description).is_err());

        let mut no_reminder = valid_input();
        no_reminder.reminder_time = "  ".into();
        assert!(validate_create(&no_reminder).is_err());
    }

    #[test]
    fn test_patch_validation() {
        assert!(validate_patch(&HabitPatch::default()).is_ok());

        let patch = HabitPatch {
            title: Some("".into()),
            ..Default::default()
        };
        assert!(validate_patch(&patch).is_err());

        let patch = HabitPatch {
            description: Some("x".repeat(500)),
            ..Default::default()
        };
        assert!(validate_patch(&patch).is_ok());
    }

    #[test]
    fn test_local_day_bounds_cover_now() {
        let now = Local::now();
        let (start, end) = local_day_bounds(now);
        let now_utc = now.with_timezone(&Utc);

        assert!(start <= now_utc);
        assert!(now_utc < end);
        // A full day unless a DST transition shortens or stretches it
        let span = end - start;
        assert!(span >= Duration::hours(23) && span <= Duration::hours(25));
    }

    #[test]
    fn test_invalid_id_is_distinguished() {
        let err = parse_id("not-an-object-id").unwrap_err();
        assert!(matches!(err, HabitError::InvalidId(_)));
        assert!(parse_id("65f1a2b3c4d5e6f7a8b9c0d1").is_ok());
    }
}
