//! Habit Access & Mutation Engine
//!
//! Enforces ownership and visibility rules, derives default fields on
//! creation, and normalizes completion events to one per calendar day.
//! Also records registered accounts, one per authenticated subject.
//! Request-scoped and stateless between calls; all durable state lives
//! in the injected [`HabitStore`](crate::db::HabitStore) and
//! [`UserStore`](crate::db::UserStore).

mod habits;
mod users;

pub use habits::{CompletionOutcome, HabitEngine, FEATURED_LIMIT};
pub use users::{RegistrationOutcome, UserRegistry};
