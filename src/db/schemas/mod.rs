//! Database schemas for habitd

mod habit;
mod user;

pub use habit::{Category, CreateHabitInput, HabitDoc, HabitPatch, HABIT_COLLECTION};
pub use user::{RegisterInput, UserDoc, USER_COLLECTION};
