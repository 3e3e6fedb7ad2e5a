//! Database layer for habitd
//!
//! MongoDB client wrapper, document schemas, and the `HabitStore` seam
//! the engine talks to.

pub mod mongo;
pub mod schemas;
pub mod store;
pub mod users;

pub use mongo::{IntoIndexes, MongoClient, MongoCollection};
pub use store::{HabitQuery, HabitStore, MongoHabitStore};
pub use users::{MongoUserStore, UserStore};
