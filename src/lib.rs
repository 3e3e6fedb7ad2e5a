//! habitd - habit-tracking REST backend
//!
//! habitd stores habits in MongoDB and serves them over an authenticated
//! HTTP API. Public habits are browsable by anyone; everything else is
//! gated on the bearer identity resolved from a JWT.
//!
//! ## Services
//!
//! - **Engine**: access-control, validation, and completion rules
//! - **Store**: MongoDB persistence behind the `HabitStore` trait
//! - **Server**: hyper http1 front-end routing to the handlers

pub mod auth;
pub mod config;
pub mod db;
pub mod engine;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{HabitError, Result};
