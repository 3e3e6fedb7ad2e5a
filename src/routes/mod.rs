//! HTTP routes for habitd

pub mod habits;
pub mod health;
pub mod users;

pub use habits::{
    handle_complete, handle_create, handle_delete, handle_detail, handle_featured,
    handle_my_habits, handle_public, handle_update,
};
pub use health::{health_check, version_info};
pub use users::handle_register;
