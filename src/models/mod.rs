//! Data models for the trip journal.
//!
//! Field names follow the camelCase JSON the mobile client exchanges with the backend.

mod activity;
mod auth;
mod trip;

pub use activity::*;
pub use auth::*;
pub use trip::*;
