//! Postgres access layer.
//!
//! `DbOperations` owns the pool; each sibling module adds the queries for
//! one resource as an `impl DbOperations` block.

pub mod content;
pub mod crime;
pub mod favorites;
pub mod filters;
pub mod locations;
pub mod logs;
pub mod messages;
pub mod models;
pub mod operations;
pub mod properties;
pub mod settings;
pub mod stats;
pub mod users;

pub use models::{Page, Property, Role, User, UserSession};
pub use operations::DbOperations;
