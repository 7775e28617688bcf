//! Repository implementations for database access.
//!
//! Each repository wraps a SQLx connection or transaction, implements the [`Repository`] trait
//! and returns records from [`crate::db::models`].

pub mod repository;
pub mod tools;

pub use repository::Repository;
pub use tools::{ToolFilter, Tools};
