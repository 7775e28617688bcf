//! HTTP request handlers for all API endpoints.
//!
//! - [`conversions`]: File upload endpoints that run a conversion service
//! - [`root`]: Welcome message at the site root
//! - [`tools`]: Tool registry CRUD
//!
//! Handlers return [`crate::errors::Error`], which converts every failure into the JSON
//! response envelope with the matching status code.

pub mod conversions;
pub mod root;
pub mod tools;
