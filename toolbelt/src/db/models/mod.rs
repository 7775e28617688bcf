//! Database record types.

pub mod tools;
