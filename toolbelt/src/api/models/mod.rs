//! API request and response models.

pub mod responses;
pub mod tools;
