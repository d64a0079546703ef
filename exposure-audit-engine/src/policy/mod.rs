//! IAM policy document model: parsing, principals, and conditions.

pub mod condition;
pub mod document;
pub mod principal;
