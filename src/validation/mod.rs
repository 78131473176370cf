//! Validation of setting values
//!
//! The [`Validator`] borrows a [`SchemaRegistry`](crate::registry::SchemaRegistry)
//! and checks candidate values against it. Rejections are described by
//! [`ValidationError`], whose `Display` text is what callers show to users.

mod error;
mod rules;
mod validator;

pub use error::ValidationError;
pub use rules::{check_rule, check_rule_with, PatternCache};
pub use validator::{validate_schema, ValidationReport, Validator};
