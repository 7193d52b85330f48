//! Managed persistence context.
//!
//! # Responsibility
//! - Own identity assignment and change tracking for entity instances.
//! - Keep persistence mechanics out of the entity structs themselves.

pub mod model_context;
