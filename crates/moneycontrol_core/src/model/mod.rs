//! Domain model for persisted records.
//!
//! # Responsibility
//! - Define plain data structures used by core business logic.
//! - Keep identity and storage concerns out of entity fields.
//!
//! # Invariants
//! - Every managed record is identified by a stable `ItemId`.
//! - Entities carry no back-reference to the context that owns them.

pub mod item;
