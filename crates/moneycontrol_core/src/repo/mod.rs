//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define data access contracts the persistence context builds on.
//! - Isolate SQLite query details from context/service orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `DuplicateId`) in
//!   addition to DB transport errors.

pub mod item_repo;
