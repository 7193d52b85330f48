//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate context calls into use-case level APIs.
//! - Keep CLI callers decoupled from storage details.

pub mod item_service;
