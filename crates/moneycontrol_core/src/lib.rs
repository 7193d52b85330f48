//! Core domain logic for MoneyControl.
//! This crate owns the item record and the persistence context that manages it.

pub mod config;
pub mod context;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::AppConfig;
pub use context::model_context::{ModelContext, SaveSummary};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::item::{Item, ItemId, ItemRecord};
pub use repo::item_repo::{
    ItemChange, ItemListQuery, ItemRepository, RepoError, RepoResult, SortOrder,
    SqliteItemRepository,
};
pub use service::item_service::{ItemService, ItemServiceError, ItemServiceResult};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
