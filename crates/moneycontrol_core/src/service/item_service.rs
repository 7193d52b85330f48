//! Item use-case service.
//!
//! # Responsibility
//! - Provide the list-screen use cases (add now, list, retime, delete).
//! - Commit each use case through one `ModelContext::save`.
//!
//! # Invariants
//! - Every mutating call either saves fully or leaves the context with no
//!   staged changes.
//! - Service layer remains storage-agnostic.

use crate::context::model_context::{ModelContext, SaveSummary};
use crate::model::item::{Item, ItemId, ItemRecord};
use crate::repo::item_repo::{ItemListQuery, ItemRepository, RepoError, SortOrder};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ItemServiceResult<T> = Result<T, ItemServiceError>;

/// Errors from item service operations.
#[derive(Debug)]
pub enum ItemServiceError {
    /// Positional delete referenced a row past the end of the list.
    OffsetOutOfRange { offset: usize, len: usize },
    /// Repository or context failure.
    Repo(RepoError),
}

impl Display for ItemServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OffsetOutOfRange { offset, len } => {
                write!(f, "offset {offset} is out of range for {len} items")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ItemServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::OffsetOutOfRange { .. } => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for ItemServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Use-case service wrapping a managed item context.
pub struct ItemService<R: ItemRepository> {
    context: ModelContext<R>,
}

impl<R: ItemRepository> ItemService<R> {
    /// Creates a service with a fresh context over `repo`.
    pub fn new(repo: R) -> Self {
        Self {
            context: ModelContext::new(repo),
        }
    }

    pub fn context(&self) -> &ModelContext<R> {
        &self.context
    }

    /// Adds an item stamped with the current time.
    pub fn add_item_now(&mut self) -> ItemServiceResult<ItemId> {
        self.add_item_at(Utc::now())
    }

    /// Adds an item stamped with `timestamp`.
    pub fn add_item_at(&mut self, timestamp: DateTime<Utc>) -> ItemServiceResult<ItemId> {
        let id = self.context.add(Item::new(timestamp));
        self.commit()?;
        Ok(id)
    }

    pub fn get_item(&self, id: ItemId) -> ItemServiceResult<Option<Item>> {
        Ok(self.context.get(id)?)
    }

    /// Lists every item in timestamp order.
    pub fn list_items(&self, order: SortOrder) -> ItemServiceResult<Vec<ItemRecord>> {
        self.query_items(&ItemListQuery {
            order,
            ..ItemListQuery::default()
        })
    }

    pub fn query_items(&self, query: &ItemListQuery) -> ItemServiceResult<Vec<ItemRecord>> {
        Ok(self.context.fetch(query)?)
    }

    pub fn count_items(&self, query: &ItemListQuery) -> ItemServiceResult<u64> {
        Ok(self.context.fetch_count(query)?)
    }

    /// Replaces the timestamp of an existing item.
    pub fn retime_item(&mut self, id: ItemId, timestamp: DateTime<Utc>) -> ItemServiceResult<()> {
        if let Err(err) = self.context.set_timestamp(id, timestamp) {
            self.context.rollback();
            return Err(err.into());
        }
        self.commit()?;
        Ok(())
    }

    /// Deletes all `ids` in one save. Nothing is deleted if any id is unknown.
    pub fn delete_items(&mut self, ids: &[ItemId]) -> ItemServiceResult<SaveSummary> {
        for id in ids {
            if let Err(err) = self.context.delete(*id) {
                self.context.rollback();
                return Err(err.into());
            }
        }
        self.commit()
    }

    /// Deletes items by their position in the list ordered by `order`.
    ///
    /// Duplicate offsets are collapsed. Every offset is checked before
    /// anything is staged.
    pub fn delete_at_offsets(
        &mut self,
        order: SortOrder,
        offsets: &[usize],
    ) -> ItemServiceResult<SaveSummary> {
        let records = self.list_items(order)?;
        let offsets: BTreeSet<usize> = offsets.iter().copied().collect();
        if let Some(&offset) = offsets.iter().find(|offset| **offset >= records.len()) {
            return Err(ItemServiceError::OffsetOutOfRange {
                offset,
                len: records.len(),
            });
        }

        let ids: Vec<ItemId> = offsets.into_iter().map(|offset| records[offset].id).collect();
        self.delete_items(&ids)
    }

    fn commit(&mut self) -> ItemServiceResult<SaveSummary> {
        match self.context.save() {
            Ok(summary) => Ok(summary),
            Err(err) => {
                self.context.rollback();
                Err(err.into())
            }
        }
    }
}
