//! Managed persistence context for items.
//!
//! # Responsibility
//! - Assign identity to new items and track staged inserts/updates/deletes.
//! - Present a merged view (store + staged changes) to readers.
//! - Flush staged changes to the repository atomically on `save`.
//!
//! # Invariants
//! - The repository is never written outside `save`.
//! - Staged state is cleared only after a successful flush; a failed save
//!   leaves it intact for retry or `rollback`.
//! - An id is staged at most once; deleting a staged insert drops it.

use crate::model::item::{Item, ItemId, ItemRecord};
use crate::repo::item_repo::{ItemChange, ItemListQuery, ItemRepository, RepoError, RepoResult};
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use std::collections::BTreeMap;
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
enum StagedChange {
    Insert(Item),
    Update(Item),
    Delete,
}

/// Counts of changes flushed by one `save` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl SaveSummary {
    pub fn is_empty(&self) -> bool {
        self.inserted == 0 && self.updated == 0 && self.deleted == 0
    }
}

/// Unit of work over an `ItemRepository`.
pub struct ModelContext<R: ItemRepository> {
    repo: R,
    staged: BTreeMap<ItemId, StagedChange>,
}

impl<R: ItemRepository> ModelContext<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            staged: BTreeMap::new(),
        }
    }

    /// Read-only access to the backing repository (bypasses staged state).
    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Registers a new item and returns the identity assigned to it.
    ///
    /// The item is visible to `get`/`fetch` immediately and reaches the
    /// store on the next `save`.
    pub fn add(&mut self, item: Item) -> ItemId {
        let id = Uuid::new_v4();
        self.staged.insert(id, StagedChange::Insert(item));
        debug!("event=context_add module=context status=ok item_id={id}");
        id
    }

    /// Returns the item as this context currently sees it.
    pub fn get(&self, id: ItemId) -> RepoResult<Option<Item>> {
        match self.staged.get(&id) {
            Some(StagedChange::Insert(item)) | Some(StagedChange::Update(item)) => {
                Ok(Some(item.clone()))
            }
            Some(StagedChange::Delete) => Ok(None),
            None => self.repo.get_item(id),
        }
    }

    /// Returns a mutable handle and marks the item as changed.
    ///
    /// A stored item becomes a staged update even if the caller ends up
    /// writing the same value back.
    pub fn item_mut(&mut self, id: ItemId) -> RepoResult<Option<&mut Item>> {
        if !self.staged.contains_key(&id) {
            match self.repo.get_item(id)? {
                Some(item) => {
                    self.staged.insert(id, StagedChange::Update(item));
                }
                None => return Ok(None),
            }
        }

        match self.staged.get_mut(&id) {
            Some(StagedChange::Insert(item)) | Some(StagedChange::Update(item)) => Ok(Some(item)),
            Some(StagedChange::Delete) | None => Ok(None),
        }
    }

    /// Stages a new timestamp for an existing item.
    pub fn set_timestamp(&mut self, id: ItemId, value: DateTime<Utc>) -> RepoResult<()> {
        let item = self.item_mut(id)?.ok_or(RepoError::NotFound(id))?;
        item.set_timestamp(value);
        Ok(())
    }

    /// Fetches items matching `query`, with staged changes applied.
    pub fn fetch(&self, query: &ItemListQuery) -> RepoResult<Vec<ItemRecord>> {
        if self.staged.is_empty() {
            return self.repo.list_items(query);
        }

        let mut records: Vec<ItemRecord> = self
            .repo
            .list_items(&query.unpaged())?
            .into_iter()
            .filter(|record| !self.staged.contains_key(&record.id))
            .collect();

        for (id, change) in &self.staged {
            match change {
                StagedChange::Insert(item) | StagedChange::Update(item) => {
                    if query.matches(item) {
                        records.push(ItemRecord::new(*id, item.clone()));
                    }
                }
                StagedChange::Delete => {}
            }
        }

        records.sort_by(|left, right| query.compare(left, right));
        Ok(query.paginate(records))
    }

    /// Counts items matching `query`'s range, with staged changes applied.
    pub fn fetch_count(&self, query: &ItemListQuery) -> RepoResult<u64> {
        if self.staged.is_empty() {
            return self.repo.count_items(query);
        }

        let count = self.fetch(&query.unpaged())?.len();
        u64::try_from(count).map_err(|_| RepoError::InvalidData(format!("count overflow `{count}`")))
    }

    /// Removes an item from the context.
    ///
    /// # Errors
    /// - `NotFound` when the item is neither staged nor stored, or was
    ///   already deleted in this context.
    pub fn delete(&mut self, id: ItemId) -> RepoResult<()> {
        match self.staged.get(&id).cloned() {
            Some(StagedChange::Insert(_)) => {
                self.staged.remove(&id);
            }
            Some(StagedChange::Update(_)) => {
                self.staged.insert(id, StagedChange::Delete);
            }
            Some(StagedChange::Delete) => return Err(RepoError::NotFound(id)),
            None => {
                if self.repo.get_item(id)?.is_none() {
                    return Err(RepoError::NotFound(id));
                }
                self.staged.insert(id, StagedChange::Delete);
            }
        }

        debug!("event=context_delete module=context status=ok item_id={id}");
        Ok(())
    }

    /// Returns whether there are staged changes not yet saved.
    pub fn has_changes(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Discards all staged changes.
    pub fn rollback(&mut self) {
        let discarded = self.staged.len();
        self.staged.clear();
        debug!("event=context_rollback module=context status=ok discarded={discarded}");
    }

    /// Flushes staged changes to the repository in one atomic batch.
    pub fn save(&mut self) -> RepoResult<SaveSummary> {
        if self.staged.is_empty() {
            return Ok(SaveSummary::default());
        }

        let started_at = Instant::now();
        let mut summary = SaveSummary::default();
        let changes: Vec<ItemChange<'_>> = self
            .staged
            .iter()
            .map(|(id, change)| match change {
                StagedChange::Insert(item) => {
                    summary.inserted += 1;
                    ItemChange::Insert(*id, item)
                }
                StagedChange::Update(item) => {
                    summary.updated += 1;
                    ItemChange::Update(*id, item)
                }
                StagedChange::Delete => {
                    summary.deleted += 1;
                    ItemChange::Delete(*id)
                }
            })
            .collect();

        if let Err(err) = self.repo.apply_changes(&changes) {
            error!(
                "event=context_save module=context status=error duration_ms={} staged={} error={err}",
                started_at.elapsed().as_millis(),
                changes.len()
            );
            return Err(err);
        }
        self.staged.clear();

        info!(
            "event=context_save module=context status=ok duration_ms={} inserted={} updated={} deleted={}",
            started_at.elapsed().as_millis(),
            summary.inserted,
            summary.updated,
            summary.deleted
        );
        Ok(summary)
    }
}
