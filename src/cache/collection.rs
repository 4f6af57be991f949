//! The collection store: every record loaded so far
//!
//! Records are kept in arrival order, one shared chunk per merged page.
//! [`CollectionStore::snapshot`] hands out the chunk list; appending a page
//! adds a chunk without copying rows, and an edit replaces only the chunk that
//! holds the record, so a snapshot already delivered to a view never changes
//! underneath it.

use crate::core::user::User;
use indexmap::IndexSet;
use std::sync::Arc;

/// An immutable view of the store's records, in arrival order
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    chunks: Arc<Vec<Arc<[User]>>>,
    /// Position of the first row of each chunk
    starts: Arc<Vec<usize>>,
    len: usize,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The record at arrival position `position`
    pub fn get(&self, position: usize) -> Option<&User> {
        let (chunk, offset) = self.locate(position)?;
        self.chunks.get(chunk)?.get(offset)
    }

    pub fn iter(&self) -> impl Iterator<Item = &User> {
        self.chunks.iter().flat_map(|chunk| chunk.iter())
    }

    fn locate(&self, position: usize) -> Option<(usize, usize)> {
        if position >= self.len {
            return None;
        }
        let chunk = self
            .starts
            .partition_point(|start| *start <= position)
            .checked_sub(1)?;
        Some((chunk, position - self.starts.get(chunk)?))
    }

    fn push(&mut self, rows: Vec<User>) {
        if rows.is_empty() {
            return;
        }
        Arc::make_mut(&mut self.starts).push(self.len);
        self.len += rows.len();
        Arc::make_mut(&mut self.chunks).push(rows.into());
    }

    fn replace(&mut self, position: usize, user: User) -> bool {
        let Some((chunk, offset)) = self.locate(position) else {
            return false;
        };
        let Some(slot) = Arc::make_mut(&mut self.chunks).get_mut(chunk) else {
            return false;
        };
        let mut rows = slot.to_vec();
        rows[offset] = user;
        *slot = rows.into();
        true
    }
}

/// In-memory store of loaded users
#[derive(Debug, Clone, Default)]
pub struct CollectionStore {
    records: Snapshot,
    /// Loaded ids; the index of an id is its arrival position
    ids: IndexSet<u64>,
    total_count: usize,
    initialized: bool,
    pages_merged: usize,
    revision: u64,
}

impl CollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one fetched page
    ///
    /// Page 0 replaces the contents; any other page is appended. Records whose
    /// `id` is already present are skipped. Returns how many were added.
    pub fn merge(&mut self, records: Vec<User>, at_page: usize) -> usize {
        if at_page == 0 {
            self.records = Snapshot::default();
            self.ids.clear();
            self.initialized = true;
            self.pages_merged = 1;
        } else {
            self.pages_merged = self.pages_merged.max(at_page + 1);
        }

        let fresh: Vec<User> = records
            .into_iter()
            .filter(|user| self.ids.insert(user.id))
            .collect();
        let added = fresh.len();
        self.records.push(fresh);

        self.revision += 1;
        added
    }

    /// Overwrite the total reported by the source
    pub fn set_total(&mut self, total_count: usize) {
        self.total_count = total_count;
    }

    /// Replace the record with the same `id` in place
    ///
    /// Returns false, leaving the store untouched, when the record is not loaded.
    pub fn apply_edit(&mut self, user: User) -> bool {
        let Some(position) = self.ids.get_index_of(&user.id) else {
            return false;
        };
        if !self.records.replace(position, user) {
            return false;
        }
        self.revision += 1;
        true
    }

    /// Clear back to empty and uninitialized
    pub fn reset(&mut self) {
        self.records = Snapshot::default();
        self.ids.clear();
        self.total_count = 0;
        self.initialized = false;
        self.pages_merged = 0;
        // The revision keeps counting so stale views never match again
        self.revision += 1;
    }

    pub fn snapshot(&self) -> Snapshot {
        self.records.clone()
    }

    pub fn get(&self, id: u64) -> Option<&User> {
        self.records.get(self.ids.get_index_of(&id)?)
    }

    pub fn records(&self) -> impl Iterator<Item = &User> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    /// More records exist at the source than are loaded
    pub fn has_more(&self) -> bool {
        self.len() < self.total_count
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Index of the next source page to fetch
    pub fn next_page(&self) -> usize {
        self.pages_merged
    }

    /// Bumped on every mutation; never repeats
    pub fn revision(&self) -> u64 {
        self.revision
    }
}
