//! Edit merger: write-through edits of loaded records
//!
//! An edit is validated, sent to the source, and only merged into the
//! collection once the source acknowledges it. The record keeps its position
//! in the collection; sorted or filtered views re-derive on the next read.
//! While an edit for a record is outstanding, a second edit for the same
//! record is refused with [`CacheError::EditInProgress`].

use crate::cache::controller::PaginationController;
use crate::core::error::{CacheError, CacheResult};
use crate::core::user::{User, UserPatch};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Edits records through the controller's source
#[derive(Clone)]
pub struct EditMerger {
    controller: PaginationController,
}

/// Marks a record as saving until dropped
struct SavingGuard<'a> {
    saving: &'a Mutex<HashSet<u64>>,
    id: u64,
}

impl<'a> SavingGuard<'a> {
    fn acquire(saving: &'a Mutex<HashSet<u64>>, id: u64) -> CacheResult<Self> {
        let mut ids = saving.lock().unwrap_or_else(PoisonError::into_inner);
        if !ids.insert(id) {
            return Err(CacheError::EditInProgress { id });
        }
        Ok(Self { saving, id })
    }
}

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        self.saving
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

impl EditMerger {
    pub fn new(controller: PaginationController) -> Self {
        Self { controller }
    }

    /// Apply `patch` to record `id`
    ///
    /// Returns the record as acknowledged by the source. On failure nothing
    /// in the cache changes.
    pub async fn update(&self, id: u64, patch: UserPatch) -> CacheResult<User> {
        patch.check()?;

        let shared = self.controller.shared();
        let _saving = SavingGuard::acquire(&shared.saving, id)?;

        tracing::debug!(id, "saving user edit");
        let user = match shared.source.update_user(id, &patch).await {
            Ok(user) => user,
            Err(err) => {
                tracing::warn!(id, error = %err, "user edit rejected");
                return Err(err);
            }
        };

        if user.id != id {
            return Err(CacheError::Internal(format!(
                "source acknowledged user '{}' for an edit of '{}'",
                user.id, id
            )));
        }

        let merged = self.controller.apply_acknowledged_edit(&user);
        tracing::info!(id, merged, "user edit saved");
        Ok(user)
    }

    /// Save a whole record, e.g. the edited selection
    pub async fn update_user(&self, user: User) -> CacheResult<User> {
        let id = user.id;
        self.update(id, UserPatch::from(user)).await
    }

    /// Save the current selection with `edit` applied to it
    pub async fn update_selected<F>(&self, edit: F) -> CacheResult<User>
    where
        F: FnOnce(&mut User),
    {
        let mut user = self
            .controller
            .selected()
            .ok_or_else(|| CacheError::validation("no user is selected"))?;
        edit(&mut user);
        self.update_user(user).await
    }

    /// Whether an edit of record `id` is outstanding
    pub fn is_saving(&self, id: u64) -> bool {
        self.controller
            .shared()
            .saving
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }
}
