//! The client-side user cache
//!
//! ```text
//!                 ┌──────────────────────── PaginationController ───────────────────────┐
//!  go_to_page ───▶│ plan ──▶ FetchCoordinator ──▶ RecordSource                          │
//!  on_range_...   │              │ Fresh(page)                                          │
//!  set_filter ───▶│              ▼                                                      │
//!                 │        CollectionStore ──snapshot──▶ ViewCache ──▶ PageSlice ───────┼──▶ UI
//!  EditMerger ───▶│              ▲ apply_edit                                           │
//!                 └──────────────┴──────────────── CacheEvents ─────────────────────────┘
//! ```

pub mod collection;
pub mod controller;
pub mod coordinator;
pub mod edit;
pub mod events;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

pub use collection::{CollectionStore, Snapshot};
pub use controller::{ControllerBuilder, LoadState, LookAhead, PageSlice, PaginationController};
pub use coordinator::{FetchCoordinator, FetchOutcome, FetchReason};
pub use edit::EditMerger;
pub use events::{CacheEvent, CacheEvents, EventEnvelope};
pub use view::{View, ViewCache, derive_users, filter_users, sort_users};
