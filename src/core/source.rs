//! Record source trait

use crate::core::error::CacheResult;
use crate::core::query::{Page, PageRequest};
use crate::core::user::{User, UserPatch};
use async_trait::async_trait;

/// What a source does with the filter and sort of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceCapabilities {
    /// The source filters and sorts before paging, and `total_count`
    /// reflects the filter. When false, the cache applies filter and sort to
    /// what it has loaded.
    pub server_side_query: bool,
}

/// A paged supply of user records
///
/// Implementations are stateless per call: every request carries its own
/// page, size, filters and sort. Cancellation is delivered by dropping the
/// returned future, so implementations must not leave shared state half
/// updated across an `.await`.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch one page
    async fn fetch_page(&self, request: &PageRequest) -> CacheResult<Page>;

    /// Apply a partial update and return the stored record
    async fn update_user(&self, id: u64, patch: &UserPatch) -> CacheResult<User>;

    /// How the source treats filters and sort
    fn capabilities(&self) -> SourceCapabilities;
}
