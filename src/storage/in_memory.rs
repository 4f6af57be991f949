//! In-memory implementation of RecordSource for testing and development

use crate::core::error::{CacheError, CacheResult};
use crate::core::query::{Page, PageRequest, PaginatedUsers};
use crate::core::source::{RecordSource, SourceCapabilities};
use crate::core::user::{User, UserPatch};
use crate::storage::generator::{GeneratorTask, generate};
use async_trait::async_trait;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// In-memory user source
///
/// Useful for testing and development, and the backing store of the mock
/// server. Uses RwLock for thread-safe access; clones share the dataset.
#[derive(Clone)]
pub struct InMemoryUserSource {
    users: Arc<RwLock<Vec<User>>>,
    latency: Option<Duration>,
    server_side_query: bool,
}

impl InMemoryUserSource {
    /// Create a source serving `users` in the given order
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users: Arc::new(RwLock::new(users)),
            latency: None,
            server_side_query: true,
        }
    }

    /// Create a source serving the first `count` generated users
    pub fn generated(count: usize) -> Self {
        Self::new(generate(count))
    }

    /// Create a source from a running generator
    pub async fn from_generator(task: GeneratorTask) -> CacheResult<Self> {
        Ok(Self::new(task.collect().await?))
    }

    /// Delay every call, to simulate a network
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Ignore filters and sort, paging the raw dataset like the
    /// `/api/users/paginated` endpoint does
    pub fn pages_only(mut self) -> Self {
        self.server_side_query = false;
        self
    }

    fn read(&self) -> CacheResult<RwLockReadGuard<'_, Vec<User>>> {
        self.users
            .read()
            .map_err(|e| CacheError::Internal(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> CacheResult<RwLockWriteGuard<'_, Vec<User>>> {
        self.users
            .write()
            .map_err(|e| CacheError::Internal(format!("Failed to acquire write lock: {}", e)))
    }

    pub fn len(&self) -> usize {
        self.read().map(|users| users.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: u64) -> CacheResult<Option<User>> {
        Ok(self.read()?.iter().find(|user| user.id == id).cloned())
    }

    /// Filter, sort, then page
    ///
    /// `total_count` is the number of records matching the filters.
    pub fn query(&self, request: &PageRequest) -> CacheResult<Page> {
        request.validate()?;
        let users = self.read()?;

        let compiled = request.filters.compile();
        let mut matching: Vec<&User> = users.iter().filter(|user| compiled.matches(user)).collect();
        if let Some(sort) = &request.sort {
            matching.sort_by(|a, b| sort.compare(a, b));
        }

        let total_count = matching.len();
        let records = matching
            .into_iter()
            .skip(request.offset())
            .take(request.size)
            .cloned()
            .collect();

        Ok(Page {
            page: request.page,
            records,
            total_count,
        })
    }

    /// Page the raw dataset in storage order
    pub fn paginated(&self, page: usize, size: usize) -> CacheResult<PaginatedUsers> {
        let users = self.read()?;
        let start = page.saturating_mul(size).min(users.len());
        let end = start.saturating_add(size).min(users.len());
        Ok(PaginatedUsers {
            data: users[start..end].to_vec(),
            total: users.len(),
            page,
            size,
        })
    }

    /// Apply a patch in place
    pub fn apply_patch(&self, id: u64, patch: &UserPatch) -> CacheResult<User> {
        patch.check()?;
        let mut users = self.write()?;
        let user = users
            .iter_mut()
            .find(|user| user.id == id)
            .ok_or(CacheError::NotFound { id })?;
        patch.apply_to(user);
        Ok(user.clone())
    }

    /// Sleep for the configured latency, if any
    pub async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for InMemoryUserSource {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl RecordSource for InMemoryUserSource {
    async fn fetch_page(&self, request: &PageRequest) -> CacheResult<Page> {
        self.simulate_latency().await;
        if self.server_side_query {
            self.query(request)
        } else {
            request.validate()?;
            let page = self.paginated(request.page, request.size)?;
            Ok(Page {
                page: request.page,
                records: page.data,
                total_count: page.total,
            })
        }
    }

    async fn update_user(&self, id: u64, patch: &UserPatch) -> CacheResult<User> {
        self.simulate_latency().await;
        self.apply_patch(id, patch)
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            server_side_query: self.server_side_query,
        }
    }
}
