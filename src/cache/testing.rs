//! Scriptable record source for cache tests

use crate::core::error::{CacheError, CacheResult};
use crate::core::query::{Page, PageRequest};
use crate::core::source::{RecordSource, SourceCapabilities};
use crate::core::user::{User, UserPatch};
use crate::storage::InMemoryUserSource;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Semaphore;

/// Wraps an [`InMemoryUserSource`], recording requests and optionally
/// holding each call until a permit is released or failing on demand
pub(crate) struct TestSource {
    data: InMemoryUserSource,
    requests: Mutex<Vec<PageRequest>>,
    updates: Mutex<Vec<u64>>,
    failures: Mutex<VecDeque<CacheError>>,
    gate: Option<Semaphore>,
}

impl TestSource {
    pub(crate) fn new(data: InMemoryUserSource) -> Self {
        Self {
            data,
            requests: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            gate: None,
        }
    }

    /// Every call waits for a permit from [`release`](Self::release)
    pub(crate) fn gated(data: InMemoryUserSource) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new(data)
        }
    }

    pub(crate) fn release(&self, calls: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(calls);
        }
    }

    /// The next call fails with `err`
    pub(crate) fn fail_next(&self, err: CacheError) {
        self.failures.lock().unwrap().push_back(err);
    }

    pub(crate) fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn pages(&self) -> Vec<usize> {
        self.requests().iter().map(|r| r.page).collect()
    }

    pub(crate) fn updates(&self) -> Vec<u64> {
        self.updates.lock().unwrap().clone()
    }

    pub(crate) async fn wait_for_requests(&self, count: usize) {
        while self.requests.lock().unwrap().len() < count {
            tokio::task::yield_now().await;
        }
    }

    pub(crate) async fn wait_for_updates(&self, count: usize) {
        while self.updates.lock().unwrap().len() < count {
            tokio::task::yield_now().await;
        }
    }

    async fn pass_gate(&self) -> CacheResult<()> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        match self.failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RecordSource for TestSource {
    async fn fetch_page(&self, request: &PageRequest) -> CacheResult<Page> {
        self.requests.lock().unwrap().push(request.clone());
        self.pass_gate().await?;
        self.data.fetch_page(request).await
    }

    async fn update_user(&self, id: u64, patch: &UserPatch) -> CacheResult<User> {
        self.updates.lock().unwrap().push(id);
        self.pass_gate().await?;
        self.data.update_user(id, patch).await
    }

    fn capabilities(&self) -> SourceCapabilities {
        self.data.capabilities()
    }
}
