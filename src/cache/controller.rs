//! Pagination controller: the cache's explicit context object
//!
//! A [`PaginationController`] owns the collection store, the memoized view,
//! the fetch coordinator and the load state machine. It is cheap to clone;
//! clones share the same state, so a UI hands one clone to each widget.
//!
//! ```text
//!   Idle ──load_initial/reset──▶ LoadingInitial ──ok──▶ Ready ◀──ok── LoadingMore
//!                                     │                  │  └─page not covered──▲
//!                                     └──err──▶ Error ◀──┴─────────err───────────┘
//!                                                 │
//!                                               retry
//! ```
//!
//! Pagination runs over the view: when a page of the filtered and sorted
//! view is not covered yet, the controller fetches the next raw source page
//! (never one already loaded) until the view covers the window or the source
//! is exhausted.
//!
//! All shared state sits behind one `std::sync::Mutex` that is never held
//! across an `.await`. A generation counter, bumped whenever what is loaded
//! stops matching what was asked for, lets a completing fetch tell whether
//! its result still applies.

use crate::cache::coordinator::{FetchCoordinator, FetchOutcome, FetchReason};
use crate::cache::edit::EditMerger;
use crate::cache::events::{CacheEvent, CacheEvents};
use crate::cache::collection::CollectionStore;
use crate::cache::view::{View, ViewCache};
use crate::config::CacheSettings;
use crate::core::error::{CacheError, CacheResult};
use crate::core::filter::FilterCriteria;
use crate::core::query::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PageRequest, PaginationMeta};
use crate::core::sort::SortConfig;
use crate::core::source::RecordSource;
use crate::core::user::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Rows from the end of the view at which a look-ahead fetch starts
pub const DEFAULT_LOOK_AHEAD_THRESHOLD: usize = 5;

/// Load state of the controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    #[default]
    Idle,
    LoadingInitial,
    LoadingMore,
    Ready,
    Error,
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::LoadingInitial | LoadState::LoadingMore)
    }
}

/// One page of the view, ready to render
#[derive(Debug, Clone, PartialEq)]
pub struct PageSlice {
    /// Page index (starts at 0)
    pub page: usize,
    /// Rows of the page; fewer than the page size while data is missing
    pub rows: Vec<User>,
    pub meta: PaginationMeta,
    /// False while more rows for this page may still arrive
    pub complete: bool,
}

/// What a look-ahead notification did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookAhead {
    /// The visible range is not near the end of the view
    NotNeeded,
    /// Everything is loaded already
    Exhausted,
    /// A fetch is already running
    AlreadyLoading,
    /// The next page was fetched and merged
    Fetched { added: usize },
    /// The fetch was overtaken by a criteria change
    Superseded,
}

/// A failed fetch, kept so that `retry` can re-issue it verbatim
#[derive(Debug, Clone)]
struct FailedFetch {
    reason: FetchReason,
    request: PageRequest,
}

enum Step {
    Merged { added: usize },
    Superseded,
}

enum PagePlan {
    Ready(PageSlice),
    Initial(PageRequest, u64),
    Wait,
    Fetch(PageRequest),
}

struct Inner {
    state: LoadState,
    store: CollectionStore,
    view: ViewCache,
    filters: FilterCriteria,
    sort: Option<SortConfig>,
    page_size: usize,
    current_page: usize,
    generation: u64,
    pending_pages: HashSet<usize>,
    last_error: Option<CacheError>,
    failed: Option<FailedFetch>,
    selected: Option<User>,
    last_updated: Option<DateTime<Utc>>,
}

impl Inner {
    fn transition(&mut self, to: LoadState, events: &CacheEvents) {
        if self.state == to {
            return;
        }
        let from = self.state;
        self.state = to;
        tracing::debug!(?from, ?to, "load state changed");
        events.publish(CacheEvent::StateChanged { from, to });
    }

    fn view(&mut self) -> View {
        self.view.get(&self.store, &self.filters, self.sort.as_ref())
    }

    fn request_for(&self, page: usize, server_side_query: bool) -> PageRequest {
        let request = PageRequest::new(page, self.page_size);
        if server_side_query {
            request
                .with_filters(self.filters.clone())
                .with_sort(self.sort)
        } else {
            // Raw pages; filter and sort happen in the view
            request
        }
    }

    fn meta(&mut self, server_side_query: bool) -> PaginationMeta {
        let has_more = self.store.has_more();
        let total_count = if server_side_query || self.filters.is_empty() || has_more {
            self.store.total_count()
        } else {
            // Fully loaded and filtered locally: the view is the whole answer
            self.view().len()
        };
        PaginationMeta::new(self.current_page, self.page_size, total_count, has_more)
    }

    fn page_slice(&mut self, page: usize, server_side_query: bool) -> PageSlice {
        let view = self.view();
        let rows = view.slice(page.saturating_mul(self.page_size), self.page_size);
        let complete = rows.len() == self.page_size || !self.store.has_more();
        PageSlice {
            page,
            rows,
            meta: self.meta(server_side_query),
            complete,
        }
    }
}

pub(crate) struct Shared {
    pub(crate) source: Arc<dyn RecordSource>,
    coordinator: FetchCoordinator,
    inner: Mutex<Inner>,
    pub(crate) events: CacheEvents,
    pub(crate) saving: Mutex<HashSet<u64>>,
    settled: watch::Sender<u64>,
    look_ahead_threshold: usize,
    server_side_query: bool,
}

/// Builder for [`PaginationController`]
///
/// # Example
///
/// ```rust,ignore
/// let controller = PaginationController::builder(Arc::new(source))
///     .page_size(50)
///     .sort(Some(SortConfig::asc(UserField::Name)))
///     .build()?;
/// ```
pub struct ControllerBuilder {
    source: Arc<dyn RecordSource>,
    page_size: usize,
    look_ahead_threshold: usize,
    filters: FilterCriteria,
    sort: Option<SortConfig>,
    events: Option<CacheEvents>,
}

impl ControllerBuilder {
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn look_ahead_threshold(mut self, rows: usize) -> Self {
        self.look_ahead_threshold = rows;
        self
    }

    pub fn filters(mut self, filters: FilterCriteria) -> Self {
        self.filters = filters;
        self
    }

    pub fn sort(mut self, sort: Option<SortConfig>) -> Self {
        self.sort = sort;
        self
    }

    /// Publish to an existing event bus instead of a private one
    pub fn events(mut self, events: CacheEvents) -> Self {
        self.events = Some(events);
        self
    }

    /// Apply the `cache` section of the configuration
    pub fn settings(self, settings: &CacheSettings) -> Self {
        self.page_size(settings.page_size)
            .look_ahead_threshold(settings.look_ahead_threshold)
            .sort(settings.default_sort)
    }

    pub fn build(self) -> CacheResult<PaginationController> {
        check_page_size(self.page_size)?;

        let server_side_query = self.source.capabilities().server_side_query;
        let (settled, _) = watch::channel(0);
        let inner = Inner {
            state: LoadState::Idle,
            store: CollectionStore::new(),
            view: ViewCache::new(),
            filters: self.filters,
            sort: self.sort,
            page_size: self.page_size,
            current_page: 0,
            generation: 0,
            pending_pages: HashSet::new(),
            last_error: None,
            failed: None,
            selected: None,
            last_updated: None,
        };

        Ok(PaginationController {
            shared: Arc::new(Shared {
                coordinator: FetchCoordinator::new(Arc::clone(&self.source)),
                source: self.source,
                inner: Mutex::new(inner),
                events: self.events.unwrap_or_default(),
                saving: Mutex::new(HashSet::new()),
                settled,
                look_ahead_threshold: self.look_ahead_threshold,
                server_side_query,
            }),
        })
    }
}

fn check_page_size(page_size: usize) -> CacheResult<()> {
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(CacheError::validation(format!(
            "page size must be between 1 and {}, got {}",
            MAX_PAGE_SIZE, page_size
        )));
    }
    Ok(())
}

/// The paginated, filtered, sorted user cache
#[derive(Clone)]
pub struct PaginationController {
    shared: Arc<Shared>,
}

impl PaginationController {
    pub fn builder(source: Arc<dyn RecordSource>) -> ControllerBuilder {
        ControllerBuilder {
            source,
            page_size: DEFAULT_PAGE_SIZE,
            look_ahead_threshold: DEFAULT_LOOK_AHEAD_THRESHOLD,
            filters: FilterCriteria::default(),
            sort: None,
            events: None,
        }
    }

    /// Controller with default settings
    pub fn new(source: Arc<dyn RecordSource>) -> CacheResult<Self> {
        Self::builder(source).build()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.shared.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn server_side_query(&self) -> bool {
        self.shared.server_side_query
    }

    /// Wake everything waiting on a fetch to finish
    fn settle(&self) {
        self.shared.settled.send_modify(|count| *count += 1);
    }

    // =========================================================================
    // Read access
    // =========================================================================

    pub fn state(&self) -> LoadState {
        self.inner().state
    }

    /// The error that moved the controller to [`LoadState::Error`]
    pub fn last_error(&self) -> Option<CacheError> {
        self.inner().last_error.clone()
    }

    pub fn current_page(&self) -> usize {
        self.inner().current_page
    }

    pub fn page_size(&self) -> usize {
        self.inner().page_size
    }

    pub fn filters(&self) -> FilterCriteria {
        self.inner().filters.clone()
    }

    pub fn sort(&self) -> Option<SortConfig> {
        self.inner().sort
    }

    pub fn is_initialized(&self) -> bool {
        self.inner().store.is_initialized()
    }

    pub fn loaded_len(&self) -> usize {
        self.inner().store.len()
    }

    pub fn has_more(&self) -> bool {
        self.inner().store.has_more()
    }

    pub fn meta(&self) -> PaginationMeta {
        let server_side_query = self.server_side_query();
        self.inner().meta(server_side_query)
    }

    /// The current filtered and sorted view, memoized
    pub fn view(&self) -> View {
        self.inner().view()
    }

    /// Every loaded record in arrival order
    pub fn loaded(&self) -> Vec<User> {
        self.inner().store.records().cloned().collect()
    }

    /// The slice of the current page that is available right now
    pub fn visible_slice(&self) -> PageSlice {
        let server_side_query = self.server_side_query();
        let mut inner = self.inner();
        let page = inner.current_page;
        inner.page_slice(page, server_side_query)
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.inner().last_updated
    }

    pub fn events(&self) -> &CacheEvents {
        &self.shared.events
    }

    /// Editor for this cache; edits land in the same store
    pub fn editor(&self) -> EditMerger {
        EditMerger::new(self.clone())
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Select a loaded record for editing
    pub fn select(&self, id: u64) -> Option<User> {
        let mut inner = self.inner();
        inner.selected = inner.store.get(id).cloned();
        inner.selected.clone()
    }

    pub fn selected(&self) -> Option<User> {
        self.inner().selected.clone()
    }

    pub fn clear_selection(&self) {
        self.inner().selected = None;
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Load page 0 under the current criteria, replacing the store
    ///
    /// Fetches still running for later pages are cancelled: they belong to
    /// the contents page 0 replaces.
    pub async fn load_initial(&self) -> CacheResult<()> {
        let mut settled = self.shared.settled.subscribe();
        let begun = {
            let mut inner = self.inner();
            if inner.pending_pages.contains(&0) {
                Err(inner.generation)
            } else {
                Ok(self.begin_initial(&mut inner))
            }
        };

        match begun {
            Ok((request, generation)) => self
                .run_fetch(FetchReason::Initial, request, generation)
                .await
                .map(|_| ()),
            Err(generation) => {
                // Someone else is loading page 0; wait until it lands
                while settled.changed().await.is_ok() {
                    let inner = self.inner();
                    if inner.generation != generation {
                        break;
                    }
                    if inner.pending_pages.contains(&0) {
                        continue;
                    }
                    if let (LoadState::Error, Some(err)) = (inner.state, &inner.last_error) {
                        return Err(err.clone());
                    }
                    break;
                }
                Ok(())
            }
        }
    }

    /// Start a generation whose first fetch is page 0
    fn begin_initial(&self, inner: &mut Inner) -> (PageRequest, u64) {
        inner.generation += 1;
        self.shared.coordinator.cancel_all();
        inner.pending_pages.clear();
        inner.pending_pages.insert(0);
        inner.current_page = 0;
        inner.transition(LoadState::LoadingInitial, &self.shared.events);
        (
            inner.request_for(0, self.server_side_query()),
            inner.generation,
        )
    }

    /// Move to `page` of the view, fetching raw pages until it is covered
    ///
    /// Returns [`CacheError::Aborted`] if the criteria change while the page
    /// is loading; callers drop it via [`CacheError::is_user_visible`].
    pub async fn go_to_page(&self, page: usize) -> CacheResult<PageSlice> {
        let mut generation = self.inner().generation;
        loop {
            let mut settled = self.shared.settled.subscribe();
            let plan = {
                let mut inner = self.inner();
                if inner.generation != generation {
                    return Err(CacheError::Aborted);
                }
                self.plan_page(&mut inner, page)?
            };

            match plan {
                PagePlan::Ready(slice) => return Ok(slice),
                PagePlan::Initial(request, started) => {
                    generation = started;
                    self.run_fetch(FetchReason::Initial, request, started)
                        .await?;
                }
                PagePlan::Wait => {
                    let _ = settled.changed().await;
                }
                PagePlan::Fetch(request) => {
                    self.run_fetch(FetchReason::PageJump, request, generation)
                        .await?;
                }
            }
        }
    }

    fn plan_page(&self, inner: &mut Inner, page: usize) -> CacheResult<PagePlan> {
        if inner.state == LoadState::Error {
            return Err(inner
                .last_error
                .clone()
                .unwrap_or_else(|| CacheError::Internal("error state without error".into())));
        }

        if !inner.store.is_initialized() {
            if inner.pending_pages.contains(&0) {
                return Ok(PagePlan::Wait);
            }
            let (request, generation) = self.begin_initial(inner);
            return Ok(PagePlan::Initial(request, generation));
        }

        let view_len = inner.view().len();
        let start = page.saturating_mul(inner.page_size);
        let end = start.saturating_add(inner.page_size);

        if view_len >= end || !inner.store.has_more() {
            if page > 0 && start >= view_len {
                return Err(CacheError::validation(format!(
                    "page {} is out of range ({} rows)",
                    page, view_len
                )));
            }
            inner.current_page = page;
            if inner.pending_pages.is_empty() {
                inner.transition(LoadState::Ready, &self.shared.events);
            }
            return Ok(PagePlan::Ready(
                inner.page_slice(page, self.server_side_query()),
            ));
        }

        let next = inner.store.next_page();
        if inner.pending_pages.contains(&next) {
            return Ok(PagePlan::Wait);
        }
        inner.pending_pages.insert(next);
        inner.transition(LoadState::LoadingMore, &self.shared.events);
        Ok(PagePlan::Fetch(inner.request_for(next, self.server_side_query())))
    }

    pub async fn next_page(&self) -> CacheResult<PageSlice> {
        let page = self.current_page();
        self.go_to_page(page + 1).await
    }

    pub async fn prev_page(&self) -> CacheResult<PageSlice> {
        let page = self.current_page();
        self.go_to_page(page.saturating_sub(1)).await
    }

    /// Tell the cache which view rows the list is showing
    ///
    /// When `visible_end` is within the look-ahead threshold of the end of
    /// the view, the next source page is fetched. UIs typically spawn this.
    pub async fn on_range_rendered(&self, visible_end: usize) -> CacheResult<LookAhead> {
        let (request, generation) = {
            let mut inner = self.inner();
            match inner.state {
                LoadState::Ready => {}
                LoadState::LoadingInitial | LoadState::LoadingMore => {
                    return Ok(LookAhead::AlreadyLoading);
                }
                LoadState::Idle | LoadState::Error => return Ok(LookAhead::NotNeeded),
            }

            let view_len = inner.view().len();
            if visible_end.saturating_add(self.shared.look_ahead_threshold) < view_len {
                return Ok(LookAhead::NotNeeded);
            }
            if !inner.store.has_more() {
                return Ok(LookAhead::Exhausted);
            }

            let next = inner.store.next_page();
            if inner.pending_pages.contains(&next) {
                return Ok(LookAhead::AlreadyLoading);
            }
            inner.pending_pages.insert(next);
            inner.transition(LoadState::LoadingMore, &self.shared.events);
            (
                inner.request_for(next, self.server_side_query()),
                inner.generation,
            )
        };

        tracing::debug!(visible_end, page = request.page, "look-ahead fetch");
        match self
            .run_fetch(FetchReason::LookAhead, request, generation)
            .await?
        {
            Step::Merged { added } => Ok(LookAhead::Fetched { added }),
            Step::Superseded => Ok(LookAhead::Superseded),
        }
    }

    /// Run one coordinated fetch and fold its outcome into the state
    async fn run_fetch(
        &self,
        reason: FetchReason,
        request: PageRequest,
        generation: u64,
    ) -> CacheResult<Step> {
        let outcome = self
            .shared
            .coordinator
            .request(reason, request.clone())
            .await;

        let step = {
            let mut inner = self.inner();
            if inner.generation != generation {
                // The bump already cleared pending pages and moved the state
                Ok(Step::Superseded)
            } else {
                inner.pending_pages.remove(&request.page);
                match outcome {
                    Ok(FetchOutcome::Fresh(page)) => {
                        let received = page.records.len();
                        let added = inner.store.merge(page.records, page.page);
                        inner.store.set_total(page.total_count);
                        if received == 0 && inner.store.has_more() {
                            // Source ran dry before its reported total
                            let loaded = inner.store.len();
                            inner.store.set_total(loaded);
                        }

                        inner.last_error = None;
                        inner.failed = None;
                        inner.last_updated = Some(Utc::now());
                        if inner.pending_pages.is_empty() {
                            inner.transition(LoadState::Ready, &self.shared.events);
                        }

                        let loaded = inner.store.len();
                        let total_count = inner.store.total_count();
                        tracing::debug!(%reason, page = page.page, added, loaded, total_count, "page merged");
                        self.shared.events.publish(CacheEvent::PageMerged {
                            page: page.page,
                            added,
                            loaded,
                            total_count,
                        });
                        Ok(Step::Merged { added })
                    }
                    Ok(FetchOutcome::Superseded) => Ok(Step::Superseded),
                    Err(err) => {
                        tracing::warn!(%reason, page = request.page, error = %err, "fetch failed");
                        inner.last_error = Some(err.clone());
                        inner.failed = Some(FailedFetch { reason, request });
                        inner.transition(LoadState::Error, &self.shared.events);
                        Err(err)
                    }
                }
            }
        };

        self.settle();
        step
    }

    /// Re-issue the request that moved the controller to `Error`
    pub async fn retry(&self) -> CacheResult<()> {
        let retried = {
            let mut inner = self.inner();
            if inner.state != LoadState::Error {
                return Ok(());
            }
            inner.last_error = None;
            match inner.failed.take() {
                Some(failed) => {
                    let to = if failed.request.page == 0 {
                        LoadState::LoadingInitial
                    } else {
                        LoadState::LoadingMore
                    };
                    inner.transition(to, &self.shared.events);
                    inner.pending_pages.insert(failed.request.page);
                    Some((failed.reason, failed.request, inner.generation))
                }
                None => {
                    inner.transition(LoadState::Idle, &self.shared.events);
                    None
                }
            }
        };

        let Some((reason, request, generation)) = retried else {
            return self.load_initial().await;
        };

        tracing::info!(%reason, page = request.page, "retrying failed fetch");
        self.run_fetch(reason, request, generation).await.map(|_| ())
    }

    // =========================================================================
    // Criteria changes
    // =========================================================================

    /// Cancel outstanding fetches and start a new generation
    ///
    /// Returns true when the store was cleared and page 0 must be reloaded.
    fn invalidate(&self, inner: &mut Inner, reason: &str, clear_store: bool) -> bool {
        inner.generation += 1;
        self.shared.coordinator.cancel_all();
        inner.pending_pages.clear();
        inner.current_page = 0;
        inner.view.invalidate();

        tracing::info!(reason, clear_store, "view invalidated");
        self.shared.events.publish(CacheEvent::ViewInvalidated {
            reason: reason.to_string(),
        });

        if clear_store {
            inner.store.reset();
            inner.last_error = None;
            inner.failed = None;
            inner.transition(LoadState::Idle, &self.shared.events);
        } else if inner.state.is_loading() {
            // Whatever was loading is cancelled; loaded rows stay usable
            let to = if inner.store.is_initialized() {
                LoadState::Ready
            } else {
                LoadState::Idle
            };
            inner.transition(to, &self.shared.events);
        }
        clear_store
    }

    /// Replace the filter criteria
    ///
    /// A source that filters server side is reloaded from page 0; otherwise
    /// the view is re-derived from what is loaded and topped up if needed.
    pub async fn set_filter(&self, criteria: FilterCriteria) -> CacheResult<()> {
        let (reload, errored) = {
            let mut inner = self.inner();
            if inner.filters == criteria {
                return Ok(());
            }
            inner.filters = criteria;
            let reload = self.invalidate(&mut inner, "filter changed", self.server_side_query());
            (reload, inner.state == LoadState::Error)
        };
        self.settle();
        self.refill(reload, errored).await
    }

    /// Replace the sort configuration
    pub async fn set_sort(&self, sort: Option<SortConfig>) -> CacheResult<()> {
        let (reload, errored) = {
            let mut inner = self.inner();
            if inner.sort == sort {
                return Ok(());
            }
            inner.sort = sort;
            let reload = self.invalidate(&mut inner, "sort changed", self.server_side_query());
            (reload, inner.state == LoadState::Error)
        };
        self.settle();
        self.refill(reload, errored).await
    }

    /// Change the page size; source pages are re-fetched at the new size
    pub async fn set_page_size(&self, page_size: usize) -> CacheResult<()> {
        check_page_size(page_size)?;
        {
            let mut inner = self.inner();
            if inner.page_size == page_size {
                return Ok(());
            }
            inner.page_size = page_size;
            self.invalidate(&mut inner, "page size changed", true);
        }
        self.settle();
        self.load_initial().await
    }

    async fn refill(&self, reload: bool, errored: bool) -> CacheResult<()> {
        if reload {
            return self.load_initial().await;
        }
        if errored || !self.is_initialized() {
            return Ok(());
        }
        match self.go_to_page(0).await {
            Ok(_) => Ok(()),
            Err(err) if !err.is_user_visible() => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Clear the store and cancel everything; the controller returns to `Idle`
    pub fn reset(&self) {
        {
            let mut inner = self.inner();
            self.invalidate(&mut inner, "reset", true);
            inner.selected = None;
        }
        self.shared.events.publish(CacheEvent::Reset);
        self.settle();
    }

    /// Reset, then load page 0 again
    pub async fn reset_and_reload(&self) -> CacheResult<()> {
        self.reset();
        self.load_initial().await
    }

    // =========================================================================
    // Edits
    // =========================================================================

    /// Write an acknowledged record into the store and selection
    pub(crate) fn apply_acknowledged_edit(&self, user: &User) -> bool {
        let applied = {
            let mut inner = self.inner();
            let applied = inner.store.apply_edit(user.clone());
            if inner.selected.as_ref().is_some_and(|s| s.id == user.id) {
                inner.selected = Some(user.clone());
            }
            inner.last_updated = Some(Utc::now());
            applied
        };
        self.shared
            .events
            .publish(CacheEvent::UserUpdated { user: user.clone() });
        applied
    }
}
