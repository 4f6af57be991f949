//! Fetch coordinator: cancellable, deduplicated page requests
//!
//! Every request runs under an [`AbortHandle`]. There is at most one
//! outstanding request per [`FetchReason`]; issuing another for the same
//! reason aborts the first. [`FetchCoordinator::cancel_all`] aborts everything
//! and advances an epoch so that a response which slips through anyway is
//! still recognised as stale.
//!
//! Aborted and stale responses come back as [`FetchOutcome::Superseded`] and
//! never as errors.

use crate::core::error::{CacheError, CacheResult};
use crate::core::query::{Page, PageRequest};
use crate::core::source::RecordSource;
use futures::future::{AbortHandle, Abortable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Why a page is being fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchReason {
    /// First page after mount, reset or a criteria change
    Initial,
    /// Proactive fetch triggered by scroll proximity
    LookAhead,
    /// Explicit page change that needs data not loaded yet
    PageJump,
}

impl fmt::Display for FetchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FetchReason::Initial => "initial",
            FetchReason::LookAhead => "look_ahead",
            FetchReason::PageJump => "page_jump",
        })
    }
}

/// Result of a coordinated fetch
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The response is current and may be merged
    Fresh(Page),
    /// The request was aborted or its parameters were superseded
    Superseded,
}

struct InFlight {
    ticket: u64,
    page: usize,
    handle: AbortHandle,
}

#[derive(Default)]
struct Slots {
    epoch: u64,
    next_ticket: u64,
    in_flight: HashMap<FetchReason, InFlight>,
}

/// Issues page requests against a [`RecordSource`]
pub struct FetchCoordinator {
    source: Arc<dyn RecordSource>,
    slots: Mutex<Slots>,
}

impl FetchCoordinator {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self {
            source,
            slots: Mutex::new(Slots::default()),
        }
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch one page, superseding any outstanding request for `reason`
    pub async fn request(&self, reason: FetchReason, request: PageRequest) -> CacheResult<FetchOutcome> {
        request.validate()?;

        let (handle, registration) = AbortHandle::new_pair();
        let (ticket, epoch) = {
            let mut slots = self.slots();
            let ticket = slots.next_ticket;
            slots.next_ticket += 1;

            let previous = slots.in_flight.insert(
                reason,
                InFlight {
                    ticket,
                    page: request.page,
                    handle,
                },
            );
            if let Some(previous) = previous {
                previous.handle.abort();
                tracing::debug!(
                    %reason,
                    page = previous.page,
                    "superseded outstanding request"
                );
            }
            (ticket, slots.epoch)
        };

        tracing::debug!(%reason, page = request.page, size = request.size, "fetching page");
        let result = Abortable::new(self.source.fetch_page(&request), registration).await;

        let current = {
            let mut slots = self.slots();
            let owns_slot = slots
                .in_flight
                .get(&reason)
                .is_some_and(|in_flight| in_flight.ticket == ticket);
            if owns_slot {
                slots.in_flight.remove(&reason);
            }
            owns_slot && slots.epoch == epoch
        };

        match result {
            Err(_aborted) => {
                tracing::debug!(%reason, page = request.page, "request aborted");
                Ok(FetchOutcome::Superseded)
            }
            Ok(Err(CacheError::Aborted)) => Ok(FetchOutcome::Superseded),
            Ok(_) if !current => {
                tracing::debug!(%reason, page = request.page, "discarding stale response");
                Ok(FetchOutcome::Superseded)
            }
            Ok(Err(err)) => {
                tracing::warn!(%reason, page = request.page, error = %err, "page request failed");
                Err(err)
            }
            Ok(Ok(mut page)) => {
                // Tag with the page that was asked for
                page.page = request.page;
                Ok(FetchOutcome::Fresh(page))
            }
        }
    }

    /// Abort every outstanding request and invalidate their responses
    pub fn cancel_all(&self) {
        let mut slots = self.slots();
        slots.epoch += 1;
        for (reason, in_flight) in slots.in_flight.drain() {
            tracing::debug!(%reason, page = in_flight.page, "cancelling request");
            in_flight.handle.abort();
        }
    }
}
