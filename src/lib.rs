//! # Userdeck
//!
//! A paginated, filtered and sorted client-side cache for large user
//! datasets served by a remote API, plus a mock API server to run it against.
//!
//! ## Features
//!
//! - **Incremental loading**: pages are fetched on demand and merged, never re-fetched
//! - **Look-ahead**: the next page is fetched as the visible range nears the end
//! - **Local views**: filter and sort the loaded records, memoized per revision
//! - **Cancellation**: changing criteria aborts outstanding requests
//! - **Write-through edits**: merged into the cache once the source acknowledges them
//! - **Mock server**: axum implementation of the users API over generated data
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use userdeck::prelude::*;
//!
//! let source = HttpUserSource::new("http://localhost:6969", ListingContract::Simplified)?;
//! let controller = PaginationController::builder(Arc::new(source))
//!     .page_size(50)
//!     .build()?;
//!
//! controller.load_initial().await?;
//! controller
//!     .set_filter(FilterCriteria::new().with(UserField::Department, "IT")?)
//!     .await?;
//! let page = controller.go_to_page(2).await?;
//!
//! let editor = controller.editor();
//! editor.update(2, UserPatch { email: Some("new@x.com".into()), ..Default::default() }).await?;
//! ```

pub mod cache;
pub mod config;
pub mod core;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Cache ===
    pub use crate::cache::{
        CacheEvent, CacheEvents, EditMerger, EventEnvelope, FetchReason, LoadState, LookAhead,
        PageSlice, PaginationController, View,
    };

    // === Core ===
    pub use crate::core::{
        CacheError, CacheResult, FilterCriteria, Page, PageRequest, PaginationMeta, RecordSource,
        SortConfig, SortDirection, SourceCapabilities, User, UserField, UserPatch,
    };

    // === Configuration ===
    pub use crate::config::{DeckConfig, ListingContract};

    // === Sources ===
    #[cfg(feature = "http")]
    pub use crate::storage::HttpUserSource;
    pub use crate::storage::{GeneratorTask, InMemoryUserSource, generate};

    // === Server ===
    pub use crate::server::MockServerBuilder;

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
}
