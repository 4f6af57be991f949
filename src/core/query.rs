//! Page requests, page responses and pagination metadata

use crate::core::error::CacheError;
use crate::core::filter::FilterCriteria;
use crate::core::sort::SortConfig;
use crate::core::user::User;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Page size used when none is given
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Largest page a source will serve in one response
pub const MAX_PAGE_SIZE: usize = 10_000;

/// Query keys that are not filter criteria
const PAGING_KEYS: [&str; 4] = ["page", "size", "sort", "order"];

/// A request for one page of users
///
/// Pages are 0-based. Filters and sort travel with every request since
/// sources keep no session state.
///
/// # Example
/// ```rust,ignore
/// // GET /api/users?page=2&size=50&sort=age&order=desc&department=IT
/// let request = PageRequest::new(2, 50)
///     .with_sort(Some(SortConfig::desc(UserField::Age)))
///     .with_filters(FilterCriteria::new().with(UserField::Department, "IT")?);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageRequest {
    /// Page number (starts at 0)
    pub page: usize,

    /// Number of items per page
    pub size: usize,

    /// Filter criteria applied before paging
    pub filters: FilterCriteria,

    /// Ordering applied before paging
    pub sort: Option<SortConfig>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}

impl PageRequest {
    pub fn new(page: usize, size: usize) -> Self {
        Self {
            page,
            size,
            filters: FilterCriteria::default(),
            sort: None,
        }
    }

    pub fn with_filters(mut self, filters: FilterCriteria) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_sort(mut self, sort: Option<SortConfig>) -> Self {
        self.sort = sort;
        self
    }

    /// Index of the first record of this page
    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.size)
    }

    /// Reject requests that no source could answer
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.size == 0 {
            return Err(CacheError::validation("page size must be positive"));
        }
        if self.size > MAX_PAGE_SIZE {
            return Err(CacheError::validation(format!(
                "page size must not exceed {}",
                MAX_PAGE_SIZE
            )));
        }
        Ok(())
    }

    /// Parse a request from raw query parameters
    ///
    /// `page` defaults to 0 and `size` to [`DEFAULT_PAGE_SIZE`]; every key
    /// other than `page`, `size`, `sort` and `order` is a filter.
    pub fn from_query(query: &HashMap<String, String>) -> Result<Self, CacheError> {
        let page = parse_usize(query, "page")?.unwrap_or(0);
        let size = parse_usize(query, "size")?.unwrap_or(DEFAULT_PAGE_SIZE);
        let sort = SortConfig::from_params(
            query.get("sort").map(String::as_str),
            query.get("order").map(String::as_str),
        )?;
        let filters = FilterCriteria::from_pairs(
            query
                .iter()
                .filter(|(key, _)| !PAGING_KEYS.contains(&key.as_str())),
        )?;

        let request = Self {
            page,
            size,
            filters,
            sort,
        };
        request.validate()?;
        Ok(request)
    }

    /// Encode as query parameters for the full listing endpoint
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("page", self.page.to_string()), ("size", self.size.to_string())];
        if let Some(sort) = &self.sort {
            pairs.push(("sort", sort.field.as_str().to_string()));
            pairs.push(("order", sort.direction.as_str().to_string()));
        }
        pairs.extend(self.filters.to_pairs());
        pairs
    }
}

fn parse_usize(query: &HashMap<String, String>, key: &str) -> Result<Option<usize>, CacheError> {
    match query.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| {
            CacheError::validation(format!("'{}' must be a non-negative integer, got '{}'", key, raw))
        }),
    }
}

/// One page of users as returned by a record source
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// The page index this response answers
    pub page: usize,

    /// The records of this page, in source order
    pub records: Vec<User>,

    /// Total records matching the request's filters, across all pages
    pub total_count: usize,
}

/// Body of `GET /api/users`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersResponse {
    pub users: Vec<User>,
    pub total_count: usize,
}

/// Body of `GET /api/users/paginated`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedUsers {
    pub data: Vec<User>,
    pub total: usize,
    pub page: usize,
    pub size: usize,
}

/// Query of `GET /api/users/paginated`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaginatedQuery {
    pub page: usize,
    pub size: usize,
}

impl Default for PaginatedQuery {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    /// Current page number (starts at 0)
    pub current_page: usize,

    /// Number of items per page
    pub page_size: usize,

    /// Total number of items (after filters)
    pub total_count: usize,

    /// Total number of pages
    pub total_pages: usize,

    /// Whether the source holds records not loaded yet
    pub has_more: bool,
}

impl PaginationMeta {
    /// Create pagination metadata
    pub fn new(current_page: usize, page_size: usize, total_count: usize, has_more: bool) -> Self {
        Self {
            current_page,
            page_size,
            total_count,
            total_pages: total_pages(total_count, page_size),
            has_more,
        }
    }

    pub fn has_prev(&self) -> bool {
        self.current_page > 0
    }

    pub fn has_next(&self) -> bool {
        self.current_page + 1 < self.total_pages
    }
}

/// `ceil(total / size)`, 0 for an empty set
pub fn total_pages(total_count: usize, page_size: usize) -> usize {
    // Ensure size is at least 1 to avoid division by zero
    let page_size = page_size.max(1);
    if total_count == 0 {
        0
    } else {
        total_count.div_ceil(page_size)
    }
}
