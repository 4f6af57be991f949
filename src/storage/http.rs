//! Remote record source over HTTP
//!
//! Talks to either listing contract of the users API:
//!
//! - [`ListingContract::Full`]: `GET /api/users?page=&size=&sort=&order=&<field>=`
//!   answering `{users, totalCount}`. The server filters and sorts.
//! - [`ListingContract::Simplified`]: `GET /api/users/paginated?page=&size=`
//!   answering `{data, total, page, size}`. The cache filters and sorts.
//!
//! Edits go to `PATCH /api/users/:id`. Dropping a request future cancels the
//! underlying HTTP request.

use crate::config::{ListingContract, SourceSettings};
use crate::core::error::{CacheError, CacheResult};
use crate::core::query::{Page, PageRequest, PaginatedUsers, UsersResponse};
use crate::core::source::{RecordSource, SourceCapabilities};
use crate::core::user::{User, UserPatch};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Error body of a failed API call; only `message` is used
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Users API client
#[derive(Debug, Clone)]
pub struct HttpUserSource {
    client: Client,
    base_url: String,
    listing: ListingContract,
}

impl HttpUserSource {
    /// Create a source for the API at `base_url`
    pub fn new(base_url: impl Into<String>, listing: ListingContract) -> CacheResult<Self> {
        Self::with_timeout(base_url, listing, Duration::from_secs(10))
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        listing: ListingContract,
        timeout: Duration,
    ) -> CacheResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CacheError::Config {
                message: format!("cannot build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            listing,
        })
    }

    /// Create a source from the `source` configuration section
    pub fn from_settings(settings: &SourceSettings) -> CacheResult<Self> {
        Self::with_timeout(&settings.base_url, settings.listing, settings.timeout())
    }

    pub fn listing(&self) -> ListingContract {
        self.listing
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn transport_error(err: reqwest::Error) -> CacheError {
    let status = if err.is_timeout() {
        StatusCode::REQUEST_TIMEOUT.as_u16()
    } else {
        err.status().map(|s| s.as_u16()).unwrap_or(0)
    };
    CacheError::request(status, err.to_string())
}

/// Decode a 2xx body, or turn anything else into a request error
async fn decode<T: DeserializeOwned>(response: Response) -> CacheResult<T> {
    let status = response.status();
    if status.is_success() {
        return response.json::<T>().await.map_err(|e| {
            CacheError::request(status.as_u16(), format!("malformed response body: {}", e))
        });
    }

    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    Err(CacheError::request(status.as_u16(), message))
}

#[async_trait]
impl RecordSource for HttpUserSource {
    async fn fetch_page(&self, request: &PageRequest) -> CacheResult<Page> {
        request.validate()?;

        match self.listing {
            ListingContract::Full => {
                let response = self
                    .client
                    .get(self.url("/api/users"))
                    .query(&request.to_query_pairs())
                    .send()
                    .await
                    .map_err(transport_error)?;
                let body: UsersResponse = decode(response).await?;
                Ok(Page {
                    page: request.page,
                    records: body.users,
                    total_count: body.total_count,
                })
            }
            ListingContract::Simplified => {
                let response = self
                    .client
                    .get(self.url("/api/users/paginated"))
                    .query(&[("page", request.page), ("size", request.size)])
                    .send()
                    .await
                    .map_err(transport_error)?;
                let body: PaginatedUsers = decode(response).await?;
                Ok(Page {
                    page: request.page,
                    records: body.data,
                    total_count: body.total,
                })
            }
        }
    }

    async fn update_user(&self, id: u64, patch: &UserPatch) -> CacheResult<User> {
        let response = self
            .client
            .patch(self.url(&format!("/api/users/{}", id)))
            .json(patch)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(CacheError::NotFound { id });
        }
        decode(response).await
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            server_side_query: self.listing == ListingContract::Full,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let source = HttpUserSource::new("http://localhost:6969/", ListingContract::Full).unwrap();
        assert_eq!(source.url("/api/users"), "http://localhost:6969/api/users");
    }

    #[test]
    fn test_capabilities_follow_listing() {
        let full = HttpUserSource::new("http://x", ListingContract::Full).unwrap();
        let simple = HttpUserSource::new("http://x", ListingContract::Simplified).unwrap();
        assert!(full.capabilities().server_side_query);
        assert!(!simple.capabilities().server_side_query);
    }

    #[tokio::test]
    async fn test_invalid_request_never_leaves_the_process() {
        let source = HttpUserSource::new("http://127.0.0.1:1", ListingContract::Full).unwrap();
        let err = source.fetch_page(&PageRequest::new(0, 0)).await.unwrap_err();
        assert!(matches!(err, CacheError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_request_error() {
        let source = HttpUserSource::new("http://127.0.0.1:1", ListingContract::Simplified).unwrap();
        let err = source.fetch_page(&PageRequest::new(0, 10)).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.is_user_visible());
    }
}
