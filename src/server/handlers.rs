//! HTTP handlers of the mock users API

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde_json::json;
use std::collections::HashMap;

use crate::core::error::{CacheError, CacheResult};
use crate::core::query::{
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PageRequest, PaginatedQuery, PaginatedUsers, UsersResponse,
};
use crate::core::user::{User, UserPatch};
use crate::storage::InMemoryUserSource;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub users: InMemoryUserSource,
}

/// `GET /api/users?page=&size=&sort=&order=&<field>=<value>`
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> CacheResult<Json<UsersResponse>> {
    let request = PageRequest::from_query(&params)?;
    tracing::debug!(page = request.page, size = request.size, "list users");
    state.users.simulate_latency().await;

    let page = state.users.query(&request)?;
    Ok(Json(UsersResponse {
        users: page.records,
        total_count: page.total_count,
    }))
}

/// `GET /api/users/paginated?page=&size=`
///
/// A size of 0 means the default page size.
pub async fn paginated_users(
    State(state): State<AppState>,
    Query(query): Query<PaginatedQuery>,
) -> CacheResult<Json<PaginatedUsers>> {
    let size = if query.size == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        query.size
    };
    if size > MAX_PAGE_SIZE {
        return Err(CacheError::validation(format!(
            "page size must not exceed {}",
            MAX_PAGE_SIZE
        )));
    }
    tracing::debug!(page = query.page, size, "pagination request");
    state.users.simulate_latency().await;

    Ok(Json(state.users.paginated(query.page, size)?))
}

/// `GET /api/users/:id`
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> CacheResult<Json<User>> {
    state.users.simulate_latency().await;
    state
        .users
        .get(id)?
        .map(Json)
        .ok_or(CacheError::NotFound { id })
}

/// `PATCH /api/users/:id` with a partial user body
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(patch): Json<UserPatch>,
) -> CacheResult<Json<User>> {
    state.users.simulate_latency().await;
    let user = state.users.apply_patch(id, &patch)?;
    tracing::info!(id, "user updated");
    Ok(Json(user))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "users": state.users.len(),
    }))
}
