//! Sort configuration

use crate::core::error::CacheError;
use crate::core::user::{User, UserField};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(CacheError::validation(format!(
                "sort order must be 'asc' or 'desc', got '{}'",
                other
            ))),
        }
    }
}

/// Which attribute to order by, and in which direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortConfig {
    pub field: UserField,
    pub direction: SortDirection,
}

impl SortConfig {
    pub fn new(field: UserField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    pub fn asc(field: UserField) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    pub fn desc(field: UserField) -> Self {
        Self::new(field, SortDirection::Desc)
    }

    /// Parse the `sort` / `order` query parameters
    ///
    /// No `sort` means no ordering. A missing `order` defaults to ascending.
    pub fn from_params(sort: Option<&str>, order: Option<&str>) -> Result<Option<Self>, CacheError> {
        let Some(sort) = sort.filter(|s| !s.is_empty()) else {
            if let Some(order) = order.filter(|o| !o.is_empty()) {
                // Still reject garbage even though it has no effect
                order.parse::<SortDirection>()?;
            }
            return Ok(None);
        };

        let field = sort.parse()?;
        let direction = match order.filter(|o| !o.is_empty()) {
            Some(order) => order.parse()?,
            None => SortDirection::Asc,
        };
        Ok(Some(Self { field, direction }))
    }

    /// Compare two records under this configuration
    pub fn compare(&self, a: &User, b: &User) -> Ordering {
        let ordering = a.field(self.field).compare(&b.field(self.field));
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}
