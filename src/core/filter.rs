//! Typed filter criteria
//!
//! One optional constraint per user attribute, combined with logical AND.
//! Textual attributes match by case-insensitive substring, `id` and `age`
//! by exact equality. A missing or empty value places no constraint.
//!
//! # Example
//!
//! ```rust,ignore
//! let criteria = FilterCriteria::from_pairs([("name", "an"), ("age", "31")])?;
//! assert!(criteria.matches(&ann));
//!
//! // GET /api/users?name=an&age=31
//! let pairs = criteria.to_pairs();
//! ```

use crate::core::error::CacheError;
use crate::core::user::{User, UserField};
use serde::{Deserialize, Serialize};

/// Filter criteria over [`User`] attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterCriteria {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub age: Option<u32>,
    pub email: Option<String>,
    pub department: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
}

impl FilterCriteria {
    /// Criteria that match every record
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter from a raw wire value
    pub fn with(mut self, field: UserField, value: &str) -> Result<Self, CacheError> {
        self.set(field, value)?;
        Ok(self)
    }

    /// Set one constraint from its raw wire value
    ///
    /// An empty value clears the constraint. Numeric attributes must parse.
    pub fn set(&mut self, field: UserField, value: &str) -> Result<(), CacheError> {
        let value = value.trim();
        let text = (!value.is_empty()).then(|| value.to_string());

        match field {
            UserField::Id => self.id = parse_number(field, value)?,
            UserField::Age => self.age = parse_number(field, value)?,
            UserField::Name => self.name = text,
            UserField::Surname => self.surname = text,
            UserField::Email => self.email = text,
            UserField::Department => self.department = text,
            UserField::Company => self.company = text,
            UserField::JobTitle => self.job_title = text,
        }
        Ok(())
    }

    /// Parse criteria from query-string pairs
    ///
    /// Unknown keys are rejected, so callers strip paging keys first.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, CacheError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut criteria = Self::default();
        for (key, value) in pairs {
            let field: UserField = key.as_ref().parse()?;
            criteria.set(field, value.as_ref())?;
        }
        Ok(criteria)
    }

    /// Active constraints as query-string pairs, in attribute order
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(id) = self.id {
            pairs.push((UserField::Id.as_str(), id.to_string()));
        }
        for (field, value) in self.text_constraints() {
            pairs.push((field.as_str(), value.to_string()));
        }
        if let Some(age) = self.age {
            pairs.push((UserField::Age.as_str(), age.to_string()));
        }
        pairs.sort_by_key(|(key, _)| {
            UserField::ALL
                .iter()
                .position(|field| field.as_str() == *key)
                .unwrap_or(usize::MAX)
        });
        pairs
    }

    /// True when no attribute is constrained
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.age.is_none() && self.text_constraints().next().is_none()
    }

    /// Check a single record
    ///
    /// Prefer [`FilterCriteria::compile`] when testing many records.
    pub fn matches(&self, user: &User) -> bool {
        self.compile().matches(user)
    }

    /// Pre-lowercase the text needles for repeated matching
    pub fn compile(&self) -> CompiledFilter {
        CompiledFilter {
            id: self.id,
            age: self.age,
            needles: self
                .text_constraints()
                .map(|(field, value)| (field, value.to_lowercase()))
                .collect(),
        }
    }

    fn text_constraints(&self) -> impl Iterator<Item = (UserField, &str)> {
        [
            (UserField::Name, &self.name),
            (UserField::Surname, &self.surname),
            (UserField::Email, &self.email),
            (UserField::Department, &self.department),
            (UserField::Company, &self.company),
            (UserField::JobTitle, &self.job_title),
        ]
        .into_iter()
        .filter_map(|(field, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| (field, v))
        })
    }
}

fn parse_number<T: std::str::FromStr>(field: UserField, value: &str) -> Result<Option<T>, CacheError> {
    if value.is_empty() {
        return Ok(None);
    }
    value.parse().map(Some).map_err(|_| {
        CacheError::validation(format!("'{}' expects an integer, got '{}'", field, value))
    })
}

/// Filter criteria prepared for matching many records
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    id: Option<u64>,
    age: Option<u32>,
    needles: Vec<(UserField, String)>,
}

impl CompiledFilter {
    /// True when every constraint holds for `user`
    pub fn matches(&self, user: &User) -> bool {
        self.id.is_none_or(|id| user.id == id)
            && self.age.is_none_or(|age| user.age == age)
            && self.needles.iter().all(|(field, needle)| {
                user.field(*field)
                    .as_text()
                    .is_some_and(|text| text.to_lowercase().contains(needle.as_str()))
            })
    }

    /// True when no attribute is constrained
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.age.is_none() && self.needles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: u64, name: &str, age: u32, department: &str) -> User {
        User {
            id,
            name: name.to_string(),
            surname: "Doe".to_string(),
            age,
            email: format!("{}@test.com", name.to_lowercase()),
            department: department.to_string(),
            company: "Company A".to_string(),
            job_title: "Developer".to_string(),
        }
    }

    #[test]
    fn test_empty_criteria_match_everything() {
        let criteria = FilterCriteria::new();
        assert!(criteria.is_empty());
        assert!(criteria.matches(&user(1, "Bob", 30, "IT")));
    }

    #[test]
    fn test_empty_strings_are_no_constraint() {
        let criteria = FilterCriteria {
            name: Some(String::new()),
            ..Default::default()
        };
        assert!(criteria.is_empty());
        assert!(criteria.matches(&user(1, "Bob", 30, "IT")));
    }

    #[test]
    fn test_text_is_case_insensitive_substring() {
        let criteria = FilterCriteria::new().with(UserField::Name, "an").unwrap();
        assert!(criteria.matches(&user(2, "Ann", 30, "IT")));
        assert!(criteria.matches(&user(3, "JOANNA", 30, "IT")));
        assert!(!criteria.matches(&user(1, "Bob", 30, "IT")));
    }

    #[test]
    fn test_numeric_is_exact() {
        let criteria = FilterCriteria::new().with(UserField::Age, "30").unwrap();
        assert!(criteria.matches(&user(1, "Bob", 30, "IT")));
        assert!(!criteria.matches(&user(1, "Bob", 300, "IT")));
        assert!(!criteria.matches(&user(1, "Bob", 3, "IT")));
    }

    #[test]
    fn test_constraints_are_anded() {
        let criteria = FilterCriteria::from_pairs([("name", "b"), ("department", "it")]).unwrap();
        assert!(criteria.matches(&user(1, "Bob", 30, "IT")));
        assert!(!criteria.matches(&user(1, "Bob", 30, "HR")));
        assert!(!criteria.matches(&user(1, "Ann", 30, "IT")));
    }

    #[test]
    fn test_from_pairs_rejects_unknown_field() {
        let err = FilterCriteria::from_pairs([("height", "180")]).unwrap_err();
        assert!(matches!(err, CacheError::Validation { .. }));
    }

    #[test]
    fn test_from_pairs_rejects_non_numeric_age() {
        let err = FilterCriteria::from_pairs([("age", "thirty")]).unwrap_err();
        assert!(err.to_string().contains("age"));
    }

    #[test]
    fn test_to_pairs_follows_attribute_order() {
        let criteria =
            FilterCriteria::from_pairs([("jobTitle", "dev"), ("age", "30"), ("id", "4")]).unwrap();
        let keys: Vec<_> = criteria.to_pairs().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["id", "age", "jobTitle"]);
    }
}
