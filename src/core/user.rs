//! The user record, its attributes and partial updates

use crate::core::error::CacheError;
use crate::core::field::FieldValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// A user record
///
/// `id` is assigned at creation and never changes; every other attribute can
/// be edited. Serialized in camelCase to match the HTTP API (`jobTitle`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub name: String,
    pub surname: String,
    pub age: u32,
    pub email: String,
    pub department: String,
    pub company: String,
    pub job_title: String,
}

impl User {
    /// Read one attribute without cloning it
    pub fn field(&self, field: UserField) -> FieldValue<'_> {
        match field {
            UserField::Id => FieldValue::Integer(self.id as i64),
            UserField::Name => FieldValue::Text(&self.name),
            UserField::Surname => FieldValue::Text(&self.surname),
            UserField::Age => FieldValue::Integer(i64::from(self.age)),
            UserField::Email => FieldValue::Text(&self.email),
            UserField::Department => FieldValue::Text(&self.department),
            UserField::Company => FieldValue::Text(&self.company),
            UserField::JobTitle => FieldValue::Text(&self.job_title),
        }
    }
}

/// The attributes of a [`User`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserField {
    Id,
    Name,
    Surname,
    Age,
    Email,
    Department,
    Company,
    JobTitle,
}

impl UserField {
    /// Every attribute, in declaration order
    pub const ALL: [UserField; 8] = [
        UserField::Id,
        UserField::Name,
        UserField::Surname,
        UserField::Age,
        UserField::Email,
        UserField::Department,
        UserField::Company,
        UserField::JobTitle,
    ];

    /// Wire name of the attribute
    pub fn as_str(&self) -> &'static str {
        match self {
            UserField::Id => "id",
            UserField::Name => "name",
            UserField::Surname => "surname",
            UserField::Age => "age",
            UserField::Email => "email",
            UserField::Department => "department",
            UserField::Company => "company",
            UserField::JobTitle => "jobTitle",
        }
    }

    /// Numeric attributes compare and filter by value, not by text
    pub fn is_numeric(&self) -> bool {
        matches!(self, UserField::Id | UserField::Age)
    }
}

impl fmt::Display for UserField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserField {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| CacheError::validation(format!("unknown user field '{}'", s)))
    }
}

/// A partial update of a [`User`]
///
/// Absent fields are left untouched. A full `User` body deserializes into a
/// patch too; its `id` is ignored since the target comes from the path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 128))]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 128))]
    pub surname: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(max = 150))]
    pub age: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email)]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 128))]
    pub department: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 128))]
    pub company: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 128))]
    pub job_title: Option<String>,
}

impl UserPatch {
    /// True when the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self == &UserPatch::default()
    }

    /// Write every present field into `user`
    pub fn apply_to(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name.clone_from(name);
        }
        if let Some(surname) = &self.surname {
            user.surname.clone_from(surname);
        }
        if let Some(age) = self.age {
            user.age = age;
        }
        if let Some(email) = &self.email {
            user.email.clone_from(email);
        }
        if let Some(department) = &self.department {
            user.department.clone_from(department);
        }
        if let Some(company) = &self.company {
            user.company.clone_from(company);
        }
        if let Some(job_title) = &self.job_title {
            user.job_title.clone_from(job_title);
        }
    }

    /// Reject the patch before it is sent anywhere
    pub fn check(&self) -> Result<(), CacheError> {
        if self.is_empty() {
            return Err(CacheError::validation("patch changes no field"));
        }
        self.validate()?;
        Ok(())
    }
}

impl From<User> for UserPatch {
    fn from(user: User) -> Self {
        Self {
            name: Some(user.name),
            surname: Some(user.surname),
            age: Some(user.age),
            email: Some(user.email),
            department: Some(user.department),
            company: Some(user.company),
            job_title: Some(user.job_title),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> User {
        User {
            id: 2,
            name: "Ann".to_string(),
            surname: "Lee".to_string(),
            age: 31,
            email: "ann@test.com".to_string(),
            department: "IT".to_string(),
            company: "Company A".to_string(),
            job_title: "Developer".to_string(),
        }
    }

    #[test]
    fn test_user_wire_format_is_camel_case() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["jobTitle"], "Developer");
        assert!(value.get("job_title").is_none());
    }

    #[test]
    fn test_field_access() {
        let user = sample();
        assert_eq!(user.field(UserField::Age), FieldValue::Integer(31));
        assert_eq!(user.field(UserField::JobTitle), FieldValue::Text("Developer"));
    }

    #[test]
    fn test_field_from_str() {
        assert_eq!("jobTitle".parse::<UserField>().unwrap(), UserField::JobTitle);
        assert!("job_title".parse::<UserField>().is_err());
        assert!("height".parse::<UserField>().is_err());
    }

    #[test]
    fn test_numeric_fields() {
        assert!(UserField::Id.is_numeric());
        assert!(UserField::Age.is_numeric());
        assert!(!UserField::Email.is_numeric());
    }

    #[test]
    fn test_patch_applies_only_present_fields() {
        let mut user = sample();
        let patch = UserPatch {
            email: Some("new@test.com".to_string()),
            ..Default::default()
        };
        patch.apply_to(&mut user);
        assert_eq!(user.email, "new@test.com");
        assert_eq!(user.name, "Ann");
        assert_eq!(user.id, 2);
    }

    #[test]
    fn test_patch_from_full_body_ignores_id() {
        let patch: UserPatch = serde_json::from_value(json!({
            "id": 99,
            "name": "Bob",
            "jobTitle": "Manager"
        }))
        .unwrap();
        assert_eq!(patch.name.as_deref(), Some("Bob"));
        assert_eq!(patch.job_title.as_deref(), Some("Manager"));
        assert_eq!(patch.age, None);
    }

    #[test]
    fn test_patch_validation() {
        let bad_email = UserPatch {
            email: Some("not-an-email".to_string()),
            ..Default::default()
        };
        assert!(matches!(bad_email.check(), Err(CacheError::Validation { .. })));

        let too_old = UserPatch {
            age: Some(200),
            ..Default::default()
        };
        assert!(too_old.check().is_err());

        assert!(UserPatch::default().check().is_err());
        assert!(UserPatch::from(sample()).check().is_ok());
    }
}
