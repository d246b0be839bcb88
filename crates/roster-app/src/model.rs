// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Deserializer, Serialize};

use crate::ids::*;
use crate::normalize::normalize_date;

/// Rows per page in the user list. Pagination is client-side over the full
/// search result.
pub const PAGE_SIZE: usize = 10;

/// Number of page buttons shown at once.
pub const PAGE_WINDOW: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default, deserialize_with = "string_or_null")]
    pub username: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub email: String,
    /// Server representation; may be a bare date or a full timestamp.
    #[serde(default, deserialize_with = "string_or_null")]
    pub birthdate: String,
}

impl User {
    pub fn field(&self, field: UserField) -> &str {
        match field {
            UserField::Username => &self.username,
            UserField::Email => &self.email,
            UserField::Birthdate => &self.birthdate,
        }
    }

    pub fn set_field(&mut self, field: UserField, value: String) {
        match field {
            UserField::Username => self.username = value,
            UserField::Email => self.email = value,
            UserField::Birthdate => self.birthdate = value,
        }
    }

    /// Birthdate as `YYYY-MM-DD` when it parses, otherwise the raw value.
    pub fn birthdate_day(&self) -> String {
        normalize_date(&self.birthdate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserField {
    Username,
    Email,
    Birthdate,
}

impl UserField {
    pub const ALL: [Self; 3] = [Self::Username, Self::Email, Self::Birthdate];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Email => "email",
            Self::Birthdate => "birthdate",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "username" => Some(Self::Username),
            "email" => Some(Self::Email),
            "birthdate" => Some(Self::Birthdate),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Username => "Username",
            Self::Email => "Email",
            Self::Birthdate => "Birthdate",
        }
    }

    pub const fn is_date(self) -> bool {
        matches!(self, Self::Birthdate)
    }

    pub fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|field| *field == self)
            .unwrap_or(0)
    }
}

/// One entry of an update request. Creates carry no id; absent fields are
/// left out of the JSON body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<String>,
}

impl UserUpdate {
    pub fn value(&self, field: UserField) -> Option<&str> {
        match field {
            UserField::Username => self.username.as_deref(),
            UserField::Email => self.email.as_deref(),
            UserField::Birthdate => self.birthdate.as_deref(),
        }
    }
}

impl From<&User> for UserUpdate {
    fn from(user: &User) -> Self {
        Self {
            id: Some(user.id),
            username: Some(user.username.clone()),
            email: Some(user.email.clone()),
            birthdate: Some(user.birthdate.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Create,
    Edit(UserId),
}

impl FormKind {
    pub const fn title(self) -> &'static str {
        match self {
            Self::Create => "Add New User",
            Self::Edit(_) => "Edit User",
        }
    }

    pub const fn success_message(self) -> &'static str {
        match self {
            Self::Create => "User created successfully!",
            Self::Edit(_) => "User updated successfully!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Nav,
    Search,
    CellEdit,
    Form(FormKind),
}

fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::{User, UserField, UserUpdate};
    use crate::UserId;

    #[test]
    fn user_decodes_null_fields_as_empty() {
        let user: User = serde_json::from_str(
            r#"{"id":4,"username":"dana","email":null,"birthdate":"1990-05-02T00:00:00.000Z"}"#,
        )
        .expect("decode user");
        assert_eq!(user.id, UserId::new(4));
        assert_eq!(user.email, "");
        assert_eq!(user.birthdate_day(), "1990-05-02");
    }

    #[test]
    fn create_update_omits_id_and_absent_fields() {
        let update = UserUpdate {
            username: Some("eve".to_owned()),
            ..UserUpdate::default()
        };
        let body = serde_json::to_string(&update).expect("encode update");
        assert_eq!(body, r#"{"username":"eve"}"#);
    }

    #[test]
    fn field_parse_matches_wire_names() {
        for field in UserField::ALL {
            assert_eq!(UserField::parse(field.as_str()), Some(field));
        }
        assert_eq!(UserField::parse("id"), None);
    }
}
