// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use time::Date;
use time::macros::format_description;

use crate::{FormKind, User, UserField, UserUpdate, ValidationError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFormInput {
    pub username: String,
    pub email: String,
    pub birthdate: String,
}

impl UserFormInput {
    /// Prefill from a canonical record; the birthdate is shown as a day.
    pub fn from_user(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            birthdate: user.birthdate_day(),
        }
    }

    pub fn value(&self, field: UserField) -> &str {
        match field {
            UserField::Username => &self.username,
            UserField::Email => &self.email,
            UserField::Birthdate => &self.birthdate,
        }
    }

    pub fn value_mut(&mut self, field: UserField) -> &mut String {
        match field {
            UserField::Username => &mut self.username,
            UserField::Email => &mut self.email,
            UserField::Birthdate => &mut self.birthdate,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.username.trim().is_empty() {
            return Err(ValidationError::MissingUsername);
        }
        let email = self.email.trim();
        if email.is_empty() {
            return Err(ValidationError::MissingEmail);
        }
        if !email.contains('@') {
            return Err(ValidationError::InvalidEmail);
        }
        let birthdate = self.birthdate.trim();
        if birthdate.is_empty() {
            return Err(ValidationError::MissingBirthdate);
        }
        if Date::parse(birthdate, &format_description!("[year]-[month]-[day]")).is_err() {
            return Err(ValidationError::InvalidBirthdate);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserForm {
    pub kind: FormKind,
    pub input: UserFormInput,
}

impl UserForm {
    pub fn create() -> Self {
        Self {
            kind: FormKind::Create,
            input: UserFormInput::default(),
        }
    }

    pub fn edit(user: &User) -> Self {
        Self {
            kind: FormKind::Edit(user.id),
            input: UserFormInput::from_user(user),
        }
    }

    /// Validated update entry: no id for a create, the record's id for an
    /// edit.
    pub fn submission(&self) -> Result<UserUpdate, ValidationError> {
        self.input.validate()?;
        let id = match self.kind {
            FormKind::Create => None,
            FormKind::Edit(id) => Some(id),
        };
        Ok(UserUpdate {
            id,
            username: Some(self.input.username.trim().to_owned()),
            email: Some(self.input.email.trim().to_owned()),
            birthdate: Some(self.input.birthdate.trim().to_owned()),
        })
    }

    pub const fn success_message(&self) -> &'static str {
        self.kind.success_message()
    }
}
