// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{ApiError, User, UserUpdate};

/// Remote user store. The HTTP client implements this; tests use the
/// in-memory fake from `roster-testkit`.
pub trait UserDirectory {
    /// All users whose name matches `name`, or every user when `name` is
    /// `None`. The server does not paginate.
    fn search_users(&self, name: Option<&str>) -> Result<Vec<User>, ApiError>;

    /// Creates (no id) or updates one user.
    fn update_user(&self, update: &UserUpdate) -> Result<User, ApiError>;

    /// Applies every entry or fails as a whole.
    fn update_users(&self, batch: &[UserUpdate]) -> Result<Vec<User>, ApiError>;
}

impl<T: UserDirectory + ?Sized> UserDirectory for &T {
    fn search_users(&self, name: Option<&str>) -> Result<Vec<User>, ApiError> {
        (**self).search_users(name)
    }

    fn update_user(&self, update: &UserUpdate) -> Result<User, ApiError> {
        (**self).update_user(update)
    }

    fn update_users(&self, batch: &[UserUpdate]) -> Result<Vec<User>, ApiError> {
        (**self).update_users(batch)
    }
}
