// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

/// Failure reported by the transport. The message is already human readable
/// and is shown verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    pub status: Option<u16>,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }
}

/// Client-side form errors. These never reach the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Username is required")]
    MissingUsername,
    #[error("Email is required")]
    MissingEmail,
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Birthdate is required")]
    MissingBirthdate,
    #[error("Birthdate must be a date in YYYY-MM-DD form")]
    InvalidBirthdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("commit failed: {0}")]
    Commit(String),
    #[error("a commit is already in flight")]
    CommitInFlight,
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

pub type RosterResult<T> = std::result::Result<T, RosterError>;
