// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Comparable forms of field values.
//!
//! The server may hand back a birthdate as a bare calendar date or as a full
//! timestamp; edits always arrive as `YYYY-MM-DD`. Both sides go through the
//! same normalization before any equality check.

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::UserField;

pub const DATE_LAYOUT: &str = "YYYY-MM-DD";

/// Parses a birthdate in any accepted server form into a calendar date.
/// Timestamps with an offset are converted to UTC first.
pub fn parse_day(raw: &str) -> Option<Date> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(date) = Date::parse(trimmed, &format_description!("[year]-[month]-[day]")) {
        return Some(date);
    }
    if let Ok(stamp) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Some(stamp.to_offset(UtcOffset::UTC).date());
    }
    PrimitiveDateTime::parse(
        trimmed,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"),
    )
    .ok()
    .map(PrimitiveDateTime::date)
}

/// `YYYY-MM-DD` for anything [`parse_day`] accepts; other input is returned
/// unchanged so it still compares against itself.
pub fn normalize_date(raw: &str) -> String {
    match parse_day(raw) {
        Some(date) => date.to_string(),
        None => raw.to_owned(),
    }
}

pub fn normalize_field(field: UserField, raw: &str) -> String {
    if field.is_date() {
        normalize_date(raw)
    } else {
        raw.to_owned()
    }
}

pub fn values_match(field: UserField, left: &str, right: &str) -> bool {
    normalize_field(field, left) == normalize_field(field, right)
}
