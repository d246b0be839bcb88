// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Unsaved inline edits, tracked per record and per field against the
//! canonical set the list last fetched.
//!
//! A patch exists for a record only while at least one of its fields differs
//! from the canonical value after normalization. Reverting the last differing
//! field drops the whole patch. Each patch keeps the record it was staged
//! against, so it survives fetches that leave the record out of the list.

use std::collections::BTreeMap;

use crate::normalize::{normalize_field, values_match};
use crate::{User, UserField, UserId, UserUpdate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPatch {
    id: UserId,
    baseline: User,
    fields: BTreeMap<UserField, String>,
}

impl PendingPatch {
    fn new(original: &User) -> Self {
        Self {
            id: original.id,
            baseline: original.clone(),
            fields: BTreeMap::new(),
        }
    }

    pub const fn id(&self) -> UserId {
        self.id
    }

    /// The record as last seen in a canonical set.
    pub const fn baseline(&self) -> &User {
        &self.baseline
    }

    pub fn get(&self, field: UserField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (UserField, &str)> {
        self.fields
            .iter()
            .map(|(field, value)| (*field, value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Patched values layered over `original`.
    pub fn apply_to(&self, original: &User) -> User {
        let mut merged = original.clone();
        for (field, value) in &self.fields {
            merged.set_field(*field, value.clone());
        }
        merged
    }

    fn differs_from(&self, original: &User) -> bool {
        self.fields
            .iter()
            .any(|(field, value)| !values_match(*field, value, original.field(*field)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// The field now differs from canonical and is pending.
    Staged,
    /// The field matches canonical; any pending value for it was dropped.
    Reverted,
    /// No canonical record carries this id. Nothing changed.
    UnknownRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditTracker {
    pending: BTreeMap<UserId, PendingPatch>,
    has_changes: bool,
}

impl EditTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn propose_edit(
        &mut self,
        canonical: &[User],
        id: UserId,
        field: UserField,
        raw: &str,
    ) -> EditOutcome {
        let Some(original) = find_user(canonical, id) else {
            return EditOutcome::UnknownRecord;
        };

        let outcome = if values_match(field, raw, original.field(field)) {
            if let Some(patch) = self.pending.get_mut(&id) {
                patch.fields.remove(&field);
                if patch.is_empty() {
                    self.pending.remove(&id);
                }
            }
            EditOutcome::Reverted
        } else {
            let patch = self
                .pending
                .entry(id)
                .or_insert_with(|| PendingPatch::new(original));
            patch.baseline.clone_from(original);
            patch.fields.insert(field, raw.to_owned());
            EditOutcome::Staged
        };

        self.has_changes = self.recheck(canonical);
        outcome
    }

    /// Pending value if one exists, else canonical. Birthdates always come
    /// back as `YYYY-MM-DD` when they parse.
    pub fn display_value(&self, user: &User, field: UserField) -> String {
        let value = self
            .pending
            .get(&user.id)
            .and_then(|patch| patch.get(field))
            .unwrap_or_else(|| user.field(field));
        normalize_field(field, value)
    }

    /// Full records for every patched user, the patch overlaid on the
    /// canonical record. A record missing from `canonical` is merged over
    /// the baseline it was staged against.
    pub fn build_commit_batch(&self, canonical: &[User]) -> Vec<User> {
        self.pending
            .values()
            .map(|patch| patch.apply_to(reference(canonical, patch)))
            .collect()
    }

    /// Re-validates patches against a freshly fetched canonical set. Records
    /// present in the set take it as their new baseline and lose fields that
    /// now agree with it; patches for absent records are kept as they are.
    pub fn rebase(&mut self, canonical: &[User]) {
        self.pending.retain(|id, patch| {
            if let Some(original) = find_user(canonical, *id) {
                patch.baseline.clone_from(original);
                patch
                    .fields
                    .retain(|field, value| !values_match(*field, value, original.field(*field)));
            }
            !patch.is_empty()
        });
        self.has_changes = self.recheck(canonical);
    }

    /// Drops the pending fields a successful save carried. Fields staged
    /// after the batch was built, or changed since, stay pending.
    pub fn settle(&mut self, sent: &[User], canonical: &[User]) {
        for record in sent {
            let Some(patch) = self.pending.get_mut(&record.id) else {
                continue;
            };
            patch
                .fields
                .retain(|field, value| !values_match(*field, value, record.field(*field)));
            if patch.is_empty() {
                self.pending.remove(&record.id);
            }
        }
        self.has_changes = self.recheck(canonical);
    }

    pub fn discard(&mut self) {
        self.pending.clear();
        self.has_changes = false;
    }

    pub const fn has_changes(&self) -> bool {
        self.has_changes
    }

    pub fn dirty_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn patch(&self, id: UserId) -> Option<&PendingPatch> {
        self.pending.get(&id)
    }

    pub fn patches(&self) -> impl Iterator<Item = &PendingPatch> {
        self.pending.values()
    }

    pub fn is_dirty(&self, id: UserId, field: UserField) -> bool {
        self.pending
            .get(&id)
            .is_some_and(|patch| patch.fields.contains_key(&field))
    }

    fn recheck(&self, canonical: &[User]) -> bool {
        self.pending
            .values()
            .any(|patch| patch.differs_from(reference(canonical, patch)))
    }
}

fn reference<'a>(canonical: &'a [User], patch: &'a PendingPatch) -> &'a User {
    find_user(canonical, patch.id).unwrap_or(&patch.baseline)
}

/// Update entries for a batch built by [`EditTracker::build_commit_batch`].
pub fn batch_updates(batch: &[User]) -> Vec<UserUpdate> {
    batch.iter().map(UserUpdate::from).collect()
}

fn find_user(users: &[User], id: UserId) -> Option<&User> {
    users.iter().find(|user| user.id == id)
}
