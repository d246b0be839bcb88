// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! The user list: canonical search results, client-side paging, and the
//! inline edits staged against them.
//!
//! Network work is split into `begin_*` / `finish_*` pairs so a caller can
//! run the request anywhere (the TUI uses worker threads) and hand the result
//! back later. Every fetch carries a sequence number; only the response to
//! the most recently issued fetch is applied. `search`, `refresh` and
//! `commit_edits` drive a full round trip against a [`UserDirectory`] in
//! place.

use tracing::{debug, warn};

use crate::edits::batch_updates;
use crate::paging::{PageView, clamp_page};
use crate::{
    ApiError, EditOutcome, EditTracker, RosterError, RosterResult, User, UserDirectory, UserField,
    UserId, UserUpdate,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    Loading,
    Loaded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub seq: u64,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Loaded(usize),
    Failed,
    /// A newer fetch was issued after this one; the response was dropped.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    pub updates: Vec<UserUpdate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitStart {
    Nothing,
    Busy,
    Ready(CommitRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { count: usize, refresh: FetchRequest },
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListController {
    users: Vec<User>,
    edits: EditTracker,
    search_term: Option<String>,
    page: usize,
    phase: LoadPhase,
    issued_seq: u64,
    fetch_error: Option<String>,
    commit_error: Option<String>,
    commit_notice: Option<String>,
    committing: Option<Vec<User>>,
}

impl Default for ListController {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            edits: EditTracker::new(),
            search_term: None,
            page: 1,
            phase: LoadPhase::Idle,
            issued_seq: 0,
            fetch_error: None,
            commit_error: None,
            commit_notice: None,
            committing: None,
        }
    }
}

impl ListController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a search. Blank input clears the filter. Resets to page 1.
    pub fn begin_search(&mut self, raw_term: &str) -> FetchRequest {
        let trimmed = raw_term.trim();
        self.search_term = (!trimmed.is_empty()).then(|| trimmed.to_owned());
        self.page = 1;
        self.issue_fetch()
    }

    /// Re-fetches with the active term, keeping the page when it stays in
    /// range.
    pub fn begin_refresh(&mut self) -> FetchRequest {
        self.issue_fetch()
    }

    pub fn finish_fetch(&mut self, seq: u64, result: Result<Vec<User>, ApiError>) -> FetchOutcome {
        if seq != self.issued_seq {
            debug!(seq, latest = self.issued_seq, "dropping stale search response");
            return FetchOutcome::Stale;
        }

        match result {
            Ok(users) => {
                debug!(seq, count = users.len(), "search response applied");
                self.users = users;
                self.page = clamp_page(self.page, self.page_view().total_pages());
                self.edits.rebase(&self.users);
                self.phase = LoadPhase::Loaded;
                FetchOutcome::Loaded(self.users.len())
            }
            Err(error) => {
                warn!(seq, error = %error, "search failed");
                self.users.clear();
                self.page = 1;
                self.fetch_error = Some(error.message);
                self.phase = LoadPhase::Failed;
                FetchOutcome::Failed
            }
        }
    }

    /// Moves to page `page`, clamped into range. Never fetches.
    pub fn change_page(&mut self, page: usize) -> usize {
        self.page = self.page_view().clamp(page);
        self.page
    }

    pub fn next_page(&mut self) -> usize {
        self.change_page(self.page.saturating_add(1))
    }

    pub fn prev_page(&mut self) -> usize {
        self.change_page(self.page.saturating_sub(1))
    }

    pub fn last_page(&mut self) -> usize {
        self.change_page(self.page_view().total_pages())
    }

    pub fn propose_edit(&mut self, id: UserId, field: UserField, raw: &str) -> EditOutcome {
        self.commit_error = None;
        self.commit_notice = None;
        self.edits.propose_edit(&self.users, id, field, raw)
    }

    pub fn discard(&mut self) {
        self.edits.discard();
        self.commit_error = None;
        self.commit_notice = None;
    }

    pub fn begin_commit(&mut self) -> CommitStart {
        if self.committing.is_some() {
            return CommitStart::Busy;
        }
        let batch = self.edits.build_commit_batch(&self.users);
        if batch.is_empty() {
            return CommitStart::Nothing;
        }
        debug!(count = batch.len(), "committing pending edits");
        let updates = batch_updates(&batch);
        self.committing = Some(batch);
        self.commit_error = None;
        self.commit_notice = None;
        CommitStart::Ready(CommitRequest { updates })
    }

    pub fn finish_commit(&mut self, result: Result<Vec<User>, ApiError>) -> CommitOutcome {
        let sent = self.committing.take().unwrap_or_default();
        let count = sent.len();
        match result {
            Ok(_) => {
                self.edits.settle(&sent, &self.users);
                self.commit_notice = Some(format!(
                    "Successfully updated {count} user{}!",
                    if count == 1 { "" } else { "s" }
                ));
                let refresh = self.begin_refresh();
                CommitOutcome::Committed { count, refresh }
            }
            Err(error) => {
                warn!(error = %error, "batch update failed");
                self.commit_error = Some(humanize_field_errors(&error.message));
                CommitOutcome::Failed
            }
        }
    }

    pub fn search<D>(&mut self, directory: &D, raw_term: &str) -> RosterResult<usize>
    where
        D: UserDirectory + ?Sized,
    {
        let request = self.begin_search(raw_term);
        self.run_fetch(directory, request)
    }

    pub fn refresh<D>(&mut self, directory: &D) -> RosterResult<usize>
    where
        D: UserDirectory + ?Sized,
    {
        let request = self.begin_refresh();
        self.run_fetch(directory, request)
    }

    /// Sends every pending edit in one batch. Returns how many users were
    /// committed; zero when nothing was pending.
    pub fn commit_edits<D>(&mut self, directory: &D) -> RosterResult<usize>
    where
        D: UserDirectory + ?Sized,
    {
        let request = match self.begin_commit() {
            CommitStart::Nothing => return Ok(0),
            CommitStart::Busy => return Err(RosterError::CommitInFlight),
            CommitStart::Ready(request) => request,
        };

        let result = directory.update_users(&request.updates);
        match self.finish_commit(result) {
            CommitOutcome::Committed { count, refresh } => {
                if let Err(error) = self.run_fetch(directory, refresh) {
                    warn!(error = %error, "refresh after commit failed");
                }
                Ok(count)
            }
            CommitOutcome::Failed => Err(RosterError::Commit(
                self.commit_error.clone().unwrap_or_default(),
            )),
        }
    }

    fn run_fetch<D>(&mut self, directory: &D, request: FetchRequest) -> RosterResult<usize>
    where
        D: UserDirectory + ?Sized,
    {
        let result = directory.search_users(request.name.as_deref());
        match self.finish_fetch(request.seq, result) {
            FetchOutcome::Loaded(count) => Ok(count),
            FetchOutcome::Failed => Err(RosterError::Fetch(
                self.fetch_error.clone().unwrap_or_default(),
            )),
            FetchOutcome::Stale => Ok(0),
        }
    }

    fn issue_fetch(&mut self) -> FetchRequest {
        self.issued_seq = self.issued_seq.saturating_add(1);
        self.phase = LoadPhase::Loading;
        self.fetch_error = None;
        debug!(seq = self.issued_seq, name = ?self.search_term, "search issued");
        FetchRequest {
            seq: self.issued_seq,
            name: self.search_term.clone(),
        }
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.iter().find(|user| user.id == id)
    }

    pub fn page_view(&self) -> PageView {
        PageView::new(self.page, self.users.len())
    }

    pub fn page_users(&self) -> &[User] {
        &self.users[self.page_view().bounds()]
    }

    pub const fn page(&self) -> usize {
        self.page
    }

    pub fn total_pages(&self) -> usize {
        self.page_view().total_pages()
    }

    pub fn page_window(&self) -> Vec<usize> {
        self.page_view().window()
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search_term.as_deref()
    }

    pub const fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == LoadPhase::Loading
    }

    pub const fn is_committing(&self) -> bool {
        self.committing.is_some()
    }

    pub const fn latest_seq(&self) -> u64 {
        self.issued_seq
    }

    pub fn fetch_error(&self) -> Option<&str> {
        self.fetch_error.as_deref()
    }

    pub fn commit_error(&self) -> Option<&str> {
        self.commit_error.as_deref()
    }

    pub fn commit_notice(&self) -> Option<&str> {
        self.commit_notice.as_deref()
    }

    pub const fn edits(&self) -> &EditTracker {
        &self.edits
    }

    pub fn display_value(&self, user: &User, field: UserField) -> String {
        self.edits.display_value(user, field)
    }
}

/// Rewrites server validation messages for display: drops batch index
/// prefixes such as `[0].` and capitalizes field names.
pub fn humanize_field_errors(message: &str) -> String {
    let stripped = strip_index_prefixes(message);
    let mut out = String::with_capacity(stripped.len());
    let mut word = String::new();
    for ch in stripped.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            word.push(ch);
        } else {
            flush_word(&mut out, &mut word);
            out.push(ch);
        }
    }
    flush_word(&mut out, &mut word);
    out
}

fn flush_word(out: &mut String, word: &mut String) {
    match UserField::parse(word) {
        Some(field) => out.push_str(field.label()),
        None => out.push_str(word),
    }
    word.clear();
}

fn strip_index_prefixes(message: &str) -> String {
    let chars = message.chars().collect::<Vec<_>>();
    let mut out = String::with_capacity(message.len());
    let mut index = 0;
    while index < chars.len() {
        if chars[index] == '[' {
            let digits = chars[index + 1..]
                .iter()
                .take_while(|ch| ch.is_ascii_digit())
                .count();
            let close = index + 1 + digits;
            if digits > 0 && chars.get(close) == Some(&']') && chars.get(close + 1) == Some(&'.') {
                index = close + 2;
                continue;
            }
        }
        out.push(chars[index]);
        index += 1;
    }
    out
}
