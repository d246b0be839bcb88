// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use roster_app::{ApiError, User, UserDirectory, UserId, UserUpdate};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use time::{Date, Duration, Month};

const FIRST_NAMES: [&str; 16] = [
    "avery", "jordan", "taylor", "riley", "morgan", "casey", "alex", "quinn", "parker", "drew",
    "kai", "elliot", "robin", "cameron", "hayden", "rowan",
];
const LAST_NAMES: [&str; 18] = [
    "walker", "martin", "hill", "evans", "lopez", "gray", "ward", "young", "diaz", "reed",
    "campbell", "turner", "flores", "bennett", "price", "morris", "foster", "brooks",
];
const EMAIL_DOMAINS: [&str; 5] = [
    "example.com",
    "example.org",
    "mail.test",
    "corp.test",
    "inbox.test",
];

const EARLIEST_BIRTH_YEAR: i32 = 1950;
const LATEST_BIRTH_YEAR: i32 = 2005;

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Reproducible user records. The same seed always yields the same
/// sequence.
#[derive(Debug, Clone)]
pub struct UserFaker {
    rng: DeterministicRng,
}

impl UserFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    /// One user. Birthdates come back either as a bare day or as a
    /// midnight UTC timestamp, the two shapes the server is known to send.
    pub fn user(&mut self, id: i64) -> User {
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        let domain = self.pick(&EMAIL_DOMAINS);
        let username = format!("{first}.{last}{id}");
        let day = self.birth_day();
        let birthdate = if self.rng.bool() {
            format!("{day}T00:00:00.000Z")
        } else {
            day.to_string()
        };

        User {
            id: UserId::new(id),
            email: format!("{username}@{domain}"),
            username,
            birthdate,
        }
    }

    pub fn users(&mut self, count: usize) -> Vec<User> {
        (1..=count as i64).map(|id| self.user(id)).collect()
    }

    fn birth_day(&mut self) -> Date {
        let start = Date::from_calendar_date(EARLIEST_BIRTH_YEAR, Month::January, 1)
            .unwrap_or(Date::MIN);
        let span = (LATEST_BIRTH_YEAR - EARLIEST_BIRTH_YEAR) as usize * 365;
        start + Duration::days(self.rng.int_n(span) as i64)
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }
}

/// Deterministic sample set used across the workspace's tests.
pub fn sample_users(count: usize) -> Vec<User> {
    UserFaker::new(7).users(count)
}

/// Named fixture users with stable ids, for tests that assert on values.
pub fn fixture_users() -> Vec<User> {
    [
        (3, "carol", "carol@example.com", "1985-01-20"),
        (5, "erin", "erin@example.com", "1979-11-03T00:00:00.000Z"),
        (7, "alice", "alice@example.com", "1990-05-02T00:00:00.000Z"),
        (9, "alicia", "alicia@example.org", "2001-12-24"),
    ]
    .into_iter()
    .map(|(id, username, email, birthdate)| User {
        id: UserId::new(id),
        username: username.to_owned(),
        email: email.to_owned(),
        birthdate: birthdate.to_owned(),
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryCall {
    Search(Option<String>),
    Update(Vec<UserUpdate>),
}

#[derive(Debug, Default)]
struct DirectoryState {
    users: Vec<User>,
    calls: Vec<DirectoryCall>,
    failures: VecDeque<ApiError>,
}

/// In-memory [`UserDirectory`]. Search is a case-insensitive substring match
/// on the username; batch updates apply all entries or none.
#[derive(Debug, Default)]
pub struct FakeDirectory {
    state: Mutex<DirectoryState>,
}

impl FakeDirectory {
    pub fn new(users: Vec<User>) -> Self {
        Self {
            state: Mutex::new(DirectoryState {
                users,
                ..DirectoryState::default()
            }),
        }
    }

    /// The next call of any kind fails with `error`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, error: ApiError) {
        self.lock().failures.push_back(error);
    }

    pub fn users(&self) -> Vec<User> {
        self.lock().users.clone()
    }

    pub fn calls(&self) -> Vec<DirectoryCall> {
        self.lock().calls.clone()
    }

    pub fn searches(&self) -> Vec<Option<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                DirectoryCall::Search(name) => Some(name),
                DirectoryCall::Update(_) => None,
            })
            .collect()
    }

    pub fn update_batches(&self) -> Vec<Vec<UserUpdate>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                DirectoryCall::Update(batch) => Some(batch),
                DirectoryCall::Search(_) => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, DirectoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UserDirectory for FakeDirectory {
    fn search_users(&self, name: Option<&str>) -> Result<Vec<User>, ApiError> {
        let mut state = self.lock();
        state.calls.push(DirectoryCall::Search(name.map(str::to_owned)));
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }

        let needle = name.map(str::to_lowercase).unwrap_or_default();
        Ok(state
            .users
            .iter()
            .filter(|user| user.username.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    fn update_user(&self, update: &UserUpdate) -> Result<User, ApiError> {
        self.update_users(std::slice::from_ref(update))?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::new("empty update response"))
    }

    fn update_users(&self, batch: &[UserUpdate]) -> Result<Vec<User>, ApiError> {
        let mut state = self.lock();
        state.calls.push(DirectoryCall::Update(batch.to_vec()));
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }

        let mut users = state.users.clone();
        let mut next_id = users.iter().map(|user| user.id.get()).max().unwrap_or(0);
        let mut applied = Vec::with_capacity(batch.len());
        for (index, update) in batch.iter().enumerate() {
            let user = match update.id {
                Some(id) => users
                    .iter_mut()
                    .find(|user| user.id == id)
                    .ok_or_else(|| ApiError::with_status(404, format!("[{index}].id not found")))?,
                None => {
                    next_id += 1;
                    users.push(User {
                        id: UserId::new(next_id),
                        username: String::new(),
                        email: String::new(),
                        birthdate: String::new(),
                    });
                    let last = users.len() - 1;
                    &mut users[last]
                }
            };
            if let Some(username) = &update.username {
                user.username.clone_from(username);
            }
            if let Some(email) = &update.email {
                user.email.clone_from(email);
            }
            if let Some(birthdate) = &update.birthdate {
                user.birthdate.clone_from(birthdate);
            }
            applied.push(user.clone());
        }

        state.users = users;
        Ok(applied)
    }
}
