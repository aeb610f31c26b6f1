//! Store key layout.
//!
//! | Key | Type | Lifetime |
//! |-----|------|----------|
//! | `poll:{date}:{id}` | hash (the poll record) | poll TTL |
//! | `voted:{date}:{id}` | set of participant ids | poll TTL |
//! | `revealed:{id}` | set of revealed thresholds | poll TTL |
//! | `polls-today:{date}` | set of poll ids created that day | poll TTL |
//!
//! Dates render as `YYYY-MM-DD`. The revealed set carries no date; poll
//! identifiers are time-ordered UUIDs and never recur on another day.

use chrono::NaiveDate;
use daypoll_types::PollId;

/// The poll record.
pub fn poll_record(day: NaiveDate, id: PollId) -> String {
    format!("poll:{day}:{id}")
}

/// Participants who have voted on the poll that day.
pub fn membership(day: NaiveDate, id: PollId) -> String {
    format!("voted:{day}:{id}")
}

/// Milestone thresholds already reported for the poll.
pub fn revealed(id: PollId) -> String {
    format!("revealed:{id}")
}

/// Poll identifiers created on `day`.
pub fn today_index(day: NaiveDate) -> String {
    format!("polls-today:{day}")
}
