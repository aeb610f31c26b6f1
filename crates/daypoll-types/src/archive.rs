//! Immutable historical questions kept by the archive store.
//!
//! The archive is a separate relational record of past questions. It never
//! participates in live vote counting.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::poll::Poll;

/// A question persisted to the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedQuestion {
    /// Archive identifier.
    pub question_id: Uuid,
    /// Day the question was asked.
    pub archive_date: NaiveDate,
    /// The question text.
    pub question_text: String,
    /// Label of the first choice.
    pub first_choice: String,
    /// Label of the second choice.
    pub second_choice: String,
    /// Final first-choice count.
    pub first_choice_count: u64,
    /// Final second-choice count.
    pub second_choice_count: u64,
    /// Final participant count.
    pub total_participants: u64,
    /// Participant who created the question.
    pub created_by: String,
    /// When the archive row was written.
    pub created_at: DateTime<Utc>,
}

/// Input for writing a question to the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewArchivedQuestion {
    /// Day the question was asked.
    pub archive_date: NaiveDate,
    /// The question text.
    pub question_text: String,
    /// Label of the first choice.
    pub first_choice: String,
    /// Label of the second choice.
    pub second_choice: String,
    /// Final first-choice count.
    #[serde(default)]
    pub first_choice_count: u64,
    /// Final second-choice count.
    #[serde(default)]
    pub second_choice_count: u64,
    /// Final participant count.
    #[serde(default)]
    pub total_participants: u64,
    /// Participant who created the question.
    #[serde(default)]
    pub created_by: String,
}

impl NewArchivedQuestion {
    /// Snapshot a live poll, with its current tally, for archiving.
    pub fn from_poll(poll: &Poll) -> Self {
        Self {
            archive_date: poll.created_on,
            question_text: poll.text.clone(),
            first_choice: poll.first_choice.clone(),
            second_choice: poll.second_choice.clone(),
            first_choice_count: poll.first_choice_count,
            second_choice_count: poll.second_choice_count,
            total_participants: poll.total_participants,
            created_by: poll.owner_id.to_string(),
        }
    }

    /// Materialize the archive row with a fresh identifier.
    pub fn into_archived(self, created_at: DateTime<Utc>) -> ArchivedQuestion {
        ArchivedQuestion {
            question_id: Uuid::now_v7(),
            archive_date: self.archive_date,
            question_text: self.question_text,
            first_choice: self.first_choice,
            second_choice: self.second_choice,
            first_choice_count: self.first_choice_count,
            second_choice_count: self.second_choice_count,
            total_participants: self.total_participants,
            created_by: self.created_by,
            created_at,
        }
    }
}
