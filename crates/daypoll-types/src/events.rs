//! Poll lifecycle events delivered to the notifier.
//!
//! Events are informational. Nothing in the counting path waits on or
//! reacts to their delivery.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ids::{ParticipantId, PollId};
use crate::poll::Tally;

/// A poll lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PollEvent {
    /// A poll was created and indexed for `day`.
    PollCreated {
        /// The new poll.
        poll_id: PollId,
        /// Partition day.
        day: NaiveDate,
        /// Creator of the poll.
        owner_id: ParticipantId,
        /// The question text.
        text: String,
    },

    /// A poll record was deleted.
    PollDeleted {
        /// The deleted poll.
        poll_id: PollId,
        /// Partition day.
        day: NaiveDate,
    },

    /// A milestone threshold was crossed for the first time.
    MilestoneReached {
        /// The poll whose tally crossed the threshold.
        poll_id: PollId,
        /// The threshold crossed.
        threshold: u64,
        /// Follow-up content revealed by the threshold.
        follow_up: String,
        /// Tally observed by the vote that crossed it.
        tally: Tally,
    },

    /// The participant count reached the configured alert threshold.
    ParticipantsReached {
        /// The poll.
        poll_id: PollId,
        /// The question text.
        text: String,
        /// Label of the first choice.
        first_choice: String,
        /// Label of the second choice.
        second_choice: String,
        /// Tally observed by the vote that reached the threshold.
        tally: Tally,
    },
}

impl PollEvent {
    /// The poll this event concerns.
    pub const fn poll_id(&self) -> PollId {
        match self {
            Self::PollCreated { poll_id, .. }
            | Self::PollDeleted { poll_id, .. }
            | Self::MilestoneReached { poll_id, .. }
            | Self::ParticipantsReached { poll_id, .. } => *poll_id,
        }
    }

    /// Short machine-readable name of the event kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PollCreated { .. } => "poll_created",
            Self::PollDeleted { .. } => "poll_deleted",
            Self::MilestoneReached { .. } => "milestone_reached",
            Self::ParticipantsReached { .. } => "participants_reached",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_kind() {
        let event = PollEvent::MilestoneReached {
            poll_id: PollId::new(),
            threshold: 2,
            follow_up: "followA".to_owned(),
            tally: Tally::default(),
        };
        let json = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(json["type"], event.kind());
        assert_eq!(json["threshold"], 2);
    }
}
