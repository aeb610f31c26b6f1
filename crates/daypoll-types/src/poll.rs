//! Live poll records, tallies, and vote outcomes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ids::{ParticipantId, PollId};
use crate::milestones::Milestones;

/// A two-choice poll active for the calendar day it was created on.
///
/// Mutated only by vote registration. Counts start at zero and satisfy
/// `total_participants == first_choice_count + second_choice_count` after
/// every completed vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    /// Unique poll identifier.
    pub id: PollId,
    /// The question being asked.
    pub text: String,
    /// Label of the first choice.
    pub first_choice: String,
    /// Label of the second choice.
    pub second_choice: String,
    /// Votes counted for the first choice.
    pub first_choice_count: u64,
    /// Votes counted for the second choice.
    pub second_choice_count: u64,
    /// Participants who have voted.
    pub total_participants: u64,
    /// Thresholds that reveal follow-up content once crossed.
    pub milestones: Milestones,
    /// Opaque follow-up metadata (may be empty).
    pub follow_ups: String,
    /// Opaque group identifier for related polls (may be empty).
    pub group_id: String,
    /// Participant who created the poll (may be empty).
    pub owner_id: ParticipantId,
    /// Calendar day the poll belongs to.
    pub created_on: NaiveDate,
}

impl Poll {
    /// The current tally of this poll.
    pub const fn tally(&self) -> Tally {
        Tally {
            first_choice_count: self.first_choice_count,
            second_choice_count: self.second_choice_count,
            total_participants: self.total_participants,
        }
    }
}

/// Input for creating a poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPoll {
    /// The question being asked.
    pub text: String,
    /// Label of the first choice.
    pub first_choice: String,
    /// Label of the second choice.
    pub second_choice: String,
    /// Thresholds that reveal follow-up content.
    #[serde(default)]
    pub milestones: Milestones,
    /// Opaque follow-up metadata.
    #[serde(default)]
    pub follow_ups: String,
    /// Opaque group identifier.
    #[serde(default)]
    pub group_id: String,
}

/// Running vote counts of a poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    /// Votes for the first choice.
    pub first_choice_count: u64,
    /// Votes for the second choice.
    pub second_choice_count: u64,
    /// Participants who have voted.
    pub total_participants: u64,
}

impl Tally {
    /// Whether the choice counts add up to the participant count.
    pub fn is_conserved(&self) -> bool {
        self.first_choice_count.checked_add(self.second_choice_count)
            == Some(self.total_participants)
    }
}

/// Which of the two choices a vote is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    /// The first choice.
    First,
    /// The second choice.
    Second,
}

impl Choice {
    /// Map the wire-level `is_first_choice` flag to a choice.
    pub const fn from_flag(is_first_choice: bool) -> Self {
        if is_first_choice { Self::First } else { Self::Second }
    }
}

/// Outcome of a single vote request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteResult {
    /// The poll voted on.
    pub poll_id: PollId,
    /// True when the participant had already voted today; nothing changed.
    pub already_voted: bool,
    /// Tally after this vote (or the current tally when already voted).
    #[serde(flatten)]
    pub tally: Tally,
    /// Follow-up content ids revealed by this vote, ascending by threshold.
    pub newly_revealed: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_conservation() {
        let ok = Tally {
            first_choice_count: 3,
            second_choice_count: 1,
            total_participants: 4,
        };
        assert!(ok.is_conserved());
        let broken = Tally {
            total_participants: 5,
            ..ok
        };
        assert!(!broken.is_conserved());
    }

    #[test]
    fn vote_result_flattens_tally() {
        let result = VoteResult {
            poll_id: PollId::new(),
            already_voted: false,
            tally: Tally {
                first_choice_count: 1,
                second_choice_count: 0,
                total_participants: 1,
            },
            newly_revealed: vec!["followA".to_owned()],
        };
        let json = serde_json::to_value(&result).unwrap_or_default();
        assert_eq!(json["first_choice_count"], 1);
        assert_eq!(json["total_participants"], 1);
        assert_eq!(json["newly_revealed"][0], "followA");
    }

    #[test]
    fn new_poll_defaults_optional_fields() {
        let json = r#"{"text":"Tea?","first_choice":"yes","second_choice":"no"}"#;
        let req: Result<NewPoll, _> = serde_json::from_str(json);
        let req = req.unwrap_or_default();
        assert_eq!(req.text, "Tea?");
        assert!(req.milestones.is_empty());
        assert!(req.group_id.is_empty());
    }
}
