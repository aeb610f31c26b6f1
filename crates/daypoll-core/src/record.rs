//! Encoding of a [`Poll`] as a string-valued store record.
//!
//! Every field is stored as a string. Counts are decimal integers and
//! milestones use the `threshold:followUp,threshold:followUp` form.
//!
//! Decoding is lenient: a count that does not parse reads as zero and a
//! milestone pair that does not parse is skipped, each with a warning.

use std::collections::HashMap;

use chrono::NaiveDate;
use daypoll_types::{Choice, Milestones, ParticipantId, Poll, PollId, Tally};

/// Poll identifier, duplicated inside the record.
pub const QUESTION_ID: &str = "question_id";
/// Owning participant.
pub const USER_ID: &str = "user_id";
/// Question text.
pub const TEXT: &str = "text";
/// First choice label.
pub const FIRST_CHOICE: &str = "first_choice";
/// Second choice label.
pub const SECOND_CHOICE: &str = "second_choice";
/// Votes for the first choice.
pub const FIRST_CHOICE_COUNT: &str = "first_choice_count";
/// Votes for the second choice.
pub const SECOND_CHOICE_COUNT: &str = "second_choice_count";
/// Distinct participants who voted.
pub const TOTAL_PARTICIPANTS: &str = "total_participants";
/// Encoded milestone map.
pub const MILESTONES: &str = "milestones";
/// Opaque follow-up metadata.
pub const FOLLOW_UPS: &str = "follow_ups";
/// Opaque group identifier.
pub const GROUP_ID: &str = "group_id";

/// The count field a vote for `choice` increments.
pub const fn count_field(choice: Choice) -> &'static str {
    match choice {
        Choice::First => FIRST_CHOICE_COUNT,
        Choice::Second => SECOND_CHOICE_COUNT,
    }
}

/// Every field of `poll`, ready for a single multi-field write.
pub fn encode(poll: &Poll) -> Vec<(&'static str, String)> {
    vec![
        (QUESTION_ID, poll.id.to_string()),
        (USER_ID, poll.owner_id.to_string()),
        (TEXT, poll.text.clone()),
        (FIRST_CHOICE, poll.first_choice.clone()),
        (SECOND_CHOICE, poll.second_choice.clone()),
        (FIRST_CHOICE_COUNT, poll.first_choice_count.to_string()),
        (SECOND_CHOICE_COUNT, poll.second_choice_count.to_string()),
        (TOTAL_PARTICIPANTS, poll.total_participants.to_string()),
        (MILESTONES, poll.milestones.to_string()),
        (FOLLOW_UPS, poll.follow_ups.clone()),
        (GROUP_ID, poll.group_id.clone()),
    ]
}

/// Whether `fields` hold a poll written by creation.
///
/// Counters alone do not make a poll: an increment that lands after a
/// delete leaves a hash with only the count fields.
pub fn is_poll(fields: &HashMap<String, String>) -> bool {
    fields.contains_key(QUESTION_ID)
}

/// Rebuild a poll from its stored fields.
///
/// The identifier and day come from the key the record was read under.
pub fn decode(id: PollId, day: NaiveDate, fields: &HashMap<String, String>) -> Poll {
    let text = |name: &str| fields.get(name).cloned().unwrap_or_default();
    let tally = decode_tally(id, fields);
    Poll {
        id,
        text: text(TEXT),
        first_choice: text(FIRST_CHOICE),
        second_choice: text(SECOND_CHOICE),
        first_choice_count: tally.first_choice_count,
        second_choice_count: tally.second_choice_count,
        total_participants: tally.total_participants,
        milestones: decode_milestones(id, fields.get(MILESTONES).map_or("", String::as_str)),
        follow_ups: text(FOLLOW_UPS),
        group_id: text(GROUP_ID),
        owner_id: ParticipantId::new(text(USER_ID)),
        created_on: day,
    }
}

/// Read just the three counters from a record.
pub fn decode_tally(id: PollId, fields: &HashMap<String, String>) -> Tally {
    Tally {
        first_choice_count: decode_count(id, FIRST_CHOICE_COUNT, fields.get(FIRST_CHOICE_COUNT)),
        second_choice_count: decode_count(id, SECOND_CHOICE_COUNT, fields.get(SECOND_CHOICE_COUNT)),
        total_participants: decode_count(id, TOTAL_PARTICIPANTS, fields.get(TOTAL_PARTICIPANTS)),
    }
}

/// Decode one counter. Absent reads as zero silently; garbage reads as
/// zero with a warning.
pub fn decode_count(id: PollId, field: &str, raw: Option<&String>) -> u64 {
    let Some(raw) = raw else { return 0 };
    raw.trim().parse::<u64>().unwrap_or_else(|e| {
        tracing::warn!(poll_id = %id, field, value = %raw, error = %e, "Malformed stored count, reading as 0");
        0
    })
}

/// Convert a store increment reply to a count.
pub fn reply_to_count(id: PollId, field: &str, reply: i64) -> u64 {
    u64::try_from(reply).unwrap_or_else(|_| {
        tracing::warn!(poll_id = %id, field, reply, "Negative counter reply, reading as 0");
        0
    })
}

fn decode_milestones(id: PollId, raw: &str) -> Milestones {
    let milestones = Milestones::parse_lenient(raw);
    let pairs = raw.split(',').filter(|p| !p.trim().is_empty()).count();
    if pairs != milestones.len() {
        tracing::warn!(poll_id = %id, value = raw, "Skipped malformed milestone pairs in stored record");
    }
    milestones
}
