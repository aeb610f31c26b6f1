//! Error taxonomy for poll operations.

use daypoll_db::StoreError;
use daypoll_types::PollId;

/// Errors returned by [`PollRegistry`](crate::registry::PollRegistry) and
/// [`VoteCounter`](crate::counter::VoteCounter).
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// No record exists for the poll in today's partition. This is an
    /// expected outcome for expired or unknown polls.
    #[error("poll not found: {0}")]
    PollNotFound(PollId),

    /// The backing store failed or timed out. Surfaced unchanged.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// A vote request was malformed.
    #[error("invalid vote request: {0}")]
    InvalidVoteRequest(String),

    /// A poll creation request was malformed.
    #[error("invalid poll request: {0}")]
    InvalidPollRequest(String),
}

impl PollError {
    /// Whether this is the routine not-found outcome.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::PollNotFound(_))
    }
}
