//! Shared type definitions for the Daypoll voting engine.
//!
//! This crate is the single source of truth for the domain types used
//! across the workspace: the store, the counting engine, and the HTTP API
//! all speak in these types.
//!
//! # Modules
//!
//! - [`ids`] -- Poll and participant identifiers
//! - [`milestones`] -- Threshold to follow-up mapping and its string encoding
//! - [`poll`] -- Live poll records, tallies, and vote outcomes
//! - [`events`] -- Lifecycle events published to the notifier
//! - [`archive`] -- Historical questions held by the archive store

pub mod archive;
pub mod events;
pub mod ids;
pub mod milestones;
pub mod poll;

// Re-export all public types at crate root for convenience.
pub use archive::{ArchivedQuestion, NewArchivedQuestion};
pub use events::PollEvent;
pub use ids::{ParticipantId, PollId};
pub use milestones::{MilestoneParseError, Milestones};
pub use poll::{Choice, NewPoll, Poll, Tally, VoteResult};
