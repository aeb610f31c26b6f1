//! Poll registry, vote counter, and day calendar for Daypoll.
//!
//! Polls are two-choice questions that live for one calendar day. The
//! [`PollRegistry`] creates, reads, deletes, and lists them; the
//! [`VoteCounter`] records one vote per participant per poll per day,
//! keeps the tally, and reveals follow-up content as milestones are
//! crossed. Both work through an injected [`KeyValueStore`] and delegate
//! every atomicity guarantee to it.
//!
//! # Modules
//!
//! - [`calendar`] -- the partition day ([`UtcCalendar`], [`FixedCalendar`])
//! - [`config`] -- `daypoll.yaml` loading with environment overrides
//! - [`counter`] -- vote deduplication, tallies, milestone reveals
//! - [`error`] -- [`PollError`]
//! - [`keys`] -- store key layout
//! - [`notifier`] -- lifecycle event delivery
//! - [`record`] -- poll record encoding
//! - [`registry`] -- poll creation, lookup, deletion, listing
//!
//! [`KeyValueStore`]: daypoll_db::KeyValueStore

pub mod calendar;
pub mod config;
pub mod counter;
pub mod error;
pub mod keys;
pub mod notifier;
pub mod record;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use calendar::{Calendar, FixedCalendar, UtcCalendar};
pub use config::{ConfigError, ServiceConfig};
pub use counter::VoteCounter;
pub use error::PollError;
pub use notifier::{BroadcastNotifier, FanoutNotifier, LogNotifier, Notifier};
pub use registry::{DEFAULT_POLL_TTL, PollRegistry};
