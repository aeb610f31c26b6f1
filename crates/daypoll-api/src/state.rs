//! Shared application state for the poll API.
//!
//! [`AppState`] owns the poll registry and vote counter (both over the same
//! store handle), the question archive, the account directory, and the
//! broadcast channel that feeds `WebSocket` subscribers.

use std::sync::Arc;

use daypoll_core::config::VotingConfig;
use daypoll_core::{
    BroadcastNotifier, Calendar, FanoutNotifier, LogNotifier, Notifier, PollRegistry, VoteCounter,
};
use daypoll_db::{ArchiveBackend, KeyValueStore};
use daypoll_types::PollEvent;
use tokio::sync::broadcast;

use crate::auth::AccountDirectory;

/// State shared by every handler.
pub struct AppState<S> {
    /// Poll creation and lookup.
    pub registry: PollRegistry<S>,
    /// Vote recording and tallies.
    pub counter: VoteCounter<S>,
    /// Archived questions.
    pub archive: ArchiveBackend,
    /// Bearer token validation.
    pub directory: Arc<dyn AccountDirectory>,
    /// Poll events for `WebSocket` subscribers.
    pub events: BroadcastNotifier,
}

impl<S: KeyValueStore> AppState<S> {
    /// Wire the registry and counter over `store`.
    ///
    /// Events go both to the log and to the broadcast channel.
    pub fn new(
        store: S,
        voting: &VotingConfig,
        calendar: Arc<dyn Calendar>,
        archive: ArchiveBackend,
        directory: Arc<dyn AccountDirectory>,
    ) -> Self {
        let events = BroadcastNotifier::new();
        let notifier: Arc<dyn Notifier> = Arc::new(
            FanoutNotifier::new()
                .with(Arc::new(LogNotifier))
                .with(Arc::new(events.clone())),
        );

        let registry = PollRegistry::new(store.clone(), Arc::clone(&calendar), Arc::clone(&notifier))
            .with_ttl(voting.poll_ttl());
        let counter = VoteCounter::new(store, calendar, notifier)
            .with_ttl(voting.poll_ttl())
            .with_atomic_tally(voting.atomic_tally)
            .with_participant_alert(voting.participant_alert_threshold);

        Self {
            registry,
            counter,
            archive,
            directory,
            events,
        }
    }

    /// Subscribe to poll events.
    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.events.subscribe()
    }
}
