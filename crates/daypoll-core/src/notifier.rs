//! Notifier seam for poll lifecycle events.
//!
//! The registry and counter hand every [`PollEvent`] to a [`Notifier`].
//! Delivery is fire-and-forget: `notify` cannot fail and its outcome never
//! feeds back into counting.

use std::sync::Arc;

use daypoll_types::PollEvent;
use tokio::sync::broadcast;

/// Capacity of the broadcast channel for poll events.
///
/// A subscriber that falls behind by more than this many events receives
/// [`broadcast::error::RecvError::Lagged`] and skips to the newest event.
pub const BROADCAST_CAPACITY: usize = 256;

/// Receiver of poll lifecycle events.
pub trait Notifier: Send + Sync {
    /// Deliver one event.
    fn notify(&self, event: &PollEvent);
}

/// Writes each event to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &PollEvent) {
        match event {
            PollEvent::MilestoneReached {
                poll_id,
                threshold,
                follow_up,
                tally,
            } => tracing::info!(
                poll_id = %poll_id,
                threshold,
                follow_up = %follow_up,
                total = tally.total_participants,
                "Milestone reached"
            ),
            PollEvent::ParticipantsReached { poll_id, text, tally, .. } => tracing::info!(
                poll_id = %poll_id,
                text = %text,
                total = tally.total_participants,
                "Poll reached participant alert threshold"
            ),
            other => tracing::debug!(
                poll_id = %other.poll_id(),
                kind = other.kind(),
                "Poll event"
            ),
        }
    }
}

/// Publishes events on a `tokio` broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<PollEvent>,
}

impl BroadcastNotifier {
    /// Create a notifier with [`BROADCAST_CAPACITY`].
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.tx.subscribe()
    }

    /// The underlying sender.
    pub const fn sender(&self) -> &broadcast::Sender<PollEvent> {
        &self.tx
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, event: &PollEvent) {
        // Err only means nobody is subscribed.
        let _ = self.tx.send(event.clone());
    }
}

/// Delivers each event to several notifiers in order.
#[derive(Clone, Default)]
pub struct FanoutNotifier {
    targets: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    /// Create an empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target.
    #[must_use]
    pub fn with(mut self, target: Arc<dyn Notifier>) -> Self {
        self.targets.push(target);
        self
    }

    /// Number of targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether there are no targets.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl Notifier for FanoutNotifier {
    fn notify(&self, event: &PollEvent) {
        for target in &self.targets {
            target.notify(event);
        }
    }
}
