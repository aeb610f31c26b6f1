//! Poll registry: creation, lookup, deletion, and today's listing.
//!
//! Every operation is scoped to the partition day the [`Calendar`] reports
//! at call time. A poll created on day D lives at `poll:D:{id}` and is
//! indexed in `polls-today:D`; on day D+1 it is invisible even if its record
//! has not yet expired.
//!
//! # Partial creation
//!
//! Creation writes the record, bounds its lifetime, then indexes it. If any
//! step after the record write fails, the record is deleted again and the
//! original error is returned, so callers never see a poll id that was not
//! indexed. A failed cleanup is logged and otherwise ignored.

use std::sync::Arc;
use std::time::Duration;

use daypoll_db::{KeyValueStore, StoreError};
use daypoll_types::{NewPoll, ParticipantId, Poll, PollEvent, PollId};

use crate::calendar::Calendar;
use crate::error::PollError;
use crate::keys;
use crate::notifier::Notifier;
use crate::record;

/// Default lifetime of day-scoped keys.
pub const DEFAULT_POLL_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Creates and retrieves day-scoped polls.
///
/// Cloning is cheap: the store handle, calendar, and notifier are shared.
#[derive(Clone)]
pub struct PollRegistry<S> {
    store: S,
    calendar: Arc<dyn Calendar>,
    notifier: Arc<dyn Notifier>,
    ttl: Duration,
}

impl<S: KeyValueStore> PollRegistry<S> {
    /// Create a registry over `store`.
    pub fn new(store: S, calendar: Arc<dyn Calendar>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            calendar,
            notifier,
            ttl: DEFAULT_POLL_TTL,
        }
    }

    /// Set the lifetime given to day-scoped keys.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// The backing store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The current partition day.
    pub fn today(&self) -> chrono::NaiveDate {
        self.calendar.today()
    }

    /// Create a poll in today's partition and return its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`PollError::InvalidPollRequest`] if the text or a choice
    /// label is blank, and [`PollError::StoreUnavailable`] if any write
    /// fails (after best-effort cleanup of the record).
    pub async fn create_poll(
        &self,
        request: NewPoll,
        owner: &ParticipantId,
    ) -> Result<PollId, PollError> {
        validate(&request)?;

        let day = self.calendar.today();
        let id = PollId::new();
        let poll = Poll {
            id,
            text: request.text,
            first_choice: request.first_choice,
            second_choice: request.second_choice,
            first_choice_count: 0,
            second_choice_count: 0,
            total_participants: 0,
            milestones: request.milestones,
            follow_ups: request.follow_ups,
            group_id: request.group_id,
            owner_id: owner.clone(),
            created_on: day,
        };

        let record_key = keys::poll_record(day, id);
        if let Err(e) = self.write_and_index(&record_key, &poll).await {
            tracing::warn!(poll_id = %id, error = %e, "Poll creation failed, discarding record");
            if let Err(cleanup) = self.store.delete(&record_key).await {
                tracing::error!(poll_id = %id, error = %cleanup, "Failed to discard partial poll record");
            }
            return Err(e.into());
        }

        tracing::info!(poll_id = %id, day = %day, owner = %owner, "Poll created");
        self.notifier.notify(&PollEvent::PollCreated {
            poll_id: id,
            day,
            owner_id: poll.owner_id,
            text: poll.text,
        });
        Ok(id)
    }

    async fn write_and_index(&self, record_key: &str, poll: &Poll) -> Result<(), StoreError> {
        self.store.set_fields(record_key, &record::encode(poll)).await?;
        self.store.expire(record_key, self.ttl).await?;

        let index_key = keys::today_index(poll.created_on);
        self.store
            .add_to_set(&index_key, &poll.id.to_string())
            .await?;
        self.store.expire(&index_key, self.ttl).await
    }

    /// Fetch a poll from today's partition.
    ///
    /// # Errors
    ///
    /// Returns [`PollError::PollNotFound`] if the record has no fields, and
    /// [`PollError::StoreUnavailable`] if the read fails.
    pub async fn get_poll(&self, id: PollId) -> Result<Poll, PollError> {
        let day = self.calendar.today();
        let fields = self
            .store
            .get_all_fields(&keys::poll_record(day, id))
            .await?;
        if !record::is_poll(&fields) {
            tracing::debug!(poll_id = %id, day = %day, "Poll not in today's partition");
            return Err(PollError::PollNotFound(id));
        }
        Ok(record::decode(id, day, &fields))
    }

    /// Delete a poll from today's partition. Deleting an absent poll
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`PollError::StoreUnavailable`] if the delete fails.
    pub async fn delete_poll(&self, id: PollId) -> Result<(), PollError> {
        let day = self.calendar.today();
        self.store.delete(&keys::poll_record(day, id)).await?;
        tracing::info!(poll_id = %id, day = %day, "Poll deleted");
        self.notifier
            .notify(&PollEvent::PollDeleted { poll_id: id, day });
        Ok(())
    }

    /// Every poll indexed today that still resolves, oldest first.
    ///
    /// Listing is best-effort: index members that are malformed, already
    /// deleted, or fail to load are skipped rather than failing the call.
    ///
    /// # Errors
    ///
    /// Returns [`PollError::StoreUnavailable`] only if the index itself
    /// cannot be read.
    pub async fn list_today_polls(&self) -> Result<Vec<Poll>, PollError> {
        let day = self.calendar.today();
        let members = self.store.set_members(&keys::today_index(day)).await?;

        let mut ids: Vec<PollId> = members
            .iter()
            .filter_map(|raw| match raw.parse::<PollId>() {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!(member = %raw, error = %e, "Skipping malformed index member");
                    None
                }
            })
            .collect();
        ids.sort_unstable();

        let mut polls = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_poll(id).await {
                Ok(poll) => polls.push(poll),
                Err(PollError::PollNotFound(_)) => {}
                Err(e) => {
                    tracing::warn!(poll_id = %id, error = %e, "Skipping unreadable poll in listing");
                }
            }
        }
        Ok(polls)
    }
}

fn validate(request: &NewPoll) -> Result<(), PollError> {
    for (name, value) in [
        ("text", &request.text),
        ("first_choice", &request.first_choice),
        ("second_choice", &request.second_choice),
    ] {
        if value.trim().is_empty() {
            return Err(PollError::InvalidPollRequest(format!("{name} must not be blank")));
        }
    }
    Ok(())
}
