//! Vote counting: deduplication, tallies, and milestone reveals.
//!
//! A vote moves through these steps, all against today's partition:
//!
//! 1. Load the poll record. An absent record is [`PollError::PollNotFound`]
//!    and nothing is written.
//! 2. Check the membership set. A participant already present gets
//!    `already_voted = true` and nothing is written.
//! 3. Add the participant to the membership set. This `SADD` is the commit
//!    point: if it reports the member was already present, another request
//!    won the race and this one is a duplicate.
//! 4. Increment the chosen count and the total, either as one atomic batch
//!    or as two separate increments, then re-bound the record's lifetime.
//!    A delete racing the vote can leave a counters-only hash behind; it
//!    expires with the partition and reads as [`PollError::PollNotFound`].
//! 5. For each milestone at or below the new total, ascending, add the
//!    threshold to the revealed set. Thresholds the add reports as new are
//!    returned in `newly_revealed`.
//! 6. Re-read the counts and return them.
//!
//! All atomicity is the store's: steps 3 and 5 rely on add-if-absent and
//! step 4 on field increments. No step is retried or rolled back. A failure
//! between steps 3 and 4 leaves the participant marked as voted without a
//! counted vote.

use std::sync::Arc;
use std::time::Duration;

use daypoll_db::{KeyValueStore, StoreError};
use daypoll_types::{Choice, ParticipantId, Poll, PollEvent, PollId, Tally, VoteResult};

use crate::calendar::Calendar;
use crate::error::PollError;
use crate::keys;
use crate::notifier::Notifier;
use crate::record;
use crate::registry::DEFAULT_POLL_TTL;

/// Records votes and reports tallies.
///
/// Cloning is cheap: the store handle, calendar, and notifier are shared.
#[derive(Clone)]
pub struct VoteCounter<S> {
    store: S,
    calendar: Arc<dyn Calendar>,
    notifier: Arc<dyn Notifier>,
    ttl: Duration,
    atomic_tally: bool,
    participant_alert: Option<u64>,
}

impl<S: KeyValueStore> VoteCounter<S> {
    /// Create a counter over `store` with atomic tallies and no alert.
    pub fn new(store: S, calendar: Arc<dyn Calendar>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            calendar,
            notifier,
            ttl: DEFAULT_POLL_TTL,
            atomic_tally: true,
            participant_alert: None,
        }
    }

    /// Set the lifetime given to membership and revealed sets.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Choose between one atomic batch (`true`) and two separate
    /// increments (`false`) for the tally update.
    #[must_use]
    pub const fn with_atomic_tally(mut self, atomic: bool) -> Self {
        self.atomic_tally = atomic;
        self
    }

    /// Emit [`PollEvent::ParticipantsReached`] when a poll's total reaches
    /// `threshold`.
    #[must_use]
    pub const fn with_participant_alert(mut self, threshold: Option<u64>) -> Self {
        self.participant_alert = threshold;
        self
    }

    /// Record one participant's vote on a poll in today's partition.
    ///
    /// # Errors
    ///
    /// - [`PollError::InvalidVoteRequest`] if the participant id is blank.
    /// - [`PollError::PollNotFound`] if the poll is not in today's partition.
    /// - [`PollError::StoreUnavailable`] if any store call fails.
    pub async fn record_vote(
        &self,
        id: PollId,
        participant: &ParticipantId,
        choice: Choice,
    ) -> Result<VoteResult, PollError> {
        if participant.as_str().trim().is_empty() {
            return Err(PollError::InvalidVoteRequest(
                "participant id must not be blank".to_owned(),
            ));
        }

        let day = self.calendar.today();
        let record_key = keys::poll_record(day, id);
        let fields = self.store.get_all_fields(&record_key).await?;
        if !record::is_poll(&fields) {
            tracing::debug!(poll_id = %id, day = %day, "Vote for poll not in today's partition");
            return Err(PollError::PollNotFound(id));
        }
        let poll = record::decode(id, day, &fields);

        let membership_key = keys::membership(day, id);
        if self
            .store
            .is_member(&membership_key, participant.as_str())
            .await?
        {
            tracing::debug!(poll_id = %id, participant = %participant, "Duplicate vote ignored");
            return Ok(duplicate(id, poll.tally()));
        }
        if !self
            .store
            .add_to_set(&membership_key, participant.as_str())
            .await?
        {
            tracing::debug!(poll_id = %id, participant = %participant, "Concurrent duplicate vote ignored");
            return Ok(duplicate(id, poll.tally()));
        }

        let total = self.increment(&record_key, id, choice).await?;
        self.refresh_expiry(&record_key, id).await;
        self.refresh_expiry(&membership_key, id).await;

        let revealed = self.reveal(&poll, total).await?;
        let tally = record::decode_tally(id, &self.store.get_all_fields(&record_key).await?);

        for (threshold, follow_up) in &revealed {
            self.notifier.notify(&PollEvent::MilestoneReached {
                poll_id: id,
                threshold: *threshold,
                follow_up: follow_up.clone(),
                tally,
            });
        }
        if self.participant_alert == Some(total) {
            self.notifier.notify(&PollEvent::ParticipantsReached {
                poll_id: id,
                text: poll.text,
                first_choice: poll.first_choice,
                second_choice: poll.second_choice,
                tally,
            });
        }

        tracing::debug!(poll_id = %id, participant = %participant, total, "Vote counted");
        Ok(VoteResult {
            poll_id: id,
            already_voted: false,
            tally,
            newly_revealed: revealed.into_iter().map(|(_, follow_up)| follow_up).collect(),
        })
    }

    /// Current tally of a poll in today's partition.
    ///
    /// # Errors
    ///
    /// Returns [`PollError::PollNotFound`] if the poll is not in today's
    /// partition, and [`PollError::StoreUnavailable`] if the read fails.
    pub async fn tally(&self, id: PollId) -> Result<Tally, PollError> {
        let day = self.calendar.today();
        let fields = self
            .store
            .get_all_fields(&keys::poll_record(day, id))
            .await?;
        if !record::is_poll(&fields) {
            return Err(PollError::PollNotFound(id));
        }
        Ok(record::decode_tally(id, &fields))
    }

    /// Apply the tally update and return the new total.
    async fn increment(&self, record_key: &str, id: PollId, choice: Choice) -> Result<u64, PollError> {
        let count_field = record::count_field(choice);
        let total = if self.atomic_tally {
            let replies = self
                .store
                .increment_fields(record_key, &[count_field, record::TOTAL_PARTICIPANTS])
                .await?;
            replies.get(1).copied().ok_or_else(|| {
                StoreError::unavailable("multi/hincrby", "batch reply is missing the total")
            })?
        } else {
            self.store.increment_field(record_key, count_field).await?;
            self.store
                .increment_field(record_key, record::TOTAL_PARTICIPANTS)
                .await?
        };
        Ok(record::reply_to_count(id, record::TOTAL_PARTICIPANTS, total))
    }

    /// Mark every milestone at or below `total` as revealed and return the
    /// ones this call revealed first, ascending.
    async fn reveal(&self, poll: &Poll, total: u64) -> Result<Vec<(u64, String)>, PollError> {
        let revealed_key = keys::revealed(poll.id);
        let mut revealed = Vec::new();
        for (threshold, follow_up) in poll.milestones.reached(total) {
            if self
                .store
                .add_to_set(&revealed_key, &threshold.to_string())
                .await?
            {
                tracing::info!(poll_id = %poll.id, threshold, total, "Milestone revealed");
                revealed.push((threshold, follow_up.to_owned()));
            }
        }
        if !revealed.is_empty() {
            self.refresh_expiry(&revealed_key, poll.id).await;
        }
        Ok(revealed)
    }

    /// Bound a key's lifetime. The vote is already counted, so failure is
    /// logged rather than returned.
    async fn refresh_expiry(&self, key: &str, id: PollId) {
        if let Err(e) = self.store.expire(key, self.ttl).await {
            tracing::warn!(poll_id = %id, key, error = %e, "Failed to set expiry");
        }
    }
}

const fn duplicate(poll_id: PollId, tally: Tally) -> VoteResult {
    VoteResult {
        poll_id,
        already_voted: true,
        tally,
        newly_revealed: Vec::new(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::NaiveDate;
    use daypoll_db::MemoryStore;
    use daypoll_types::NewPoll;

    use super::*;
    use crate::calendar::FixedCalendar;
    use crate::registry::PollRegistry;
    use crate::testing::{FailingStore, RecordingNotifier};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 15).unwrap()
    }

    struct Fixture<S> {
        registry: PollRegistry<S>,
        counter: VoteCounter<S>,
        calendar: Arc<FixedCalendar>,
        notifier: Arc<RecordingNotifier>,
    }

    fn fixture<S: KeyValueStore>(store: S) -> Fixture<S> {
        let calendar = Arc::new(FixedCalendar::new(day()));
        let notifier = Arc::new(RecordingNotifier::default());
        Fixture {
            registry: PollRegistry::new(store.clone(), calendar.clone(), notifier.clone()),
            counter: VoteCounter::new(store, calendar.clone(), notifier.clone()),
            calendar,
            notifier,
        }
    }

    async fn poll_with<S: KeyValueStore>(f: &Fixture<S>, milestones: &str) -> PollId {
        let request = NewPoll {
            text: "Tea or coffee?".to_owned(),
            first_choice: "tea".to_owned(),
            second_choice: "coffee".to_owned(),
            milestones: milestones.parse().unwrap(),
            ..NewPoll::default()
        };
        f.registry
            .create_poll(request, &ParticipantId::new("owner"))
            .await
            .unwrap()
    }

    fn voter(n: usize) -> ParticipantId {
        ParticipantId::new(format!("voter-{n}"))
    }

    const fn tally(first: u64, second: u64, total: u64) -> Tally {
        Tally {
            first_choice_count: first,
            second_choice_count: second,
            total_participants: total,
        }
    }

    #[tokio::test]
    async fn second_vote_is_deduplicated() {
        let f = fixture(MemoryStore::new());
        let id = poll_with(&f, "").await;
        let alice = ParticipantId::new("alice");

        let first = f.counter.record_vote(id, &alice, Choice::First).await.unwrap();
        assert!(!first.already_voted);
        assert_eq!(first.tally, tally(1, 0, 1));

        let second = f.counter.record_vote(id, &alice, Choice::Second).await.unwrap();
        assert!(second.already_voted);
        assert_eq!(second.tally, first.tally);
        assert!(second.newly_revealed.is_empty());
        assert_eq!(f.counter.tally(id).await.unwrap(), tally(1, 0, 1));
    }

    #[tokio::test]
    async fn milestones_reveal_once_in_order() {
        let f = fixture(MemoryStore::new());
        let id = poll_with(&f, "2:followA,4:followB").await;

        let mut reveals = Vec::new();
        for n in 0..3 {
            let result = f.counter.record_vote(id, &voter(n), Choice::First).await.unwrap();
            reveals.push(result.newly_revealed);
        }
        assert_eq!(reveals[0], Vec::<String>::new());
        assert_eq!(reveals[1], vec!["followA"]);
        assert_eq!(reveals[2], Vec::<String>::new());
        assert_eq!(f.counter.tally(id).await.unwrap(), tally(3, 0, 3));

        let fourth = f.counter.record_vote(id, &voter(3), Choice::First).await.unwrap();
        assert_eq!(fourth.newly_revealed, vec!["followB"]);
        assert_eq!(fourth.tally, tally(4, 0, 4));

        let fifth = f.counter.record_vote(id, &voter(4), Choice::Second).await.unwrap();
        assert!(fifth.newly_revealed.is_empty());
        assert_eq!(f.notifier.count("milestone_reached"), 2);
    }

    #[tokio::test]
    async fn one_vote_can_cross_several_thresholds() {
        let store = MemoryStore::new();
        let f = fixture(store.clone());
        let id = poll_with(&f, "2:followA,4:followB,9:followC").await;
        let key = keys::poll_record(day(), id);
        store
            .set_fields(
                &key,
                &[
                    (record::FIRST_CHOICE_COUNT, "5".to_owned()),
                    (record::TOTAL_PARTICIPANTS, "5".to_owned()),
                ],
            )
            .await
            .unwrap();

        let result = f.counter.record_vote(id, &voter(0), Choice::First).await.unwrap();
        assert_eq!(result.newly_revealed, vec!["followA", "followB"]);
        assert_eq!(result.tally, tally(6, 0, 6));
    }

    #[tokio::test]
    async fn counts_are_conserved_on_both_tally_paths() {
        for atomic in [true, false] {
            let f = fixture(MemoryStore::new());
            let counter = f.counter.clone().with_atomic_tally(atomic);
            let id = poll_with(&f, "").await;
            for n in 0..25 {
                let choice = Choice::from_flag(n % 3 == 0);
                let result = counter.record_vote(id, &voter(n), choice).await.unwrap();
                assert!(result.tally.is_conserved());
            }
            let final_tally = counter.tally(id).await.unwrap();
            assert_eq!(final_tally, tally(9, 16, 25));
        }
    }

    #[tokio::test]
    async fn voting_on_unknown_poll_writes_nothing() {
        let store = MemoryStore::new();
        let f = fixture(store.clone());
        let id = PollId::new();

        let result = f.counter.record_vote(id, &voter(0), Choice::First).await;
        assert!(matches!(result, Err(PollError::PollNotFound(missing)) if missing == id));
        assert!(store.is_empty().await);
        assert!(matches!(f.counter.tally(id).await, Err(PollError::PollNotFound(_))));
    }

    #[tokio::test]
    async fn yesterday_poll_cannot_be_voted_on() {
        let f = fixture(MemoryStore::new());
        let id = poll_with(&f, "").await;
        assert!(f.calendar.advance_days(1));

        let result = f.counter.record_vote(id, &voter(0), Choice::First).await;
        assert!(matches!(result, Err(PollError::PollNotFound(_))));
    }

    #[tokio::test]
    async fn blank_participant_is_invalid() {
        let f = fixture(MemoryStore::new());
        let id = poll_with(&f, "").await;
        let result = f
            .counter
            .record_vote(id, &ParticipantId::new("   "), Choice::First)
            .await;
        assert!(matches!(result, Err(PollError::InvalidVoteRequest(_))));
    }

    #[tokio::test]
    async fn store_failures_propagate_unchanged() {
        let store = FailingStore::new(MemoryStore::new());
        let f = fixture(store.clone());
        let id = poll_with(&f, "").await;

        store.fail("is_member", "voted:");
        let result = f.counter.record_vote(id, &voter(0), Choice::First).await;
        assert!(matches!(
            result,
            Err(PollError::StoreUnavailable(StoreError::Unavailable { operation: "is_member", .. }))
        ));
        store.heal();
        assert_eq!(f.counter.tally(id).await.unwrap(), tally(0, 0, 0));
    }

    #[tokio::test]
    async fn failed_increment_is_not_retried() {
        let store = FailingStore::new(MemoryStore::new());
        let f = fixture(store.clone());
        let id = poll_with(&f, "").await;

        store.fail("increment_fields", "poll:");
        let result = f.counter.record_vote(id, &voter(0), Choice::First).await;
        assert!(matches!(result, Err(PollError::StoreUnavailable(_))));

        // The membership commit already happened; the vote stays lost.
        store.heal();
        let retry = f.counter.record_vote(id, &voter(0), Choice::First).await.unwrap();
        assert!(retry.already_voted);
        assert_eq!(f.counter.tally(id).await.unwrap(), tally(0, 0, 0));
    }

    #[tokio::test]
    async fn participant_alert_fires_exactly_once() {
        let f = fixture(MemoryStore::new());
        let counter = f.counter.clone().with_participant_alert(Some(2));
        let id = poll_with(&f, "").await;

        for n in 0..5 {
            counter.record_vote(id, &voter(n), Choice::First).await.unwrap();
        }
        counter.record_vote(id, &voter(0), Choice::First).await.unwrap();

        let alerts: Vec<_> = f
            .notifier
            .events()
            .into_iter()
            .filter(|e| matches!(e, PollEvent::ParticipantsReached { .. }))
            .collect();
        assert_eq!(alerts.len(), 1);
        assert!(matches!(
            &alerts[0],
            PollEvent::ParticipantsReached { poll_id, tally: t, .. }
                if *poll_id == id && t.total_participants == 2
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn vote_sets_expire_with_the_poll() {
        let store = MemoryStore::new();
        let f = fixture(store.clone());
        let id = poll_with(&f, "1:first").await;
        f.counter.record_vote(id, &voter(0), Choice::First).await.unwrap();

        assert!(store.ttl(&keys::membership(day(), id)).await.is_some());
        assert!(store.ttl(&keys::revealed(id)).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn vote_racing_a_delete_does_not_resurrect_the_poll() {
        let inner = MemoryStore::new();
        let store = FailingStore::new(inner.clone());
        let f = fixture(store.clone());
        let id = poll_with(&f, "").await;
        let record_key = keys::poll_record(day(), id);
        store.delete_after_add("voted:", &record_key);

        let result = f.counter.record_vote(id, &voter(0), Choice::First).await.unwrap();
        assert!(!result.already_voted);

        assert!(matches!(
            f.registry.get_poll(id).await,
            Err(PollError::PollNotFound(_))
        ));
        assert!(matches!(
            f.counter.tally(id).await,
            Err(PollError::PollNotFound(_))
        ));
        assert!(f.registry.list_today_polls().await.unwrap().is_empty());
        assert!(inner.ttl(&record_key).await.is_some());

        tokio::time::advance(DEFAULT_POLL_TTL).await;
        assert!(inner.get_all_fields(&record_key).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicates_count_once() {
        let f = fixture(MemoryStore::new());
        let id = poll_with(&f, "1:first").await;
        let alice = ParticipantId::new("alice");

        let mut handles = Vec::new();
        for _ in 0..32 {
            let counter = f.counter.clone();
            let alice = alice.clone();
            handles.push(tokio::spawn(async move {
                counter.record_vote(id, &alice, Choice::First).await
            }));
        }
        let mut counted = 0_usize;
        let mut revealed = Vec::new();
        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            if !result.already_voted {
                counted = counted.saturating_add(1);
            }
            revealed.extend(result.newly_revealed);
        }

        assert_eq!(counted, 1);
        assert_eq!(revealed, vec!["first"]);
        assert_eq!(f.counter.tally(id).await.unwrap(), tally(1, 0, 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_voters_reveal_each_threshold_once() {
        let f = fixture(MemoryStore::new());
        let id = poll_with(&f, "5:five,10:ten,40:forty,100:hundred").await;

        let mut handles = Vec::new();
        for n in 0..60 {
            let counter = f.counter.clone();
            handles.push(tokio::spawn(async move {
                counter
                    .record_vote(id, &voter(n), Choice::from_flag(n % 2 == 0))
                    .await
            }));
        }
        let mut revealed = Vec::new();
        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            assert!(!result.already_voted);
            revealed.extend(result.newly_revealed);
        }
        revealed.sort();

        assert_eq!(revealed, vec!["five", "forty", "ten"]);
        let final_tally = f.counter.tally(id).await.unwrap();
        assert_eq!(final_tally, tally(30, 30, 60));
        assert!(final_tally.is_conserved());
    }

    #[tokio::test]
    async fn interleaving_does_not_change_revealed_set() {
        let store = MemoryStore::new();
        let f = fixture(store.clone());
        let forward = poll_with(&f, "2:a,3:b,5:c").await;
        let backward = poll_with(&f, "2:a,3:b,5:c").await;

        for n in 0..6 {
            f.counter
                .record_vote(forward, &voter(n), Choice::from_flag(n < 3))
                .await
                .unwrap();
        }
        for n in (0..6).rev() {
            f.counter
                .record_vote(backward, &voter(n), Choice::from_flag(n >= 3))
                .await
                .unwrap();
        }

        let revealed = |id| {
            let store = store.clone();
            async move {
                store
                    .set_members(&keys::revealed(id))
                    .await
                    .unwrap()
                    .into_iter()
                    .collect::<BTreeSet<_>>()
            }
        };
        assert_eq!(revealed(forward).await, revealed(backward).await);
        assert_eq!(revealed(forward).await.len(), 3);
    }
}
