//! Review session: one reveal/rate pass over a fixed set of due items.
//!
//! A session refers to items by their index in the user's collection and
//! borrows the user only for the duration of each transition. Ratings
//! therefore land directly on the user's own cards.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::clock::Clock;
use crate::models::{Rating, ReviewLog, StudyItem, User};
use crate::scheduler::{check_result, Scheduler, SchedulerError};
use crate::selector::select_due;
use crate::storage::{StorageError, UserStore};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Reveal the answer before rating")]
    NotRevealed,

    #[error("Session is already finished")]
    Finished,

    #[error("Item {0} is no longer in the collection")]
    MissingItem(String),

    #[error("Failed to rate card: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Failed to save progress: {0}")]
    Persistence(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Question shown, answer hidden.
    Unrevealed,
    /// Answer and rating controls shown.
    Revealed,
    Terminal,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Saved { reviewed: usize },
    NothingReviewed,
}

/// Result of a successful rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Next,
    Finished(Completion),
}

/// The collaborators a session talks to.
pub struct StudyContext<'a> {
    pub scheduler: &'a dyn Scheduler,
    pub store: &'a dyn UserStore,
    pub clock: &'a dyn Clock,
}

/// A reviewed item: where it was when the session opened, and its id.
#[derive(Debug, Clone)]
struct Slot {
    index: usize,
    id: String,
}

impl Slot {
    /// Current collection index of the item, following it if earlier items were removed.
    fn locate(&self, user: &User) -> Option<usize> {
        match user.item(self.index) {
            Some(item) if item.id() == self.id => Some(self.index),
            _ => user.items().iter().position(|item| item.id() == self.id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReviewSession {
    items: Vec<Slot>,
    position: usize,
    revealed: bool,
    finished: bool,
    session_logs: Vec<ReviewLog>,
    completion: Option<Completion>,
    started_at: DateTime<Utc>,
}

#[allow(clippy::len_without_is_empty)]
impl ReviewSession {
    /// Select the due items in scope and open a session over them.
    /// `None` means nothing is due; that is not an error.
    pub fn start(user: &User, scope: &BTreeSet<String>, now: DateTime<Utc>) -> Option<Self> {
        let session = Self::over(user, select_due(user.items(), now, scope), now);
        match &session {
            Some(s) => tracing::info!(user = user.id(), due = s.len(), "started review session"),
            None => tracing::info!(user = user.id(), "no items due in scope"),
        }
        session
    }

    /// Open a session over the given collection indices, in order.
    /// Indices with no item behind them are skipped.
    pub fn over(user: &User, indices: Vec<usize>, now: DateTime<Utc>) -> Option<Self> {
        let items: Vec<Slot> = indices
            .into_iter()
            .filter_map(|index| {
                user.item(index).map(|item| Slot {
                    index,
                    id: item.id().to_string(),
                })
            })
            .collect();
        if items.is_empty() {
            return None;
        }
        Some(Self {
            items,
            position: 0,
            revealed: false,
            finished: false,
            session_logs: Vec::new(),
            completion: None,
            started_at: now,
        })
    }

    pub fn state(&self) -> SessionState {
        if self.finished {
            SessionState::Terminal
        } else if self.revealed {
            SessionState::Revealed
        } else {
            SessionState::Unrevealed
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn reviewed_count(&self) -> usize {
        self.session_logs.len()
    }

    pub fn session_logs(&self) -> &[ReviewLog] {
        &self.session_logs
    }

    pub fn completion(&self) -> Option<Completion> {
        self.completion
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    fn current_slot(&self) -> Option<&Slot> {
        if self.finished {
            None
        } else {
            self.items.get(self.position)
        }
    }

    pub fn current<'u>(&self, user: &'u User) -> Option<&'u StudyItem> {
        self.current_slot()
            .and_then(|slot| slot.locate(user))
            .and_then(|i| user.item(i))
    }

    /// Interval labels for rating the current item, without rating it.
    pub fn preview(
        &self,
        user: &User,
        scheduler: &dyn Scheduler,
        now: DateTime<Utc>,
    ) -> Option<[(Rating, String); 4]> {
        self.current(user)
            .map(|item| scheduler.preview_intervals(item.card(), now))
    }

    /// Show the answer. Repeating it is harmless.
    pub fn reveal(&mut self) -> Result<(), SessionError> {
        if self.finished {
            return Err(SessionError::Finished);
        }
        self.revealed = true;
        Ok(())
    }

    /// Rate the current item and move on.
    ///
    /// If the scheduler fails nothing changes and the item can be rated
    /// again. Rating the last item finishes the session, which saves the
    /// user; a failed save is returned as [`SessionError::Persistence`]
    /// but the rating itself stays applied.
    pub fn rate(
        &mut self,
        user: &mut User,
        ctx: &StudyContext<'_>,
        rating: Rating,
    ) -> Result<Progress, SessionError> {
        if self.finished {
            return Err(SessionError::Finished);
        }
        if !self.revealed {
            return Err(SessionError::NotRevealed);
        }

        let slot = &self.items[self.position];
        let now = ctx.clock.now();
        let item = slot
            .locate(user)
            .and_then(|i| user.item_mut(i))
            .ok_or_else(|| SessionError::MissingItem(slot.id.clone()))?;

        let (card, log) = ctx.scheduler.review(&item.card, rating, now).map_err(|e| {
            tracing::warn!(item = item.id(), ?rating, "scheduler failed: {}", e);
            e
        })?;
        check_result(&card, &log, now)?;

        tracing::debug!(item = item.id(), ?rating, due = %card.due(), "rated item");
        item.card = card;
        user.push_log(log.clone());
        self.session_logs.push(log);
        self.position += 1;
        self.revealed = false;

        if self.position == self.items.len() {
            self.finish(user, ctx.store).map(Progress::Finished)
        } else {
            Ok(Progress::Next)
        }
    }

    /// Stop before the end. Items not yet reached are left untouched.
    pub fn finish_early(
        &mut self,
        user: &User,
        store: &dyn UserStore,
    ) -> Result<Completion, SessionError> {
        if self.finished {
            return Err(SessionError::Finished);
        }
        tracing::info!(
            user = user.id(),
            position = self.position,
            total = self.items.len(),
            "finishing session early"
        );
        self.finish(user, store)
    }

    fn finish(&mut self, user: &User, store: &dyn UserStore) -> Result<Completion, SessionError> {
        self.finished = true;
        self.revealed = false;

        let reviewed = self.reviewed_count();
        if reviewed == 0 {
            tracing::info!(user = user.id(), "session ended, nothing reviewed");
            self.completion = Some(Completion::NothingReviewed);
            return Ok(Completion::NothingReviewed);
        }

        if let Err(e) = store.save(user) {
            tracing::error!(user = user.id(), reviewed, "failed to save session: {}", e);
            return Err(e.into());
        }

        tracing::info!(user = user.id(), reviewed, "session saved");
        let completion = Completion::Saved { reviewed };
        self.completion = Some(completion);
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{Card, IdSequence};
    use crate::scheduler::{FsrsScheduler, SchedulerSettings};
    use crate::storage::{self, JsonUserStore};
    use chrono::Duration;
    use std::cell::{Cell, RefCell};

    /// Pushes every card one day out.
    #[derive(Default)]
    struct FakeScheduler {
        fail: Cell<bool>,
        past_due: Cell<bool>,
        calls: Cell<usize>,
    }

    impl Scheduler for FakeScheduler {
        fn review(
            &self,
            card: &Card,
            rating: Rating,
            now: DateTime<Utc>,
        ) -> Result<(Card, ReviewLog), SchedulerError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail.get() {
                return Err(SchedulerError::Algorithm("boom".into()));
            }
            let mut next = card.clone();
            next.reps += 1;
            next.due = if self.past_due.get() {
                now - Duration::hours(1)
            } else {
                now + Duration::days(1)
            };
            Ok((next, ReviewLog::new(rating, now)))
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        saved: RefCell<Vec<User>>,
        fail: Cell<bool>,
    }

    impl UserStore for RecordingStore {
        fn save(&self, user: &User) -> storage::Result<()> {
            if self.fail.get() {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            self.saved.borrow_mut().push(user.clone());
            Ok(())
        }
    }

    struct Fixture {
        user: User,
        scheduler: FakeScheduler,
        store: RecordingStore,
        clock: FixedClock,
        now: DateTime<Utc>,
    }

    impl Fixture {
        /// Items A (due yesterday, untagged), B (due yesterday, math),
        /// C (due tomorrow, untagged).
        fn new() -> Self {
            let now = Utc::now();
            let mut user = User::new(&mut IdSequence::default(), "tester".into(), String::new());
            let yesterday = now - Duration::days(1);
            let tomorrow = now + Duration::days(1);
            user.add_item(StudyItem::with_card(Card::new(yesterday), "A", "a", Vec::<&str>::new()));
            user.add_item(StudyItem::with_card(Card::new(yesterday), "B", "b", ["math"]));
            user.add_item(StudyItem::with_card(Card::new(tomorrow), "C", "c", Vec::<&str>::new()));

            Self {
                user,
                scheduler: FakeScheduler::default(),
                store: RecordingStore::default(),
                clock: FixedClock::new(now),
                now,
            }
        }

        fn ctx(&self) -> StudyContext<'_> {
            StudyContext {
                scheduler: &self.scheduler,
                store: &self.store,
                clock: &self.clock,
            }
        }

        fn rate(&mut self, session: &mut ReviewSession, rating: Rating) -> Result<Progress, SessionError> {
            let ctx = StudyContext {
                scheduler: &self.scheduler,
                store: &self.store,
                clock: &self.clock,
            };
            session.rate(&mut self.user, &ctx, rating)
        }

        fn saves(&self) -> usize {
            self.store.saved.borrow().len()
        }
    }

    fn assert_coherent(session: &ReviewSession) {
        assert_eq!(session.reviewed_count(), session.session_logs().len());
        assert!(session.position() <= session.len());
    }

    #[test]
    fn start_selects_due_items_in_scope() {
        let fx = Fixture::new();
        let session = ReviewSession::start(&fx.user, &BTreeSet::new(), fx.now).unwrap();
        assert_eq!(session.len(), 1);
        assert_eq!(session.current(&fx.user).map(|i| i.question()), Some("A"));
        assert_eq!(session.state(), SessionState::Unrevealed);
    }

    #[test]
    fn start_with_nothing_due_returns_none() {
        let fx = Fixture::new();
        let past = fx.now - Duration::days(30);
        assert!(ReviewSession::start(&fx.user, &BTreeSet::new(), past).is_none());
        assert!(ReviewSession::over(&fx.user, Vec::new(), fx.now).is_none());
    }

    #[test]
    fn rating_the_only_item_finishes_and_saves_once() {
        let mut fx = Fixture::new();
        let mut session = ReviewSession::over(&fx.user, vec![0], fx.now).unwrap();

        session.reveal().unwrap();
        let progress = fx.rate(&mut session, Rating::Good).unwrap();

        assert_eq!(progress, Progress::Finished(Completion::Saved { reviewed: 1 }));
        assert_eq!(session.position(), 1);
        assert_eq!(session.reviewed_count(), 1);
        assert_eq!(session.state(), SessionState::Terminal);
        assert_eq!(session.completion(), Some(Completion::Saved { reviewed: 1 }));
        assert_eq!(fx.saves(), 1);

        // the saved snapshot is the whole user, including the new card and log
        let saved = &fx.store.saved.borrow()[0];
        assert_eq!(saved.items().len(), 3);
        assert_eq!(saved.review_logs().len(), 1);
        assert_eq!(saved.items()[0].card().due(), fx.now + Duration::days(1));
    }

    #[test]
    fn finishing_early_without_ratings_saves_nothing() {
        let fx = Fixture::new();
        let before = fx.user.clone();
        let mut session = ReviewSession::over(&fx.user, vec![0, 2], fx.now).unwrap();

        let completion = session.finish_early(&fx.user, &fx.store).unwrap();

        assert_eq!(completion, Completion::NothingReviewed);
        assert_eq!(session.reviewed_count(), 0);
        assert_eq!(session.state(), SessionState::Terminal);
        assert_eq!(fx.saves(), 0);
        assert_eq!(fx.user, before);
    }

    #[test]
    fn rating_before_reveal_is_rejected() {
        let mut fx = Fixture::new();
        let before = fx.user.clone();
        let mut session = ReviewSession::over(&fx.user, vec![0], fx.now).unwrap();

        let err = fx.rate(&mut session, Rating::Good).unwrap_err();

        assert!(matches!(err, SessionError::NotRevealed));
        assert_eq!(session.position(), 0);
        assert_eq!(session.reviewed_count(), 0);
        assert_eq!(session.state(), SessionState::Unrevealed);
        assert_eq!(fx.scheduler.calls.get(), 0);
        assert_eq!(fx.user, before);
    }

    #[test]
    fn reveal_is_idempotent() {
        let fx = Fixture::new();
        let mut session = ReviewSession::over(&fx.user, vec![0, 1], fx.now).unwrap();
        session.reveal().unwrap();
        session.reveal().unwrap();
        assert_eq!(session.state(), SessionState::Revealed);
        assert_eq!(session.position(), 0);
    }

    #[test]
    fn each_rating_advances_by_one_and_hides_answer() {
        let mut fx = Fixture::new();
        let mut session = ReviewSession::over(&fx.user, vec![0, 1, 2], fx.now).unwrap();

        for expected in 1..=2 {
            session.reveal().unwrap();
            assert_eq!(fx.rate(&mut session, Rating::Hard).unwrap(), Progress::Next);
            assert_eq!(session.position(), expected);
            assert_eq!(session.reviewed_count(), expected);
            assert_eq!(session.state(), SessionState::Unrevealed);
            assert_coherent(&session);
        }
        assert_eq!(fx.user.review_logs().len(), 2);
        assert_eq!(fx.saves(), 0);

        session.reveal().unwrap();
        let progress = fx.rate(&mut session, Rating::Easy).unwrap();
        assert_eq!(progress, Progress::Finished(Completion::Saved { reviewed: 3 }));
        assert_coherent(&session);
        assert_eq!(fx.saves(), 1);
    }

    #[test]
    fn scheduler_failure_leaves_everything_unchanged() {
        let mut fx = Fixture::new();
        let before = fx.user.clone();
        let mut session = ReviewSession::over(&fx.user, vec![0, 1], fx.now).unwrap();
        session.reveal().unwrap();

        fx.scheduler.fail.set(true);
        let err = fx.rate(&mut session, Rating::Good).unwrap_err();

        assert!(matches!(err, SessionError::Scheduler(_)));
        assert_eq!(session.position(), 0);
        assert_eq!(session.reviewed_count(), 0);
        assert_eq!(session.state(), SessionState::Revealed);
        assert_eq!(fx.user, before);

        // retry once the scheduler recovers
        fx.scheduler.fail.set(false);
        assert_eq!(fx.rate(&mut session, Rating::Good).unwrap(), Progress::Next);
        assert_eq!(session.reviewed_count(), 1);
    }

    #[test]
    fn past_due_result_is_rejected() {
        let mut fx = Fixture::new();
        let before = fx.user.clone();
        let mut session = ReviewSession::over(&fx.user, vec![0], fx.now).unwrap();
        session.reveal().unwrap();

        fx.scheduler.past_due.set(true);
        let err = fx.rate(&mut session, Rating::Again).unwrap_err();

        assert!(matches!(err, SessionError::Scheduler(SchedulerError::DueInPast { .. })));
        assert_eq!(session.state(), SessionState::Revealed);
        assert_eq!(fx.user, before);
    }

    #[test]
    fn finishing_early_keeps_unreached_items_untouched() {
        let mut fx = Fixture::new();
        let mut session = ReviewSession::over(&fx.user, vec![0, 1, 2], fx.now).unwrap();
        session.reveal().unwrap();
        fx.rate(&mut session, Rating::Good).unwrap();
        session.reveal().unwrap();

        let unreached_b = fx.user.items()[1].clone();
        let unreached_c = fx.user.items()[2].clone();
        let completion = session.finish_early(&fx.user, &fx.store).unwrap();

        assert_eq!(completion, Completion::Saved { reviewed: 1 });
        assert_eq!(fx.user.items()[1], unreached_b);
        assert_eq!(fx.user.items()[2], unreached_c);
        assert_eq!(fx.saves(), 1);
    }

    #[test]
    fn terminal_session_rejects_further_transitions() {
        let mut fx = Fixture::new();
        let mut session = ReviewSession::over(&fx.user, vec![0], fx.now).unwrap();
        session.finish_early(&fx.user, &fx.store).unwrap();

        assert!(matches!(session.reveal(), Err(SessionError::Finished)));
        assert!(matches!(fx.rate(&mut session, Rating::Good), Err(SessionError::Finished)));
        assert!(matches!(
            session.finish_early(&fx.user, &fx.store),
            Err(SessionError::Finished)
        ));
        assert!(session.current(&fx.user).is_none());
    }

    #[test]
    fn save_failure_keeps_ratings_in_memory() {
        let mut fx = Fixture::new();
        fx.store.fail.set(true);
        let mut session = ReviewSession::over(&fx.user, vec![0], fx.now).unwrap();
        session.reveal().unwrap();

        let err = fx.rate(&mut session, Rating::Good).unwrap_err();

        assert!(matches!(err, SessionError::Persistence(_)));
        assert_eq!(session.state(), SessionState::Terminal);
        assert_eq!(session.completion(), None);
        assert_eq!(fx.user.items()[0].card().due(), fx.now + Duration::days(1));
        assert_eq!(fx.user.review_logs().len(), 1);

        // a later save picks the ratings up
        fx.store.fail.set(false);
        fx.store.save(&fx.user).unwrap();
        assert_eq!(fx.store.saved.borrow()[0].review_logs().len(), 1);
    }

    #[test]
    fn items_added_mid_session_are_not_picked_up() {
        let mut fx = Fixture::new();
        let mut session = ReviewSession::start(&fx.user, &BTreeSet::new(), fx.now).unwrap();
        fx.user.add_item(StudyItem::new("new".into(), "n".into(), Vec::<&str>::new(), fx.now));

        assert_eq!(session.len(), 1);
        session.reveal().unwrap();
        assert!(matches!(
            fx.rate(&mut session, Rating::Good).unwrap(),
            Progress::Finished(_)
        ));
        assert!(fx.user.items()[3].card().is_new());
    }

    #[test]
    fn removed_item_is_reported_without_changes() {
        let mut fx = Fixture::new();
        let mut session = ReviewSession::over(&fx.user, vec![0], fx.now).unwrap();
        let id = fx.user.items()[0].id().to_string();
        fx.user.remove_item(&id);

        session.reveal().unwrap();
        assert!(matches!(
            fx.rate(&mut session, Rating::Good),
            Err(SessionError::MissingItem(missing)) if missing == id
        ));
        assert_eq!(session.state(), SessionState::Revealed);
        assert!(fx.user.review_logs().is_empty());
    }

    #[test]
    fn ratings_follow_items_shifted_by_a_removal() {
        let mut fx = Fixture::new();
        let mut session = ReviewSession::over(&fx.user, vec![1, 2], fx.now).unwrap();
        let first = fx.user.items()[0].id().to_string();
        fx.user.remove_item(&first);

        // B moved from index 1 to 0 and C from 2 to 1
        assert_eq!(session.current(&fx.user).map(|i| i.question()), Some("B"));
        session.reveal().unwrap();
        fx.rate(&mut session, Rating::Good).unwrap();

        assert_eq!(fx.user.items()[0].card().reps(), 1);
        assert_eq!(fx.user.items()[1].card().reps(), 0);
        assert_eq!(session.current(&fx.user).map(|i| i.question()), Some("C"));
    }

    #[test]
    fn indices_without_items_are_skipped() {
        let fx = Fixture::new();
        assert!(ReviewSession::over(&fx.user, vec![5], fx.now).is_none());
        assert_eq!(ReviewSession::over(&fx.user, vec![5, 0], fx.now).unwrap().len(), 1);
    }

    #[test]
    fn logs_use_clock_time() {
        let mut fx = Fixture::new();
        let mut session = ReviewSession::over(&fx.user, vec![0, 1], fx.now).unwrap();
        fx.clock.advance(Duration::minutes(5));
        session.reveal().unwrap();
        fx.rate(&mut session, Rating::Again).unwrap();

        let log = &session.session_logs()[0];
        assert_eq!(log.timestamp(), fx.now + Duration::minutes(5));
        assert_eq!(log.rating(), Rating::Again);
        assert_eq!(fx.user.review_logs(), session.session_logs());
    }

    #[test]
    fn preview_covers_current_item() {
        let fx = Fixture::new();
        let session = ReviewSession::over(&fx.user, vec![0], fx.now).unwrap();
        let preview = session.preview(&fx.user, fx.ctx().scheduler, fx.now).unwrap();
        assert!(preview.iter().all(|(_, label)| label == "1d"));
    }

    #[test]
    fn full_session_with_fsrs_and_json_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = JsonUserStore::new(dir.path().to_path_buf()).unwrap();
        let scheduler = FsrsScheduler::new(SchedulerSettings::default()).unwrap();
        let fx = Fixture::new();
        let mut user = fx.user.clone();
        let ctx = StudyContext {
            scheduler: &scheduler,
            store: &store,
            clock: &fx.clock,
        };

        let scope: BTreeSet<String> = ["math".to_string()].into_iter().collect();
        let mut session = ReviewSession::start(&user, &scope, fx.now).unwrap();
        assert_eq!(session.len(), 2);

        while !session.is_finished() {
            session.reveal().unwrap();
            session.rate(&mut user, &ctx, Rating::Good).unwrap();
        }

        let reloaded = store.load_user(user.id()).unwrap().unwrap();
        assert_eq!(reloaded, user);
        assert_eq!(reloaded.review_logs().len(), 2);
        assert!(reloaded.items()[0].card().due() > fx.now);
        assert!(ReviewSession::start(&reloaded, &scope, fx.now).is_none());
    }
}
