//! Data models for study items, scheduling state and review history.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rating for how well you remembered a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rating {
    Again = 1, // Forgot
    Hard = 2,  // Difficult
    Good = 3,  // Hesitated
    Easy = 4,  // Perfect recall
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    pub fn from_key(c: char) -> Option<Self> {
        match c {
            '1' => Some(Self::Again),
            '2' => Some(Self::Hard),
            '3' => Some(Self::Good),
            '4' => Some(Self::Easy),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Again => "Again",
            Self::Hard => "Hard",
            Self::Good => "Good",
            Self::Easy => "Easy",
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            Self::Again => "Forgot",
            Self::Hard => "Difficult",
            Self::Good => "Hesitated",
            Self::Easy => "Perfect",
        }
    }
}

/// Learning phase of a card as tracked by the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardState {
    #[default]
    New,
    Learning,
    Review,
    Relearning,
}

/// Scheduling state of a study item.
///
/// Only `due` means anything outside the scheduler. Everything else is
/// owned by [`crate::scheduler::Scheduler`] implementations and is replaced
/// as a whole after every rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub(crate) due: DateTime<Utc>,
    #[serde(default)]
    pub(crate) state: CardState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) step: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) stability: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) difficulty: Option<f32>,
    #[serde(default)]
    pub(crate) reps: u32,
    #[serde(default)]
    pub(crate) lapses: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) last_review: Option<DateTime<Utc>>,
}

impl Card {
    /// A fresh card, eligible for review from `due` on.
    pub fn new(due: DateTime<Utc>) -> Self {
        Self {
            due,
            state: CardState::New,
            step: Some(0),
            stability: None,
            difficulty: None,
            reps: 0,
            lapses: 0,
            last_review: None,
        }
    }

    pub fn due(&self) -> DateTime<Utc> {
        self.due
    }

    pub fn state(&self) -> CardState {
        self.state
    }

    pub fn reps(&self) -> u32 {
        self.reps
    }

    pub fn lapses(&self) -> u32 {
        self.lapses
    }

    pub fn is_new(&self) -> bool {
        self.state == CardState::New
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due <= now
    }
}

/// A flashcard: scheduling state plus fixed question/answer content and tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyItem {
    id: String,
    pub(crate) card: Card,
    question: String,
    answer: String,
    #[serde(default)]
    tags: BTreeSet<String>,
    created_at: DateTime<Utc>,
}

impl StudyItem {
    pub fn new<I, S>(question: String, answer: String, tags: I, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            id: Uuid::new_v4().to_string()[..8].to_string(),
            card: Card::new(now),
            question,
            answer,
            tags: normalize_tags(tags),
            created_at: now,
        }
    }

    /// Same as [`StudyItem::new`] but with an explicit scheduling state.
    pub fn with_card<I, S>(card: Card, question: &str, answer: &str, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let created_at = card.due;
        let mut item = Self::new(question.to_string(), answer.to_string(), tags, created_at);
        item.card = card;
        item
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn card(&self) -> &Card {
        &self.card
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.card.is_due(now)
    }
}

/// Trim tags, drop blanks, collapse duplicates.
pub fn normalize_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Record of a single rating event. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewLog {
    rating: Rating,
    timestamp: DateTime<Utc>,
}

impl ReviewLog {
    pub fn new(rating: Rating, timestamp: DateTime<Utc>) -> Self {
        Self { rating, timestamp }
    }

    pub fn rating(&self) -> Rating {
        self.rating
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Hands out user ids. Owned by whoever creates users.
#[derive(Debug, Clone)]
pub struct IdSequence {
    next: u64,
}

impl IdSequence {
    pub fn starting_at(next: u64) -> Self {
        Self { next: next.max(1) }
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

impl Default for IdSequence {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

/// A learner and everything they own: the item collection and the full
/// review history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    id: u64,
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    items: Vec<StudyItem>,
    #[serde(default)]
    review_logs: Vec<ReviewLog>,
}

impl User {
    pub fn new(ids: &mut IdSequence, name: String, email: String) -> Self {
        Self {
            id: ids.next_id(),
            name,
            email,
            items: Vec::new(),
            review_logs: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn items(&self) -> &[StudyItem] {
        &self.items
    }

    pub fn review_logs(&self) -> &[ReviewLog] {
        &self.review_logs
    }

    pub fn item(&self, index: usize) -> Option<&StudyItem> {
        self.items.get(index)
    }

    pub(crate) fn item_mut(&mut self, index: usize) -> Option<&mut StudyItem> {
        self.items.get_mut(index)
    }

    pub(crate) fn push_log(&mut self, log: ReviewLog) {
        self.review_logs.push(log);
    }

    /// Append an item to the end of the collection. Indices of existing
    /// items never move, so open sessions stay valid.
    pub fn add_item(&mut self, item: StudyItem) -> &StudyItem {
        self.items.push(item);
        &self.items[self.items.len() - 1]
    }

    /// Replace the tag set of the item with the given id.
    pub fn retag_item<I, S>(&mut self, id: &str, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self.items.iter_mut().find(|i| i.id == id) {
            Some(item) => {
                item.tags = normalize_tags(tags);
                true
            }
            None => false,
        }
    }

    /// Remove an item. Later items shift down one index.
    pub fn remove_item(&mut self, id: &str) -> Option<StudyItem> {
        let pos = self.items.iter().position(|i| i.id == id)?;
        Some(self.items.remove(pos))
    }

    pub fn stats(&self, now: DateTime<Utc>) -> CollectionStats {
        let mut stats = CollectionStats {
            total_items: self.items.len(),
            total_reviews: self.review_logs.len(),
            ..Default::default()
        };

        for item in &self.items {
            if item.is_due(now) {
                stats.due_items += 1;
            }
            match item.card.state {
                CardState::New => stats.new_items += 1,
                CardState::Learning | CardState::Relearning => stats.learning_items += 1,
                CardState::Review => stats.review_items += 1,
            }
        }

        stats
    }
}

/// Counters for the home and study screens.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectionStats {
    pub total_items: usize,
    pub due_items: usize,
    pub new_items: usize,
    pub learning_items: usize,
    pub review_items: usize,
    pub total_reviews: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn tags_collapse_duplicates_and_blanks() {
        let now = Utc::now();
        let item = StudyItem::new(
            "Python question".into(),
            "Python answer".into(),
            ["python", "programming", "python", " coding ", ""],
            now,
        );

        let expected: BTreeSet<String> = ["coding", "programming", "python"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(item.tags(), &expected);
    }

    #[test]
    fn new_item_is_due_immediately() {
        let now = Utc::now();
        let item = StudyItem::new("Q".into(), "A".into(), Vec::<String>::new(), now);
        assert!(item.is_due(now));
        assert!(!item.is_due(now - Duration::seconds(1)));
        assert!(item.card().is_new());
        assert_eq!(item.id().len(), 8);
    }

    #[test]
    fn id_sequence_is_monotonic() {
        let mut ids = IdSequence::default();
        let a = User::new(&mut ids, "ana".into(), "ana@example.com".into());
        let b = User::new(&mut ids, "ben".into(), String::new());
        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 2);
    }

    #[test]
    fn added_items_keep_existing_indices() {
        let now = Utc::now();
        let mut user = User::new(&mut IdSequence::default(), "u".into(), String::new());
        user.add_item(StudyItem::new("first".into(), "1".into(), ["a"], now));
        user.add_item(StudyItem::new("second".into(), "2".into(), ["b"], now));
        assert_eq!(user.item(0).map(|i| i.question()), Some("first"));
        assert_eq!(user.item(1).map(|i| i.question()), Some("second"));
    }

    #[test]
    fn retag_replaces_whole_set() {
        let now = Utc::now();
        let mut user = User::new(&mut IdSequence::default(), "u".into(), String::new());
        let id = user
            .add_item(StudyItem::new("Q".into(), "A".into(), ["math"], now))
            .id()
            .to_string();

        assert!(user.retag_item(&id, ["geo", "europe"]));
        let tags: Vec<&str> = user.items()[0].tags().iter().map(|s| s.as_str()).collect();
        assert_eq!(tags, vec!["europe", "geo"]);
        assert!(!user.retag_item("missing", ["x"]));
    }

    #[test]
    fn stats_count_due_and_states() {
        let now = Utc::now();
        let mut user = User::new(&mut IdSequence::default(), "u".into(), String::new());
        user.add_item(StudyItem::new("a".into(), "a".into(), Vec::<String>::new(), now));
        let mut later = Card::new(now + Duration::days(3));
        later.state = CardState::Review;
        user.add_item(StudyItem::with_card(later, "b", "b", Vec::<String>::new()));

        let stats = user.stats(now);
        assert_eq!(stats.total_items, 2);
        assert_eq!(stats.due_items, 1);
        assert_eq!(stats.new_items, 1);
        assert_eq!(stats.review_items, 1);
    }

    #[test]
    fn user_round_trips_through_json() {
        let now = Utc::now();
        let mut user = User::new(&mut IdSequence::default(), "Ana".into(), "ana@example.com".into());
        user.add_item(StudyItem::new("¿Capital de España?".into(), "Madrid".into(), ["español"], now));
        user.push_log(ReviewLog::new(Rating::Good, now));

        let json = serde_json::to_string(&user).unwrap();
        let back: User = serde_json::from_str(&json).unwrap();
        assert_eq!(back, user);
    }
}
