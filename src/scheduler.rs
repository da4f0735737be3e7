//! Scheduling boundary and the FSRS-backed implementation.
//!
//! The review session never looks inside a [`Card`]. It hands the card and a
//! rating to a [`Scheduler`] and stores whatever comes back.
//!
//! [`FsrsScheduler`] follows the usual hybrid layout:
//! - New and learning cards walk short, minute-based learning steps
//!   (`1m, 10m` by default). Good advances a step, Again restarts, Hard
//!   repeats, Easy graduates immediately.
//! - Graduated cards use FSRS memory state for day-based intervals, capped
//!   at `maximum_interval_days`.
//! - Again on a graduated card counts a lapse and moves it to relearning
//!   steps (`10m` by default), then back to FSRS intervals.

use chrono::{DateTime, Duration, Utc};
use fsrs::{MemoryState, DEFAULT_PARAMETERS, FSRS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Card, CardState, Rating, ReviewLog};

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Scheduling algorithm failed: {0}")]
    Algorithm(String),

    #[error("Scheduler returned due date {due} before review time {now}")]
    DueInPast {
        due: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("Review log timestamp {logged} does not match review time {now}")]
    TimestampMismatch {
        logged: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("Invalid scheduler settings: {0}")]
    Settings(String),
}

/// Maps (card, rating) to the card's next state plus a log of the event.
///
/// Implementations must return a card due no earlier than `now` and a log
/// stamped exactly `now`. The session rejects anything else.
pub trait Scheduler {
    fn review(
        &self,
        card: &Card,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Result<(Card, ReviewLog), SchedulerError>;

    /// Interval label for each rating, for the rating buttons.
    fn preview_intervals(&self, card: &Card, now: DateTime<Utc>) -> [(Rating, String); 4] {
        Rating::ALL.map(|rating| {
            let label = match self.review(card, rating, now) {
                Ok((next, _)) => format_interval(next.due() - now),
                Err(_) => "?".to_string(),
            };
            (rating, label)
        })
    }
}

/// Reject scheduler output that breaks the review contract.
pub fn check_result(card: &Card, log: &ReviewLog, now: DateTime<Utc>) -> Result<(), SchedulerError> {
    if card.due() < now {
        return Err(SchedulerError::DueInPast { due: card.due(), now });
    }
    if log.timestamp() != now {
        return Err(SchedulerError::TimestampMismatch {
            logged: log.timestamp(),
            now,
        });
    }
    Ok(())
}

/// Short human label for an interval: `10m`, `4h`, `3d`, `2mo`, `1.5y`.
pub fn format_interval(interval: Duration) -> String {
    let minutes = interval.num_minutes().max(0);
    if minutes < 60 {
        format!("{}m", minutes.max(1))
    } else if minutes < 60 * 24 {
        format!("{}h", minutes / 60)
    } else {
        let days = interval.num_days();
        if days < 30 {
            format!("{}d", days)
        } else if days < 365 {
            format!("{}mo", days / 30)
        } else {
            format!("{:.1}y", days as f64 / 365.0)
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Settings
// ══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Target probability of recall at the due date.
    pub desired_retention: f32,
    pub maximum_interval_days: u32,
    pub learning_steps_minutes: Vec<u32>,
    pub relearning_steps_minutes: Vec<u32>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            desired_retention: 0.9,
            maximum_interval_days: 36500,
            learning_steps_minutes: vec![1, 10],
            relearning_steps_minutes: vec![10],
        }
    }
}

impl SchedulerSettings {
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if !(self.desired_retention > 0.0 && self.desired_retention < 1.0) {
            return Err(SchedulerError::Settings(format!(
                "desired_retention must be between 0 and 1, got {}",
                self.desired_retention
            )));
        }
        if self.maximum_interval_days == 0 {
            return Err(SchedulerError::Settings(
                "maximum_interval_days must be at least 1".to_string(),
            ));
        }
        let steps = self
            .learning_steps_minutes
            .iter()
            .chain(&self.relearning_steps_minutes);
        for &minutes in steps {
            if minutes == 0 {
                return Err(SchedulerError::Settings(
                    "learning steps must be at least one minute".to_string(),
                ));
            }
        }
        Ok(())
    }
}

// ══════════════════════════════════════════════════════════════════════════
// FSRS Scheduler
// ══════════════════════════════════════════════════════════════════════════

pub struct FsrsScheduler {
    fsrs: FSRS,
    settings: SchedulerSettings,
}

impl FsrsScheduler {
    pub fn new(settings: SchedulerSettings) -> Result<Self, SchedulerError> {
        settings.validate()?;
        let fsrs = FSRS::new(Some(&DEFAULT_PARAMETERS))
            .map_err(|e| SchedulerError::Algorithm(format!("{:?}", e)))?;
        Ok(Self { fsrs, settings })
    }

    fn graduated_interval(&self, fsrs_days: f32) -> Duration {
        let max = i64::from(self.settings.maximum_interval_days);
        Duration::days((fsrs_days.round() as i64).clamp(1, max))
    }
}

/// Delay for a Hard answer while on learning step `step`.
fn hard_delay(steps: &[u32], step: usize) -> Duration {
    let minutes = |i: usize| i64::from(steps[i]);
    if step == 0 && steps.len() >= 2 {
        Duration::seconds((minutes(0) + minutes(1)) * 30)
    } else if steps.len() == 1 {
        Duration::seconds(minutes(0) * 90)
    } else {
        Duration::minutes(minutes(step.min(steps.len() - 1)))
    }
}

impl Scheduler for FsrsScheduler {
    fn review(
        &self,
        card: &Card,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Result<(Card, ReviewLog), SchedulerError> {
        let memory = match (card.stability, card.difficulty) {
            (Some(stability), Some(difficulty)) => Some(MemoryState {
                stability,
                difficulty,
            }),
            _ => None,
        };
        let elapsed_days = card
            .last_review
            .map(|last| (now - last).num_days().max(0) as u32)
            .unwrap_or(0);

        let next_states = self
            .fsrs
            .next_states(memory, self.settings.desired_retention, elapsed_days)
            .map_err(|e| SchedulerError::Algorithm(format!("{:?}", e)))?;

        let chosen = match rating {
            Rating::Again => &next_states.again,
            Rating::Hard => &next_states.hard,
            Rating::Good => &next_states.good,
            Rating::Easy => &next_states.easy,
        };

        let mut next = card.clone();
        next.stability = Some(chosen.memory.stability);
        next.difficulty = Some(chosen.memory.difficulty);
        next.reps += 1;
        next.last_review = Some(now);

        let graduated = self.graduated_interval(chosen.interval);

        let (steps, phase) = match card.state {
            CardState::New | CardState::Learning => {
                (&self.settings.learning_steps_minutes, CardState::Learning)
            }
            CardState::Relearning => (&self.settings.relearning_steps_minutes, CardState::Relearning),
            CardState::Review => {
                if rating == Rating::Again {
                    next.lapses += 1;
                    if let Some(&first) = self.settings.relearning_steps_minutes.first() {
                        next.state = CardState::Relearning;
                        next.step = Some(0);
                        next.due = now + Duration::minutes(i64::from(first));
                        return Ok((next, ReviewLog::new(rating, now)));
                    }
                }
                next.state = CardState::Review;
                next.step = None;
                next.due = now + graduated;
                return Ok((next, ReviewLog::new(rating, now)));
            }
        };

        let step = card.step.unwrap_or(0);
        let stepped = match rating {
            _ if steps.is_empty() => None,
            Rating::Again => Some((0, Duration::minutes(i64::from(steps[0])))),
            Rating::Hard => Some((step, hard_delay(steps, step))),
            Rating::Good if step + 1 < steps.len() => {
                Some((step + 1, Duration::minutes(i64::from(steps[step + 1]))))
            }
            Rating::Good | Rating::Easy => None,
        };

        match stepped {
            Some((step, delay)) => {
                next.state = phase;
                next.step = Some(step);
                next.due = now + delay;
            }
            None => {
                next.state = CardState::Review;
                next.step = None;
                next.due = now + graduated;
            }
        }

        Ok((next, ReviewLog::new(rating, now)))
    }
}
