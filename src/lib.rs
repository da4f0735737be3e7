//! Emphizor - spaced repetition flashcards.
//!
//! The review engine lives in [`selector`] (which items are due) and
//! [`session`] (the reveal/rate cycle). Scheduling and persistence sit
//! behind the [`scheduler::Scheduler`] and [`storage::UserStore`] traits.

pub mod clock;
pub mod config;
pub mod models;
pub mod scheduler;
pub mod selector;
pub mod session;
pub mod storage;
pub mod ui;
