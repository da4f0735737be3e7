//! TUI module for the study application.

mod app;
pub mod theme;
mod widgets;

pub use app::{App, Screen};
pub use theme::Theme;
