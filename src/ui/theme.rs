//! Colors and text styles for the TUI.

use ratatui::style::{Color, Modifier, Style};

use crate::models::{CardState, Rating};

/// The one palette the app ships with.
#[derive(Debug, Clone)]
pub struct Theme {
    pub primary: Color,
    pub accent: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,

    pub bg: Color,
    pub bg_highlight: Color,

    pub text: Color,
    pub text_muted: Color,
    pub text_dim: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: Color::Rgb(0, 123, 255),    // Question blue
            accent: Color::Rgb(111, 66, 193),    // Purple
            success: Color::Rgb(40, 167, 69),    // Answer green
            warning: Color::Rgb(253, 126, 20),   // Orange
            error: Color::Rgb(220, 53, 69),      // Red

            bg: Color::Rgb(22, 24, 29),
            bg_highlight: Color::Rgb(52, 58, 64),

            text: Color::Rgb(248, 249, 250),
            text_muted: Color::Rgb(173, 181, 189),
            text_dim: Color::Rgb(108, 117, 125),
        }
    }
}

impl Theme {
    /// Button color for each rating, matching the desktop app.
    pub fn rating(&self, rating: Rating) -> Color {
        match rating {
            Rating::Again => self.error,
            Rating::Hard => self.warning,
            Rating::Good => self.success,
            Rating::Easy => self.accent,
        }
    }

    pub fn card_state(&self, state: CardState) -> Color {
        match state {
            CardState::New => self.primary,
            CardState::Learning | CardState::Relearning => self.warning,
            CardState::Review => self.success,
        }
    }

    pub fn title(&self) -> Style {
        Style::default().fg(self.text).add_modifier(Modifier::BOLD)
    }

    pub fn highlight(&self) -> Style {
        Style::default().fg(self.primary).add_modifier(Modifier::BOLD)
    }

    pub fn selected(&self) -> Style {
        Style::default().bg(self.bg_highlight).fg(self.text)
    }

    pub fn muted(&self) -> Style {
        Style::default().fg(self.text_muted)
    }

    pub fn question(&self) -> Style {
        Style::default().fg(self.primary).add_modifier(Modifier::BOLD)
    }

    pub fn answer(&self) -> Style {
        Style::default().fg(self.success).add_modifier(Modifier::BOLD)
    }

    pub fn key_hint(&self) -> Style {
        Style::default().fg(self.text_dim)
    }

    pub fn key_highlight(&self) -> Style {
        Style::default().fg(self.accent).add_modifier(Modifier::BOLD)
    }

    pub fn tag(&self) -> Style {
        Style::default().fg(self.text).bg(self.primary)
    }
}
