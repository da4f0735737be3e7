//! Custom widgets for the study TUI.

use std::collections::BTreeSet;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{block::BorderType, Block, Borders, Paragraph, Widget, Wrap},
};

use super::theme::Theme;
use crate::models::{CollectionStats, Rating};

// ══════════════════════════════════════════════════════════════════════════
// Stats Bar Widget
// ══════════════════════════════════════════════════════════════════════════

pub struct StatsBar<'a> {
    stats: &'a CollectionStats,
    due_in_scope: usize,
    theme: &'a Theme,
}

impl<'a> StatsBar<'a> {
    pub fn new(stats: &'a CollectionStats, due_in_scope: usize, theme: &'a Theme) -> Self {
        Self { stats, due_in_scope, theme }
    }

    fn cell(&self, label: &'a str, value: usize, color: ratatui::style::Color) -> Line<'a> {
        Line::from(vec![
            Span::styled("● ", Style::default().fg(color)),
            Span::styled(label, self.theme.muted()),
            Span::styled(
                value.to_string(),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
        ])
    }
}

impl Widget for StatsBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::horizontal([Constraint::Ratio(1, 5); 5]).split(area);

        let cells = [
            self.cell("Due: ", self.due_in_scope, self.theme.success),
            self.cell("New: ", self.stats.new_items, self.theme.primary),
            self.cell("Learning: ", self.stats.learning_items, self.theme.warning),
            self.cell("Review: ", self.stats.review_items, self.theme.accent),
            self.cell("Total: ", self.stats.total_items, self.theme.text_dim),
        ];

        for (cell, chunk) in cells.into_iter().zip(chunks.iter()) {
            Paragraph::new(cell)
                .alignment(Alignment::Center)
                .render(*chunk, buf);
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Card Face Widget
// ══════════════════════════════════════════════════════════════════════════

/// One side of a card: a rounded box with a centered label and wrapped text.
pub struct CardFace<'a> {
    label: &'a str,
    content: &'a str,
    label_style: Style,
    theme: &'a Theme,
}

impl<'a> CardFace<'a> {
    pub fn question(content: &'a str, theme: &'a Theme) -> Self {
        Self { label: "QUESTION", content, label_style: theme.question(), theme }
    }

    pub fn answer(content: &'a str, theme: &'a Theme) -> Self {
        Self { label: "ANSWER", content, label_style: theme.answer(), theme }
    }

    /// Placeholder shown where the answer will appear.
    pub fn hidden(theme: &'a Theme) -> Self {
        Self {
            label: "ANSWER",
            content: "Press Space to show the answer",
            label_style: theme.key_hint(),
            theme,
        }
    }
}

impl Widget for CardFace<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border_color = self.label_style.fg.unwrap_or(self.theme.text_dim);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(border_color))
            .title(Line::from(vec![
                Span::raw(" "),
                Span::styled(self.label, self.label_style),
                Span::raw(" "),
            ]))
            .title_alignment(Alignment::Center);

        let inner = block.inner(area);
        block.render(area, buf);

        // Center vertically
        let content_height = self.content.lines().count().max(1) as u16;
        let vertical_padding = inner.height.saturating_sub(content_height) / 2;
        let content_area = Rect {
            x: inner.x + 2,
            y: inner.y + vertical_padding,
            width: inner.width.saturating_sub(4),
            height: inner.height.saturating_sub(vertical_padding),
        };

        Paragraph::new(self.content)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(self.theme.text))
            .render(content_area, buf);
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Rating Buttons Widget
// ══════════════════════════════════════════════════════════════════════════

pub struct RatingButtons<'a> {
    intervals: &'a [(Rating, String)],
    enabled: bool,
    theme: &'a Theme,
}

impl<'a> RatingButtons<'a> {
    pub fn new(intervals: &'a [(Rating, String)], enabled: bool, theme: &'a Theme) -> Self {
        Self { intervals, enabled, theme }
    }
}

impl Widget for RatingButtons<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::horizontal([Constraint::Ratio(1, 4); 4]).split(area);

        for ((rating, interval), chunk) in self.intervals.iter().zip(chunks.iter()) {
            let color = if self.enabled {
                self.theme.rating(*rating)
            } else {
                self.theme.text_dim
            };

            let button = Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(color));
            let inner = button.inner(*chunk);
            button.render(*chunk, buf);

            let mut lines = vec![
                Line::from(Span::styled(
                    format!("{} {}", *rating as u8, rating.name()),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(rating.hint(), Style::default().fg(color))),
            ];
            if self.enabled {
                lines.push(Line::from(Span::styled(interval.as_str(), self.theme.muted())));
            }

            Paragraph::new(lines)
                .alignment(Alignment::Center)
                .render(inner, buf);
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Key Hints Widget
// ══════════════════════════════════════════════════════════════════════════

pub struct KeyHints<'a> {
    hints: &'a [(&'a str, &'a str)],
    theme: &'a Theme,
}

impl<'a> KeyHints<'a> {
    pub fn new(hints: &'a [(&'a str, &'a str)], theme: &'a Theme) -> Self {
        Self { hints, theme }
    }
}

impl Widget for KeyHints<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut spans = Vec::with_capacity(self.hints.len() * 3);
        for (i, (key, desc)) in self.hints.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(" │ ", Style::default().fg(self.theme.text_dim)));
            }
            spans.push(Span::styled(*key, self.theme.key_highlight()));
            spans.push(Span::styled(format!(" {}", desc), self.theme.key_hint()));
        }

        Paragraph::new(Line::from(spans))
            .alignment(Alignment::Center)
            .render(area, buf);
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Tag Chips Widget
// ══════════════════════════════════════════════════════════════════════════

pub struct TagChips<'a> {
    tags: &'a BTreeSet<String>,
    theme: &'a Theme,
}

impl<'a> TagChips<'a> {
    pub fn new(tags: &'a BTreeSet<String>, theme: &'a Theme) -> Self {
        Self { tags, theme }
    }
}

impl Widget for TagChips<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let line = if self.tags.is_empty() {
            Line::from(Span::styled("(untagged)", self.theme.key_hint()))
        } else {
            Line::from(
                self.tags
                    .iter()
                    .flat_map(|tag| {
                        [
                            Span::styled(format!(" {} ", tag), self.theme.tag()),
                            Span::raw(" "),
                        ]
                    })
                    .collect::<Vec<_>>(),
            )
        };
        Paragraph::new(line).wrap(Wrap { trim: false }).render(area, buf);
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Completion Screen Widget
// ══════════════════════════════════════════════════════════════════════════

/// What to tell the user once a session has ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Saved,
    NothingReviewed,
    SaveFailed(String),
}

pub struct CompletionScreen<'a> {
    reviewed: usize,
    total: usize,
    duration_mins: i64,
    outcome: &'a Outcome,
    theme: &'a Theme,
}

impl<'a> CompletionScreen<'a> {
    pub fn new(
        reviewed: usize,
        total: usize,
        duration_mins: i64,
        outcome: &'a Outcome,
        theme: &'a Theme,
    ) -> Self {
        Self { reviewed, total, duration_mins, outcome, theme }
    }
}

impl Widget for CompletionScreen<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (headline, headline_color, detail) = match self.outcome {
            Outcome::Saved => (
                "Great job!",
                self.theme.success,
                "Your progress has been saved.".to_string(),
            ),
            Outcome::NothingReviewed => (
                "Practice complete",
                self.theme.text_muted,
                "No cards were reviewed.".to_string(),
            ),
            Outcome::SaveFailed(err) => (
                "Save error",
                self.theme.error,
                format!("Failed to save progress: {}", err),
            ),
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(headline_color))
            .title(Line::from(vec![
                Span::raw(" "),
                Span::styled("SESSION COMPLETE", self.theme.answer()),
                Span::raw(" "),
            ]))
            .title_alignment(Alignment::Center);

        let inner = block.inner(area);
        block.render(area, buf);

        let value = Style::default().fg(self.theme.primary).add_modifier(Modifier::BOLD);
        let text = vec![
            Line::from(""),
            Line::from(Span::styled(
                headline,
                Style::default().fg(headline_color).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled("Cards reviewed: ", self.theme.muted()),
                Span::styled(format!("{} of {}", self.reviewed, self.total), value),
            ]),
            Line::from(vec![
                Span::styled("Time: ", self.theme.muted()),
                Span::styled(format!("{} minutes", self.duration_mins), value),
            ]),
            Line::from(""),
            Line::from(Span::styled(detail, Style::default().fg(self.theme.text))),
            Line::from(""),
            Line::from(vec![
                Span::styled("Press ", self.theme.key_hint()),
                Span::styled("Esc", self.theme.key_highlight()),
                Span::styled(" to return", self.theme.key_hint()),
            ]),
        ];

        Paragraph::new(text)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(inner, buf);
    }
}
