//! Main application state and logic.

use std::collections::BTreeSet;
use std::time::Instant;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{block::BorderType, Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use super::theme::Theme;
use super::widgets::{CardFace, CompletionScreen, KeyHints, Outcome, RatingButtons, StatsBar, TagChips};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::models::{normalize_tags, Rating, StudyItem, User};
use crate::scheduler::{format_interval, FsrsScheduler};
use crate::selector::{all_tags, count_due};
use crate::session::{Completion, Progress, ReviewSession, SessionError, SessionState, StudyContext};
use crate::storage::{JsonUserStore, UserStore};

// ══════════════════════════════════════════════════════════════════════════
// Application State
// ══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Home,
    Study,
    AddCard,
    Browser,
    Complete,
}

/// Input fields of the add-card form, in tab order.
const ADD_FIELDS: usize = 3;

pub struct App {
    pub screen: Screen,
    pub running: bool,
    pub theme: Theme,

    // Collaborators
    store: JsonUserStore,
    scheduler: FsrsScheduler,
    clock: Box<dyn Clock>,

    // The signed-in user and their data
    pub user: User,
    /// Set when in-memory changes have not reached disk.
    pub unsaved: bool,

    // Tag scope
    pub active_tags: BTreeSet<String>,
    pub tag_list_state: ListState,

    // Study state
    pub session: Option<ReviewSession>,
    pub interval_preview: [(Rating, String); 4],
    pub outcome: Outcome,

    // Add card state
    pub add_fields: [String; ADD_FIELDS], // question, answer, tags
    pub add_focus: usize,

    // Card browser state
    pub card_list_state: ListState,
    pub tag_edit: Option<String>,
    pub card_delete_pending: bool,

    // Status message (shown temporarily)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    pub fn new(store: JsonUserStore, config: &Config) -> Result<Self> {
        Self::with_clock(store, config, Box::new(SystemClock))
    }

    pub fn with_clock(store: JsonUserStore, config: &Config, clock: Box<dyn Clock>) -> Result<Self> {
        let scheduler = FsrsScheduler::new(config.scheduler.clone())?;
        let user = store.open_or_create(&config.user)?;
        let known = all_tags(user.items());
        let active_tags = normalize_tags(&config.active_tags)
            .into_iter()
            .filter(|t| known.contains(t))
            .collect();

        Ok(Self {
            screen: Screen::Home,
            running: true,
            theme: Theme::default(),
            store,
            scheduler,
            clock,
            user,
            unsaved: false,
            active_tags,
            tag_list_state: ListState::default().with_selected(Some(0)),
            session: None,
            interval_preview: Rating::ALL.map(|r| (r, String::new())),
            outcome: Outcome::NothingReviewed,
            add_fields: Default::default(),
            add_focus: 0,
            card_list_state: ListState::default(),
            tag_edit: None,
            card_delete_pending: false,
            status_message: None,
        })
    }

    pub fn set_status(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    fn persist(&mut self) {
        match self.store.save(&self.user) {
            Ok(()) => self.unsaved = false,
            Err(e) => {
                self.unsaved = true;
                tracing::error!("Failed to save user: {}", e);
                self.set_status(format!("Save failed: {}", e));
            }
        }
    }

    pub fn quit(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if !session.is_finished() {
                if let Err(e) = session.finish_early(&self.user, &self.store) {
                    tracing::error!("Failed to save session on quit: {}", e);
                    self.unsaved = true;
                }
            }
        }
        if self.unsaved {
            self.persist();
        }
        self.running = false;
    }

    // ══════════════════════════════════════════════════════════════════════
    // Tag scope
    // ══════════════════════════════════════════════════════════════════════

    pub fn known_tags(&self) -> Vec<String> {
        all_tags(self.user.items()).into_iter().collect()
    }

    pub fn toggle_selected_tag(&mut self) {
        let tags = self.known_tags();
        if let Some(tag) = self.tag_list_state.selected().and_then(|i| tags.get(i)) {
            if !self.active_tags.remove(tag) {
                self.active_tags.insert(tag.clone());
            }
        }
    }

    pub fn due_in_scope(&self) -> usize {
        count_due(self.user.items(), self.clock.now(), &self.active_tags)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Study
    // ══════════════════════════════════════════════════════════════════════

    pub fn start_study(&mut self) {
        if self.user.items().is_empty() {
            self.set_status("You don't have any cards to practice. Create some cards first!".into());
            return;
        }

        match ReviewSession::start(&self.user, &self.active_tags, self.clock.now()) {
            Some(session) => {
                self.session = Some(session);
                self.screen = Screen::Study;
                self.refresh_preview();
            }
            None => {
                self.set_status("No cards are due for review right now. Great job staying on top of your studies!".into());
            }
        }
    }

    fn refresh_preview(&mut self) {
        let now = self.clock.now();
        if let Some(preview) = self
            .session
            .as_ref()
            .and_then(|s| s.preview(&self.user, &self.scheduler, now))
        {
            self.interval_preview = preview;
        }
    }

    pub fn show_answer(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if let Err(e) = session.reveal() {
                self.set_status(e.to_string());
            }
        }
    }

    pub fn rate_card(&mut self, rating: Rating) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let ctx = StudyContext {
            scheduler: &self.scheduler,
            store: &self.store,
            clock: self.clock.as_ref(),
        };

        match session.rate(&mut self.user, &ctx, rating) {
            Ok(Progress::Next) => self.refresh_preview(),
            Ok(Progress::Finished(completion)) => self.complete(completion),
            Err(SessionError::Persistence(e)) => self.save_failed(e.to_string()),
            Err(e) => self.set_status(e.to_string()),
        }
    }

    pub fn finish_session(&mut self) {
        let Some(session) = self.session.as_mut() else {
            self.screen = Screen::Home;
            return;
        };

        match session.finish_early(&self.user, &self.store) {
            Ok(completion) => self.complete(completion),
            Err(SessionError::Persistence(e)) => self.save_failed(e.to_string()),
            Err(e) => {
                self.set_status(e.to_string());
                self.screen = Screen::Home;
            }
        }
    }

    fn complete(&mut self, completion: Completion) {
        self.outcome = match completion {
            // The saved snapshot covers any earlier failed saves too
            Completion::Saved { .. } => {
                self.unsaved = false;
                Outcome::Saved
            }
            Completion::NothingReviewed => Outcome::NothingReviewed,
        };
        self.screen = Screen::Complete;
    }

    fn save_failed(&mut self, err: String) {
        self.outcome = Outcome::SaveFailed(err);
        self.unsaved = true;
        self.screen = Screen::Complete;
    }

    fn leave_complete(&mut self) {
        self.session = None;
        self.screen = Screen::Home;
    }

    // ══════════════════════════════════════════════════════════════════════
    // Cards
    // ══════════════════════════════════════════════════════════════════════

    pub fn add_card(&mut self) {
        let [question, answer, tags] = &self.add_fields;
        let (question, answer) = (question.trim(), answer.trim());
        if question.is_empty() || answer.is_empty() {
            self.set_status("Question and answer are both required".into());
            return;
        }

        let item = StudyItem::new(
            question.to_string(),
            answer.to_string(),
            tags.split(','),
            self.clock.now(),
        );
        tracing::info!(item = item.id(), "added card");
        self.user.add_item(item);
        self.persist();

        self.add_fields = Default::default();
        self.add_focus = 0;
    }

    pub fn enter_card_browser(&mut self) {
        self.card_list_state = if self.user.items().is_empty() {
            ListState::default()
        } else {
            ListState::default().with_selected(Some(0))
        };
        self.tag_edit = None;
        self.card_delete_pending = false;
        self.screen = Screen::Browser;
    }

    fn selected_item(&self) -> Option<&StudyItem> {
        self.card_list_state.selected().and_then(|i| self.user.item(i))
    }

    pub fn start_tag_edit(&mut self) {
        if let Some(item) = self.selected_item() {
            let current = item.tags().iter().cloned().collect::<Vec<_>>().join(", ");
            self.tag_edit = Some(current);
        }
    }

    pub fn save_tag_edit(&mut self) {
        let Some(text) = self.tag_edit.take() else {
            return;
        };
        if let Some(id) = self.selected_item().map(|i| i.id().to_string()) {
            self.user.retag_item(&id, text.split(','));
            self.active_tags.retain(|t| self.user.items().iter().any(|i| i.tags().contains(t)));
            self.persist();
        }
    }

    pub fn delete_selected_card(&mut self) {
        if let Some(id) = self.selected_item().map(|i| i.id().to_string()) {
            self.user.remove_item(&id);
            tracing::info!(item = %id, "deleted card");
            self.persist();

            let len = self.user.items().len();
            if len == 0 {
                self.card_list_state.select(None);
            } else if self.card_list_state.selected().map_or(false, |i| i >= len) {
                self.card_list_state.select(Some(len - 1));
            }
        }
        self.card_delete_pending = false;
    }

    pub fn export_backup(&mut self) {
        if self.unsaved {
            self.persist();
        }
        let path = JsonUserStore::default_backup_path();
        match self.store.export_backup(&path) {
            Ok(count) => self.set_status(format!("Exported {} users to {}", count, path.display())),
            Err(e) => self.set_status(format!("Export failed: {}", e)),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Event Handling
    // ══════════════════════════════════════════════════════════════════════

    pub fn handle_events(&mut self) -> Result<()> {
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    self.handle_key(key.code);
                }
            }
        }
        Ok(())
    }

    pub fn handle_key(&mut self, key: KeyCode) {
        match self.screen {
            Screen::Home => self.handle_home_keys(key),
            Screen::Study => self.handle_study_keys(key),
            Screen::AddCard => self.handle_add_card_keys(key),
            Screen::Browser => self.handle_browser_keys(key),
            Screen::Complete => self.handle_complete_keys(key),
        }
    }

    fn handle_home_keys(&mut self, key: KeyCode) {
        let tag_count = self.known_tags().len();
        match key {
            KeyCode::Char('q') | KeyCode::Esc => self.quit(),
            KeyCode::Up | KeyCode::Char('k') if tag_count > 0 => {
                let i = self.tag_list_state.selected().unwrap_or(0);
                let new_i = if i == 0 { tag_count - 1 } else { i - 1 };
                self.tag_list_state.select(Some(new_i));
            }
            KeyCode::Down | KeyCode::Char('j') if tag_count > 0 => {
                let i = self.tag_list_state.selected().unwrap_or(0);
                let new_i = if i + 1 >= tag_count { 0 } else { i + 1 };
                self.tag_list_state.select(Some(new_i));
            }
            KeyCode::Char(' ') => self.toggle_selected_tag(),
            KeyCode::Enter | KeyCode::Char('p') => self.start_study(),
            KeyCode::Char('a') => self.screen = Screen::AddCard,
            KeyCode::Char('b') => self.enter_card_browser(),
            KeyCode::Char('x') => self.export_backup(),
            _ => {}
        }
    }

    fn handle_study_keys(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('f') => self.finish_session(),
            KeyCode::Char(' ') | KeyCode::Enter => self.show_answer(),
            KeyCode::Char(c) => {
                if let Some(rating) = Rating::from_key(c) {
                    self.rate_card(rating);
                }
            }
            _ => {}
        }
    }

    fn handle_add_card_keys(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc => self.screen = Screen::Home,
            KeyCode::Tab => self.add_focus = (self.add_focus + 1) % ADD_FIELDS,
            KeyCode::BackTab => self.add_focus = (self.add_focus + ADD_FIELDS - 1) % ADD_FIELDS,
            KeyCode::Enter => {
                if self.add_focus + 1 < ADD_FIELDS {
                    self.add_focus += 1;
                } else {
                    self.add_card();
                }
            }
            KeyCode::Char(c) => self.add_fields[self.add_focus].push(c),
            KeyCode::Backspace => {
                self.add_fields[self.add_focus].pop();
            }
            _ => {}
        }
    }

    fn handle_browser_keys(&mut self, key: KeyCode) {
        if let Some(text) = self.tag_edit.as_mut() {
            match key {
                KeyCode::Esc => self.tag_edit = None,
                KeyCode::Enter => self.save_tag_edit(),
                KeyCode::Char(c) => text.push(c),
                KeyCode::Backspace => {
                    text.pop();
                }
                _ => {}
            }
            return;
        }

        let len = self.user.items().len();
        let was_pending = std::mem::take(&mut self.card_delete_pending);
        match key {
            KeyCode::Esc | KeyCode::Char('q') => self.screen = Screen::Home,
            KeyCode::Up | KeyCode::Char('k') if len > 0 => {
                let i = self.card_list_state.selected().unwrap_or(0);
                self.card_list_state.select(Some(if i == 0 { len - 1 } else { i - 1 }));
            }
            KeyCode::Down | KeyCode::Char('j') if len > 0 => {
                let i = self.card_list_state.selected().unwrap_or(0);
                self.card_list_state.select(Some(if i + 1 >= len { 0 } else { i + 1 }));
            }
            KeyCode::Char('t') => self.start_tag_edit(),
            KeyCode::Char('d') => {
                if was_pending {
                    self.delete_selected_card();
                } else {
                    self.card_delete_pending = true;
                }
            }
            KeyCode::Char('a') => self.screen = Screen::AddCard,
            _ => {}
        }
    }

    fn handle_complete_keys(&mut self, key: KeyCode) {
        if matches!(key, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) {
            self.leave_complete();
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Rendering
    // ══════════════════════════════════════════════════════════════════════

    pub fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();

        frame.render_widget(Clear, area);
        frame.render_widget(Block::default().style(Style::default().bg(self.theme.bg)), area);

        match self.screen {
            Screen::Home => self.render_home(frame, area),
            Screen::Study => self.render_study(frame, area),
            Screen::AddCard => self.render_add_card(frame, area),
            Screen::Browser => self.render_browser(frame, area),
            Screen::Complete => self.render_complete(frame, area),
        }

        self.render_status(frame, area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        if let Some((ref msg, time)) = self.status_message {
            if time.elapsed().as_secs() < 5 {
                let status = Paragraph::new(msg.as_str())
                    .alignment(Alignment::Center)
                    .style(Style::default().fg(self.theme.warning));
                let status_area = Rect {
                    x: area.x,
                    y: area.bottom().saturating_sub(3),
                    width: area.width,
                    height: 1,
                };
                frame.render_widget(status, status_area);
            }
        }
    }

    fn render_home(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::vertical([
            Constraint::Length(3), // Title
            Constraint::Length(1), // Stats
            Constraint::Length(1), // Spacing
            Constraint::Length(2), // Scope summary
            Constraint::Min(5),    // Tag list
            Constraint::Length(2), // Hints
        ])
        .split(area);

        let title = Paragraph::new(Line::from(vec![
            Span::styled("Emphizor", self.theme.highlight()),
            Span::styled(format!("  ·  {}", self.user.name()), self.theme.muted()),
        ]))
        .alignment(Alignment::Center);
        frame.render_widget(title, chunks[0]);

        let stats = self.user.stats(self.clock.now());
        let due = self.due_in_scope();
        frame.render_widget(StatsBar::new(&stats, due, &self.theme), chunks[1]);

        let scope = if self.active_tags.is_empty() {
            "No tags selected: only untagged cards will be practiced".to_string()
        } else {
            format!(
                "Practicing cards tagged only with: {}",
                self.active_tags.iter().cloned().collect::<Vec<_>>().join(", ")
            )
        };
        frame.render_widget(
            Paragraph::new(scope)
                .alignment(Alignment::Center)
                .style(self.theme.muted())
                .wrap(Wrap { trim: true }),
            chunks[3],
        );

        let items: Vec<ListItem> = self
            .known_tags()
            .into_iter()
            .map(|tag| {
                let active = self.active_tags.contains(&tag);
                let mark = if active { "[x] " } else { "[ ] " };
                let style = if active {
                    Style::default().fg(self.theme.success).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(self.theme.text)
                };
                ListItem::new(Line::from(vec![
                    Span::styled(mark, style),
                    Span::styled(tag, style),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(self.theme.primary))
                    .title(" Your tags ")
                    .title_style(self.theme.highlight()),
            )
            .highlight_style(self.theme.selected())
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, centered_rect(60, 100, chunks[4]), &mut self.tag_list_state);

        let hints = KeyHints::new(
            &[
                ("j/k", "nav"),
                ("Space", "toggle tag"),
                ("Enter", "practice"),
                ("a", "add"),
                ("b", "view cards"),
                ("x", "export"),
                ("q", "quit"),
            ],
            &self.theme,
        );
        frame.render_widget(hints, chunks[5]);
    }

    fn render_study(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::vertical([
            Constraint::Length(3), // Header
            Constraint::Min(5),    // Question
            Constraint::Min(5),    // Answer
            Constraint::Length(5), // Buttons
            Constraint::Length(2), // Hints
        ])
        .split(area);

        let Some(session) = self.session.as_ref() else {
            return;
        };
        let revealed = session.state() == SessionState::Revealed;

        let header = Paragraph::new(Line::from(Span::styled(
            format!(
                "Practice Session - Card {} of {}",
                (session.position() + 1).min(session.len()),
                session.len()
            ),
            self.theme.title(),
        )))
        .alignment(Alignment::Center);
        frame.render_widget(header, chunks[0]);

        if let Some(item) = session.current(&self.user) {
            frame.render_widget(
                CardFace::question(item.question(), &self.theme),
                centered_rect(80, 100, chunks[1]),
            );
            let answer = if revealed {
                CardFace::answer(item.answer(), &self.theme)
            } else {
                CardFace::hidden(&self.theme)
            };
            frame.render_widget(answer, centered_rect(80, 100, chunks[2]));
        }

        frame.render_widget(
            RatingButtons::new(&self.interval_preview, revealed, &self.theme),
            centered_rect(90, 100, chunks[3]),
        );

        let hints = if revealed {
            KeyHints::new(
                &[("1", "Again"), ("2", "Hard"), ("3", "Good"), ("4", "Easy"), ("Esc", "finish")],
                &self.theme,
            )
        } else {
            KeyHints::new(&[("Space", "show answer"), ("Esc", "finish practice")], &self.theme)
        };
        frame.render_widget(hints, chunks[4]);
    }

    fn render_add_card(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::vertical([
            Constraint::Length(3), // Title
            Constraint::Length(5), // Question
            Constraint::Length(5), // Answer
            Constraint::Length(3), // Tags
            Constraint::Length(2), // Count
            Constraint::Min(1),    // Spacer
            Constraint::Length(2), // Hints
        ])
        .split(centered_rect(60, 100, area));

        let title = Paragraph::new("Add Card")
            .alignment(Alignment::Center)
            .style(self.theme.title());
        frame.render_widget(title, chunks[0]);

        let labels = [" Question ", " Answer ", " Tags (comma-separated) "];
        for (i, label) in labels.iter().enumerate() {
            let style = if self.add_focus == i {
                Style::default().fg(self.theme.accent)
            } else {
                self.theme.muted()
            };
            let field = Paragraph::new(self.add_fields[i].as_str())
                .wrap(Wrap { trim: false })
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_type(BorderType::Rounded)
                        .border_style(style)
                        .title(*label)
                        .title_style(style),
                );
            frame.render_widget(field, chunks[i + 1]);
        }

        let count = Paragraph::new(format!("Cards: {}", self.user.items().len()))
            .alignment(Alignment::Center)
            .style(self.theme.muted());
        frame.render_widget(count, chunks[4]);

        let hints = KeyHints::new(
            &[("Tab", "next field"), ("Enter", "next / add"), ("Esc", "done")],
            &self.theme,
        );
        frame.render_widget(hints, chunks[6]);
    }

    fn render_browser(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::vertical([
            Constraint::Length(3), // Header
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Hints
        ])
        .split(area);

        let title = Paragraph::new(format!(
            "{}'s Flashcards ({} cards)",
            self.user.name(),
            self.user.items().len()
        ))
        .alignment(Alignment::Center)
        .style(self.theme.title());
        frame.render_widget(title, chunks[0]);

        let main_chunks = Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(chunks[1]);

        let now = self.clock.now();
        let items: Vec<ListItem> = self
            .user
            .items()
            .iter()
            .map(|item| {
                let preview: String = item.question().chars().take(28).collect();
                let status = if item.is_due(now) {
                    "(due)".to_string()
                } else {
                    format!("({})", format_interval(item.card().due() - now))
                };
                ListItem::new(Line::from(vec![
                    Span::styled(preview, Style::default().fg(self.theme.text)),
                    Span::styled(
                        format!(" {}", status),
                        Style::default().fg(self.theme.card_state(item.card().state())),
                    ),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(self.theme.primary))
                    .title(" Cards ")
                    .title_style(self.theme.highlight()),
            )
            .highlight_style(self.theme.selected())
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, main_chunks[0], &mut self.card_list_state);

        if let Some(item) = self.selected_item() {
            self.render_card_details(frame, main_chunks[1], item);
        } else {
            let empty = Paragraph::new("No cards found. Create some cards first!")
                .alignment(Alignment::Center)
                .style(self.theme.key_hint());
            frame.render_widget(empty, main_chunks[1]);
        }

        let hints = if self.tag_edit.is_some() {
            KeyHints::new(&[("Enter", "save tags"), ("Esc", "cancel")], &self.theme)
        } else if self.card_delete_pending {
            KeyHints::new(&[("d", "confirm delete"), ("any", "cancel")], &self.theme)
        } else {
            KeyHints::new(
                &[("j/k", "nav"), ("t", "edit tags"), ("d", "delete"), ("a", "add"), ("Esc", "back")],
                &self.theme,
            )
        };
        frame.render_widget(hints, chunks[2]);
    }

    fn render_card_details(&self, frame: &mut Frame, area: Rect, item: &StudyItem) {
        let chunks = Layout::vertical([
            Constraint::Length(5), // Question
            Constraint::Length(5), // Answer
            Constraint::Length(3), // Tags
            Constraint::Min(4),    // Scheduling
        ])
        .split(area);

        frame.render_widget(CardFace::question(item.question(), &self.theme), chunks[0]);
        frame.render_widget(CardFace::answer(item.answer(), &self.theme), chunks[1]);

        let tag_block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(self.theme.muted())
            .title(" Tags ");
        let tag_area = tag_block.inner(chunks[2]);
        frame.render_widget(tag_block, chunks[2]);
        match &self.tag_edit {
            Some(text) => frame.render_widget(
                Paragraph::new(text.as_str()).style(Style::default().fg(self.theme.accent)),
                tag_area,
            ),
            None => frame.render_widget(TagChips::new(item.tags(), &self.theme), tag_area),
        }

        let card = item.card();
        let label = |s: &'static str| Span::styled(s, self.theme.muted());
        let details = vec![
            Line::from(vec![
                label("State: "),
                Span::styled(
                    format!("{:?}", card.state()),
                    Style::default().fg(self.theme.card_state(card.state())),
                ),
            ]),
            Line::from(vec![
                label("Due: "),
                Span::raw(card.due().with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string()),
            ]),
            Line::from(vec![
                label("Reviews: "),
                Span::raw(card.reps().to_string()),
                label("   Lapses: "),
                Span::raw(card.lapses().to_string()),
            ]),
        ];
        frame.render_widget(Paragraph::new(details).style(Style::default().fg(self.theme.text)), chunks[3]);
    }

    fn render_complete(&mut self, frame: &mut Frame, area: Rect) {
        let (reviewed, total, minutes) = self
            .session
            .as_ref()
            .map(|s| {
                let minutes = (self.clock.now() - s.started_at()).num_minutes().max(0);
                (s.reviewed_count(), s.len(), minutes)
            })
            .unwrap_or((0, 0, 0));

        frame.render_widget(
            CompletionScreen::new(reviewed, total, minutes, &self.outcome, &self.theme),
            centered_rect(60, 50, area),
        );
    }
}

/// Helper to create a centered rect.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(r);

    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(popup_layout[1])[1]
}
