use std::io::{self, Stdout};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use unicode_width::UnicodeWidthStr;

use crate::data::{FeedService, StoryService};
use crate::format::Locale;
use crate::modal::DialogKind;
use crate::mutation::{MutationClient, Settled};
use crate::notify::{NoticeKind, NotificationSink, Toasts};
use crate::story::{PanelEvent, StoryPanel};
use crate::theme::{
    COLOR_ACCENT, COLOR_BG, COLOR_BORDER_FOCUSED, COLOR_ERROR, COLOR_PANEL_BG,
    COLOR_PANEL_SELECTED_BG, COLOR_SUCCESS, COLOR_TEXT_PRIMARY, COLOR_TEXT_SECONDARY,
};
use crate::tuys::{Comment, StoryItem};

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const FOOTER_HINT: &str =
    "j/k navegar · l curtir · c comentários · d denunciar · e editar · x apagar · r atualizar · q sair";

pub struct Options {
    pub status_message: String,
    pub feed_service: Arc<dyn FeedService>,
    pub story_service: Arc<dyn StoryService>,
    pub channel: Option<String>,
    pub locale: Locale,
    pub show_channel: bool,
    pub notice_ttl: Duration,
}

enum AsyncResponse {
    Stories {
        request_id: u64,
        result: Result<Vec<StoryItem>>,
    },
    Story {
        story_id: i64,
        result: Result<StoryItem>,
    },
    Comments {
        story_id: i64,
        result: Result<Vec<Comment>>,
    },
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= Duration::from_millis(120) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
    }
}

pub struct Model {
    status_message: String,
    panels: Vec<StoryPanel>,
    selected: usize,
    channel: Option<String>,
    locale: Locale,
    show_channel: bool,
    feed_service: Arc<dyn FeedService>,
    mutations: MutationClient,
    toasts: Toasts,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
    settled_rx: Receiver<Settled>,
    next_request_id: u64,
    pending_stories: Option<u64>,
    needs_redraw: bool,
    spinner: Spinner,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        let (settled_tx, settled_rx) = unbounded();
        let mut model = Self {
            status_message: opts.status_message,
            panels: Vec::new(),
            selected: 0,
            channel: opts.channel,
            locale: opts.locale,
            show_channel: opts.show_channel,
            feed_service: opts.feed_service,
            mutations: MutationClient::new(opts.story_service, settled_tx),
            toasts: Toasts::new(opts.notice_ttl),
            response_tx,
            response_rx,
            settled_rx,
            next_request_id: 1,
            pending_stories: None,
            needs_redraw: true,
            spinner: Spinner::new(),
        };
        model.reload_stories();
        model
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.status_message = format!("Erro: {err}");
                            }
                        }
                        self.mark_dirty();
                    }
                }
            }

            if self.poll_async() {
                self.mark_dirty();
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.toasts.expire(Instant::now()) {
                    self.mark_dirty();
                }
                if self.is_loading() {
                    if self.spinner.advance() {
                        self.mark_dirty();
                    }
                } else {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn is_loading(&self) -> bool {
        self.pending_stories.is_some()
    }

    pub fn panels(&self) -> &[StoryPanel] {
        &self.panels
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    /// Handles one key press. Returns `Ok(true)` when the app should quit.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        if let Some(panel) = self.panels.get_mut(self.selected) {
            if panel.is_capturing_input() {
                panel.handle_key(code);
                return Ok(false);
            }
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Char('j') | KeyCode::Down => self.select_offset(1),
            KeyCode::Char('k') | KeyCode::Up => self.select_offset(-1),
            KeyCode::Char('g') | KeyCode::Home => self.selected = 0,
            KeyCode::Char('G') | KeyCode::End => {
                self.selected = self.panels.len().saturating_sub(1);
            }
            KeyCode::Char('r') => self.reload_stories(),
            KeyCode::Char('l') => self.with_selected(|panel| {
                if panel.controls().like {
                    panel.toggle_like();
                    None
                } else {
                    Some("Você não pode curtir a própria história.".to_string())
                }
            }),
            KeyCode::Char('c') => {
                self.with_selected(|panel| {
                    panel.toggle_comments();
                    None
                });
                self.load_comments_if_needed(self.selected);
            }
            KeyCode::Char('e') => self.with_selected(|panel| {
                if panel.controls().edit {
                    panel.toggle_editing();
                    None
                } else {
                    Some("Somente o autor pode editar esta história.".to_string())
                }
            }),
            KeyCode::Char('d') => self.with_selected(|panel| {
                if panel.open_dialog(DialogKind::DenounceStory) {
                    None
                } else {
                    Some("Você não pode denunciar a própria história.".to_string())
                }
            }),
            KeyCode::Char('x') => self.with_selected(|panel| {
                if panel.open_dialog(DialogKind::DeleteStory) {
                    None
                } else {
                    Some("Somente o autor pode apagar esta história.".to_string())
                }
            }),
            _ => {}
        }
        Ok(false)
    }

    fn with_selected<F>(&mut self, action: F)
    where
        F: FnOnce(&mut StoryPanel) -> Option<String>,
    {
        match self.panels.get_mut(self.selected) {
            Some(panel) => {
                if let Some(message) = action(panel) {
                    self.status_message = message;
                }
            }
            None => self.status_message = "Nenhuma história selecionada.".to_string(),
        }
    }

    fn select_offset(&mut self, delta: isize) {
        if self.panels.is_empty() {
            self.selected = 0;
            return;
        }
        let last = self.panels.len() - 1;
        self.selected = self.selected.saturating_add_signed(delta).min(last);
    }

    fn next_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    pub fn reload_stories(&mut self) {
        let request_id = self.next_request_id();
        self.pending_stories = Some(request_id);
        self.status_message = "Carregando histórias...".to_string();
        let service = Arc::clone(&self.feed_service);
        let channel = self.channel.clone();
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = service.load_stories(channel.as_deref());
            let _ = tx.send(AsyncResponse::Stories { request_id, result });
        });
    }

    fn reload_story(&self, story_id: i64) {
        let service = Arc::clone(&self.feed_service);
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = service.load_story(story_id);
            let _ = tx.send(AsyncResponse::Story { story_id, result });
        });
    }

    fn load_comments_if_needed(&mut self, index: usize) {
        let Some(panel) = self.panels.get_mut(index) else {
            return;
        };
        if !panel.needs_comments() {
            return;
        }
        panel.mark_comments_loading();
        let story_id = panel.id();
        let service = Arc::clone(&self.feed_service);
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = service.load_comments(story_id);
            let _ = tx.send(AsyncResponse::Comments { story_id, result });
        });
    }

    /// Drains both channels; returns whether anything was applied.
    pub fn poll_async(&mut self) -> bool {
        let mut changed = false;
        while let Ok(settled) = self.settled_rx.try_recv() {
            self.handle_settled(settled);
            changed = true;
        }
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_async_response(message);
            changed = true;
        }
        changed
    }

    fn handle_settled(&mut self, settled: Settled) {
        let Some(index) = self
            .panels
            .iter()
            .position(|panel| panel.id() == settled.story_id)
        else {
            tracing::debug!(story_id = settled.story_id, "settlement for a story no longer shown");
            return;
        };
        match self.panels[index].apply(settled) {
            PanelEvent::None => {}
            PanelEvent::Refresh(key) => {
                tracing::debug!(%key, "refreshing story");
                self.reload_story(self.panels[index].id());
            }
            PanelEvent::Deleted(story_id) => {
                self.panels.retain(|panel| panel.id() != story_id);
                self.selected = self.selected.min(self.panels.len().saturating_sub(1));
            }
        }
    }

    fn handle_async_response(&mut self, message: AsyncResponse) {
        match message {
            AsyncResponse::Stories { request_id, result } => {
                if self.pending_stories != Some(request_id) {
                    return;
                }
                self.pending_stories = None;
                match result {
                    Ok(stories) => {
                        let selected_id = self.panels.get(self.selected).map(StoryPanel::id);
                        let sink: Arc<dyn NotificationSink> = Arc::new(self.toasts.clone());
                        self.panels = stories
                            .into_iter()
                            .map(|story| {
                                StoryPanel::new(
                                    story,
                                    self.show_channel,
                                    self.mutations.clone(),
                                    Arc::clone(&sink),
                                )
                            })
                            .collect();
                        self.selected = selected_id
                            .and_then(|id| self.panels.iter().position(|p| p.id() == id))
                            .unwrap_or(0);
                        self.status_message = if self.panels.is_empty() {
                            "Nenhuma história por aqui ainda.".to_string()
                        } else {
                            format!("{} histórias carregadas.", self.panels.len())
                        };
                    }
                    Err(err) => {
                        tracing::warn!(error = ?err, "loading stories failed");
                        self.status_message = format!("Não foi possível carregar as histórias: {err}");
                    }
                }
            }
            AsyncResponse::Story { story_id, result } => {
                let Some(index) = self.panels.iter().position(|p| p.id() == story_id) else {
                    return;
                };
                match result {
                    Ok(story) => {
                        self.panels[index].replace_story(story);
                        self.load_comments_if_needed(index);
                    }
                    Err(err) => {
                        tracing::warn!(story_id, error = ?err, "refreshing story failed");
                    }
                }
            }
            AsyncResponse::Comments { story_id, result } => {
                if let Some(panel) = self.panels.iter_mut().find(|p| p.id() == story_id) {
                    panel.set_comments(result.map_err(|err| err.to_string()));
                }
            }
        }
    }

    pub fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        self.draw_status(frame, layout[0]);
        self.draw_feed(frame, layout[1]);

        let footer = Paragraph::new(FOOTER_HINT)
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(footer, layout[2]);

        if let Some(panel) = self.panels.get(self.selected) {
            panel.draw_dialog(frame, layout[1]);
        }
    }

    fn draw_status(&self, frame: &mut Frame<'_>, area: Rect) {
        let (text, color) = match self.toasts.latest() {
            Some(notice) => {
                let color = match notice.kind {
                    NoticeKind::Success => COLOR_SUCCESS,
                    NoticeKind::Error => COLOR_ERROR,
                };
                (notice.text, color)
            }
            None if self.is_loading() => (
                format!("{} {}", self.spinner.frame(), self.status_message),
                COLOR_TEXT_PRIMARY,
            ),
            None => (self.status_message.clone(), COLOR_TEXT_PRIMARY),
        };
        let tag = format!("tuys-tui v{}", crate::VERSION);
        let text = pad_between(&text, &tag, area.width as usize);
        let status = Paragraph::new(text).style(
            Style::default()
                .fg(color)
                .bg(COLOR_PANEL_SELECTED_BG)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status, area);
    }

    fn draw_feed(&self, frame: &mut Frame<'_>, area: Rect) {
        let title = match &self.channel {
            Some(channel) => format!("Tuys · #{}", channel.to_uppercase()),
            None => "Tuys".to_string(),
        };
        let block = Block::default()
            .title(Span::styled(
                title,
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_BORDER_FOCUSED))
            .style(Style::default().bg(COLOR_PANEL_BG));

        if self.panels.is_empty() {
            let empty = Paragraph::new(Line::from(Span::styled(
                self.status_message.clone(),
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC),
            )))
            .block(block);
            frame.render_widget(empty, area);
            return;
        }

        let width = area.width.saturating_sub(4) as usize;
        let items: Vec<ListItem> = self
            .panels
            .iter()
            .map(|panel| {
                let mut lines = panel.lines(width, self.locale);
                lines.push(Line::default());
                ListItem::new(lines)
            })
            .collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(COLOR_PANEL_SELECTED_BG))
            .highlight_symbol("▎");
        let mut state = ListState::default();
        state.select(Some(self.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }
}

// Left text, right-aligned tag. The tag is dropped when both don't fit.
fn pad_between(left: &str, right: &str, width: usize) -> String {
    let used = left.width() + right.width() + 2;
    if used > width {
        return format!(" {left}");
    }
    format!(" {left}{}{right} ", " ".repeat(width - used))
}

/// Draws one frame into any backend; used by tests and snapshots.
pub fn render_once<B: Backend>(model: &mut Model, terminal: &mut Terminal<B>) -> Result<()> {
    terminal
        .draw(|frame| model.draw(frame))
        .context("draw frame")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MockFeedService, MockStoryService};
    use crate::tuys::RequestError;
    use ratatui::backend::TestBackend;

    fn model_with(service: Arc<MockStoryService>) -> Model {
        Model::new(Options {
            status_message: String::new(),
            feed_service: Arc::new(MockFeedService::new(service.store())),
            story_service: service,
            channel: None,
            locale: Locale::PtBr,
            show_channel: true,
            notice_ttl: Duration::from_secs(60),
        })
    }

    fn wait_until<F: Fn(&Model) -> bool>(model: &mut Model, condition: F) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition(model) {
            assert!(Instant::now() < deadline, "condition not met in time");
            model.poll_async();
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn loaded_model(service: Arc<MockStoryService>) -> Model {
        let mut model = model_with(service);
        wait_until(&mut model, |m| m.panels().len() == 2);
        model
    }

    fn screen(model: &mut Model) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        render_once(model, &mut terminal).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn loads_feed_on_start() {
        let model = loaded_model(Arc::new(MockStoryService::default()));
        assert_eq!(model.panels()[0].story().title, "Bem-vindo ao Tuys");
        assert_eq!(model.status_message(), "2 histórias carregadas.");
    }

    #[test]
    fn navigation_is_clamped() {
        let mut model = loaded_model(Arc::new(MockStoryService::default()));
        model.handle_key(KeyCode::Char('k')).unwrap();
        assert_eq!(model.selected(), 0);
        model.handle_key(KeyCode::Char('j')).unwrap();
        model.handle_key(KeyCode::Char('j')).unwrap();
        assert_eq!(model.selected(), 1);
        assert!(model.handle_key(KeyCode::Char('q')).unwrap());
    }

    #[test]
    fn like_key_settles_into_panel() {
        let service = Arc::new(MockStoryService::default());
        let mut model = loaded_model(service.clone());
        model.handle_key(KeyCode::Char('l')).unwrap();
        assert!(model.panels()[0].view().optimistic_liked);
        wait_until(&mut model, |m| !m.panels()[0].mutations().like_in_flight());
        assert_eq!(service.calls(), vec!["like 1"]);
    }

    #[test]
    fn failed_like_shows_toast_and_rolls_back() {
        let service = Arc::new(MockStoryService::failing(RequestError::Api {
            status: 503,
            message: Some("Servidor indisponível".into()),
        }));
        let mut model = loaded_model(service);
        model.handle_key(KeyCode::Char('l')).unwrap();
        wait_until(&mut model, |m| !m.panels()[0].mutations().like_in_flight());
        assert!(!model.panels()[0].view().optimistic_liked);
        assert!(screen(&mut model).contains("Servidor indisponível"));
    }

    #[test]
    fn owner_cannot_like_own_story() {
        let service = Arc::new(MockStoryService::default());
        let mut model = loaded_model(service.clone());
        model.handle_key(KeyCode::Char('j')).unwrap();
        model.handle_key(KeyCode::Char('l')).unwrap();
        assert!(!model.panels()[1].view().optimistic_liked);
        assert!(service.calls().is_empty());
    }

    #[test]
    fn delete_flow_removes_story() {
        let service = Arc::new(MockStoryService::default());
        let mut model = loaded_model(service.clone());
        model.handle_key(KeyCode::Char('j')).unwrap();
        model.handle_key(KeyCode::Char('x')).unwrap();
        assert!(screen(&mut model).contains("Apagar História"));
        model.handle_key(KeyCode::Enter).unwrap();
        wait_until(&mut model, |m| m.panels().len() == 1);
        assert_eq!(model.selected(), 0);
        assert_eq!(service.calls(), vec!["delete 2"]);
        assert!(screen(&mut model).contains("História apagada com sucesso."));
    }

    #[test]
    fn dialog_captures_quit_key() {
        let mut model = loaded_model(Arc::new(MockStoryService::default()));
        model.handle_key(KeyCode::Char('d')).unwrap();
        assert!(!model.handle_key(KeyCode::Char('q')).unwrap());
        assert_eq!(
            model.panels()[0].dialog().form().unwrap().get("text"),
            Some("q")
        );
        model.handle_key(KeyCode::Esc).unwrap();
        assert!(!model.panels()[0].view().modal.open);
    }

    #[test]
    fn comments_load_when_shown() {
        let mut model = loaded_model(Arc::new(MockStoryService::default()));
        model.handle_key(KeyCode::Char('c')).unwrap();
        wait_until(&mut model, |m| !m.panels()[0].needs_comments());
        let deadline = Instant::now() + Duration::from_secs(5);
        while !screen(&mut model).contains("Que história bonita!") {
            assert!(Instant::now() < deadline, "comments never rendered");
            model.poll_async();
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn status_tag_is_right_aligned_by_display_width() {
        let line = pad_between("Histórias", "v1", 20);
        assert_eq!(line.width(), 20);
        assert!(line.ends_with("v1 "));
        assert_eq!(pad_between("uma mensagem longa", "v1", 10), " uma mensagem longa");
    }

    #[test]
    fn confirmed_like_survives_the_refresh() {
        let service = Arc::new(MockStoryService::default());
        let mut model = loaded_model(service.clone());
        model.handle_key(KeyCode::Char('l')).unwrap();
        wait_until(&mut model, |m| m.panels()[0].story().liked_by_user);
        assert!(model.panels()[0].view().optimistic_liked);
        assert_eq!(model.panels()[0].story().likes, 1_201);
        assert_eq!(model.panels()[0].displayed_likes(), 1_201);

        model.handle_key(KeyCode::Char('l')).unwrap();
        wait_until(&mut model, |m| !m.panels()[0].story().liked_by_user);
        assert!(!model.panels()[0].view().optimistic_liked);
        assert_eq!(model.panels()[0].displayed_likes(), 1_200);
        assert_eq!(service.calls(), vec!["like 1", "unlike 1"]);
    }

    #[test]
    fn saved_edit_survives_the_refresh() {
        let service = Arc::new(MockStoryService::default());
        let mut model = loaded_model(service);
        model.handle_key(KeyCode::Char('j')).unwrap();
        model.handle_key(KeyCode::Char('e')).unwrap();
        model.handle_key(KeyCode::Char('!')).unwrap();
        model.handle_key(KeyCode::Enter).unwrap();
        wait_until(&mut model, |m| m.panels()[1].story().updated_at.is_some());
        assert!(model.panels()[1].story().body.ends_with("estória.!"));
        model.handle_key(KeyCode::Char('r')).unwrap();
        wait_until(&mut model, |m| m.pending_stories.is_none());
        assert!(model.panels()[1].story().body.ends_with("estória.!"));
    }
}
