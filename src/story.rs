use std::sync::Arc;

use chrono::Local;
use crossterm::event::KeyCode;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::Frame;
use textwrap::{wrap, Options as WrapOptions};

use crate::field::{FieldSpec, TextField};
use crate::format::{compact_number, published_on, Locale};
use crate::modal::{Dialog, DialogKind, DialogTransition, FormBuffer};
use crate::mutation::{MutationClient, RequestKey, Settled, StoryMutations, StoryRequest};
use crate::notify::{Notice, NotificationSink};
use crate::theme::{
    COLOR_ACCENT, COLOR_ERROR, COLOR_LIKE, COLOR_PASTEL_BLUE, COLOR_TEXT_PRIMARY,
    COLOR_TEXT_SECONDARY,
};
use crate::tuys::{Comment, StoryItem};

pub const DENOUNCE_MIN_LEN: usize = 3;

const MSG_DENOUNCE_TOO_SHORT: &str = "A mensagem deve ter pelo menos 3 caracteres!";
const MSG_DENOUNCE_SENT: &str = "Denuncia enviada com sucesso. Agradecemos pela contribuição.";
const MSG_DENOUNCE_FAILED: &str = "Não foi possível enviar a denúncia. Tente novamente.";
const MSG_DELETED: &str = "História apagada com sucesso.";
const MSG_DELETE_FAILED: &str = "Não foi possível apagar a história. Tente novamente.";
const MSG_LIKE_FAILED: &str = "Não foi possível registrar sua curtida.";
const MSG_UPDATED: &str = "História atualizada com sucesso.";
const MSG_UPDATE_FAILED: &str = "Não foi possível atualizar a história. Tente novamente.";

static EDIT_TITLE: FieldSpec = FieldSpec {
    name: "title",
    label: "Título",
    required: true,
    min_len: 3,
    max_len: Some(100),
    placeholder: "Título da história...",
};

static EDIT_BODY: FieldSpec = FieldSpec {
    name: "body",
    label: "História",
    required: true,
    min_len: 1,
    max_len: Some(2000),
    placeholder: "Escreva sua história...",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModalConfig {
    pub open: bool,
    pub kind: DialogKind,
}

impl Default for ModalConfig {
    fn default() -> Self {
        Self {
            open: false,
            kind: DialogKind::DeleteStory,
        }
    }
}

/// Ephemeral per-panel state; dropped with the panel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub optimistic_liked: bool,
    pub editing: bool,
    pub comments_visible: bool,
    pub modal: ModalConfig,
}

/// Which affordances a story shows, decided by who is looking at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controls {
    pub edit: bool,
    pub delete: bool,
    pub denounce: bool,
    pub like: bool,
    pub follower_badge: bool,
    pub read_only_counts: bool,
}

pub fn controls_for(story: &StoryItem) -> Controls {
    let owner = story.owner.is_owner;
    Controls {
        edit: owner,
        delete: owner,
        denounce: !owner,
        like: !owner,
        follower_badge: !owner && story.followed_by_user,
        read_only_counts: owner,
    }
}

/// What the host should do after a settlement was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    None,
    Refresh(RequestKey),
    Deleted(i64),
}

struct StoryEditor {
    title: TextField,
    body: TextField,
    focus: usize,
    hint: Option<String>,
}

impl StoryEditor {
    fn new(story: &StoryItem) -> Self {
        Self {
            title: TextField::with_value(&EDIT_TITLE, &story.title),
            body: TextField::with_value(&EDIT_BODY, &story.body),
            focus: 1,
            hint: None,
        }
    }

    fn focused(&mut self) -> &mut TextField {
        if self.focus == 0 {
            &mut self.title
        } else {
            &mut self.body
        }
    }
}

#[derive(Default)]
enum CommentThread {
    #[default]
    NotLoaded,
    Loading,
    Loaded(Vec<Comment>),
    Failed(String),
}

pub struct StoryPanel {
    story: StoryItem,
    show_channel: bool,
    key: RequestKey,
    view: ViewState,
    dialog: Dialog,
    mutations: StoryMutations,
    editor: Option<StoryEditor>,
    comments: CommentThread,
    client: MutationClient,
    notices: Arc<dyn NotificationSink>,
}

impl StoryPanel {
    pub fn new(
        story: StoryItem,
        show_channel: bool,
        client: MutationClient,
        notices: Arc<dyn NotificationSink>,
    ) -> Self {
        let view = ViewState {
            optimistic_liked: story.liked_by_user,
            ..ViewState::default()
        };
        Self {
            key: RequestKey::story(story.id),
            story,
            show_channel,
            view,
            dialog: Dialog::default(),
            mutations: StoryMutations::default(),
            editor: None,
            comments: CommentThread::NotLoaded,
            client,
            notices,
        }
    }

    pub fn story(&self) -> &StoryItem {
        &self.story
    }

    pub fn id(&self) -> i64 {
        self.story.id
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn mutations(&self) -> &StoryMutations {
        &self.mutations
    }

    pub fn controls(&self) -> Controls {
        controls_for(&self.story)
    }

    pub fn is_capturing_input(&self) -> bool {
        self.view.modal.open || self.view.editing
    }

    /// Likes shown next to the heart, including the not-yet-confirmed toggle.
    pub fn displayed_likes(&self) -> i64 {
        let delta = i64::from(self.view.optimistic_liked) - i64::from(self.story.liked_by_user);
        (self.story.likes + delta).max(0)
    }

    /// Swaps in a freshly fetched item. The optimistic flag is re-seeded
    /// only while no like/unlike is outstanding.
    pub fn replace_story(&mut self, story: StoryItem) {
        if story.id != self.story.id {
            return;
        }
        if !self.mutations.like_in_flight() {
            self.view.optimistic_liked = story.liked_by_user;
        }
        if story.comments != self.story.comments || story.updated_at != self.story.updated_at {
            self.invalidate_comments();
        }
        self.story = story;
    }

    pub fn toggle_like(&mut self) {
        let previous = self.view.optimistic_liked;
        self.view.optimistic_liked = !previous;
        let request = if previous {
            StoryRequest::Unlike { previous }
        } else {
            StoryRequest::Like { previous }
        };
        self.issue(request);
    }

    /// Sends a denounce with `text` as the reason. Returns whether a request
    /// was issued.
    pub fn denounce(&mut self, text: &str) -> bool {
        if text.chars().count() < DENOUNCE_MIN_LEN {
            self.notices.notify(Notice::error(MSG_DENOUNCE_TOO_SHORT));
            return false;
        }
        self.issue(StoryRequest::Denounce {
            text: text.to_string(),
        });
        true
    }

    pub fn delete(&mut self) {
        self.issue(StoryRequest::Delete);
    }

    pub fn toggle_editing(&mut self) {
        if self.view.editing {
            return;
        }
        self.view.editing = true;
        self.editor = Some(StoryEditor::new(&self.story));
    }

    /// Leaves edit mode, sending the edited text when `save` is set and the
    /// fields are valid. Returns whether edit mode was left.
    pub fn finish_editing(&mut self, save: bool) -> bool {
        let Some(editor) = self.editor.as_mut() else {
            self.view.editing = false;
            return true;
        };
        if save {
            let invalid = [&editor.title, &editor.body]
                .into_iter()
                .enumerate()
                .find_map(|(index, field)| field.validate().err().map(|err| (index, err)));
            if let Some((index, err)) = invalid {
                editor.focus = index;
                editor.hint = Some(err.to_string());
                return false;
            }
            let title = editor.title.value().trim().to_string();
            let body = editor.body.value().trim().to_string();
            if title != self.story.title || body != self.story.body {
                self.issue(StoryRequest::Update { title, body });
            }
        }
        self.editor = None;
        self.view.editing = false;
        true
    }

    /// Shows or hides the thread. Hiding forgets a finished thread so the
    /// next show fetches it again.
    pub fn toggle_comments(&mut self) -> bool {
        self.view.comments_visible = !self.view.comments_visible;
        if !self.view.comments_visible {
            self.invalidate_comments();
        }
        self.view.comments_visible
    }

    /// True when comments are visible but have never been requested.
    pub fn needs_comments(&self) -> bool {
        self.view.comments_visible && matches!(self.comments, CommentThread::NotLoaded)
    }

    pub fn mark_comments_loading(&mut self) {
        self.comments = CommentThread::Loading;
    }

    pub fn set_comments(&mut self, result: Result<Vec<Comment>, String>) {
        self.comments = match result {
            Ok(comments) => CommentThread::Loaded(comments),
            Err(err) => CommentThread::Failed(err),
        };
    }

    /// Drops the cached thread. A load already in flight is left alone; its
    /// response still lands through `set_comments`.
    pub fn invalidate_comments(&mut self) {
        if !matches!(self.comments, CommentThread::Loading) {
            self.comments = CommentThread::NotLoaded;
        }
    }

    /// Opens a dialog if the viewer is allowed to use it.
    pub fn open_dialog(&mut self, kind: DialogKind) -> bool {
        let controls = self.controls();
        let allowed = match kind {
            DialogKind::DenounceStory => controls.denounce,
            DialogKind::DeleteStory => controls.delete,
        };
        if !allowed {
            return false;
        }
        let subject = match kind {
            DialogKind::DeleteStory => Some(self.story.title.clone()),
            DialogKind::DenounceStory => None,
        };
        self.dialog.open(kind, subject);
        self.view.modal = ModalConfig { open: true, kind };
        true
    }

    pub fn dialog(&self) -> &Dialog {
        &self.dialog
    }

    /// Feeds a key to the open dialog or editor. Returns false when neither
    /// is active and the key belongs to the host.
    pub fn handle_key(&mut self, code: KeyCode) -> bool {
        if self.view.modal.open {
            let mut submitted: Option<(DialogKind, FormBuffer)> = None;
            let transition = self.dialog.handle_key(
                code,
                Some(&mut |kind: DialogKind, form: FormBuffer| submitted = Some((kind, form))),
            );
            if let Some((kind, form)) = submitted {
                self.submit_dialog(kind, &form);
            }
            self.sync_modal(transition);
            return true;
        }
        if self.view.editing {
            self.handle_editor_key(code);
            return true;
        }
        false
    }

    fn submit_dialog(&mut self, kind: DialogKind, form: &FormBuffer) {
        match kind {
            DialogKind::DenounceStory => {
                let text = form.get("text").unwrap_or_default().to_string();
                self.denounce(&text);
            }
            DialogKind::DeleteStory => self.delete(),
        }
    }

    fn sync_modal(&mut self, transition: DialogTransition) {
        match transition {
            DialogTransition::Closed | DialogTransition::Submitted { closed: true } => {
                self.view.modal.open = false;
            }
            DialogTransition::Submitted { closed: false } | DialogTransition::Unchanged => {
                self.view.modal.open = self.dialog.is_open();
            }
        }
    }

    fn handle_editor_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.finish_editing(false);
            }
            KeyCode::Enter => {
                self.finish_editing(true);
            }
            KeyCode::Tab | KeyCode::BackTab => {
                if let Some(editor) = self.editor.as_mut() {
                    editor.focus = 1 - editor.focus;
                }
            }
            KeyCode::Backspace => {
                if let Some(editor) = self.editor.as_mut() {
                    editor.focused().backspace();
                }
            }
            KeyCode::Char(ch) => {
                if let Some(editor) = self.editor.as_mut() {
                    editor.focused().insert(ch);
                    editor.hint = None;
                }
            }
            _ => {}
        }
    }

    fn issue(&mut self, request: StoryRequest) {
        self.mutations.get_mut(request.kind()).start();
        self.client.issue(self.key.clone(), self.story.id, request);
    }

    /// Applies one settlement: reconciles optimistic state, notifies, then
    /// resets the mutation so the outcome is observed exactly once.
    pub fn apply(&mut self, settled: Settled) -> PanelEvent {
        if settled.story_id != self.story.id {
            return PanelEvent::None;
        }
        let kind = settled.request.kind();
        self.mutations.get_mut(kind).settle(&settled.result);

        let event = match (&settled.request, &settled.result) {
            (StoryRequest::Like { previous } | StoryRequest::Unlike { previous }, Err(err)) => {
                self.view.optimistic_liked = *previous;
                self.notify_failure(err.user_message(), MSG_LIKE_FAILED);
                PanelEvent::None
            }
            (StoryRequest::Like { .. } | StoryRequest::Unlike { .. }, Ok(())) => {
                PanelEvent::Refresh(settled.key.clone())
            }
            (StoryRequest::Denounce { .. }, Ok(())) => {
                self.notices.notify(Notice::success(MSG_DENOUNCE_SENT));
                PanelEvent::None
            }
            (StoryRequest::Denounce { .. }, Err(err)) => {
                self.notify_failure(err.user_message(), MSG_DENOUNCE_FAILED);
                PanelEvent::None
            }
            (StoryRequest::Delete, Ok(())) => {
                self.notices.notify(Notice::success(MSG_DELETED));
                PanelEvent::Deleted(self.story.id)
            }
            (StoryRequest::Delete, Err(err)) => {
                self.notify_failure(err.user_message(), MSG_DELETE_FAILED);
                PanelEvent::None
            }
            (StoryRequest::Update { .. }, Ok(())) => {
                self.notices.notify(Notice::success(MSG_UPDATED));
                PanelEvent::Refresh(settled.key.clone())
            }
            (StoryRequest::Update { .. }, Err(err)) => {
                self.notify_failure(err.user_message(), MSG_UPDATE_FAILED);
                PanelEvent::None
            }
        };

        self.mutations.get_mut(kind).reset();
        event
    }

    fn notify_failure(&self, message: Option<&str>, fallback: &str) {
        self.notices.notify(Notice::error(message.unwrap_or(fallback)));
    }

    pub fn lines(&self, width: usize, locale: Locale) -> Vec<Line<'static>> {
        let controls = self.controls();
        let width = width.max(16);
        let mut lines = Vec::new();

        let mut header = vec![Span::styled(
            format!("@{}", self.story.owner.username),
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .add_modifier(Modifier::BOLD),
        )];
        if self.show_channel && !self.story.channel.is_empty() {
            header.push(Span::raw("  "));
            header.push(Span::styled(
                format!("#{}", self.story.channel.to_uppercase()),
                Style::default().fg(COLOR_ACCENT),
            ));
        }
        if controls.follower_badge {
            header.push(Span::raw("  "));
            header.push(Span::styled(
                "Seguindo",
                Style::default()
                    .fg(COLOR_PASTEL_BLUE)
                    .add_modifier(Modifier::BOLD),
            ));
        }
        if controls.edit {
            header.push(Span::raw("  "));
            header.push(Span::styled(
                "[e] editar",
                Style::default().fg(COLOR_TEXT_SECONDARY),
            ));
        }
        if controls.delete {
            header.push(Span::raw(" "));
            header.push(Span::styled("[x] apagar", Style::default().fg(COLOR_LIKE)));
        }
        lines.push(Line::from(header));
        lines.push(Line::from(Span::styled(
            published_on(self.story.date.with_timezone(&Local).date_naive(), locale),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        )));
        lines.push(Line::default());

        match &self.editor {
            Some(editor) => {
                lines.extend(editor.title.lines(editor.focus == 0, width));
                lines.extend(editor.body.lines(editor.focus == 1, width));
                if let Some(hint) = &editor.hint {
                    lines.push(Line::from(Span::styled(
                        hint.clone(),
                        Style::default().fg(COLOR_ERROR),
                    )));
                }
                lines.push(Line::from(Span::styled(
                    "[Enter] salvar   [Esc] descartar   [Tab] trocar campo",
                    Style::default().fg(COLOR_TEXT_SECONDARY),
                )));
            }
            None => {
                lines.push(Line::from(Span::styled(
                    self.story.title.clone(),
                    Style::default()
                        .fg(COLOR_TEXT_PRIMARY)
                        .add_modifier(Modifier::BOLD),
                )));
                for chunk in wrap(&self.story.body, WrapOptions::new(width)) {
                    lines.push(Line::from(Span::styled(
                        chunk.into_owned(),
                        Style::default().fg(COLOR_TEXT_PRIMARY),
                    )));
                }
            }
        }
        lines.push(Line::default());
        lines.push(self.options_line(controls, locale));

        if self.view.comments_visible {
            lines.extend(self.comment_lines(width));
        }
        lines
    }

    fn options_line(&self, controls: Controls, locale: Locale) -> Line<'static> {
        let secondary = Style::default().fg(COLOR_TEXT_SECONDARY);
        let comments = compact_number(self.story.comments, locale);
        if controls.read_only_counts {
            return Line::from(vec![
                Span::styled(
                    format!("{} pessoas gostaram", compact_number(self.story.likes, locale)),
                    secondary,
                ),
                Span::raw("   "),
                Span::styled("💬 Comentários ", Style::default().fg(COLOR_PASTEL_BLUE)),
                Span::styled(comments, secondary),
            ]);
        }

        let heart = if self.view.optimistic_liked { "♥" } else { "♡" };
        let mut spans = Vec::new();
        if controls.like {
            spans.push(Span::styled(
                format!("{heart} Gostei "),
                Style::default().fg(COLOR_LIKE),
            ));
            spans.push(Span::styled(
                compact_number(self.displayed_likes(), locale),
                secondary,
            ));
            spans.push(Span::raw("   "));
        }
        spans.push(Span::styled(
            "💬 Comentar ",
            Style::default().fg(COLOR_PASTEL_BLUE),
        ));
        spans.push(Span::styled(comments, secondary));
        if controls.denounce {
            spans.push(Span::raw("   "));
            spans.push(Span::styled("⚑ Denunciar", Style::default().fg(COLOR_LIKE)));
        }
        Line::from(spans)
    }

    fn comment_lines(&self, width: usize) -> Vec<Line<'static>> {
        let secondary = Style::default()
            .fg(COLOR_TEXT_SECONDARY)
            .add_modifier(Modifier::ITALIC);
        match &self.comments {
            CommentThread::NotLoaded | CommentThread::Loading => {
                vec![Line::from(Span::styled("  Carregando comentários...", secondary))]
            }
            CommentThread::Failed(err) => vec![Line::from(Span::styled(
                format!("  Não foi possível carregar os comentários: {err}"),
                Style::default().fg(COLOR_ERROR),
            ))],
            CommentThread::Loaded(comments) if comments.is_empty() => {
                vec![Line::from(Span::styled("  Nenhum comentário ainda.", secondary))]
            }
            CommentThread::Loaded(comments) => {
                let mut lines = Vec::new();
                for comment in comments {
                    lines.push(Line::from(Span::styled(
                        format!("  ↳ @{}", comment.owner.username),
                        Style::default().fg(COLOR_ACCENT),
                    )));
                    for chunk in wrap(&comment.text, WrapOptions::new(width.saturating_sub(4))) {
                        lines.push(Line::from(Span::styled(
                            format!("    {chunk}"),
                            Style::default().fg(COLOR_TEXT_PRIMARY),
                        )));
                    }
                }
                lines
            }
        }
    }

    pub fn draw_dialog(&self, frame: &mut Frame<'_>, area: Rect) {
        if self.view.modal.open {
            self.dialog.draw(frame, area);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{mock_stories, MockStoryService};
    use crate::notify::{NoticeKind, Toasts};
    use crate::tuys::RequestError;
    use crossbeam_channel::{unbounded, Receiver};
    use std::time::Duration;

    struct Harness {
        panel: StoryPanel,
        service: Arc<MockStoryService>,
        toasts: Toasts,
        rx: Receiver<Settled>,
    }

    impl Harness {
        fn new(story: StoryItem) -> Self {
            let service = Arc::new(MockStoryService::default());
            let (tx, rx) = unbounded();
            let toasts = Toasts::new(Duration::from_secs(60));
            let panel = StoryPanel::new(
                story,
                true,
                MutationClient::new(service.clone(), tx),
                Arc::new(toasts.clone()),
            );
            Self {
                panel,
                service,
                toasts,
                rx,
            }
        }

        fn settle_next(&mut self) -> PanelEvent {
            let settled = self.rx.recv_timeout(Duration::from_secs(5)).unwrap();
            self.panel.apply(settled)
        }

        fn nothing_pending(&self) -> bool {
            self.rx.recv_timeout(Duration::from_millis(100)).is_err()
        }
    }

    fn visitor_story() -> StoryItem {
        mock_stories().remove(0)
    }

    fn owned_story() -> StoryItem {
        mock_stories().remove(1)
    }

    fn text_of(lines: &[Line<'_>]) -> String {
        lines
            .iter()
            .map(|line| {
                line.spans
                    .iter()
                    .map(|span| span.content.as_ref())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn like_is_optimistic_and_confirmed() {
        let mut h = Harness::new(visitor_story());
        assert!(!h.panel.view().optimistic_liked);
        h.panel.toggle_like();
        assert!(h.panel.view().optimistic_liked);
        assert_eq!(h.panel.displayed_likes(), 1_201);
        let event = h.settle_next();
        assert_eq!(event, PanelEvent::Refresh(RequestKey::story(1)));
        assert!(h.panel.view().optimistic_liked);
        assert_eq!(h.service.calls(), vec!["like 1"]);
        assert!(h.toasts.active().is_empty());
    }

    #[test]
    fn failed_like_rolls_back_and_notifies_once() {
        let mut h = Harness::new(visitor_story());
        h.service.set_failure(Some(RequestError::Api {
            status: 500,
            message: None,
        }));
        h.panel.toggle_like();
        assert!(h.panel.view().optimistic_liked);
        assert_eq!(h.settle_next(), PanelEvent::None);
        assert!(!h.panel.view().optimistic_liked);
        assert!(!h.panel.mutations().like.is_error());
        assert_eq!(h.toasts.active(), vec![Notice::error(MSG_LIKE_FAILED)]);
        assert!(h.nothing_pending());
    }

    #[test]
    fn failed_unlike_restores_liked() {
        let mut story = visitor_story();
        story.liked_by_user = true;
        let mut h = Harness::new(story);
        h.service.set_failure(Some(RequestError::Api {
            status: 403,
            message: Some("Sessão expirada".into()),
        }));
        h.panel.toggle_like();
        assert!(!h.panel.view().optimistic_liked);
        h.settle_next();
        assert!(h.panel.view().optimistic_liked);
        assert_eq!(h.toasts.latest(), Some(Notice::error("Sessão expirada")));
        assert_eq!(h.service.calls(), vec!["unlike 1"]);
    }

    #[test]
    fn each_failed_toggle_restores_its_own_previous_value() {
        let mut h = Harness::new(visitor_story());
        h.service.set_failure(Some(RequestError::Transport("offline".into())));
        h.panel.toggle_like();
        h.panel.toggle_like();
        assert!(!h.panel.view().optimistic_liked);
        let first = h.rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let second = h.rx.recv_timeout(Duration::from_secs(5)).unwrap();
        for settled in [first, second] {
            let before = match settled.request {
                StoryRequest::Like { previous } | StoryRequest::Unlike { previous } => previous,
                _ => unreachable!(),
            };
            h.panel.apply(settled);
            assert_eq!(h.panel.view().optimistic_liked, before);
        }
        assert!(!h.panel.mutations().like_in_flight());
    }

    #[test]
    fn short_denounce_is_blocked_locally() {
        let mut h = Harness::new(visitor_story());
        assert!(!h.panel.denounce("ok"));
        assert!(h.nothing_pending());
        assert!(h.service.calls().is_empty());
        let notice = h.toasts.latest().unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert_eq!(notice.text, MSG_DENOUNCE_TOO_SHORT);
    }

    #[test]
    fn denounce_success_notifies() {
        let mut h = Harness::new(visitor_story());
        assert!(h.panel.denounce("spam post"));
        h.settle_next();
        assert_eq!(h.service.calls(), vec!["denounce 1 spam post"]);
        assert_eq!(h.toasts.latest(), Some(Notice::success(MSG_DENOUNCE_SENT)));
        assert!(!h.panel.mutations().denounce.is_success());
    }

    #[test]
    fn denounce_failure_prefers_server_message() {
        let mut h = Harness::new(visitor_story());
        h.service.set_failure(Some(RequestError::Api {
            status: 409,
            message: Some("Você já denunciou esta estória.".into()),
        }));
        h.panel.denounce("spam post");
        h.settle_next();
        assert_eq!(
            h.toasts.latest(),
            Some(Notice::error("Você já denunciou esta estória."))
        );

        h.service.set_failure(Some(RequestError::Api {
            status: 500,
            message: None,
        }));
        h.panel.denounce("spam post");
        h.settle_next();
        assert_eq!(h.toasts.latest(), Some(Notice::error(MSG_DENOUNCE_FAILED)));
    }

    #[test]
    fn delete_success_removes_story() {
        let mut h = Harness::new(owned_story());
        h.panel.delete();
        assert_eq!(h.settle_next(), PanelEvent::Deleted(2));
        assert_eq!(h.toasts.latest(), Some(Notice::success(MSG_DELETED)));
    }

    #[test]
    fn delete_failure_uses_fallback() {
        let mut h = Harness::new(owned_story());
        h.service.set_failure(Some(RequestError::Transport("offline".into())));
        h.panel.delete();
        assert_eq!(h.settle_next(), PanelEvent::None);
        assert_eq!(h.toasts.latest(), Some(Notice::error(MSG_DELETE_FAILED)));
    }

    #[test]
    fn editing_toggle_cannot_reenter() {
        let mut h = Harness::new(owned_story());
        h.panel.toggle_editing();
        assert!(h.panel.view().editing);
        h.panel.handle_key(KeyCode::Char('!'));
        h.panel.toggle_editing();
        assert!(h.panel.view().editing);
        assert!(text_of(&h.panel.lines(80, Locale::PtBr)).contains("estória.!"));
        h.panel.handle_key(KeyCode::Esc);
        assert!(!h.panel.view().editing);
        assert!(h.nothing_pending());
    }

    #[test]
    fn saving_an_edit_issues_update() {
        let mut h = Harness::new(owned_story());
        h.panel.toggle_editing();
        h.panel.handle_key(KeyCode::Char('!'));
        h.panel.handle_key(KeyCode::Enter);
        assert!(!h.panel.view().editing);
        assert_eq!(h.settle_next(), PanelEvent::Refresh(RequestKey::story(2)));
        assert_eq!(h.service.calls(), vec!["update 2 Minha primeira estória"]);
        assert_eq!(h.toasts.latest(), Some(Notice::success(MSG_UPDATED)));
    }

    #[test]
    fn comments_toggle_is_local() {
        let mut h = Harness::new(visitor_story());
        assert!(h.panel.toggle_comments());
        assert!(h.panel.needs_comments());
        h.panel.mark_comments_loading();
        assert!(!h.panel.needs_comments());
        assert!(!h.panel.toggle_comments());
        assert!(h.nothing_pending());
    }

    #[test]
    fn comment_thread_reloads_after_changes() {
        let mut h = Harness::new(visitor_story());
        h.panel.toggle_comments();
        h.panel.mark_comments_loading();
        h.panel.set_comments(Ok(Vec::new()));
        assert!(!h.panel.needs_comments());

        h.panel.replace_story(visitor_story());
        assert!(!h.panel.needs_comments());

        let mut fresh = visitor_story();
        fresh.comments += 1;
        h.panel.replace_story(fresh);
        assert!(h.panel.needs_comments());

        h.panel.mark_comments_loading();
        h.panel.set_comments(Err("timeout".into()));
        assert!(!h.panel.toggle_comments());
        assert!(h.panel.toggle_comments());
        assert!(h.panel.needs_comments());
    }

    #[test]
    fn controls_follow_ownership() {
        for is_owner in [false, true] {
            for followed in [false, true] {
                let mut story = visitor_story();
                story.owner.is_owner = is_owner;
                story.followed_by_user = followed;
                let controls = controls_for(&story);
                assert_eq!(controls.edit, is_owner);
                assert_eq!(controls.delete, is_owner);
                assert_eq!(controls.denounce, !is_owner);
                assert_eq!(controls.like, !is_owner);
                assert_eq!(controls.follower_badge, !is_owner && followed);
            }
        }
    }

    #[test]
    fn dialogs_respect_ownership() {
        let mut visitor = Harness::new(visitor_story());
        assert!(!visitor.panel.open_dialog(DialogKind::DeleteStory));
        assert!(visitor.panel.open_dialog(DialogKind::DenounceStory));

        let mut owner = Harness::new(owned_story());
        assert!(!owner.panel.open_dialog(DialogKind::DenounceStory));
        assert!(owner.panel.open_dialog(DialogKind::DeleteStory));
        assert_eq!(owner.panel.view().modal.kind, DialogKind::DeleteStory);
    }

    #[test]
    fn denounce_dialog_flow() {
        let mut h = Harness::new(visitor_story());
        h.panel.open_dialog(DialogKind::DenounceStory);
        assert!(h.panel.is_capturing_input());
        for ch in "spam post".chars() {
            h.panel.handle_key(KeyCode::Char(ch));
        }
        assert!(h.panel.handle_key(KeyCode::Enter));
        assert!(!h.panel.view().modal.open);
        h.settle_next();
        assert_eq!(h.service.calls(), vec!["denounce 1 spam post"]);
    }

    #[test]
    fn cancelled_dialog_sends_nothing() {
        let mut h = Harness::new(visitor_story());
        h.panel.open_dialog(DialogKind::DenounceStory);
        for ch in "spam post".chars() {
            h.panel.handle_key(KeyCode::Char(ch));
        }
        h.panel.handle_key(KeyCode::Esc);
        assert!(!h.panel.view().modal.open);
        assert!(h.nothing_pending());
        h.panel.open_dialog(DialogKind::DenounceStory);
        assert!(h.panel.dialog().form().unwrap().is_empty());
    }

    #[test]
    fn render_branches_on_owner() {
        let visitor = Harness::new(visitor_story());
        let text = text_of(&visitor.panel.lines(80, Locale::PtBr));
        assert!(text.contains("Denunciar"));
        assert!(text.contains("Seguindo"));
        assert!(text.contains("#GERAL"));
        assert!(text.contains("Gostei 1,2 mil"));
        assert!(!text.contains("[x] apagar"));

        let owner = Harness::new(owned_story());
        let text = text_of(&owner.panel.lines(80, Locale::EnUs));
        assert!(text.contains("[e] editar"));
        assert!(text.contains("[x] apagar"));
        assert!(text.contains("7 pessoas gostaram"));
        assert!(!text.contains("Denunciar"));
        assert!(!text.contains("Seguindo"));
    }

    #[test]
    fn replace_story_reseeds_when_idle() {
        let mut h = Harness::new(visitor_story());
        let mut fresh = visitor_story();
        fresh.liked_by_user = true;
        fresh.likes = 1_201;
        h.panel.replace_story(fresh.clone());
        assert!(h.panel.view().optimistic_liked);

        h.panel.toggle_like();
        fresh.liked_by_user = true;
        h.panel.replace_story(fresh);
        assert!(!h.panel.view().optimistic_liked);
        h.settle_next();
    }
}
