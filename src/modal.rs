use std::collections::HashMap;

use crossterm::event::KeyCode;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use crate::field::{FieldSpec, TextField};
use crate::theme::{
    centered_rect, COLOR_ACCENT, COLOR_ERROR, COLOR_PANEL_BG, COLOR_TEXT_PRIMARY,
    COLOR_TEXT_SECONDARY,
};

pub const CANCEL_LABEL: &str = "Cancelar";

/// The closed set of dialogs a story can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogKind {
    DenounceStory,
    DeleteStory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogDescriptor {
    pub title: &'static str,
    pub message: Option<&'static str>,
    pub fields: &'static [FieldSpec],
    pub confirm_label: &'static str,
}

static DENOUNCE_FIELDS: [FieldSpec; 1] = [FieldSpec {
    name: "text",
    label: "Motivo",
    required: true,
    min_len: 3,
    max_len: Some(200),
    placeholder: "Motivo da denúncia...",
}];

static DENOUNCE_STORY: DialogDescriptor = DialogDescriptor {
    title: "Denunciar Estória",
    message: None,
    fields: &DENOUNCE_FIELDS,
    confirm_label: "Denunciar",
};

static DELETE_STORY: DialogDescriptor = DialogDescriptor {
    title: "Apagar História",
    message: Some("Tem certeza que deseja apagar esta história? Essa ação não pode ser desfeita."),
    fields: &[],
    confirm_label: "Apagar",
};

impl DialogKind {
    pub fn descriptor(&self) -> &'static DialogDescriptor {
        match self {
            DialogKind::DenounceStory => &DENOUNCE_STORY,
            DialogKind::DeleteStory => &DELETE_STORY,
        }
    }
}

/// Field values collected while a dialog is open, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormBuffer(HashMap<String, String>);

impl FormBuffer {
    pub fn set<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// What a dialog interaction did to the open/closed state. Hosts mirror
/// this into their own view state in place of an open-change callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogTransition {
    Unchanged,
    Submitted { closed: bool },
    Closed,
}

pub type SubmitCallback<'a> = &'a mut dyn FnMut(DialogKind, FormBuffer);

struct OpenDialog {
    kind: DialogKind,
    subject: Option<String>,
    form: FormBuffer,
    fields: Vec<TextField>,
    focus: usize,
    hint: Option<String>,
}

enum DialogState {
    Closed,
    Open(OpenDialog),
}

pub struct Dialog {
    state: DialogState,
    close_on_submit: bool,
}

impl Default for Dialog {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Dialog {
    pub fn new(close_on_submit: bool) -> Self {
        Self {
            state: DialogState::Closed,
            close_on_submit,
        }
    }

    /// Opens `kind` with an empty buffer, replacing anything left over.
    pub fn open(&mut self, kind: DialogKind, subject: Option<String>) {
        let fields = kind
            .descriptor()
            .fields
            .iter()
            .map(TextField::new)
            .collect();
        self.state = DialogState::Open(OpenDialog {
            kind,
            subject,
            form: FormBuffer::default(),
            fields,
            focus: 0,
            hint: None,
        });
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, DialogState::Open(_))
    }

    pub fn kind(&self) -> Option<DialogKind> {
        match &self.state {
            DialogState::Open(open) => Some(open.kind),
            DialogState::Closed => None,
        }
    }

    pub fn form(&self) -> Option<&FormBuffer> {
        match &self.state {
            DialogState::Open(open) => Some(&open.form),
            DialogState::Closed => None,
        }
    }

    pub fn hint(&self) -> Option<&str> {
        match &self.state {
            DialogState::Open(open) => open.hint.as_deref(),
            DialogState::Closed => None,
        }
    }

    /// Upserts a field value. Ignored while closed or for unknown names.
    pub fn edit(&mut self, name: &str, value: &str) {
        let DialogState::Open(open) = &mut self.state else {
            return;
        };
        if let Some(field) = open.fields.iter_mut().find(|f| f.spec().name == name) {
            field.set_value(value);
            open.form.set(name, field.value());
            open.hint = None;
        }
    }

    pub fn submit(&mut self, on_submit: Option<SubmitCallback<'_>>) -> DialogTransition {
        let DialogState::Open(open) = &mut self.state else {
            return DialogTransition::Unchanged;
        };
        let form = std::mem::take(&mut open.form);
        if let Some(callback) = on_submit {
            callback(open.kind, form);
        }
        for field in &mut open.fields {
            field.set_value("");
        }
        open.hint = None;
        if self.close_on_submit {
            self.state = DialogState::Closed;
            DialogTransition::Submitted { closed: true }
        } else {
            DialogTransition::Submitted { closed: false }
        }
    }

    pub fn cancel(&mut self) -> DialogTransition {
        if !self.is_open() {
            return DialogTransition::Unchanged;
        }
        self.state = DialogState::Closed;
        DialogTransition::Closed
    }

    /// Routes a key to the focused field. Enter submits once every field
    /// passes its own constraints; Esc cancels.
    pub fn handle_key(
        &mut self,
        code: KeyCode,
        on_submit: Option<SubmitCallback<'_>>,
    ) -> DialogTransition {
        let DialogState::Open(open) = &mut self.state else {
            return DialogTransition::Unchanged;
        };
        match code {
            KeyCode::Esc => self.cancel(),
            KeyCode::Enter => {
                let invalid = open
                    .fields
                    .iter()
                    .enumerate()
                    .find_map(|(index, field)| field.validate().err().map(|err| (index, err)));
                if let Some((index, err)) = invalid {
                    open.focus = index;
                    open.hint = Some(err.to_string());
                    return DialogTransition::Unchanged;
                }
                self.submit(on_submit)
            }
            KeyCode::Tab | KeyCode::Down if !open.fields.is_empty() => {
                open.focus = (open.focus + 1) % open.fields.len();
                DialogTransition::Unchanged
            }
            KeyCode::BackTab | KeyCode::Up if !open.fields.is_empty() => {
                open.focus = (open.focus + open.fields.len() - 1) % open.fields.len();
                DialogTransition::Unchanged
            }
            KeyCode::Backspace => {
                if let Some(field) = open.fields.get_mut(open.focus) {
                    if field.backspace() {
                        open.form.set(field.spec().name, field.value());
                    }
                }
                DialogTransition::Unchanged
            }
            KeyCode::Char(ch) => {
                if let Some(field) = open.fields.get_mut(open.focus) {
                    if field.insert(ch) {
                        open.form.set(field.spec().name, field.value());
                        open.hint = None;
                    }
                }
                DialogTransition::Unchanged
            }
            _ => DialogTransition::Unchanged,
        }
    }

    pub fn draw(&self, frame: &mut Frame<'_>, area: Rect) {
        let DialogState::Open(open) = &self.state else {
            return;
        };
        let descriptor = open.kind.descriptor();
        let popup_area = centered_rect(60, 50, area);
        frame.render_widget(Clear, popup_area);

        let width = popup_area.width.saturating_sub(4) as usize;
        let mut lines: Vec<Line<'static>> = Vec::new();
        if let Some(subject) = &open.subject {
            lines.push(Line::from(Span::styled(
                format!("\"{subject}\""),
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .add_modifier(Modifier::BOLD),
            )));
        }
        if let Some(message) = descriptor.message {
            lines.push(Line::from(Span::styled(
                message,
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )));
        }
        for (index, field) in open.fields.iter().enumerate() {
            lines.push(Line::default());
            lines.extend(field.lines(index == open.focus, width));
        }
        if let Some(hint) = &open.hint {
            lines.push(Line::from(Span::styled(
                hint.clone(),
                Style::default().fg(COLOR_ERROR),
            )));
        }
        lines.push(Line::default());
        lines.push(Line::from(vec![
            Span::styled(
                format!("[Esc] {CANCEL_LABEL}"),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            ),
            Span::raw("   "),
            Span::styled(
                format!("[Enter] {}", descriptor.confirm_label),
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD),
            ),
        ]));

        let body = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(Span::styled(
                        descriptor.title,
                        Style::default()
                            .fg(COLOR_ACCENT)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(COLOR_ACCENT))
                    .style(Style::default().bg(COLOR_PANEL_BG)),
            )
            .wrap(Wrap { trim: false });
        frame.render_widget(body, popup_area);
    }
}
