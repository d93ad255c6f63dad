use std::fmt;

use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use textwrap::{wrap, Options as WrapOptions};

use crate::theme::{COLOR_ACCENT, COLOR_ERROR, COLOR_TEXT_PRIMARY, COLOR_TEXT_SECONDARY};

/// Static description of one form input and its constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub required: bool,
    pub min_len: usize,
    pub max_len: Option<usize>,
    pub placeholder: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    Required,
    TooShort { min: usize },
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::Required => write!(f, "Preencha este campo."),
            FieldError::TooShort { min } => write!(f, "Use pelo menos {min} caracteres."),
        }
    }
}

/// Single text input. Enforces `max_len` while typing; `required` and
/// `min_len` are checked by [`TextField::validate`] before a form submits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextField {
    spec: &'static FieldSpec,
    value: String,
}

impl TextField {
    pub fn new(spec: &'static FieldSpec) -> Self {
        Self {
            spec,
            value: String::new(),
        }
    }

    pub fn with_value(spec: &'static FieldSpec, value: &str) -> Self {
        let mut field = Self::new(spec);
        field.set_value(value);
        field
    }

    pub fn spec(&self) -> &'static FieldSpec {
        self.spec
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: &str) {
        self.value = match self.spec.max_len {
            Some(max) => value.chars().take(max).collect(),
            None => value.to_string(),
        };
    }

    /// Appends a character; refused once the field is full.
    pub fn insert(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        if let Some(max) = self.spec.max_len {
            if self.value.chars().count() >= max {
                return false;
            }
        }
        self.value.push(ch);
        true
    }

    pub fn backspace(&mut self) -> bool {
        self.value.pop().is_some()
    }

    pub fn validate(&self) -> Result<(), FieldError> {
        let len = self.value.trim().chars().count();
        if len == 0 {
            if self.spec.required {
                return Err(FieldError::Required);
            }
            return Ok(());
        }
        if len < self.spec.min_len {
            return Err(FieldError::TooShort {
                min: self.spec.min_len,
            });
        }
        Ok(())
    }

    pub fn lines(&self, focused: bool, width: usize) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        let mut label = vec![Span::styled(
            self.spec.label.to_string(),
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .add_modifier(Modifier::BOLD),
        )];
        if self.spec.required {
            label.push(Span::styled("*", Style::default().fg(COLOR_ERROR)));
        }
        if let Some(max) = self.spec.max_len {
            label.push(Span::styled(
                format!("  {}/{max}", self.value.chars().count()),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            ));
        }
        lines.push(Line::from(label));

        let marker = if focused { "▌ " } else { "  " };
        let marker_style = Style::default().fg(COLOR_ACCENT);
        let (text, style) = if self.value.is_empty() {
            (
                self.spec.placeholder.to_string(),
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC),
            )
        } else {
            (self.value.clone(), Style::default().fg(COLOR_TEXT_PRIMARY))
        };
        let wrap_width = width.saturating_sub(2).max(8);
        let wrapped = wrap(&text, WrapOptions::new(wrap_width));
        if wrapped.is_empty() {
            lines.push(Line::from(Span::styled(marker, marker_style)));
        }
        for chunk in wrapped {
            lines.push(Line::from(vec![
                Span::styled(marker, marker_style),
                Span::styled(chunk.into_owned(), style),
            ]));
        }
        lines
    }
}
