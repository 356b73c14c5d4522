//! Ordered, append-only display log of the conversation.

pub mod format;

use format::{MessageLayout, layout_message, render_entry};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Bot,
    System,
}

impl Role {
    pub fn css_class(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Bot => "bot",
            Role::System => "system",
        }
    }
}

/// An immutable transcript record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    role: Role,
    text: String,
    sequence: u64,
}

impl Message {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// A message together with its rendered forms.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    message: Message,
    markup: String,
    layout: MessageLayout,
}

impl TranscriptEntry {
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Escaped markup fragment for this entry.
    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn layout(&self) -> &MessageLayout {
        &self.layout
    }
}

#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    next_sequence: u64,
    scroll_from_bottom: usize,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message and jump the view back to the newest entry.
    pub fn append(&mut self, role: Role, text: impl Into<String>) -> &Message {
        let text = text.into();
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let entry = TranscriptEntry {
            markup: render_entry(role, &text),
            layout: layout_message(role, &text),
            message: Message {
                role,
                text,
                sequence,
            },
        };
        trace!(target: "dockhand::transcript", sequence, role = ?role, "appended message");
        self.entries.push(entry);
        self.scroll_from_bottom = 0;
        &self.entries[self.entries.len() - 1].message
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|entry| &entry.message)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.entries.last().map(|entry| &entry.message)
    }

    pub fn scroll_from_bottom(&self) -> usize {
        self.scroll_from_bottom
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_from_bottom = self.scroll_from_bottom.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_from_bottom = self.scroll_from_bottom.saturating_sub(lines);
    }

    /// Whole log as one markup document body.
    pub fn to_markup(&self) -> String {
        self.entries
            .iter()
            .map(|entry| entry.markup.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
