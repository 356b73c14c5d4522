use serde::Deserialize;

use crate::{NotificationEvent, TransportError};

/// A dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental `text/event-stream` decoder.
///
/// Chunks may split lines (and UTF-8 sequences) anywhere; only complete lines
/// are interpreted. An event is dispatched on the blank line that ends it.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
    event: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut dispatched = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            if let Some(event) = self.process_line(line) {
                dispatched.push(event);
            }
        }
        dispatched
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            let event = self.event.take();
            if self.data.is_empty() {
                return None;
            }
            let data = self.data.join("\n");
            self.data.clear();
            return Some(SseEvent { event, data });
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            _ => {}
        }
        None
    }
}

#[derive(Debug, Deserialize)]
struct NotificationWire {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<serde_json::Value>,
}

/// Interpret one event payload.
///
/// `Ok(None)` means a well-formed event of a type we do not display
/// (keepalives and anything other than `print`).
pub fn parse_notification(data: &str) -> Result<Option<NotificationEvent>, TransportError> {
    let wire: NotificationWire = serde_json::from_str(data)
        .map_err(|err| TransportError::InvalidResponse(format!("notification payload: {err}")))?;
    if wire.kind.as_deref() != Some("print") {
        return Ok(None);
    }
    match wire.message {
        Some(serde_json::Value::String(message)) => Ok(Some(NotificationEvent { message })),
        _ => Err(TransportError::InvalidResponse(
            "print notification without a string message".into(),
        )),
    }
}
