//! Incremental decoder for `text/event-stream` bodies.

use std::time::Duration;

use serde::Serialize;

pub const DEFAULT_EVENT_NAME: &str = "message";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
    /// Last event id seen when this event was dispatched.
    pub id: Option<String>,
}

/// Feeds on raw body chunks and yields complete events.
///
/// Lines may end in `\n`, `\r\n` or `\r`, and may be split anywhere across
/// chunks, including between the `\r` and `\n` of a pair.
#[derive(Debug, Default)]
pub struct SseParser {
    line: Vec<u8>,
    after_cr: bool,
    first_line: bool,
    event_type: String,
    data: String,
    last_event_id: String,
    retry: Option<Duration>,
}

impl SseParser {
    pub fn new() -> Self {
        Self {
            first_line: true,
            ..Self::default()
        }
    }

    /// Parser for a reconnected stream that keeps the previous last event id.
    pub fn resuming(last_event_id: &str) -> Self {
        Self {
            last_event_id: last_event_id.to_string(),
            ..Self::new()
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();

        for &byte in chunk {
            if self.after_cr {
                self.after_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }

            match byte {
                b'\r' => {
                    self.after_cr = true;
                    events.extend(self.finish_line());
                }
                b'\n' => events.extend(self.finish_line()),
                _ => self.line.push(byte),
            }
        }

        events
    }

    /// Reconnection time requested by the server, if any.
    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }

    pub fn last_event_id(&self) -> &str {
        &self.last_event_id
    }

    fn finish_line(&mut self) -> Option<SseEvent> {
        let raw = std::mem::take(&mut self.line);
        let decoded = String::from_utf8_lossy(&raw);
        let mut line: &str = &decoded;

        if self.first_line {
            self.first_line = false;
            line = line.strip_prefix('\u{feff}').unwrap_or(line);
        }

        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event_type = value.to_string(),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = value.to_string();
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(ms) = value.parse::<u64>() {
                        self.retry = Some(Duration::from_millis(ms));
                    }
                }
            }
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event_type = std::mem::take(&mut self.event_type);
        if self.data.is_empty() {
            return None;
        }

        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }

        Some(SseEvent {
            event: if event_type.is_empty() {
                DEFAULT_EVENT_NAME.to_string()
            } else {
                event_type
            },
            data,
            id: (!self.last_event_id.is_empty()).then(|| self.last_event_id.clone()),
        })
    }
}
