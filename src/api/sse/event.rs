//! Server-Sent Events wire framing

use std::fmt;

/// Keep-alive comment frame sent on idle streams
pub const KEEP_ALIVE: &str = ": keep-alive\n\n";

/// One Server-Sent Event
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    pub id: Option<String>,
    pub event: Option<String>,
    pub data: String,
}

impl SseEvent {
    /// An event carrying only data
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            id: None,
            event: None,
            data: data.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// A `message` event carrying one serialized JSON-RPC message
    pub fn message(data: impl Into<String>) -> Self {
        Self::new(data).with_event("message")
    }

    /// The fixed keep-alive frame
    pub fn keep_alive() -> &'static str {
        KEEP_ALIVE
    }

    /// Render the event as wire text.
    ///
    /// Each line of `data` becomes its own `data:` field, split on `\r\n`,
    /// `\n` or a lone `\r`, and there is always at least one. Line breaks in
    /// `id` and `event` are removed. The frame ends with a blank line.
    pub fn to_wire(&self) -> String {
        let mut out = String::with_capacity(self.data.len() + 32);
        if let Some(id) = &self.id {
            push_field(&mut out, "id", &single_line(id));
        }
        if let Some(event) = &self.event {
            push_field(&mut out, "event", &single_line(event));
        }
        for line in split_lines(&self.data) {
            push_field(&mut out, "data", line);
        }

        out.push('\n');
        out
    }
}

fn push_field(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push('\n');
}

/// Split on every SSE line terminator; `"x\n"` yields `["x", ""]`
fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find(['\r', '\n']) {
        lines.push(&rest[..pos]);
        let width = if rest[pos..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[pos + width..];
    }
    lines.push(rest);
    lines
}

/// Drop characters that would end or corrupt a header field
fn single_line(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n' | '\0'))
        .collect()
}

impl fmt::Display for SseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_event() {
        let event = SseEvent::new("{\"a\":1}").with_id("7").with_event("message");
        assert_eq!(event.to_wire(), "id: 7\nevent: message\ndata: {\"a\":1}\n\n");
    }

    #[test]
    fn test_data_only_omits_headers() {
        let wire = SseEvent::new("hello").to_wire();
        assert_eq!(wire, "data: hello\n\n");
        assert!(!wire.contains("id:"));
        assert!(!wire.contains("event:"));
    }

    #[test]
    fn test_multiline_data() {
        let wire = SseEvent::new("one\ntwo\nthree").to_wire();
        assert_eq!(wire, "data: one\ndata: two\ndata: three\n\n");
        assert_eq!(wire.matches("data: ").count(), 3);
    }

    #[test]
    fn test_crlf_lines_split() {
        let wire = SseEvent::new("a\r\nb").to_wire();
        assert_eq!(wire, "data: a\ndata: b\n\n");
    }

    #[test]
    fn test_lone_cr_splits_lines() {
        assert_eq!(SseEvent::new("a\rb").to_wire(), "data: a\ndata: b\n\n");
        assert_eq!(
            SseEvent::new("a\r\rb").to_wire(),
            "data: a\ndata: \ndata: b\n\n"
        );
    }

    #[test]
    fn test_trailing_newline_keeps_empty_line() {
        assert_eq!(SseEvent::new("x\n").to_wire(), "data: x\ndata: \n\n");
        assert_eq!(SseEvent::new("x\r\n").to_wire(), "data: x\ndata: \n\n");
    }

    #[test]
    fn test_header_fields_cannot_break_frame() {
        let wire = SseEvent::new("ok")
            .with_id("1\ndata: injected")
            .with_event("message\r\n\r\n")
            .to_wire();
        assert_eq!(wire, "id: 1data: injected\nevent: message\ndata: ok\n\n");
        assert_eq!(wire.matches('\n').count(), 4);
    }

    #[test]
    fn test_empty_data_still_has_data_line() {
        let wire = SseEvent::new("").with_event("ping").to_wire();
        assert_eq!(wire, "event: ping\ndata: \n\n");
    }

    #[test]
    fn test_always_ends_with_blank_line() {
        for data in ["", "x", "x\ny", "trailing\n"] {
            assert!(SseEvent::new(data).to_wire().ends_with("\n\n"));
        }
    }

    #[test]
    fn test_keep_alive_literal() {
        assert_eq!(SseEvent::keep_alive(), ": keep-alive\n\n");
    }
}
