//! Line-level server-sent event framing

/// One dispatched SSE event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, if any
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
}

/// Accumulates lines until a blank line completes a frame
#[derive(Debug, Default)]
pub struct FrameBuilder {
    event: Option<String>,
    data: Option<String>,
}

impl FrameBuilder {
    /// Feed one line (without its terminator)
    ///
    /// Returns a frame when `line` is blank and data has been collected.
    /// Comments and unknown fields are ignored.
    pub fn push(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            let event = self.event.take();
            return self.data.take().map(|data| SseFrame { event, data });
        }

        if let Some(value) = field(line, "event") {
            self.event = Some(value.to_owned());
        } else if let Some(value) = field(line, "data") {
            match &mut self.data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_owned()),
            }
        }

        None
    }
}

fn field<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let value = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(value.strip_prefix(' ').unwrap_or(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(input: &str) -> Vec<SseFrame> {
        let mut builder = FrameBuilder::default();
        input.lines().filter_map(|line| builder.push(line)).collect()
    }

    #[test]
    fn event_and_data_form_a_frame() {
        let out = frames("event: ping\ndata: {\"type\": \"ping\"}\n\n");

        assert_eq!(
            out,
            vec![SseFrame {
                event: Some("ping".to_owned()),
                data: r#"{"type": "ping"}"#.to_owned(),
            }]
        );
    }

    #[test]
    fn space_after_colon_is_optional() {
        let out = frames("event:message_stop\ndata:{}\n\n");

        assert_eq!(out[0].event.as_deref(), Some("message_stop"));
        assert_eq!(out[0].data, "{}");
    }

    #[test]
    fn data_lines_join_with_newline() {
        let out = frames("data: first\ndata: second\n\n");

        assert_eq!(out[0].data, "first\nsecond");
        assert_eq!(out[0].event, None);
    }

    #[test]
    fn comments_and_unknown_lines_are_ignored() {
        let out = frames(": keep-alive\nid: 7\nretry: 100\ngarbage\ndata: x\n\n");

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].data, "x");
    }

    #[test]
    fn blank_line_without_data_resets_event() {
        let out = frames("event: orphan\n\ndata: y\n\n");

        assert_eq!(out, vec![SseFrame { event: None, data: "y".to_owned() }]);
    }

    #[test]
    fn unterminated_frame_is_not_emitted() {
        assert!(frames("event: message_stop\ndata: {}").is_empty());
    }
}
