use crate::payload::ChatChunk;

/// Stream event emitted by the parser after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatStreamEvent {
    /// Incremental reply text from the first choice's delta.
    ContentDelta { delta: String },
    /// The `[DONE]` sentinel: the reply is complete.
    Done,
}

/// Incremental parser for SSE text streams.
#[derive(Debug, Default)]
pub struct SseStreamParser {
    buffer: String,
}

impl SseStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ChatStreamEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut events = Vec::new();

        while let Some(split) = self.buffer.find("\n\n") {
            let frame = self.buffer[..split].to_string();
            self.buffer.drain(0..split + 2);

            if let Some(payload) = extract_data_payload(&frame) {
                if payload == "[DONE]" {
                    events.push(ChatStreamEvent::Done);
                    continue;
                }
                if payload.is_empty() {
                    continue;
                }

                if let Ok(chunk) = serde_json::from_str::<ChatChunk>(&payload) {
                    if let Some(event) = map_chunk(&chunk) {
                        events.push(event);
                    }
                }
            }
        }

        events
    }

    /// Parse a complete SSE payload string in one shot.
    pub fn parse_frames(input: &str) -> Vec<ChatStreamEvent> {
        let mut parser = Self::default();
        parser.feed(input.as_bytes())
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.trim().is_empty()
    }
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

fn map_chunk(chunk: &ChatChunk) -> Option<ChatStreamEvent> {
    let delta = chunk.choices.first()?.delta.content.as_deref()?;
    if delta.is_empty() {
        return None;
    }

    Some(ChatStreamEvent::ContentDelta {
        delta: delta.to_string(),
    })
}
