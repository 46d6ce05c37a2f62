use crate::payload::GenerateResponse;

/// Incremental parser for Gemini SSE streams.
///
/// Frames are `data:`-prefixed JSON blocks separated by blank lines; there
/// is no completion sentinel, the stream simply ends.
#[derive(Debug, Default)]
pub struct SseStreamParser {
    buffer: String,
}

impl SseStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete text deltas.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut deltas = Vec::new();

        while let Some(split) = self.buffer.find("\n\n") {
            let frame = self.buffer[..split].to_string();
            self.buffer.drain(0..split + 2);

            let payload: String = frame
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(str::trim)
                .collect::<Vec<_>>()
                .join("\n");
            if payload.is_empty() {
                continue;
            }

            if let Ok(response) = serde_json::from_str::<GenerateResponse>(&payload) {
                let text = response.text();
                if !text.is_empty() {
                    deltas.push(text);
                }
            }
        }

        deltas
    }

    /// Parse a complete SSE payload string in one shot.
    pub fn parse_frames(input: &str) -> Vec<String> {
        let mut parser = Self::default();
        parser.feed(input.as_bytes())
    }
}
