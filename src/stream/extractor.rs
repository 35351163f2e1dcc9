//! Incremental extraction of back-to-back JSON objects from a text stream
//!
//! The generate route writes frames like
//! `{"phase":"thinking","think":"..."}{"phase":"response",...}` with no framing
//! of its own, and a network chunk may end anywhere: mid-object, mid-string or
//! right after a backslash. [`ExtractorState`] keeps the scan state next to the
//! buffer so that a frame is recognised the moment its closing brace arrives,
//! whatever the chunking.

use serde_json::Value;
use tracing::debug;
use tracing::warn;

/// Scanner state for one response body
#[derive(Debug, Default, Clone)]
pub struct ExtractorState {
    /// Text received but not yet consumed by a completed frame
    buffer: String,
    /// Next byte of `buffer` to scan
    cursor: usize,
    /// Brace depth outside string literals
    depth: usize,
    /// Byte offset of the `{` that opened the current top-level object
    object_start: Option<usize>,
    in_string: bool,
    escape_pending: bool,
    frames_emitted: usize,
    frames_malformed: usize,
}

impl ExtractorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every frame that closed because of it, in
    /// arrival order.
    ///
    /// Spans that close but fail to parse are logged and skipped.
    pub fn feed(&mut self, chunk: &str) -> Vec<Value> {
        self.buffer.push_str(chunk);
        let mut frames = Vec::new();

        while let Some(span_end) = self.scan_to_frame_end() {
            let start = self.object_start.take().unwrap_or(0);
            let span = &self.buffer[start..span_end];

            match serde_json::from_str::<Value>(span) {
                Ok(value) => {
                    self.frames_emitted += 1;
                    frames.push(value);
                }
                Err(e) => {
                    self.frames_malformed += 1;
                    warn!("Dropping malformed frame ({} bytes): {}", span.len(), e);
                }
            }

            self.buffer.drain(..span_end);
            self.cursor = 0;
        }

        // Between frames nothing scanned so far can belong to a future frame
        if self.object_start.is_none() && !self.in_string {
            self.buffer.clear();
            self.cursor = 0;
        }

        frames
    }

    /// Advance the cursor until a top-level object closes.
    ///
    /// Returns the exclusive end offset of the closed object, or `None` once
    /// the buffer is exhausted.
    fn scan_to_frame_end(&mut self) -> Option<usize> {
        let bytes = self.buffer.as_bytes();

        while self.cursor < bytes.len() {
            let index = self.cursor;
            let byte = bytes[index];
            self.cursor += 1;

            if self.in_string {
                if self.escape_pending {
                    self.escape_pending = false;
                } else if byte == b'\\' {
                    self.escape_pending = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
                continue;
            }

            match byte {
                b'"' => self.in_string = true,
                b'{' => {
                    if self.depth == 0 {
                        self.object_start = Some(index);
                    }
                    self.depth += 1;
                }
                b'}' => {
                    if self.depth == 0 {
                        debug!("Ignoring stray closing brace at offset {}", index);
                        continue;
                    }
                    self.depth -= 1;
                    if self.depth == 0 {
                        return Some(index + 1);
                    }
                }
                _ => {}
            }
        }

        None
    }

    /// End of input. Returns how many bytes of an unterminated trailing frame
    /// were dropped.
    pub fn finish(self) -> usize {
        let dropped = self
            .object_start
            .map_or(0, |start| self.buffer.len() - start);
        if dropped > 0 {
            debug!("Dropping {} bytes of unterminated trailing frame", dropped);
        }
        dropped
    }

    /// Bytes held back waiting for more input
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// True while a top-level object has been opened but not closed
    pub fn in_frame(&self) -> bool {
        self.object_start.is_some()
    }

    pub fn frames_emitted(&self) -> usize {
        self.frames_emitted
    }

    pub fn frames_malformed(&self) -> usize {
        self.frames_malformed
    }
}

/// Pure form of [`ExtractorState::feed`]: consume one chunk, returning the
/// completed frames together with the updated state.
pub fn consume(mut state: ExtractorState, chunk: &str) -> (Vec<Value>, ExtractorState) {
    let frames = state.feed(chunk);
    (frames, state)
}
