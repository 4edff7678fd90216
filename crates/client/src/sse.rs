//! Incremental decoder for the `text/event-stream` wire format.
//!
//! Bytes arrive in arbitrary chunks; [`SseDecoder::feed`] buffers partial
//! lines and returns every event completed by the chunk. Supported
//! fields are `event`, `data` (repeated lines joined with `\n`) and `id`.
//! `retry` and comment lines are ignored. Lines may end in LF or CRLF.

use jobsync_core::backend::RawEvent;

/// Longest line accepted before the stream is considered broken.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum SseError {
    #[error("Event stream line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
}

/// Streaming SSE frame decoder.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to contain no newline.
    scanned: usize,
    max_line: usize,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line,
            event: None,
            data: Vec::new(),
            id: None,
        }
    }

    /// Feed one chunk and collect the events it completes.
    ///
    /// Fails once a single line grows past the configured limit; the
    /// decoder should be discarded after that.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<RawEvent>, SseError> {
        self.buffer.extend_from_slice(chunk);
        let buffer = std::mem::take(&mut self.buffer);

        let mut events = Vec::new();
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = buffer[from..].iter().position(|&b| b == b'\n') {
            let end = from + offset;
            if end - start > self.max_line {
                return Err(self.overflow());
            }
            let mut line = &buffer[start..end];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            if let Some(event) = self.process_line(&String::from_utf8_lossy(line)) {
                events.push(event);
            }
            start = end + 1;
            from = start;
        }

        self.buffer = buffer;
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
        if self.buffer.len() > self.max_line {
            return Err(self.overflow());
        }
        Ok(events)
    }

    fn overflow(&mut self) -> SseError {
        self.buffer.clear();
        self.scanned = 0;
        SseError::LineTooLong {
            limit: self.max_line,
        }
    }

    fn process_line(&mut self, line: &str) -> Option<RawEvent> {
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
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    /// Emit the pending event at a blank line. Frames with neither data
    /// nor an event name are dropped.
    fn dispatch(&mut self) -> Option<RawEvent> {
        let event = self.event.take();
        let id = self.id.take();
        if self.data.is_empty() && event.is_none() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(RawEvent { event, data, id })
    }
}
