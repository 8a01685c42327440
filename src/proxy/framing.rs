//! Newline-delimited message framing for the helper's stdout
//!
//! The helper writes one JSON envelope per line, but the pipe hands us
//! arbitrary chunks. [`MessageFramer`] buffers the unterminated tail of each
//! chunk and emits only complete messages.
//!
//! Buffering is done on bytes, not text: `\n` never occurs inside a multi-byte
//! UTF-8 sequence, so splitting on it is safe even when a chunk boundary falls
//! in the middle of a character.

/// Default cap on a single buffered message (64 MB).
///
/// A helper that never terminates its output would otherwise grow the carry
/// buffer without bound.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

/// How the framer decides that a message is complete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FramingMode {
    /// Only a newline terminates a message
    #[default]
    NewlineOnly,
    /// A newline terminates a message, and so does a chunk whose trailing
    /// unterminated piece ends in `}`.
    ///
    /// This matches helpers that sometimes omit the final newline. It is an
    /// approximation of "the JSON object is closed": a chunk boundary right
    /// after a nested `}` is misread as the end of the message.
    BraceTerminated,
}

/// Reassembles complete messages from arbitrarily chunked input
///
/// A message whose unterminated part grows past the size cap is dropped
/// whole: everything up to its newline is skipped and nothing of it is
/// emitted. The request it answered therefore stays pending.
#[derive(Debug)]
pub struct MessageFramer {
    mode: FramingMode,
    max_message_bytes: usize,
    buffer: Vec<u8>,
    /// Inside an oversized message, dropping bytes until the next newline
    skipping: bool,
    discarded: u64,
}

impl Default for MessageFramer {
    fn default() -> Self {
        Self {
            mode: FramingMode::default(),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            buffer: Vec::new(),
            skipping: false,
            discarded: 0,
        }
    }
}

impl MessageFramer {
    /// Creates a framer using [`FramingMode::NewlineOnly`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a framer with an explicit framing mode
    pub fn with_mode(mode: FramingMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Sets the size above which an unterminated message is dropped
    pub fn with_max_message_bytes(mut self, max_message_bytes: usize) -> Self {
        self.max_message_bytes = max_message_bytes;
        self
    }

    /// Feeds a chunk and returns every message it completes, in order
    ///
    /// Empty and whitespace-only lines are skipped. Emitted messages are
    /// trimmed, so `\r\n` line endings are accepted.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut messages = Vec::new();
        let mut rest = chunk;

        if self.skipping {
            match rest.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    rest = &rest[pos + 1..];
                    self.skipping = false;
                }
                None => return messages,
            }
        }

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let line = &rest[..pos];
            rest = &rest[pos + 1..];

            if self.buffer.is_empty() {
                push_message(line, &mut messages);
            } else {
                self.buffer.extend_from_slice(line);
                let joined = std::mem::take(&mut self.buffer);
                push_message(&joined, &mut messages);
            }
        }

        if !rest.is_empty() {
            self.buffer.extend_from_slice(rest);

            if self.mode == FramingMode::BraceTerminated
                && self.buffer.trim_ascii_end().ends_with(b"}")
            {
                let joined = std::mem::take(&mut self.buffer);
                push_message(&joined, &mut messages);
            } else if self.buffer.len() > self.max_message_bytes {
                tracing::warn!(
                    buffered = self.buffer.len(),
                    max = self.max_message_bytes,
                    "Dropping oversized helper message"
                );
                self.buffer = Vec::new();
                self.skipping = true;
                self.discarded += 1;
            }
        }

        messages
    }

    /// Convenience wrapper around [`feed`](Self::feed) for text chunks
    pub fn feed_str(&mut self, chunk: &str) -> Vec<String> {
        self.feed(chunk.as_bytes())
    }

    /// Number of bytes currently waiting for a terminator
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Number of oversized messages dropped so far
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

fn push_message(bytes: &[u8], messages: &mut Vec<String>) {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        messages.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &str = concat!(
        r#"{"id":"0","result":{"windows":[{"handle":1,"title":"Editor"}]}}"#,
        "\n",
        r#"{"id":"1","error":{"code":-32000,"message":"denied"}}"#,
        "\n",
        r#"{"id":"2","result":"ümlaut ✓"}"#,
        "\n",
    );

    fn expected_lines() -> Vec<String> {
        STREAM.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_split_message_across_two_chunks() {
        let mut framer = MessageFramer::new();

        let first = framer.feed_str("{\"id\":\"0\",\"result\":1}\n{\"id\":\"1\"");
        assert_eq!(first, vec![r#"{"id":"0","result":1}"#]);
        assert!(framer.pending_bytes() > 0);

        let second = framer.feed_str(",\"result\":2}\n");
        assert_eq!(second, vec![r#"{"id":"1","result":2}"#]);
        assert_eq!(framer.pending_bytes(), 0);
    }

    #[test]
    fn test_every_two_point_split_yields_each_line_once() {
        let bytes = STREAM.as_bytes();

        for i in 0..=bytes.len() {
            for j in i..=bytes.len() {
                let mut framer = MessageFramer::new();
                let mut out = framer.feed(&bytes[..i]);
                out.extend(framer.feed(&bytes[i..j]));
                out.extend(framer.feed(&bytes[j..]));

                assert_eq!(out, expected_lines(), "split at {i}/{j}");
                assert_eq!(framer.pending_bytes(), 0);
            }
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut framer = MessageFramer::new();
        let out: Vec<String> = STREAM
            .as_bytes()
            .iter()
            .flat_map(|b| framer.feed(std::slice::from_ref(b)))
            .collect();

        assert_eq!(out, expected_lines());
    }

    #[test]
    fn test_skips_blank_lines_and_trims_crlf() {
        let mut framer = MessageFramer::new();
        let out = framer.feed_str("\n   \n{\"id\":\"0\",\"result\":null}\r\n\n");

        assert_eq!(out, vec![r#"{"id":"0","result":null}"#]);
    }

    #[test]
    fn test_newline_only_waits_for_terminator() {
        let mut framer = MessageFramer::new();

        assert!(framer.feed_str(r#"{"id":"0","result":{"a":1}}"#).is_empty());
        assert_eq!(framer.feed_str("\n"), vec![r#"{"id":"0","result":{"a":1}}"#]);
    }

    #[test]
    fn test_nested_brace_at_chunk_boundary_is_not_split() {
        let mut framer = MessageFramer::new();

        assert!(framer.feed_str(r#"{"id":"0","result":{"a":1}"#).is_empty());
        assert_eq!(framer.feed_str("}\n"), vec![r#"{"id":"0","result":{"a":1}}"#]);
    }

    #[test]
    fn test_brace_mode_accepts_unterminated_object() {
        let mut framer = MessageFramer::with_mode(FramingMode::BraceTerminated);

        assert_eq!(
            framer.feed_str(r#"{"id":"0","result":1}"#),
            vec![r#"{"id":"0","result":1}"#]
        );
        assert_eq!(framer.pending_bytes(), 0);
    }

    #[test]
    fn test_brace_mode_misreads_nested_close() {
        let mut framer = MessageFramer::with_mode(FramingMode::BraceTerminated);

        let first = framer.feed_str(r#"{"id":"0","result":{"a":1}"#);
        assert_eq!(first, vec![r#"{"id":"0","result":{"a":1}"#]);

        let second = framer.feed_str("}\n");
        assert_eq!(second, vec!["}"]);
    }

    #[test]
    fn test_brace_mode_defers_other_fragments() {
        let mut framer = MessageFramer::with_mode(FramingMode::BraceTerminated);

        assert!(framer.feed_str(r#"{"id":"0","#).is_empty());
        assert_eq!(
            framer.feed_str(r#""result":true}"#),
            vec![r#"{"id":"0","result":true}"#]
        );
    }

    #[test]
    fn test_oversized_line_is_dropped_whole() {
        let mut framer = MessageFramer::new().with_max_message_bytes(16);

        assert!(framer.feed_str(r#"{"id":"0","result":"aaaa"#).is_empty());
        assert_eq!(framer.pending_bytes(), 0);
        assert_eq!(framer.discarded(), 1);

        assert!(framer.feed_str("aaaaaaaaaaaaaaaaaaaaaaaa").is_empty());

        let out = framer.feed_str("aaaa\"}\n{\"id\":\"1\",\"result\":1}\n");
        assert_eq!(out, vec![r#"{"id":"1","result":1}"#]);
        assert_eq!(framer.discarded(), 1);
        assert_eq!(framer.pending_bytes(), 0);
    }

    #[test]
    fn test_complete_line_within_one_chunk_ignores_cap() {
        let mut framer = MessageFramer::new().with_max_message_bytes(8);

        let out = framer.feed_str("{\"id\":\"0\",\"result\":\"long\"}\n");

        assert_eq!(out.len(), 1);
        assert_eq!(framer.discarded(), 0);
    }
}
