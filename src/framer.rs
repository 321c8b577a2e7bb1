// src/framer.rs
//
// Line framing and decoding for the serial byte stream.
// Splits raw bytes on a fixed terminator sequence and decodes each frame
// as lossy UTF-8, so a corrupted byte run never stalls the stream.

/// Default frame terminator for device consoles (CRLF).
pub const DEFAULT_TERMINATOR: &[u8] = b"\r\n";

/// Default forced-split length for terminator-less streams.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Stateful line framer for streaming data.
/// Buffers bytes across reads and emits one decoded line per terminator.
pub struct LineFramer {
    buffer: Vec<u8>,
    terminator: Vec<u8>,
    max_length: usize,
}

impl LineFramer {
    pub fn new(terminator: &[u8], max_length: usize) -> Self {
        LineFramer {
            buffer: Vec::new(),
            terminator: terminator.to_vec(),
            max_length,
        }
    }

    /// Feed raw bytes into the framer.
    /// Returns the decoded lines completed by this chunk, terminator stripped.
    /// Invalid UTF-8 sequences decode to U+FFFD; decoding never fails.
    pub fn feed(&mut self, data: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        for &byte in data {
            self.buffer.push(byte);

            // Check for terminator match at end of buffer
            if self.buffer.len() >= self.terminator.len() {
                let start = self.buffer.len() - self.terminator.len();
                let tail = &self.buffer[start..];

                if tail == self.terminator.as_slice() {
                    let frame: Vec<u8> = self.buffer.drain(..start).collect();
                    self.buffer.clear(); // Clear terminator
                    lines.push(decode_lossy(&frame));
                }
            }

            // Force split on max length
            if self.buffer.len() >= self.max_length {
                let frame: Vec<u8> = self.buffer.drain(..).collect();
                lines.push(decode_lossy(&frame));
            }
        }

        lines
    }

    /// Flush any remaining buffered bytes as a final line.
    /// Call when the stream ends; the line had no terminator.
    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            let frame: Vec<u8> = self.buffer.drain(..).collect();
            Some(decode_lossy(&frame))
        }
    }

    pub fn terminator(&self) -> &[u8] {
        &self.terminator
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        LineFramer::new(DEFAULT_TERMINATOR, DEFAULT_MAX_LINE_LENGTH)
    }
}

/// Decode a frame as UTF-8, replacing invalid sequences with U+FFFD.
fn decode_lossy(frame: &[u8]) -> String {
    String::from_utf8_lossy(frame).into_owned()
}

/// Encode a text line for transmission: UTF-8 bytes plus the terminator.
pub fn encode_line(text: &str, terminator: &[u8]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(text.len() + terminator.len());
    encoded.extend_from_slice(text.as_bytes());
    encoded.extend_from_slice(terminator);
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crlf_framer() -> LineFramer {
        LineFramer::new(DEFAULT_TERMINATOR, DEFAULT_MAX_LINE_LENGTH)
    }

    #[test]
    fn test_crlf_framing() {
        let mut framer = crlf_framer();

        let lines = framer.feed(b"Hello\r\nWorld\r\n");

        assert_eq!(lines, vec!["Hello".to_string(), "World".to_string()]);
    }

    #[test]
    fn test_line_split_across_reads() {
        let mut framer = crlf_framer();

        assert!(framer.feed(b"Hel").is_empty());
        assert!(framer.feed(b"lo\r").is_empty());
        let lines = framer.feed(b"\nnext\r\n");

        assert_eq!(lines, vec!["Hello".to_string(), "next".to_string()]);
    }

    #[test]
    fn test_empty_line_is_emitted() {
        let mut framer = crlf_framer();

        let lines = framer.feed(b"a\r\n\r\nb\r\n");

        assert_eq!(
            lines,
            vec!["a".to_string(), "".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_invalid_utf8_decodes_lossily() {
        let mut framer = crlf_framer();

        // 0xFF 0xFE is not valid UTF-8; the line still comes through
        let lines = framer.feed(b"ok\r\nbad\xFF\xFEend\r\nafter\r\n");

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "ok");
        assert_eq!(lines[1], "bad\u{FFFD}\u{FFFD}end");
        assert_eq!(lines[2], "after");
    }

    #[test]
    fn test_multibyte_utf8_split_across_reads() {
        let mut framer = crlf_framer();

        // Multi-byte codepoints split across reads must decode intact
        let bytes = "za\u{17C}\u{F3}\u{142}\r\n".as_bytes();
        let (a, b) = bytes.split_at(3);
        assert!(framer.feed(a).is_empty());
        let lines = framer.feed(b);

        assert_eq!(lines, vec!["za\u{17C}\u{F3}\u{142}".to_string()]);
    }

    #[test]
    fn test_max_length_forces_split() {
        let mut framer = LineFramer::new(b"\n", 5);

        let lines = framer.feed(b"12345678"); // 8 bytes, no terminator

        assert_eq!(lines, vec!["12345".to_string()]);

        // Remaining 3 bytes in buffer
        assert_eq!(framer.flush(), Some("678".to_string()));
    }

    #[test]
    fn test_flush_returns_partial_line() {
        let mut framer = crlf_framer();

        assert!(framer.feed(b"partial").is_empty());
        assert_eq!(framer.flush(), Some("partial".to_string()));
        assert_eq!(framer.flush(), None);
    }

    #[test]
    fn test_encode_line_appends_terminator() {
        assert_eq!(encode_line("hello", DEFAULT_TERMINATOR), b"hello\r\n");
        assert_eq!(encode_line("", b"\n"), b"\n");
    }
}
