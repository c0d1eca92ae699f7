//! Newline framing for the byte stream coming from the device.
//!
//! The transport delivers bytes in arbitrary chunks: a serial `read()` may
//! return half a line, three lines, or a line split in the middle of a UTF-8
//! sequence.  [`LineFramer`] buffers raw bytes until a `\n` arrives and only
//! then decodes the completed line, so the sequence of lines it yields does
//! not depend on how the input was chunked.
//!
//! # Decoding policy
//!
//! - Each completed line is decoded with [`String::from_utf8_lossy`]; invalid
//!   sequences become `U+FFFD` and never fail the feed.
//! - Leading and trailing whitespace (including the `\r` of a `\r\n` pair) is
//!   trimmed.
//! - Empty lines are yielded as empty strings.  Callers treat them as no-ops.
//!
//! # Overflow guard
//!
//! A peer that never sends a newline would otherwise grow the buffer without
//! bound.  Once more than [`LineFramer::limit`] unterminated bytes are
//! buffered, [`LineFramer::push`] fails with [`FramerError::Overflow`] and the
//! buffer is discarded.

use thiserror::Error;

/// Default cap on buffered, not-yet-terminated bytes.
pub const DEFAULT_MAX_UNTERMINATED: usize = 4096;

/// Errors produced while framing the inbound byte stream.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FramerError {
    /// The peer sent more than `limit` bytes without a newline.
    #[error("frame overflow: {buffered} unterminated bytes exceed the {limit}-byte limit")]
    Overflow { buffered: usize, limit: usize },
}

/// Accumulates inbound bytes and splits them into trimmed text lines.
#[derive(Debug)]
pub struct LineFramer {
    buf: Vec<u8>,
    limit: usize,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineFramer {
    /// Creates a framer with the default 4 KiB unterminated-bytes limit.
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_UNTERMINATED)
    }

    /// Creates a framer that fails once more than `limit` unterminated bytes
    /// are buffered.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: Vec::with_capacity(256),
            limit,
        }
    }

    /// The configured unterminated-bytes limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of bytes currently buffered (complete and partial lines).
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Discards everything buffered so far.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Appends `bytes` to the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`FramerError::Overflow`] when the bytes after the last newline
    /// exceed the limit.  The buffer is cleared in that case.
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), FramerError> {
        self.buf.extend_from_slice(bytes);

        let unterminated = match self.buf.iter().rposition(|&b| b == b'\n') {
            Some(pos) => self.buf.len() - pos - 1,
            None => self.buf.len(),
        };
        if unterminated > self.limit {
            self.buf.clear();
            return Err(FramerError::Overflow {
                buffered: unterminated,
                limit: self.limit,
            });
        }
        Ok(())
    }

    /// Removes and returns the next complete line, or `None` if no newline is
    /// buffered yet.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let line = String::from_utf8_lossy(&self.buf[..pos]).trim().to_string();
        self.buf.drain(..=pos);
        Some(line)
    }

    /// Appends `bytes` and returns a lazy iterator over the lines that are now
    /// complete.
    ///
    /// Lines not pulled from the iterator stay buffered and are returned by
    /// later calls.
    ///
    /// # Errors
    ///
    /// Same as [`LineFramer::push`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use songled_core::protocol::LineFramer;
    ///
    /// let mut framer = LineFramer::new();
    /// let first: Vec<String> = framer.feed(b"VOL G").unwrap().collect();
    /// assert!(first.is_empty());
    /// let second: Vec<String> = framer.feed(b"ET\r\nMUTE\n").unwrap().collect();
    /// assert_eq!(second, vec!["VOL GET", "MUTE"]);
    /// ```
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Lines<'_>, FramerError> {
        self.push(bytes)?;
        Ok(Lines { framer: self })
    }
}

/// Iterator returned by [`LineFramer::feed`].
pub struct Lines<'a> {
    framer: &'a mut LineFramer,
}

impl Iterator for Lines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.framer.next_line()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_all(framer: &mut LineFramer, bytes: &[u8]) -> Vec<String> {
        framer.feed(bytes).expect("feed").collect()
    }

    #[test]
    fn test_feed_yields_nothing_without_newline() {
        let mut framer = LineFramer::new();
        assert!(collect_all(&mut framer, b"HELLO").is_empty());
        assert_eq!(framer.buffered(), 5);
    }

    #[test]
    fn test_feed_yields_trimmed_line_and_resets_buffer() {
        // Arrange
        let mut framer = LineFramer::new();

        // Act
        let lines = collect_all(&mut framer, b"  SPK LIST \r\n");

        // Assert
        assert_eq!(lines, vec!["SPK LIST"]);
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_feed_yields_multiple_lines_in_order() {
        let mut framer = LineFramer::new();
        let lines = collect_all(&mut framer, b"HELLO\nVOL GET\nMUTE\n");
        assert_eq!(lines, vec!["HELLO", "VOL GET", "MUTE"]);
    }

    #[test]
    fn test_feed_keeps_partial_tail_for_next_call() {
        let mut framer = LineFramer::new();
        assert_eq!(collect_all(&mut framer, b"VOL +5\nVOL"), vec!["VOL +5"]);
        assert_eq!(collect_all(&mut framer, b" -5\n"), vec!["VOL -5"]);
    }

    #[test]
    fn test_empty_lines_are_yielded_as_empty_strings() {
        let mut framer = LineFramer::new();
        let lines = collect_all(&mut framer, b"\n  \nMUTE\n");
        assert_eq!(lines, vec!["", "", "MUTE"]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced_not_rejected() {
        let mut framer = LineFramer::new();
        let lines = collect_all(&mut framer, b"SPK ITEM 0 A\xFFB\n");
        assert_eq!(lines, vec!["SPK ITEM 0 A\u{FFFD}B"]);
    }

    #[test]
    fn test_multibyte_sequence_split_across_chunks_decodes_intact() {
        // "é" is 0xC3 0xA9; split it between two reads.
        let mut framer = LineFramer::new();
        assert!(collect_all(&mut framer, b"caf\xC3").is_empty());
        assert_eq!(collect_all(&mut framer, b"\xA9\n"), vec!["café"]);
    }

    #[test]
    fn test_chunking_invariance_for_every_chunk_size() {
        // Arrange
        let input: &[u8] =
            b"HELLO\r\nVOL SET 40\n\nSPK ITEM 1 Kopfh\xC3\xB6rer\nbad \xFE byte\nMUTE\ntail";
        let mut whole = LineFramer::new();
        let expected = collect_all(&mut whole, input);

        for chunk_size in 1..=input.len() {
            // Act
            let mut framer = LineFramer::new();
            let mut got = Vec::new();
            for chunk in input.chunks(chunk_size) {
                got.extend(collect_all(&mut framer, chunk));
            }

            // Assert
            assert_eq!(got, expected, "chunk size {chunk_size} diverged");
        }
    }

    #[test]
    fn test_overflow_when_unterminated_bytes_exceed_limit() {
        // Arrange
        let mut framer = LineFramer::with_limit(8);

        // Act
        let result = framer.push(b"0123456789");

        // Assert
        assert_eq!(
            result.err(),
            Some(FramerError::Overflow {
                buffered: 10,
                limit: 8
            })
        );
        assert_eq!(framer.buffered(), 0, "buffer must be discarded on overflow");
    }

    #[test]
    fn test_overflow_counts_only_bytes_after_last_newline() {
        let mut framer = LineFramer::with_limit(8);
        // 12 bytes total, but only 4 are unterminated.
        assert!(framer.push(b"ABCDEFG\nHIJK").is_ok());
        assert_eq!(framer.next_line().as_deref(), Some("ABCDEFG"));
    }

    #[test]
    fn test_overflow_accumulates_across_pushes() {
        let mut framer = LineFramer::with_limit(8);
        assert!(framer.push(b"12345").is_ok());
        assert!(matches!(
            framer.push(b"6789"),
            Err(FramerError::Overflow { buffered: 9, .. })
        ));
    }

    #[test]
    fn test_default_limit_is_four_kib() {
        assert_eq!(LineFramer::new().limit(), 4096);
    }

    #[test]
    fn test_unpulled_lines_stay_buffered() {
        let mut framer = LineFramer::new();
        let first = framer.feed(b"A\nB\n").unwrap().next();
        assert_eq!(first.as_deref(), Some("A"));
        assert_eq!(framer.next_line().as_deref(), Some("B"));
        assert_eq!(framer.next_line(), None);
    }
}
