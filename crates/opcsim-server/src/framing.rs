//! Bounded newline framing for request lines.
//!
//! [`LineReader`] yields one [`Line`] per `\n`-terminated request. Bytes
//! that are not UTF-8 and lines longer than [`MAX_LINE_BYTES`] come back
//! as their own variants so the session can answer them and keep going.
//! An over-long line is reported once and the rest of it is discarded up
//! to the next newline.
//!
//! `next_line` is cancel safe: partial input stays in the reader's
//! buffer, so it can sit in a `select!` next to other branches.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Longest request line accepted, newline excluded.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// One framed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Line {
    /// A complete UTF-8 line without its terminator.
    Text(String),
    /// A complete line that is not UTF-8, rendered lossily.
    InvalidUtf8(String),
    /// A line that passed [`MAX_LINE_BYTES`].
    TooLong,
}

/// Reads [`Line`]s from a buffered reader.
#[derive(Debug)]
pub(crate) struct LineReader<R> {
    reader: R,
    buf: Vec<u8>,
    max_len: usize,
    discarding: bool,
}

impl<R> LineReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub(crate) const fn new(reader: R) -> Self {
        Self::with_max_len(reader, MAX_LINE_BYTES)
    }

    pub(crate) const fn with_max_len(reader: R, max_len: usize) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            max_len,
            discarding: false,
        }
    }

    /// Next line, or `None` at end of stream.
    pub(crate) async fn next_line(&mut self) -> std::io::Result<Option<Line>> {
        loop {
            // One byte past the limit, so a full-length line still fits
            // together with its newline.
            let budget = self
                .max_len
                .saturating_add(1)
                .saturating_sub(self.buf.len());
            let read = (&mut self.reader)
                .take(u64::try_from(budget).unwrap_or(u64::MAX))
                .read_until(b'\n', &mut self.buf)
                .await?;

            if self.buf.last() == Some(&b'\n') {
                self.buf.pop();
                if self.buf.last() == Some(&b'\r') {
                    self.buf.pop();
                }
                if std::mem::take(&mut self.discarding) {
                    self.buf.clear();
                    continue;
                }
                return Ok(Some(self.decode()));
            }

            if self.buf.len() > self.max_len {
                self.buf.clear();
                if self.discarding {
                    continue;
                }
                self.discarding = true;
                return Ok(Some(Line::TooLong));
            }

            // No newline and under the limit: the stream ended.
            if read == 0 && self.buf.is_empty() {
                return Ok(None);
            }
            if self.discarding {
                self.buf.clear();
                return Ok(None);
            }
            return Ok(Some(self.decode()));
        }
    }

    fn decode(&mut self) -> Line {
        let bytes = std::mem::take(&mut self.buf);
        match String::from_utf8(bytes) {
            Ok(text) => Line::Text(text),
            Err(e) => Line::InvalidUtf8(String::from_utf8_lossy(e.as_bytes()).into_owned()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::io::BufReader;

    use super::*;

    async fn collect(input: &[u8], max_len: usize) -> Vec<Line> {
        let mut reader = LineReader::with_max_len(BufReader::new(input), max_len);
        let mut lines = Vec::new();
        while let Some(line) = reader.next_line().await.unwrap() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn splits_on_newlines_and_strips_cr() {
        let lines = collect(b"one\r\ntwo\nthree", 64).await;
        assert_eq!(
            lines,
            vec![
                Line::Text(String::from("one")),
                Line::Text(String::from("two")),
                Line::Text(String::from("three")),
            ]
        );
    }

    #[tokio::test]
    async fn invalid_utf8_is_reported_and_reading_continues() {
        let lines = collect(b"{\"op\":\"browse\xff\"}\nnext\n", 64).await;
        assert_eq!(lines.len(), 2);
        assert!(matches!(lines.first(), Some(Line::InvalidUtf8(text)) if text.contains("browse")));
        assert_eq!(lines.get(1), Some(&Line::Text(String::from("next"))));
    }

    #[tokio::test]
    async fn over_long_line_is_reported_once_then_skipped() {
        let mut input = vec![b'x'; 40];
        input.extend_from_slice(b"\nok\n");
        let lines = collect(&input, 8).await;
        assert_eq!(lines, vec![Line::TooLong, Line::Text(String::from("ok"))]);
    }

    #[tokio::test]
    async fn line_at_the_limit_is_accepted() {
        let lines = collect(b"12345678\n", 8).await;
        assert_eq!(lines, vec![Line::Text(String::from("12345678"))]);
    }

    #[tokio::test]
    async fn empty_input_ends_immediately() {
        assert!(collect(b"", 8).await.is_empty());
    }
}
