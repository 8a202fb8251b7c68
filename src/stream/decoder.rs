use thiserror::Error;

/// Longest unterminated line kept in memory by default.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line exceeds {limit} bytes without a newline")]
pub struct LineTooLong {
    pub limit: usize,
}

/// Reassembles newline-terminated text lines from arbitrary byte chunks.
///
/// Bytes are buffered until a `\n` arrives, so a chunk boundary inside a line,
/// or inside a multi-byte UTF-8 character, never corrupts the line.
///
/// The buffer is capped. Once an unterminated line outgrows the cap it is
/// dropped, reported once as [`LineTooLong`], and the rest of it is discarded
/// up to the next newline.
#[derive(Debug)]
pub struct LineDecoder {
    pending: Vec<u8>,
    max_line: usize,
    discarding: bool,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE_BYTES)
    }
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line,
            discarding: false,
        }
    }

    /// Feed one chunk and return every line it completed, without terminators.
    pub fn push(&mut self, mut chunk: &[u8]) -> Vec<Result<String, LineTooLong>> {
        let mut lines = Vec::new();

        if self.discarding {
            match chunk.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    self.discarding = false;
                    chunk = &chunk[end + 1..];
                }
                None => return lines,
            }
        }

        self.pending.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            lines.push(Ok(decode_line(&self.pending[start..end])));
            start = end + 1;
        }
        self.pending.drain(..start);

        if self.pending.len() > self.max_line {
            self.pending = Vec::new();
            self.discarding = true;
            lines.push(Err(LineTooLong {
                limit: self.max_line,
            }));
        }

        lines
    }

    /// Flush an unterminated final line, if any.
    pub fn finish(&mut self) -> Option<String> {
        self.discarding = false;
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(decode_line(&rest))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(decoded: Vec<Result<String, LineTooLong>>) -> Vec<String> {
        decoded.into_iter().map(|line| line.unwrap()).collect()
    }

    #[test]
    fn test_lines_split_across_chunks() {
        let mut decoder = LineDecoder::new();

        assert!(decoder.push(b"{\"resp").is_empty());
        assert_eq!(
            lines(decoder.push(b"onse\":1}\n{\"a\"")),
            vec!["{\"response\":1}"]
        );
        assert_eq!(lines(decoder.push(b":2}\n\n")), vec!["{\"a\":2}", ""]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let text = "héllo wörld\n".as_bytes();
        let mut decoder = LineDecoder::new();

        // 'é' is two bytes starting at index 1.
        assert!(decoder.push(&text[..2]).is_empty());
        assert_eq!(lines(decoder.push(&text[2..])), vec!["héllo wörld"]);
    }

    #[test]
    fn test_crlf_terminators_are_stripped() {
        let mut decoder = LineDecoder::new();
        assert_eq!(
            lines(decoder.push(b"data: x\r\ndata: y\r\n")),
            vec!["data: x", "data: y"]
        );
    }

    #[test]
    fn test_finish_flushes_unterminated_tail() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"{\"response\":\"end\"}").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("{\"response\":\"end\"}"));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_overlong_line_is_dropped_until_newline() {
        let mut decoder = LineDecoder::with_max_line(8);

        assert_eq!(
            decoder.push(b"ok\n0123456789"),
            vec![Ok("ok".to_string()), Err(LineTooLong { limit: 8 })]
        );
        // The tail of the dropped line is discarded without a second error.
        assert!(decoder.push(b"abcdefghijklmnop").is_empty());
        assert_eq!(lines(decoder.push(b"xyz\nnext\n")), vec!["next"]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_complete_lines_are_not_capped() {
        let mut decoder = LineDecoder::with_max_line(4);
        assert_eq!(lines(decoder.push(b"longer than four\n")), vec!["longer than four"]);
    }
}
