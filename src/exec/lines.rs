// src/exec/lines.rs

//! Incremental byte-to-line decoding for subprocess output.

/// Splits a byte stream into lines as chunks arrive.
///
/// - Terminators are `\n`, `\r\n` and a lone `\r` (progress bars redraw with
///   `\r`). The terminator is not part of the line.
/// - A line is emitted as soon as its terminator is seen; for `\r\n` the line
///   goes out at the `\r` and the following `\n` is swallowed, even across
///   chunk boundaries.
/// - Bytes are decoded as UTF-8; each invalid sequence becomes U+FFFD.
///   Line terminators are ASCII, so splitting on bytes never cuts a
///   multi-byte character.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
    after_cr: bool,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every line it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if self.after_cr {
                self.after_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\n' => lines.push(self.take_line()),
                b'\r' => {
                    lines.push(self.take_line());
                    self.after_cr = true;
                }
                _ => self.buf.push(byte),
            }
        }
        lines
    }

    /// End of stream: flush an unterminated trailing fragment.
    pub fn finish(&mut self) -> Option<String> {
        self.after_cr = false;
        if self.buf.is_empty() {
            None
        } else {
            Some(self.take_line())
        }
    }

    fn take_line(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        line
    }
}

/// Decode a complete buffer in one go.
pub fn split_lines(bytes: &[u8]) -> Vec<String> {
    let mut decoder = LineDecoder::new();
    let mut lines = decoder.feed(bytes);
    lines.extend(decoder.finish());
    lines
}
