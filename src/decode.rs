//! Streaming charset decoding
//!
//! Wraps a byte reader and yields UTF-8, converting from the declared encoding as it goes.
//! Malformed sequences become U+FFFD instead of errors, so a damaged file still produces a
//! best-effort table.

use encoding_rs::{CoderResult, Decoder, Encoding};
use std::io::{self, Read};

const INPUT_BUF: usize = 64 * 1024;
// UTF-8 output of one input buffer can be up to 3x larger (e.g. UTF-16 → UTF-8)
const OUTPUT_BUF: usize = 3 * INPUT_BUF + 16;

pub struct DecodingReader<R> {
    inner: R,
    decoder: Decoder,
    in_buf: Vec<u8>,
    in_pos: usize,
    in_len: usize,
    out_buf: Vec<u8>,
    out_pos: usize,
    out_len: usize,
    eof: bool,
    finished: bool,
    replacements: usize,
}

impl<R: Read> DecodingReader<R> {
    /// Leading BOMs matching `encoding` are dropped
    pub fn new(inner: R, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            decoder: encoding.new_decoder_with_bom_removal(),
            in_buf: vec![0u8; INPUT_BUF],
            in_pos: 0,
            in_len: 0,
            out_buf: vec![0u8; OUTPUT_BUF],
            out_pos: 0,
            out_len: 0,
            eof: false,
            finished: false,
            replacements: 0,
        }
    }

    /// Number of decode passes that had to substitute U+FFFD
    pub fn replacements(&self) -> usize {
        self.replacements
    }

    fn fill(&mut self) -> io::Result<()> {
        if self.in_pos == self.in_len && !self.eof {
            let n = loop {
                match self.inner.read(&mut self.in_buf) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            };
            self.in_pos = 0;
            self.in_len = n;
            if n == 0 {
                self.eof = true;
            }
        }

        let (result, read, written, replaced) = self.decoder.decode_to_utf8(
            &self.in_buf[self.in_pos..self.in_len],
            &mut self.out_buf,
            self.eof,
        );
        self.in_pos += read;
        self.out_pos = 0;
        self.out_len = written;
        if replaced {
            self.replacements += 1;
        }
        if self.eof && result == CoderResult::InputEmpty && self.in_pos == self.in_len {
            self.finished = true;
        }
        Ok(())
    }
}

impl<R: Read> Read for DecodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.out_pos < self.out_len {
                let n = buf.len().min(self.out_len - self.out_pos);
                buf[..n].copy_from_slice(&self.out_buf[self.out_pos..self.out_pos + n]);
                self.out_pos += n;
                return Ok(n);
            }
            if self.finished || buf.is_empty() {
                return Ok(0);
            }
            self.fill()?;
        }
    }
}

/// Decode an in-memory buffer
#[cfg(test)]
fn decode_all(bytes: &[u8], encoding: &'static Encoding) -> io::Result<(String, usize)> {
    let mut reader = DecodingReader::new(bytes, encoding);
    let mut out = String::new();
    reader.read_to_string(&mut out)?;
    Ok((out, reader.replacements()))
}
