use crate::error::{Error, Result};
use flate2::{Decompress, FlushDecompress, Status};
use std::io::{BufRead, Read};

/// a fresh, streaming zlib inflate adapter over a buffered byte source.
/// unlike the teacher's `inflate()` (which decompresses a whole pack
/// entry greedily into one `Vec<u8>`), this yields bytes incrementally so
/// callers can stream a blob without materializing it.
///
/// one instance per `open_deflate` call - inflater state is never shared
/// between callers (spec section 5).
pub struct DeflateStream<R> {
    inner: R,
    decompress: Decompress,
    done: bool,
}

impl<R: BufRead> DeflateStream<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, decompress: Decompress::new(true), done: false }
    }

    /// reclaims the underlying reader, e.g. to return a loose object's file
    /// handle to a [`crate::handle_cache::HandleCache`] once its body has
    /// been fully read.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: BufRead> Read for DeflateStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.done {
            return Ok(0);
        }
        loop {
            let input = self.inner.fill_buf()?;
            let eof = input.is_empty();
            let before_in = self.decompress.total_in();
            let before_out = self.decompress.total_out();
            let flush = if eof { FlushDecompress::Finish } else { FlushDecompress::None };
            let status = self
                .decompress
                .decompress(input, buf, flush)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            let consumed = (self.decompress.total_in() - before_in) as usize;
            let produced = (self.decompress.total_out() - before_out) as usize;
            self.inner.consume(consumed);
            if produced > 0 {
                return Ok(produced);
            }
            match status {
                Status::StreamEnd => {
                    self.done = true;
                    return Ok(0);
                }
                Status::BufError if eof => {
                    self.done = true;
                    return Ok(0);
                }
                _ if eof && consumed == 0 => {
                    self.done = true;
                    return Ok(0);
                }
                _ => continue,
            }
        }
    }
}

/// `open_deflate(source, known_length)`: produces a streaming decompressed
/// reader over a zlib-wrapped loose object or pack entry body.
pub fn open_deflate<R: BufRead>(source: R) -> DeflateStream<R> {
    DeflateStream::new(source)
}

/// wraps a streaming byte source, appending every byte read to a growable
/// buffer so a caller can seek backward within the already-materialized
/// prefix in O(1), while forward seeks beyond the buffer read-and-discard
/// until the target position. used over [`DeflateStream`] so a delta base
/// read partway through can later be re-read from the start without
/// re-inflating.
pub struct MemoizingReader<R> {
    inner: R,
    buf: Vec<u8>,
    pos: usize,
    exhausted: bool,
}

impl<R: Read> MemoizingReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, buf: Vec::new(), pos: 0, exhausted: false }
    }

    /// seek to an absolute byte offset, reading and discarding forward as
    /// necessary if `pos` lies beyond what has been materialized so far.
    pub fn seek_to(&mut self, pos: usize) -> Result<()> {
        if pos <= self.buf.len() {
            self.pos = pos;
            return Ok(());
        }
        let mut chunk = [0u8; 8192];
        while self.buf.len() < pos {
            let want = (pos - self.buf.len()).min(chunk.len());
            let n = self
                .inner
                .read(&mut chunk[..want])
                .map_err(|e| Error::io("<memoized stream>", e))?;
            if n == 0 {
                self.exhausted = true;
                break;
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
        self.pos = self.buf.len().min(pos);
        Ok(())
    }

    /// materialize the entire remaining stream and return it
    pub fn read_to_end_materialized(&mut self) -> Result<&[u8]> {
        if !self.exhausted {
            let mut tail = vec![];
            self.inner.read_to_end(&mut tail).map_err(|e| Error::io("<memoized stream>", e))?;
            self.buf.extend_from_slice(&tail);
            self.exhausted = true;
        }
        Ok(&self.buf)
    }
}

impl<R: Read> Read for MemoizingReader<R> {
    fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
        if self.pos < self.buf.len() {
            let n = (self.buf.len() - self.pos).min(out.len());
            out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
            self.pos += n;
            return Ok(n);
        }
        let n = self.inner.read(out)?;
        self.buf.extend_from_slice(&out[..n]);
        self.pos += n;
        if n == 0 {
            self.exhausted = true;
        }
        Ok(n)
    }
}

/// exposes an ordered list of byte sources as one logical stream (spec
/// 4.2's "concatenation helper"), used to splice a pack delta's base bytes
/// together with the instruction-produced output into a single contiguous
/// buffer.
pub fn concat_streams<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}
