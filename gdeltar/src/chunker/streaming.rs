use std::io::Read;

use bytes::BytesMut;

use crate::chunker::Chunker;
use crate::Chunk;

/// Per-read refill size. Also the per-file read buffer a worker holds on to.
const REFILL_SIZE: usize = 32 * 1024;

/// Drives a [`Chunker`] over any blocking reader, yielding chunks with their
/// stream offsets.
pub struct StreamingChunker<C, R> {
    chunk_start: u64,
    buf: BytesMut,
    read_buf: Vec<u8>,
    chunker: C,
    reader: R,
    eof: bool,
}

impl<C, R> StreamingChunker<C, R> {
    pub fn new(chunker: C, reader: R) -> Self {
        Self {
            chunk_start: 0,
            buf: BytesMut::with_capacity(REFILL_SIZE),
            read_buf: vec![0u8; REFILL_SIZE],
            chunker,
            reader,
            eof: false,
        }
    }
}

impl<C, R> Iterator for StreamingChunker<C, R>
where
    C: Chunker,
    R: Read,
{
    type Item = std::io::Result<(u64, Chunk)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if !self.buf.is_empty() {
                if let Some(chunk) = self.chunker.next(&mut self.buf) {
                    let offset = self.chunk_start;
                    self.chunk_start += chunk.len() as u64;
                    return Some(Ok((offset, chunk)));
                }
            }
            if self.eof {
                // Return a last chunk if there is data left in buffer.
                if self.buf.is_empty() {
                    return None;
                }
                let chunk = Chunk(self.buf.split().freeze());
                let offset = self.chunk_start;
                self.chunk_start += chunk.len() as u64;
                return Some(Ok((offset, chunk)));
            }
            // Append more data to buffer since no chunk was found.
            match self.reader.read(&mut self.read_buf) {
                Ok(0) => self.eof = true,
                Ok(n) => self.buf.extend_from_slice(&self.read_buf[..n]),
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
