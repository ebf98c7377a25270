// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reassembly of a chunked stream (`STREAM_START`/`CHUNK`.../`STREAM_END`)
//! back into a single logical payload, buffering in memory for small
//! streams and spilling to a temp file once a declared length exceeds
//! `max_chunk`.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::FrameError;

/// Where an in-progress stream's bytes are being accumulated.
enum Buffer {
    Memory(Vec<u8>),
    Disk(tempfile::NamedTempFile),
}

/// Accumulates chunks for one named stream until `eof`, then yields the
/// complete payload. One [`StreamAssembler`] handles exactly one
/// `stream_id`; a caller juggling several concurrent streams keeps one
/// instance per id.
pub struct StreamAssembler {
    buffer: Buffer,
    received: u64,
    declared_len: Option<u64>,
    max_chunk: u64,
    done: bool,
}

impl StreamAssembler {
    /// Start a new assembler. `max_chunk` is the negotiated threshold
    /// above which the stream is buffered to disk instead of memory.
    ///
    /// # Errors
    ///
    /// [`FrameError::Io`] if spilling straight to disk fails (only
    /// possible when `declared_len` already exceeds `max_chunk` on the
    /// first chunk).
    pub fn new(declared_len: Option<u64>, max_chunk: u64) -> Result<Self, FrameError> {
        let spill = declared_len.is_some_and(|len| len > max_chunk);
        let buffer = if spill {
            Buffer::Disk(tempfile::NamedTempFile::new().map_err(|err| FrameError::Io(err.to_string()))?)
        } else {
            Buffer::Memory(Vec::new())
        };
        Ok(Self {
            buffer,
            received: 0,
            declared_len,
            max_chunk,
            done: false,
        })
    }

    /// Feed one chunk's payload at `offset`, flagged `eof` if it's the
    /// last.
    ///
    /// # Errors
    ///
    /// [`FrameError::InvalidFrame`] if a chunk arrives after `eof`, or if
    /// `offset` doesn't match the bytes received so far (out-of-order
    /// chunks are not supported; the transport guarantees in-order
    /// delivery per stream). [`FrameError::Io`] on a disk write failure.
    pub fn ingest(&mut self, offset: u64, payload: &[u8], eof: bool) -> Result<(), FrameError> {
        if self.done {
            return Err(FrameError::InvalidFrame(
                "chunk received after stream end".to_owned(),
            ));
        }
        if offset != self.received {
            return Err(FrameError::InvalidFrame(format!(
                "out-of-order chunk: expected offset {}, got {offset}",
                self.received
            )));
        }

        if matches!(self.buffer, Buffer::Memory(_))
            && self.received + payload.len() as u64 > self.max_chunk
        {
            self.spill_to_disk()?;
        }

        match &mut self.buffer {
            Buffer::Memory(buf) => buf.extend_from_slice(payload),
            Buffer::Disk(file) => {
                file.write_all(payload).map_err(|err| FrameError::Io(err.to_string()))?;
            }
        }
        self.received += payload.len() as u64;
        self.done = eof;
        Ok(())
    }

    fn spill_to_disk(&mut self) -> Result<(), FrameError> {
        if let Buffer::Memory(buf) = &self.buffer {
            let mut file = tempfile::NamedTempFile::new().map_err(|err| FrameError::Io(err.to_string()))?;
            file.write_all(buf).map_err(|err| FrameError::Io(err.to_string()))?;
            self.buffer = Buffer::Disk(file);
        }
        Ok(())
    }

    /// `true` once the terminating chunk (`eof = true`) has been ingested.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.done
    }

    /// The declared total length, if the first chunk carried one.
    #[must_use]
    pub fn declared_len(&self) -> Option<u64> {
        self.declared_len
    }

    /// Bytes received so far.
    #[must_use]
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Finish the stream and return the full payload.
    ///
    /// # Errors
    ///
    /// [`FrameError::InvalidFrame`] if `eof` hasn't been seen yet.
    /// [`FrameError::Io`] if reading back a disk-backed buffer fails.
    pub fn finish(mut self) -> Result<Vec<u8>, FrameError> {
        if !self.done {
            return Err(FrameError::InvalidFrame("stream ended before eof".to_owned()));
        }
        match &mut self.buffer {
            Buffer::Memory(buf) => Ok(std::mem::take(buf)),
            Buffer::Disk(file) => {
                file.as_file_mut()
                    .seek(SeekFrom::Start(0))
                    .map_err(|err| FrameError::Io(err.to_string()))?;
                let mut out = Vec::new();
                file.as_file_mut()
                    .read_to_end(&mut out)
                    .map_err(|err| FrameError::Io(err.to_string()))?;
                Ok(out)
            }
        }
    }

    /// Abandon this stream; drops any disk-backed temp file.
    pub fn cancel(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembles_small_stream_in_memory() {
        let mut assembler = StreamAssembler::new(Some(6), 1024).unwrap();
        assembler.ingest(0, b"foo", false).unwrap();
        assembler.ingest(3, b"bar", true).unwrap();
        assert!(assembler.is_complete());
        assert_eq!(assembler.finish().unwrap(), b"foobar");
    }

    #[test]
    fn spills_to_disk_past_max_chunk() {
        let mut assembler = StreamAssembler::new(Some(10), 4).unwrap();
        assembler.ingest(0, b"abcd", false).unwrap();
        assembler.ingest(4, b"efgh", false).unwrap();
        assembler.ingest(8, b"ij", true).unwrap();
        assert_eq!(assembler.finish().unwrap(), b"abcdefghij");
    }

    #[test]
    fn declared_len_over_max_chunk_spills_up_front() {
        let assembler = StreamAssembler::new(Some(1_000_000), 16).unwrap();
        assert!(matches!(assembler.buffer, Buffer::Disk(_)));
    }

    #[test]
    fn out_of_order_offset_is_rejected() {
        let mut assembler = StreamAssembler::new(None, 1024).unwrap();
        assembler.ingest(0, b"foo", false).unwrap();
        let err = assembler.ingest(10, b"bar", true).unwrap_err();
        assert!(matches!(err, FrameError::InvalidFrame(_)));
    }

    #[test]
    fn chunk_after_eof_is_rejected() {
        let mut assembler = StreamAssembler::new(None, 1024).unwrap();
        assembler.ingest(0, b"foo", true).unwrap();
        let err = assembler.ingest(3, b"bar", true).unwrap_err();
        assert!(matches!(err, FrameError::InvalidFrame(_)));
    }

    #[test]
    fn finish_before_eof_is_rejected() {
        let mut assembler = StreamAssembler::new(None, 1024).unwrap();
        assembler.ingest(0, b"foo", false).unwrap();
        let err = assembler.finish().unwrap_err();
        assert!(matches!(err, FrameError::InvalidFrame(_)));
    }
}
