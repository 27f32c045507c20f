//! Framing reader: accumulates bytes from an upstream source until one
//! complete top-level TLV is buffered.

use crate::error::{Error, Result};
use crate::tlv::Tlv;
use log::debug;
use std::io::Read;

const CHUNK_SIZE: usize = 512;

/// Reads whole TLVs out of a byte stream. Each call to [`read_tlv`]
/// yields at most one element; bytes past it stay buffered for the next
/// call. A parse error discards the buffer so the stream can resynchronize.
///
/// [`read_tlv`]: TlvReader::read_tlv
pub struct TlvReader<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: Read> TlvReader<R> {
    pub fn new(reader: R) -> Self {
        TlvReader {
            reader,
            buf: Vec::with_capacity(CHUNK_SIZE),
        }
    }

    /// Returns the next complete TLV, or `Ok(None)` when more input is
    /// needed. An already buffered element is served without touching the
    /// source; at end of input, leftover bytes are a truncation error.
    pub fn read_tlv(&mut self) -> Result<Option<Tlv>> {
        if let Some(tlv) = self.take_buffered()? {
            return Ok(Some(tlv));
        }
        let mut chunk = [0u8; CHUNK_SIZE];
        let n = self.reader.read(&mut chunk)?;
        debug!("reader: read {n} byte(s), {} buffered", self.buf.len());
        if n == 0 {
            if self.buf.is_empty() {
                return Ok(None);
            }
            self.buf.clear();
            return Err(Error::Truncated);
        }
        self.buf.extend_from_slice(&chunk[..n]);
        self.take_buffered()
    }

    fn take_buffered(&mut self) -> Result<Option<Tlv>> {
        match Tlv::parse(&self.buf) {
            Ok(Some((tlv, _rest))) => {
                self.buf.drain(..tlv.consumed());
                Ok(Some(tlv))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.buf.clear();
                Err(e)
            }
        }
    }

    /// Bytes accumulated but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}
