// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SANE wire encoding.
//
// Everything is built from 32-bit big-endian words:
// - strings: length word (including the trailing NUL) + bytes; 0 = NULL
// - pointers: is-null word (1 = NULL) + the value when present
// - arrays: element count word + elements
// Characters inside option values travel as single bytes.

use std::io::Read;

use super::protocol::{ProtocolError, ProtocolResult, Procedure, Status};

/// Longest string accepted from the daemon.
const MAX_STRING_LEN: usize = 64 * 1024;

/// Largest array accepted from the daemon.
const MAX_ARRAY_LEN: usize = 16 * 1024;

/// Builds one request.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    /// Start a request for `procedure`.
    pub fn request(procedure: Procedure) -> Self {
        let mut enc = Self::default();
        enc.word(procedure.code());
        enc
    }

    pub fn word(&mut self, word: u32) -> &mut Self {
        self.buf.extend_from_slice(&word.to_be_bytes());
        self
    }

    pub fn int(&mut self, value: i32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn byte(&mut self, byte: u8) -> &mut Self {
        self.buf.push(byte);
        self
    }

    /// Encode a string; `None` is the NULL string.
    pub fn string(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            None => self.word(0),
            Some(s) => {
                self.word(s.len() as u32 + 1);
                self.buf.extend_from_slice(s.as_bytes());
                self.byte(0)
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

/// Reads reply values from a stream.
pub struct Decoder<R> {
    reader: R,
}

impl<R: Read> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn word(&mut self) -> ProtocolResult<u32> {
        let mut buf = [0u8; 4];
        self.reader.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    pub fn int(&mut self) -> ProtocolResult<i32> {
        let mut buf = [0u8; 4];
        self.reader.read_exact(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    pub fn byte(&mut self) -> ProtocolResult<u8> {
        let mut buf = [0u8; 1];
        self.reader.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn status(&mut self) -> ProtocolResult<Status> {
        Ok(Status::from_word(self.word()?))
    }

    /// Read a pointer's is-null flag.
    pub fn is_null(&mut self) -> ProtocolResult<bool> {
        Ok(self.word()? != 0)
    }

    /// Read an array length, refusing absurd counts.
    pub fn array_len(&mut self) -> ProtocolResult<usize> {
        let len = self.word()? as usize;
        if len > MAX_ARRAY_LEN {
            return Err(ProtocolError::Malformed(format!("array of {len} elements")));
        }
        Ok(len)
    }

    /// Read a string; `None` for the NULL string. Text after the first NUL
    /// is dropped.
    pub fn string(&mut self) -> ProtocolResult<Option<String>> {
        let len = self.word()? as usize;
        if len == 0 {
            return Ok(None);
        }
        if len > MAX_STRING_LEN {
            return Err(ProtocolError::Malformed(format!("string of {len} bytes")));
        }
        let mut bytes = vec![0u8; len];
        self.reader.read_exact(&mut bytes)?;
        if let Some(nul) = bytes.iter().position(|&b| b == 0) {
            bytes.truncate(nul);
        }
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
}
