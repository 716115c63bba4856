// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Stream chunk and progress notification encodings.
// Author: Lukas Bower

use crate::codec::{Cursor, Encoder};
use crate::constants::{
    CHUNK_CANCELLED, CHUNK_END_OF_STREAM, MAX_CHUNK_SIZE, PROGRESS_MESSAGE_LEN,
};
use crate::error::WireError;

/// One unit of an out-of-band file transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Data(Vec<u8>),
    /// Normal end of the stream.
    End,
    /// The sender abandoned the stream; also terminates it.
    Cancelled,
}

impl Chunk {
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut enc = Encoder::new();
        match self {
            Self::Data(data) => {
                if data.len() > MAX_CHUNK_SIZE {
                    return Err(WireError::Oversize {
                        what: "chunk",
                        len: data.len(),
                        limit: MAX_CHUNK_SIZE,
                    });
                }
                enc.put_u32(0);
                enc.put_bytes(data)?;
            }
            Self::End => {
                enc.put_u32(CHUNK_END_OF_STREAM);
                enc.put_bytes(&[])?;
            }
            Self::Cancelled => {
                enc.put_u32(CHUNK_CANCELLED | CHUNK_END_OF_STREAM);
                enc.put_bytes(&[])?;
            }
        }
        enc.finish()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let mut cursor = Cursor::new(payload);
        let flags = cursor.read_u32()?;
        if flags & !(CHUNK_CANCELLED | CHUNK_END_OF_STREAM) != 0 {
            return Err(WireError::InvalidChunkFlags(flags));
        }
        let data = cursor.read_bytes()?;
        cursor.finish()?;
        if data.len() > MAX_CHUNK_SIZE {
            return Err(WireError::Oversize {
                what: "chunk",
                len: data.len(),
                limit: MAX_CHUNK_SIZE,
            });
        }
        let chunk = if flags & CHUNK_CANCELLED != 0 {
            Self::Cancelled
        } else if flags & CHUNK_END_OF_STREAM != 0 {
            Self::End
        } else {
            return Ok(Self::Data(data));
        };
        if !data.is_empty() {
            return Err(WireError::TerminatorWithData(data.len()));
        }
        Ok(chunk)
    }

    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(self, Self::End | Self::Cancelled)
    }
}

/// Progress notification sent by the daemon while a call runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub proc_nr: u32,
    pub serial: u32,
    pub position: u64,
    pub total: u64,
}

impl Progress {
    #[must_use]
    pub fn encode(&self) -> [u8; PROGRESS_MESSAGE_LEN] {
        let mut out = [0u8; PROGRESS_MESSAGE_LEN];
        out[0..4].copy_from_slice(&self.proc_nr.to_be_bytes());
        out[4..8].copy_from_slice(&self.serial.to_be_bytes());
        out[8..16].copy_from_slice(&self.position.to_be_bytes());
        out[16..24].copy_from_slice(&self.total.to_be_bytes());
        out
    }

    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut cursor = Cursor::new(body);
        let progress = Self {
            proc_nr: cursor.read_u32()?,
            serial: cursor.read_u32()?,
            position: cursor.read_u64()?,
            total: cursor.read_u64()?,
        };
        cursor.finish()?;
        Ok(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminators_carry_no_data() {
        assert_eq!(Chunk::decode(&Chunk::End.encode().expect("end")).expect("decode"), Chunk::End);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&CHUNK_END_OF_STREAM.to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.push(b'x');
        assert!(matches!(
            Chunk::decode(&bytes),
            Err(WireError::TerminatorWithData(1))
        ));
    }

    #[test]
    fn unknown_flag_bits_are_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0x4u32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        assert!(matches!(
            Chunk::decode(&bytes),
            Err(WireError::InvalidChunkFlags(0x4))
        ));
    }

    #[test]
    fn oversize_chunk_is_refused() {
        let err = Chunk::Data(vec![0u8; MAX_CHUNK_SIZE + 1])
            .encode()
            .expect_err("oversize");
        assert!(matches!(err, WireError::Oversize { what: "chunk", .. }));
    }

    #[test]
    fn progress_is_twenty_four_bytes() {
        let progress = Progress {
            proc_nr: 23,
            serial: 4,
            position: 8192,
            total: 1 << 20,
        };
        let bytes = progress.encode();
        assert_eq!(bytes.len(), 24);
        assert_eq!(Progress::decode(&bytes).expect("decode"), progress);
    }
}
