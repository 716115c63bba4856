// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Protocol, application and call error types for the appliance wire.
// Author: Lukas Bower

use std::fmt;
use std::io;

use crate::constants::PROTOCOL_ERRNO;

/// Encoding, decoding and framing failures. Always a protocol-level problem,
/// never an application result.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Input ended before a complete field was read.
    #[error("truncated message")]
    Truncated,
    /// A message carried bytes after its last field.
    #[error("{remaining} trailing bytes after message body")]
    TrailingBytes { remaining: usize },
    /// A string field was not UTF-8.
    #[error("invalid utf8 in string field")]
    InvalidUtf8,
    /// A bool field held something other than 0 or 1.
    #[error("invalid bool encoding {0}")]
    InvalidBool(u32),
    /// A payload, chunk or list exceeded its limit.
    #[error("{what} of {len} exceeds limit {limit}")]
    Oversize {
        what: &'static str,
        len: usize,
        limit: usize,
    },
    /// Header program number did not match.
    #[error("unexpected program number {0:#x}")]
    BadProgram(u32),
    /// Header protocol version did not match.
    #[error("unsupported protocol version {0}")]
    BadVersion(u32),
    /// Header direction was neither call nor reply, or the wrong one.
    #[error("unexpected message direction {0}")]
    BadDirection(u32),
    /// Reply status was not one of the known values.
    #[error("unknown reply status {0}")]
    BadStatus(u32),
    /// No procedure is registered under this number.
    #[error("unknown procedure number {0}")]
    UnknownProcedure(u32),
    /// A reply answered a different call.
    #[error("reply for procedure {actual_proc} serial {actual_serial}, expected procedure {expected_proc} serial {expected_serial}")]
    ReplyMismatch {
        expected_proc: u32,
        expected_serial: u32,
        actual_proc: u32,
        actual_serial: u32,
    },
    /// The reserved optarg bit was set.
    #[error("optarg bitmask {0:#018x} sets the reserved bit")]
    ReservedOptargBit(u64),
    /// Bits beyond the declared optional arguments were set.
    #[error("optarg bitmask {mask:#018x} sets bits beyond the {declared} declared optional arguments")]
    UnknownOptargBits { mask: u64, declared: usize },
    /// Argument vector length did not match the layout.
    #[error("{what}: expected {expected} values, got {actual}")]
    ArgumentCount {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    /// A value did not match the wire kind of its slot.
    #[error("{slot}: expected {expected} value, got {found}")]
    ValueMismatch {
        slot: String,
        expected: &'static str,
        found: &'static str,
    },
    /// A string map carried an odd number of entries.
    #[error("string map has odd entry count {0}")]
    OddStringMap(u32),
    /// A struct field value was outside its domain.
    #[error("struct {tag} field {field}: {reason}")]
    InvalidField {
        tag: String,
        field: String,
        reason: &'static str,
    },
    /// A parameter kind has no wire form.
    #[error("action {action}: parameter {param} has no wire form")]
    NoWireForm { action: String, param: String },
    /// A struct tag is not defined in the registry.
    #[error("action {action} refers to unknown struct {tag}")]
    UnknownStruct { action: String, tag: String },
    /// Chunk flags carried unknown bits.
    #[error("invalid chunk flags {0:#x}")]
    InvalidChunkFlags(u32),
    /// A terminating chunk carried data.
    #[error("terminating chunk carries {0} data bytes")]
    TerminatorWithData(usize),
    /// More chunks arrived after a cancellation than the drain allows.
    #[error("stream did not terminate within {limit} chunks after cancellation")]
    DrainLimit { limit: usize },
    /// A frame arrived that is not valid at this point of the exchange.
    #[error("unexpected {0} frame")]
    UnexpectedFrame(&'static str),
    /// The peer end of the link has gone away.
    #[error("link closed")]
    LinkClosed,
    /// Local I/O failure while feeding or draining a stream.
    #[error("stream i/o: {0}")]
    Io(#[from] io::Error),
}

/// Failure reported by a native implementation: a human readable message
/// plus a symbolic errno such as `ENOENT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationError {
    pub errno: String,
    pub message: String,
}

impl ApplicationError {
    pub fn new(errno: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errno: errno.into(),
            message: message.into(),
        }
    }

    /// Rejection of an undecodable or unroutable call, tagged `EPROTO`.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(PROTOCOL_ERRNO, message)
    }
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errno.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.errno, self.message)
        }
    }
}

impl std::error::Error for ApplicationError {}

/// Outcome of a failed client call.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The daemon ran the action and it failed.
    #[error("{0}")]
    Application(ApplicationError),
    /// The daemon could not decode or route the call.
    #[error("daemon rejected call: {}", .0.message)]
    Protocol(ApplicationError),
    /// The transfer was cancelled by either side.
    #[error("transfer cancelled")]
    Cancelled,
    /// Local encoding, decoding or link failure.
    #[error(transparent)]
    Wire(#[from] WireError),
}

impl CallError {
    /// Symbolic errno of an application or protocol failure.
    #[must_use]
    pub fn errno(&self) -> Option<&str> {
        match self {
            Self::Application(err) | Self::Protocol(err) => Some(err.errno.as_str()),
            Self::Cancelled | Self::Wire(_) => None,
        }
    }
}
