// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Appliance RPC wire protocol: layouts, codec, framing and streaming.
// Author: Lukas Bower
#![forbid(unsafe_code)]

//! Wire protocol between the client library and the appliance daemon.
//!
//! [`compile_protocol`] turns the frozen registry into per-procedure
//! layouts. Messages are big-endian and framed by a length word; a few
//! reserved length words carry cancellation, progress and launch signals.

mod chunk;
mod client;
mod codec;
pub mod constants;
mod error;
mod layout;
mod link;
mod message;
mod stream;
mod value;

pub use chunk::{Chunk, Progress};
pub use client::Client;
pub use codec::{decode_value, encode_value, Cursor, Encoder};
pub use error::{ApplicationError, CallError, WireError};
pub use layout::{compile_protocol, ArgSlot, CallLayout, Protocol, StructLayout, WireKind};
pub use link::{duplex, Frame, Link, MemoryLink, LINK_QUEUE_DEPTH};
pub use message::{
    check_optargs_bitmask, decode_call, decode_call_args, decode_header, decode_reply,
    encode_call, encode_reply, Call, Direction, Header, Reply, Status,
};
pub use stream::{
    drain_chunks, receive_stream, send_stream, CancelHandle, IncomingStream, OutgoingStream,
    StreamOutcome, StreamReader, StreamWriter,
};
pub use value::{CallArgs, FieldValue, Redacted, StructValue, Value};
