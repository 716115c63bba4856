// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Protocol constants shared by the client library and the appliance daemon.
// Author: Lukas Bower

/// Program number carried by every message header.
pub const PROGRAM: u32 = 0x2000_F5F5;
/// Protocol version carried by every message header.
pub const PROTOCOL_VERSION: u32 = 4;

/// Upper bound on a control message payload, excluding the length word.
pub const MESSAGE_MAX: usize = 4 * 1024 * 1024;
/// Upper bound on the data carried by one stream chunk.
pub const MAX_CHUNK_SIZE: usize = 8192;

/// Length word announcing a cancellation request from the peer.
pub const CANCEL_FLAG: u32 = 0xFFFF_EEEE;
/// Length word announcing a progress notification.
pub const PROGRESS_FLAG: u32 = 0xFFFF_5555;
/// Length word sent once by the daemon when it is ready for calls.
pub const LAUNCH_FLAG: u32 = 0xF5F5_5FF5;

/// Size of a progress notification body.
pub const PROGRESS_MESSAGE_LEN: usize = 24;

/// Fixed message header size: prog, vers, proc, direction, serial,
/// progress hint, optarg bitmask and status.
pub const HEADER_LEN: usize = 4 * 5 + 8 + 8 + 4;

/// Bit 63 of the optarg bitmask is never assigned.
pub const OPTARGS_RESERVED_BIT: u32 = 63;

/// Chunks a receiver will discard after a cancellation before it declares
/// the stream out of sync.
pub const MAX_DRAIN_CHUNKS: usize = 256;

/// Chunk flag: last chunk of the stream.
pub const CHUNK_END_OF_STREAM: u32 = 0x1;
/// Chunk flag: sender abandoned the stream.
pub const CHUNK_CANCELLED: u32 = 0x2;

/// Errno string used in the error body of protocol-level failures.
pub const PROTOCOL_ERRNO: &str = "EPROTO";
/// Errno string reported when a transfer was cancelled.
pub const CANCELLED_ERRNO: &str = "EINTR";
