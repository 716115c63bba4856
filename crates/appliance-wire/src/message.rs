// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Call and reply messages: header, optarg bitmask and error bodies.
// Author: Lukas Bower

use log::trace;

use crate::codec::{decode_value, encode_value, Cursor, Encoder};
use crate::constants::{HEADER_LEN, OPTARGS_RESERVED_BIT, PROGRAM, PROTOCOL_VERSION};
use crate::error::{ApplicationError, WireError};
use crate::layout::{CallLayout, Protocol, WireKind};
use crate::value::{CallArgs, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Call,
    Reply,
}

impl Direction {
    fn as_u32(self) -> u32 {
        match self {
            Self::Call => 0,
            Self::Reply => 1,
        }
    }

    fn from_u32(raw: u32) -> Result<Self, WireError> {
        match raw {
            0 => Ok(Self::Call),
            1 => Ok(Self::Reply),
            other => Err(WireError::BadDirection(other)),
        }
    }
}

/// Reply status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    /// The native implementation failed.
    Error,
    /// The daemon could not decode or route the call.
    ProtocolError,
}

impl Status {
    fn as_u32(self) -> u32 {
        match self {
            Self::Ok => 0,
            Self::Error => 1,
            Self::ProtocolError => 2,
        }
    }

    fn from_u32(raw: u32) -> Result<Self, WireError> {
        match raw {
            0 => Ok(Self::Ok),
            1 => Ok(Self::Error),
            2 => Ok(Self::ProtocolError),
            other => Err(WireError::BadStatus(other)),
        }
    }
}

/// Fixed header at the start of every call and reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub proc_nr: u32,
    pub direction: Direction,
    pub serial: u32,
    /// Non-zero when the caller wants progress notifications.
    pub progress_hint: u64,
    pub optargs_bitmask: u64,
    pub status: Status,
}

impl Header {
    #[must_use]
    pub fn call(proc_nr: u32, serial: u32) -> Self {
        Self {
            proc_nr,
            direction: Direction::Call,
            serial,
            progress_hint: 0,
            optargs_bitmask: 0,
            status: Status::Ok,
        }
    }

    #[must_use]
    pub fn reply(proc_nr: u32, serial: u32, status: Status) -> Self {
        Self {
            proc_nr,
            direction: Direction::Reply,
            serial,
            progress_hint: 0,
            optargs_bitmask: 0,
            status,
        }
    }

    fn encode(&self, enc: &mut Encoder) {
        enc.put_u32(PROGRAM);
        enc.put_u32(PROTOCOL_VERSION);
        enc.put_u32(self.proc_nr);
        enc.put_u32(self.direction.as_u32());
        enc.put_u32(self.serial);
        enc.put_u64(self.progress_hint);
        enc.put_u64(self.optargs_bitmask);
        enc.put_u32(self.status.as_u32());
    }
}

/// Parse the header and return it with the message body that follows.
pub fn decode_header(payload: &[u8]) -> Result<(Header, &[u8]), WireError> {
    if payload.len() < HEADER_LEN {
        return Err(WireError::Truncated);
    }
    let mut cursor = Cursor::new(&payload[..HEADER_LEN]);
    let program = cursor.read_u32()?;
    if program != PROGRAM {
        return Err(WireError::BadProgram(program));
    }
    let version = cursor.read_u32()?;
    if version != PROTOCOL_VERSION {
        return Err(WireError::BadVersion(version));
    }
    let proc_nr = cursor.read_u32()?;
    let direction = Direction::from_u32(cursor.read_u32()?)?;
    let serial = cursor.read_u32()?;
    let progress_hint = cursor.read_u64()?;
    let optargs_bitmask = cursor.read_u64()?;
    let status = Status::from_u32(cursor.read_u32()?)?;
    Ok((
        Header {
            proc_nr,
            direction,
            serial,
            progress_hint,
            optargs_bitmask,
            status,
        },
        &payload[HEADER_LEN..],
    ))
}

/// Encode a call message for `layout`.
pub fn encode_call(
    layout: &CallLayout,
    serial: u32,
    progress_hint: u64,
    args: &CallArgs,
) -> Result<Vec<u8>, WireError> {
    if args.required.len() != layout.args.len() {
        return Err(WireError::ArgumentCount {
            what: "required arguments",
            expected: layout.args.len(),
            actual: args.required.len(),
        });
    }
    if args.optional.len() > layout.optargs.len() {
        return Err(WireError::ArgumentCount {
            what: "optional arguments",
            expected: layout.optargs.len(),
            actual: args.optional.len(),
        });
    }
    let mut header = Header::call(layout.proc_nr, serial);
    header.progress_hint = progress_hint;
    header.optargs_bitmask = args.optargs_bitmask();

    let mut enc = Encoder::new();
    header.encode(&mut enc);
    for (slot, value) in layout.args.iter().zip(&args.required) {
        encode_value(&mut enc, &slot.name, &slot.kind, value)?;
    }
    for (slot, value) in layout.optargs.iter().zip(&args.optional) {
        if let Some(value) = value {
            encode_value(&mut enc, &slot.name, &slot.kind, value)?;
        }
    }
    let bytes = enc.finish()?;
    trace!(
        "[wire] encoded call {} serial={} bitmask={:#x} len={}",
        layout.name,
        serial,
        header.optargs_bitmask,
        bytes.len()
    );
    Ok(bytes)
}

/// Check an optarg bitmask against the number of declared optional arguments.
pub fn check_optargs_bitmask(mask: u64, declared: usize) -> Result<(), WireError> {
    if mask & (1u64 << OPTARGS_RESERVED_BIT) != 0 {
        return Err(WireError::ReservedOptargBit(mask));
    }
    let undeclared = if declared >= 64 {
        0
    } else {
        mask >> declared
    };
    if undeclared != 0 {
        return Err(WireError::UnknownOptargBits { mask, declared });
    }
    Ok(())
}

/// Decode the body of a call whose header has already been parsed.
pub fn decode_call_args(
    layout: &CallLayout,
    header: &Header,
    body: &[u8],
) -> Result<CallArgs, WireError> {
    check_optargs_bitmask(header.optargs_bitmask, layout.optargs.len())?;
    let mut cursor = Cursor::new(body);
    let mut required = Vec::with_capacity(layout.args.len());
    for slot in &layout.args {
        required.push(decode_value(&mut cursor, &slot.kind)?);
    }
    let mut optional = Vec::with_capacity(layout.optargs.len());
    for (index, slot) in layout.optargs.iter().enumerate() {
        if header.optargs_bitmask & (1u64 << index) != 0 {
            optional.push(Some(decode_value(&mut cursor, &slot.kind)?));
        } else {
            optional.push(None);
        }
    }
    cursor.finish()?;
    Ok(CallArgs { required, optional })
}

/// A fully decoded call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub header: Header,
    pub args: CallArgs,
}

/// Decode a call message against the protocol.
pub fn decode_call(protocol: &Protocol, payload: &[u8]) -> Result<Call, WireError> {
    let (header, body) = decode_header(payload)?;
    if header.direction != Direction::Call {
        return Err(WireError::BadDirection(header.direction.as_u32()));
    }
    let layout = protocol
        .get(header.proc_nr)
        .ok_or(WireError::UnknownProcedure(header.proc_nr))?;
    let args = decode_call_args(layout, &header, body)?;
    Ok(Call { header, args })
}

/// Result carried by a reply message.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ok(Value),
    Application(ApplicationError),
    /// Undecodable or unroutable call; errno is normally `EPROTO`.
    Protocol(ApplicationError),
}

/// Encode a reply. `kind` is only consulted for successful replies.
pub fn encode_reply(
    proc_nr: u32,
    serial: u32,
    kind: &WireKind,
    reply: &Reply,
) -> Result<Vec<u8>, WireError> {
    let mut enc = Encoder::new();
    match reply {
        Reply::Ok(value) => {
            Header::reply(proc_nr, serial, Status::Ok).encode(&mut enc);
            encode_value(&mut enc, "reply", kind, value)?;
        }
        Reply::Application(err) => {
            Header::reply(proc_nr, serial, Status::Error).encode(&mut enc);
            enc.put_string(&err.errno)?;
            enc.put_string(&err.message)?;
        }
        Reply::Protocol(err) => {
            Header::reply(proc_nr, serial, Status::ProtocolError).encode(&mut enc);
            enc.put_string(&err.errno)?;
            enc.put_string(&err.message)?;
        }
    }
    enc.finish()
}

/// Decode the reply to the call `(layout, serial)`.
pub fn decode_reply(layout: &CallLayout, serial: u32, payload: &[u8]) -> Result<Reply, WireError> {
    let (header, body) = decode_header(payload)?;
    if header.direction != Direction::Reply {
        return Err(WireError::BadDirection(header.direction.as_u32()));
    }
    // Protocol errors for undecodable headers come back as procedure 0,
    // serial 0. Anything else must answer this exact call.
    let routed = header.proc_nr == layout.proc_nr && header.serial == serial;
    let unaddressed =
        header.status == Status::ProtocolError && header.proc_nr == 0 && header.serial == 0;
    if !routed && !unaddressed {
        return Err(WireError::ReplyMismatch {
            expected_proc: layout.proc_nr,
            expected_serial: serial,
            actual_proc: header.proc_nr,
            actual_serial: header.serial,
        });
    }
    let mut cursor = Cursor::new(body);
    let reply = match header.status {
        Status::Ok => Reply::Ok(decode_value(&mut cursor, &layout.reply)?),
        Status::Error => {
            let errno = cursor.read_string()?;
            let message = cursor.read_string()?;
            Reply::Application(ApplicationError { errno, message })
        }
        Status::ProtocolError => {
            let errno = cursor.read_string()?;
            let message = cursor.read_string()?;
            Reply::Protocol(ApplicationError { errno, message })
        }
    };
    cursor.finish()?;
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PROTOCOL_ERRNO;
    use crate::layout::ArgSlot;

    fn slot(name: &str, kind: WireKind) -> ArgSlot {
        ArgSlot {
            name: name.to_owned(),
            kind,
            secret: false,
            absolute_path: false,
        }
    }

    fn grep_layout() -> CallLayout {
        CallLayout {
            name: "grep".to_owned(),
            proc_nr: 32,
            args: vec![slot("regex", WireKind::String), slot("path", WireKind::String)],
            optargs: ["extended", "fixed", "insensitive", "compressed"]
                .iter()
                .map(|name| slot(name, WireKind::Bool))
                .collect(),
            reply: WireKind::StringList,
            stream: None,
            cancellable: false,
            progress: false,
            oversize_warning: true,
        }
    }

    #[test]
    fn call_without_optargs_clears_every_bit() {
        let layout = grep_layout();
        let args = CallArgs::new(vec!["abc".into(), "/test-grep".into()]);
        let bytes = encode_call(&layout, 7, 0, &args).expect("encode");
        let (header, body) = decode_header(&bytes).expect("header");
        assert_eq!(header.optargs_bitmask, 0);
        assert_eq!(header.proc_nr, 32);
        let decoded = decode_call_args(&layout, &header, body).expect("decode");
        assert_eq!(decoded.required, args.required);
        assert_eq!(decoded.optional, vec![None, None, None, None]);
    }

    #[test]
    fn set_optargs_follow_in_bit_order() {
        let layout = grep_layout();
        let args = CallArgs::new(vec!["abc".into(), "/f".into()])
            .with_optional(1, Value::Bool(true))
            .with_optional(2, Value::Bool(false));
        let bytes = encode_call(&layout, 1, 0, &args).expect("encode");
        let (header, body) = decode_header(&bytes).expect("header");
        assert_eq!(header.optargs_bitmask, 0b0110);
        let decoded = decode_call_args(&layout, &header, body).expect("decode");
        assert_eq!(
            decoded.optional,
            vec![None, Some(Value::Bool(true)), Some(Value::Bool(false)), None]
        );
    }

    #[test]
    fn undeclared_and_reserved_bits_are_rejected() {
        assert!(matches!(
            check_optargs_bitmask(0b1_0000, 4),
            Err(WireError::UnknownOptargBits { declared: 4, .. })
        ));
        assert!(matches!(
            check_optargs_bitmask(1 << 63, 63),
            Err(WireError::ReservedOptargBit(_))
        ));
        check_optargs_bitmask((1 << 63) - 1, 63).expect("all 63 bits");
    }

    #[test]
    fn application_and_protocol_replies_are_distinct() {
        let layout = grep_layout();
        let app = Reply::Application(ApplicationError::new("ENOENT", "no such file"));
        let bytes = encode_reply(32, 9, &layout.reply, &app).expect("encode");
        assert_eq!(decode_reply(&layout, 9, &bytes).expect("decode"), app);

        let proto = Reply::Protocol(ApplicationError::protocol("bad header"));
        let bytes = encode_reply(0, 0, &WireKind::Unit, &proto).expect("encode");
        let decoded = decode_reply(&layout, 9, &bytes).expect("decode");
        assert_eq!(decoded, proto);
        match decoded {
            Reply::Protocol(err) => assert_eq!(err.errno, PROTOCOL_ERRNO),
            other => panic!("expected protocol reply, got {other:?}"),
        }
    }

    #[test]
    fn protocol_reply_for_another_call_is_rejected() {
        let layout = grep_layout();
        let proto = Reply::Protocol(ApplicationError::protocol("unknown procedure number 999"));
        let stale = encode_reply(999, 8, &WireKind::Unit, &proto).expect("encode");
        assert!(matches!(
            decode_reply(&layout, 9, &stale),
            Err(WireError::ReplyMismatch { actual_serial: 8, .. })
        ));
        let bytes = encode_reply(32, 9, &WireKind::Unit, &proto).expect("encode");
        assert_eq!(decode_reply(&layout, 9, &bytes).expect("decode"), proto);
    }

    #[test]
    fn mismatched_serial_is_rejected() {
        let layout = grep_layout();
        let ok = Reply::Ok(Value::StringList(vec!["abc".to_owned()]));
        let bytes = encode_reply(32, 3, &layout.reply, &ok).expect("encode");
        assert!(matches!(
            decode_reply(&layout, 4, &bytes),
            Err(WireError::ReplyMismatch { .. })
        ));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let layout = grep_layout();
        let args = CallArgs::new(vec!["abc".into(), "/f".into()]);
        let mut bytes = encode_call(&layout, 1, 0, &args).expect("encode");
        bytes.push(0);
        let (header, body) = decode_header(&bytes).expect("header");
        assert!(matches!(
            decode_call_args(&layout, &header, body),
            Err(WireError::TrailingBytes { remaining: 1 })
        ));
    }
}
