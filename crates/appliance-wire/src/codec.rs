// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Big-endian primitive codec and layout-driven value encoding.
// Author: Lukas Bower

use std::str;

use action_registry::FieldKind;

use crate::constants::MESSAGE_MAX;
use crate::error::WireError;
use crate::layout::{StructLayout, WireKind};
use crate::value::{FieldValue, StructValue, Value};

const UUID_LEN: usize = 32;

/// Append-only message writer.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_bool(&mut self, value: bool) {
        self.put_u32(u32::from(value));
    }

    pub fn put_len(&mut self, what: &'static str, len: usize) -> Result<(), WireError> {
        if len > MESSAGE_MAX {
            return Err(WireError::Oversize {
                what,
                len,
                limit: MESSAGE_MAX,
            });
        }
        // MESSAGE_MAX fits in u32.
        self.put_u32(len as u32);
        Ok(())
    }

    pub fn put_bytes(&mut self, value: &[u8]) -> Result<(), WireError> {
        self.put_len("buffer", value.len())?;
        self.buf.extend_from_slice(value);
        Ok(())
    }

    pub fn put_string(&mut self, value: &str) -> Result<(), WireError> {
        self.put_bytes(value.as_bytes())
    }

    pub fn put_raw(&mut self, value: &[u8]) {
        self.buf.extend_from_slice(value);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finish the message, enforcing the control message limit.
    pub fn finish(self) -> Result<Vec<u8>, WireError> {
        if self.buf.len() > MESSAGE_MAX {
            return Err(WireError::Oversize {
                what: "message",
                len: self.buf.len(),
                limit: MESSAGE_MAX,
            });
        }
        Ok(self.buf)
    }
}

/// Bounds-checked reader over a received message.
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        let end = self.pos.checked_add(len).ok_or(WireError::Truncated)?;
        if end > self.buf.len() {
            return Err(WireError::Truncated);
        }
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, WireError> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, WireError> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, WireError> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        match self.read_u32()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(WireError::InvalidBool(other)),
        }
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>, WireError> {
        let len = self.read_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_string(&mut self) -> Result<String, WireError> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| WireError::InvalidUtf8)
    }

    /// Read a list count and reject counts the remaining input cannot hold.
    pub fn read_count(&mut self, min_item_len: usize) -> Result<usize, WireError> {
        let count = self.read_u32()? as usize;
        if count.saturating_mul(min_item_len.max(1)) > self.remaining() {
            return Err(WireError::Truncated);
        }
        Ok(count)
    }

    /// Fail unless every byte was consumed.
    pub fn finish(self) -> Result<(), WireError> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(WireError::TrailingBytes { remaining }),
        }
    }
}

fn mismatch(slot: &str, kind: &WireKind, value: &Value) -> WireError {
    WireError::ValueMismatch {
        slot: slot.to_owned(),
        expected: kind.name(),
        found: value.kind_name(),
    }
}

fn put_string_list(enc: &mut Encoder, values: &[String]) -> Result<(), WireError> {
    enc.put_len("string list", values.len())?;
    for value in values {
        enc.put_string(value)?;
    }
    Ok(())
}

/// Encode `value` into the slot described by `kind`. `slot` names the
/// argument in diagnostics.
pub fn encode_value(
    enc: &mut Encoder,
    slot: &str,
    kind: &WireKind,
    value: &Value,
) -> Result<(), WireError> {
    match (kind, value) {
        (WireKind::Unit, Value::Unit) => Ok(()),
        (WireKind::String, Value::String(text)) => enc.put_string(text),
        (WireKind::OptString, Value::OptString(text)) => {
            enc.put_bool(text.is_some());
            match text {
                Some(text) => enc.put_string(text),
                None => Ok(()),
            }
        }
        (WireKind::StringList, Value::StringList(values)) => put_string_list(enc, values),
        (WireKind::Bool, Value::Bool(flag)) => {
            enc.put_bool(*flag);
            Ok(())
        }
        (WireKind::Int32, Value::Int32(number)) => {
            enc.put_i32(*number);
            Ok(())
        }
        (WireKind::Int64, Value::Int64(number)) => {
            enc.put_i64(*number);
            Ok(())
        }
        (WireKind::Bytes, Value::Bytes(bytes)) => enc.put_bytes(bytes),
        (WireKind::Struct(layout), Value::Struct(record)) => encode_struct(enc, layout, record),
        (WireKind::StructList(layout), Value::StructList(records)) => {
            enc.put_len("struct list", records.len())?;
            for record in records {
                encode_struct(enc, layout, record)?;
            }
            Ok(())
        }
        (WireKind::StringMap, Value::StringMap(pairs)) => {
            enc.put_len("string map", pairs.len().saturating_mul(2))?;
            for (key, value) in pairs {
                enc.put_string(key)?;
                enc.put_string(value)?;
            }
            Ok(())
        }
        _ => Err(mismatch(slot, kind, value)),
    }
}

/// Decode one value of the given kind.
pub fn decode_value(cursor: &mut Cursor<'_>, kind: &WireKind) -> Result<Value, WireError> {
    Ok(match kind {
        WireKind::Unit => Value::Unit,
        WireKind::String => Value::String(cursor.read_string()?),
        WireKind::OptString => {
            if cursor.read_bool()? {
                Value::OptString(Some(cursor.read_string()?))
            } else {
                Value::OptString(None)
            }
        }
        WireKind::StringList => {
            let count = cursor.read_count(4)?;
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(cursor.read_string()?);
            }
            Value::StringList(values)
        }
        WireKind::Bool => Value::Bool(cursor.read_bool()?),
        WireKind::Int32 => Value::Int32(cursor.read_i32()?),
        WireKind::Int64 => Value::Int64(cursor.read_i64()?),
        WireKind::Bytes => Value::Bytes(cursor.read_bytes()?),
        WireKind::Struct(layout) => Value::Struct(decode_struct(cursor, layout)?),
        WireKind::StructList(layout) => {
            let count = cursor.read_count(4)?;
            let mut records = Vec::with_capacity(count);
            for _ in 0..count {
                records.push(decode_struct(cursor, layout)?);
            }
            Value::StructList(records)
        }
        WireKind::StringMap => {
            let raw = cursor.read_u32()?;
            if raw % 2 != 0 {
                return Err(WireError::OddStringMap(raw));
            }
            let count = raw as usize;
            if count.saturating_mul(4) > cursor.remaining() {
                return Err(WireError::Truncated);
            }
            let mut pairs = Vec::with_capacity(count / 2);
            for _ in 0..count / 2 {
                let key = cursor.read_string()?;
                let value = cursor.read_string()?;
                pairs.push((key, value));
            }
            Value::StringMap(pairs)
        }
    })
}

fn invalid_field(layout: &StructLayout, field: &str, reason: &'static str) -> WireError {
    WireError::InvalidField {
        tag: layout.tag.clone(),
        field: field.to_owned(),
        reason,
    }
}

fn encode_struct(
    enc: &mut Encoder,
    layout: &StructLayout,
    record: &StructValue,
) -> Result<(), WireError> {
    if record.tag != layout.tag {
        return Err(WireError::ValueMismatch {
            slot: layout.tag.clone(),
            expected: "struct",
            found: "struct of another type",
        });
    }
    if record.fields.len() != layout.fields.len() {
        return Err(WireError::ArgumentCount {
            what: "struct fields",
            expected: layout.fields.len(),
            actual: record.fields.len(),
        });
    }
    for ((name, kind), value) in layout.fields.iter().zip(&record.fields) {
        match (kind, value) {
            (FieldKind::String, FieldValue::String(text)) => enc.put_string(text)?,
            (FieldKind::Bytes, FieldValue::Bytes(bytes)) => enc.put_bytes(bytes)?,
            (FieldKind::Uuid, FieldValue::Uuid(uuid)) => {
                if uuid.len() != UUID_LEN || !uuid.is_ascii() {
                    return Err(invalid_field(layout, name, "uuid must be 32 ASCII characters"));
                }
                enc.put_raw(uuid.as_bytes());
            }
            (FieldKind::Int32, FieldValue::Int32(number)) => enc.put_i32(*number),
            (FieldKind::UInt32, FieldValue::UInt32(number)) => enc.put_u32(*number),
            (FieldKind::Int64, FieldValue::Int64(number)) => enc.put_i64(*number),
            (FieldKind::UInt64, FieldValue::UInt64(number)) => enc.put_u64(*number),
            (FieldKind::Char, FieldValue::Char(ch)) => enc.put_u32(u32::from(*ch)),
            (FieldKind::OptPercent, FieldValue::OptPercent(percent)) => {
                let raw = match percent {
                    None => -1.0f32,
                    Some(value) if (0.0..=100.0).contains(value) => *value,
                    Some(_) => {
                        return Err(invalid_field(layout, name, "percentage outside 0..=100"))
                    }
                };
                enc.put_u32(raw.to_bits());
            }
            (_, other) => {
                return Err(WireError::ValueMismatch {
                    slot: format!("{}.{}", layout.tag, name),
                    expected: field_kind_name(*kind),
                    found: other.kind_name(),
                })
            }
        }
    }
    Ok(())
}

fn decode_struct(cursor: &mut Cursor<'_>, layout: &StructLayout) -> Result<StructValue, WireError> {
    let mut fields = Vec::with_capacity(layout.fields.len());
    for (name, kind) in &layout.fields {
        let value = match kind {
            FieldKind::String => FieldValue::String(cursor.read_string()?),
            FieldKind::Bytes => FieldValue::Bytes(cursor.read_bytes()?),
            FieldKind::Uuid => {
                let raw = cursor.take(UUID_LEN)?;
                if !raw.is_ascii() {
                    return Err(invalid_field(layout, name, "uuid must be 32 ASCII characters"));
                }
                FieldValue::Uuid(String::from_utf8_lossy(raw).into_owned())
            }
            FieldKind::Int32 => FieldValue::Int32(cursor.read_i32()?),
            FieldKind::UInt32 => FieldValue::UInt32(cursor.read_u32()?),
            FieldKind::Int64 => FieldValue::Int64(cursor.read_i64()?),
            FieldKind::UInt64 => FieldValue::UInt64(cursor.read_u64()?),
            FieldKind::Char => {
                let raw = cursor.read_u32()?;
                let ch = u8::try_from(raw)
                    .map_err(|_| invalid_field(layout, name, "char does not fit in one byte"))?;
                FieldValue::Char(ch)
            }
            FieldKind::OptPercent => {
                let raw = f32::from_bits(cursor.read_u32()?);
                if raw == -1.0 {
                    FieldValue::OptPercent(None)
                } else if (0.0..=100.0).contains(&raw) {
                    FieldValue::OptPercent(Some(raw))
                } else {
                    return Err(invalid_field(layout, name, "percentage outside 0..=100"));
                }
            }
        };
        fields.push(value);
    }
    Ok(StructValue {
        tag: layout.tag.clone(),
        fields,
    })
}

fn field_kind_name(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::String => "string",
        FieldKind::Bytes => "bytes",
        FieldKind::Uuid => "uuid",
        FieldKind::Int32 => "int32",
        FieldKind::UInt32 => "uint32",
        FieldKind::Int64 => "int64",
        FieldKind::UInt64 => "uint64",
        FieldKind::Char => "char",
        FieldKind::OptPercent => "opt-percent",
    }
}
