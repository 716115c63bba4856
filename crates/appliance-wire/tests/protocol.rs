// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Check compiled layouts and message encodings against the shipped registry.
// Author: Lukas Bower
#![forbid(unsafe_code)]

use std::path::PathBuf;

use action_registry::{build_registry, load_source, FieldKind, StreamDirection};
use appliance_wire::constants::{HEADER_LEN, MESSAGE_MAX};
use appliance_wire::{
    compile_protocol, decode_call, decode_header, decode_reply, encode_call, encode_reply,
    CallArgs, CallLayout, FieldValue, Protocol, Reply, StructLayout, StructValue, Value,
    WireError, WireKind,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn repo_path(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join(path)
}

fn shipped_protocol() -> Protocol {
    let (_, source) = load_source(&repo_path("configs/registry.toml")).expect("load registry");
    let registry = build_registry(source).expect("build registry");
    compile_protocol(&registry).expect("compile protocol")
}

const ROUNDS: usize = 24;

fn random_text(rng: &mut StdRng) -> String {
    match rng.random_range(0..5) {
        0 => String::new(),
        1 => "/dev/sda1".to_owned(),
        2 => "ünïcödé / ✓".to_owned(),
        3 => "x".repeat(rng.random_range(4096..=16_384)),
        _ => (0..rng.random_range(1..=64))
            .map(|_| char::from(rng.random_range(b' '..=b'~')))
            .collect(),
    }
}

fn random_list(rng: &mut StdRng) -> Vec<String> {
    (0..rng.random_range(0..4)).map(|_| random_text(rng)).collect()
}

fn random_bytes(rng: &mut StdRng) -> Vec<u8> {
    (0..rng.random_range(0..=256)).map(|_| rng.random()).collect()
}

fn random_i32(rng: &mut StdRng) -> i32 {
    match rng.random_range(0..4) {
        0 => i32::MIN,
        1 => i32::MAX,
        2 => 0,
        _ => rng.random(),
    }
}

fn random_i64(rng: &mut StdRng) -> i64 {
    match rng.random_range(0..4) {
        0 => i64::MIN,
        1 => i64::MAX,
        2 => 0,
        _ => rng.random(),
    }
}

fn random_field(rng: &mut StdRng, kind: FieldKind) -> FieldValue {
    match kind {
        FieldKind::String => FieldValue::String(random_text(rng)),
        FieldKind::Bytes => FieldValue::Bytes(random_bytes(rng)),
        FieldKind::Uuid => FieldValue::Uuid(
            (0..32)
                .map(|_| char::from(rng.random_range(b'0'..=b'z')))
                .collect(),
        ),
        FieldKind::Int32 => FieldValue::Int32(random_i32(rng)),
        FieldKind::UInt32 => FieldValue::UInt32(if rng.random_bool(0.25) {
            u32::MAX
        } else {
            rng.random()
        }),
        FieldKind::Int64 => FieldValue::Int64(random_i64(rng)),
        FieldKind::UInt64 => FieldValue::UInt64(if rng.random_bool(0.25) {
            u64::MAX
        } else {
            rng.random()
        }),
        FieldKind::Char => FieldValue::Char(rng.random()),
        FieldKind::OptPercent => FieldValue::OptPercent(match rng.random_range(0..4) {
            0 => None,
            1 => Some(0.0),
            2 => Some(100.0),
            _ => Some(rng.random_range(0.0..=100.0f32)),
        }),
    }
}

fn random_record(rng: &mut StdRng, layout: &StructLayout) -> StructValue {
    StructValue {
        tag: layout.tag.clone(),
        fields: layout
            .fields
            .iter()
            .map(|(_, kind)| random_field(rng, *kind))
            .collect(),
    }
}

fn random_value(rng: &mut StdRng, kind: &WireKind) -> Value {
    match kind {
        WireKind::Unit => Value::Unit,
        WireKind::String => Value::String(random_text(rng)),
        WireKind::OptString => {
            Value::OptString(rng.random_bool(0.5).then(|| random_text(rng)))
        }
        WireKind::StringList => Value::StringList(random_list(rng)),
        WireKind::Bool => Value::Bool(rng.random()),
        WireKind::Int32 => Value::Int32(random_i32(rng)),
        WireKind::Int64 => Value::Int64(random_i64(rng)),
        WireKind::Bytes => Value::Bytes(random_bytes(rng)),
        WireKind::Struct(layout) => Value::Struct(random_record(rng, layout)),
        WireKind::StructList(layout) => Value::StructList(
            (0..rng.random_range(0..4))
                .map(|_| random_record(rng, layout))
                .collect(),
        ),
        WireKind::StringMap => Value::StringMap(
            (0..rng.random_range(0..4))
                .map(|_| (random_text(rng), random_text(rng)))
                .collect(),
        ),
    }
}

fn random_args(rng: &mut StdRng, layout: &CallLayout) -> CallArgs {
    let mut args = CallArgs::new(
        layout
            .args
            .iter()
            .map(|slot| random_value(rng, &slot.kind))
            .collect(),
    );
    for (index, slot) in layout.optargs.iter().enumerate() {
        if rng.random_bool(0.5) {
            args = args.with_optional(index, random_value(rng, &slot.kind));
        }
    }
    args
}

#[test]
fn every_procedure_round_trips_generated_values() {
    let protocol = shipped_protocol();
    assert!(!protocol.is_empty());
    let mut rng = StdRng::seed_from_u64(0x5EED_CA11);
    for round in 0..ROUNDS {
        for layout in protocol.iter() {
            let serial = rng.random();
            let args = random_args(&mut rng, layout);
            let bytes = encode_call(layout, serial, 0, &args).expect("encode call");
            let call = decode_call(&protocol, &bytes).expect("decode call");
            assert_eq!(call.header.proc_nr, layout.proc_nr, "{}", layout.name);
            assert_eq!(call.args, args, "{} round {round}", layout.name);

            let reply = Reply::Ok(random_value(&mut rng, &layout.reply));
            let bytes = encode_reply(layout.proc_nr, serial, &layout.reply, &reply)
                .expect("encode reply");
            assert_eq!(
                decode_reply(layout, serial, &bytes).expect("decode reply"),
                reply,
                "{} round {round}",
                layout.name
            );
        }
    }
}

#[test]
fn strings_up_to_the_message_limit_round_trip() {
    let protocol = shipped_protocol();
    let layout = protocol
        .iter()
        .find(|layout| {
            layout.args.len() == 1
                && layout.args[0].kind == WireKind::String
                && layout.optargs.is_empty()
        })
        .expect("single string procedure");

    let largest = MESSAGE_MAX - HEADER_LEN - 4;
    let args = CallArgs::new(vec![Value::String("a".repeat(largest))]);
    let bytes = encode_call(layout, 1, 0, &args).expect("encode at the limit");
    assert_eq!(bytes.len(), MESSAGE_MAX);
    assert_eq!(decode_call(&protocol, &bytes).expect("decode").args, args);

    let args = CallArgs::new(vec![Value::String("a".repeat(largest + 1))]);
    assert!(matches!(
        encode_call(layout, 1, 0, &args),
        Err(WireError::Oversize { .. })
    ));
}

#[test]
fn percentages_outside_the_range_are_refused() {
    let protocol = shipped_protocol();
    let lvs = protocol.by_name("lvs_full").expect("lvs_full layout");
    let WireKind::StructList(record) = &lvs.reply else {
        panic!("lvs_full returns a struct list");
    };
    let percent_at = record
        .fields
        .iter()
        .position(|(_, kind)| *kind == FieldKind::OptPercent)
        .expect("percent field");
    let mut rng = StdRng::seed_from_u64(7);
    let mut entry = random_record(&mut rng, record);

    entry.fields[percent_at] = FieldValue::OptPercent(None);
    let reply = Reply::Ok(Value::StructList(vec![entry.clone()]));
    let bytes = encode_reply(lvs.proc_nr, 2, &lvs.reply, &reply).expect("unset percent");
    assert_eq!(decode_reply(lvs, 2, &bytes).expect("decode"), reply);

    for bad in [-1.0f32, -0.5, 100.5, f32::NAN] {
        entry.fields[percent_at] = FieldValue::OptPercent(Some(bad));
        let reply = Reply::Ok(Value::StructList(vec![entry.clone()]));
        assert!(
            encode_reply(lvs.proc_nr, 2, &lvs.reply, &reply).is_err(),
            "{bad} encoded"
        );
    }
}

#[test]
fn mountable_or_path_and_filename_list_parameters_are_inline() {
    let protocol = shipped_protocol();
    let file = protocol.by_name("file").expect("file layout");
    assert_eq!(file.args.len(), 1);
    assert_eq!(file.args[0].kind, WireKind::String);
    assert!(!file.args[0].absolute_path);

    let list = protocol.by_name("lstatnslist").expect("lstatnslist layout");
    assert_eq!(list.args[1].name, "names");
    assert_eq!(list.args[1].kind, WireKind::StringList);
    let args = CallArgs::new(vec![
        "/dir".into(),
        Value::StringList(vec!["a".to_owned(), String::new(), "c d".to_owned()]),
    ]);
    let bytes = encode_call(list, 3, 0, &args).expect("encode");
    assert_eq!(decode_call(&protocol, &bytes).expect("decode").args, args);
}

#[test]
fn grep_with_only_required_arguments() {
    let protocol = shipped_protocol();
    let grep = protocol.by_name("grep").expect("grep layout");
    assert_eq!(grep.optargs.len(), 4);
    let args = CallArgs::new(vec!["abc".into(), "/test-grep".into()]);
    let bytes = encode_call(grep, 1, 0, &args).expect("encode");
    let (header, _) = decode_header(&bytes).expect("header");
    assert_eq!(header.optargs_bitmask, 0);
    let call = decode_call(&protocol, &bytes).expect("decode");
    assert_eq!(call.args.required.len(), 2);
    assert!(call.args.optional.iter().all(Option::is_none));
}

#[test]
fn stream_parameters_are_not_inline() {
    let protocol = shipped_protocol();
    let upload = protocol.by_name("upload").expect("upload layout");
    assert_eq!(upload.stream, Some(StreamDirection::Upload));
    assert_eq!(upload.args.len(), 1);
    assert_eq!(upload.args[0].name, "remotefilename");
    assert!(upload.args[0].absolute_path);
    assert!(upload.cancellable && upload.progress);

    let download = protocol.by_name("download").expect("download layout");
    assert_eq!(download.stream, Some(StreamDirection::Download));
    assert_eq!(download.args.len(), 1);
}

#[test]
fn secret_slots_are_flagged_and_redacted() {
    let protocol = shipped_protocol();
    let open = protocol.by_name("cryptsetup_open").expect("layout");
    let key = open.args.iter().find(|slot| slot.name == "key").expect("key slot");
    assert!(key.secret);
    let values = vec![
        Value::from("/dev/sda1"),
        Value::from("correct horse"),
        Value::from("luks0"),
    ];
    let shown = open.redacted(&values).to_string();
    assert!(shown.contains("key=<redacted>"), "{shown}");
    assert!(!shown.contains("correct horse"));
}

#[test]
fn client_only_actions_have_no_layout() {
    let protocol = shipped_protocol();
    assert!(protocol.by_name("get_qemu").is_none());
    assert!(protocol.by_name("add_libvirt_dom").is_none());
    let mut numbers: Vec<_> = protocol.iter().map(|layout| layout.proc_nr).collect();
    let sorted = {
        let mut copy = numbers.clone();
        copy.sort_unstable();
        copy
    };
    assert_eq!(numbers, sorted);
    numbers.dedup();
    assert_eq!(numbers.len(), protocol.len());
}
