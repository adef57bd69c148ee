//! Exact-byte and exact-slot scenarios for the wire layouts, flat
//! signatures and numeric boundary behavior.

use canon_abi::prelude::*;
use canon_abi::{CanonicalAbiError, FlatReader, FlatType};

fn opts() -> CanonOptions {
    CanonOptions::default()
}

fn lift_one(ty: &ValType, slots: &[FlatValue]) -> canon_abi::Result<Value> {
    let mem = LinearMemory::new();
    let mut reader = FlatReader::new(slots);
    ty.lift(&mem, &mut reader, &opts())
}

#[test]
fn list_u8_store_writes_body_and_header() {
    let ty = ValType::list(ValType::U8);
    let mut mem = LinearMemory::new();
    let header = mem.alloc(ty.alignment(), ty.byte_size());
    let value = Value::List(vec![Value::U8(1), Value::U8(2), Value::U8(3)]);
    ty.store(&mut mem, header, &value, &opts()).unwrap();

    let bytes = mem.as_bytes();
    let body = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    let len = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    assert_eq!(len, 3);
    assert_eq!(mem.read(body, 3).unwrap(), &[1, 2, 3]);
    assert_eq!(ty.load(&mem, header, &opts()).unwrap(), value);
}

#[test]
fn string_header_counts_utf8_bytes() {
    let ty = ValType::String;
    assert_eq!(ty.byte_size(), 8);
    assert_eq!(ty.alignment(), 4);

    let mut mem = LinearMemory::new();
    let header = mem.alloc(4, 8);
    let value = Value::String("héllo".to_owned());
    ty.store(&mut mem, header, &value, &opts()).unwrap();

    let bytes = mem.as_bytes();
    let body = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    let units = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    assert_eq!(units, 6);
    assert_eq!(
        mem.read(body, 6).unwrap(),
        &[0x68, 0xC3, 0xA9, 0x6C, 0x6C, 0x6F]
    );
    assert_eq!(ty.load(&mem, header, &opts()).unwrap(), value);
}

#[test]
fn person_record_layout_and_flat_shape() {
    let ty = ValType::record([("name", ValType::String), ("age", ValType::U32)]);
    assert_eq!(ty.byte_size(), 12);
    assert_eq!(ty.alignment(), 4);
    assert_eq!(
        ty.flat_types(),
        vec![FlatType::I32, FlatType::I32, FlatType::I32]
    );

    let mut mem = LinearMemory::new();
    let value = Value::Record(vec![
        ("name".to_owned(), Value::String("a".to_owned())),
        ("age".to_owned(), Value::U32(7)),
    ]);
    let mut sink = Vec::new();
    ty.lower(&mut mem, &value, &mut sink, &opts()).unwrap();
    // Fresh memory: the one-byte string body lands at pointer 0.
    assert_eq!(
        sink,
        vec![FlatValue::I32(0), FlatValue::I32(1), FlatValue::I32(7)]
    );
}

#[test]
fn result_of_u32_f32_joins_and_reinterprets() {
    let ty = ValType::result(Some(ValType::U32), Some(ValType::F32));
    assert_eq!(ty.byte_size(), 8);
    assert_eq!(ty.flat_types(), vec![FlatType::I32, FlatType::I32]);

    let mut mem = LinearMemory::new();
    let mut sink = Vec::new();
    ty.lower(&mut mem, &Value::ok(Value::U32(5)), &mut sink, &opts())
        .unwrap();
    assert_eq!(sink, vec![FlatValue::I32(0), FlatValue::I32(5)]);
    assert_eq!(
        lift_one(&ty, &sink).unwrap(),
        Value::ok(Value::U32(5))
    );

    let mut sink = Vec::new();
    ty.lower(&mut mem, &Value::err(Value::F32(1.5)), &mut sink, &opts())
        .unwrap();
    assert_eq!(
        sink,
        vec![
            FlatValue::I32(1),
            FlatValue::I32(1.5f32.to_bits() as i32)
        ]
    );
    assert_eq!(
        lift_one(&ty, &sink).unwrap(),
        Value::err(Value::F32(1.5))
    );
}

#[test]
fn variant_pads_narrow_case_with_zero() {
    let ty = ValType::variant([
        Some(ValType::U32),
        Some(ValType::tuple([ValType::U32, ValType::U32])),
    ])
    .unwrap();
    assert_eq!(
        ty.flat_types(),
        vec![FlatType::I32, FlatType::I32, FlatType::I32]
    );

    let mut mem = LinearMemory::new();
    let mut sink = Vec::new();
    ty.lower(
        &mut mem,
        &Value::variant(0, Some(Value::U32(5))),
        &mut sink,
        &opts(),
    )
    .unwrap();
    assert_eq!(
        sink,
        vec![FlatValue::I32(0), FlatValue::I32(5), FlatValue::I32(0)]
    );
    assert_eq!(
        lift_one(&ty, &sink).unwrap(),
        Value::variant(0, Some(Value::U32(5)))
    );
}

#[test]
fn variant_coerces_through_i64_join() {
    let ty = ValType::variant([Some(ValType::F64), Some(ValType::U32)]).unwrap();
    assert_eq!(ty.flat_types(), vec![FlatType::I32, FlatType::I64]);

    let mut mem = LinearMemory::new();
    let mut sink = Vec::new();
    ty.lower(
        &mut mem,
        &Value::variant(0, Some(Value::F64(6.125))),
        &mut sink,
        &opts(),
    )
    .unwrap();
    assert_eq!(
        sink,
        vec![
            FlatValue::I32(0),
            FlatValue::I64(6.125f64.to_bits() as i64)
        ]
    );
    assert_eq!(
        lift_one(&ty, &sink).unwrap(),
        Value::variant(0, Some(Value::F64(6.125)))
    );

    let mut sink = Vec::new();
    ty.lower(
        &mut mem,
        &Value::variant(1, Some(Value::U32(7))),
        &mut sink,
        &opts(),
    )
    .unwrap();
    assert_eq!(sink, vec![FlatValue::I32(1), FlatValue::I64(7)]);
    assert_eq!(
        lift_one(&ty, &sink).unwrap(),
        Value::variant(1, Some(Value::U32(7)))
    );
}

#[test]
fn twenty_six_flags_pack_one_word() {
    let ty = ValType::flags((b'a'..=b'z').map(|c| (c as char).to_string()));
    assert_eq!(ty.byte_size(), 4);
    assert_eq!(ty.alignment(), 4);
    assert_eq!(ty.flat_types(), vec![FlatType::I32]);

    let ValType::Flags(flags_ty) = &ty else {
        unreachable!()
    };
    let mut flags = FlagsValue::new(flags_ty);
    flags.set("b", true).unwrap();
    flags.set("z", true).unwrap();

    let mut mem = LinearMemory::new();
    let ptr = mem.alloc(4, 4);
    ty.store(&mut mem, ptr, &Value::Flags(flags.clone()), &opts())
        .unwrap();
    assert_eq!(
        u32::from_le_bytes(mem.as_bytes()[0..4].try_into().unwrap()),
        0x0200_0002
    );

    let loaded = ty.load(&mem, ptr, &opts()).unwrap();
    let Value::Flags(loaded) = loaded else {
        unreachable!()
    };
    let set: Vec<&str> = loaded
        .entries()
        .filter(|(_, on)| *on)
        .map(|(name, _)| name)
        .collect();
    assert_eq!(set, ["b", "z"]);
}

#[test]
fn unsigned_lift_boundaries() {
    assert_eq!(
        lift_one(&ValType::U8, &[FlatValue::I32(255)]).unwrap(),
        Value::U8(255)
    );
    assert!(matches!(
        lift_one(&ValType::U8, &[FlatValue::I32(256)]),
        Err(CanonicalAbiError::Validation { ty: "u8", .. })
    ));
    assert!(matches!(
        lift_one(&ValType::U8, &[FlatValue::I32(-1)]),
        Err(CanonicalAbiError::Validation { ty: "u8", .. })
    ));
    assert_eq!(
        lift_one(&ValType::U32, &[FlatValue::I32(-1)]).unwrap(),
        Value::U32(u32::MAX)
    );
}

#[test]
fn signed_wire_pattern_reinterprets() {
    // Wire value 255 is s8 -1; the positive half passes through.
    assert_eq!(
        lift_one(&ValType::S8, &[FlatValue::I32(255)]).unwrap(),
        Value::S8(-1)
    );
    assert_eq!(
        lift_one(&ValType::S8, &[FlatValue::I32(127)]).unwrap(),
        Value::S8(127)
    );
    assert!(lift_one(&ValType::S8, &[FlatValue::I32(256)]).is_err());
    assert!(lift_one(&ValType::S8, &[FlatValue::I32(-1)]).is_err());

    // Lowering encodes negatives as the unsigned pattern.
    let mut mem = LinearMemory::new();
    let mut sink = Vec::new();
    ValType::S8
        .lower(&mut mem, &Value::S8(-128), &mut sink, &opts())
        .unwrap();
    assert_eq!(sink, vec![FlatValue::I32(128)]);
    assert_eq!(lift_one(&ValType::S8, &sink).unwrap(), Value::S8(-128));
}

#[test]
fn bool_rejects_negative_wire_values() {
    assert_eq!(
        lift_one(&ValType::Bool, &[FlatValue::I32(0)]).unwrap(),
        Value::Bool(false)
    );
    assert_eq!(
        lift_one(&ValType::Bool, &[FlatValue::I32(3)]).unwrap(),
        Value::Bool(true)
    );
    assert!(lift_one(&ValType::Bool, &[FlatValue::I32(-1)]).is_err());

    // In memory any non-zero byte is true.
    let mem = LinearMemory::from_bytes(vec![7]);
    assert_eq!(
        ValType::Bool.load(&mem, 0, &opts()).unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn char_rejects_surrogates_and_out_of_range() {
    assert!(matches!(
        lift_one(&ValType::Char, &[FlatValue::I32(0xD800)]),
        Err(CanonicalAbiError::Validation { ty: "char", .. })
    ));
    assert!(lift_one(&ValType::Char, &[FlatValue::I32(0x110000)]).is_err());
    assert_eq!(
        lift_one(&ValType::Char, &[FlatValue::I32(0x10FFFF)]).unwrap(),
        Value::Char('\u{10FFFF}')
    );

    let mem = LinearMemory::from_bytes(0xD800u32.to_le_bytes().to_vec());
    assert!(ValType::Char.load(&mem, 0, &opts()).is_err());
}

#[test]
fn nan_canonicalizes_on_lift_and_lower() {
    let mut mem = LinearMemory::new();
    let mut sink = Vec::new();
    ValType::F32
        .lower(&mut mem, &Value::F32(f32::NAN), &mut sink, &opts())
        .unwrap();
    let [FlatValue::F32(lowered)] = sink[..] else {
        unreachable!()
    };
    assert_eq!(lowered.to_bits(), 0x7fc0_0000);

    let odd_nan = f32::from_bits(0x7fc0_1234);
    let Value::F32(lifted) = lift_one(&ValType::F32, &[FlatValue::F32(odd_nan)]).unwrap() else {
        unreachable!()
    };
    assert_eq!(lifted.to_bits(), 0x7fc0_0000);

    let mut sink = Vec::new();
    ValType::F64
        .lower(&mut mem, &Value::F64(f64::NAN), &mut sink, &opts())
        .unwrap();
    let [FlatValue::F64(lowered)] = sink[..] else {
        unreachable!()
    };
    assert_eq!(lowered.to_bits(), 0x7ff8_0000_0000_0000);

    // Memory stores copy bits verbatim.
    let ptr = mem.alloc(4, 4);
    ValType::F32
        .store(&mut mem, ptr, &Value::F32(f32::from_bits(0x7fc0_1234)), &opts())
        .unwrap();
    let Value::F32(loaded) = ValType::F32.load(&mem, ptr, &opts()).unwrap() else {
        unreachable!()
    };
    assert_eq!(loaded.to_bits(), 0x7fc0_1234);
}

#[test]
fn enum_lift_validates_range() {
    let ty = ValType::enumeration(3).unwrap();
    assert_eq!(lift_one(&ty, &[FlatValue::I32(2)]).unwrap(), Value::Enum(2));
    assert!(matches!(
        lift_one(&ty, &[FlatValue::I32(3)]),
        Err(CanonicalAbiError::Validation { ty: "enum", .. })
    ));

    // A 300-case enum takes a two-byte discriminant in memory.
    let wide = ValType::enumeration(300).unwrap();
    assert_eq!(wide.byte_size(), 2);
    let mut mem = LinearMemory::new();
    let ptr = mem.alloc(2, 2);
    wide.store(&mut mem, ptr, &Value::Enum(299), &opts()).unwrap();
    assert_eq!(wide.load(&mem, ptr, &opts()).unwrap(), Value::Enum(299));
}

#[test]
fn utf16_header_counts_units() {
    let ty = ValType::String;
    let opts = CanonOptions::default().with_encoding(StringEncoding::Utf16);
    let mut mem = LinearMemory::new();
    let header = mem.alloc(4, 8);
    ty.store(&mut mem, header, &Value::String("héllo".to_owned()), &opts)
        .unwrap();
    let units = u32::from_le_bytes(mem.as_bytes()[4..8].try_into().unwrap());
    assert_eq!(units, 5);
}

#[test]
fn latin1_utf16_is_unsupported() {
    let ty = ValType::String;
    let opts = CanonOptions::default().with_encoding(StringEncoding::Latin1Utf16);
    let mut mem = LinearMemory::new();
    let header = mem.alloc(4, 8);
    assert!(matches!(
        ty.store(&mut mem, header, &Value::String("x".to_owned()), &opts),
        Err(CanonicalAbiError::UnsupportedEncoding("latin1+utf-16"))
    ));
}

#[test]
fn unpacked_option_collapses_to_payload_or_null() {
    let ty = ValType::option(ValType::U32);
    let opts = CanonOptions::default().with_keep_option(false);
    let mut mem = LinearMemory::new();
    let ptr = mem.alloc(ty.alignment(), ty.byte_size());

    ty.store(&mut mem, ptr, &Value::U32(5), &opts).unwrap();
    assert_eq!(ty.load(&mem, ptr, &opts).unwrap(), Value::U32(5));

    ty.store(&mut mem, ptr, &Value::Null, &opts).unwrap();
    assert_eq!(ty.load(&mem, ptr, &opts).unwrap(), Value::Null);
}

#[test]
fn option_representation_mismatch_is_rejected_both_ways() {
    let ty = ValType::option(ValType::U32);
    let mut mem = LinearMemory::new();
    let ptr = mem.alloc(ty.alignment(), ty.byte_size());

    let unpacked = CanonOptions::default().with_keep_option(false);
    assert!(matches!(
        ty.store(&mut mem, ptr, &Value::some(Value::U32(5)), &unpacked),
        Err(CanonicalAbiError::OptionRepresentation {
            expected: "unpacked",
            got: "tagged",
        })
    ));

    let tagged = CanonOptions::default();
    assert!(matches!(
        ty.store(&mut mem, ptr, &Value::U32(5), &tagged),
        Err(CanonicalAbiError::OptionRepresentation {
            expected: "tagged",
            got: "unpacked",
        })
    ));
}

#[test]
fn variant_memory_layout_places_payload_after_aligned_discriminant() {
    // Discriminant byte, three bytes of padding, then the u32 payload.
    let ty = ValType::variant([Some(ValType::U32), Some(ValType::F32)]).unwrap();
    assert_eq!(ty.byte_size(), 8);
    assert_eq!(ty.alignment(), 4);

    let mut mem = LinearMemory::new();
    let ptr = mem.alloc(4, 8);
    ty.store(
        &mut mem,
        ptr,
        &Value::variant(0, Some(Value::U32(0xAABBCCDD))),
        &opts(),
    )
    .unwrap();
    let bytes = mem.as_bytes();
    assert_eq!(bytes[0], 0);
    assert_eq!(&bytes[4..8], &0xAABBCCDDu32.to_le_bytes());
}

#[test]
fn generic_list_u8_and_byte_buffer_are_wire_compatible() {
    let list_ty = ValType::list(ValType::U8);
    let buf_ty = ValType::buffer(NumericKind::U8);

    let mut mem = LinearMemory::new();
    let ptr = mem.alloc(4, 8);
    list_ty
        .store(
            &mut mem,
            ptr,
            &Value::List(vec![Value::U8(9), Value::U8(8)]),
            &opts(),
        )
        .unwrap();
    assert_eq!(
        buf_ty.load(&mem, ptr, &opts()).unwrap(),
        Value::Buffer(Buffer::U8(vec![9, 8]))
    );
}

#[test]
fn flat_arity_exhaustion_is_an_abi_violation() {
    let ty = ValType::record([("a", ValType::U32), ("b", ValType::U32)]);
    assert!(matches!(
        lift_one(&ty, &[FlatValue::I32(1)]),
        Err(CanonicalAbiError::AbiViolation(_))
    ));
}
