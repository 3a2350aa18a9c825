//! Value model behavior as seen through the public prelude.

use guestbridge_core::prelude::*;

guest_enum! {
    #[derive(Debug, PartialEq)]
    enum Weather: u8 {
        Clear = 1,
        Storm = 200,
    }
}

guest_enum! {
    enum Depth: i16 {
        Below = -3,
    }
}

guest_enum! {
    enum Handle: i64 {
        Root = 7,
    }
}

fn slot_of(value: HostValue, kind: ValKind) -> Option<WasmValue> {
    match value {
        HostValue::Scalar(boxed) => boxed.to_slot(kind),
        HostValue::Enum { repr, raw } => Boxed::from_enum(repr, raw)?.to_slot(kind),
        _ => None,
    }
}

#[test]
fn enums_widen_by_their_own_signedness() {
    assert_eq!(
        slot_of(Weather::Storm.to_host_value(), ValKind::I32),
        Some(WasmValue::I32(200))
    );
    assert_eq!(
        slot_of(Depth::Below.to_host_value(), ValKind::I32),
        Some(WasmValue::I32(-3))
    );
    assert_eq!(
        slot_of(Depth::Below.to_host_value(), ValKind::I64),
        Some(WasmValue::I64(-3))
    );
    assert_eq!(
        slot_of(Handle::Root.to_host_value(), ValKind::I64),
        Some(WasmValue::I64(7))
    );
    assert_eq!(slot_of(Handle::Root.to_host_value(), ValKind::I32), None);
}

#[test]
fn enum_slots_follow_representation() {
    assert_eq!(Weather::HOST_TYPE.abi_slot(), ValKind::I32);
    assert_eq!(Handle::HOST_TYPE.abi_slot(), ValKind::I64);
    assert_eq!(Handle::HOST_TYPE.classify(), ValueClass::MemoryScalar);
}

#[test]
fn unsigned_values_keep_their_bits() {
    assert_eq!(
        slot_of(u32::MAX.to_host_value(), ValKind::I32),
        Some(WasmValue::I32(-1))
    );
    assert_eq!(
        slot_of(u64::MAX.to_host_value(), ValKind::I64),
        Some(WasmValue::I64(-1))
    );
    assert_eq!(
        slot_of(u32::MAX.to_host_value(), ValKind::I64),
        Some(WasmValue::I64(i64::from(u32::MAX)))
    );
}

#[test]
fn floats_only_fit_their_own_slot() {
    assert_eq!(
        slot_of(1.5f32.to_host_value(), ValKind::F32),
        Some(WasmValue::F32(1.5))
    );
    assert_eq!(slot_of(1.5f32.to_host_value(), ValKind::F64), None);
    assert_eq!(slot_of(1.5f64.to_host_value(), ValKind::I64), None);
}

#[test]
fn tiers_nest() {
    assert!(i32::HOST_TYPE.is_primitive());
    assert!(i32::HOST_TYPE.is_abi_argument());
    assert!(GuestPtr::HOST_TYPE.is_memory_scalar());
    assert!(!GuestPtr::HOST_TYPE.is_primitive());
    assert_eq!(String::HOST_TYPE.classify(), ValueClass::AbiArgument);
    assert_eq!(Float3::HOST_TYPE.classify(), ValueClass::AbiArgument);
    assert_eq!(Color::HOST_TYPE.classify(), ValueClass::AbiArgument);
}

#[test]
fn oversized_vectors_are_opaque() {
    let wide = Vector::<f32, 5>::new([0.0; 5]);
    assert_eq!(
        <Vector<f32, 5>>::HOST_TYPE.classify(),
        ValueClass::Invalid
    );
    assert_eq!(wide.to_host_value(), HostValue::Opaque("vector"));

    // 260 would wrap to 4 in a u8.
    let huge = Vector::<f32, 260>::new([0.0; 260]);
    assert_eq!(
        <Vector<f32, 260>>::HOST_TYPE.classify(),
        ValueClass::Invalid
    );
    assert!(!<Vector<f32, 260>>::HOST_TYPE.is_abi_argument());
    assert_eq!(huge.to_host_value(), HostValue::Opaque("vector"));
}

#[test]
fn vectors_encode_in_declared_order() {
    let value = Float3::new([1.0, 2.0, 3.0]).to_value().unwrap();
    assert_eq!(value.byte_len(), 12);

    let mut scratch = [0u8; 32];
    let bytes = value.encode(&mut scratch);
    let expected: Vec<u8> = [1.0f32, 2.0, 3.0]
        .iter()
        .flat_map(|c| c.to_le_bytes())
        .collect();
    assert_eq!(bytes, expected.as_slice());
}

#[test]
fn command_line_literals_parse_per_kind() {
    assert_eq!(WasmValue::parse(ValKind::I32, "-4"), Some(WasmValue::I32(-4)));
    assert_eq!(
        WasmValue::parse(ValKind::F64, "2.25"),
        Some(WasmValue::F64(2.25))
    );
    assert_eq!(WasmValue::parse(ValKind::I32, "2.25"), None);
    assert_eq!(WasmValue::parse(ValKind::I64, "x"), None);
}

#[test]
fn contract_violations_are_fatal() {
    let err = BridgeError::contract("opaque value");
    assert_eq!(err.code(), "E901");
    assert_eq!(err.class(), ErrorClass::ContractViolation);
    assert!(err.is_fatal());
}
