//! Pure byte-span to [`FieldValue`] extraction. Ported from
//! `original_source/src/packet_parser.cpp`'s `extract_value`.

use crate::catalog::{FieldDesc, FieldType, FieldValue};

/// Extract a typed value from `span` at `desc.offset`.
///
/// Preconditions (not checked here; a violation is a caller bug, not a runtime error per
/// SPEC_FULL.md §4.3): `span` must contain at least `desc.offset + desc.wire_size()` bytes.
pub fn extract(ty: FieldType, span: &[u8], desc: &FieldDesc) -> FieldValue {
    let base = &span[desc.offset..];
    match ty {
        FieldType::U8 => FieldValue::U8(base[0]),
        FieldType::U16 => FieldValue::U16(u16::from_le_bytes([base[0], base[1]])),
        FieldType::U32 => FieldValue::U32(u32::from_le_bytes(base[..4].try_into().unwrap())),
        FieldType::U64 => FieldValue::U64(u64::from_le_bytes(base[..8].try_into().unwrap())),
        FieldType::I8 => FieldValue::I8(base[0] as i8),
        FieldType::I16 => FieldValue::I16(i16::from_le_bytes([base[0], base[1]])),
        FieldType::I32 => FieldValue::I32(i32::from_le_bytes(base[..4].try_into().unwrap())),
        FieldType::I64 => FieldValue::I64(i64::from_le_bytes(base[..8].try_into().unwrap())),
        FieldType::F32 => FieldValue::F32(f32::from_le_bytes(base[..4].try_into().unwrap())),
        FieldType::F64 => FieldValue::F64(f64::from_le_bytes(base[..8].try_into().unwrap())),
        FieldType::Bytes => {
            let len = desc.length.unwrap_or(0);
            FieldValue::Bytes(base[..len].to_vec())
        }
    }
}
