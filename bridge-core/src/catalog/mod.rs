//! Declarative packet catalog: types, load-time validation.
//!
//! Mirrors the struct layout of `original_source/src/packet_parser.hpp`.

mod fieldvalue;
pub mod loader;

pub use fieldvalue::{FieldType, FieldValue};

use std::fmt;
use thiserror::Error;

/// Bitfield metadata, preserved for forward compatibility. The core does not extract
/// bitfield-level values; see SPEC_FULL.md §9 "Bitfield metadata".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bitfield {
    pub bit_offset: u8,
    pub bit_count: u8,
}

/// Descriptor for one field within one packet.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDesc {
    pub name: String,
    pub ty: FieldType,
    pub offset: usize,
    pub length: Option<usize>,
    pub bitfield: Option<Bitfield>,
    pub value: Option<FieldValue>,
}

impl FieldDesc {
    /// Wire size in bytes: fixed for numeric types, `length` for `bytes`.
    pub fn wire_size(&self) -> usize {
        match self.ty {
            FieldType::U8 | FieldType::I8 => 1,
            FieldType::U16 | FieldType::I16 => 2,
            FieldType::U32 | FieldType::I32 | FieldType::F32 => 4,
            FieldType::U64 | FieldType::I64 | FieldType::F64 => 8,
            FieldType::Bytes => self.length.unwrap_or(0),
        }
    }
}

impl fmt::Display for FieldDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldDesc{{name: {}, type: {:?}, offset: {}", self.name, self.ty, self.offset)?;
        if let Some(bf) = &self.bitfield {
            write!(f, ", bitfield: {{offset: {}, count: {}}}", bf.bit_offset, bf.bit_count)?;
        }
        if let Some(len) = self.length {
            write!(f, ", length: {len}")?;
        }
        if let Some(val) = &self.value {
            write!(f, ", value: [{val}]")?;
        }
        write!(f, "}}")
    }
}

/// MQTT publish template attached to a matched packet.
#[derive(Debug, Clone, PartialEq)]
pub struct MqttTemplate {
    pub topic: String,
    pub payload: String,
    pub qos: u8,
    pub retain: bool,
}

impl Default for MqttTemplate {
    fn default() -> Self {
        Self {
            topic: String::new(),
            payload: String::new(),
            qos: 0,
            retain: false,
        }
    }
}

/// One declared packet layout.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketDesc {
    pub name: String,
    pub fields: Vec<FieldDesc>,
    pub id_field_index: usize,
    pub id_value: FieldValue,
    pub template: MqttTemplate,
}

impl PacketDesc {
    pub fn id_field(&self) -> &FieldDesc {
        &self.fields[self.id_field_index]
    }

    /// Total packet size: the maximum of `field.offset + field.wire_size()` across fields.
    pub fn total_size(&self) -> usize {
        self.fields
            .iter()
            .map(|f| f.offset + f.wire_size())
            .max()
            .unwrap_or(0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("packet '{0}': no field declares a fixed 'value' to serve as identifier")]
    NoIdentifier(String),
    #[error("packet '{0}' field '{1}': bytes field has no length")]
    MissingLength(String, String),
    #[error("packet '{0}': identifier value type does not match identifier field type")]
    IdentifierTypeMismatch(String),
    #[error("packet '{0}' field '{1}': duplicate field name")]
    DuplicateFieldName(String, String),
    #[error("duplicate packet name '{0}'")]
    DuplicatePacketName(String),
    #[error("packet '{0}' has no fields")]
    NoFields(String),
    #[error("packet '{0}' field '{1}': offset + wire size overflows a usize")]
    SizeOverflow(String, String),
}

/// Immutable, validated, ordered set of declared packets. Lookup order during scanning is
/// declared order; first match wins.
#[derive(Debug, Clone, Default)]
pub struct PacketCatalog {
    packets: Vec<PacketDesc>,
}

impl PacketCatalog {
    /// Validate and take ownership of `packets`, enforcing the invariants in SPEC_FULL.md §3.
    pub fn new(packets: Vec<PacketDesc>) -> Result<Self, CatalogError> {
        let mut seen_names = std::collections::HashSet::new();
        for packet in &packets {
            if packet.fields.is_empty() {
                return Err(CatalogError::NoFields(packet.name.clone()));
            }
            if !seen_names.insert(packet.name.as_str()) {
                return Err(CatalogError::DuplicatePacketName(packet.name.clone()));
            }

            let mut seen_fields = std::collections::HashSet::new();
            for field in &packet.fields {
                if !seen_fields.insert(field.name.as_str()) {
                    return Err(CatalogError::DuplicateFieldName(
                        packet.name.clone(),
                        field.name.clone(),
                    ));
                }
                if field.ty == FieldType::Bytes && field.length.is_none() {
                    return Err(CatalogError::MissingLength(packet.name.clone(), field.name.clone()));
                }
                if field.offset.checked_add(field.wire_size()).is_none() {
                    return Err(CatalogError::SizeOverflow(packet.name.clone(), field.name.clone()));
                }
            }

            let id_field = packet
                .fields
                .iter()
                .position(|f| f.value.is_some())
                .ok_or_else(|| CatalogError::NoIdentifier(packet.name.clone()))?;
            if id_field != packet.id_field_index {
                return Err(CatalogError::NoIdentifier(packet.name.clone()));
            }
            let id_field_desc = &packet.fields[id_field];
            if id_field_desc.ty != packet.id_value.field_type() {
                return Err(CatalogError::IdentifierTypeMismatch(packet.name.clone()));
            }
        }
        Ok(Self { packets })
    }

    pub fn iter(&self) -> impl Iterator<Item = &PacketDesc> {
        self.packets.iter()
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heartbeat() -> PacketDesc {
        PacketDesc {
            name: "heartbeat".into(),
            fields: vec![
                FieldDesc {
                    name: "id".into(),
                    ty: FieldType::U8,
                    offset: 0,
                    length: None,
                    bitfield: None,
                    value: Some(FieldValue::U8(0x01)),
                },
                FieldDesc {
                    name: "seq".into(),
                    ty: FieldType::U16,
                    offset: 1,
                    length: None,
                    bitfield: None,
                    value: None,
                },
            ],
            id_field_index: 0,
            id_value: FieldValue::U8(0x01),
            template: MqttTemplate {
                topic: "hb/{{seq}}".into(),
                payload: "ok".into(),
                qos: 0,
                retain: false,
            },
        }
    }

    #[test]
    fn valid_catalog_builds() {
        let catalog = PacketCatalog::new(vec![heartbeat()]).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.iter().next().unwrap().total_size(), 3);
    }

    #[test]
    fn rejects_field_whose_offset_plus_size_overflows() {
        let mut pkt = heartbeat();
        pkt.fields[1].offset = usize::MAX;
        let err = PacketCatalog::new(vec![pkt]).unwrap_err();
        assert!(matches!(err, CatalogError::SizeOverflow(_, _)));
    }

    #[test]
    fn rejects_packet_with_no_identifier() {
        let mut pkt = heartbeat();
        pkt.fields[0].value = None;
        pkt.id_field_index = 0;
        let err = PacketCatalog::new(vec![pkt]).unwrap_err();
        assert!(matches!(err, CatalogError::NoIdentifier(_)));
    }

    #[test]
    fn rejects_bytes_field_without_length() {
        let mut pkt = heartbeat();
        pkt.fields.push(FieldDesc {
            name: "payload".into(),
            ty: FieldType::Bytes,
            offset: 3,
            length: None,
            bitfield: None,
            value: None,
        });
        let err = PacketCatalog::new(vec![pkt]).unwrap_err();
        assert!(matches!(err, CatalogError::MissingLength(_, _)));
    }

    #[test]
    fn rejects_identifier_type_mismatch() {
        let mut pkt = heartbeat();
        pkt.id_value = FieldValue::U16(1);
        let err = PacketCatalog::new(vec![pkt]).unwrap_err();
        assert!(matches!(err, CatalogError::IdentifierTypeMismatch(_)));
    }

    #[test]
    fn rejects_duplicate_packet_names() {
        let err = PacketCatalog::new(vec![heartbeat(), heartbeat()]).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicatePacketName(_)));
    }

    #[test]
    fn rejects_duplicate_field_names() {
        let mut pkt = heartbeat();
        pkt.fields.push(FieldDesc {
            name: "seq".into(),
            ty: FieldType::U8,
            offset: 3,
            length: None,
            bitfield: None,
            value: None,
        });
        let err = PacketCatalog::new(vec![pkt]).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateFieldName(_, _)));
    }

    #[test]
    fn rejects_packet_with_no_fields() {
        let mut pkt = heartbeat();
        pkt.fields.clear();
        let err = PacketCatalog::new(vec![pkt]).unwrap_err();
        assert!(matches!(err, CatalogError::NoFields(_)));
    }
}
