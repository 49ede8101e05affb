//! Deterministic, single-pass catalog scan/match engine. Ported from
//! `original_source/src/packet_parser.cpp`'s `scan_packets`.

use crate::catalog::{FieldDesc, FieldValue, PacketCatalog, PacketDesc};
use crate::field::extract;

/// One matched field within one matched packet: the raw wire bytes, the field's descriptor,
/// and its decoded value.
pub struct FieldView<'a> {
    pub raw: &'a [u8],
    pub desc: &'a FieldDesc,
    pub value: FieldValue,
}

/// Scan `data` against `catalog`, calling `visitor` once per field of every matched packet,
/// in declaration order, for every packet matched left to right.
///
/// Matching is first-match-wins: at each unmatched byte position the catalog is tried in
/// declared order; the first packet whose identifier field matches and whose declared size
/// fits within the remaining bytes consumes `total_size()` bytes. A position with no match
/// advances by one byte. Returns `(packets_found, bytes_consumed)`; `bytes_consumed` may be
/// less than `data.len()` when a partial packet remains at the tail (the caller is
/// responsible for retaining the unconsumed suffix for the next scan).
pub fn scan<'a>(
    catalog: &'a PacketCatalog,
    data: &'a [u8],
    mut visitor: impl FnMut(FieldView<'a>, &'a PacketDesc),
) -> (usize, usize) {
    let mut packets_found = 0;
    let mut offset = 0;

    'outer: while offset < data.len() {
        for packet in catalog.iter() {
            let required_size = packet.total_size();
            if data.len() - offset < required_size {
                continue;
            }
            let view = &data[offset..offset + required_size];

            let id_field = packet.id_field();
            let id_val = extract(id_field.ty, view, id_field);
            if id_val != packet.id_value {
                continue;
            }

            for field in &packet.fields {
                let len = field.wire_size();
                if view.len() < field.offset + len {
                    continue;
                }
                let value = extract(field.ty, view, field);
                visitor(
                    FieldView {
                        raw: &view[field.offset..field.offset + len],
                        desc: field,
                        value,
                    },
                    packet,
                );
            }

            offset += required_size;
            packets_found += 1;
            continue 'outer;
        }
        offset += 1;
    }

    (packets_found, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldType, MqttTemplate};

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
    fn matches_single_packet() {
        let catalog = PacketCatalog::new(vec![heartbeat()]).unwrap();
        let data = [0x01, 0x2A, 0x00];
        let mut fields = Vec::new();
        let (found, consumed) = scan(&catalog, &data, |fv, pkt| {
            fields.push((pkt.name.clone(), fv.desc.name.clone(), fv.value));
        });
        assert_eq!(found, 1);
        assert_eq!(consumed, 3);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1].2, FieldValue::U16(0x2A));
    }

    #[test]
    fn skips_unmatched_byte_and_resyncs() {
        let catalog = PacketCatalog::new(vec![heartbeat()]).unwrap();
        let data = [0xFF, 0x01, 0x2A, 0x00];
        let mut matches = 0;
        let (found, consumed) = scan(&catalog, &data, |_, _| matches += 1);
        assert_eq!(found, 1);
        assert_eq!(consumed, 4);
        assert_eq!(matches, 2);
    }

    #[test]
    fn leaves_trailing_partial_frame_unconsumed() {
        let catalog = PacketCatalog::new(vec![heartbeat()]).unwrap();
        let data = [0x01, 0x2A, 0x00, 0x01, 0x00];
        let (found, consumed) = scan(&catalog, &data, |_, _| {});
        assert_eq!(found, 1);
        assert_eq!(consumed, 3);
    }

    #[test]
    fn first_match_wins_on_overlapping_candidates() {
        let generic = PacketDesc {
            name: "generic".into(),
            fields: vec![FieldDesc {
                name: "id".into(),
                ty: FieldType::U8,
                offset: 0,
                length: None,
                bitfield: None,
                value: Some(FieldValue::U8(0x01)),
            }],
            id_field_index: 0,
            id_value: FieldValue::U8(0x01),
            template: MqttTemplate::default(),
        };
        let catalog = PacketCatalog::new(vec![heartbeat(), generic]).unwrap();
        let data = [0x01, 0x2A, 0x00];
        let mut matched_name = String::new();
        let (found, _) = scan(&catalog, &data, |_, pkt| matched_name = pkt.name.clone());
        assert_eq!(found, 1);
        assert_eq!(matched_name, "heartbeat");
    }

    #[test]
    fn empty_data_yields_nothing() {
        let catalog = PacketCatalog::new(vec![heartbeat()]).unwrap();
        let (found, consumed) = scan(&catalog, &[], |_, _| {});
        assert_eq!(found, 0);
        assert_eq!(consumed, 0);
    }
}
