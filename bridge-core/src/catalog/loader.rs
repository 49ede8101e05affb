//! YAML catalog loading: per-file parsing plus glob-based discovery across a set of
//! search paths. Ported from `original_source/src/packet_parser_yaml.cpp`; directory/pattern
//! walk ported from `original_source/src/main.cpp`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{Bitfield, CatalogError, FieldDesc, FieldType, FieldValue, MqttTemplate, PacketCatalog, PacketDesc};

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: invalid glob pattern: {source}")]
    Pattern {
        path: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("{path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[derive(Debug, Deserialize)]
struct YamlMqtt {
    #[serde(default)]
    topic: String,
    #[serde(default)]
    payload: String,
    #[serde(default)]
    qos: u8,
    #[serde(default)]
    retain: bool,
}

#[derive(Debug, Deserialize)]
struct YamlBitfield {
    bit_offset: u8,
    bit_count: u8,
}

#[derive(Debug, Deserialize)]
struct YamlField {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    offset: usize,
    length: Option<usize>,
    bitfield: Option<YamlBitfield>,
    value: Option<serde_norway::Value>,
}

#[derive(Debug, Deserialize)]
struct YamlPacket {
    #[serde(default)]
    mqtt: Option<YamlMqtt>,
    fields: Vec<YamlField>,
}

fn parse_field_type(raw: &str) -> Result<FieldType, String> {
    match raw {
        "uint8" => Ok(FieldType::U8),
        "uint16" => Ok(FieldType::U16),
        "uint32" => Ok(FieldType::U32),
        "uint64" => Ok(FieldType::U64),
        "int8" => Ok(FieldType::I8),
        "int16" => Ok(FieldType::I16),
        "int32" => Ok(FieldType::I32),
        "int64" => Ok(FieldType::I64),
        "float32" => Ok(FieldType::F32),
        "float64" => Ok(FieldType::F64),
        "bytearray" => Ok(FieldType::Bytes),
        other => Err(format!("unknown field type '{other}'")),
    }
}

fn parse_integer(value: &serde_norway::Value) -> Result<u64, String> {
    match value {
        serde_norway::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_i64().map(|v| v as u64))
            .ok_or_else(|| "integer value out of range".to_string()),
        serde_norway::Value::String(s) => {
            let s = s.trim();
            if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                u64::from_str_radix(hex, 16).map_err(|e| e.to_string())
            } else {
                s.parse::<u64>().map_err(|e| e.to_string())
            }
        }
        other => Err(format!("expected integer scalar, found {other:?}")),
    }
}

fn parse_bytes(value: &serde_norway::Value) -> Result<Vec<u8>, String> {
    match value {
        serde_norway::Value::Sequence(items) => items
            .iter()
            .map(|item| parse_integer(item).map(|v| v as u8))
            .collect(),
        serde_norway::Value::String(s) => {
            let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
            if s.len() % 2 != 0 {
                return Err("bytearray hex string must have even length".to_string());
            }
            (0..s.len())
                .step_by(2)
                .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| e.to_string()))
                .collect()
        }
        other => Err(format!("expected sequence or hex string, found {other:?}")),
    }
}

fn parse_value(value: &serde_norway::Value, ty: FieldType) -> Result<FieldValue, String> {
    Ok(match ty {
        FieldType::U8 => FieldValue::U8(parse_integer(value)? as u8),
        FieldType::U16 => FieldValue::U16(parse_integer(value)? as u16),
        FieldType::U32 => FieldValue::U32(parse_integer(value)? as u32),
        FieldType::U64 => FieldValue::U64(parse_integer(value)?),
        FieldType::I8 => FieldValue::I8(parse_integer(value)? as i8),
        FieldType::I16 => FieldValue::I16(parse_integer(value)? as i16),
        FieldType::I32 => FieldValue::I32(parse_integer(value)? as i32),
        FieldType::I64 => FieldValue::I64(parse_integer(value)? as i64),
        FieldType::F32 => FieldValue::F32(
            value
                .as_f64()
                .ok_or_else(|| "expected float32 scalar".to_string())? as f32,
        ),
        FieldType::F64 => FieldValue::F64(
            value
                .as_f64()
                .ok_or_else(|| "expected float64 scalar".to_string())?,
        ),
        FieldType::Bytes => FieldValue::Bytes(parse_bytes(value)?),
    })
}

/// Parse one YAML document's worth of packet declarations into `PacketDesc`s. Does not
/// validate cross-packet invariants (duplicate names, etc.) — callers feed the aggregate
/// list through [`PacketCatalog::new`].
fn packets_from_yaml_str(path: &Path, text: &str) -> Result<Vec<PacketDesc>, LoaderError> {
    let root: serde_norway::Mapping = serde_norway::from_str(text).map_err(|e| LoaderError::Parse {
        path: path.to_path_buf(),
        message: format!("catalog must be a mapping of packets: {e}"),
    })?;

    let mut out = Vec::with_capacity(root.len());
    for (key, value) in root {
        let name = key
            .as_str()
            .ok_or_else(|| LoaderError::Parse {
                path: path.to_path_buf(),
                message: "packet keys must be strings".to_string(),
            })?
            .to_string();

        let raw: YamlPacket = serde_norway::from_value(value).map_err(|e| LoaderError::Parse {
            path: path.to_path_buf(),
            message: format!("packet '{name}': {e}"),
        })?;

        let mqtt = raw.mqtt.unwrap_or(YamlMqtt {
            topic: String::new(),
            payload: String::new(),
            qos: 0,
            retain: false,
        });

        let mut fields = Vec::with_capacity(raw.fields.len());
        let mut id_field_index = None;
        let mut id_value = None;
        for (idx, f) in raw.fields.into_iter().enumerate() {
            let ty = parse_field_type(&f.ty).map_err(|message| LoaderError::Parse {
                path: path.to_path_buf(),
                message: format!("packet '{name}' field '{}': {message}", f.name),
            })?;
            if ty == FieldType::Bytes && f.length.is_none() {
                return Err(LoaderError::Parse {
                    path: path.to_path_buf(),
                    message: format!("packet '{name}' field '{}': bytearray must have 'length'", f.name),
                });
            }
            let bitfield = f.bitfield.map(|bf| Bitfield {
                bit_offset: bf.bit_offset,
                bit_count: bf.bit_count,
            });
            let value = f
                .value
                .as_ref()
                .map(|v| parse_value(v, ty))
                .transpose()
                .map_err(|message| LoaderError::Parse {
                    path: path.to_path_buf(),
                    message: format!("packet '{name}' field '{}': {message}", f.name),
                })?;
            if id_field_index.is_none() && value.is_some() {
                id_field_index = Some(idx);
                id_value = value.clone();
            }
            fields.push(FieldDesc {
                name: f.name,
                ty,
                offset: f.offset,
                length: f.length,
                bitfield,
                value,
            });
        }

        let id_field_index = id_field_index.ok_or_else(|| LoaderError::Parse {
            path: path.to_path_buf(),
            message: format!("packet '{name}' has no identifier field (a field with 'value')"),
        })?;

        out.push(PacketDesc {
            name,
            fields,
            id_field_index,
            id_value: id_value.expect("set alongside id_field_index"),
            template: MqttTemplate {
                topic: mqtt.topic,
                payload: mqtt.payload,
                qos: mqtt.qos,
                retain: mqtt.retain,
            },
        });
    }
    Ok(out)
}

/// Load and parse a single catalog file.
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Vec<PacketDesc>, LoaderError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    packets_from_yaml_str(path, &text)
}

/// Discover catalog files under `paths` (directories, walked non-recursively for `*.yaml`/
/// `*.yml`) and `patterns` (glob patterns, matched as-is), load and parse each, then merge
/// into one validated [`PacketCatalog`].
///
/// Missing directories in `paths` are tolerated (skipped); a malformed catalog file is a
/// hard error naming the offending file.
pub fn load_catalog(paths: &[String], patterns: &[String]) -> Result<PacketCatalog, LoaderError> {
    let mut files: BTreeSet<PathBuf> = BTreeSet::new();

    for dir in paths {
        let dir_path = Path::new(dir);
        if !dir_path.is_dir() {
            continue;
        }
        for ext in ["yaml", "yml"] {
            let pattern = format!("{}/*.{}", dir.trim_end_matches('/'), ext);
            for entry in glob::glob(&pattern).map_err(|source| LoaderError::Pattern {
                path: pattern.clone(),
                source,
            })? {
                let entry = entry.map_err(|e| LoaderError::Io {
                    path: e.path().to_path_buf(),
                    source: e.into_error(),
                })?;
                files.insert(entry);
            }
        }
    }

    for pattern in patterns {
        for entry in glob::glob(pattern).map_err(|source| LoaderError::Pattern {
            path: pattern.clone(),
            source,
        })? {
            let entry = entry.map_err(|e| LoaderError::Io {
                path: e.path().to_path_buf(),
                source: e.into_error(),
            })?;
            files.insert(entry);
        }
    }

    let mut packets = Vec::new();
    for file in &files {
        packets.extend(load_file(file)?);
    }

    PacketCatalog::new(packets).map_err(LoaderError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEARTBEAT_YAML: &str = r#"
heartbeat:
  mqtt:
    topic: "hb/{{seq}}"
    payload: "{{seq}}"
    qos: 1
    retain: false
  fields:
    - name: id
      type: uint8
      offset: 0
      value: 0x01
    - name: seq
      type: uint16
      offset: 1
"#;

    #[test]
    fn parses_minimal_packet() {
        let packets = packets_from_yaml_str(Path::new("<test>"), HEARTBEAT_YAML).unwrap();
        assert_eq!(packets.len(), 1);
        let pkt = &packets[0];
        assert_eq!(pkt.name, "heartbeat");
        assert_eq!(pkt.id_value, FieldValue::U8(0x01));
        assert_eq!(pkt.template.qos, 1);
        assert_eq!(pkt.fields[1].offset, 1);
    }

    #[test]
    fn rejects_packet_without_identifier() {
        let yaml = r#"
ping:
  fields:
    - name: seq
      type: uint16
      offset: 0
"#;
        let err = packets_from_yaml_str(Path::new("<test>"), yaml).unwrap_err();
        assert!(matches!(err, LoaderError::Parse { .. }));
    }

    #[test]
    fn rejects_bytearray_without_length() {
        let yaml = r#"
blob:
  fields:
    - name: id
      type: uint8
      offset: 0
      value: 1
    - name: payload
      type: bytearray
      offset: 1
"#;
        let err = packets_from_yaml_str(Path::new("<test>"), yaml).unwrap_err();
        assert!(matches!(err, LoaderError::Parse { .. }));
    }

    #[test]
    fn parses_hex_bytearray_value() {
        let yaml = r#"
tagged:
  fields:
    - name: id
      type: bytearray
      offset: 0
      length: 2
      value: "0xDEAD"
"#;
        let packets = packets_from_yaml_str(Path::new("<test>"), yaml).unwrap();
        assert_eq!(packets[0].id_value, FieldValue::Bytes(vec![0xDE, 0xAD]));
    }

    #[test]
    fn bitfield_metadata_is_preserved_but_not_extracted() {
        let yaml = r#"
status:
  fields:
    - name: id
      type: uint8
      offset: 0
      value: 1
    - name: flags
      type: uint8
      offset: 1
      bitfield:
        bit_offset: 2
        bit_count: 3
"#;
        let packets = packets_from_yaml_str(Path::new("<test>"), yaml).unwrap();
        let bitfield = packets[0].fields[1].bitfield.expect("bitfield metadata kept");
        assert_eq!(bitfield.bit_offset, 2);
        assert_eq!(bitfield.bit_count, 3);
        // No bitfield-level value ever shows up on the field descriptor itself; the catalog
        // only records where the bits live, per SPEC_FULL.md §9 "Bitfield metadata".
        assert!(packets[0].fields[1].value.is_none());
    }

    #[test]
    fn load_catalog_tolerates_missing_directory() {
        let catalog = load_catalog(&["/no/such/dir".to_string()], &[]).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn load_catalog_discovers_and_merges_directory_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("heartbeat.yaml"), HEARTBEAT_YAML).unwrap();
        let catalog = load_catalog(&[dir.path().to_string_lossy().to_string()], &[]).unwrap();
        assert_eq!(catalog.len(), 1);
    }
}
