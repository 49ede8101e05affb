use std::fmt;

/// Wire type tag for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Bytes,
}

/// A typed field value. Equality is by tag and content; values of different tags are never
/// equal (derived `PartialEq` on an enum already gives us this for free).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Bytes(Vec<u8>),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::U8(_) => FieldType::U8,
            FieldValue::U16(_) => FieldType::U16,
            FieldValue::U32(_) => FieldType::U32,
            FieldValue::U64(_) => FieldType::U64,
            FieldValue::I8(_) => FieldType::I8,
            FieldValue::I16(_) => FieldType::I16,
            FieldValue::I32(_) => FieldType::I32,
            FieldValue::I64(_) => FieldType::I64,
            FieldValue::F32(_) => FieldType::F32,
            FieldValue::F64(_) => FieldType::F64,
            FieldValue::Bytes(_) => FieldType::Bytes,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::U8(v) => write!(f, "0x{v:X} ({v})"),
            FieldValue::U16(v) => write!(f, "0x{v:X} ({v})"),
            FieldValue::U32(v) => write!(f, "0x{v:X} ({v})"),
            FieldValue::U64(v) => write!(f, "0x{v:X} ({v})"),
            FieldValue::I8(v) => write!(f, "{v}"),
            FieldValue::I16(v) => write!(f, "{v}"),
            FieldValue::I32(v) => write!(f, "{v}"),
            FieldValue::I64(v) => write!(f, "{v}"),
            FieldValue::F32(v) => write!(f, "{}", Sig6(*v as f64)),
            FieldValue::F64(v) => write!(f, "{}", Sig6(*v)),
            FieldValue::Bytes(bytes) => {
                write!(f, "bytes[")?;
                for (i, b) in bytes.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{b:02X}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Helper that renders a float with six significant figures (`%.6g`-equivalent), matching
/// `original_source/src/packet_parser.cpp`'s `fmt::format("{:.6g}", v)`.
struct Sig6(f64);

impl fmt::Display for Sig6 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        if v == 0.0 {
            return write!(f, "0");
        }
        let magnitude = v.abs().log10().floor() as i32;
        // %g switches to scientific notation outside [-4, precision); precision is 6 here.
        if !(-4..6).contains(&magnitude) {
            let mantissa = v / 10f64.powi(magnitude);
            let mantissa_str = trim_trailing_zeros(&format!("{mantissa:.5}"));
            return write!(f, "{mantissa_str}e{magnitude:+03}");
        }
        let decimals = (5 - magnitude).max(0) as usize;
        let formatted = format!("{v:.decimals$}");
        write!(f, "{}", trim_trailing_zeros(&formatted))
    }
}

fn trim_trailing_zeros(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    let trimmed = s.trim_end_matches('0');
    let trimmed = trimmed.trim_end_matches('.');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
