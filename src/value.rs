//! Wire value types
//!
//! All four codecs (AMF3, GpBinary v1/v1.6/v1.7) serialize to and from one
//! unified value representation. Each codec maps the kinds it supports onto
//! its own tag space; a kind with no mapping is a hard encode-time error,
//! never a silent coercion.

/// Semantic kind of a wire value, independent of any codec's tag bytes
///
/// Used for the element type of homogeneous arrays and the key/value types
/// of dictionaries, where the type is declared once up front instead of per
/// element. `Unknown` in those positions means "each entry carries its own
/// tag".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireKind {
    Unknown,
    Null,
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    ByteArray,
    /// Homogeneous typed array (nested arrays recurse through this kind)
    Array,
    ObjectArray,
    StringArray,
    Map,
    Dictionary,
    Custom,
    /// Milliseconds since the Unix epoch (AMF3 only)
    Date,
    /// Named or anonymous dynamic object (AMF3 only)
    Object,
}

impl WireKind {
    /// Stable name used in encode-error diagnostics
    pub fn name(self) -> &'static str {
        match self {
            WireKind::Unknown => "unknown",
            WireKind::Null => "null",
            WireKind::Bool => "bool",
            WireKind::Byte => "byte",
            WireKind::Short => "short",
            WireKind::Int => "int",
            WireKind::Long => "long",
            WireKind::Float => "float",
            WireKind::Double => "double",
            WireKind::String => "string",
            WireKind::ByteArray => "byte array",
            WireKind::Array => "array",
            WireKind::ObjectArray => "object array",
            WireKind::StringArray => "string array",
            WireKind::Map => "map",
            WireKind::Dictionary => "dictionary",
            WireKind::Custom => "custom type",
            WireKind::Date => "date",
            WireKind::Object => "object",
        }
    }
}

/// Unified wire value representation
///
/// `Map` is the heterogeneous "Hashtable" shape: any key type, any value
/// type, insertion order preserved. `Dictionary` declares its key/value
/// kinds once; a value kind of [`WireKind::Unknown`] means every entry value
/// carries its own tag.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Null,
    Bool(bool),
    Byte(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    ByteArray(Vec<u8>),

    /// Homogeneous array of one element kind (rank > 1 via `element: Array`)
    Array {
        element: WireKind,
        items: Vec<WireValue>,
    },

    /// Heterogeneous array, each element independently tagged
    ObjectArray(Vec<WireValue>),

    StringArray(Vec<String>),

    /// Heterogeneous key/value map (the "Hashtable" case)
    Map(Vec<(WireValue, WireValue)>),

    /// Typed dictionary: homogeneous keys, homogeneous or per-entry values
    Dictionary {
        key: WireKind,
        value: WireKind,
        entries: Vec<(WireValue, WireValue)>,
    },

    /// Registered extensible type: code plus opaque payload
    Custom { code: u8, data: Vec<u8> },

    /// Milliseconds since the Unix epoch (AMF3 only)
    Date(f64),

    /// Dynamic object with an optional class name (AMF3 only)
    Object {
        class_name: String,
        properties: Vec<(String, WireValue)>,
    },
}

impl WireValue {
    /// Semantic kind of this value
    pub fn kind(&self) -> WireKind {
        match self {
            WireValue::Null => WireKind::Null,
            WireValue::Bool(_) => WireKind::Bool,
            WireValue::Byte(_) => WireKind::Byte,
            WireValue::Short(_) => WireKind::Short,
            WireValue::Int(_) => WireKind::Int,
            WireValue::Long(_) => WireKind::Long,
            WireValue::Float(_) => WireKind::Float,
            WireValue::Double(_) => WireKind::Double,
            WireValue::String(_) => WireKind::String,
            WireValue::ByteArray(_) => WireKind::ByteArray,
            WireValue::Array { .. } => WireKind::Array,
            WireValue::ObjectArray(_) => WireKind::ObjectArray,
            WireValue::StringArray(_) => WireKind::StringArray,
            WireValue::Map(_) => WireKind::Map,
            WireValue::Dictionary { .. } => WireKind::Dictionary,
            WireValue::Custom { .. } => WireKind::Custom,
            WireValue::Date(_) => WireKind::Date,
            WireValue::Object { .. } => WireKind::Object,
        }
    }

    /// Try to get this value as a string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            WireValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            WireValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get this value as an `i64`, widening smaller integer kinds
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            WireValue::Byte(v) => Some(*v as i64),
            WireValue::Short(v) => Some(*v as i64),
            WireValue::Int(v) => Some(*v as i64),
            WireValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as an `f64`, widening `Float`
    pub fn as_double(&self) -> Option<f64> {
        match self {
            WireValue::Float(v) => Some(*v as f64),
            WireValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as a byte-array slice
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            WireValue::ByteArray(b) => Some(b),
            _ => None,
        }
    }

    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, WireValue::Null)
    }
}

impl Default for WireValue {
    fn default() -> Self {
        WireValue::Null
    }
}

impl From<bool> for WireValue {
    fn from(v: bool) -> Self {
        WireValue::Bool(v)
    }
}

impl From<u8> for WireValue {
    fn from(v: u8) -> Self {
        WireValue::Byte(v)
    }
}

impl From<i16> for WireValue {
    fn from(v: i16) -> Self {
        WireValue::Short(v)
    }
}

impl From<i32> for WireValue {
    fn from(v: i32) -> Self {
        WireValue::Int(v)
    }
}

impl From<i64> for WireValue {
    fn from(v: i64) -> Self {
        WireValue::Long(v)
    }
}

impl From<f32> for WireValue {
    fn from(v: f32) -> Self {
        WireValue::Float(v)
    }
}

impl From<f64> for WireValue {
    fn from(v: f64) -> Self {
        WireValue::Double(v)
    }
}

impl From<String> for WireValue {
    fn from(v: String) -> Self {
        WireValue::String(v)
    }
}

impl From<&str> for WireValue {
    fn from(v: &str) -> Self {
        WireValue::String(v.to_string())
    }
}

impl From<Vec<u8>> for WireValue {
    fn from(v: Vec<u8>) -> Self {
        WireValue::ByteArray(v)
    }
}

impl From<Vec<String>> for WireValue {
    fn from(v: Vec<String>) -> Self {
        WireValue::StringArray(v)
    }
}
