//! Provider AST definitions.
//!
//! The parser builds one `Provider` per input file. It is never mutated
//! after parsing and is consumed by exactly one backend emitter.
//! Everything serializes so `--dump-ast` can write it out as JSON.

use serde::Serialize;

/// Top-level parse result for one provider file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Provider {
    /// Provider name, a valid C identifier derived from the input file name
    pub name: String,

    /// Tracepoints in declaration order
    pub tracepoints: Vec<Tracepoint>,

    /// Verbatim lines of the prefix block, emitted before generated code
    pub prefix_text: Vec<String>,

    /// `ENUM { ... } Type;` declarations in declaration order
    pub enumerations: Vec<TraceEnum>,

    /// `FLAGS { ... } Type;` declarations in declaration order
    pub flags: Vec<TraceFlags>,
}

impl Provider {
    /// Look up a declared enumeration by its (qualified) type name
    pub fn find_enum(&self, name: &str) -> Option<&TraceEnum> {
        self.enumerations.iter().find(|e| e.name == name)
    }

    /// Look up a declared flags type by its (qualified) type name
    pub fn find_flags(&self, name: &str) -> Option<&TraceFlags> {
        self.flags.iter().find(|f| f.name == name)
    }
}

/// One named, typed event definition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tracepoint {
    pub name: String,

    /// Signature arguments, index-aligned with `fields`
    pub args: Vec<Argument>,

    /// Backend classification of each argument
    pub fields: Vec<Field>,
}

/// A tracepoint argument as it appears in the generated signature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Argument {
    /// Signature type; fixed arrays and sequences are decayed to a pointer
    #[serde(rename = "type")]
    pub type_name: String,

    pub name: String,

    /// Number of elements for fixed arrays, 0 otherwise
    pub array_len: usize,
}

/// Classification of one tracepoint argument
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub kind: FieldKind,

    /// Normalized type text (element type for arrays and sequences)
    pub param_type: String,

    pub name: String,
}

impl Field {
    /// Element count of a fixed array, 0 for everything else
    pub fn array_len(&self) -> usize {
        match &self.kind {
            FieldKind::Array { len, .. } => *len,
            _ => 0,
        }
    }
}

/// Backend-relevant category of a field
///
/// Every emitter matches on this exhaustively, so a new category is a
/// compile error until each backend handles it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum FieldKind {
    /// Fixed-length array, `T name[N]`
    Array { len: usize, element: Box<FieldKind> },
    /// Runtime-length array whose length is another argument, `T name[len]`
    Sequence {
        length_field: String,
        element: Box<FieldKind>,
    },
    Integer,
    IntegerHex,
    Float,
    /// NUL-terminated `char *`
    String,
    Pointer,
    /// QString
    Text,
    /// QByteArray
    Bytes,
    /// QUrl
    Url,
    Geometry { shape: Shape },
    Enumeration,
    Flags,
    Unknown,
}

impl FieldKind {
    /// True for kinds whose wire size is only known once logged
    pub fn is_variable_size(&self) -> bool {
        matches!(
            self,
            FieldKind::String
                | FieldKind::Text
                | FieldKind::Url
                | FieldKind::Bytes
                | FieldKind::Enumeration
                | FieldKind::Flags
                | FieldKind::Sequence { .. }
        )
    }

    /// The element kind for arrays and sequences, the kind itself otherwise
    pub fn element(&self) -> &FieldKind {
        match self {
            FieldKind::Array { element, .. } | FieldKind::Sequence { element, .. } => element,
            other => other,
        }
    }
}

/// Structured 2D/4D geometry value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Shape {
    Point,
    PointF,
    Size,
    SizeF,
    Rect,
    RectF,
}

impl Shape {
    /// Accessor names, which double as sub-field suffixes
    pub fn components(self) -> &'static [&'static str] {
        match self {
            Shape::Point | Shape::PointF => &["x", "y"],
            Shape::Size | Shape::SizeF => &["width", "height"],
            Shape::Rect | Shape::RectF => &["x", "y", "width", "height"],
        }
    }

    /// Floating point coordinates (`qreal`) rather than `int`
    pub fn is_float(self) -> bool {
        matches!(self, Shape::PointF | Shape::SizeF | Shape::RectF)
    }

    /// Static wire size; every coordinate is 4 bytes on the wire
    pub fn wire_size(self) -> usize {
        self.components().len() * 4
    }
}

/// A provider-scoped enumeration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEnum {
    pub name: String,
    pub values: Vec<EnumValue>,

    /// Smallest of 8/16/32 bits holding every value and range bound
    pub value_size: u8,

    /// Whether any value or range bound is negative
    pub signed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumValue {
    pub name: String,
    pub value: i64,

    /// Inclusive end of a `RANGE(...)` entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range_end: Option<i64>,
}

/// A provider-scoped bit-flag set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceFlags {
    pub name: String,
    pub values: Vec<FlagValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlagValue {
    pub name: String,
    /// Bit mask as written in the provider file
    pub value: u64,
}
