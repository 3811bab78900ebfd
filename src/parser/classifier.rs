//! Field classification.
//!
//! Maps the textual type of one tracepoint argument onto a `FieldKind`.
//! Classification only looks at spelling: it never checks that a type
//! exists, and anything it does not recognize becomes `FieldKind::Unknown`
//! rather than an error.

use super::schema::{FieldKind, Shape};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// `<type> <name>` with optional trailing `[..]` groups after the name
static DECLARATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?s)(.*?)([A-Za-z_][A-Za-z0-9_]*)\s*((?:\[[^\[\]]*\]\s*)*)$")
        .expect("declaration regex is valid")
});

/// Trailing bracket groups of a type token
static BRACKETS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?s)(.*?)((?:\s*\[[^\[\]]*\])+)\s*$").expect("bracket regex is valid")
});

static BRACKET_GROUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\s*([^\[\]]*?)\s*\]").expect("bracket group regex is valid"));

static CONST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bconst\b").expect("const regex is valid"));

static POINTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\*\s*").expect("pointer regex is valid"));

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex is valid"));

/// One argument split into its type text and name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Type text, including any bracket groups; empty if missing
    pub type_text: String,
    /// Argument name; empty if missing
    pub name: String,
}

/// Result of classifying one type token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: FieldKind,
    /// Normalized type (element type for arrays and sequences)
    pub param_type: String,
    /// Type as it appears in the generated function signature
    pub signature_type: String,
}

/// Enumeration and flag type names declared by the provider being parsed
#[derive(Debug, Clone, Default)]
pub struct UserTypes {
    enums: BTreeSet<String>,
    flags: BTreeSet<String>,
}

impl UserTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_enum(&mut self, name: impl Into<String>) {
        self.enums.insert(name.into());
    }

    pub fn add_flags(&mut self, name: impl Into<String>) {
        self.flags.insert(name.into());
    }

    /// Whether `name` is already declared as either kind of user type
    pub fn contains(&self, name: &str) -> bool {
        self.enums.contains(name) || self.flags.contains(name)
    }

    fn lookup(&self, cleaned: &str) -> Option<FieldKind> {
        if self.enums.contains(cleaned) {
            Some(FieldKind::Enumeration)
        } else if self.flags.contains(cleaned) {
            Some(FieldKind::Flags)
        } else {
            None
        }
    }
}

/// Split one argument declaration into type and name
///
/// The last identifier before any trailing bracket groups is the name,
/// everything before it is the type. Brackets written after the name are
/// moved onto the type, so `char* b[5]` and `char*[5] b` are equivalent.
pub fn split_declaration(arg: &str) -> Declaration {
    let arg = arg.trim();

    let Some(caps) = DECLARATION_RE.captures(arg) else {
        return Declaration {
            type_text: arg.to_string(),
            name: String::new(),
        };
    };

    let base = caps.get(1).map_or("", |m| m.as_str()).trim();
    let name = caps.get(2).map_or("", |m| m.as_str());
    let dims: String = caps
        .get(3)
        .map_or("", |m| m.as_str())
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let type_text = if base.is_empty() {
        String::new()
    } else {
        format!("{}{}", base, dims)
    };

    Declaration {
        type_text,
        name: name.to_string(),
    }
}

/// Classify a raw type token
///
/// **Public** - main entry point, used by the provider parser once per argument
///
/// # Arguments
/// * `raw` - Type text, possibly ending in `[N]` or `[length_field]`
/// * `user_types` - Enumerations and flags declared so far
///
/// # Returns
/// The field category together with the normalized and signature spellings
pub fn classify(raw: &str, user_types: &UserTypes) -> Classification {
    let raw = raw.trim();

    let Some(caps) = BRACKETS_RE.captures(raw) else {
        return Classification {
            kind: classify_scalar(raw, user_types),
            param_type: normalize_type(raw),
            signature_type: raw.to_string(),
        };
    };

    let base = caps.get(1).map_or("", |m| m.as_str()).trim();
    let groups: Vec<&str> = BRACKET_GROUP_RE
        .captures_iter(caps.get(2).map_or("", |m| m.as_str()))
        .filter_map(|g| g.get(1).map(|m| m.as_str()))
        .collect();

    let kind = match bracket_kind(&groups) {
        Some(BracketKind::Fixed(len)) => FieldKind::Array {
            len,
            element: Box::new(classify_scalar(base, user_types)),
        },
        Some(BracketKind::Runtime(length_field)) => FieldKind::Sequence {
            length_field,
            element: Box::new(classify_scalar(base, user_types)),
        },
        None => {
            return Classification {
                kind: FieldKind::Unknown,
                param_type: normalize_type(raw),
                signature_type: raw.to_string(),
            };
        }
    };

    Classification {
        kind,
        param_type: normalize_type(base),
        signature_type: format!("{}*", base),
    }
}

enum BracketKind {
    Fixed(usize),
    Runtime(String),
}

/// Interpret the bracket groups of a type token
///
/// **Private** - all-numeric groups flatten into one fixed array, a single
/// identifier is a sequence length; anything else is not understood
fn bracket_kind(groups: &[&str]) -> Option<BracketKind> {
    if groups.is_empty() {
        return None;
    }

    if groups.iter().all(|g| !g.is_empty() && g.chars().all(|c| c.is_ascii_digit())) {
        let mut len: usize = 1;
        for group in groups {
            len = len.checked_mul(group.parse::<usize>().ok()?)?;
        }
        return (len > 0).then_some(BracketKind::Fixed(len));
    }

    match groups {
        [single] if IDENTIFIER_RE.is_match(single) => Some(BracketKind::Runtime(single.to_string())),
        _ => None,
    }
}

/// Classify a type without brackets
///
/// **Private** - steps 2 to 5 of the classification
fn classify_scalar(raw: &str, user_types: &UserTypes) -> FieldKind {
    let cleaned = strip_qualifiers(raw);

    let collapsed = POINTER_RE.replace_all(&cleaned, "_ptr");
    let collapsed = collapsed.trim().replace(' ', "_");

    if collapsed == "char_ptr" {
        return FieldKind::String;
    }
    if collapsed.ends_with("_ptr") {
        return FieldKind::Pointer;
    }

    builtin_kind(&collapsed)
        .or_else(|| user_types.lookup(&cleaned))
        .unwrap_or(FieldKind::Unknown)
}

/// Remove `const` and `&`, collapse runs of whitespace
///
/// **Public** - the result is the key enum/flag types are looked up by
pub fn strip_qualifiers(raw: &str) -> String {
    let without_const = CONST_RE.replace_all(raw, " ");
    without_const
        .replace('&', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized parameter type: qualifiers stripped, pointers written `T *`
fn normalize_type(raw: &str) -> String {
    let cleaned = strip_qualifiers(raw);
    let tight = POINTER_RE.replace_all(&cleaned, "*");
    tight.trim().replacen('*', " *", 1)
}

/// Fixed table of recognized spellings
///
/// **Private** - keys are whitespace-normalized with `_`
fn builtin_kind(name: &str) -> Option<FieldKind> {
    Some(match name {
        "bool" | "char" | "signed_char" | "unsigned_char" | "short" | "short_int"
        | "signed_short" | "signed_short_int" | "unsigned_short" | "unsigned_short_int"
        | "int" | "signed" | "signed_int" | "unsigned" | "unsigned_int" | "long"
        | "long_int" | "signed_long" | "signed_long_int" | "unsigned_long"
        | "unsigned_long_int" | "long_long" | "long_long_int" | "signed_long_long"
        | "signed_long_long_int" | "unsigned_long_long" | "unsigned_long_long_int" => {
            FieldKind::Integer
        }
        "int8_t" | "int16_t" | "int32_t" | "int64_t" | "uint8_t" | "uint16_t" | "uint32_t"
        | "uint64_t" | "qint8" | "qint16" | "qint32" | "qint64" | "quint8" | "quint16"
        | "quint32" | "quint64" | "qlonglong" | "qulonglong" | "size_t" | "ssize_t"
        | "qsizetype" | "ptrdiff_t" | "qptrdiff" | "uchar" | "ushort" | "uint" | "ulong" => {
            FieldKind::Integer
        }
        "intptr_t" | "uintptr_t" | "qintptr" | "quintptr" => FieldKind::IntegerHex,
        "float" | "double" | "long_double" | "qreal" => FieldKind::Float,
        "QString" => FieldKind::Text,
        "QByteArray" => FieldKind::Bytes,
        "QUrl" => FieldKind::Url,
        "QPoint" => FieldKind::Geometry { shape: Shape::Point },
        "QPointF" => FieldKind::Geometry { shape: Shape::PointF },
        "QSize" => FieldKind::Geometry { shape: Shape::Size },
        "QSizeF" => FieldKind::Geometry { shape: Shape::SizeF },
        "QRect" => FieldKind::Geometry { shape: Shape::Rect },
        "QRectF" => FieldKind::Geometry { shape: Shape::RectF },
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(raw: &str) -> FieldKind {
        classify(raw, &UserTypes::new()).kind
    }

    #[test]
    fn test_split_simple() {
        let decl = split_declaration("int a");
        assert_eq!(decl.type_text, "int");
        assert_eq!(decl.name, "a");
    }

    #[test]
    fn test_split_moves_brackets_onto_type() {
        let decl = split_declaration("char* b[5]");
        assert_eq!(decl.type_text, "char*[5]");
        assert_eq!(decl.name, "b");

        let decl = split_declaration("int [ 2 ] [3] grid");
        assert_eq!(decl.type_text, "int [ 2 ] [3]");
        assert_eq!(decl.name, "grid");
    }

    #[test]
    fn test_split_pointer_heavy() {
        let decl = split_declaration("const char * const *argv");
        assert_eq!(decl.type_text, "const char * const *");
        assert_eq!(decl.name, "argv");
    }

    #[test]
    fn test_split_missing_parts() {
        assert_eq!(split_declaration("value").type_text, "");
        assert_eq!(split_declaration("int *").name, "");
        assert_eq!(split_declaration("").name, "");
    }

    #[test]
    fn test_multiple_numeric_brackets_flatten() {
        let c = classify("int[2][3]", &UserTypes::new());
        assert_eq!(
            c.kind,
            FieldKind::Array {
                len: 6,
                element: Box::new(FieldKind::Integer)
            }
        );
        assert_eq!(c.signature_type, "int*");
    }

    #[test]
    fn test_mixed_brackets_are_unknown() {
        assert_eq!(kind_of("int[n][4]"), FieldKind::Unknown);
        assert_eq!(kind_of("int[]"), FieldKind::Unknown);
        assert_eq!(kind_of("int[0]"), FieldKind::Unknown);
    }

    #[test]
    fn test_pointer_collapse() {
        assert_eq!(kind_of("char **"), FieldKind::Pointer);
        assert_eq!(kind_of("const char *"), FieldKind::String);
        assert_eq!(kind_of("char*"), FieldKind::String);
    }

    #[test]
    fn test_normalize_type() {
        assert_eq!(normalize_type("const int &"), "int");
        assert_eq!(normalize_type("char**"), "char **");
        assert_eq!(normalize_type("QObject*"), "QObject *");
        assert_eq!(normalize_type("unsigned   long"), "unsigned long");
    }

    #[test]
    fn test_constant_named_types_are_not_stripped() {
        // `constexpr_t` only contains `const` as a prefix, not as a word
        assert_eq!(strip_qualifiers("constexpr_t"), "constexpr_t");
    }
}
