//! Naming and formatting helpers shared by all backends.
//!
//! Everything here is a pure function of its inputs. Generated files are
//! diffed across regenerations, so identical input must always produce
//! byte-identical text.

use super::Backend;
use crate::parser::schema::{Argument, Field, FieldKind, Provider, TraceEnum, TraceFlags};
use crate::utils::config::{
    CONVERTER_PREFIX, GUID_SCHEME_VERSION, PROVIDER_GUID_NAMESPACE, QT_HEADERS,
};
use log::warn;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Upper-case `name` and replace every non-alphanumeric character with `_`
pub fn include_guard(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Guard protecting a provider's whole header
///
/// Derived from the provider name alone so the same input always yields
/// the same text, whatever the output file is called.
pub fn provider_guard(provider: &str) -> String {
    include_guard(&format!("{}_TRACEPOINTS_H", provider))
}

/// Guard protecting the wrappers of one tracepoint
pub fn tracepoint_guard(provider: &str, tracepoint: &str) -> String {
    include_guard(&format!("TP_{}_{}", provider, tracepoint))
}

/// Guard protecting the once-per-provider converter block
pub fn converters_guard(provider: &str) -> String {
    include_guard(&format!("TP_{}_CONVERTERS", provider))
}

/// Turn a qualified C++ type into an identifier fragment (`a::B` -> `a_B`)
pub fn type_to_name(type_name: &str) -> String {
    type_name.replace("::", "_")
}

/// Name of the generated converter for an enum or flags type
pub fn converter_name(type_name: &str) -> String {
    format!("{}{}", CONVERTER_PREFIX, type_to_name(type_name))
}

/// `type name` pairs joined by `, `, in declaration order
pub fn format_signature(args: &[Argument]) -> String {
    args.iter()
        .map(|arg| format!("{} {}", arg.type_name, arg.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Plain argument names joined by `, `
pub fn format_names(args: &[Argument]) -> String {
    args.iter()
        .map(|arg| arg.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The expression forwarded to the backend for each argument
///
/// Flags are converted to bytes (LTTng) or text (ETW) by the per-type
/// converter; CTF marshals arrays, enums, flags and C strings through its
/// runtime helpers.
pub fn call_arg_exprs(
    provider: &Provider,
    args: &[Argument],
    fields: &[Field],
    backend: Backend,
) -> Vec<String> {
    args.iter()
        .zip(fields)
        .map(|(arg, field)| call_arg_expr(provider, arg, field, backend))
        .collect()
}

fn call_arg_expr(provider: &Provider, arg: &Argument, field: &Field, backend: Backend) -> String {
    let name = &arg.name;

    match backend {
        Backend::Lttng | Backend::Etw => match field.kind {
            FieldKind::Flags => format!("{}({})", converter_name(&field.param_type), name),
            _ => name.clone(),
        },
        Backend::Ctf => match &field.kind {
            FieldKind::Array { len, .. } => {
                format!("trace::toByteArrayFromArray({}, {})", name, len)
            }
            FieldKind::Enumeration => {
                let integer_type = provider
                    .find_enum(&field.param_type)
                    .map_or("quint32", enum_qt_type);
                format!("trace::toByteArrayFromEnum<{}>({})", integer_type, name)
            }
            FieldKind::Flags => format!("trace::toByteArrayFromFlags({})", name),
            FieldKind::String => format!("trace::toByteArrayFromCString({})", name),
            _ => name.clone(),
        },
    }
}

/// Backend call arguments joined by `, `
pub fn format_call_args(
    provider: &Provider,
    args: &[Argument],
    fields: &[Field],
    backend: Backend,
) -> String {
    call_arg_exprs(provider, args, fields, backend).join(", ")
}

/// Prepend `, ` to a non-empty argument list
pub fn leading_comma(list: &str) -> String {
    if list.is_empty() {
        String::new()
    } else {
        format!(", {}", list)
    }
}

/// Qt integer type wide enough for an enum's declared values
pub fn enum_qt_type(e: &TraceEnum) -> &'static str {
    match (e.value_size, e.signed) {
        (8, false) => "quint8",
        (16, false) => "quint16",
        (8, true) => "qint8",
        (16, true) => "qint16",
        (_, false) => "quint32",
        (_, true) => "qint32",
    }
}

/// `<stdint.h>` integer type wide enough for an enum's declared values
pub fn enum_storage_type(e: &TraceEnum) -> &'static str {
    match (e.value_size, e.signed) {
        (8, false) => "uint8_t",
        (16, false) => "uint16_t",
        (8, true) => "int8_t",
        (16, true) => "int16_t",
        (_, false) => "uint32_t",
        (_, true) => "int32_t",
    }
}

/// One emitted enumeration entry; synonyms are already merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumEntry {
    Value { names: String, value: i64 },
    Range { name: String, start: i64, end: i64 },
}

/// Enumeration entries in declaration order with synonyms grouped
///
/// The first entry with a given value carries every name sharing that
/// value; later synonyms are dropped.
pub fn grouped_enum_entries(e: &TraceEnum) -> Vec<EnumEntry> {
    let mut handled = BTreeSet::new();
    let mut entries = Vec::new();

    for v in &e.values {
        if let Some(end) = v.range_end {
            entries.push(EnumEntry::Range {
                name: v.name.clone(),
                start: v.value,
                end,
            });
            continue;
        }

        if handled.insert(v.value) {
            let names = aggregate_names(
                v.value,
                e.values
                    .iter()
                    .filter(|other| other.range_end.is_none())
                    .map(|other| (other.name.as_str(), other.value)),
            );
            entries.push(EnumEntry::Value {
                names,
                value: v.value,
            });
        }
    }

    entries
}

/// Flag values grouped by mask, in order of first declaration
pub fn grouped_flag_values(f: &TraceFlags) -> Vec<(String, u64)> {
    let mut handled = BTreeSet::new();
    let mut grouped = Vec::new();

    for v in &f.values {
        if handled.insert(v.value) {
            let names = aggregate_names(
                v.value,
                f.values.iter().map(|other| (other.name.as_str(), other.value)),
            );
            grouped.push((names, v.value));
        }
    }

    grouped
}

/// Flag metadata entries keyed by the byte each value produces on the wire
///
/// Masks with several bits set have no single wire byte and are skipped.
pub fn flag_position_entries(f: &TraceFlags) -> Vec<(String, u32)> {
    grouped_flag_values(f)
        .into_iter()
        .filter_map(|(names, mask)| match flag_bit_position(mask) {
            Some(position) => Some((names, position)),
            None => {
                warn!(
                    "Flag {} of {} spans several bits; it is logged bit by bit",
                    names, f.name
                );
                None
            }
        })
        .collect()
}

/// Every 1-based bit position set in any declared mask, ascending
pub fn flag_bit_positions(f: &TraceFlags) -> Vec<u32> {
    let union = f.values.iter().fold(0u64, |acc, v| acc | v.value);
    (0..64)
        .filter(|bit| union & (1u64 << bit) != 0)
        .map(|bit| bit + 1)
        .collect()
}

/// 0 for an empty mask, the 1-based bit index for a single-bit mask
pub fn flag_bit_position(mask: u64) -> Option<u32> {
    match mask {
        0 => Some(0),
        m if m.is_power_of_two() => Some(m.trailing_zeros() + 1),
        _ => None,
    }
}

/// Join every name carrying `value` with `_`, in declaration order
pub fn aggregate_names<'a, T: PartialEq + Copy>(
    value: T,
    entries: impl Iterator<Item = (&'a str, T)>,
) -> String {
    entries
        .filter(|(_, v)| *v == value)
        .map(|(name, _)| name)
        .collect::<Vec<_>>()
        .join("_")
}

/// Pass one of emission: every enum/flags type some field refers to
pub fn referenced_user_types(provider: &Provider) -> BTreeSet<String> {
    provider
        .tracepoints
        .iter()
        .flat_map(|tp| tp.fields.iter())
        .filter(|field| {
            matches!(
                field.kind.element(),
                FieldKind::Enumeration | FieldKind::Flags
            )
        })
        .map(|field| field.param_type.clone())
        .collect()
}

/// Declared enumerations that are referenced, in declaration order
pub fn referenced_enums(provider: &Provider) -> Vec<&TraceEnum> {
    let referenced = referenced_user_types(provider);
    provider
        .enumerations
        .iter()
        .filter(|e| referenced.contains(&e.name))
        .collect()
}

/// Declared flags types that are referenced, in declaration order
pub fn referenced_flags(provider: &Provider) -> Vec<&TraceFlags> {
    let referenced = referenced_user_types(provider);
    provider
        .flags
        .iter()
        .filter(|f| referenced.contains(&f.name))
        .collect()
}

/// Prefix block lines followed by a blank line, or nothing
pub fn prefix_block(provider: &Provider) -> String {
    if provider.prefix_text.is_empty() {
        return String::new();
    }

    let mut out = provider.prefix_text.join("\n");
    out.push_str("\n\n");
    out
}

/// Standard value-type headers, one per line
pub fn qt_headers() -> String {
    let mut out = QT_HEADERS.join("\n");
    out.push('\n');
    out
}

/// Stable 128-bit identifier for a provider name
///
/// SHA-256 over the fixed namespace followed by the UTF-8 name, truncated
/// to 16 bytes with the version nibble and RFC 4122 variant bits set.
pub fn provider_guid(name: &str) -> [u8; 16] {
    let mut hasher = Sha256::new();
    hasher.update(PROVIDER_GUID_NAMESPACE);
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();

    let mut guid = [0u8; 16];
    guid.copy_from_slice(&digest[..16]);
    guid[6] = (guid[6] & 0x0f) | (GUID_SCHEME_VERSION << 4);
    guid[8] = (guid[8] & 0x3f) | 0x80;
    guid
}

/// Canonical `{xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx}` spelling
pub fn guid_to_string(guid: &[u8; 16]) -> String {
    let hex: Vec<String> = guid.iter().map(|b| format!("{:02x}", b)).collect();
    format!(
        "{{{}-{}-{}-{}-{}}}",
        hex[0..4].concat(),
        hex[4..6].concat(),
        hex[6..8].concat(),
        hex[8..10].concat(),
        hex[10..16].concat()
    )
}

/// `(0xdata1, 0xdata2, 0xdata3, 0xb0, ..., 0xb7)` initializer
pub fn guid_to_initializer(guid: &[u8; 16]) -> String {
    let data1 = u32::from_be_bytes([guid[0], guid[1], guid[2], guid[3]]);
    let data2 = u16::from_be_bytes([guid[4], guid[5]]);
    let data3 = u16::from_be_bytes([guid[6], guid[7]]);

    let mut parts = vec![
        format!("0x{:08x}", data1),
        format!("0x{:04x}", data2),
        format!("0x{:04x}", data3),
    ];
    parts.extend(guid[8..].iter().map(|b| format!("0x{:02x}", b)));

    format!("({})", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::schema::{EnumValue, FlagValue};

    #[test]
    fn test_include_guard() {
        assert_eq!(include_guard("qtcore_tracepoints_p.h"), "QTCORE_TRACEPOINTS_P_H");
        assert_eq!(include_guard("a-b.c"), "A_B_C");
    }

    #[test]
    fn test_tracepoint_guard() {
        assert_eq!(tracepoint_guard("qtcore", "evt"), "TP_QTCORE_EVT");
    }

    #[test]
    fn test_type_to_name() {
        assert_eq!(type_to_name("Qt::Orientation"), "Qt_Orientation");
        assert_eq!(type_to_name("int"), "int");
    }

    #[test]
    fn test_flag_bit_position() {
        assert_eq!(flag_bit_position(0), Some(0));
        assert_eq!(flag_bit_position(1), Some(1));
        assert_eq!(flag_bit_position(0x8), Some(4));
        assert_eq!(flag_bit_position(3), None);
    }

    #[test]
    fn test_grouped_enum_entries() {
        let e = TraceEnum {
            name: "E".to_string(),
            values: vec![
                EnumValue { name: "A".to_string(), value: 0, range_end: None },
                EnumValue { name: "B".to_string(), value: 1, range_end: None },
                EnumValue { name: "C".to_string(), value: 0, range_end: None },
                EnumValue { name: "R".to_string(), value: 5, range_end: Some(9) },
            ],
            value_size: 8,
            signed: false,
        };

        assert_eq!(
            grouped_enum_entries(&e),
            vec![
                EnumEntry::Value { names: "A_C".to_string(), value: 0 },
                EnumEntry::Value { names: "B".to_string(), value: 1 },
                EnumEntry::Range { name: "R".to_string(), start: 5, end: 9 },
            ]
        );
    }

    #[test]
    fn test_flag_bit_positions_union() {
        let f = TraceFlags {
            name: "F".to_string(),
            values: vec![
                FlagValue { name: "A".to_string(), value: 0x1 },
                FlagValue { name: "AB".to_string(), value: 0x5 },
            ],
        };
        assert_eq!(flag_bit_positions(&f), vec![1, 3]);
        assert_eq!(flag_position_entries(&f), vec![("A".to_string(), 1)]);
    }

    #[test]
    fn test_guid_layout() {
        let guid = provider_guid("qtcore");
        assert_eq!(guid[6] >> 4, 8);
        assert_eq!(guid[8] & 0xc0, 0x80);
        assert_eq!(guid, provider_guid("qtcore"));
        assert_ne!(guid, provider_guid("qtgui"));

        let text = guid_to_string(&guid);
        assert_eq!(text.len(), 38);
        assert!(text.starts_with('{') && text.ends_with('}'));
    }
}
