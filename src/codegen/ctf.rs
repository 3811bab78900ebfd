//! CTF backend.
//!
//! Each tracepoint carries its own CTF metadata fragment, its static
//! payload size and whether any part of the payload is variable sized.
//! The runtime in `qctf_p.h` assembles the trace metadata from these.

use super::helpers::{
    flag_position_entries, grouped_enum_entries, prefix_block, provider_guard, qt_headers,
    referenced_enums, referenced_flags, type_to_name, EnumEntry,
};
use super::lttng::write_wrapper;
use super::Backend;
use crate::parser::schema::{Field, FieldKind, Provider, Tracepoint};
use crate::utils::config::{CTF_RUNTIME_HEADER, FLAG_ENUM_BITS};
use crate::utils::error::GenerateError;
use log::debug;

const TEMPLATES_GUARD: &str = "TP_CTF_METADATA_TEMPLATES";

/// Size-dispatched metadata builders the per-field fragments call into
const METADATA_TEMPLATES: &str = r#"template <typename T>
inline QString integerToMetadata(const QString &name)
{
    QString ret;
    if (!std::is_signed<T>::value)
        ret += QLatin1Char('u');
    if (sizeof(T) == 8)
        ret += QStringLiteral("int64_t ");
    else if (sizeof(T) == 4)
        ret += QStringLiteral("int32_t ");
    else if (sizeof(T) == 2)
        ret += QStringLiteral("int16_t ");
    else
        ret += QStringLiteral("int8_t ");
    ret += name + QLatin1Char(';');
    return ret;
}

template <typename T>
inline QString integerArrayToMetadata(const QString &size, const QString &name)
{
    return integerToMetadata<T>(name + QLatin1Char('[') + size + QLatin1Char(']'));
}

template <typename T>
inline QString floatToMetadata(const QString &name)
{
    QString ret;
    if (sizeof(T) == 8)
        ret += QStringLiteral("double ");
    else
        ret += QStringLiteral("float ");
    ret += name + QLatin1Char(';');
    return ret;
}

template <typename T>
inline QString floatArrayToMetadata(const QString &size, const QString &name)
{
    return floatToMetadata<T>(name + QLatin1Char('[') + size + QLatin1Char(']'));
}

inline QString pointerToMetadata(const QString &name)
{
    QString ret;
    if (QT_POINTER_SIZE == 8)
        ret += QStringLiteral("intptr64_t ");
    else
        ret += QStringLiteral("intptr32_t ");
    ret += name + QLatin1Char(';');
    return ret;
}
"#;

/// Generate the CTF provider header
///
/// # Errors
/// * `GenerateError::UnsupportedField` - a field, array element or
///   sequence element is Unknown
pub fn generate_ctf(provider: &Provider) -> Result<String, GenerateError> {
    let guard = provider_guard(&provider.name);
    let mut out = String::new();

    out.push_str(&prefix_block(provider));

    out.push_str(&format!("#if !defined({})\n", guard));
    out.push_str(&qt_headers());
    out.push_str("#endif\n\n");

    out.push_str(&format!(
        "#if !defined({}) || defined(TRACEPOINT_HEADER_MULTI_READ)\n",
        guard
    ));
    out.push_str(&format!("#define {}\n\n", guard));
    out.push_str(CTF_RUNTIME_HEADER);
    out.push_str("\n\n");
    out.push_str(&format!("TRACEPOINT_PROVIDER({});\n\n", provider.name));

    write_templates(&mut out);
    write_enum_metadata(&mut out, provider);
    write_flags_metadata(&mut out, provider);

    for tracepoint in &provider.tracepoints {
        write_tracepoint(&mut out, provider, tracepoint)?;
        write_wrapper(&mut out, provider, tracepoint, Backend::Ctf);
    }

    out.push_str(&format!("#endif // {}\n", guard));
    Ok(out)
}

fn write_templates(out: &mut String) {
    out.push_str(&format!("#ifndef {}\n", TEMPLATES_GUARD));
    out.push_str(&format!("#define {}\n", TEMPLATES_GUARD));
    out.push_str("#include <type_traits>\n\n");
    out.push_str(METADATA_TEMPLATES);
    out.push_str(&format!("#endif // {}\n\n", TEMPLATES_GUARD));
}

fn write_enum_metadata(out: &mut String, provider: &Provider) {
    for e in referenced_enums(provider) {
        debug!("Emitting CTF metadata for enum {}", e.name);

        let values: Vec<String> = grouped_enum_entries(e)
            .into_iter()
            .map(|entry| match entry {
                EnumEntry::Value { names, value } => format!("{} = {}", names, value),
                EnumEntry::Range { name, start, end } => {
                    format!("{} = {} ... {}", name, start, end)
                }
            })
            .collect();

        write_metadata_alias(
            out,
            &provider.name,
            &type_to_name(&e.name),
            e.value_size,
            e.signed,
            &values,
        );
    }
}

/// Flags are logged as a sequence of bit-position bytes
fn write_flags_metadata(out: &mut String, provider: &Provider) {
    for f in referenced_flags(provider) {
        debug!("Emitting CTF metadata for flags {}", f.name);

        let values: Vec<String> = flag_position_entries(f)
            .into_iter()
            .map(|(names, position)| format!("{} = {}", names, position))
            .collect();

        write_metadata_alias(
            out,
            &provider.name,
            &type_to_name(&f.name),
            FLAG_ENUM_BITS,
            false,
            &values,
        );
    }
}

fn write_metadata_alias(
    out: &mut String,
    provider: &str,
    alias: &str,
    size: u8,
    signed: bool,
    values: &[String],
) {
    out.push_str(&format!("TRACEPOINT_METADATA({}, {},\n", provider, alias));
    out.push_str(&format!(
        "    QStringLiteral(\"typealias enum : integer {{ size = {}; signed = {}; }} {{\\n\")\n",
        size, signed
    ));
    for value in values {
        out.push_str(&format!("    + QStringLiteral(\"    {},\\n\")\n", value));
    }
    out.push_str(&format!("    + QStringLiteral(\"}} := {};\"));\n\n", alias));
}

/// The three parts of a `TRACEPOINT_EVENT` besides its names
#[derive(Default)]
struct EventLayout {
    metadata: Vec<String>,
    sizes: Vec<String>,
    variable: bool,
}

fn write_tracepoint(
    out: &mut String,
    provider: &Provider,
    tracepoint: &Tracepoint,
) -> Result<(), GenerateError> {
    let mut layout = EventLayout::default();
    for field in &tracepoint.fields {
        field_layout(provider, tracepoint, field, &mut layout)?;
    }

    let metadata = if layout.metadata.is_empty() {
        "QStringLiteral(\"\")".to_string()
    } else {
        layout.metadata.join(" + QStringLiteral(\"\\n\") + ")
    };
    let size = if layout.sizes.is_empty() {
        "0".to_string()
    } else {
        layout.sizes.join(" + ")
    };

    out.push_str(&format!(
        "TRACEPOINT_EVENT({}, {},\n",
        provider.name, tracepoint.name
    ));
    out.push_str(&format!("    {},\n", metadata));
    out.push_str(&format!("    {},\n", size));
    out.push_str(&format!("    {});\n\n", layout.variable));
    Ok(())
}

fn field_layout(
    provider: &Provider,
    tracepoint: &Tracepoint,
    field: &Field,
    layout: &mut EventLayout,
) -> Result<(), GenerateError> {
    let name = &field.name;
    let param_type = &field.param_type;

    if field.kind.is_variable_size() {
        layout.variable = true;
    }

    match &field.kind {
        FieldKind::Integer | FieldKind::IntegerHex => {
            layout.metadata.push(format!(
                "integerToMetadata<{}>(QStringLiteral(\"{}\"))",
                param_type, name
            ));
            layout.sizes.push(format!("sizeof({})", param_type));
        }
        FieldKind::Float => {
            layout.metadata.push(format!(
                "floatToMetadata<{}>(QStringLiteral(\"{}\"))",
                param_type, name
            ));
            layout.sizes.push(format!("sizeof({})", param_type));
        }
        FieldKind::Pointer => {
            layout.metadata.push(format!(
                "pointerToMetadata(QStringLiteral(\"{}\"))",
                name
            ));
            layout.sizes.push("QT_POINTER_SIZE".to_string());
        }
        FieldKind::String | FieldKind::Text | FieldKind::Url => {
            layout
                .metadata
                .push(format!("QStringLiteral(\"string {};\")", name));
        }
        FieldKind::Bytes => layout.metadata.push(opaque_bytes_metadata(name)),
        FieldKind::Geometry { shape } => {
            let component_type = if shape.is_float() { "float" } else { "int32_t" };
            let components: Vec<String> = shape
                .components()
                .iter()
                .map(|c| format!("{} {}_{};", component_type, name, c))
                .collect();
            layout
                .metadata
                .push(format!("QStringLiteral(\"{}\")", components.join(" ")));
            layout.sizes.push(shape.wire_size().to_string());
        }
        FieldKind::Enumeration => {
            layout.metadata.push(format!(
                "QStringLiteral(\"{} {};\")",
                type_to_name(param_type),
                name
            ));
            if let Some(e) = provider.find_enum(param_type) {
                layout.sizes.push((e.value_size / 8).to_string());
            }
        }
        FieldKind::Flags => {
            layout.metadata.push(format!(
                "QStringLiteral(\"uint8_t {}_length; {} {}[{}_length];\")",
                name,
                type_to_name(param_type),
                name,
                name
            ));
        }
        FieldKind::Array { len, element } => {
            let (metadata, size) = match element.as_ref() {
                FieldKind::Integer | FieldKind::IntegerHex => (
                    format!(
                        "integerArrayToMetadata<{}>(QStringLiteral(\"{}\"), QStringLiteral(\"{}\"))",
                        param_type, len, name
                    ),
                    format!("sizeof({}) * {}", param_type, len),
                ),
                FieldKind::Float => (
                    format!(
                        "floatArrayToMetadata<{}>(QStringLiteral(\"{}\"), QStringLiteral(\"{}\"))",
                        param_type, len, name
                    ),
                    format!("sizeof({}) * {}", param_type, len),
                ),
                FieldKind::Pointer | FieldKind::String => (
                    format!("pointerToMetadata(QStringLiteral(\"{}[{}]\"))", name, len),
                    format!("QT_POINTER_SIZE * {}", len),
                ),
                FieldKind::Unknown => return Err(unsupported(tracepoint, field)),
                _ => {
                    layout.metadata.push(opaque_bytes_metadata(name));
                    layout.variable = true;
                    return Ok(());
                }
            };
            layout.metadata.push(metadata);
            layout.sizes.push(size);
        }
        FieldKind::Sequence {
            length_field,
            element,
        } => {
            let metadata = match element.as_ref() {
                FieldKind::Integer | FieldKind::IntegerHex => format!(
                    "integerToMetadata<{}>(QStringLiteral(\"{}[{}]\"))",
                    param_type, name, length_field
                ),
                FieldKind::Float => format!(
                    "floatToMetadata<{}>(QStringLiteral(\"{}[{}]\"))",
                    param_type, name, length_field
                ),
                FieldKind::Pointer | FieldKind::String => format!(
                    "pointerToMetadata(QStringLiteral(\"{}[{}]\"))",
                    name, length_field
                ),
                FieldKind::Unknown => return Err(unsupported(tracepoint, field)),
                _ => opaque_bytes_metadata(name),
            };
            layout.metadata.push(metadata);
        }
        FieldKind::Unknown => return Err(unsupported(tracepoint, field)),
    }

    Ok(())
}

/// Elements with no fixed-width wire type travel as a length-prefixed blob
fn opaque_bytes_metadata(name: &str) -> String {
    format!(
        "QStringLiteral(\"uint32_t {}_length; uint8_t {}[{}_length];\")",
        name, name, name
    )
}

fn unsupported(tracepoint: &Tracepoint, field: &Field) -> GenerateError {
    GenerateError::UnsupportedField {
        backend: Backend::Ctf.label(),
        tracepoint: tracepoint.name.clone(),
        field: field.name.clone(),
        param_type: field.param_type.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_provider_str;

    fn generate(text: &str) -> Result<String, GenerateError> {
        let provider = parse_provider_str("prov", "prov.tracepoints", text).unwrap();
        generate_ctf(&provider)
    }

    #[test]
    fn test_static_event_layout() {
        let code = generate("evt(int a, double d, const QPoint &p)").unwrap();
        assert!(code.contains("    sizeof(int) + sizeof(double) + 8,\n    false);"));
        assert!(code.contains("integerToMetadata<int>(QStringLiteral(\"a\")) + QStringLiteral(\"\\n\") + floatToMetadata<double>(QStringLiteral(\"d\"))"));
        assert!(code.contains("QStringLiteral(\"int32_t p_x; int32_t p_y;\")"));
    }

    #[test]
    fn test_empty_event_layout() {
        let code = generate("started()").unwrap();
        assert!(code.contains("TRACEPOINT_EVENT(prov, started,\n    QStringLiteral(\"\"),\n    0,\n    false);"));
    }

    #[test]
    fn test_variable_size_fields() {
        let code = generate("evt(const QString &s, int n)").unwrap();
        assert!(code.contains("    sizeof(int),\n    true);"));
    }

    #[test]
    fn test_array_call_args() {
        let code = generate("evt(quint32 ids[4])").unwrap();
        assert!(code.contains("integerArrayToMetadata<quint32>(QStringLiteral(\"4\"), QStringLiteral(\"ids\"))"));
        assert!(code.contains("sizeof(quint32) * 4"));
        assert!(code.contains("tracepoint(prov, evt, trace::toByteArrayFromArray(ids, 4));"));
    }

    #[test]
    fn test_unknown_fields_are_fatal() {
        assert!(generate("evt(QObject o)").is_err());
        assert!(generate("evt(QObject objs[2])").is_err());
        assert!(generate("evt(int n, QObject objs[n])").is_err());
    }

    #[test]
    fn test_text_array_is_variable_blob() {
        let code = generate("evt(QString names[2])").unwrap();
        assert!(code.contains("QStringLiteral(\"uint32_t names_length; uint8_t names[names_length];\")"));
        assert!(code.contains("    0,\n    true);"));
        assert!(code.contains("tracepoint(prov, evt, trace::toByteArrayFromArray(names, 2));"));
    }

    #[test]
    fn test_url_sequence_is_variable_blob() {
        let code = generate("evt(int n, QUrl urls[n])").unwrap();
        assert!(code.contains("uint32_t urls_length; uint8_t urls[urls_length];"));
        assert!(code.contains("    sizeof(int),\n    true);"));
    }
}
