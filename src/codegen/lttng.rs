//! LTTng-UST backend.
//!
//! Generates a tracepoint provider header following LTTng's multi-read
//! convention: the header is included once normally and again by
//! `<lttng/tracepoint-event.h>` with `TRACEPOINT_HEADER_MULTI_READ` set,
//! so everything that must not be seen twice carries its own guard.

use super::helpers::{
    converter_name, converters_guard, enum_storage_type, flag_bit_positions,
    flag_position_entries, format_call_args, format_signature, grouped_enum_entries,
    leading_comma, prefix_block, provider_guard, qt_headers, referenced_enums, referenced_flags,
    tracepoint_guard, type_to_name, EnumEntry,
};
use super::Backend;
use crate::parser::schema::{Field, FieldKind, Provider, Tracepoint};
use crate::utils::config::{LTTNG_EVENT_HEADER, LTTNG_TRACEPOINT_HEADER, WRAPPER_NAMESPACE};
use crate::utils::error::GenerateError;
use log::debug;

/// Generate the LTTng provider header
///
/// `file_name` is the header's own name; LTTng re-includes the header
/// through `TRACEPOINT_INCLUDE`.
///
/// # Errors
/// * `GenerateError::UnsupportedField` - a field, array element or
///   sequence element is Unknown
pub fn generate_lttng(provider: &Provider, file_name: &str) -> Result<String, GenerateError> {
    let mut out = String::new();

    write_prologue(&mut out, provider, file_name);
    write_enums(&mut out, provider);
    write_flags(&mut out, provider);
    write_converters(&mut out, provider);

    for tracepoint in &provider.tracepoints {
        write_tracepoint(&mut out, provider, tracepoint)?;
        write_wrapper(&mut out, provider, tracepoint, Backend::Lttng);
    }

    write_epilogue(&mut out, provider);
    Ok(out)
}

fn write_prologue(out: &mut String, provider: &Provider, file_name: &str) {
    let guard = provider_guard(&provider.name);
    let namespace_guard = format!("{}_USE_NAMESPACE", guard);

    out.push_str(&prefix_block(provider));

    out.push_str("#undef TRACEPOINT_PROVIDER\n");
    out.push_str(&format!("#define TRACEPOINT_PROVIDER {}\n\n", provider.name));

    // value-type headers only on the first pass
    out.push_str(&format!("#if !defined({})\n", guard));
    out.push_str(&qt_headers());
    out.push_str("#endif\n\n");

    // the second condition lets LTTng re-evaluate the TRACEPOINT_* macros
    out.push_str(&format!(
        "#if !defined({}) || defined(TRACEPOINT_HEADER_MULTI_READ)\n",
        guard
    ));
    out.push_str(&format!("#define {}\n\n", guard));
    out.push_str("#undef TRACEPOINT_INCLUDE\n");
    out.push_str(&format!("#define TRACEPOINT_INCLUDE \"{}\"\n\n", file_name));
    out.push_str(LTTNG_TRACEPOINT_HEADER);
    out.push_str("\n\n");

    out.push_str(&format!("#if !defined({})\n", namespace_guard));
    out.push_str(&format!("#define {}\n", namespace_guard));
    out.push_str("QT_USE_NAMESPACE\n");
    out.push_str(&format!("#endif // {}\n\n", namespace_guard));
}

fn write_epilogue(out: &mut String, provider: &Provider) {
    out.push_str(&format!("#endif // {}\n", provider_guard(&provider.name)));
    out.push_str(LTTNG_EVENT_HEADER);
    out.push('\n');
}

fn write_enums(out: &mut String, provider: &Provider) {
    for e in referenced_enums(provider) {
        debug!("Emitting LTTng enum {}", e.name);

        out.push_str("TRACEPOINT_ENUM(\n");
        out.push_str(&format!("    {},\n", provider.name));
        out.push_str(&format!("    {},\n", type_to_name(&e.name)));
        out.push_str("    TP_ENUM_VALUES(\n");

        for entry in grouped_enum_entries(e) {
            match entry {
                EnumEntry::Value { names, value } => {
                    out.push_str(&format!("        ctf_enum_value(\"{}\", {})\n", names, value));
                }
                EnumEntry::Range { name, start, end } => {
                    out.push_str(&format!(
                        "        ctf_enum_range(\"{}\", {}, {})\n",
                        name, start, end
                    ));
                }
            }
        }

        out.push_str("    )\n)\n\n");
    }
}

/// Flags reuse the enum mechanism, keyed by the bit-position bytes the
/// converter writes
fn write_flags(out: &mut String, provider: &Provider) {
    for f in referenced_flags(provider) {
        debug!("Emitting LTTng flags {}", f.name);

        out.push_str("TRACEPOINT_ENUM(\n");
        out.push_str(&format!("    {},\n", provider.name));
        out.push_str(&format!("    {},\n", type_to_name(&f.name)));
        out.push_str("    TP_ENUM_VALUES(\n");

        for (names, position) in flag_position_entries(f) {
            out.push_str(&format!("        ctf_enum_value(\"{}\", {})\n", names, position));
        }

        out.push_str("    )\n)\n\n");
    }
}

/// Flag-to-bytes converters: 0 becomes a single zero byte, anything else
/// one byte per set bit holding its 1-based position
fn write_converters(out: &mut String, provider: &Provider) {
    let flags = referenced_flags(provider);
    if flags.is_empty() {
        return;
    }

    let guard = converters_guard(&provider.name);
    out.push_str(&format!("#ifndef {}\n", guard));
    out.push_str(&format!("#define {}\n", guard));
    out.push_str("QT_BEGIN_NAMESPACE\n");
    out.push_str(&format!("namespace {} {{\n", WRAPPER_NAMESPACE));

    for f in flags {
        out.push_str(&format!(
            "inline QByteArray {}({} val)\n",
            converter_name(&f.name),
            f.name
        ));
        out.push_str("{\n");
        out.push_str("    QByteArray ret;\n");
        out.push_str("    const quint64 bits = static_cast<quint64>(val);\n");
        out.push_str("    if (bits == 0) {\n");
        out.push_str("        ret.append(char(0));\n");
        out.push_str("        return ret;\n");
        out.push_str("    }\n");

        for position in flag_bit_positions(f) {
            out.push_str(&format!(
                "    if (bits & 0x{:x}ull)\n        ret.append(char({}));\n",
                1u64 << (position - 1),
                position
            ));
        }

        out.push_str("    return ret;\n");
        out.push_str("}\n");
    }

    out.push_str(&format!("}} // namespace {}\n", WRAPPER_NAMESPACE));
    out.push_str("QT_END_NAMESPACE\n");
    out.push_str(&format!("#endif // {}\n\n", guard));
}

fn write_tracepoint(
    out: &mut String,
    provider: &Provider,
    tracepoint: &Tracepoint,
) -> Result<(), GenerateError> {
    let tp_args: Vec<String> = tracepoint
        .args
        .iter()
        .zip(&tracepoint.fields)
        .map(|(arg, field)| match field.kind {
            FieldKind::Flags => format!("QByteArray, {}", arg.name),
            _ => format!("{}, {}", arg.type_name, arg.name),
        })
        .collect();

    let mut macros = Vec::new();
    for field in &tracepoint.fields {
        field_macros(provider, tracepoint, field, &mut macros)?;
    }

    out.push_str("TRACEPOINT_EVENT(\n");
    out.push_str(&format!("    {},\n", provider.name));
    out.push_str(&format!("    {},\n", tracepoint.name));
    out.push_str(&format!("    TP_ARGS({}),\n", tp_args.join(", ")));
    out.push_str("    TP_FIELDS(\n");
    for m in &macros {
        out.push_str(&format!("        {}\n", m));
    }
    out.push_str("    )\n)\n\n");

    Ok(())
}

/// Map one field onto its `ctf_*` macros
fn field_macros(
    provider: &Provider,
    tracepoint: &Tracepoint,
    field: &Field,
    macros: &mut Vec<String>,
) -> Result<(), GenerateError> {
    let name = &field.name;
    let param_type = &field.param_type;

    match &field.kind {
        FieldKind::Array { len, element } => match element.as_ref() {
            FieldKind::Integer | FieldKind::IntegerHex => {
                macros.push(format!(
                    "ctf_array({}, {}, {}, {})",
                    param_type, name, name, len
                ));
            }
            element => {
                for i in 0..*len {
                    // TP_FIELDS expands at global scope
                    let expr = match element {
                        FieldKind::Flags => format!(
                            "{}::{}({}[{}])",
                            WRAPPER_NAMESPACE,
                            converter_name(param_type),
                            name,
                            i
                        ),
                        _ => format!("{}[{}]", name, i),
                    };
                    let sub_name = format!("{}_{}", name, i);
                    scalar_macros(provider, tracepoint, field, element, &sub_name, &expr, macros)?;
                }
            }
        },
        FieldKind::Sequence {
            length_field,
            element,
        } => match element.as_ref() {
            FieldKind::Integer | FieldKind::IntegerHex => {
                macros.push(format!(
                    "ctf_sequence({}, {}, {}, unsigned int, {})",
                    param_type, name, name, length_field
                ));
            }
            FieldKind::Unknown => return Err(unsupported(tracepoint, field)),
            // no per-element macro exists for a runtime length, log the raw elements
            _ => {
                macros.push(format!(
                    "ctf_sequence(const char, {}, reinterpret_cast<const char *>({}), unsigned int, {} * sizeof({}))",
                    name, name, length_field, param_type
                ));
            }
        },
        kind => scalar_macros(provider, tracepoint, field, kind, name, name, macros)?,
    }

    Ok(())
}

/// Macros for a non-array value logged as `field_name` from `expr`
fn scalar_macros(
    provider: &Provider,
    tracepoint: &Tracepoint,
    field: &Field,
    kind: &FieldKind,
    field_name: &str,
    expr: &str,
    macros: &mut Vec<String>,
) -> Result<(), GenerateError> {
    let param_type = &field.param_type;

    let m = match kind {
        FieldKind::Integer => format!("ctf_integer({}, {}, {})", param_type, field_name, expr),
        FieldKind::IntegerHex => {
            format!("ctf_integer_hex({}, {}, {})", param_type, field_name, expr)
        }
        FieldKind::Pointer => format!(
            "ctf_integer_hex(uintptr_t, {}, reinterpret_cast<uintptr_t>({}))",
            field_name, expr
        ),
        FieldKind::Float => format!("ctf_float({}, {}, {})", param_type, field_name, expr),
        FieldKind::String => format!("ctf_string({}, {})", field_name, expr),
        FieldKind::Text => format!(
            "ctf_sequence_text(const char, {}, {}.toUtf8().constData(), unsigned int, {}.toUtf8().size())",
            field_name, expr, expr
        ),
        FieldKind::Bytes | FieldKind::Flags => format!(
            "ctf_sequence(const char, {}, {}.constData(), unsigned int, {}.size())",
            field_name, expr, expr
        ),
        FieldKind::Url => format!(
            "ctf_sequence_text(const char, {}, {}.toEncoded().constData(), unsigned int, {}.toEncoded().size())",
            field_name, expr, expr
        ),
        FieldKind::Geometry { shape } => {
            for component in shape.components() {
                macros.push(if shape.is_float() {
                    format!(
                        "ctf_float(qreal, {}_{}, {}.{}())",
                        field_name, component, expr, component
                    )
                } else {
                    format!(
                        "ctf_integer(int, {}_{}, {}.{}())",
                        field_name, component, expr, component
                    )
                });
            }
            return Ok(());
        }
        FieldKind::Enumeration => {
            let storage = provider
                .find_enum(param_type)
                .map_or("int", enum_storage_type);
            format!(
                "ctf_enum({}, {}, {}, {}, {})",
                provider.name,
                type_to_name(param_type),
                storage,
                field_name,
                expr
            )
        }
        FieldKind::Array { .. } | FieldKind::Sequence { .. } | FieldKind::Unknown => {
            return Err(unsupported(tracepoint, field));
        }
    };

    macros.push(m);
    Ok(())
}

/// `trace_`, `do_trace_` and `trace_*_enabled` wrappers
///
/// **Private** - shared with the CTF backend, whose runtime exposes the
/// same `tracepoint` macros
pub(super) fn write_wrapper(
    out: &mut String,
    provider: &Provider,
    tracepoint: &Tracepoint,
    backend: Backend,
) {
    let signature = format_signature(&tracepoint.args);
    let call_args = leading_comma(&format_call_args(
        provider,
        &tracepoint.args,
        &tracepoint.fields,
        backend,
    ));
    let name = &tracepoint.name;
    let guard = tracepoint_guard(&provider.name, name);

    // keeps the wrappers single-definition across LTTng's second read
    out.push_str(&format!("#ifndef {}\n", guard));
    out.push_str(&format!("#define {}\n", guard));
    out.push_str("QT_BEGIN_NAMESPACE\n");
    out.push_str(&format!("namespace {} {{\n", WRAPPER_NAMESPACE));

    out.push_str(&format!("inline void trace_{}({})\n", name, signature));
    out.push_str("{\n");
    out.push_str(&format!(
        "    tracepoint({}, {}{});\n",
        provider.name, name, call_args
    ));
    out.push_str("}\n");

    out.push_str(&format!("inline void do_trace_{}({})\n", name, signature));
    out.push_str("{\n");
    out.push_str(&format!(
        "    do_tracepoint({}, {}{});\n",
        provider.name, name, call_args
    ));
    out.push_str("}\n");

    out.push_str(&format!("inline bool trace_{}_enabled()\n", name));
    out.push_str("{\n");
    out.push_str(&format!(
        "    return tracepoint_enabled({}, {});\n",
        provider.name, name
    ));
    out.push_str("}\n");

    out.push_str(&format!("}} // namespace {}\n", WRAPPER_NAMESPACE));
    out.push_str("QT_END_NAMESPACE\n");
    out.push_str(&format!("#endif // {}\n\n", guard));
}

fn unsupported(tracepoint: &Tracepoint, field: &Field) -> GenerateError {
    GenerateError::UnsupportedField {
        backend: Backend::Lttng.label(),
        tracepoint: tracepoint.name.clone(),
        field: field.name.clone(),
        param_type: field.param_type.clone(),
    }
}
