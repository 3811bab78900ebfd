//! ETW backend.
//!
//! Generates a TraceLogging provider header. Unlike the LTTng and CTF
//! backends every category has a representation here: types the
//! classifier does not understand are stringified with `QDebug` at the
//! call site.

use super::helpers::{
    call_arg_exprs, converter_name, converters_guard, format_names, format_signature,
    grouped_enum_entries, grouped_flag_values, guid_to_initializer, guid_to_string,
    prefix_block, provider_guard, provider_guid, qt_headers, referenced_enums, referenced_flags,
    tracepoint_guard, EnumEntry,
};
use super::Backend;
use crate::parser::schema::{Field, FieldKind, Provider, TraceEnum, TraceFlags, Tracepoint};
use crate::utils::config::{ETW_HEADERS, QDEBUG_HEADER, WRAPPER_NAMESPACE};
use log::debug;

/// Generate the ETW provider header
///
/// Every field kind can be logged, so this never fails.
pub fn generate_etw(provider: &Provider) -> String {
    let guard = provider_guard(&provider.name);
    let mut out = String::new();

    out.push_str(&prefix_block(provider));
    out.push_str(&format!("#ifndef {}\n", guard));
    out.push_str(&format!("#define {}\n\n", guard));

    write_headers(&mut out);
    write_provider(&mut out, provider);
    write_converters(&mut out, provider);

    for tracepoint in &provider.tracepoints {
        write_wrapper(&mut out, provider, tracepoint);
    }

    out.push_str(&format!("#endif // {}\n", guard));
    out
}

fn write_headers(out: &mut String) {
    out.push_str(&ETW_HEADERS.join("\n"));
    out.push_str("\n\n");

    // TraceLogging's pragma helpers break with some compiler configurations
    out.push_str("#undef _TlgPragmaUtf8Begin\n");
    out.push_str("#undef _TlgPragmaUtf8End\n");
    out.push_str("#define _TlgPragmaUtf8Begin\n");
    out.push_str("#define _TlgPragmaUtf8End\n\n");

    out.push_str(&qt_headers());
    out.push_str(QDEBUG_HEADER);
    out.push_str("\n\n");
}

fn provider_variable(provider: &Provider) -> String {
    format!("{}_provider", provider.name)
}

/// Provider definition in exactly one translation unit, declaration elsewhere
fn write_provider(out: &mut String, provider: &Provider) {
    let guid = provider_guid(&provider.name);
    let variable = provider_variable(provider);

    out.push_str("#ifdef TRACEPOINT_DEFINE\n");
    out.push_str(&format!("/* {} */\n", guid_to_string(&guid)));
    out.push_str("TRACELOGGING_DEFINE_PROVIDER(\n");
    out.push_str(&format!("    {},\n", variable));
    out.push_str(&format!("    \"{}\",\n", provider.name));
    out.push_str(&format!("    {});\n\n", guid_to_initializer(&guid)));

    out.push_str("static inline void registerProvider()\n");
    out.push_str("{\n");
    out.push_str(&format!("    TraceLoggingRegister({});\n", variable));
    out.push_str("}\n\n");

    out.push_str("static inline void unregisterProvider()\n");
    out.push_str("{\n");
    out.push_str(&format!("    TraceLoggingUnregister({});\n", variable));
    out.push_str("}\n\n");

    out.push_str("Q_CONSTRUCTOR_FUNCTION(registerProvider)\n");
    out.push_str("Q_DESTRUCTOR_FUNCTION(unregisterProvider)\n\n");

    out.push_str("#else\n");
    out.push_str(&format!("TRACELOGGING_DECLARE_PROVIDER({});\n", variable));
    out.push_str("#endif // TRACEPOINT_DEFINE\n\n");
}

fn write_converters(out: &mut String, provider: &Provider) {
    let enums = referenced_enums(provider);
    let flags = referenced_flags(provider);
    if enums.is_empty() && flags.is_empty() {
        return;
    }

    let guard = converters_guard(&provider.name);
    out.push_str(&format!("#ifndef {}\n", guard));
    out.push_str(&format!("#define {}\n", guard));
    out.push_str("QT_BEGIN_NAMESPACE\n");
    out.push_str(&format!("namespace {} {{\n", WRAPPER_NAMESPACE));

    for e in enums {
        debug!("Emitting ETW converter for enum {}", e.name);
        write_enum_converter(out, e);
    }
    for f in flags {
        debug!("Emitting ETW converter for flags {}", f.name);
        write_flags_converter(out, f);
    }

    out.push_str(&format!("}} // namespace {}\n", WRAPPER_NAMESPACE));
    out.push_str("QT_END_NAMESPACE\n");
    out.push_str(&format!("#endif // {}\n\n", guard));
}

/// Ranges render as `Name + offset`; unnamed values fall back to the number
fn write_enum_converter(out: &mut String, e: &TraceEnum) {
    let entries = grouped_enum_entries(e);

    out.push_str(&format!(
        "inline QByteArray {}({} val)\n",
        converter_name(&e.name),
        e.name
    ));
    out.push_str("{\n");
    out.push_str("    const qint64 value = static_cast<qint64>(val);\n");

    for entry in &entries {
        if let EnumEntry::Range { name, start, end } = entry {
            out.push_str(&format!(
                "    if (value >= {} && value <= {})\n",
                start, end
            ));
            out.push_str(&format!(
                "        return QByteArrayLiteral(\"{} + \") + QByteArray::number(value - ({}));\n",
                name, start
            ));
        }
    }

    out.push_str("    switch (value) {\n");
    for entry in &entries {
        if let EnumEntry::Value { names, value } = entry {
            out.push_str(&format!(
                "    case {}: return QByteArrayLiteral(\"{}\");\n",
                value, names
            ));
        }
    }
    out.push_str("    }\n");
    out.push_str("    return QByteArray::number(value);\n");
    out.push_str("}\n\n");
}

/// Set flags joined by `|`; a value of 0 prints the zero-valued names
fn write_flags_converter(out: &mut String, f: &TraceFlags) {
    let grouped = grouped_flag_values(f);
    let zero = grouped
        .iter()
        .find(|(_, mask)| *mask == 0)
        .map_or("0", |(names, _)| names.as_str());

    out.push_str(&format!(
        "inline QByteArray {}({} val)\n",
        converter_name(&f.name),
        f.name
    ));
    out.push_str("{\n");
    out.push_str("    const quint64 value = static_cast<quint64>(val);\n");
    out.push_str("    if (value == 0)\n");
    out.push_str(&format!("        return QByteArrayLiteral(\"{}\");\n", zero));
    out.push_str("    QByteArray ret;\n");

    for (names, mask) in grouped.iter().filter(|(_, mask)| *mask != 0) {
        out.push_str(&format!(
            "    if ((value & 0x{:x}ull) == 0x{:x}ull) {{\n",
            mask, mask
        ));
        out.push_str("        if (!ret.isEmpty())\n");
        out.push_str("            ret.append('|');\n");
        out.push_str(&format!("        ret.append(\"{}\");\n", names));
        out.push_str("    }\n");
    }

    out.push_str("    return ret;\n");
    out.push_str("}\n\n");
}

/// Locals prepared before `TraceLoggingWrite` and the values it logs
#[derive(Default)]
struct WriteArgs {
    locals: Vec<String>,
    values: Vec<String>,
}

impl WriteArgs {
    /// Bind `init` to a local named after the logged field and return it
    ///
    /// The reserved `_tp_` prefix keeps locals clear of argument names.
    fn local(&mut self, decl_type: &str, field_name: &str, init: String) -> String {
        let local = format!("_tp_{}", field_name);
        self.locals
            .push(format!("const {} {} = {};", decl_type, local, init));
        local
    }
}

fn field_values(arg_expr: &str, field: &Field, args: &mut WriteArgs) {
    let name = &field.name;

    match &field.kind {
        FieldKind::Array { len, element } => {
            for i in 0..*len {
                let element_expr = match element.as_ref() {
                    FieldKind::Flags => {
                        format!("{}({}[{}])", converter_name(&field.param_type), name, i)
                    }
                    _ => format!("{}[{}]", name, i),
                };
                let element_name = format!("{}_{}", name, i);
                scalar_values(field, element, &element_name, &element_expr, args);
            }
        }
        FieldKind::Sequence { length_field, .. } => {
            args.values.push(format!(
                "TraceLoggingBinary(reinterpret_cast<const char *>({}), static_cast<ULONG>({} * sizeof(*{})), \"{}\")",
                name, length_field, name, name
            ));
        }
        kind => scalar_values(field, kind, name, arg_expr, args),
    }
}

fn scalar_values(
    field: &Field,
    kind: &FieldKind,
    field_name: &str,
    expr: &str,
    args: &mut WriteArgs,
) {
    let value = match kind {
        FieldKind::Integer | FieldKind::IntegerHex | FieldKind::Float => {
            format!("TraceLoggingValue({}, \"{}\")", expr, field_name)
        }
        FieldKind::Pointer => format!("TraceLoggingPointer({}, \"{}\")", expr, field_name),
        FieldKind::String => format!("TraceLoggingString({}, \"{}\")", expr, field_name),
        FieldKind::Text => counted_wide_string(expr, field_name),
        FieldKind::Url => {
            let local = args.local("QString", field_name, format!("{}.toString()", expr));
            counted_wide_string(&local, field_name)
        }
        FieldKind::Bytes => format!(
            "TraceLoggingBinary({}.constData(), static_cast<ULONG>({}.size()), \"{}\")",
            expr, expr, field_name
        ),
        FieldKind::Geometry { shape } => {
            for component in shape.components() {
                args.values.push(format!(
                    "TraceLoggingValue({}.{}(), \"{}_{}\")",
                    expr, component, field_name, component
                ));
            }
            return;
        }
        FieldKind::Enumeration => {
            let local = args.local(
                "QByteArray",
                field_name,
                format!("{}({})", converter_name(&field.param_type), expr),
            );
            format!("TraceLoggingString({}.constData(), \"{}\")", local, field_name)
        }
        FieldKind::Flags => {
            // `expr` is already wrapped in the converter
            let local = args.local("QByteArray", field_name, expr.to_string());
            format!("TraceLoggingString({}.constData(), \"{}\")", local, field_name)
        }
        FieldKind::Unknown => {
            let local = args.local("QString", field_name, format!("QDebug::toString({})", expr));
            counted_wide_string(&local, field_name)
        }
        FieldKind::Array { .. } | FieldKind::Sequence { .. } => {
            format!("TraceLoggingPointer({}, \"{}\")", expr, field_name)
        }
    };

    args.values.push(value);
}

fn counted_wide_string(expr: &str, field_name: &str) -> String {
    format!(
        "TraceLoggingCountedWideString(reinterpret_cast<LPCWSTR>({}.utf16()), static_cast<ULONG>({}.size()), \"{}\")",
        expr, expr, field_name
    )
}

fn write_wrapper(out: &mut String, provider: &Provider, tracepoint: &Tracepoint) {
    let name = &tracepoint.name;
    let guard = tracepoint_guard(&provider.name, name);
    let signature = format_signature(&tracepoint.args);
    let variable = provider_variable(provider);

    let exprs = call_arg_exprs(provider, &tracepoint.args, &tracepoint.fields, Backend::Etw);
    let mut args = WriteArgs::default();
    for (expr, field) in exprs.iter().zip(&tracepoint.fields) {
        field_values(expr, field, &mut args);
    }

    out.push_str(&format!("#ifndef {}\n", guard));
    out.push_str(&format!("#define {}\n", guard));
    out.push_str("QT_BEGIN_NAMESPACE\n");
    out.push_str(&format!("namespace {} {{\n", WRAPPER_NAMESPACE));

    out.push_str(&format!("inline void trace_{}({})\n", name, signature));
    out.push_str("{\n");
    for local in &args.locals {
        out.push_str(&format!("    {}\n", local));
    }
    out.push_str(&format!("    TraceLoggingWrite({}, \"{}\"", variable, name));
    for value in &args.values {
        out.push_str(",\n        ");
        out.push_str(value);
    }
    out.push_str(");\n");
    out.push_str("}\n\n");

    out.push_str(&format!("inline void do_trace_{}({})\n", name, signature));
    out.push_str("{\n");
    out.push_str(&format!(
        "    trace_{}({});\n",
        name,
        format_names(&tracepoint.args)
    ));
    out.push_str("}\n\n");

    out.push_str(&format!("inline bool trace_{}_enabled()\n", name));
    out.push_str("{\n");
    out.push_str(&format!(
        "    return TraceLoggingProviderEnabled({}, 0, 0);\n",
        variable
    ));
    out.push_str("}\n");

    out.push_str(&format!("}} // namespace {}\n", WRAPPER_NAMESPACE));
    out.push_str("QT_END_NAMESPACE\n");
    out.push_str(&format!("#endif // {}\n\n", guard));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_provider_str;

    fn generate(text: &str) -> String {
        let provider = parse_provider_str("prov", "prov.tracepoints", text).unwrap();
        generate_etw(&provider)
    }

    #[test]
    fn test_unknown_field_is_stringified() {
        let code = generate("evt(QObject obj)");
        assert!(code.contains("const QString _tp_obj = QDebug::toString(obj);"));
        assert!(code.contains("TraceLoggingCountedWideString(reinterpret_cast<LPCWSTR>(_tp_obj.utf16())"));
    }

    #[test]
    fn test_provider_is_defined_once() {
        let code = generate("evt(int a)");
        assert!(code.contains("TRACELOGGING_DEFINE_PROVIDER(\n    prov_provider,\n    \"prov\","));
        assert!(code.contains("TRACELOGGING_DECLARE_PROVIDER(prov_provider);"));
        assert!(code.contains("TraceLoggingValue(a, \"a\")"));
    }

    #[test]
    fn test_sequence_logged_as_binary() {
        let code = generate("evt(int n, quint16 data[n])");
        assert!(code.contains(
            "TraceLoggingBinary(reinterpret_cast<const char *>(data), static_cast<ULONG>(n * sizeof(*data)), \"data\")"
        ));
    }

    #[test]
    fn test_locals_do_not_shadow_arguments() {
        let code = generate("evt(QObject obj, const char *objStr)");
        assert!(code.contains("const QString _tp_obj = QDebug::toString(obj);"));
        assert!(!code.contains(" objStr ="));
    }

    #[test]
    fn test_pointer_array_unrolls() {
        let code = generate("evt(void *ptrs[2])");
        assert!(code.contains("TraceLoggingPointer(ptrs[0], \"ptrs_0\")"));
        assert!(code.contains("TraceLoggingPointer(ptrs[1], \"ptrs_1\")"));
    }
}
