//! Provider file parser.
//!
//! Reads a tracepoint provider definition line by line:
//! - an optional `{ ... }` prefix block copied verbatim into the output
//! - `ENUM { ... } Type;` and `FLAGS { ... } Type;` declarations
//! - `name(type arg, ...)` tracepoint definitions
//!
//! Every violation is fatal; there is no partial parse result.

use super::classifier::{classify, split_declaration, UserTypes};
use super::schema::{
    Argument, EnumValue, Field, FieldKind, FlagValue, Provider, TraceEnum, TraceFlags, Tracepoint,
};
use crate::utils::error::ParseError;
use log::debug;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

static TRACEDEF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*\((.*)\)\s*;?$").expect("tracedef regex is valid")
});

static BLOCK_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\}\s*([A-Za-z_][A-Za-z0-9_]*(?:::[A-Za-z_][A-Za-z0-9_]*)*)\s*;?$")
        .expect("block end regex is valid")
});

static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*(?:=\s*(-?(?:0[xX][0-9A-Fa-f]+|0[bB][01]+|[0-9]+)))?\s*,?$")
        .expect("entry regex is valid")
});

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^RANGE\(\s*([A-Za-z_][A-Za-z0-9_]*)\s*,\s*(-?[0-9]+)\s*\.\.\.\s*(-?[0-9]+)\s*\)\s*,?$")
        .expect("range regex is valid")
});

/// Parse a provider file from disk
///
/// **Public** - main entry point for parsing
///
/// # Arguments
/// * `path` - Provider definition file; its name determines the provider name
///
/// # Errors
/// * `ParseError::ReadFailed` - the file cannot be read
/// * `ParseError::InvalidUtf8` - the file is not UTF-8 text
/// * `ParseError::InvalidProviderName` - no usable name can be derived from the path
/// * any syntax error reported by [`parse_provider_str`]
pub fn parse_provider(path: impl AsRef<Path>) -> Result<Provider, ParseError> {
    let path = path.as_ref();
    let file = path.display().to_string();

    debug!("Reading provider file: {}", file);

    let bytes = std::fs::read(path).map_err(|source| ParseError::ReadFailed {
        file: file.clone(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|e| {
        let valid = &e.as_bytes()[..e.utf8_error().valid_up_to()];
        ParseError::InvalidUtf8 {
            file: file.clone(),
            line: valid.iter().filter(|&&b| b == b'\n').count() + 1,
        }
    })?;

    let name = provider_name_from_path(path)?;
    parse_provider_str(&name, &file, &text)
}

/// Derive the provider name from the input file name
///
/// The name is the file name up to its first `.`, with every character
/// that cannot appear in a C identifier replaced by `_`.
pub fn provider_name_from_path(path: &Path) -> Result<String, ParseError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let base = file_name.split('.').next().unwrap_or_default();

    let mut name: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if name.is_empty() {
        return Err(ParseError::InvalidProviderName(path.display().to_string()));
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }

    Ok(name)
}

/// Parse provider text
///
/// **Public** - used by [`parse_provider`] and directly by tests
///
/// # Arguments
/// * `name` - Provider name, must already be a valid identifier
/// * `file` - File name used in diagnostics
/// * `text` - Whole provider definition
pub fn parse_provider_str(name: &str, file: &str, text: &str) -> Result<Provider, ParseError> {
    let mut parser = ProviderParser::new(name, file);

    for (index, raw_line) in text.lines().enumerate() {
        let raw_line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        parser.feed(index + 1, raw_line)?;
    }

    parser.finish()
}

/// What the parser is currently inside of
enum State {
    TopLevel,
    Prefix { opened_at: usize },
    Enum(EnumBuilder),
    Flags(FlagsBuilder),
}

struct EnumBuilder {
    opened_at: usize,
    values: Vec<EnumValue>,
    next_value: i64,
}

struct FlagsBuilder {
    opened_at: usize,
    values: Vec<FlagValue>,
}

/// Line-driven parser state
///
/// **Private** - wrapped by [`parse_provider_str`]
struct ProviderParser<'a> {
    file: &'a str,
    provider: Provider,
    user_types: UserTypes,
    tracepoint_names: BTreeSet<String>,
    seen_prefix: bool,
    state: State,
}

impl<'a> ProviderParser<'a> {
    fn new(name: &str, file: &'a str) -> Self {
        Self {
            file,
            provider: Provider {
                name: name.to_string(),
                ..Default::default()
            },
            user_types: UserTypes::new(),
            tracepoint_names: BTreeSet::new(),
            seen_prefix: false,
            state: State::TopLevel,
        }
    }

    fn feed(&mut self, line_number: usize, raw_line: &str) -> Result<(), ParseError> {
        let line = raw_line.trim();

        match std::mem::replace(&mut self.state, State::TopLevel) {
            State::Prefix { opened_at } => {
                if line == "}" {
                    debug!("Prefix block closed on line {}", line_number);
                } else {
                    self.provider.prefix_text.push(raw_line.to_string());
                    self.state = State::Prefix { opened_at };
                }
                Ok(())
            }
            State::Enum(builder) => self.feed_enum(builder, line_number, line),
            State::Flags(builder) => self.feed_flags(builder, line_number, line),
            State::TopLevel => self.feed_top_level(line_number, line),
        }
    }

    fn feed_top_level(&mut self, line_number: usize, line: &str) -> Result<(), ParseError> {
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }

        match line {
            "{" => {
                if self.seen_prefix {
                    return Err(ParseError::DuplicatePrefix {
                        file: self.file.to_string(),
                        line: line_number,
                    });
                }
                self.seen_prefix = true;
                self.state = State::Prefix {
                    opened_at: line_number,
                };
                return Ok(());
            }
            "ENUM {" => {
                self.state = State::Enum(EnumBuilder {
                    opened_at: line_number,
                    values: Vec::new(),
                    next_value: 0,
                });
                return Ok(());
            }
            "FLAGS {" => {
                self.state = State::Flags(FlagsBuilder {
                    opened_at: line_number,
                    values: Vec::new(),
                });
                return Ok(());
            }
            _ => {}
        }

        let Some(caps) = TRACEDEF_RE.captures(line) else {
            return Err(ParseError::Syntax {
                file: self.file.to_string(),
                line: line_number,
                text: line.to_string(),
            });
        };

        let name = caps.get(1).map_or("", |m| m.as_str());
        let args = caps.get(2).map_or("", |m| m.as_str());

        let tracepoint = self.parse_tracepoint(name, args, line_number)?;
        self.provider.tracepoints.push(tracepoint);
        Ok(())
    }

    fn feed_enum(
        &mut self,
        mut builder: EnumBuilder,
        line_number: usize,
        line: &str,
    ) -> Result<(), ParseError> {
        if line.is_empty() || line.starts_with('#') {
            self.state = State::Enum(builder);
            return Ok(());
        }

        if let Some(caps) = BLOCK_END_RE.captures(line) {
            let name = caps.get(1).map_or("", |m| m.as_str()).to_string();
            self.check_new_user_type(&name, builder.values.is_empty(), "ENUM", line_number)?;

            let (value_size, signed) = minimum_value_size(&builder.values);
            debug!(
                "Parsed enumeration {} ({} values, {} bits)",
                name,
                builder.values.len(),
                value_size
            );

            self.user_types.add_enum(name.clone());
            self.provider.enumerations.push(TraceEnum {
                name,
                values: builder.values,
                value_size,
                signed,
            });
            return Ok(());
        }

        if let Some(caps) = RANGE_RE.captures(line) {
            let name = caps.get(1).map_or("", |m| m.as_str());
            let start = self.parse_int(caps.get(2).map_or("", |m| m.as_str()), "ENUM", line_number, line)?;
            let end = self.parse_int(caps.get(3).map_or("", |m| m.as_str()), "ENUM", line_number, line)?;

            if start > end {
                return Err(self.invalid_entry("ENUM", line_number, line));
            }

            builder.values.push(EnumValue {
                name: name.to_string(),
                value: start,
                range_end: Some(end),
            });
            builder.next_value = end.saturating_add(1);
            self.state = State::Enum(builder);
            return Ok(());
        }

        let Some(caps) = ENTRY_RE.captures(line) else {
            return Err(self.invalid_entry("ENUM", line_number, line));
        };

        let name = caps.get(1).map_or("", |m| m.as_str());
        let value = match caps.get(2) {
            Some(m) => self.parse_int(m.as_str(), "ENUM", line_number, line)?,
            None => builder.next_value,
        };

        builder.values.push(EnumValue {
            name: name.to_string(),
            value,
            range_end: None,
        });
        builder.next_value = value.saturating_add(1);
        self.state = State::Enum(builder);
        Ok(())
    }

    fn feed_flags(
        &mut self,
        mut builder: FlagsBuilder,
        line_number: usize,
        line: &str,
    ) -> Result<(), ParseError> {
        if line.is_empty() || line.starts_with('#') {
            self.state = State::Flags(builder);
            return Ok(());
        }

        if let Some(caps) = BLOCK_END_RE.captures(line) {
            let name = caps.get(1).map_or("", |m| m.as_str()).to_string();
            self.check_new_user_type(&name, builder.values.is_empty(), "FLAGS", line_number)?;

            debug!("Parsed flags {} ({} values)", name, builder.values.len());

            self.user_types.add_flags(name.clone());
            self.provider.flags.push(TraceFlags {
                name,
                values: builder.values,
            });
            return Ok(());
        }

        let Some(caps) = ENTRY_RE.captures(line) else {
            return Err(self.invalid_entry("FLAGS", line_number, line));
        };

        let name = caps.get(1).map_or("", |m| m.as_str());
        let Some(raw_value) = caps.get(2) else {
            return Err(ParseError::InvalidDefinition {
                file: self.file.to_string(),
                line: line_number,
                message: format!("flag {} needs an explicit value", name),
            });
        };

        let value = self.parse_int(raw_value.as_str(), "FLAGS", line_number, line)?;
        let value = u64::try_from(value).map_err(|_| self.invalid_entry("FLAGS", line_number, line))?;

        builder.values.push(FlagValue {
            name: name.to_string(),
            value,
        });
        self.state = State::Flags(builder);
        Ok(())
    }

    fn check_new_user_type(
        &self,
        name: &str,
        empty: bool,
        kind: &'static str,
        line_number: usize,
    ) -> Result<(), ParseError> {
        let message = if empty {
            format!("{} {} has no values", kind, name)
        } else if self.user_types.contains(name) {
            format!("type {} is declared more than once", name)
        } else {
            return Ok(());
        };

        Err(ParseError::InvalidDefinition {
            file: self.file.to_string(),
            line: line_number,
            message,
        })
    }

    fn parse_tracepoint(
        &mut self,
        name: &str,
        args: &str,
        line_number: usize,
    ) -> Result<Tracepoint, ParseError> {
        if !self.tracepoint_names.insert(name.to_string()) {
            return Err(ParseError::InvalidDefinition {
                file: self.file.to_string(),
                line: line_number,
                message: format!("tracepoint {} is defined more than once", name),
            });
        }

        let mut tracepoint = Tracepoint {
            name: name.to_string(),
            args: Vec::new(),
            fields: Vec::new(),
        };

        if args.trim().is_empty() {
            debug!("Parsed tracepoint {} (no arguments)", name);
            return Ok(tracepoint);
        }

        for (index, arg) in split_arguments(args).into_iter().enumerate() {
            let decl = split_declaration(arg);

            if decl.name.is_empty() {
                return Err(self.missing_name(name, index, line_number));
            }
            if decl.type_text.is_empty() {
                // A lone built-in spelling such as `int` is a type without a name
                let lone = classify(&decl.name, &self.user_types);
                if lone.kind != FieldKind::Unknown {
                    return Err(self.missing_name(name, index, line_number));
                }
                return Err(ParseError::MissingType {
                    file: self.file.to_string(),
                    line: line_number,
                    index: index + 1,
                    tracepoint: name.to_string(),
                });
            }

            let classified = classify(&decl.type_text, &self.user_types);

            let array_len = match &classified.kind {
                FieldKind::Array { len, .. } => *len,
                _ => 0,
            };

            tracepoint.args.push(Argument {
                type_name: classified.signature_type,
                name: decl.name.clone(),
                array_len,
            });
            tracepoint.fields.push(Field {
                kind: classified.kind,
                param_type: classified.param_type,
                name: decl.name,
            });
        }

        self.check_sequence_lengths(&tracepoint, line_number)?;

        debug!(
            "Parsed tracepoint {} ({} arguments)",
            name,
            tracepoint.args.len()
        );

        Ok(tracepoint)
    }

    /// Every sequence must be sized by a sibling argument
    fn check_sequence_lengths(
        &self,
        tracepoint: &Tracepoint,
        line_number: usize,
    ) -> Result<(), ParseError> {
        for field in &tracepoint.fields {
            let FieldKind::Sequence { length_field, .. } = &field.kind else {
                continue;
            };

            let found = tracepoint
                .args
                .iter()
                .any(|arg| arg.name == *length_field && arg.name != field.name);

            if !found {
                return Err(ParseError::InvalidDefinition {
                    file: self.file.to_string(),
                    line: line_number,
                    message: format!(
                        "sequence length '{}' of argument '{}' does not name an argument of {}",
                        length_field, field.name, tracepoint.name
                    ),
                });
            }
        }
        Ok(())
    }

    fn parse_int(
        &self,
        text: &str,
        kind: &'static str,
        line_number: usize,
        line: &str,
    ) -> Result<i64, ParseError> {
        parse_integer(text).ok_or_else(|| self.invalid_entry(kind, line_number, line))
    }

    fn invalid_entry(&self, kind: &'static str, line_number: usize, line: &str) -> ParseError {
        ParseError::InvalidEntry {
            file: self.file.to_string(),
            line: line_number,
            kind,
            text: line.to_string(),
        }
    }

    fn missing_name(&self, tracepoint: &str, index: usize, line_number: usize) -> ParseError {
        ParseError::MissingName {
            file: self.file.to_string(),
            line: line_number,
            index: index + 1,
            tracepoint: tracepoint.to_string(),
        }
    }

    fn finish(self) -> Result<Provider, ParseError> {
        match self.state {
            State::TopLevel => {}
            State::Prefix { opened_at } => {
                debug!("Prefix block opened on line {} never closed", opened_at);
                return Err(ParseError::UnterminatedPrefix {
                    file: self.file.to_string(),
                });
            }
            State::Enum(builder) => {
                return Err(ParseError::UnterminatedBlock {
                    file: self.file.to_string(),
                    kind: "ENUM",
                    line: builder.opened_at,
                });
            }
            State::Flags(builder) => {
                return Err(ParseError::UnterminatedBlock {
                    file: self.file.to_string(),
                    kind: "FLAGS",
                    line: builder.opened_at,
                });
            }
        }

        debug!(
            "Parsed provider {}: {} tracepoints, {} enumerations, {} flags",
            self.provider.name,
            self.provider.tracepoints.len(),
            self.provider.enumerations.len(),
            self.provider.flags.len()
        );

        Ok(self.provider)
    }
}

/// Split an argument list on top-level commas
///
/// Commas nested in `<>`, `()` or `[]` belong to a type, e.g. `QMap<int, int> m`.
pub fn split_arguments(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth: usize = 0;
    let mut start = 0;

    for (i, c) in args.char_indices() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(args[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(args[start..].trim());

    parts
}

/// Parse a decimal, `0x` hex or `0b` binary integer with optional sign
fn parse_integer(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let magnitude = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };

    Some(if negative { -magnitude } else { magnitude })
}

/// Smallest of 8/16/32 bits that holds every value and range bound
///
/// Returns the width and whether the storage needs to be signed.
pub fn minimum_value_size(values: &[EnumValue]) -> (u8, bool) {
    let bounds = values
        .iter()
        .flat_map(|v| std::iter::once(v.value).chain(v.range_end));

    let (min, max) = bounds.fold((0i64, 0i64), |(lo, hi), v| (lo.min(v), hi.max(v)));

    if min < 0 {
        let size = if min >= i8::MIN as i64 && max <= i8::MAX as i64 {
            8
        } else if min >= i16::MIN as i64 && max <= i16::MAX as i64 {
            16
        } else {
            32
        };
        return (size, true);
    }

    let size = if max <= u8::MAX as i64 {
        8
    } else if max <= u16::MAX as i64 {
        16
    } else {
        32
    };
    (size, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_arguments_respects_templates() {
        let parts = split_arguments("QMap<int, QString> m, int b");
        assert_eq!(parts, vec!["QMap<int, QString> m", "int b"]);
    }

    #[test]
    fn test_parse_integer_forms() {
        assert_eq!(parse_integer("42"), Some(42));
        assert_eq!(parse_integer("0x10"), Some(16));
        assert_eq!(parse_integer("0b101"), Some(5));
        assert_eq!(parse_integer("-3"), Some(-3));
        assert_eq!(parse_integer("abc"), None);
    }

    #[test]
    fn test_minimum_value_size() {
        let value = |v: i64| EnumValue {
            name: "V".to_string(),
            value: v,
            range_end: None,
        };
        assert_eq!(minimum_value_size(&[value(0), value(255)]), (8, false));
        assert_eq!(minimum_value_size(&[value(256)]), (16, false));
        assert_eq!(minimum_value_size(&[value(70000)]), (32, false));
        assert_eq!(minimum_value_size(&[value(-1), value(127)]), (8, true));
        assert_eq!(minimum_value_size(&[value(-1), value(128)]), (16, true));
    }

    #[test]
    fn test_provider_name_from_path() {
        let name = provider_name_from_path(Path::new("/tmp/qtcore.tracepoints")).unwrap();
        assert_eq!(name, "qtcore");

        let name = provider_name_from_path(Path::new("my-provider.tp")).unwrap();
        assert_eq!(name, "my_provider");

        let name = provider_name_from_path(Path::new("3d.tp")).unwrap();
        assert_eq!(name, "_3d");

        assert!(provider_name_from_path(Path::new(".hidden")).is_err());
    }
}
