//! Configuration and constants for the code generators.

/// Headers every generated file pulls in for the value types it knows about
pub const QT_HEADERS: &[&str] = &[
    "#include <QtCore/qglobal.h>",
    "#include <QtCore/qstring.h>",
    "#include <QtCore/qbytearray.h>",
    "#include <QtCore/qurl.h>",
    "#include <QtCore/qpoint.h>",
    "#include <QtCore/qsize.h>",
    "#include <QtCore/qrect.h>",
];

/// Extra header the ETW backend needs to stringify unknown types
pub const QDEBUG_HEADER: &str = "#include <QtCore/qdebug.h>";

/// LTTng runtime headers
pub const LTTNG_TRACEPOINT_HEADER: &str = "#include <lttng/tracepoint.h>";
pub const LTTNG_EVENT_HEADER: &str = "#include <lttng/tracepoint-event.h>";

/// CTF runtime header
pub const CTF_RUNTIME_HEADER: &str = "#include <private/qctf_p.h>";

/// ETW runtime headers
pub const ETW_HEADERS: &[&str] = &["#include <windows.h>", "#include <TraceLoggingProvider.h>"];

/// Namespace all generated wrappers live in
pub const WRAPPER_NAMESPACE: &str = "QtPrivate";

/// Prefix of the per-type enum/flag converter functions
pub const CONVERTER_PREFIX: &str = "trace_convert_";

/// Flags are logged as a byte sequence of bit positions, described as an
/// enumeration of this width
pub const FLAG_ENUM_BITS: u8 = 8;

// Provider GUIDs are name based: SHA-256 over namespace || name, truncated
// to 16 bytes with the version and variant bits patched in. Bumping the
// scheme version changes every generated GUID.
pub const GUID_SCHEME_VERSION: u8 = 8;
pub const PROVIDER_GUID_NAMESPACE: [u8; 16] = [
    0x3d, 0x3f, 0x2b, 0xa1, 0x8c, 0x1e, 0x4f, 0x7e, 0x9d, 0x4a, 0x5b, 0x1c, 0x7e, 0x2f, 0x9a, 0x60,
];
