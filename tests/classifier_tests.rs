use pretty_assertions::assert_eq;
use tracegen::parser::{classify, split_declaration, FieldKind, Shape, UserTypes};

fn kind_of(raw: &str) -> FieldKind {
    classify(raw, &UserTypes::new()).kind
}

#[test]
fn test_fixed_array_decays_to_pointer() {
    let decl = split_declaration("char* b[5]");
    let c = classify(&decl.type_text, &UserTypes::new());

    assert_eq!(
        c.kind,
        FieldKind::Array {
            len: 5,
            element: Box::new(FieldKind::String)
        }
    );
    assert_eq!(c.signature_type, "char**");
    assert_eq!(c.param_type, "char *");
}

#[test]
fn test_sequence_keeps_length_field() {
    let c = classify("const quint8[len]", &UserTypes::new());

    assert_eq!(
        c.kind,
        FieldKind::Sequence {
            length_field: "len".to_string(),
            element: Box::new(FieldKind::Integer)
        }
    );
    assert_eq!(c.signature_type, "const quint8*");
    assert_eq!(c.param_type, "quint8");
}

#[test]
fn test_integral_spellings() {
    for raw in [
        "int",
        "unsigned int",
        "const unsigned long long &",
        "short",
        "qint64",
        "quint32",
        "size_t",
        "bool",
    ] {
        assert_eq!(kind_of(raw), FieldKind::Integer, "{}", raw);
    }
}

#[test]
fn test_pointer_width_integers_are_hex() {
    assert_eq!(kind_of("quintptr"), FieldKind::IntegerHex);
    assert_eq!(kind_of("uintptr_t"), FieldKind::IntegerHex);
}

#[test]
fn test_floats() {
    assert_eq!(kind_of("float"), FieldKind::Float);
    assert_eq!(kind_of("const double &"), FieldKind::Float);
    assert_eq!(kind_of("long double"), FieldKind::Float);
    assert_eq!(kind_of("qreal"), FieldKind::Float);
}

#[test]
fn test_strings_and_pointers() {
    assert_eq!(kind_of("const char *"), FieldKind::String);
    assert_eq!(kind_of("void *"), FieldKind::Pointer);
    assert_eq!(kind_of("const QObject *"), FieldKind::Pointer);
    assert_eq!(kind_of("char **"), FieldKind::Pointer);
}

#[test]
fn test_value_types() {
    assert_eq!(kind_of("const QString &"), FieldKind::Text);
    assert_eq!(kind_of("QByteArray"), FieldKind::Bytes);
    assert_eq!(kind_of("const QUrl &"), FieldKind::Url);
    assert_eq!(kind_of("QPointF"), FieldKind::Geometry { shape: Shape::PointF });
    assert_eq!(kind_of("const QRect &"), FieldKind::Geometry { shape: Shape::Rect });
    assert_eq!(kind_of("QSize"), FieldKind::Geometry { shape: Shape::Size });
}

#[test]
fn test_user_types() {
    let mut user_types = UserTypes::new();
    user_types.add_enum("Qt::Orientation");
    user_types.add_flags("QIODevice::OpenMode");

    assert_eq!(
        classify("Qt::Orientation", &user_types).kind,
        FieldKind::Enumeration
    );
    assert_eq!(
        classify("const QIODevice::OpenMode &", &user_types).kind,
        FieldKind::Flags
    );
    assert_eq!(
        classify("Qt::Orientation[2]", &user_types).kind,
        FieldKind::Array {
            len: 2,
            element: Box::new(FieldKind::Enumeration)
        }
    );
}

#[test]
fn test_unrecognized_spellings_are_unknown() {
    // classification is total: odd input never fails
    for raw in ["QObject", "QMap<int, int>", "std::string", "", "int[a][b]", "int[-1]"] {
        assert_eq!(kind_of(raw), FieldKind::Unknown, "{:?}", raw);
    }
}

#[test]
fn test_split_declaration_keeps_qualified_types() {
    let decl = split_declaration("const QMap<int, QString> &map");
    assert_eq!(decl.type_text, "const QMap<int, QString> &");
    assert_eq!(decl.name, "map");

    let decl = split_declaration("Qt::Orientation orientation");
    assert_eq!(decl.type_text, "Qt::Orientation");
    assert_eq!(decl.name, "orientation");
}
