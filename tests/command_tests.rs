use pretty_assertions::assert_eq;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;
use tracegen::codegen::Backend;
use tracegen::commands::{execute_generate, GenerateArgs};

const PROVIDER: &str = "\
{
#include \"x.h\"
}
ENUM {
    Low
    High
} Level;
startup(int argc, const char *argv0, Level level)
data(int n, quint8 bytes[n], const QString &label)
";

fn tracegen(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tracegen"))
        .args(args)
        .output()
        .expect("failed to run tracegen")
}

fn write_input(dir: &TempDir, name: &str, text: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, text).unwrap();
    path.to_string_lossy().into_owned()
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[test]
fn test_no_arguments_prints_help() {
    let output = tracegen(&[]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"));
}

#[test]
fn test_unknown_backend_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, "in.txt", PROVIDER);
    let out = dir.path().join("out.txt");

    let output = tracegen(&["bogus", &input, &path_str(&out)]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
    assert!(!out.exists());
}

#[test]
fn test_wrong_argument_count_is_usage_error() {
    let output = tracegen(&["lttng", "only-input.txt"]);
    assert!(!output.status.success());
}

#[test]
fn test_generates_every_backend() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, "qtdemo.tracepoints", PROVIDER);

    for backend in ["lttng", "etw", "ctf"] {
        let out = dir.path().join(format!("qtdemo_{}_p.h", backend));
        let output = tracegen(&[backend, &input, &path_str(&out)]);

        assert!(output.status.success(), "{} failed: {:?}", backend, output);
        let code = std::fs::read_to_string(&out).unwrap();
        assert!(code.starts_with("#include \"x.h\"\n"));
        assert!(code.contains("trace_startup"));
    }
}

#[test]
fn test_repeated_runs_are_identical() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, "same.txt", PROVIDER);
    let out_a = dir.path().join("outA.txt");
    let out_b = dir.path().join("outB.txt");

    assert!(tracegen(&["ctf", &input, &path_str(&out_a)]).status.success());
    assert!(tracegen(&["ctf", &input, &path_str(&out_b)]).status.success());

    assert_eq!(
        std::fs::read_to_string(&out_a).unwrap(),
        std::fs::read_to_string(&out_b).unwrap()
    );
}

#[test]
fn test_fatal_error_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, "bad.tracepoints", "evt(QObject obj)\n");
    let out = dir.path().join("bad_p.h");

    let output = tracegen(&["lttng", &input, &path_str(&out)]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("fatal: "));
    assert!(stderr.contains("Cannot deduce LTTNG type for 'QObject obj'"));
    assert!(!out.exists());
}

#[test]
fn test_parse_error_reports_location() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, "broken.tracepoints", "evt(int a)\nnot valid\n");
    let out = dir.path().join("broken_p.h");

    let output = tracegen(&["etw", &input, &path_str(&out)]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.lines().count(), 1);
    assert!(stderr.starts_with("fatal: "));
    assert!(stderr.contains("line 2: 'not valid' does not look like a tracepoint definition"));
    assert!(!out.exists());
}

#[test]
fn test_execute_generate_with_ast_dump() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, "qtdemo.tracepoints", PROVIDER);
    let output = dir.path().join("gen/qtdemo_p.h");
    let dump = dir.path().join("qtdemo.json");

    let args = GenerateArgs {
        backend: Backend::Etw,
        input: input.into(),
        output: output.clone(),
        dump_ast: Some(dump.clone()),
    };
    execute_generate(args).unwrap();

    let code = std::fs::read_to_string(&output).unwrap();
    assert!(code.contains("#ifndef QTDEMO_TRACEPOINTS_H"));
    assert!(code.contains("TRACELOGGING_DEFINE_PROVIDER(\n    qtdemo_provider,"));

    let ast: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&dump).unwrap()).unwrap();
    assert_eq!(ast["name"], "qtdemo");
    assert_eq!(ast["enumerations"][0]["name"], "Level");
    assert_eq!(ast["tracepoints"][1]["fields"][1]["kind"]["length_field"], "n");
}

#[test]
fn test_failed_generation_writes_no_ast_dump() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, "bad.tracepoints", "evt(QObject o)\n");
    let output = dir.path().join("bad_p.h");
    let dump = dir.path().join("bad.json");

    let args = GenerateArgs {
        backend: Backend::Lttng,
        input: input.into(),
        output: output.clone(),
        dump_ast: Some(dump.clone()),
    };

    assert!(execute_generate(args).is_err());
    assert!(!output.exists());
    assert!(!dump.exists());
}
