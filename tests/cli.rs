//! Tests for the `xq` binary.

#![allow(clippy::unwrap_used)]

use std::io::Write;
use std::process::{Command, Output, Stdio};

use tempfile::NamedTempFile;

fn xq(args: &[&str], stdin: &[u8]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_xq"))
        .args(args)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(stdin).unwrap();
    child.wait_with_output().unwrap()
}

fn xml_file(xml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(xml.as_bytes()).unwrap();
    file
}

fn stdout(output: &Output) -> &str {
    std::str::from_utf8(&output.stdout).unwrap()
}

fn stderr(output: &Output) -> &str {
    std::str::from_utf8(&output.stderr).unwrap()
}

#[test]
fn test_short_flags() {
    let file = xml_file("<abc></abc>");
    let output = xq(&["-f", file.path().to_str().unwrap(), "-x", "/abc"], b"");
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "<abc></abc>\n");
}

#[test]
fn test_long_flags() {
    let file = xml_file("<abc id=\"test\"></abc>");
    let path = file.path().to_str().unwrap();
    let output = xq(&["--file", path, "--xpath", "/abc/@id"], b"");
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "test\n");
}

#[test]
fn test_long_flag_wins() {
    let file = xml_file("<abc></abc>");
    let path = file.path().to_str().unwrap();
    let output = xq(&["-f", "/no/such/file.xml", "--file", path, "-x", "/nope", "--xpath", "/"], b"");
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "<?xml version=\"1.0\"?><abc></abc>\n");
}

#[test]
fn test_reads_stdin_by_default() {
    let output = xq(&["-x", "/*"], b"<abc></abc>");
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "<abc></abc>\n");
}

#[test]
fn test_reads_stdin_from_dash() {
    let output = xq(&["-f", "-", "-x", "count(//i)"], b"<r><i/><i/><i/></r>");
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "3\n");
}

#[test]
fn test_missing_expression() {
    let output = xq(&["-f", "note.xml"], b"");
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).is_empty());
    let err = stderr(&output);
    assert!(err.contains("error: missing xpath expression argument"), "{err}");
    assert!(err.contains("Usage:"), "{err}");
}

#[test]
fn test_unknown_flag() {
    let output = xq(&["--bogus"], b"");
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("error:"));
}

#[test]
fn test_version() {
    for flag in ["-v", "--version"] {
        let output = xq(&[flag], b"");
        assert!(output.status.success());
        assert!(stdout(&output).is_empty());
        let err = stderr(&output);
        assert!(err.starts_with("xq\n"), "{err}");
        assert!(err.contains(&format!("Version: {}", env!("CARGO_PKG_VERSION"))), "{err}");
        assert!(err.contains("Build Time: "), "{err}");
    }
}

#[test]
fn test_help() {
    let output = xq(&["--help"], b"");
    assert!(output.status.success());
    assert!(stdout(&output).is_empty());
    let help = stderr(&output);
    assert!(help.contains("--xpath"), "{help}");
    assert!(help.contains("--timeout"), "{help}");
}

#[test]
fn test_malformed_document() {
    let output = xq(&["-x", "/abc"], b"<");
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).is_empty());
    assert!(stderr(&output).contains("xmlparse error"), "{}", stderr(&output));
}

#[test]
fn test_invalid_source() {
    let output = xq(&["-f", "ftp://example.org/a.xml", "-x", "/a"], b"");
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("unsupported url scheme `ftp`"));
}

#[test]
fn test_verbose_logs_to_stderr() {
    let output = xq(&["--verbose", "-x", "/a"], b"<a/>");
    assert!(output.status.success());
    assert_eq!(stdout(&output), "<a></a>\n");
    assert!(stderr(&output).contains("released input"), "{}", stderr(&output));
}
