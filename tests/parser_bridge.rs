//! Parser bridge integration tests.
//!
//! The real parser is a native executable; these tests stand in small
//! shell scripts that speak the same protocol (text on stdin, JSON tree
//! on stdout, failures on stderr with a non-zero exit).

#![cfg(unix)]

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;

use arch_lsp::parser::bridge::{ParseFailure, ParserBridge, ParseSource};
use arch_lsp::parser::tree::SyntaxNode;

fn fake_parser(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("arch-parser");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "#!/bin/sh").unwrap();
    writeln!(file, "{body}").unwrap();
    let mut permissions = file.metadata().unwrap().permissions();
    permissions.set_mode(0o755);
    drop(file);
    std::fs::set_permissions(&path, permissions).unwrap();
    path
}

fn bridge(path: PathBuf) -> ParserBridge {
    ParserBridge::new(path, Duration::from_secs(10))
}

#[tokio::test]
async fn successful_parse_decodes_tree() {
    let dir = tempfile::tempdir().unwrap();
    let parser = fake_parser(
        &dir,
        r#"cat >/dev/null; printf '%s' '{"type":"block","statements":[{"type":"variable","variable":"x"}]}'"#,
    );

    let tree = bridge(parser).parse("x\n").await.unwrap();
    match tree {
        SyntaxNode::Block { statements, .. } => assert_eq!(statements.len(), 1),
        other => panic!("expected block, got {other:?}"),
    }
}

#[tokio::test]
async fn nonzero_exit_carries_stderr_text() {
    let dir = tempfile::tempdir().unwrap();
    let parser = fake_parser(
        &dir,
        r#"cat >/dev/null; echo 'syntax error at line 3' >&2; exit 2"#,
    );

    let failure = bridge(parser).parse("broken(\n").await.unwrap_err();
    match &failure {
        ParseFailure::ParserExit { status, stderr } => {
            assert_eq!(status.code(), Some(2));
            assert_eq!(stderr, "syntax error at line 3");
        }
        other => panic!("expected ParserExit, got {other:?}"),
    }
    // The display form is what reaches the diagnostic message.
    assert!(failure.to_string().contains("syntax error at line 3"));
}

#[tokio::test]
async fn clean_exit_with_garbage_output_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let parser = fake_parser(&dir, r#"cat >/dev/null; echo 'not json at all'"#);

    let failure = bridge(parser).parse("x").await.unwrap_err();
    assert!(matches!(failure, ParseFailure::Malformed(_)), "{failure:?}");
}

#[tokio::test]
async fn clean_exit_with_empty_output_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let parser = fake_parser(&dir, r#"cat >/dev/null"#);

    let failure = bridge(parser).parse("x").await.unwrap_err();
    assert!(matches!(failure, ParseFailure::Malformed(_)), "{failure:?}");
}

#[tokio::test]
async fn missing_executable_is_io_failure() {
    let failure = bridge(PathBuf::from("/nonexistent/arch-parser"))
        .parse("x")
        .await
        .unwrap_err();
    assert!(matches!(failure, ParseFailure::Io(_)), "{failure:?}");
}

#[tokio::test]
async fn hung_parser_times_out_and_dies() {
    let dir = tempfile::tempdir().unwrap();
    let parser = fake_parser(&dir, r#"sleep 30"#);

    let started = std::time::Instant::now();
    let failure = ParserBridge::new(parser, Duration::from_millis(200))
        .parse("x")
        .await
        .unwrap_err();

    assert!(matches!(failure, ParseFailure::Timeout(_)), "{failure:?}");
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "timeout did not cut the wait short"
    );
}

#[tokio::test]
async fn large_streams_do_not_deadlock() {
    let dir = tempfile::tempdir().unwrap();
    // Writes a few hundred kilobytes of output before touching stdin,
    // which deadlocks unless both pipes are drained concurrently.
    let parser = fake_parser(
        &dir,
        r#"awk 'BEGIN{printf "{\"type\":\"block\",\"statements\":["; for(i=0;i<20000;i++){printf "%s{\"type\":\"literal\"}", (i ? "," : "")}; printf "]}"}'; cat >/dev/null"#,
    );

    let big_input = "x = route(n1, n2)\n".repeat(60_000);
    let tree = bridge(parser).parse(&big_input).await.unwrap();
    match tree {
        SyntaxNode::Block { statements, .. } => assert_eq!(statements.len(), 20_000),
        other => panic!("expected block, got {other:?}"),
    }
}
