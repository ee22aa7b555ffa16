//! Out-of-process parser invocation.
//!
//! The arch parser is a standalone executable. One parse is one
//! subprocess run: the full document text goes to its stdin, the JSON
//! tree comes back on stdout, and stderr carries the failure message
//! when the parser rejects the input.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::parser::tree::SyntaxNode;

/// Fixed argument set: read stdin, write stdout, JSON tree output.
const PARSER_ARGS: [&str; 6] = ["-f", "-", "-o", "-", "-t", "json"];

/// Why a parse attempt produced no tree.
#[derive(Debug, thiserror::Error)]
pub enum ParseFailure {
    /// Launching the parser or exchanging data with it failed.
    #[error("parser I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The parser exited with a non-zero status.
    #[error("parser exited unsuccessfully ({status}): {stderr}")]
    ParserExit {
        status: std::process::ExitStatus,
        stderr: String,
    },
    /// The parser reported success but did not write a JSON tree.
    #[error("malformed parser output: {0}")]
    Malformed(String),
    /// The parser did not finish within the configured budget.
    #[error("parser timed out after {0:?}")]
    Timeout(Duration),
}

/// Anything that can turn document text into a syntax tree.
///
/// The production implementation is [`ParserBridge`]; tests substitute
/// in-memory sources.
#[async_trait]
pub trait ParseSource: Send + Sync {
    async fn parse(&self, text: &str) -> Result<SyntaxNode, ParseFailure>;
}

/// Runs the external arch parser.
pub struct ParserBridge {
    executable: PathBuf,
    timeout: Duration,
}

impl ParserBridge {
    pub fn new(executable: PathBuf, timeout: Duration) -> Self {
        Self {
            executable,
            timeout,
        }
    }

    async fn run_parser(&self, text: &str) -> Result<SyntaxNode, ParseFailure> {
        let mut child = Command::new(&self.executable)
            .args(PARSER_ARGS)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "parser stdin unavailable")
        })?;

        // The parser reads until EOF, so stdin must be closed after the
        // write. Both output streams are drained concurrently with the
        // write: a parser that fills one pipe before touching another
        // must not deadlock against us.
        let write = async {
            stdin.write_all(text.as_bytes()).await?;
            stdin.shutdown().await?;
            drop(stdin);
            Ok::<_, std::io::Error>(())
        };
        let (write_result, output) = tokio::join!(write, child.wait_with_output());
        let output = output?;

        if !output.status.success() {
            return Err(ParseFailure::ParserExit {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        // A parser that exited cleanly without reading all input still
        // counts as a write failure.
        write_result?;

        let value: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|err| ParseFailure::Malformed(err.to_string()))?;
        Ok(SyntaxNode::from_value(&value))
    }
}

#[async_trait]
impl ParseSource for ParserBridge {
    async fn parse(&self, text: &str) -> Result<SyntaxNode, ParseFailure> {
        tracing::debug!(parser = %self.executable.display(), bytes = text.len(), "invoking parser");
        match tokio::time::timeout(self.timeout, self.run_parser(text)).await {
            Ok(result) => result,
            // Dropping the in-flight future kills the child (kill_on_drop).
            Err(_) => Err(ParseFailure::Timeout(self.timeout)),
        }
    }
}
