//! `sendmail` and `qmail-inject` delivery.
//!
//! The message, including its `Bcc` header, is written to the program's
//! standard input. `sendmail -t` reads recipients from the headers and
//! strips `Bcc` itself.

use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::Transport;
use crate::error::{Error, Result};

/// Returns the command line arguments for a pipe transport.
///
/// The envelope sender is passed with `-f` only when it is a plain mailbox,
/// never when it could be read as another option.
#[must_use]
pub fn pipe_arguments(transport: Transport, sender: Option<&str>) -> Vec<String> {
    let mut args = Vec::new();
    if transport == Transport::Sendmail {
        args.push("-oi".to_string());
        args.push("-t".to_string());
    }
    if let Some(sender) = sender.filter(|s| is_shell_safe(s)) {
        args.push("-f".to_string());
        args.push(sender.to_string());
    }
    args
}

fn is_shell_safe(sender: &str) -> bool {
    !sender.is_empty()
        && !sender.starts_with('-')
        && sender
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@_-.".contains(c))
}

/// Runs `program` with `args` and feeds it `message`.
///
/// # Errors
///
/// Returns [`Error::Process`] if the program cannot be started or its input
/// cannot be written, and [`Error::ProcessFailed`] on a non-zero exit.
pub async fn pipe_message(program: &Path, args: &[String], message: &[u8]) -> Result<()> {
    let process_error = |source| Error::Process {
        program: program.to_path_buf(),
        source,
    };

    tracing::debug!(program = %program.display(), ?args, "Starting mail program");
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(process_error)?;

    // A program that exits without reading is judged by its exit status.
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(message).await {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(process_error(e));
            }
        }
    }

    let output = child.wait_with_output().await.map_err(process_error)?;
    if !output.status.success() {
        return Err(Error::ProcessFailed {
            program: program.to_path_buf(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_sendmail_arguments() {
        assert_eq!(
            pipe_arguments(Transport::Sendmail, Some("bounce@example.com")),
            vec!["-oi", "-t", "-f", "bounce@example.com"]
        );
        assert_eq!(pipe_arguments(Transport::Sendmail, None), vec!["-oi", "-t"]);
    }

    #[test]
    fn test_qmail_arguments() {
        assert_eq!(
            pipe_arguments(Transport::Qmail, Some("bounce@example.com")),
            vec!["-f", "bounce@example.com"]
        );
        assert!(pipe_arguments(Transport::Qmail, None).is_empty());
    }

    #[test]
    fn test_unsafe_sender_is_dropped() {
        assert_eq!(
            pipe_arguments(Transport::Sendmail, Some("-X/tmp/log@example.com")),
            vec!["-oi", "-t"]
        );
        assert_eq!(
            pipe_arguments(Transport::Sendmail, Some("a b@example.com")),
            vec!["-oi", "-t"]
        );
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = pipe_message(Path::new("/nonexistent/sendmail"), &[], b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Process { .. }));
    }
}
