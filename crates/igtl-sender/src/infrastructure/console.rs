//! Line-oriented control console.
//!
//! Reads one command per line, turns it into a [`Trigger`] and dispatches it
//! to the sender.  Lifecycle commands wait for their [`Completion`] so the
//! reply reflects what the worker lane actually did.
//!
//! Besides the trigger lines (see [`crate::application::trigger`]) the
//! console understands `status`, `help` and `quit`.
//!
//! [`Completion`]: crate::application::Completion

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::application::{SenderService, Trigger};

const HELP: &str = "\
commands:
  start | stop
  port <n>
  send text <message>
  send status <code> <message>
  send transform <x> <y> <z> | <16 values>
  status | help | quit
";

/// Runs the console until `quit` or end of input.
///
/// # Errors
///
/// Returns any I/O error from reading `input` or writing `output`.
pub async fn run_console<R, W>(
    input: R,
    mut output: W,
    sender: &SenderService,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let reply = match line {
            "" => continue,
            "quit" | "exit" => break,
            "help" => HELP.to_string(),
            "status" => format!(
                "{} on port {} as {}\n",
                sender.state(),
                sender.port(),
                sender.device_name()
            ),
            _ => execute(line, sender).await,
        };
        output.write_all(reply.as_bytes()).await?;
        output.flush().await?;
    }
    debug!("console input closed");
    Ok(())
}

async fn execute(line: &str, sender: &SenderService) -> String {
    let trigger: Trigger = match line.parse() {
        Ok(trigger) => trigger,
        Err(e) => return format!("error: {e}\n"),
    };
    let key = trigger.key();
    debug!("console trigger {key}");

    match trigger.dispatch(sender) {
        Ok(Some(completion)) => match completion.wait().await {
            Ok(()) => format!("ok {key}\n"),
            Err(e) => format!("error: {e}\n"),
        },
        Ok(None) => format!("queued {key}\n"),
        Err(e) => format!("error: {e}\n"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
