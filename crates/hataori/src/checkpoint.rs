//! Checkpoint handlers: automatic, interactive and delegated.

use async_trait::async_trait;
use hataori_core::{CheckpointHandler, Decision, StepName, ToolResult};
use std::fmt;
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;
use tracing::warn;

/// Approves every checkpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl CheckpointHandler for AutoApprove {
    async fn handle(&self, _step_name: &StepName, _result: &ToolResult) -> Decision {
        Decision::Approve
    }
}

/// Asks a human on a line-oriented console.
///
/// Prints the step result and reads one of `a` (approve), `r` (revise, then
/// a line of feedback), `b` (rewind, then a step name) or `s` (stop). Any
/// other answer, end of input and I/O errors all stop the run.
pub struct ConsoleApproval<R = BufReader<Stdin>, W = Stdout> {
    io: Mutex<ConsoleIo<R, W>>,
}

struct ConsoleIo<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> fmt::Debug for ConsoleApproval<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleApproval").finish_non_exhaustive()
    }
}

impl ConsoleApproval {
    /// Reads from stdin and writes to stdout.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> ConsoleApproval<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Uses the given line reader and writer.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new(ConsoleIo { reader, writer }),
        }
    }

    async fn prompt(
        io: &mut ConsoleIo<R, W>,
        step_name: &StepName,
        result: &ToolResult,
    ) -> std::io::Result<Decision> {
        let rule = "=".repeat(50);
        let body = if result.success {
            let data = result.data.clone().unwrap_or_default();
            format!(
                "Result: {}",
                serde_json::to_string_pretty(&data).unwrap_or_else(|_| data.to_string())
            )
        } else {
            format!("Error: {}", result.error.as_deref().unwrap_or("unknown error"))
        };

        let screen = format!(
            "\n{rule}\nCHECKPOINT: {step_name}\n{rule}\n{body}\n\nOptions:\n  \
             [a] Approve - continue to next step\n  \
             [r] Revise  - retry this step with feedback\n  \
             [b] Back    - go back to a previous step\n  \
             [s] Stop    - stop workflow\n\nChoice: "
        );
        io.writer.write_all(screen.as_bytes()).await?;
        io.writer.flush().await?;

        let Some(choice) = read_answer(&mut io.reader).await? else {
            return Ok(Decision::Stop);
        };

        let decision = match choice.to_lowercase().as_str() {
            "a" => Decision::Approve,
            "r" => {
                io.writer.write_all(b"Feedback for revision: ").await?;
                io.writer.flush().await?;
                match read_answer(&mut io.reader).await? {
                    Some(feedback) => Decision::revise(feedback),
                    None => Decision::Stop,
                }
            }
            "b" => {
                io.writer.write_all(b"Go back to step: ").await?;
                io.writer.flush().await?;
                match read_answer(&mut io.reader).await? {
                    Some(target) => Decision::rewind(target),
                    None => Decision::Stop,
                }
            }
            _ => Decision::Stop,
        };
        Ok(decision)
    }
}

/// Reads one trimmed line; `None` at end of input.
async fn read_answer<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<Option<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

#[async_trait]
impl<R, W> CheckpointHandler for ConsoleApproval<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn handle(&self, step_name: &StepName, result: &ToolResult) -> Decision {
        let mut io = self.io.lock().await;
        match Self::prompt(&mut io, step_name, result).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!("Checkpoint '{}' could not read a decision: {}", step_name, e);
                Decision::Stop
            }
        }
    }
}

/// Forwards checkpoints to an async callback, such as a remote approval
/// service.
///
/// ```
/// use hataori::{CallbackApproval, Decision};
///
/// let handler = CallbackApproval::new(|step, result| async move {
///     if result.success { Decision::Approve } else { Decision::revise(format!("{step} failed")) }
/// });
/// # let _ = handler;
/// ```
pub struct CallbackApproval<F> {
    callback: F,
}

impl<F> fmt::Debug for CallbackApproval<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackApproval").finish_non_exhaustive()
    }
}

impl<F, Fut> CallbackApproval<F>
where
    F: Fn(StepName, ToolResult) -> Fut + Send + Sync,
    Fut: Future<Output = Decision> + Send,
{
    /// Wraps `callback`.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

#[async_trait]
impl<F, Fut> CheckpointHandler for CallbackApproval<F>
where
    F: Fn(StepName, ToolResult) -> Fut + Send + Sync,
    Fut: Future<Output = Decision> + Send,
{
    async fn handle(&self, step_name: &StepName, result: &ToolResult) -> Decision {
        (self.callback)(step_name.clone(), result.clone()).await
    }
}
