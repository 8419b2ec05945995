// src/exec/builtin.rs

//! Built-in task types.
//!
//! - `echo`: returns its description followed by the dependency input.
//! - `shell`: runs the description as a shell command; stdout is the result.
//! - `subplan`: the description is a nested plan (JSON) that is executed to
//!   completion through the coordinator before this task finishes.

use std::process::Stdio;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::exec::context::{InputMessage, TaskContext};
use crate::exec::registry::{TaskFuture, TaskImpl, TaskRegistry, TaskSchema};
use crate::plan::{parse_plan, RawPlan, TaskDescriptor};

const STDERR_TAIL_LINES: usize = 20;

pub fn register_builtins(registry: &mut TaskRegistry) {
    registry.register(
        "echo",
        TaskSchema::new("return the description and dependency results"),
        |d: &TaskDescriptor| Ok(Box::new(EchoTask { text: d.description.clone() }) as Box<dyn TaskImpl>),
    );
    registry.register(
        "shell",
        TaskSchema::new("run the description as a shell command"),
        |d: &TaskDescriptor| {
            let command = d.description.trim();
            if command.is_empty() {
                bail!("shell task '{}' has an empty command", d.id);
            }
            Ok(Box::new(ShellTask { command: command.to_string() }) as Box<dyn TaskImpl>)
        },
    );
    registry.register(
        "subplan",
        TaskSchema::new("execute a nested plan given as JSON"),
        |d: &TaskDescriptor| {
            let plan = parse_plan(&d.description)
                .with_context(|| format!("parsing nested plan of task '{}'", d.id))?;
            Ok(Box::new(SubplanTask { plan }) as Box<dyn TaskImpl>)
        },
    );
}

struct EchoTask {
    text: String,
}

impl TaskImpl for EchoTask {
    fn run(&self, ctx: TaskContext) -> TaskFuture<'_> {
        Box::pin(async move {
            let input = ctx.dependency_input();
            if input.is_empty() {
                Ok(self.text.clone())
            } else {
                Ok(format!("{}\n{}", self.text, input))
            }
        })
    }
}

struct ShellTask {
    command: String,
}

impl TaskImpl for ShellTask {
    fn run(&self, ctx: TaskContext) -> TaskFuture<'_> {
        Box::pin(run_shell(&self.command, ctx))
    }
}

/// Run `command` with the platform shell.
///
/// Dependency input is written to stdin. Stdout lines are streamed to the
/// result sink and collected as the result; a non-zero exit is an error that
/// carries the tail of stderr.
async fn run_shell(command: &str, ctx: TaskContext) -> anyhow::Result<String> {
    let task_id = ctx.task_id().to_string();
    info!(task = %task_id, cmd = %command, "starting shell task");

    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    };

    cmd.env("PLANDAG_TASK_ID", &task_id)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for task '{task_id}'"))?;

    // Feed stdin from its own task so a chatty child cannot stall on stdout
    // while we are still writing.
    if let Some(mut stdin) = child.stdin.take() {
        let input = ctx.dependency_input();
        let task_name = task_id.clone();
        tokio::spawn(async move {
            // A command that never reads stdin closes the pipe early; not an error.
            if let Err(e) = stdin.write_all(input.as_bytes()).await {
                debug!(task = %task_name, error = %e, "stdin closed before dependency input was written");
            }
        });
    }

    // Always consume stderr so buffers don't fill; keep a short tail for errors.
    let stderr_tail = Arc::new(Mutex::new(Vec::<String>::new()));
    let stderr_reader = child.stderr.take().map(|stderr| {
        let tail = Arc::clone(&stderr_tail);
        let task_name = task_id.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %task_name, "stderr: {}", line);
                let mut tail = tail.lock().unwrap_or_else(|e| e.into_inner());
                if tail.len() == STDERR_TAIL_LINES {
                    tail.remove(0);
                }
                tail.push(line);
            }
        })
    });

    let mut output = String::new();
    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .with_context(|| format!("reading stdout of task '{task_id}'"))?
        {
            ctx.sink().emit(&line);
            output.push_str(&line);
            output.push('\n');
        }
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of task '{task_id}'"))?;
    if let Some(handle) = stderr_reader {
        let _ = handle.await;
    }

    let code = status.code().unwrap_or(-1);
    info!(task = %task_id, exit_code = code, success = status.success(), "shell task exited");

    if !status.success() {
        let tail = stderr_tail.lock().unwrap_or_else(|e| e.into_inner()).join("\n");
        bail!("command `{command}` exited with code {code}: {tail}");
    }

    Ok(output)
}

struct SubplanTask {
    plan: RawPlan,
}

impl TaskImpl for SubplanTask {
    fn run(&self, ctx: TaskContext) -> TaskFuture<'_> {
        Box::pin(async move {
            let state = ctx
                .coordinator()
                .run_nested(self.plan.clone(), &ctx.request)
                .await?;

            if state.has_failures() {
                let failed: Vec<&str> = state.failures.keys().map(|s| s.as_str()).collect();
                bail!("nested plan had failed tasks: {}", failed.join(", "));
            }
            if state.timed_out {
                warn!(task = %ctx.task_id(), outstanding = ?state.outstanding(), "nested plan timed out");
            }

            let blocks: Vec<String> = state
                .execution_queue
                .iter()
                .filter_map(|id| {
                    state.results.get(id).map(|content| {
                        InputMessage {
                            task: id.clone(),
                            content: content.clone(),
                        }
                        .to_block()
                    })
                })
                .collect();
            Ok(blocks.join("\n"))
        })
    }
}
