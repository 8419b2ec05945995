use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use plandag::exec::{ProgressSink, TaskContext, TaskFuture, TaskImpl};
use plandag::types::{TaskId, TaskState};

/// Start/finish instants of one recorded run.
#[derive(Debug, Clone, Copy)]
pub struct Span {
    pub started: Instant,
    pub finished: Instant,
}

impl Span {
    pub fn overlaps(&self, other: &Span) -> bool {
        self.started < other.finished && other.started < self.finished
    }
}

/// Everything a [`RecordingTask`] saw while running.
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    pub spans: BTreeMap<TaskId, Span>,
    /// Direct-dependency ids each task received as input.
    pub inputs: BTreeMap<TaskId, Vec<TaskId>>,
    pub requests: Vec<String>,
    /// Highest number of recorded tasks running at the same time.
    pub max_concurrent: usize,
    running: usize,
}

/// A task that sleeps for a fixed time, then returns `"<id> done"`.
///
/// Shared between every task of its type; all runs land in one [`Recorded`].
#[derive(Clone)]
pub struct RecordingTask {
    delay: Duration,
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingTask {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            recorded: Arc::new(Mutex::new(Recorded::default())),
        }
    }

    pub fn recorded(&self) -> Recorded {
        self.recorded.lock().unwrap().clone()
    }
}

impl TaskImpl for RecordingTask {
    fn run(&self, ctx: TaskContext) -> TaskFuture<'_> {
        Box::pin(async move {
            let started = Instant::now();
            {
                let mut guard = self.recorded.lock().unwrap();
                guard.running += 1;
                guard.max_concurrent = guard.max_concurrent.max(guard.running);
                guard.inputs.insert(
                    ctx.task_id().to_string(),
                    ctx.messages.iter().map(|m| m.task.clone()).collect(),
                );
                guard.requests.push(ctx.request.to_string());
            }

            tokio::time::sleep(self.delay).await;

            let mut guard = self.recorded.lock().unwrap();
            guard.running -= 1;
            guard.spans.insert(
                ctx.task_id().to_string(),
                Span {
                    started,
                    finished: Instant::now(),
                },
            );
            Ok(format!("{} done", ctx.task_id()))
        })
    }
}

/// A task that always returns an error.
pub struct FailingTask;

impl TaskImpl for FailingTask {
    fn run(&self, ctx: TaskContext) -> TaskFuture<'_> {
        Box::pin(async move { Err::<String, _>(anyhow::anyhow!("{} failed on purpose", ctx.task_id())) })
    }
}

/// A task that panics.
pub struct PanickingTask;

impl TaskImpl for PanickingTask {
    fn run(&self, ctx: TaskContext) -> TaskFuture<'_> {
        Box::pin(async move {
            if !ctx.task_id().is_empty() {
                panic!("{} panicked on purpose", ctx.task_id());
            }
            Ok(String::new())
        })
    }
}

/// A task that fails on its first `failures` runs, then succeeds.
pub struct FlakyTask {
    failures: Mutex<u32>,
}

impl FlakyTask {
    pub fn new(failures: u32) -> Self {
        Self {
            failures: Mutex::new(failures),
        }
    }
}

impl TaskImpl for FlakyTask {
    fn run(&self, ctx: TaskContext) -> TaskFuture<'_> {
        Box::pin(async move {
            let fail = {
                let mut left = self.failures.lock().unwrap();
                if *left > 0 {
                    *left -= 1;
                    true
                } else {
                    false
                }
            };
            if fail {
                anyhow::bail!("{} is flaky", ctx.task_id());
            }
            Ok(format!("{} recovered", ctx.task_id()))
        })
    }
}

/// Progress sink that keeps every notification.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    pub transitions: Mutex<Vec<(TaskId, TaskState)>>,
    pub failures: Mutex<Vec<(TaskId, String)>>,
    pub output: Mutex<Vec<(TaskId, String)>>,
}

impl RecordingProgress {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn states_of(&self, task: &str) -> Vec<TaskState> {
        self.transitions
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == task)
            .map(|(_, s)| *s)
            .collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn state_changed(&self, task: &str, state: TaskState) {
        self.transitions.lock().unwrap().push((task.to_string(), state));
    }

    fn task_failed(&self, task: &str, error: &str) {
        self.failures.lock().unwrap().push((task.to_string(), error.to_string()));
    }

    fn task_output(&self, task: &str, chunk: &str) {
        self.output.lock().unwrap().push((task.to_string(), chunk.to_string()));
    }
}
