// src/retry/orchestrator.rs

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::RetrySection;
use crate::retry::record::{ErrorRecord, Problem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOptions {
    pub auto_fix: bool,
    /// Retries allowed after the first attempt.
    pub max_attempts: u32,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self::from(&RetrySection::default())
    }
}

impl From<&RetrySection> for RetryOptions {
    fn from(section: &RetrySection) -> Self {
        Self {
            auto_fix: section.auto_fix,
            max_attempts: section.max_attempts,
        }
    }
}

/// Cooperative switch for turning retries off between attempts.
///
/// Clones share the same flag, so a UI can hold one while the loop runs.
#[derive(Debug, Clone, Default)]
pub struct RetryControl {
    disabled: Arc<AtomicBool>,
}

impl RetryControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disable(&self) {
        self.disabled.store(true, Ordering::SeqCst);
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }
}

/// Input to one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based attempt number.
    pub number: u32,
    /// Deduplicated problems from earlier attempts, most severe first.
    pub history: Vec<Problem>,
}

/// What an attempt produced.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub success: bool,
    pub problems: Vec<Problem>,
}

impl<T> Outcome<T> {
    pub fn success(value: T) -> Self {
        Self {
            value,
            success: true,
            problems: Vec::new(),
        }
    }

    pub fn failure(value: T, problems: Vec<Problem>) -> Self {
        Self {
            value,
            success: false,
            problems,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Succeeded,
    /// No attempts left (including `auto_fix = false`).
    Exhausted,
    /// Retrying was switched off through [`RetryControl`].
    Disabled,
}

/// Final outcome of the loop plus bookkeeping.
#[derive(Debug, Clone)]
pub struct RetryReport<T> {
    pub outcome: Outcome<T>,
    /// Attempts run during this call.
    pub attempts: u32,
    pub stop_reason: StopReason,
    /// Accumulated failure history.
    pub history: Vec<Problem>,
}

/// Runs a unit of work until it succeeds, the retry budget is spent, or
/// retries are disabled.
///
/// The budget is initialised on the first call to [`run`](Self::run) and is
/// not replenished by later calls; use [`reset`](Self::reset) for that.
#[derive(Debug)]
pub struct RetryOrchestrator {
    options: RetryOptions,
    control: RetryControl,
    remaining: Option<u32>,
    record: ErrorRecord,
}

impl RetryOrchestrator {
    pub fn new(options: RetryOptions) -> Self {
        Self::with_control(options, RetryControl::new())
    }

    pub fn with_control(options: RetryOptions, control: RetryControl) -> Self {
        Self {
            options,
            control,
            remaining: None,
            record: ErrorRecord::new(),
        }
    }

    pub fn control(&self) -> RetryControl {
        self.control.clone()
    }

    /// Retries left, once initialised.
    pub fn remaining(&self) -> Option<u32> {
        self.remaining
    }

    pub fn record(&self) -> &ErrorRecord {
        &self.record
    }

    /// Forget the budget and the failure history.
    pub fn reset(&mut self) {
        self.remaining = None;
        self.record.clear();
    }

    pub async fn run<T, F, Fut>(&mut self, mut unit: F) -> RetryReport<T>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Outcome<T>>,
    {
        let options = self.options;
        let remaining = self.remaining.get_or_insert_with(|| {
            if options.auto_fix {
                options.max_attempts
            } else {
                0
            }
        });
        debug!(remaining = *remaining, "starting retry loop");

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let attempt = Attempt {
                number: attempts,
                history: self.record.problems(),
            };
            let outcome = unit(attempt).await;

            if outcome.success {
                info!(attempts, "attempt succeeded");
                return self.report(outcome, attempts, StopReason::Succeeded);
            }

            self.record.extend(outcome.problems.iter().cloned());
            warn!(
                attempts,
                problems = outcome.problems.len(),
                distinct = self.record.len(),
                "attempt failed"
            );

            if self.control.is_disabled() {
                info!(attempts, "retries disabled; keeping last outcome");
                return self.report(outcome, attempts, StopReason::Disabled);
            }

            let remaining = self.remaining.get_or_insert(0);
            if *remaining == 0 {
                info!(attempts, "retry budget exhausted; keeping last outcome");
                return self.report(outcome, attempts, StopReason::Exhausted);
            }
            *remaining -= 1;
            debug!(remaining = *remaining, "retrying with accumulated history");
        }
    }

    fn report<T>(&self, outcome: Outcome<T>, attempts: u32, stop_reason: StopReason) -> RetryReport<T> {
        RetryReport {
            outcome,
            attempts,
            stop_reason,
            history: self.record.problems(),
        }
    }
}
