// src/retry/record.rs

use std::collections::BTreeMap;

/// One problem reported by a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub message: String,
    /// Higher is more important.
    pub severity: u32,
    /// Task or component that reported it, if known.
    pub source: Option<String>,
}

impl Problem {
    pub fn new(message: impl Into<String>, severity: u32) -> Self {
        Self {
            message: message.into(),
            severity,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Failure history across attempts, keyed by message text.
///
/// For every distinct message only the most severe instance is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorRecord {
    by_message: BTreeMap<String, Problem>,
}

impl ErrorRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, problem: Problem) {
        match self.by_message.get_mut(&problem.message) {
            Some(existing) if existing.severity >= problem.severity => {}
            Some(existing) => *existing = problem,
            None => {
                self.by_message.insert(problem.message.clone(), problem);
            }
        }
    }

    pub fn extend<I: IntoIterator<Item = Problem>>(&mut self, problems: I) {
        for problem in problems {
            self.record(problem);
        }
    }

    /// Retained problems, most severe first (ties by message).
    pub fn problems(&self) -> Vec<Problem> {
        let mut problems: Vec<Problem> = self.by_message.values().cloned().collect();
        problems.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.message.cmp(&b.message)));
        problems
    }

    pub fn most_severe(&self) -> Option<&Problem> {
        self.by_message.values().max_by_key(|p| p.severity)
    }

    pub fn len(&self) -> usize {
        self.by_message.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_message.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_message.clear();
    }
}
