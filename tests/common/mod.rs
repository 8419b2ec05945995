#![allow(dead_code, unused_imports)]

pub use plandag_test_utils::builders::{ConfigFileBuilder, PlanBuilder};
pub use plandag_test_utils::fake_tasks::{
    FailingTask, FlakyTask, PanickingTask, RecordingProgress, RecordingTask,
};
pub use plandag_test_utils::{init_tracing, with_timeout};
