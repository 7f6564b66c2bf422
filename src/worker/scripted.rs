//! Scripted task - deterministic task behavior for tests and demos.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{DirectorError, Result};
use crate::worker::{Task, TaskReport, WorkContext};

/// Which workers a ScriptedTask marks defective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefectScript {
    /// No worker is defective
    #[default]
    Never,
    /// Every canary is defective
    Canaries,
    /// Canaries carrying experimental knowledge are defective
    ExperimentalCanaries,
    /// Every worker is defective
    All,
}

impl DefectScript {
    fn applies(self, ctx: &WorkContext) -> bool {
        match self {
            DefectScript::Never => false,
            DefectScript::Canaries => ctx.is_canary,
            DefectScript::ExperimentalCanaries => ctx.carries_experimental,
            DefectScript::All => true,
        }
    }
}

/// Task with fixed, non-random behavior.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTask {
    description: String,
    lesson: Option<String>,
    defects: DefectScript,
    error: Option<String>,
    panic: bool,
    delay: Duration,
}

impl ScriptedTask {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    /// Every worker surfaces this lesson candidate.
    pub fn with_lesson(mut self, lesson: impl Into<String>) -> Self {
        self.lesson = Some(lesson.into());
        self
    }

    pub fn with_defects(mut self, defects: DefectScript) -> Self {
        self.defects = defects;
        self
    }

    /// Sleep this long before reporting.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every execution returns this error.
    pub fn failing(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Every execution panics.
    pub fn panicking(mut self) -> Self {
        self.panic = true;
        self
    }
}

#[async_trait]
impl Task for ScriptedTask {
    fn describe(&self) -> &str {
        &self.description
    }

    async fn perform(&self, ctx: &mut WorkContext) -> Result<TaskReport> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.panic {
            panic!("scripted panic in worker {}", ctx.worker_id);
        }
        if let Some(ref error) = self.error {
            return Err(DirectorError::Task(error.clone()));
        }
        Ok(TaskReport {
            lesson: self.lesson.clone(),
            defect: self.defects.applies(ctx),
        })
    }
}
