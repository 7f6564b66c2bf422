//! Lesson store - append-only lesson history.
//!
//! Workers only ever see the active window: the most recent `active_window`
//! lessons. Older lessons stay in the history but are no longer handed out.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{DirectorError, Result};
use crate::knowledge::Lesson;

/// Configuration for the lesson store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Number of most recent lessons handed to new workers.
    pub active_window: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self { active_window: 5 }
    }
}

impl KnowledgeConfig {
    /// Set the active window size.
    pub fn with_active_window(mut self, active_window: usize) -> Self {
        self.active_window = active_window;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.active_window == 0 {
            return Err(DirectorError::InvalidConfig(
                "knowledge.active_window must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Append-only record of lessons, insertion order preserved.
#[derive(Debug, Clone, Default)]
pub struct LessonStore {
    lessons: Vec<Lesson>,
    texts: HashSet<String>,
    active_window: usize,
}

impl LessonStore {
    /// Create an empty store with the given active window size.
    pub fn new(config: &KnowledgeConfig) -> Self {
        Self {
            lessons: Vec::new(),
            texts: HashSet::new(),
            active_window: config.active_window,
        }
    }

    /// Append a lesson unless its text is already in the history.
    ///
    /// Returns `true` when the lesson was appended. Duplicates are ignored.
    pub fn add(&mut self, text: &str) -> bool {
        if self.texts.contains(text) {
            return false;
        }
        self.texts.insert(text.to_string());
        self.lessons.push(Lesson::new(text));
        true
    }

    /// The `k` most recently added lesson texts, oldest first.
    ///
    /// Returns fewer than `k` entries when the history is shorter.
    pub fn active_window(&self, k: usize) -> Vec<String> {
        let start = self.lessons.len().saturating_sub(k);
        self.lessons[start..].iter().map(|l| l.text.clone()).collect()
    }

    /// The configured active window, oldest first.
    pub fn active(&self) -> Vec<String> {
        self.active_window(self.active_window)
    }

    pub fn contains(&self, text: &str) -> bool {
        self.texts.contains(text)
    }

    /// Full history, oldest first.
    pub fn history(&self) -> &[Lesson] {
        &self.lessons
    }

    pub fn len(&self) -> usize {
        self.lessons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }

    pub fn window_size(&self) -> usize {
        self.active_window
    }
}
