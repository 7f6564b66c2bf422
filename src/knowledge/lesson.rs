//! Lesson record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A discovered improvement. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    /// Lesson text, unique within a store
    pub text: String,
    /// When the lesson was committed
    pub discovered_at: DateTime<Utc>,
}

impl Lesson {
    /// Create a lesson stamped with the current time
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            discovered_at: Utc::now(),
        }
    }
}
