//! Knowledge module
//!
//! The director's accumulated lessons:
//! - Lesson: an immutable, timestamped improvement discovered by a worker
//! - LessonStore: append-only history with a bounded active window

mod lesson;
mod store;

pub use lesson::Lesson;
pub use store::{KnowledgeConfig, LessonStore};
