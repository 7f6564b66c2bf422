//! Director - a persistent coordinator supervising disposable workers
//!
//! Director implements the "director / actor" pattern: one long-lived
//! director accumulates lessons across shifts of short-lived workers, and
//! canary workers guard against lessons that turn out to be harmful by
//! triggering an automatic rollback.

pub mod director;
pub mod error;
pub mod id;
pub mod knowledge;
pub mod rollback;
pub mod scheduler;
pub mod worker;

pub use director::{Director, DirectorConfig, DirectorSnapshot, Mood, ShiftReport};
pub use error::{DirectorError, Result};
