//! Job queue and worker pool.
//!
//! Jobs are ordered by [`JobPriority`], then by arrival. A [`Worker`] pulls
//! ready jobs, caps how many run at once and how fast they start, and
//! publishes a [`JobEvent`] for every progress update and final outcome.

pub mod error;
pub mod job;
pub mod progress;
pub mod queue;
pub mod worker;

pub use error::*;
pub use job::*;
pub use progress::*;
pub use queue::*;
pub use worker::*;
