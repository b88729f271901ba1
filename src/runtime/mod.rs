//! Explicit timers driven by the embedding runtime.

pub mod scheduler;

pub use scheduler::{Scheduler, Task};
