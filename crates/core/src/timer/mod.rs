//! Deadline timer for the payment window.
//!
//! One countdown per reservation attempt, fully cancelable, sole authority
//! for the expired transition.

mod deadline;

pub use deadline::{DeadlineTimer, TimerError};
