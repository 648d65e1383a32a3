//! One pass of the selected fleet operations.

mod runner;
mod types;

pub use runner::run_round;
pub use types::{Operations, RoundReport, RoundSettings};
