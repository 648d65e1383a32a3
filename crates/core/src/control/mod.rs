//! Fleet-wide batch controls.
//!
//! - **Pause/resume**: one batch call per endpoint covering every torrent
//! - **Filters**: download the IP filter list and make endpoints reload it
//! - **Gate**: post-round health check driving the exit code

pub mod filters;
mod gate;
mod pause;

pub use filters::FilterOutcome;
pub use gate::{check as check_gate, GateOutcome, GateVerdict};
pub use pause::{apply as apply_pause, PauseAction, PauseOutcome};
