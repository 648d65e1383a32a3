//! Fleet-wide search by forum theme or info hash.

mod coordinator;
mod types;

pub use coordinator::{search, SearchOutcome, SEARCH_WORKERS};
pub use types::{SearchJob, SearchMatch, SearchQuery};
