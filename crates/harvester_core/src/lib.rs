//! Harvester core: pure state machines for the place-listing harvest.
//!
//! Nothing in this crate performs I/O. The orchestrator and the panel are
//! both driven through `update(state, msg) -> (state, effects)`; the engine
//! crate executes the returned effects and feeds results back as messages.
mod capture;
mod job;
mod key;
pub mod orchestrator;
pub mod panel;
mod protocol;
mod record;
mod retry;
mod session;
mod snapshot;

pub use capture::CapturePatterns;
pub use job::{
    normalize_url_for_dedupe, DedupeStats, Job, JobCounts, JobQueue, JobStatus,
    DEFAULT_MAX_RETRIES,
};
pub use key::{
    check_keys, keys_agree, DerivedKey, KeyCheck, KeyDeriver, KeyStrategy, PatternStrategy,
};
pub use protocol::{Command, Event, Response};
pub use record::{Coordinates, PlaceId, PlaceRecord};
pub use retry::RetryPolicy;
pub use session::Session;
pub use snapshot::{merge, SessionSnapshot};

/// Identifies one dispatch attempt of the orchestrator. A fresh id is minted
/// for every navigation so late results of an abandoned attempt can be told
/// apart from the current one.
pub type RequestId = u64;
