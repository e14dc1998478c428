//! Build steps: decoding action logs and tracking step status.
//!
//! - `decoder` turns one action-log document into pending `Step`s
//! - `tracker` keeps the ordered sequence of every step seen in a session

mod decoder;
mod tracker;
mod types;

pub use decoder::{ActionLogDecoder, decode_action_log};
pub use tracker::StepTracker;
pub use types::{ActionBatch, Step, StepKind, StepStatus};
