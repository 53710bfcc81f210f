//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `NodeState`: Lifecycle of an individual URL node (discovered, queued, fetching, settled, errored)
//! - `Throttle`: Per-worker request pacing

mod node_state;
mod throttle;

pub use node_state::{InvalidTransition, NodeState, SettleStatus};
pub use throttle::Throttle;
