//! Progress events emitted while a crawl runs

use crate::state::SettleStatus;
use crate::FetchErrorKind;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CrawlEvent {
    /// A request for this URL is about to be sent
    FetchStarted { url: String },

    /// A node reached its final status
    Settled { url: String, status: SettleStatus },

    /// A fetch failed without a response
    Errored { url: String, kind: FetchErrorKind },

    /// Snapshot of overall progress, sent after every processed URL
    Progress {
        discovered: usize,
        settled: usize,
        errored: usize,
        queued: usize,
        in_flight: usize,
    },
}
