//! Crawl report aggregation
//!
//! The report is computed from a frozen [`SiteGraph`] and never looks at
//! anything else, so it can be rebuilt from an exported graph at any time.

use crate::graph::{ResourceKind, SiteGraph};
use crate::state::{NodeState, SettleStatus};
use crate::FetchErrorKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Coarse outcome bucket used for report counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    /// 1xx and 2xx responses
    Success,
    Redirect,
    ClientError,
    ServerError,
    /// No HTTP response at all
    Errored,
    RobotsDisallowed,
    OutOfScope,
    DepthExceeded,
    /// Never reached a terminal state (cancelled crawls only)
    Pending,
}

impl StatusClass {
    pub fn of(state: &NodeState) -> Self {
        match state {
            NodeState::Settled(SettleStatus::Http(code)) => match *code {
                300..=399 => Self::Redirect,
                400..=499 => Self::ClientError,
                500..=u16::MAX => Self::ServerError,
                _ => Self::Success,
            },
            NodeState::Settled(SettleStatus::RobotsDisallowed) => Self::RobotsDisallowed,
            NodeState::Settled(SettleStatus::OutOfScope) => Self::OutOfScope,
            NodeState::Settled(SettleStatus::DepthExceeded) => Self::DepthExceeded,
            NodeState::Errored(_) => Self::Errored,
            NodeState::Discovered | NodeState::Queued | NodeState::Fetching => Self::Pending,
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "Success (2xx)",
            Self::Redirect => "Redirect (3xx)",
            Self::ClientError => "Client error (4xx)",
            Self::ServerError => "Server error (5xx)",
            Self::Errored => "Fetch error",
            Self::RobotsDisallowed => "Disallowed by robots.txt",
            Self::OutOfScope => "Out of scope",
            Self::DepthExceeded => "Depth exceeded",
            Self::Pending => "Pending",
        };
        f.write_str(s)
    }
}

/// Why a URL is listed as an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum ErrorKind {
    Fetch(FetchErrorKind),
    Http(u16),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(kind) => write!(f, "{}", kind),
            Self::Http(code) => write!(f, "HTTP {}", code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportedError {
    pub url: String,
    pub kind: ErrorKind,
}

/// Summary statistics for a crawl
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlReport {
    pub seed: String,
    pub total_unique: u64,
    pub total_edges: u64,
    pub by_kind: BTreeMap<ResourceKind, u64>,
    pub by_status: BTreeMap<StatusClass, u64>,
    /// Failed URLs in discovery order
    pub errors: Vec<ReportedError>,
    pub cluster_count: u64,
    /// URLs folded into a cluster behind its representative
    pub similar_count: u64,
    pub max_depth_reached: u32,
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl CrawlReport {
    pub fn count(&self, class: StatusClass) -> u64 {
        self.by_status.get(&class).copied().unwrap_or(0)
    }

    /// Calculates the fetch success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        let fetched: u64 = self
            .by_status
            .iter()
            .filter(|(class, _)| {
                matches!(
                    class,
                    StatusClass::Success
                        | StatusClass::Redirect
                        | StatusClass::ClientError
                        | StatusClass::ServerError
                        | StatusClass::Errored
                )
            })
            .map(|(_, count)| count)
            .sum();

        if fetched == 0 {
            0.0
        } else {
            (self.count(StatusClass::Success) + self.count(StatusClass::Redirect)) as f64
                / fetched as f64
                * 100.0
        }
    }
}

/// Aggregates a finished graph into a report
pub fn summarize(graph: &SiteGraph) -> CrawlReport {
    let mut report = CrawlReport {
        seed: graph.seed.clone(),
        total_unique: graph.nodes.len() as u64,
        total_edges: graph.edges.len() as u64,
        cluster_count: graph.clusters.len() as u64,
        similar_count: graph
            .clusters
            .iter()
            .map(|c| c.similar().len() as u64)
            .sum(),
        cancelled: graph.cancelled,
        duration_ms: graph.duration().num_milliseconds().max(0) as u64,
        ..Default::default()
    };

    for node in &graph.nodes {
        *report.by_kind.entry(node.kind).or_insert(0) += 1;
        *report.by_status.entry(StatusClass::of(&node.state)).or_insert(0) += 1;

        // Policy skips and pending nodes were never fetched
        if matches!(
            node.state,
            NodeState::Settled(SettleStatus::Http(_)) | NodeState::Errored(_)
        ) {
            report.max_depth_reached = report.max_depth_reached.max(node.depth);
        }

        let error = match node.state {
            NodeState::Errored(kind) => Some(ErrorKind::Fetch(kind)),
            NodeState::Settled(SettleStatus::Http(code)) if code >= 400 => {
                Some(ErrorKind::Http(code))
            }
            _ => None,
        };
        if let Some(kind) = error {
            report.errors.push(ReportedError {
                url: node.url.clone(),
                kind,
            });
        }
    }

    report
}
