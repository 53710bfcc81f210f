/// Node lifecycle states for tracking crawl progress
///
/// Every URL node moves forward through these states exactly once:
/// `Discovered -> Queued -> Fetching -> Settled | Errored`, with policy
/// skips settling a node early.
use crate::FetchErrorKind;
use serde::Serialize;
use std::fmt;

/// Why a node stopped moving through the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "code", rename_all = "snake_case")]
pub enum SettleStatus {
    /// The resource was fetched and answered with this HTTP status
    Http(u16),
    /// An anchor pointing outside the seed's host; recorded, never fetched
    OutOfScope,
    /// robots.txt forbids fetching this URL
    RobotsDisallowed,
    /// Discovered beyond the maximum depth
    DepthExceeded,
}

/// Represents the current state of a node in the crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum NodeState {
    // ===== Active States =====
    /// Node has been recorded but no scheduling decision has been made
    Discovered,

    /// Node is in the frontier waiting for a worker
    Queued,

    /// A worker is fetching the node
    Fetching,

    // ===== Terminal States =====
    /// Node has a final outcome
    Settled(SettleStatus),

    /// The fetch failed without an HTTP response
    Errored(FetchErrorKind),
}

impl NodeState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled(_) | Self::Errored(_))
    }

    /// Returns true while the node is still waiting for an outcome
    pub fn is_pending(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns the HTTP status if the node was fetched
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Settled(SettleStatus::Http(code)) => Some(*code),
            _ => None,
        }
    }

    /// Checks if a transition from this state to another is valid
    ///
    /// # Valid Transitions
    ///
    /// - Discovered → Queued, Settled(OutOfScope), Settled(DepthExceeded)
    /// - Queued → Fetching, Settled(RobotsDisallowed)
    /// - Fetching → Settled(Http), Errored
    ///
    /// Terminal states never transition.
    pub fn can_transition_to(&self, target: &NodeState) -> bool {
        use NodeState::*;
        use SettleStatus::*;

        match (self, target) {
            (Discovered, Queued) => true,
            (Discovered, Settled(OutOfScope)) => true,
            (Discovered, Settled(DepthExceeded)) => true,

            (Queued, Fetching) => true,
            (Queued, Settled(RobotsDisallowed)) => true,

            (Fetching, Settled(Http(_))) => true,
            (Fetching, Errored(_)) => true,

            _ => false,
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discovered => write!(f, "discovered"),
            Self::Queued => write!(f, "queued"),
            Self::Fetching => write!(f, "fetching"),
            Self::Settled(SettleStatus::Http(code)) => write!(f, "HTTP {}", code),
            Self::Settled(SettleStatus::OutOfScope) => write!(f, "out of scope"),
            Self::Settled(SettleStatus::RobotsDisallowed) => write!(f, "disallowed by robots.txt"),
            Self::Settled(SettleStatus::DepthExceeded) => write!(f, "depth exceeded"),
            Self::Errored(kind) => write!(f, "error: {}", kind),
        }
    }
}

/// A rejected lifecycle transition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid state transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: NodeState,
    pub to: NodeState,
}
