//! Site graph model
//!
//! The crawl accumulates nodes and edges in a [`GraphBuilder`] and freezes it
//! into an immutable [`SiteGraph`] when the crawl ends. The frozen graph is
//! what gets handed to renderers and exporters.

mod cluster;

pub use cluster::{cluster, Clusterer, SimilarityCluster};

use crate::state::{InvalidTransition, NodeState, SettleStatus};
use crate::url::NormalizedUrl;
use crate::FetchErrorKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// What kind of resource a URL serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Html,
    Image,
    Script,
    Stylesheet,
    Other,
}

impl ResourceKind {
    /// Classifies a resource from its `Content-Type` header
    ///
    /// Parameters such as `charset` are ignored. A missing header is `Other`.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return Self::Other;
        };
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match mime.as_str() {
            "text/html" | "application/xhtml+xml" => Self::Html,
            "application/javascript"
            | "text/javascript"
            | "application/x-javascript"
            | "application/ecmascript" => Self::Script,
            "text/css" => Self::Stylesheet,
            m if m.starts_with("image/") => Self::Image,
            _ => Self::Other,
        }
    }

    /// Best guess from the tag that referenced the URL, used until it is fetched
    pub fn from_link_kind(kind: LinkKind) -> Self {
        match kind {
            LinkKind::Anchor => Self::Html,
            LinkKind::Image => Self::Image,
            LinkKind::Script => Self::Script,
            LinkKind::Stylesheet => Self::Stylesheet,
        }
    }
}

/// Which markup construct produced a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Anchor,
    Image,
    Script,
    Stylesheet,
}

impl LinkKind {
    /// Only anchors lead to pages whose own links are followed; the other
    /// kinds reference leaf resources
    pub fn is_expandable(self) -> bool {
        matches!(self, Self::Anchor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Link(LinkKind),
    /// Synthetic edge from a redirecting URL to its final target
    Redirect,
}

/// A directed reference between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
}

/// A discovered URL and everything learned about it
#[derive(Debug, Clone, Serialize)]
pub struct UrlNode {
    /// Normalized URL; the node's identity
    pub url: String,
    pub host: String,
    pub path_key: String,
    pub kind: ResourceKind,
    pub state: NodeState,
    pub content_type: Option<String>,
    /// Body size in bytes
    pub size: Option<u64>,
    pub depth: u32,
    /// The node whose page first linked here
    pub parent: Option<String>,
    pub cluster_id: Option<usize>,
    pub discovered_at: DateTime<Utc>,
    pub elapsed_ms: Option<u64>,
}

/// Response details recorded when a fetch settles a node
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub status: u16,
    pub content_type: Option<String>,
    pub kind: ResourceKind,
    pub size: Option<u64>,
    pub elapsed: Duration,
}

/// Mutable accumulator for a crawl in progress
#[derive(Debug)]
pub struct GraphBuilder {
    seed: String,
    max_depth: u32,
    nodes: Vec<UrlNode>,
    index: HashMap<String, usize>,
    edges: Vec<Edge>,
    edge_set: HashSet<(String, String)>,
    clusterer: Clusterer,
    started_at: DateTime<Utc>,
}

impl GraphBuilder {
    pub fn new(seed: &NormalizedUrl, max_depth: u32) -> Self {
        Self {
            seed: seed.as_str().to_string(),
            max_depth,
            nodes: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
            edge_set: HashSet::new(),
            clusterer: Clusterer::new(),
            started_at: Utc::now(),
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains_key(url)
    }

    pub fn node(&self, url: &str) -> Option<&UrlNode> {
        self.index.get(url).map(|&i| &self.nodes[i])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds a node in the `Discovered` state
    ///
    /// Returns false, leaving the graph untouched, if the URL is already known.
    pub fn add_node(
        &mut self,
        url: &NormalizedUrl,
        kind: ResourceKind,
        depth: u32,
        parent: Option<&str>,
    ) -> bool {
        if self.contains(url.as_str()) {
            return false;
        }

        self.index.insert(url.as_str().to_string(), self.nodes.len());
        self.clusterer.add(url);
        self.nodes.push(UrlNode {
            url: url.as_str().to_string(),
            host: url.host().to_string(),
            path_key: url.path_key().to_string(),
            kind,
            state: NodeState::Discovered,
            content_type: None,
            size: None,
            depth,
            parent: parent.map(str::to_string),
            cluster_id: None,
            discovered_at: Utc::now(),
            elapsed_ms: None,
        });
        true
    }

    /// Records an edge unless the (source, target) pair is already present
    ///
    /// Self-references are ignored. Returns true when the edge was added.
    pub fn add_edge(&mut self, source: &str, target: &str, kind: EdgeKind) -> bool {
        if source == target {
            return false;
        }
        if !self
            .edge_set
            .insert((source.to_string(), target.to_string()))
        {
            return false;
        }
        self.edges.push(Edge {
            source: source.to_string(),
            target: target.to_string(),
            kind,
        });
        true
    }

    /// Moves a node to a new lifecycle state
    ///
    /// The transition is rejected, and the node left unchanged, unless
    /// [`NodeState::can_transition_to`] allows it. Unknown URLs are ignored.
    pub fn transition(&mut self, url: &str, to: NodeState) -> Result<(), InvalidTransition> {
        let Some(&i) = self.index.get(url) else {
            return Ok(());
        };
        let node = &mut self.nodes[i];
        if !node.state.can_transition_to(&to) {
            return Err(InvalidTransition {
                from: node.state,
                to,
            });
        }
        node.state = to;
        Ok(())
    }

    /// Settles a fetching node with the response it received
    pub fn record_response(&mut self, url: &str, meta: ResponseMeta) -> Result<(), InvalidTransition> {
        self.transition(url, NodeState::Settled(SettleStatus::Http(meta.status)))?;
        if let Some(&i) = self.index.get(url) {
            let node = &mut self.nodes[i];
            node.kind = meta.kind;
            node.content_type = meta.content_type;
            node.size = meta.size;
            node.elapsed_ms = Some(meta.elapsed.as_millis() as u64);
        }
        Ok(())
    }

    /// Marks a fetching node as errored
    pub fn record_error(
        &mut self,
        url: &str,
        kind: FetchErrorKind,
        elapsed: Duration,
    ) -> Result<(), InvalidTransition> {
        self.transition(url, NodeState::Errored(kind))?;
        if let Some(&i) = self.index.get(url) {
            self.nodes[i].elapsed_ms = Some(elapsed.as_millis() as u64);
        }
        Ok(())
    }

    /// Settles a fetching node that answered with a redirect
    ///
    /// Content details belong to the redirect target, so only the status and
    /// timing are recorded here.
    pub fn record_redirect(
        &mut self,
        url: &str,
        status: u16,
        elapsed: Duration,
    ) -> Result<(), InvalidTransition> {
        self.transition(url, NodeState::Settled(SettleStatus::Http(status)))?;
        if let Some(&i) = self.index.get(url) {
            self.nodes[i].elapsed_ms = Some(elapsed.as_millis() as u64);
        }
        Ok(())
    }

    /// Counts nodes by coarse progress bucket: (settled, errored, pending)
    pub fn progress(&self) -> (usize, usize, usize) {
        self.nodes
            .iter()
            .fold((0, 0, 0), |(s, e, p), node| match node.state {
                NodeState::Settled(_) => (s + 1, e, p),
                NodeState::Errored(_) => (s, e + 1, p),
                _ => (s, e, p + 1),
            })
    }

    /// Freezes the accumulated data into an immutable graph
    ///
    /// Similarity clusters are computed here and their ids stamped onto
    /// member nodes. The builder is left empty.
    pub fn freeze(&mut self, cancelled: bool) -> SiteGraph {
        let clusters = self.clusterer.clusters();
        for cluster in &clusters {
            for member in &cluster.members {
                if let Some(&i) = self.index.get(member) {
                    self.nodes[i].cluster_id = Some(cluster.id);
                }
            }
        }

        self.edge_set.clear();
        self.clusterer = Clusterer::new();

        SiteGraph {
            seed: self.seed.clone(),
            max_depth: self.max_depth,
            nodes: std::mem::take(&mut self.nodes),
            edges: std::mem::take(&mut self.edges),
            clusters,
            cancelled,
            started_at: self.started_at,
            finished_at: Utc::now(),
            index: std::mem::take(&mut self.index),
        }
    }
}

/// The finished link graph of one crawl
#[derive(Debug, Clone, Serialize)]
pub struct SiteGraph {
    pub seed: String,
    pub max_depth: u32,
    /// Nodes in discovery order; the seed is first
    pub nodes: Vec<UrlNode>,
    /// Edges in discovery order
    pub edges: Vec<Edge>,
    pub clusters: Vec<SimilarityCluster>,
    /// The crawl was stopped before the frontier drained
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl SiteGraph {
    pub fn node(&self, url: &str) -> Option<&UrlNode> {
        self.index.get(url).map(|&i| &self.nodes[i])
    }

    pub fn seed_node(&self) -> Option<&UrlNode> {
        self.node(&self.seed)
    }

    pub fn edges_from<'a>(&'a self, url: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == url)
    }

    pub fn edges_to<'a>(&'a self, url: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == url)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
