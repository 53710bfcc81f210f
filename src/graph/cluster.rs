//! Similar-URL clustering
//!
//! URLs are similar when they differ only in their query string, i.e. they
//! share a path key (scheme, host, port and path). Clustering is a reporting
//! aid; it never changes which URLs are fetched.

use crate::url::NormalizedUrl;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// A group of two or more URLs sharing a path key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimilarityCluster {
    pub id: usize,
    pub path_key: String,
    /// First member seen during the crawl
    pub representative: String,
    /// All members in discovery order, representative first
    pub members: Vec<String>,
}

impl SimilarityCluster {
    /// Members other than the representative
    pub fn similar(&self) -> &[String] {
        &self.members[1..]
    }
}

/// Incremental clusterer fed in discovery order
#[derive(Debug, Default)]
pub struct Clusterer {
    groups: Vec<(String, Vec<String>)>,
    index: HashMap<String, usize>,
}

impl Clusterer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a URL to its path-key group
    pub fn add(&mut self, url: &NormalizedUrl) {
        match self.index.get(url.path_key()) {
            Some(&i) => self.groups[i].1.push(url.as_str().to_string()),
            None => {
                self.index
                    .insert(url.path_key().to_string(), self.groups.len());
                self.groups
                    .push((url.path_key().to_string(), vec![url.as_str().to_string()]));
            }
        }
    }

    /// Returns the groups with at least two members, numbered in order of
    /// their first member's discovery
    pub fn clusters(&self) -> Vec<SimilarityCluster> {
        self.groups
            .iter()
            .filter(|(_, members)| members.len() > 1)
            .enumerate()
            .map(|(id, (path_key, members))| SimilarityCluster {
                id,
                path_key: path_key.clone(),
                representative: members[0].clone(),
                members: members.clone(),
            })
            .collect()
    }
}

/// Groups URLs by path key
///
/// Every URL appears in exactly one group; singleton groups are included.
/// Members keep their input order.
pub fn cluster<'a, I>(urls: I) -> BTreeMap<String, Vec<String>>
where
    I: IntoIterator<Item = &'a NormalizedUrl>,
{
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for url in urls {
        groups
            .entry(url.path_key().to_string())
            .or_default()
            .push(url.as_str().to_string());
    }
    groups
}
