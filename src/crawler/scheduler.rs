//! Frontier queue shared by the fetch workers
//!
//! The frontier only tracks work; it does not decide what is in scope. The
//! coordinator pushes entries after its discovery checks and reports back
//! when a dispatched entry is finished, which is how the pool knows the
//! crawl has drained.

use std::collections::VecDeque;
use url::Url;

/// A URL waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: Url,
    /// Normalized identity of the URL
    pub key: String,
    pub depth: u32,
    pub parent: Option<String>,
    /// Whether the page's own links may be followed
    pub expandable: bool,
    /// Redirect hops already taken to reach this URL
    pub redirects: u32,
}

/// What a worker should do next
#[derive(Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Fetch this entry
    Ready(FrontierEntry),
    /// Nothing queued, but in-flight work may still add entries
    Wait,
    /// The crawl is finished or has been stopped
    Done,
}

/// FIFO frontier with in-flight accounting
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    in_flight: usize,
    dispatched: usize,
    closed: bool,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an entry
    ///
    /// Returns false if the frontier has been closed; the entry is dropped.
    pub fn push(&mut self, entry: FrontierEntry) -> bool {
        if self.closed {
            return false;
        }
        tracing::trace!("Queued {} at depth {}", entry.key, entry.depth);
        self.queue.push_back(entry);
        true
    }

    /// Takes the next entry for a worker
    ///
    /// The crawl is done once the queue is empty and nothing is in flight,
    /// or as soon as the frontier is closed.
    pub fn next(&mut self) -> Dispatch {
        if self.closed {
            return Dispatch::Done;
        }

        match self.queue.pop_front() {
            Some(entry) => {
                self.in_flight += 1;
                self.dispatched += 1;
                Dispatch::Ready(entry)
            }
            None if self.in_flight > 0 => Dispatch::Wait,
            None => Dispatch::Done,
        }
    }

    /// Marks one dispatched entry as finished
    pub fn complete(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Stops dispatching; queued entries stay where they are
    pub fn close(&mut self) {
        if !self.closed {
            tracing::debug!(
                "Frontier closed with {} queued and {} in flight",
                self.queue.len(),
                self.in_flight
            );
        }
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of queued entries
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Total number of entries handed to workers
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }
}
