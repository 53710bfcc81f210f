//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the worker pool that drives a crawl:
//! - Fetching the seed first, failing fast if the site is unreachable
//! - Managing the shared frontier and the visited set (the graph index)
//! - Coordinating robots checks, fetching, link extraction and discovery
//! - Cooperative cancellation
//! - Freezing the graph and building the report
//!
//! All mutable crawl state lives behind a single lock owned by one
//! [`Coordinator`] run, so the check-then-insert on discovery is atomic.

use crate::config::{validate, Config, QueryMode, ScanDepth};
use crate::crawler::fetcher::{build_http_client, FetchResult, Fetcher};
use crate::crawler::parser::LinkExtractor;
use crate::crawler::scheduler::{Dispatch, Frontier, FrontierEntry};
use crate::graph::{EdgeKind, GraphBuilder, LinkKind, ResourceKind, ResponseMeta, SiteGraph};
use crate::output::{summarize, CrawlEvent, CrawlReport};
use crate::robots::RobotsGate;
use crate::state::{InvalidTransition, NodeState, SettleStatus, Throttle};
use crate::url::{normalize, same_host, NormalizedUrl};
use crate::{CrawlError, FetchError, FetchErrorKind};
use reqwest::redirect::Policy;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Everything a finished crawl produced
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub graph: SiteGraph,
    pub report: CrawlReport,
}

/// Main crawler coordinator structure
///
/// # Example
///
/// ```no_run
/// use sitegraph::config::{Config, ScanDepth};
/// use sitegraph::crawler::Coordinator;
///
/// # async fn example() -> Result<(), sitegraph::CrawlError> {
/// let outcome = Coordinator::new(Config::default(), "https://example.com/", ScanDepth::Full)?
///     .run()
///     .await?;
/// println!("{} URLs found", outcome.report.total_unique);
/// # Ok(())
/// # }
/// ```
pub struct Coordinator {
    config: Config,
    seed: NormalizedUrl,
    max_depth: u32,
    events: Option<UnboundedSender<CrawlEvent>>,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `seed` - Absolute URL the crawl starts from
    /// * `depth` - Scan preset bounding the crawl depth
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(CrawlError)` - The configuration is invalid or the seed cannot be normalized
    pub fn new(config: Config, seed: &str, depth: ScanDepth) -> Result<Self, CrawlError> {
        validate(&config)?;

        let seed_url = normalize(seed, None, config.normalize.query_mode).map_err(|source| {
            CrawlError::InvalidSeed {
                url: seed.to_string(),
                source,
            }
        })?;

        Ok(Self {
            config,
            seed: seed_url,
            max_depth: depth.max_depth(),
            events: None,
            cancel: CancellationToken::new(),
        })
    }

    /// Sends progress events to `events` while the crawl runs
    pub fn with_events(mut self, events: UnboundedSender<CrawlEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Uses `token` to stop the crawl early
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops this crawl when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn seed(&self) -> &NormalizedUrl {
        &self.seed
    }

    /// Runs the crawl to completion or cancellation
    ///
    /// 1. Fetch the seed on its own; a timeout or connection error there is fatal
    /// 2. Spawn `concurrency` workers sharing the frontier
    /// 3. Each worker loops: take entry → robots check → throttle → fetch →
    ///    extract links → discover children; a redirect to a different URL
    ///    queues the target like a discovered link
    /// 4. When the frontier drains (or the crawl is cancelled) freeze the graph
    ///    and summarize it
    ///
    /// Cancellation is not an error: the partial graph is returned with
    /// `cancelled` set, and URLs that were still queued stay pending.
    pub async fn run(self) -> Result<CrawlOutcome, CrawlError> {
        let Coordinator {
            config,
            seed,
            max_depth,
            events,
            cancel,
        } = self;

        tracing::info!(
            "Starting crawl of {} (max depth {}, {} workers)",
            seed,
            max_depth,
            config.crawler.concurrency
        );

        let fetcher = Fetcher::new(&config)?;
        let robots_client = build_http_client(&config, Policy::limited(5))?;
        let robots = RobotsGate::new(
            robots_client,
            config.user_agent.crawler_name.clone(),
            config.robots.policy,
        );

        let ctx = Arc::new(CrawlContext {
            state: Mutex::new(CrawlState {
                graph: GraphBuilder::new(&seed, max_depth),
                frontier: Frontier::new(),
            }),
            notify: Notify::new(),
            fetcher,
            robots,
            events,
            cancel,
            seed_url: seed.url().clone(),
            seed_host: seed.host().to_string(),
            max_depth,
            max_redirects: config.crawler.max_redirects,
            query_mode: config.normalize.query_mode,
            request_delay: Duration::from_millis(config.crawler.request_delay_ms),
        });

        {
            let mut state = ctx.lock();
            state
                .graph
                .add_node(&seed, ResourceKind::Html, 0, None);
            ctx.apply(&mut state.graph, seed.as_str(), NodeState::Queued);
            state.frontier.push(FrontierEntry {
                url: seed.url().clone(),
                key: seed.as_str().to_string(),
                depth: 0,
                parent: None,
                expandable: true,
                redirects: 0,
            });
        }

        if !ctx.cancel.is_cancelled() {
            let dispatch = ctx.lock().frontier.next();
            if let Dispatch::Ready(entry) = dispatch {
                let mut throttle = Throttle::new(ctx.request_delay);
                ctx.process(entry, &mut throttle).await;
            }

            let seed_state = ctx.lock().graph.node(seed.as_str()).map(|node| node.state);
            if let Some(NodeState::Errored(
                kind @ (FetchErrorKind::Timeout | FetchErrorKind::ConnectionError),
            )) = seed_state
            {
                tracing::error!("Seed {} is unreachable: {}", seed, kind);
                return Err(CrawlError::SeedUnreachable {
                    url: seed.to_string(),
                    kind,
                });
            }

            let mut workers = JoinSet::new();
            for id in 0..config.crawler.concurrency as usize {
                workers.spawn(ctx.clone().worker(id));
            }
            while let Some(joined) = workers.join_next().await {
                joined?;
            }
        } else {
            tracing::info!("Crawl cancelled before the seed was fetched");
        }

        let graph = {
            let mut state = ctx.lock();
            state.frontier.close();
            state.graph.freeze(ctx.cancel.is_cancelled())
        };
        let report = summarize(&graph);

        tracing::info!(
            "Crawl {}: {} URLs, {} edges, {} errors, {} clusters in {}ms",
            if graph.cancelled { "cancelled" } else { "completed" },
            report.total_unique,
            report.total_edges,
            report.errors.len(),
            report.cluster_count,
            report.duration_ms
        );

        Ok(CrawlOutcome { graph, report })
    }
}

/// Runs a complete crawl with default wiring
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `seed` - Absolute URL the crawl starts from
/// * `depth` - Scan preset bounding the crawl depth
pub async fn crawl(config: Config, seed: &str, depth: ScanDepth) -> Result<CrawlOutcome, CrawlError> {
    Coordinator::new(config, seed, depth)?.run().await
}

struct CrawlState {
    graph: GraphBuilder,
    frontier: Frontier,
}

/// State shared by all workers of one run
struct CrawlContext {
    state: Mutex<CrawlState>,
    /// Signalled whenever work is queued or an in-flight entry finishes
    notify: Notify,
    fetcher: Fetcher,
    robots: RobotsGate,
    events: Option<UnboundedSender<CrawlEvent>>,
    cancel: CancellationToken,
    seed_url: Url,
    seed_host: String,
    max_depth: u32,
    max_redirects: u32,
    query_mode: QueryMode,
    request_delay: Duration,
}

impl CrawlContext {
    fn lock(&self) -> MutexGuard<'_, CrawlState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn worker(self: Arc<Self>, id: usize) {
        let mut throttle = Throttle::new(self.request_delay);

        loop {
            if self.cancel.is_cancelled() {
                self.lock().frontier.close();
            }

            // Register for wakeups before releasing the lock so a completion
            // between next() and the wait is not missed
            let (dispatch, notified) = {
                let mut state = self.lock();
                (state.frontier.next(), self.notify.notified())
            };

            match dispatch {
                Dispatch::Ready(entry) => self.process(entry, &mut throttle).await,
                Dispatch::Wait => {
                    tokio::select! {
                        _ = notified => {}
                        _ = self.cancel.cancelled() => {}
                    }
                }
                Dispatch::Done => break,
            }
        }

        tracing::trace!(
            "Worker {} finished after {} requests",
            id,
            throttle.request_count()
        );
    }

    /// Processes a single frontier entry
    async fn process(&self, entry: FrontierEntry, throttle: &mut Throttle) {
        if !self.robots.allowed(&entry.url).await {
            tracing::info!("URL {} disallowed by robots.txt", entry.url);
            {
                let mut state = self.lock();
                self.apply(
                    &mut state.graph,
                    &entry.key,
                    NodeState::Settled(SettleStatus::RobotsDisallowed),
                );
                self.finish(&mut state);
            }
            self.notify.notify_waiters();
            return;
        }

        {
            let mut state = self.lock();
            self.apply(&mut state.graph, &entry.key, NodeState::Fetching);
        }
        self.emit(CrawlEvent::FetchStarted {
            url: entry.key.clone(),
        });
        tracing::debug!("Fetching {} (depth {})", entry.url, entry.depth);

        let started = Instant::now();
        match self.fetch_node(&entry, throttle).await {
            Ok((result, hops)) => self.handle_fetched(&entry, result, hops),
            Err(e) => {
                tracing::warn!("{}", e);
                let kind = e.kind();
                let mut state = self.lock();
                let outcome = state
                    .graph
                    .record_error(&entry.key, kind, started.elapsed());
                self.report(&entry.key, outcome, NodeState::Errored(kind));
                self.finish(&mut state);
            }
        }

        self.notify.notify_waiters();
    }

    /// Fetches the entry's URL, following redirects that stay on the same node
    ///
    /// Every request waits for the worker's throttle. A redirect such as
    /// `/docs` to `/docs/` normalizes back to the entry's own key and is
    /// followed here; any other redirect is returned for
    /// [`Self::follow_redirect`]. Also returns the hop count so far.
    async fn fetch_node(
        &self,
        entry: &FrontierEntry,
        throttle: &mut Throttle,
    ) -> Result<(FetchResult, u32), FetchError> {
        let mut url = entry.url.clone();
        let mut hops = entry.redirects;
        let mut seen = HashSet::from([url.clone()]);

        loop {
            let crawl_delay = self.robots.crawl_delay(&url).await;
            throttle.wait_turn(crawl_delay).await;

            let result = self.fetcher.fetch(&url).await?;
            let Some(next) = self.same_node_redirect(&result, &entry.key) else {
                return Ok((result, hops));
            };

            if hops >= self.max_redirects || !seen.insert(next.clone()) {
                return Err(FetchError::TooManyRedirects {
                    url: entry.url.to_string(),
                });
            }
            if !self.robots.allowed(&next).await {
                tracing::info!("Redirect to {} disallowed by robots.txt", next);
                return Ok((result, hops));
            }

            hops += 1;
            url = next;
        }
    }

    fn same_node_redirect(&self, result: &FetchResult, key: &str) -> Option<Url> {
        let location = result.location.as_ref()?;
        let target = normalize(location.as_str(), None, self.query_mode).ok()?;
        (target.as_str() == key).then(|| location.clone())
    }

    /// Records a response and discovers the page's links
    ///
    /// Link extraction happens before the lock is taken; discovery of the
    /// whole batch happens under one lock.
    fn handle_fetched(&self, entry: &FrontierEntry, result: FetchResult, hops: u32) {
        if !result.is_success() {
            tracing::debug!("HTTP {} for {}", result.status, entry.url);
        }

        let target = result
            .location
            .as_ref()
            .and_then(|location| normalize(location.as_str(), None, self.query_mode).ok())
            .filter(|target| target.as_str() != entry.key);
        if let Some(target) = target {
            self.follow_redirect(entry, &result, target, hops);
            return;
        }

        let expand = entry.expandable
            && entry.depth < self.max_depth
            && result.kind == ResourceKind::Html
            && result.is_success()
            && same_host(&result.url, &self.seed_url);

        let links = if expand {
            self.extract(&result)
        } else {
            Vec::new()
        };

        let meta = ResponseMeta {
            status: result.status,
            content_type: result.content_type.clone(),
            kind: result.kind,
            size: Some(result.size),
            elapsed: result.elapsed,
        };

        let mut state = self.lock();
        let outcome = state.graph.record_response(&entry.key, meta);
        self.report(
            &entry.key,
            outcome,
            NodeState::Settled(SettleStatus::Http(result.status)),
        );

        if expand {
            self.discover(&mut state, &entry.key, entry.depth, links);
        }

        self.finish(&mut state);
    }

    /// Settles a redirecting entry and routes its target through discovery
    ///
    /// The target takes the entry's depth, parent and expandability, and is
    /// fetched later by whichever worker picks it up, so robots rules and
    /// pacing apply to it like to any other URL.
    ///
    /// | Condition | Outcome |
    /// |-----------|---------|
    /// | `max-redirects` hops already taken | Errored(TooManyRedirects) |
    /// | Target already known | Redirect edge only |
    /// | Page redirected to another host | Settled(OutOfScope) |
    /// | Anything else | Queued |
    fn follow_redirect(
        &self,
        entry: &FrontierEntry,
        result: &FetchResult,
        target: NormalizedUrl,
        hops: u32,
    ) {
        let mut state = self.lock();

        if hops >= self.max_redirects {
            tracing::warn!("Too many redirects for {}", entry.url);
            let kind = FetchErrorKind::TooManyRedirects;
            let outcome = state.graph.record_error(&entry.key, kind, result.elapsed);
            self.report(&entry.key, outcome, NodeState::Errored(kind));
            self.finish(&mut state);
            return;
        }

        let outcome = state
            .graph
            .record_redirect(&entry.key, result.status, result.elapsed);
        self.report(
            &entry.key,
            outcome,
            NodeState::Settled(SettleStatus::Http(result.status)),
        );
        state
            .graph
            .add_edge(&entry.key, target.as_str(), EdgeKind::Redirect);

        let kind = state
            .graph
            .node(&entry.key)
            .map_or(ResourceKind::Other, |node| node.kind);
        let is_new = state
            .graph
            .add_node(&target, kind, entry.depth, entry.parent.as_deref());

        if !is_new {
            tracing::debug!("{} redirected to known URL {}", entry.key, target);
        } else if entry.expandable && target.host() != self.seed_host {
            tracing::debug!("{} redirected out of scope to {}", entry.key, target);
            self.apply(
                &mut state.graph,
                target.as_str(),
                NodeState::Settled(SettleStatus::OutOfScope),
            );
        } else {
            tracing::debug!("{} redirected to {}", entry.key, target);
            self.apply(&mut state.graph, target.as_str(), NodeState::Queued);
            state.frontier.push(FrontierEntry {
                key: target.as_str().to_string(),
                url: target.into_url(),
                depth: entry.depth,
                parent: entry.parent.clone(),
                expandable: entry.expandable,
                redirects: hops + 1,
            });
        }

        self.finish(&mut state);
    }

    /// Extracts and normalizes the links of an HTML response
    fn extract(&self, result: &FetchResult) -> Vec<(NormalizedUrl, LinkKind)> {
        let Some(body) = result.body.as_deref() else {
            return Vec::new();
        };

        let extractor = LinkExtractor::parse(body);
        extractor
            .links()
            .filter_map(
                |link| match normalize(&link.href, Some(&result.url), self.query_mode) {
                    Ok(url) => Some((url, link.kind)),
                    Err(e) => {
                        tracing::debug!(
                            "Skipping link '{}' on {}: {}",
                            link.href,
                            result.url,
                            e
                        );
                        None
                    }
                },
            )
            .collect()
    }

    /// Records links found on `source` and queues the new ones that are in scope
    ///
    /// # Discovery Rules
    ///
    /// | Condition | Outcome |
    /// |-----------|---------|
    /// | Already known | Edge only |
    /// | Deeper than max depth | Settled(DepthExceeded) |
    /// | Anchor to another host | Settled(OutOfScope) |
    /// | Anything else | Queued |
    fn discover(
        &self,
        state: &mut CrawlState,
        source: &str,
        source_depth: u32,
        links: Vec<(NormalizedUrl, LinkKind)>,
    ) {
        let depth = source_depth + 1;

        for (url, kind) in links {
            state
                .graph
                .add_edge(source, url.as_str(), EdgeKind::Link(kind));

            let is_new =
                state
                    .graph
                    .add_node(&url, ResourceKind::from_link_kind(kind), depth, Some(source));
            if !is_new {
                continue;
            }

            if depth > self.max_depth {
                self.apply(
                    &mut state.graph,
                    url.as_str(),
                    NodeState::Settled(SettleStatus::DepthExceeded),
                );
            } else if kind.is_expandable() && url.host() != self.seed_host {
                tracing::debug!("Out of scope: {}", url);
                self.apply(
                    &mut state.graph,
                    url.as_str(),
                    NodeState::Settled(SettleStatus::OutOfScope),
                );
            } else {
                self.apply(&mut state.graph, url.as_str(), NodeState::Queued);
                state.frontier.push(FrontierEntry {
                    key: url.as_str().to_string(),
                    url: url.into_url(),
                    depth,
                    parent: Some(source.to_string()),
                    expandable: kind.is_expandable(),
                    redirects: 0,
                });
            }
        }
    }

    /// Marks the current entry done and publishes progress
    fn finish(&self, state: &mut CrawlState) {
        state.frontier.complete();

        let (settled, errored, _) = state.graph.progress();
        self.emit(CrawlEvent::Progress {
            discovered: state.graph.len(),
            settled,
            errored,
            queued: state.frontier.len(),
            in_flight: state.frontier.in_flight(),
        });
    }

    fn apply(&self, graph: &mut GraphBuilder, url: &str, to: NodeState) {
        let outcome = graph.transition(url, to);
        self.report(url, outcome, to);
    }

    /// Logs a rejected transition, or emits the event for an applied terminal one
    fn report(&self, url: &str, outcome: Result<(), InvalidTransition>, to: NodeState) {
        if let Err(e) = outcome {
            tracing::warn!("{} for {}", e, url);
            return;
        }

        match to {
            NodeState::Settled(status) => self.emit(CrawlEvent::Settled {
                url: url.to_string(),
                status,
            }),
            NodeState::Errored(kind) => self.emit(CrawlEvent::Errored {
                url: url.to_string(),
                kind,
            }),
            _ => {}
        }
    }

    fn emit(&self, event: CrawlEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is listening
            let _ = events.send(event);
        }
    }
}
