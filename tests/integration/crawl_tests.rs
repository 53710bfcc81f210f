//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use sitegraph::config::{Config, QueryMode, ScanDepth};
use sitegraph::crawler::{crawl, Coordinator};
use sitegraph::graph::{EdgeKind, LinkKind, ResourceKind};
use sitegraph::output::{CrawlEvent, ErrorKind, StatusClass};
use sitegraph::state::{NodeState, SettleStatus};
use sitegraph::{CrawlError, FetchErrorKind};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a fast test configuration: no pacing, no retries
fn create_test_config() -> Config {
    let mut config = Config::default();
    config.crawler.concurrency = 4;
    config.crawler.request_delay_ms = 0;
    config.crawler.request_timeout_ms = 2_000;
    config.crawler.max_retries = 0;
    config.user_agent.crawler_name = "TestBot".to_string();
    config
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html")
}

fn at(server: &MockServer, path: &str) -> String {
    format!("{}{}", server.uri(), path)
}

async fn mount_page(server: &MockServer, page: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(html(body))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_depth_one_crawl_dedups_and_scopes() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    let seed_body = format!(
        r#"<html><body>
            <a href="/about">About</a>
            <a href="/about#team">About again</a>
            <a href="{}/about">About, absolute</a>
            <a href="http://other.com/x">Elsewhere</a>
            <img src="/img.png">
        </body></html>"#,
        server.uri()
    );
    mount_page(&server, "/", &seed_body).await;
    mount_page(&server, "/about", r#"<a href="/deeper">Deeper</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/img.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 32], "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = crawl(create_test_config(), &at(&server, "/"), ScanDepth::Quick)
        .await
        .expect("crawl failed");
    let graph = &outcome.graph;

    assert_eq!(graph.nodes.len(), 4);
    assert_eq!(graph.seed_node().unwrap().state, NodeState::Settled(SettleStatus::Http(200)));

    let about = graph.node(&at(&server, "/about")).unwrap();
    assert_eq!(about.depth, 1);
    assert_eq!(about.state.http_status(), Some(200));

    let other = graph.node("http://other.com/x").unwrap();
    assert_eq!(other.state, NodeState::Settled(SettleStatus::OutOfScope));

    let image = graph.node(&at(&server, "/img.png")).unwrap();
    assert_eq!(image.kind, ResourceKind::Image);
    assert_eq!(image.size, Some(32));

    // Pages at the maximum depth are leaves
    assert!(graph.node(&at(&server, "/deeper")).is_none());
    assert_eq!(graph.edges_from(&at(&server, "/about")).count(), 0);
    assert_eq!(graph.edges_from(&graph.seed).count(), 3);

    let report = &outcome.report;
    assert_eq!(report.total_unique, 4);
    assert_eq!(report.count(StatusClass::Success), 3);
    assert_eq!(report.count(StatusClass::OutOfScope), 1);
    assert!(report.errors.is_empty());
    assert!(!report.cancelled);
}

#[tokio::test]
async fn test_robots_disallowed_urls_are_never_fetched() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /private/").await;

    mount_page(
        &server,
        "/",
        r#"<a href="/private/page">Secret</a><a href="/public">Public</a>"#,
    )
    .await;
    mount_page(&server, "/public", "<p>hello</p>").await;
    Mock::given(method("GET"))
        .and(path("/private/page"))
        .respond_with(html("secret"))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = crawl(create_test_config(), &at(&server, "/"), ScanDepth::Full)
        .await
        .unwrap();

    let private = outcome.graph.node(&at(&server, "/private/page")).unwrap();
    assert_eq!(private.state, NodeState::Settled(SettleStatus::RobotsDisallowed));
    assert_eq!(outcome.report.count(StatusClass::RobotsDisallowed), 1);
    assert!(outcome.report.errors.is_empty());
}

#[tokio::test]
async fn test_ignore_policy_fetches_disallowed_urls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"))
        .expect(0)
        .mount(&server)
        .await;
    mount_page(&server, "/", r#"<a href="/page">Page</a>"#).await;
    mount_page(&server, "/page", "<p>page</p>").await;

    let mut config = create_test_config();
    config.robots.policy = sitegraph::config::RobotsPolicy::Ignore;

    let outcome = crawl(config, &at(&server, "/"), ScanDepth::Quick).await.unwrap();
    assert_eq!(outcome.report.count(StatusClass::Success), 2);
}

#[tokio::test]
async fn test_timeout_is_isolated_to_one_url() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<a href="/slow">Slow</a><a href="/fast">Fast</a>"#,
    )
    .await;
    mount_page(&server, "/fast", "<p>fast</p>").await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html("<p>slow</p>").set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let mut config = create_test_config();
    config.crawler.request_timeout_ms = 300;

    let outcome = crawl(config, &at(&server, "/"), ScanDepth::Quick).await.unwrap();

    let slow = outcome.graph.node(&at(&server, "/slow")).unwrap();
    assert_eq!(slow.state, NodeState::Errored(FetchErrorKind::Timeout));
    assert_eq!(outcome.report.errors.len(), 1);
    assert_eq!(
        outcome.report.errors[0].kind,
        ErrorKind::Fetch(FetchErrorKind::Timeout)
    );
    assert_eq!(
        outcome.graph.node(&at(&server, "/fast")).unwrap().state.http_status(),
        Some(200)
    );
}

#[tokio::test]
async fn test_http_errors_are_reported_not_fatal() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/missing">Gone</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = crawl(create_test_config(), &at(&server, "/"), ScanDepth::Quick)
        .await
        .unwrap();

    assert_eq!(outcome.report.count(StatusClass::ClientError), 1);
    assert_eq!(outcome.report.errors[0].url, at(&server, "/missing"));
    assert_eq!(outcome.report.errors[0].kind, ErrorKind::Http(404));
}

#[tokio::test]
async fn test_shared_child_fetched_once_under_concurrency() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    mount_page(
        &server,
        "/",
        r#"<a href="/a">A</a><a href="/b">B</a><a href="/c">C</a>"#,
    )
    .await;
    for page in ["/a", "/b", "/c"] {
        mount_page(&server, page, r#"<a href="/shared">Shared</a>"#).await;
    }
    mount_page(&server, "/shared", r#"<a href="/">Home</a>"#).await;

    let mut config = create_test_config();
    config.crawler.concurrency = 8;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let outcome = Coordinator::new(config, &at(&server, "/"), ScanDepth::Deep)
        .unwrap()
        .with_events(tx)
        .run()
        .await
        .unwrap();

    let shared = at(&server, "/shared");
    assert_eq!(outcome.graph.node(&shared).unwrap().depth, 2);
    assert_eq!(outcome.graph.edges_to(&shared).count(), 3);
    // The back link to the seed is recorded without a second fetch
    assert_eq!(outcome.graph.edges_to(&outcome.graph.seed).count(), 1);

    let mut started = HashSet::new();
    let mut last_progress = None;
    while let Some(event) = rx.recv().await {
        match event {
            CrawlEvent::FetchStarted { url } => assert!(started.insert(url)),
            progress @ CrawlEvent::Progress { .. } => last_progress = Some(progress),
            _ => {}
        }
    }
    assert_eq!(started.len(), 5);
    assert!(matches!(
        last_progress,
        Some(CrawlEvent::Progress {
            discovered: 5,
            settled: 5,
            errored: 0,
            queued: 0,
            in_flight: 0
        })
    ));
}

#[tokio::test]
async fn test_depth_follows_discovering_parent() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/one">1</a>"#).await;
    mount_page(&server, "/one", r#"<a href="/two">2</a><a href="/">home</a>"#).await;
    mount_page(&server, "/two", r#"<a href="/three">3</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/three"))
        .respond_with(html("<p>too deep</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = crawl(create_test_config(), &at(&server, "/"), ScanDepth::Full)
        .await
        .unwrap();
    let graph = &outcome.graph;

    // Pages at the maximum depth are fetched but not expanded
    let two = at(&server, "/two");
    assert_eq!(graph.node(&two).unwrap().depth, 2);
    assert_eq!(graph.edges_from(&two).count(), 0);
    assert!(graph.node(&at(&server, "/three")).is_none());
    assert_eq!(outcome.report.max_depth_reached, 2);

    for node in &graph.nodes {
        match &node.parent {
            None => assert_eq!(node.url, graph.seed),
            Some(parent) => {
                let parent = graph.node(parent).unwrap();
                assert_eq!(node.depth, parent.depth + 1, "depth of {}", node.url);
            }
        }
    }
}

#[tokio::test]
async fn test_redirect_records_edge_and_target() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/old">Old</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/new", r#"<a href="/next">Next</a>"#).await;
    mount_page(&server, "/next", "<p>end</p>").await;

    let outcome = crawl(create_test_config(), &at(&server, "/"), ScanDepth::Full)
        .await
        .unwrap();
    let graph = &outcome.graph;

    let old = at(&server, "/old");
    let new = at(&server, "/new");
    assert_eq!(graph.node(&old).unwrap().state.http_status(), Some(301));
    assert_eq!(graph.node(&new).unwrap().state.http_status(), Some(200));
    assert_eq!(graph.node(&new).unwrap().depth, 1);
    assert_eq!(graph.node(&new).unwrap().parent.as_deref(), Some(graph.seed.as_str()));

    let redirect = graph.edges_from(&old).next().unwrap();
    assert_eq!(redirect.target, new);
    assert_eq!(redirect.kind, EdgeKind::Redirect);

    // The redirect target's links are followed
    let next = graph.node(&at(&server, "/next")).unwrap();
    assert_eq!(next.parent.as_deref(), Some(new.as_str()));
    assert_eq!(next.depth, 2);
}

async fn mount_redirect(server: &MockServer, from: &str, to: &str) {
    Mock::given(method("GET"))
        .and(path(from))
        .respond_with(ResponseTemplate::new(302).insert_header("location", to))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_never(server: &MockServer, page: &str) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(html("<p>unreachable</p>"))
        .expect(0)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_redirect_into_disallowed_path_is_not_fetched() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /private/").await;
    mount_page(&server, "/", r#"<a href="/go">Go</a>"#).await;
    mount_redirect(&server, "/go", "/private/secret").await;
    mount_never(&server, "/private/secret").await;

    let outcome = crawl(create_test_config(), &at(&server, "/"), ScanDepth::Quick)
        .await
        .unwrap();
    let graph = &outcome.graph;

    let go = at(&server, "/go");
    let secret = at(&server, "/private/secret");
    assert_eq!(graph.node(&go).unwrap().state.http_status(), Some(302));
    assert_eq!(
        graph.node(&secret).unwrap().state,
        NodeState::Settled(SettleStatus::RobotsDisallowed)
    );
    let redirect = graph.edges_from(&go).next().unwrap();
    assert_eq!(redirect.target, secret);
    assert_eq!(redirect.kind, EdgeKind::Redirect);
}

#[tokio::test]
async fn test_redirect_off_host_is_out_of_scope() {
    let server = MockServer::start().await;
    // Same listener under another host name, so a fetch would still be seen
    let elsewhere = format!("http://localhost:{}/offhost", server.address().port());

    mount_page(&server, "/", r#"<a href="/away">Away</a>"#).await;
    mount_redirect(&server, "/away", &elsewhere).await;
    mount_never(&server, "/offhost").await;

    let outcome = crawl(create_test_config(), &at(&server, "/"), ScanDepth::Full)
        .await
        .unwrap();
    let graph = &outcome.graph;

    let target = graph.node(&elsewhere).unwrap();
    assert_eq!(target.state, NodeState::Settled(SettleStatus::OutOfScope));
    assert_eq!(target.depth, 1);
    assert_eq!(outcome.report.count(StatusClass::OutOfScope), 1);
}

#[tokio::test]
async fn test_redirect_to_known_url_fetches_it_once() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/new">New</a><a href="/old">Old</a>"#).await;
    mount_redirect(&server, "/old", "/new").await;
    mount_page(&server, "/new", "<p>new</p>").await;

    let outcome = crawl(create_test_config(), &at(&server, "/"), ScanDepth::Full)
        .await
        .unwrap();
    let graph = &outcome.graph;

    let old = at(&server, "/old");
    let new = at(&server, "/new");
    assert_eq!(graph.nodes.len(), 3);
    assert_eq!(graph.node(&new).unwrap().state.http_status(), Some(200));
    assert!(graph
        .edges_from(&old)
        .any(|e| e.target == new && e.kind == EdgeKind::Redirect));
}

#[tokio::test]
async fn test_redirect_loop_settles_each_url_once() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/a">A</a>"#).await;
    mount_redirect(&server, "/a", "/b").await;
    mount_redirect(&server, "/b", "/a").await;

    let outcome = crawl(create_test_config(), &at(&server, "/"), ScanDepth::Full)
        .await
        .unwrap();
    let graph = &outcome.graph;

    let a = at(&server, "/a");
    let b = at(&server, "/b");
    assert_eq!(graph.node(&a).unwrap().state.http_status(), Some(302));
    assert_eq!(graph.node(&b).unwrap().state.http_status(), Some(302));
    assert!(graph.edges_from(&b).any(|e| e.target == a));
    assert!(outcome.report.errors.is_empty());
}

#[tokio::test]
async fn test_redirect_chain_stops_at_limit() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/r1">Start</a>"#).await;
    mount_redirect(&server, "/r1", "/r2").await;
    mount_redirect(&server, "/r2", "/r3").await;
    mount_redirect(&server, "/r3", "/r4").await;
    mount_never(&server, "/r4").await;

    let mut config = create_test_config();
    config.crawler.max_redirects = 2;

    let outcome = crawl(config, &at(&server, "/"), ScanDepth::Full).await.unwrap();
    let graph = &outcome.graph;

    let r3 = at(&server, "/r3");
    assert_eq!(
        graph.node(&r3).unwrap().state,
        NodeState::Errored(FetchErrorKind::TooManyRedirects)
    );
    assert!(graph.node(&at(&server, "/r4")).is_none());
    assert!(outcome
        .report
        .errors
        .iter()
        .any(|e| e.url == r3 && e.kind == ErrorKind::Fetch(FetchErrorKind::TooManyRedirects)));
}

#[tokio::test]
async fn test_redirect_to_same_url_is_one_node() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/docs">Docs</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/docs/"))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/docs/", r#"<a href="child">Child</a>"#).await;
    mount_page(&server, "/docs/child", "<p>child</p>").await;

    let outcome = crawl(create_test_config(), &at(&server, "/"), ScanDepth::Full)
        .await
        .unwrap();
    let graph = &outcome.graph;

    let docs = at(&server, "/docs");
    assert_eq!(graph.nodes.len(), 3);
    assert_eq!(graph.node(&docs).unwrap().state.http_status(), Some(200));

    // Relative links resolve against the URL that actually answered
    let child = graph.node(&at(&server, "/docs/child")).unwrap();
    assert_eq!(child.parent.as_deref(), Some(docs.as_str()));
    assert_eq!(child.depth, 2);
}

#[tokio::test]
async fn test_redirect_hops_are_throttled() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/docs">Docs</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/docs/"))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/docs/", "<p>docs</p>").await;

    let mut config = create_test_config();
    config.crawler.concurrency = 1;
    config.crawler.request_delay_ms = 300;

    // The seed uses its own throttle, so only the second hop has to wait
    let started = std::time::Instant::now();
    let outcome = crawl(config, &at(&server, "/"), ScanDepth::Quick).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(
        outcome.graph.node(&at(&server, "/docs")).unwrap().state.http_status(),
        Some(200)
    );
}

#[tokio::test]
async fn test_similar_urls_cluster() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"
        <a href="/item?id=1">1</a>
        <a href="/item?id=2">2</a>
        <a href="/item?id=2&utm_source=news">2 again</a>
        <link rel="stylesheet" href="/site.css">
        "#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(html("<p>item</p>"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/site.css"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("body {}", "text/css"))
        .mount(&server)
        .await;

    let mut config = create_test_config();
    config.normalize.query_mode = QueryMode::Sorted;

    let outcome = crawl(config, &at(&server, "/"), ScanDepth::Quick).await.unwrap();
    let graph = &outcome.graph;

    assert_eq!(graph.clusters.len(), 1);
    assert_eq!(graph.clusters[0].members.len(), 2);
    assert_eq!(outcome.report.similar_count, 1);

    let css = graph.node(&at(&server, "/site.css")).unwrap();
    assert_eq!(css.kind, ResourceKind::Stylesheet);
    assert!(graph
        .edges_to(&at(&server, "/site.css"))
        .all(|e| e.kind == EdgeKind::Link(LinkKind::Stylesheet)));
}

#[tokio::test]
async fn test_invalid_seed_is_fatal() {
    let result = crawl(create_test_config(), "not a url", ScanDepth::Quick).await;
    assert!(matches!(result, Err(CrawlError::InvalidSeed { .. })));
}

#[tokio::test]
async fn test_unreachable_seed_is_fatal() {
    let result = crawl(create_test_config(), "http://127.0.0.1:1/", ScanDepth::Quick).await;
    assert!(matches!(
        result,
        Err(CrawlError::SeedUnreachable {
            kind: FetchErrorKind::ConnectionError,
            ..
        })
    ));
}

#[tokio::test]
async fn test_cancelled_crawl_returns_partial_graph() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<p>never</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    token.cancel();

    let outcome = Coordinator::new(create_test_config(), &at(&server, "/"), ScanDepth::Full)
        .unwrap()
        .with_cancellation(token)
        .run()
        .await
        .unwrap();

    assert!(outcome.report.cancelled);
    assert_eq!(outcome.report.count(StatusClass::Pending), 1);
}

#[tokio::test]
async fn test_cancel_mid_run_keeps_queued_urls_pending() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<a href="/slow">Slow</a><a href="/queued">Queued</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html(r#"<a href="/slow-child">Child</a>"#).set_delay(Duration::from_secs(1)))
        .expect(1)
        .mount(&server)
        .await;
    mount_never(&server, "/queued").await;
    mount_never(&server, "/slow-child").await;

    let mut config = create_test_config();
    config.crawler.concurrency = 1;

    let coordinator = Coordinator::new(config, &at(&server, "/"), ScanDepth::Full).unwrap();
    let token = coordinator.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        token.cancel();
    });

    let outcome = coordinator.run().await.unwrap();
    let graph = &outcome.graph;

    assert!(outcome.report.cancelled);
    // The in-flight fetch finished and was recorded
    let slow = graph.node(&at(&server, "/slow")).unwrap();
    assert_eq!(slow.state.http_status(), Some(200));
    assert_eq!(
        graph.node(&at(&server, "/queued")).unwrap().state,
        NodeState::Queued
    );
    assert_eq!(
        graph.node(&at(&server, "/slow-child")).unwrap().state,
        NodeState::Queued
    );
    assert_eq!(outcome.report.count(StatusClass::Pending), 2);
}
