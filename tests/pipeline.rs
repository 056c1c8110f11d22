//! End-to-end tests for the enrichment pipeline.
//!
//! Every test serves its feed (and any linked articles) from a local
//! wiremock server, so the pipeline runs with `allow_private_hosts` set and,
//! unless a test says otherwise, with pacing disabled.

use pretty_assertions::assert_eq;
use rrss::identity::hash_content;
use rrss::{Config, EnrichedRecord, Pipeline, PipelineError};
use std::collections::HashSet;
use std::time::Duration;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> Config {
    Config {
        allow_private_hosts: true,
        fetch_pacing_ms: 0,
        min_request_interval_ms: 0,
        ..Config::default()
    }
}

fn rss(title: &str, items: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>{title}</title>{items}</channel></rss>"#
    )
}

fn item(guid: Option<&str>, link: &str, description: &str) -> String {
    let guid = guid
        .map(|g| format!("<guid>{g}</guid>"))
        .unwrap_or_default();
    let link = if link.is_empty() {
        String::new()
    } else {
        format!("<link>{link}</link>")
    };
    format!(
        "<item>{guid}<title>Item</title>{link}<description>{}</description></item>",
        escape(description)
    )
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn article_page() -> String {
    let p = "Ferris the crab has been the unofficial mascot of the Rust community for years, \
        showing up on stickers, conference slides and plush toys. The design is in the public \
        domain, which is why it spreads so easily between projects and events. ";
    format!(
        r#"<html><head><title>Ferris</title>
<meta property="og:image" content="/ferris.png"></head>
<body><nav><a href="/">Home</a></nav>
<article><h1>About Ferris</h1><p>{p}</p><p>{p}</p><p>{p}</p><p>{p}</p>
<script>track()</script></article>
<footer>footer links</footer></body></html>"#
    )
}

async fn mount_feed(server: &MockServer, body: String) {
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("Content-Type", "application/rss+xml"),
        )
        .mount(server)
        .await;
}

async fn run(server: &MockServer) -> Result<Vec<EnrichedRecord>, PipelineError> {
    Pipeline::new(test_config())
        .unwrap()
        .run(&format!("{}/feed", server.uri()))
        .await
}

fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/article", addr)
}

#[tokio::test]
async fn test_concrete_scenario() {
    let server = MockServer::start().await;
    mount_feed(&server, rss("Example", &item(Some("abc"), "", "<b>hi</b>"))).await;

    let records = run(&server).await.unwrap();

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.id, "abc");
    assert_eq!(record.feed_title, "Example");
    assert_eq!(record.feed_url, format!("{}/feed", server.uri()));
    assert_eq!(record.item_body, "<b>hi</b>");
    assert_eq!(record.item_extended_body, "");
    assert_eq!(record.item_image, "");
    assert_eq!(record.item_url, "");
}

#[tokio::test]
async fn test_one_record_per_item_in_feed_order() {
    let server = MockServer::start().await;
    let items: String = (0..20)
        .map(|i| item(Some(&format!("g{i}")), "", &format!("body {i}")))
        .collect();
    mount_feed(&server, rss("Ordered", &items)).await;

    let records = run(&server).await.unwrap();

    let ids: Vec<_> = records.iter().map(|r| r.id.clone()).collect();
    let expected: Vec<_> = (0..20).map(|i| format!("g{i}")).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_identity_precedence() {
    let server = MockServer::start().await;
    let items = [
        item(Some("G1"), "", "Hello world"),
        item(None, "", "Hello world"),
        item(None, "", "Hello world"),
        item(None, "", "Something else"),
        item(None, "", ""),
    ]
    .concat();
    mount_feed(&server, rss("Ids", &items)).await;

    let records = run(&server).await.unwrap();

    assert_eq!(records[0].id, "G1");
    assert_eq!(records[1].id, hash_content("Hello world"));
    assert_eq!(records[1].id, records[2].id);
    assert_ne!(records[3].id, records[1].id);
    assert_eq!(records[4].id, hash_content(""));
}

#[tokio::test]
async fn test_empty_link_never_fetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss(
            "NoLinks",
            &[item(Some("a"), "", "x"), item(Some("b"), "", "y")].concat(),
        )))
        .expect(1)
        .mount(&server)
        .await;
    // Anything other than the feed would be an article fetch
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let records = run(&server).await.unwrap();

    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.item_extended_body.is_empty()));
    assert!(records.iter().all(|r| r.item_image.is_empty()));
}

#[tokio::test]
async fn test_article_enrichment_is_sanitized() {
    let server = MockServer::start().await;
    let link = format!("{}/ferris", server.uri());
    mount_feed(
        &server,
        rss(
            "Crabs",
            &item(Some("ferris"), &link, "<p onclick=\"x()\">Meet Ferris</p><script>x()</script>"),
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/ferris"))
        .respond_with(ResponseTemplate::new(200).set_body_string(article_page()))
        .expect(1)
        .mount(&server)
        .await;

    let records = run(&server).await.unwrap();
    let record = &records[0];

    assert_eq!(record.item_url, link);
    assert_eq!(record.item_body, "<p>Meet Ferris</p>");
    assert!(record.item_extended_body.contains("unofficial mascot"));
    assert!(!record.item_extended_body.contains("track()"));
    assert_eq!(record.item_image, format!("{}/ferris.png", server.uri()));
}

#[tokio::test]
async fn test_article_failures_are_not_fatal() {
    let server = MockServer::start().await;
    let good = format!("{}/ferris", server.uri());
    let broken = format!("{}/broken", server.uri());
    let refused = closed_port_url();
    mount_feed(
        &server,
        rss(
            "Mixed",
            &[
                item(Some("refused"), &refused, "r"),
                item(Some("good"), &good, "g"),
                item(Some("broken"), &broken, "b"),
            ]
            .concat(),
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/ferris"))
        .respond_with(ResponseTemplate::new(200).set_body_string(article_page()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let records = run(&server).await.unwrap();

    let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["refused", "good", "broken"]);

    assert_eq!(records[0].item_extended_body, "");
    assert_eq!(records[0].item_image, "");
    assert_eq!(records[0].item_url, refused);
    assert_eq!(records[0].item_body, "r");

    assert!(records[1].item_extended_body.contains("Ferris"));
    assert!(!records[1].item_image.is_empty());

    assert_eq!(records[2].item_extended_body, "");
    assert_eq!(records[2].item_image, "");
}

#[tokio::test]
async fn test_feed_failure_returns_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not a feed</html>"))
        .mount(&server)
        .await;

    let result = run(&server).await;
    assert!(matches!(result, Err(PipelineError::Feed { .. })));
}

#[tokio::test]
async fn test_unreachable_feed_returns_error() {
    let result = Pipeline::new(test_config())
        .unwrap()
        .run(&closed_port_url())
        .await;
    assert!(matches!(result, Err(PipelineError::Feed { .. })));
}

#[tokio::test]
async fn test_private_feed_refused_by_default() {
    let server = MockServer::start().await;
    mount_feed(&server, rss("Example", "")).await;

    let result = Pipeline::new(Config::default())
        .unwrap()
        .run(&format!("{}/feed", server.uri()))
        .await;
    assert!(matches!(result, Err(PipelineError::Feed { .. })));
}

#[tokio::test]
async fn test_no_field_carries_markup() {
    let server = MockServer::start().await;
    let hostile = "<script>alert(1)</script><img src=x onerror=alert(1)>";
    mount_feed(
        &server,
        rss(
            "&lt;script&gt;alert(1)&lt;/script&gt;Feed",
            &format!(
                "<item><guid>{}</guid><title>{}</title><link>/a?q=\"&gt;&lt;script&gt;</link><description>{}</description></item>",
                escape("<script>alert(1)</script>post-1"),
                escape(hostile),
                escape(hostile)
            ),
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let feed_url = format!("{}/feed?from=<script>alert(1)</script>", server.uri());
    let records = Pipeline::new(test_config())
        .unwrap()
        .run(&feed_url)
        .await
        .unwrap();
    let record = &records[0];

    assert_eq!(record.id, "post-1");
    for field in [
        &record.id,
        &record.feed_url,
        &record.feed_title,
        &record.item_image,
        &record.item_title,
        &record.item_body,
        &record.item_url,
        &record.item_extended_body,
        &record.published,
    ] {
        assert!(!field.contains("<script"), "unsafe field: {field}");
        assert!(!field.contains("onerror"), "unsafe field: {field}");
    }
    assert!(!record.feed_url.contains('<'));
    assert!(!record.item_url.contains('<'));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fifty_items_repeatedly_yield_fifty_records() {
    let server = MockServer::start().await;
    let links: Vec<String> = (0..50)
        .map(|i| match i % 3 {
            0 => format!("{}/ok/{i}", server.uri()),
            1 => format!("{}/fail/{i}", server.uri()),
            _ => format!("{}/slow/{i}", server.uri()),
        })
        .collect();
    let items: String = links
        .iter()
        .enumerate()
        .map(|(i, link)| item(None, link, &format!("<p>item {i}</p>")))
        .collect();
    mount_feed(&server, rss("Fifty", &items)).await;
    Mock::given(method("GET"))
        .and(path_regex("^/ok/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(article_page()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex("^/fail/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex("^/slow/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(article_page())
                .set_delay(Duration::from_millis(20)),
        )
        .mount(&server)
        .await;

    // Shared limiter and pacing both active, kept short
    let pipeline = Pipeline::new(Config {
        max_concurrent_fetches: 16,
        min_request_interval_ms: 1,
        fetch_pacing_ms: 1,
        ..test_config()
    })
    .unwrap();
    let url = format!("{}/feed", server.uri());

    for _ in 0..100 {
        let records = pipeline.run(&url).await.unwrap();
        assert_eq!(records.len(), 50);

        let ids: HashSet<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), 50);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.item_body, format!("<p>item {i}</p>"));
            assert_eq!(record.item_url, links[i]);
            if i % 3 == 1 {
                assert_eq!(record.item_extended_body, "");
                assert_eq!(record.item_image, "");
            } else {
                assert!(record.item_extended_body.contains("Ferris"));
                assert!(!record.item_image.is_empty());
            }
        }
    }
}
