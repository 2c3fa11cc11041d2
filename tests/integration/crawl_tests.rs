//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers (both the crawled
//! site and the scoring oracle) and test the full crawl cycle end-to-end.

use futures::StreamExt;
use priority_crawl::config::{
    load_config_with_hash, Config, CrawlerConfig, OutputConfig, UserAgentConfig,
};
use priority_crawl::crawler::{Coordinator, HttpFetcher};
use priority_crawl::oracle::HttpOracle;
use priority_crawl::output::{
    FailureReason, FanoutSink, JsonLinesSink, MemorySink, PageRecord, SqliteSink,
};
use priority_crawl::state::{CrawlState, PageStatus};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a fast test configuration without an oracle
fn create_test_config() -> Config {
    Config {
        crawler: CrawlerConfig {
            max_depth: 2,
            request_delay_seconds: 0.0,
            fetch_timeout_seconds: 5.0,
            scorer_timeout_seconds: 5.0,
            ..CrawlerConfig::default()
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: Some("https://example.com/contact".to_string()),
            contact_email: Some("test@example.com".to_string()),
        },
        oracle: None,
        output: OutputConfig::default(),
    }
}

fn html(title: &str, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            title, body
        ),
        "text/html",
    )
}

async fn mount_page(server: &MockServer, page: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Wraps a scoring answer in a chat-completions response body
fn chat_body(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    })
}

fn find<'a>(records: &'a [PageRecord], url: &str) -> Option<&'a PageRecord> {
    records.iter().find(|r| r.url == url)
}

fn coordinator(config: &Config) -> Coordinator {
    let timeout = config.crawler.fetch_timeout().expect("Invalid timeout");
    let fetcher = HttpFetcher::from_config(&config.user_agent, timeout)
        .expect("Failed to build HTTP client");
    Coordinator::new(config.crawler.clone(), Arc::new(fetcher))
        .expect("Invalid test config")
        .with_user_agent(&config.user_agent)
}

#[tokio::test]
async fn test_scored_crawl_follows_only_relevant_links() {
    let site = MockServer::start().await;
    let base = site.uri();

    mount_page(
        &site,
        "/",
        html(
            "Home",
            r#"<a href="/p1">Guide</a> <a href="/p2">Careers</a>"#,
        ),
    )
    .await;
    mount_page(&site, "/p1", html("Guide", "<p>useful content</p>")).await;
    Mock::given(method("GET"))
        .and(path("/p2"))
        .respond_with(html("Careers", "<p>off topic</p>"))
        .expect(0)
        .mount(&site)
        .await;

    let oracle_server = MockServer::start().await;
    let answer = format!(
        r#"{{"results": [
            {{"url": "{base}/p1", "priority_score": 9, "purpose_tag": "guide"}},
            {{"url": "{base}/p2", "priority_score": 2, "purpose_tag": "careers"}}
        ]}}"#
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(&answer)))
        .expect(1)
        .mount(&oracle_server)
        .await;

    let mut config = create_test_config();
    config.crawler.priority_threshold = 6;
    let oracle = HttpOracle::new(
        &oracle_server.uri(),
        "test-key",
        "test-model",
        Duration::from_secs(5),
    )
    .unwrap();

    let coordinator = coordinator(&config).with_scorer(Arc::new(oracle));
    let sink = MemorySink::new();
    let summary = coordinator
        .run(&format!("{}/", base), 1, "product documentation", &sink)
        .await
        .unwrap();

    assert_eq!(summary.state, CrawlState::Completed);
    assert_eq!(summary.pages_succeeded, 2);
    assert_eq!(summary.links_enqueued, 1);

    let records = sink.records();
    let seed = find(&records, &format!("{}/", base)).expect("seed record");
    assert_eq!(seed.title.as_deref(), Some("Home"));
    let annotations = seed.score_annotations.as_ref().expect("priority map");
    assert_eq!(annotations.priority_map.get(&format!("{}/p1", base)), Some(&9));
    assert_eq!(
        annotations
            .purpose_tags
            .get(&format!("{}/p2", base))
            .map(String::as_str),
        Some("careers")
    );

    let p1 = find(&records, &format!("{}/p1", base)).expect("p1 fetched");
    assert_eq!(p1.depth, 1);
    assert!(p1.body_text.contains("useful content"));
    assert!(find(&records, &format!("{}/p2", base)).is_none());
}

#[tokio::test]
async fn test_oracle_failure_degrades_to_seed_only() {
    let site = MockServer::start().await;
    let base = site.uri();
    mount_page(&site, "/", html("Home", r#"<a href="/p1">one</a>"#)).await;

    let oracle_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&oracle_server)
        .await;

    let oracle =
        HttpOracle::new(&oracle_server.uri(), "k", "m", Duration::from_secs(5)).unwrap();
    let sink = MemorySink::new();
    let summary = coordinator(&create_test_config())
        .with_scorer(Arc::new(oracle))
        .run(&format!("{}/", base), 2, "anything", &sink)
        .await
        .unwrap();

    assert_eq!(summary.state, CrawlState::Completed);
    assert_eq!(summary.total_pages(), 1);
    assert_eq!(summary.links_enqueued, 0);
}

#[tokio::test]
async fn test_crawl_with_depth_limit() {
    let site = MockServer::start().await;
    let base = site.uri();

    // Chain: / -> /level1 -> /level2 -> /level3
    mount_page(&site, "/", html("Root", r#"<a href="/level1">1</a>"#)).await;
    mount_page(&site, "/level1", html("L1", r#"<a href="/level2">2</a>"#)).await;
    mount_page(&site, "/level2", html("L2", r#"<a href="/level3">3</a>"#)).await;
    Mock::given(method("GET"))
        .and(path("/level3"))
        .respond_with(html("L3", ""))
        .expect(0)
        .mount(&site)
        .await;

    let sink = MemorySink::new();
    let summary = coordinator(&create_test_config())
        .run(&format!("{}/", base), 2, "", &sink)
        .await
        .unwrap();

    assert_eq!(summary.pages_succeeded, 3);
    assert_eq!(summary.by_depth.get(&2), Some(&1));
    assert!(sink.records().iter().all(|r| r.depth <= 2));
}

#[tokio::test]
async fn test_robots_txt_respect() {
    let site = MockServer::start().await;
    let base = site.uri();

    mount_page(
        &site,
        "/robots.txt",
        ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"),
    )
    .await;
    mount_page(
        &site,
        "/",
        html(
            "Home",
            r#"<a href="/public">pub</a> <a href="/private/secret">priv</a>"#,
        ),
    )
    .await;
    mount_page(&site, "/public", html("Public", "")).await;
    Mock::given(method("GET"))
        .and(path("/private/secret"))
        .respond_with(html("Secret", ""))
        .expect(0)
        .mount(&site)
        .await;

    let mut config = create_test_config();
    config.crawler.respect_robots_txt = true;

    let sink = MemorySink::new();
    let summary = coordinator(&config)
        .run(&format!("{}/", base), 1, "", &sink)
        .await
        .unwrap();

    assert_eq!(summary.pages_succeeded, 2);
    assert_eq!(summary.pages_failed, 1);

    let records = sink.records();
    let blocked = find(&records, &format!("{}/private/secret", base)).expect("robots record");
    assert_eq!(blocked.status, PageStatus::Failed);
    assert_eq!(blocked.failure_reason, Some(FailureReason::Robots));
}

#[tokio::test]
async fn test_failed_fetch_is_recorded() {
    let site = MockServer::start().await;
    let base = site.uri();

    mount_page(&site, "/", html("Home", r#"<a href="/missing">gone</a>"#)).await;
    mount_page(&site, "/missing", ResponseTemplate::new(404)).await;

    let sink = MemorySink::new();
    let summary = coordinator(&create_test_config())
        .run(&format!("{}/", base), 1, "", &sink)
        .await
        .unwrap();

    assert_eq!(summary.pages_succeeded, 1);
    assert_eq!(summary.pages_failed, 1);

    let records = sink.records();
    let missing = find(&records, &format!("{}/missing", base)).expect("failed record");
    assert_eq!(missing.status, PageStatus::Failed);
    assert_eq!(missing.http_status, Some(404));
    assert_eq!(
        missing.failure_reason,
        Some(FailureReason::Http { status: 404 })
    );
    assert!(missing.outbound_links.is_empty());
}

#[tokio::test]
async fn test_records_persist_to_jsonl_and_sqlite() {
    let site = MockServer::start().await;
    let base = site.uri();
    mount_page(&site, "/", html("Home", r#"<a href="/a">a</a>"#)).await;
    mount_page(&site, "/a", html("A", "<p>leaf</p>")).await;

    let dir = TempDir::new().unwrap();
    let jsonl_path = dir.path().join("records.jsonl");
    let db_path = dir.path().join("crawl.db");

    let db = Arc::new(SqliteSink::open(&db_path, "test-hash").unwrap());
    let sink = FanoutSink::new()
        .with(JsonLinesSink::open(&jsonl_path).unwrap())
        .with(Arc::clone(&db));

    let summary = coordinator(&create_test_config())
        .run(&format!("{}/", base), 1, "", &sink)
        .await
        .unwrap();
    db.complete_run(&summary).unwrap();

    let lines: Vec<serde_json::Value> = std::fs::read_to_string(&jsonl_path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|line| line["status"] == "success"));

    assert_eq!(db.count_pages_by_status(PageStatus::Success).unwrap(), 2);
    assert_eq!(db.run_state().unwrap(), "completed");
}

#[tokio::test]
async fn test_crawl_stream_yields_records() {
    let site = MockServer::start().await;
    let base = site.uri();
    mount_page(
        &site,
        "/",
        html("Home", r#"<a href="/a">a</a> <a href="/b">b</a>"#),
    )
    .await;
    mount_page(&site, "/a", html("A", "")).await;
    mount_page(&site, "/b", html("B", "")).await;

    let mut stream =
        priority_crawl::crawl(&format!("{}/", base), 1, "", create_test_config()).unwrap();

    let mut urls = Vec::new();
    while let Some(record) = stream.next().await {
        urls.push(record.url);
    }
    let summary = stream.finish().await.unwrap();

    assert_eq!(urls.len(), 3);
    assert_eq!(urls[0], format!("{}/", base));
    assert_eq!(summary.state, CrawlState::Completed);
    assert_eq!(summary.total_pages(), 3);
}

#[tokio::test]
async fn test_crawl_stream_cancel() {
    let site = MockServer::start().await;
    let base = site.uri();
    let anchors: String = (0..20)
        .map(|i| format!(r#"<a href="/page{}">{}</a>"#, i, i))
        .collect();
    mount_page(&site, "/", html("Home", &anchors)).await;
    for i in 0..20 {
        mount_page(&site, &format!("/page{}", i), html("Leaf", "")).await;
    }

    let mut config = create_test_config();
    config.crawler.request_delay_seconds = 0.2;

    let mut stream = priority_crawl::crawl(&format!("{}/", base), 1, "", config).unwrap();
    let first = stream.next().await.expect("seed record");
    assert_eq!(first.url, format!("{}/", base));

    stream.cancel();
    let summary = stream.finish().await.unwrap();

    assert_eq!(summary.state, CrawlState::Cancelled);
    assert!(summary.total_pages() < 21);
}

#[tokio::test]
async fn test_invalid_seed_rejected() {
    let result = priority_crawl::crawl("not a url", 1, "", create_test_config());
    assert!(result.is_err());
}

#[tokio::test]
async fn test_config_file_drives_crawl() {
    let site = MockServer::start().await;
    let base = site.uri();
    mount_page(&site, "/", html("Home", r#"<a href="/a">a</a>"#)).await;
    mount_page(&site, "/a", html("A", "")).await;

    let oracle_server = MockServer::start().await;
    let answer = format!(r#"{{"results": [{{"url": "{}/a", "priority_score": 7}}]}}"#, base);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(&answer)))
        .mount(&oracle_server)
        .await;

    std::env::set_var("PRIORITY_CRAWL_IT_KEY", "secret");

    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[crawler]
max-depth = 1
request-delay-seconds = 0.0
priority-threshold = 7

[user-agent]
crawler-name = "ConfigBot"

[oracle]
endpoint = "{}"
api-key-env = "PRIORITY_CRAWL_IT_KEY"
model = "test-model"
"#,
        oracle_server.uri()
    )
    .unwrap();

    let (config, hash) = load_config_with_hash(file.path()).unwrap();
    assert_eq!(hash.len(), 64);
    assert_eq!(config.user_agent.crawler_name, "ConfigBot");
    assert!(config.oracle.as_ref().is_some_and(|o| o.score_links));

    let sink = MemorySink::new();
    let summary = Coordinator::from_config(&config)
        .unwrap()
        .run(&format!("{}/", base), config.crawler.max_depth, "docs", &sink)
        .await
        .unwrap();

    assert_eq!(summary.pages_succeeded, 2);
    assert!(find(&sink.records(), &format!("{}/a", base)).is_some());
}
