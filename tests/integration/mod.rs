//! End-to-end crawl tests against a mock HTTP server

use flathunt::config::{
    BackendsConfig, Config, DirectBackendConfig, ManagedBackendConfig, OutputConfig,
    RateLimitConfig, RetryConfig, SearchConfig, SeedEntry,
};
use flathunt::crawler::{build_coordinator, BackendKind, FetchErrorKind};
use flathunt::store::{shared, ListingStore, SharedStore, SqliteStore};
use flathunt::SourceId;
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEARCH_HTML: &str = r#"
    <html><body>
        <a href="/properties/101">2 bed flat</a>
        <a href="/properties/102">1 bed flat</a>
        <a href="/properties/101?backToResults=true">2 bed flat again</a>
        <a href="/properties/404">Gone listing</a>
        <a href="/property-to-rent/find.html?index=24">Next</a>
    </body></html>
"#;

fn listing_html(bedrooms: u32, price: &str) -> String {
    format!(
        r#"<html>
        <head><title>{bedrooms} bedroom flat to rent in Hackney, London | Portal</title></head>
        <body><div class="price">{price} pcm</div><p>E8 2AB</p></body>
        </html>"#
    )
}

fn direct_limits() -> RateLimitConfig {
    RateLimitConfig {
        max_requests: 100,
        window_secs: 60,
        max_concurrent: 5,
    }
}

fn direct_config(server_uri: &str) -> Config {
    Config {
        search: SearchConfig {
            freshness_window_hours: 24,
            max_pages: 1,
            seeds: vec![SeedEntry {
                source: SourceId::Rightmove,
                url: format!("{}/search", server_uri),
            }],
        },
        backends: BackendsConfig {
            managed: None,
            direct: Some(DirectBackendConfig {
                min_payload_bytes: 1,
                limits: direct_limits(),
            }),
        },
        retry: RetryConfig {
            max_retries: 0,
            base_delay_ms: 1,
        },
        routing: HashMap::from([(SourceId::Rightmove, BackendKind::Direct)]),
        user_agent: "flathunt-test/0.1".to_string(),
        output: OutputConfig {
            database_path: ":memory:".to_string(),
        },
    }
}

async fn run_crawl(config: &Config, store: SharedStore, window: Duration) -> flathunt::CrawlReport {
    let coordinator = build_coordinator(config, store, CancellationToken::new()).unwrap();
    let seeds = config.search_seeds().unwrap();
    coordinator.run(&seeds, window).await.unwrap()
}

async fn mount_direct_portal(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SEARCH_HTML))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/properties/101"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(2, "£1,850")))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/properties/102"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(1, "£1,400")))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/properties/404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_direct_crawl_end_to_end() {
    let server = MockServer::start().await;
    mount_direct_portal(&server).await;

    let config = direct_config(&server.uri());
    let store = shared(SqliteStore::in_memory().unwrap());
    let report = run_crawl(&config, store, Duration::from_secs(24 * 3600)).await;

    // Four listing anchors; the respelled duplicate collapses in discovery
    assert_eq!(report.stats.discovered, 3);
    assert_eq!(report.stats.deduplicated, 0);
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.stats.fetched, 2);

    let mut uids: Vec<_> = report.records.iter().map(|r| r.uid.as_str()).collect();
    uids.sort();
    assert_eq!(uids, vec!["rightmove:101", "rightmove:102"]);

    let two_bed = report
        .records
        .iter()
        .find(|r| r.uid == "rightmove:101")
        .unwrap();
    assert_eq!(two_bed.bedrooms, Some(2));
    assert_eq!(two_bed.price_pence, Some(185_000));
    assert_eq!(two_bed.postcode.as_deref(), Some("E8 2AB"));
    assert_eq!(two_bed.backend, BackendKind::Direct);

    // The dead listing fails alone without affecting its siblings
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].error, FetchErrorKind::NotFound);
    assert_eq!(report.stats.failures_by_kind[&FetchErrorKind::NotFound], 1);
}

#[tokio::test]
async fn test_second_run_skips_fresh_listings() {
    let server = MockServer::start().await;
    mount_direct_portal(&server).await;

    let config = direct_config(&server.uri());
    let store = shared(SqliteStore::in_memory().unwrap());
    let window = Duration::from_secs(24 * 3600);

    let first = run_crawl(&config, store.clone(), window).await;
    assert_eq!(first.stats.fetched, 2);

    let second = run_crawl(&config, store.clone(), window).await;
    assert_eq!(second.stats.skipped_fresh, 2);
    assert_eq!(second.stats.fetched, 0);
    assert!(second.records.is_empty());

    // The failed listing left no freshness record, so it is retried
    assert_eq!(second.failures.len(), 1);
}

#[tokio::test]
async fn test_zero_window_refetches_everything() {
    let server = MockServer::start().await;
    mount_direct_portal(&server).await;

    let config = direct_config(&server.uri());
    let store = shared(SqliteStore::in_memory().unwrap());

    run_crawl(&config, store.clone(), Duration::from_secs(24 * 3600)).await;
    let second = run_crawl(&config, store, Duration::ZERO).await;

    assert_eq!(second.stats.skipped_fresh, 0);
    assert_eq!(second.stats.fetched, 2);
}

#[tokio::test]
async fn test_undersized_body_counts_as_blocked() {
    let server = MockServer::start().await;

    // Pad the search page past the size check; the listing stays tiny
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><body><a href="/properties/7">x</a>{}</body></html>"#,
            " ".repeat(4096)
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/properties/7"))
        .respond_with(ResponseTemplate::new(200).set_body_string("bot wall"))
        .mount(&server)
        .await;

    let mut config = direct_config(&server.uri());
    config.backends.direct.as_mut().unwrap().min_payload_bytes = 2048;

    let store = shared(SqliteStore::in_memory().unwrap());
    let report = run_crawl(&config, store, Duration::ZERO).await;

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].error, FetchErrorKind::Blocked);
}

#[tokio::test]
async fn test_retries_exhausted_on_persistent_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<html><body><a href="/properties/8">x</a></body></html>"#),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/properties/8"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let mut config = direct_config(&server.uri());
    config.retry.max_retries = 2;

    let store = shared(SqliteStore::in_memory().unwrap());
    let report = run_crawl(&config, store, Duration::ZERO).await;

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].error, FetchErrorKind::RetriesExhausted);
    assert_eq!(report.failures[0].attempts, 3);
}

#[tokio::test]
async fn test_deadline_stops_fetches_queued_on_the_limiter() {
    let server = MockServer::start().await;

    let anchors: String = (1..=4)
        .map(|i| format!(r#"<a href="/properties/{i}">Flat {i}</a>"#))
        .collect();
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("<html><body>{anchors}</body></html>")),
        )
        .mount(&server)
        .await;

    for i in 1..=4 {
        Mock::given(method("GET"))
            .and(path(format!("/properties/{i}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(listing_html(1, "£1,000"))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;
    }

    // One permit serializes the fetches so some are still queued when the
    // deadline fires
    let mut config = direct_config(&server.uri());
    config.backends.direct.as_mut().unwrap().limits.max_concurrent = 1;

    let store = shared(SqliteStore::in_memory().unwrap());
    let cancel = CancellationToken::new();
    let coordinator = build_coordinator(&config, store, cancel.clone()).unwrap();
    let seeds = config.search_seeds().unwrap();

    let deadline = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(750)).await;
        deadline.cancel();
    });

    let report = coordinator.run(&seeds, Duration::ZERO).await.unwrap();

    // The in-flight fetch finishes; everything still waiting for a permit
    // is abandoned without issuing a request
    assert!(report.stats.cancelled >= 1);
    assert_eq!(report.stats.failed, 0);
    assert_eq!(report.stats.fetched + report.stats.cancelled, 4);
}

#[tokio::test]
async fn test_managed_backend_scrape_flow() {
    let server = MockServer::start().await;
    let seed_url = format!("{}/to-rent/search", server.uri());
    let listing_url = format!("{}/to-rent/details/55", server.uri());

    let search_html = r#"<html><body><a href="/to-rent/details/55">Flat</a></body></html>"#;

    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({ "url": seed_url })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "html": search_html,
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({ "url": listing_url })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "html": listing_html(3, "£2,200"),
        })))
        .mount(&server)
        .await;

    let config = Config {
        search: SearchConfig {
            freshness_window_hours: 24,
            max_pages: 1,
            seeds: vec![SeedEntry {
                source: SourceId::Zoopla,
                url: seed_url.clone(),
            }],
        },
        backends: BackendsConfig {
            managed: Some(ManagedBackendConfig {
                endpoint: format!("{}/v1/scrape", server.uri()),
                api_key: "test-key".to_string(),
                limits: direct_limits(),
            }),
            direct: None,
        },
        retry: RetryConfig {
            max_retries: 0,
            base_delay_ms: 1,
        },
        routing: HashMap::from([(SourceId::Zoopla, BackendKind::Managed)]),
        user_agent: "flathunt-test/0.1".to_string(),
        output: OutputConfig {
            database_path: ":memory:".to_string(),
        },
    };

    let store = shared(SqliteStore::in_memory().unwrap());
    let report = run_crawl(&config, store, Duration::ZERO).await;

    assert_eq!(report.records.len(), 1);
    let record = &report.records[0];
    assert_eq!(record.uid, "zoopla:55");
    assert_eq!(record.bedrooms, Some(3));
    assert_eq!(record.backend, BackendKind::Managed);
    // Discovery fetches don't count toward attempt stats
    assert_eq!(report.stats.attempts_managed, 1);
}

#[tokio::test]
async fn test_saved_listings_queryable_through_store() {
    let server = MockServer::start().await;
    mount_direct_portal(&server).await;

    let config = direct_config(&server.uri());
    let store = shared(SqliteStore::in_memory().unwrap());
    let report = run_crawl(&config, store.clone(), Duration::ZERO).await;

    {
        let mut store = store.lock().unwrap();
        for record in &report.records {
            store.save_listing(record).unwrap();
        }
    }

    let summary = store.lock().unwrap().summary().unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.active, 2);
    assert_eq!(summary.by_source, vec![("rightmove".to_string(), 2)]);
}
