//! End-to-end pipeline tests against a mock upstream.
//!
//! The mock server plays two roles: the credential service (called directly)
//! and the proxy every identity routes through. Plain-HTTP proxying sends the
//! absolute-form request to the proxy itself, so every listing and detail
//! request lands on the mock server regardless of the target host.

use agent_harvest::{
    ApiConfig, BatchConfig, Config, Error, Event, FetchConfig, Harvester, OutputConfig,
    ProxyServiceConfig, RetryConfig,
};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer, dir: &TempDir) -> Config {
    Config {
        api: ApiConfig {
            listing_url: "http://upstream.test/listing?page={page}&size={page_size}".to_string(),
            detail_url: "http://upstream.test/agents/{id}".to_string(),
            page_size: 500,
        },
        fetch: FetchConfig {
            request_timeout: Duration::from_secs(5),
            cache_dir: dir.path().join("cache"),
            cache_ttl: Duration::from_secs(300),
        },
        retry: RetryConfig {
            max_attempts: 2,
            delay: Duration::from_millis(10),
        },
        batch: BatchConfig {
            batch_size: 2,
            inter_batch_delay: Duration::from_millis(10),
        },
        proxy_service: ProxyServiceConfig {
            endpoint: format!("{}/proxies", server.uri()),
            api_token: Some("tk".to_string()),
        },
        output: OutputConfig {
            path: dir.path().join("out.ndjson"),
        },
    }
}

async fn mount_credential_service(server: &MockServer) {
    let addr = server.address();
    Mock::given(method("GET"))
        .and(path("/proxies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 1,
            "results": [{
                "proxy_address": addr.ip().to_string(),
                "port": addr.port(),
                "username": "u",
                "password": "p"
            }]
        })))
        .mount(server)
        .await;
}

async fn mount_listing_page(server: &MockServer, page: u64, total: u64, ids: &[&str]) {
    let agents: Vec<_> = ids
        .iter()
        .map(|id| serde_json::json!({"id": id, "name": format!("Agent {id}")}))
        .collect();
    Mock::given(method("GET"))
        .and(path("/listing"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"totalAgents": total, "agent": agents}
        })))
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/agents/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"name": format!("Agent {id}"), "region": "North"}
        })))
        .mount(server)
        .await;
}

fn read_records(path: &std::path::Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .expect("output file should exist")
        .lines()
        .map(|line| serde_json::from_str(line).expect("every output line is complete JSON"))
        .collect()
}

#[tokio::test]
async fn two_page_run_harvests_every_record() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_credential_service(&server).await;
    // total 1000 at page size 500 means exactly two pages: page 0 is probed
    // directly, page 1 goes through the batch loop.
    mount_listing_page(&server, 0, 1000, &["a-1", "a-2"]).await;
    mount_listing_page(&server, 1, 1000, &["a-3", "a-4"]).await;
    for id in ["a-1", "a-2", "a-3", "a-4"] {
        mount_detail(&server, id).await;
    }

    let harvester = Harvester::new(config_for(&server, &dir)).await.unwrap();
    let summary = harvester.run().await.unwrap();

    assert_eq!(summary.total_count, 1000);
    assert_eq!(summary.page_count, 2);
    assert_eq!(summary.pages_failed, 0);
    assert_eq!(summary.agents_discovered, 4);
    assert_eq!(summary.records_written, 4);
    assert!(summary.is_complete(), "errors: {:?}", summary.errors);

    let records = read_records(&dir.path().join("out.ndjson"));
    assert_eq!(records.len(), 4);

    // Both pages' identifiers end up in the output, no duplicates, no
    // omissions; order is completion order, so compare as sets.
    let mut ids: Vec<&str> = records.iter().map(|r| r["id"].as_str().unwrap()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["a-1", "a-2", "a-3", "a-4"]);

    // Detail fields are merged alongside the identifier
    assert!(records.iter().all(|r| r["region"] == "North"));

    assert_eq!(harvester.identity_pool_size(), Some(1));
}

#[tokio::test]
async fn detail_failure_is_isolated_to_its_record() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_credential_service(&server).await;
    mount_listing_page(&server, 0, 4, &["a-1", "a-2", "a-3", "a-4"]).await;
    for id in ["a-1", "a-2", "a-4"] {
        mount_detail(&server, id).await;
    }
    // a-3 fails on every attempt; the retry budget is 2, so exactly 2 calls
    Mock::given(method("GET"))
        .and(path("/agents/a-3"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let harvester = Harvester::new(config_for(&server, &dir)).await.unwrap();
    let summary = harvester.run().await.unwrap();

    assert_eq!(summary.agents_discovered, 4);
    assert_eq!(summary.records_written, 3);
    assert_eq!(summary.errors.len(), 1, "errors: {:?}", summary.errors);
    assert!(
        summary.errors[0].contains("a-3"),
        "error should name the failed agent: {}",
        summary.errors[0]
    );

    let records = read_records(&dir.path().join("out.ndjson"));
    assert_eq!(records.len(), 3);
    assert!(
        records.iter().all(|r| r["id"] != "a-3"),
        "no placeholder is written for a failed record"
    );
}

#[tokio::test]
async fn listing_page_failure_skips_that_page_only() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_credential_service(&server).await;
    mount_listing_page(&server, 0, 1000, &["a-1", "a-2"]).await;
    Mock::given(method("GET"))
        .and(path("/listing"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;
    for id in ["a-1", "a-2"] {
        mount_detail(&server, id).await;
    }

    let harvester = Harvester::new(config_for(&server, &dir)).await.unwrap();
    let summary = harvester.run().await.unwrap();

    assert_eq!(summary.page_count, 2);
    assert_eq!(summary.pages_failed, 1);
    assert_eq!(summary.agents_discovered, 2, "page 0's items still count");
    assert_eq!(summary.records_written, 2);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].contains("page 1"), "got: {}", summary.errors[0]);
}

#[tokio::test]
async fn first_page_failure_is_fatal_and_leaves_a_truncated_output() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_credential_service(&server).await;
    Mock::given(method("GET"))
        .and(path("/listing"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = config_for(&server, &dir);
    let output_path = config.output.path.clone();
    std::fs::write(&output_path, "stale line from an earlier run\n").unwrap();

    let harvester = Harvester::new(config).await.unwrap();
    let err = harvester.run().await.unwrap_err();

    assert!(
        matches!(err, Error::Enumeration(_)),
        "page-0 failure must terminate the run: {err}"
    );
    // Truncation happens at the start of the run, before the fatal fetch
    assert_eq!(std::fs::read_to_string(&output_path).unwrap(), "");
}

#[tokio::test]
async fn second_run_is_served_from_the_cache() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let addr = server.address();
    Mock::given(method("GET"))
        .and(path("/proxies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{
                "proxy_address": addr.ip().to_string(),
                "port": addr.port(),
                "username": "u",
                "password": "p"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Every upstream endpoint may be hit exactly once; the second run must
    // come entirely out of the cache.
    Mock::given(method("GET"))
        .and(path("/listing"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"totalAgents": 2, "agent": [{"id": "a-1"}, {"id": "a-2"}]}
        })))
        .expect(1)
        .mount(&server)
        .await;
    for id in ["a-1", "a-2"] {
        Mock::given(method("GET"))
            .and(path(format!("/agents/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"name": format!("Agent {id}")}
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let harvester = Harvester::new(config_for(&server, &dir)).await.unwrap();

    let first = harvester.run().await.unwrap();
    let second = harvester.run().await.unwrap();

    assert_eq!(first.records_written, 2);
    assert_eq!(second.records_written, 2);
    assert!(second.is_complete());

    // Output is rewritten, not appended, across runs
    let records = read_records(&dir.path().join("out.ndjson"));
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn events_mirror_run_progress() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_credential_service(&server).await;
    mount_listing_page(&server, 0, 2, &["a-1", "a-2"]).await;
    for id in ["a-1", "a-2"] {
        mount_detail(&server, id).await;
    }

    let harvester = Harvester::new(config_for(&server, &dir)).await.unwrap();
    let mut events = harvester.subscribe();

    harvester.run().await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }

    assert!(
        matches!(
            seen.first(),
            Some(Event::EnumerationStarted { total_count: 2, page_count: 1 })
        ),
        "first event should announce the learned totals: {:?}",
        seen.first()
    );
    let written = seen
        .iter()
        .filter(|e| matches!(e, Event::RecordWritten { .. }))
        .count();
    assert_eq!(written, 2);
    assert!(
        matches!(seen.last(), Some(Event::Completed { records_written: 2, .. })),
        "last event should be completion: {:?}",
        seen.last()
    );
}

#[tokio::test]
async fn invalid_config_is_rejected_at_construction() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    let mut config = config_for(&server, &dir);
    config.api.listing_url = "https://api.example.com/no-placeholders".to_string();

    let err = Harvester::new(config).await.unwrap_err();
    assert!(matches!(err, Error::Config { .. }), "got: {err}");
}
