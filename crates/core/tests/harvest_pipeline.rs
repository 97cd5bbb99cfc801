//! Harvest integration tests.
//!
//! These run the full pipeline with the real HTTP client against a local
//! mock server:
//! - Every merged item on every page ends up in the table
//! - Failed pages and failed lookups are dropped, not fatal
//! - Repeated runs over the same data produce identical output

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use prharvest_core::testing::fixtures;
use prharvest_core::{
    create_sink, load_config_from_str, ApiTransport, ChecksStatus, Config, HarvestPipeline,
    HarvestReport, OutputFormat, ResilientClient,
};

const TOKEN: &str = "test-token";

fn config_for(server: &MockServer) -> Config {
    let toml = format!(
        r#"
        [source]
        container = "{container}"

        [api]
        base_url = "{base}"
        timeout_secs = 5

        [retry]
        max_retries = 2
        backoff_factor_ms = 1
        max_backoff_secs = 1

        [concurrency]
        page_workers = 4
        enrich_workers = 4
        "#,
        container = fixtures::CONTAINER,
        base = server.uri()
    );
    load_config_from_str(&toml).expect("Failed to parse test config")
}

fn pulls_path() -> String {
    format!("/repos/{}/pulls", fixtures::CONTAINER)
}

fn link_header(server: &MockServer, last: u32) -> String {
    let page_url = |page: u32| {
        format!(
            "{}{}?state=closed&per_page=100&page={}",
            server.uri(),
            pulls_path(),
            page
        )
    };
    format!(
        "<{}>; rel=\"next\", <{}>; rel=\"last\"",
        page_url(2),
        page_url(last)
    )
}

/// Serve `pages` as the listing, with page 1 advertising the last page.
async fn mount_pages(server: &MockServer, pages: &[Vec<(u64, bool)>]) {
    let last = pages.len() as u32;
    for (index, items) in pages.iter().enumerate() {
        let page = index as u32 + 1;
        let body: Vec<Value> = items
            .iter()
            .map(|(n, merged)| fixtures::pull_json(*n, *merged))
            .collect();
        let mut response = ResponseTemplate::new(200).set_body_json(json!(body));
        if page == 1 && last > 1 {
            response = response.insert_header("link", link_header(server, last).as_str());
        }
        Mock::given(method("GET"))
            .and(path(pulls_path()))
            .and(query_param("page", page.to_string()))
            .respond_with(response)
            .mount(server)
            .await;
    }
}

async fn mount_reviews(server: &MockServer, number: u64, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/repos/{}/pulls/{}/reviews", fixtures::CONTAINER, number)))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn mount_check_runs(server: &MockServer, number: u64, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!(
            "/repos/{}/commits/{}/check-runs",
            fixtures::CONTAINER,
            fixtures::sha_for(number)
        )))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Approved when `number` is even, checks passing when divisible by 3.
async fn mount_lookups(server: &MockServer, number: u64) {
    let state = if number % 2 == 0 { "APPROVED" } else { "CHANGES_REQUESTED" };
    mount_reviews(
        server,
        number,
        ResponseTemplate::new(200).set_body_json(json!([fixtures::review_json(state)])),
    )
    .await;

    let conclusion = if number % 3 == 0 { "success" } else { "failure" };
    mount_check_runs(
        server,
        number,
        ResponseTemplate::new(200).set_body_json(fixtures::check_runs_body(vec![
            fixtures::check_run_json("completed", Some(conclusion)),
        ])),
    )
    .await;
}

async fn harvest(server: &MockServer) -> HarvestReport {
    let config = config_for(server);
    let client = ResilientClient::new(&config.api, config.retry.clone(), TOKEN)
        .expect("Failed to build client");
    let transport: Arc<dyn ApiTransport> = Arc::new(client);
    HarvestPipeline::new(&config, transport)
        .run()
        .await
        .expect("Harvest failed")
}

async fn page_requests(server: &MockServer) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for request in server.received_requests().await.unwrap_or_default() {
        if request.url.path() != pulls_path() {
            continue;
        }
        let page = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "page")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();
        *counts.entry(page).or_insert(0) += 1;
    }
    counts
}

#[tokio::test]
async fn test_every_merged_item_is_tabled() {
    let server = MockServer::start().await;
    mount_pages(
        &server,
        &[
            vec![(1, true), (2, false), (3, true)],
            vec![(4, true), (5, true)],
            vec![(6, false), (7, true)],
        ],
    )
    .await;
    for number in [1, 3, 4, 5, 7] {
        mount_lookups(&server, number).await;
    }

    let report = harvest(&server).await;

    assert!(report.is_complete());
    assert_eq!(report.page_count, 3);
    assert_eq!(report.items_fetched, 5);

    let rows = report.table.rows();
    let numbers: Vec<u64> = rows.iter().map(|r| r.number).collect();
    assert_eq!(numbers, vec![1, 3, 4, 5, 7]);

    let row_4 = &rows[2];
    assert!(row_4.review_approved);
    assert_eq!(row_4.checks_status, ChecksStatus::Failed);
    assert_eq!(row_4.author, "dev4");

    let row_3 = &rows[1];
    assert!(!row_3.review_approved);
    assert_eq!(row_3.checks_status, ChecksStatus::Passed);
}

#[tokio::test]
async fn test_each_discovered_page_requested() {
    let server = MockServer::start().await;
    mount_pages(&server, &[vec![(1, false)], vec![(2, false)], vec![(3, false)]]).await;

    let report = harvest(&server).await;
    assert_eq!(report.page_count, 3);
    assert!(report.table.is_empty());

    let counts = page_requests(&server).await;
    // Page 1 is requested once for discovery and once by the page stage.
    assert_eq!(counts.get("1"), Some(&2));
    assert_eq!(counts.get("2"), Some(&1));
    assert_eq!(counts.get("3"), Some(&1));
    assert_eq!(counts.len(), 3);
}

#[tokio::test]
async fn test_failed_page_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(pulls_path()))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([fixtures::pull_json(1, true)]))
                .insert_header("link", link_header(&server, 3).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(pulls_path()))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(pulls_path()))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([fixtures::pull_json(9, true)])))
        .mount(&server)
        .await;
    mount_lookups(&server, 1).await;
    mount_lookups(&server, 9).await;

    let report = harvest(&server).await;

    assert_eq!(report.page_count, 3);
    assert_eq!(report.failed_pages, vec![2]);
    let numbers: Vec<u64> = report.table.rows().iter().map(|r| r.number).collect();
    assert_eq!(numbers, vec![1, 9]);

    // One attempt plus two retries.
    assert_eq!(page_requests(&server).await.get("2"), Some(&3));
}

#[tokio::test]
async fn test_item_with_failed_lookup_is_omitted() {
    let server = MockServer::start().await;
    mount_pages(&server, &[vec![(1, true), (2, true), (3, true)]]).await;
    mount_lookups(&server, 1).await;
    mount_lookups(&server, 3).await;
    mount_reviews(&server, 2, ResponseTemplate::new(404)).await;
    mount_check_runs(
        &server,
        2,
        ResponseTemplate::new(200).set_body_json(fixtures::check_runs_body(vec![])),
    )
    .await;

    let report = harvest(&server).await;

    let numbers: Vec<u64> = report.table.rows().iter().map(|r| r.number).collect();
    assert_eq!(numbers, vec![1, 3]);
    assert_eq!(report.items_fetched, 3);
    assert_eq!(report.items_enriched, 2);
    assert_eq!(report.failed_items.len(), 1);
    assert_eq!(report.failed_items[0].key, "2");
}

#[tokio::test]
async fn test_no_checks_reported_as_no_checks() {
    let server = MockServer::start().await;
    mount_pages(&server, &[vec![(5, true)]]).await;
    mount_reviews(
        &server,
        5,
        ResponseTemplate::new(200).set_body_json(json!([])),
    )
    .await;
    mount_check_runs(
        &server,
        5,
        ResponseTemplate::new(200).set_body_json(fixtures::check_runs_body(vec![])),
    )
    .await;

    let report = harvest(&server).await;

    let row = &report.table.rows()[0];
    assert!(!row.review_approved);
    assert_eq!(row.checks_status, ChecksStatus::NoChecks);
}

#[tokio::test]
async fn test_repeated_runs_are_identical() {
    let server = MockServer::start().await;
    let pages: Vec<Vec<(u64, bool)>> = (0..4u64)
        .map(|p| (1..=10u64).map(|i| (p * 10 + i, i % 4 != 0)).collect())
        .collect();
    mount_pages(&server, &pages).await;
    for (number, merged) in pages.iter().flatten() {
        if *merged {
            mount_lookups(&server, *number).await;
        }
    }

    let first = harvest(&server).await;
    let second = harvest(&server).await;

    let merged = pages.iter().flatten().filter(|(_, merged)| *merged).count();
    assert_eq!(merged, 32);
    assert_eq!(first.table.len(), merged);
    assert_eq!(first.table, second.table);
    assert_eq!(
        first.table.fingerprint().unwrap(),
        second.table.fingerprint().unwrap()
    );

    let dir = TempDir::new().unwrap();
    let mut output = config_for(&server).output;
    output.format = OutputFormat::Json;

    output.path = dir.path().join("first.json");
    create_sink(&output).write(&first.table).unwrap();
    output.path = dir.path().join("second.json");
    create_sink(&output).write(&second.table).unwrap();

    assert_eq!(
        fs::read(dir.path().join("first.json")).unwrap(),
        fs::read(dir.path().join("second.json")).unwrap()
    );
}

#[tokio::test]
async fn test_unauthorized_discovery_aborts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(pulls_path()))
        .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let client = ResilientClient::new(&config.api, config.retry.clone(), TOKEN).unwrap();
    let result = HarvestPipeline::new(&config, Arc::new(client)).run().await;

    assert!(result.is_err());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_malformed_unmerged_element_keeps_page() {
    let server = MockServer::start().await;
    let mut unmerged = fixtures::pull_json(2, false);
    unmerged["base"]["repo"] = Value::Null;
    Mock::given(method("GET"))
        .and(path(pulls_path()))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([fixtures::pull_json(1, true), unmerged])),
        )
        .mount(&server)
        .await;
    mount_lookups(&server, 1).await;

    let report = harvest(&server).await;

    assert!(report.is_complete());
    let numbers: Vec<u64> = report.table.rows().iter().map(|r| r.number).collect();
    assert_eq!(numbers, vec![1]);
}
