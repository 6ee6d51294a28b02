//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use rent_trawl::config::{load_config_with_hash, parse_config, Config};
use rent_trawl::crawler::{Coordinator, HttpFetcher, RunOptions};
use rent_trawl::output::{load_url_list, url_list_path};
use rent_trawl::search::CrawlJob;
use rent_trawl::storage::{RunStatus, SqliteStorage, Store};
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DETAIL: &str = include_str!("../fixtures/detail_page.html");

/// Creates a test configuration for one Chicago job against `site`
fn create_test_config(site: &str, dir: &TempDir, end_price: u32, max_page: u32) -> Config {
    parse_config(&format!(
        r#"
[fetcher]
site-url = "{site}"
request-timeout-secs = 5
connect-timeout-secs = 5

[politeness]
job-cooldown-secs = 0

[store]
database-path = '{db}'

[output]
urls-dir = '{urls}'

[[job]]
city = "Chicago"
state = "IL"
start-price = 500
end-price = {end_price}
price-step = 200
max-page = {max_page}
"#,
        db = dir.path().join("listings.db").display(),
        urls = dir.path().join("raw").display(),
    ))
    .expect("test config is valid")
}

/// Search-results page with one listing card per slug
fn listing_page(slugs: &[&str]) -> String {
    let cards: String = slugs
        .iter()
        .map(|slug| {
            format!(
                r#"<li class="mortar-wrapper">
                    <article><a class="property-link" href="/{slug}/">{slug}</a></article>
                </li>"#
            )
        })
        .collect();
    format!(r#"<html><body><div id="placardContainer"><ul>{cards}</ul></div></body></html>"#)
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

async fn mount_redirect(server: &MockServer, route: &str, location: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(301).insert_header("location", location))
        .mount(server)
        .await;
}

fn coordinator(config: Config, options: RunOptions) -> Coordinator<HttpFetcher> {
    Coordinator::new(config, "test-hash".to_string(), options, CancellationToken::new())
        .expect("HTTP client builds")
}

#[tokio::test]
async fn test_full_crawl_single_city() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    // Band [500, 700): three listings, then the site redirects
    mount_page(
        &mock_server,
        "/chicago-il/500-to-700/1/",
        listing_page(&["lakeshore-commons", "elm-court", "shared-tower"]),
    )
    .await;
    mount_redirect(&mock_server, "/chicago-il/500-to-700/2/", "/chicago-il/").await;

    // Band [700, 900): two listings, one already seen
    mount_page(
        &mock_server,
        "/chicago-il/700-to-900/1/",
        listing_page(&["shared-tower", "north-point"]),
    )
    .await;
    mount_page(&mock_server, "/chicago-il/700-to-900/2/", listing_page(&[])).await;

    // Only one detail page is served; the others answer 404
    mount_page(&mock_server, "/lakeshore-commons/", DETAIL.to_string()).await;

    let config = create_test_config(&mock_server.uri(), &dir, 900, 2);
    let reports = coordinator(config, RunOptions::default())
        .run()
        .await
        .expect("crawl succeeds");

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.summary.discovery.urls_seen, 5);
    assert_eq!(report.summary.discovery.unique_urls, 4);
    assert_eq!(report.summary.discovery.bands_ended_by_redirect, 1);
    assert_eq!(report.summary.properties_inserted, 1);
    assert_eq!(report.summary.units_inserted, 1);
    assert_eq!(report.summary.units_discarded, 1);
    assert_eq!(report.summary.skipped, 3);

    // The URL list is written before the detail phase
    let list_path = dir.path().join("raw").join("chicago-il_property_urls.txt");
    let urls = load_url_list(&list_path).unwrap().expect("URL list saved");
    assert_eq!(urls.len(), 4);
    assert!(urls.contains(&format!("{}/shared-tower/", mock_server.uri())));

    // Verify database state
    let storage = SqliteStorage::new(&dir.path().join("listings.db")).unwrap();
    assert_eq!(storage.count_properties(None).unwrap(), 1);
    assert_eq!(storage.count_units(None).unwrap(), 1);

    let property = storage
        .get_property("Lakeshore Commons", "60614")
        .unwrap()
        .expect("property stored");
    assert_eq!(property.city_name, "Chicago");
    assert_eq!(
        property.source_url,
        format!("{}/lakeshore-commons/", mock_server.uri())
    );

    let run = storage.get_run(report.run_id.unwrap()).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
    assert_eq!(run.urls_discovered, 4);
}

#[tokio::test]
async fn test_redirect_ends_band_before_later_pages() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    mount_page(
        &mock_server,
        "/chicago-il/500-to-700/1/",
        listing_page(&["a"]),
    )
    .await;
    mount_page(
        &mock_server,
        "/chicago-il/500-to-700/2/",
        listing_page(&["b"]),
    )
    .await;
    mount_redirect(&mock_server, "/chicago-il/500-to-700/3/", "/chicago-il/").await;

    // Pages past the redirect must never be requested
    for page in 4..=5 {
        Mock::given(method("GET"))
            .and(path(format!("/chicago-il/500-to-700/{}/", page)))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;
    }

    let config = create_test_config(&mock_server.uri(), &dir, 700, 5);
    let report = coordinator(
        config,
        RunOptions {
            dry_run: true,
            ..RunOptions::default()
        },
    )
    .run()
    .await
    .unwrap()
    .remove(0);

    assert_eq!(report.summary.discovery.pages_fetched, 2);
    assert_eq!(report.summary.discovery.bands_ended_by_redirect, 1);
    assert_eq!(report.summary.discovery.unique_urls, 2);
}

#[tokio::test]
async fn test_server_error_is_not_a_boundary() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/chicago-il/500-to-700/1/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chicago-il/500-to-700/2/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&["late-find"])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), &dir, 700, 2);
    let report = coordinator(
        config,
        RunOptions {
            dry_run: true,
            ..RunOptions::default()
        },
    )
    .run()
    .await
    .unwrap()
    .remove(0);

    assert_eq!(report.summary.discovery.pages_failed, 1);
    assert_eq!(report.summary.discovery.unique_urls, 1);
    assert!(!dir.path().join("listings.db").exists());
}

#[tokio::test]
async fn test_redirected_detail_page_is_followed() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    mount_page(
        &mock_server,
        "/chicago-il/500-to-700/1/",
        listing_page(&["old-listing"]),
    )
    .await;
    mount_redirect(&mock_server, "/old-listing/", "/lakeshore-commons/").await;
    mount_page(&mock_server, "/lakeshore-commons/", DETAIL.to_string()).await;

    let config = create_test_config(&mock_server.uri(), &dir, 700, 1);
    let report = coordinator(config, RunOptions::default())
        .run()
        .await
        .unwrap()
        .remove(0);

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.summary.properties_inserted, 1);
    assert_eq!(report.summary.units_inserted, 1);
    assert_eq!(report.summary.skipped, 0);

    let storage = SqliteStorage::new(&dir.path().join("listings.db")).unwrap();
    let property = storage
        .get_property("Lakeshore Commons", "60614")
        .unwrap()
        .expect("property stored");
    assert_eq!(
        property.source_url,
        format!("{}/old-listing/", mock_server.uri())
    );
}

#[tokio::test]
async fn test_rescrape_updates_property_and_appends_units() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    mount_page(
        &mock_server,
        "/chicago-il/500-to-700/1/",
        listing_page(&["lakeshore-commons"]),
    )
    .await;
    mount_page(&mock_server, "/lakeshore-commons/", DETAIL.to_string()).await;

    let config = create_test_config(&mock_server.uri(), &dir, 700, 1);
    let first = coordinator(config.clone(), RunOptions::default())
        .run()
        .await
        .unwrap();
    let second = coordinator(
        config,
        RunOptions {
            resume: true,
            ..RunOptions::default()
        },
    )
    .run()
    .await
    .unwrap();

    assert_eq!(first[0].summary.properties_inserted, 1);
    assert_eq!(second[0].summary.properties_updated, 1);
    assert_eq!(second[0].summary.properties_inserted, 0);

    let storage = SqliteStorage::new(&dir.path().join("listings.db")).unwrap();
    assert_eq!(storage.count_properties(Some("Chicago")).unwrap(), 1);
    assert_eq!(storage.count_units(Some("Chicago")).unwrap(), 2);
    assert_eq!(storage.recent_runs(10).unwrap().len(), 2);
}

#[tokio::test]
async fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("trawl.toml");
    std::fs::write(
        &config_path,
        r#"
[store]
database-path = "listings.db"

[output]
urls-dir = "raw"

[[job]]
city = "Chicago"
state = "IL"

[[job]]
city = "New York"
state = "NY"
end-price = 4000
"#,
    )
    .unwrap();

    let (config, hash) = load_config_with_hash(&config_path).unwrap();
    assert_eq!(hash.len(), 64);
    assert_eq!(config.jobs.len(), 2);

    let job = CrawlJob::from_config(&config.jobs[1], &config);
    assert_eq!(
        url_list_path(Path::new(&config.output.urls_dir), &job),
        Path::new("raw").join("new-york-ny_property_urls.txt")
    );
    assert_eq!(
        job.page_url(job.bands()[0], 1),
        "https://www.apartments.com/new-york-ny/500-to-700/1/"
    );
}
