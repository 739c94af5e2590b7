//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end. Cancellation is driven through an
//! in-process transport so timing stays deterministic.

use async_trait::async_trait;
use catalog_sweep::config::{parse_config, Config};
use catalog_sweep::crawler::{Coordinator, CrawlEvent, RecordingObserver, Transport};
use catalog_sweep::output::{build_exporter, Exporter, JsonExporter};
use catalog_sweep::{CrawlError, ExtractError, FetchError, FieldValue};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, baseline: usize, extra: &str) -> Config {
    let content = format!(
        r#"
[site]
base-url = "{base_url}"
catalog-path = "/catalog/"
section-selector = ".image a"

[crawler]
page-size-baseline = {baseline}
max-pages-per-section = 20
fetch-concurrency = 4
fetch-timeout-ms = 2000

[listing]
layout = "detail-links"
item-selector = "a.thumb"
{extra}

[[field]]
name = "name"
selector = "h1"
required = true

[[field]]
name = "price"
selector = ".price"
kind = "number"

[output]
path = "products.json"
"#
    );
    parse_config(&content).unwrap()
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!("<html><body>{}</body></html>", body))
        .insert_header("content-type", "text/html; charset=utf-8")
}

fn thumbs(hrefs: &[&str]) -> String {
    hrefs
        .iter()
        .map(|href| format!(r#"<a class="thumb" href="{}">item</a>"#, href))
        .collect()
}

async fn mount_catalog(server: &MockServer, sections: &[&str]) {
    let links: String = sections
        .iter()
        .map(|href| format!(r#"<div class="image"><a href="{}">section</a></div>"#, href))
        .collect();
    Mock::given(method("GET"))
        .and(path("/catalog/"))
        .respond_with(html(&links))
        .mount(server)
        .await;
}

async fn mount_listing(server: &MockServer, section: &str, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path(section))
        .and(query_param("PAGEN_1", page.to_string()))
        .respond_with(html(&body))
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, detail: &str, name: &str, price: &str) {
    Mock::given(method("GET"))
        .and(path(detail))
        .respond_with(html(&format!(
            r#"<h1>{}</h1><span class="price">{}</span>"#,
            name, price
        )))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_detail_links() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // The second section link carries the trailing colon some catalogs emit
    mount_catalog(&mock_server, &["/catalog/tiles/", "/catalog/paint/:"]).await;

    mount_listing(&mock_server, "/catalog/tiles/", 1, thumbs(&["/p/1/", "/p/2/", "/p/3/"])).await;
    mount_listing(&mock_server, "/catalog/tiles/", 2, thumbs(&["/p/4/", "/p/5/"])).await;
    // /p/1/ is listed again in another section; /p/6/: carries a trailing colon
    mount_listing(&mock_server, "/catalog/paint/", 1, thumbs(&["/p/1/", "/p/6/:"])).await;

    mount_detail(&mock_server, "/p/1/", "Tile 1", "1,250.50").await;
    mount_detail(&mock_server, "/p/2/", "Tile 2", "99").await;
    // /p/3/ is not mounted and answers 404
    mount_detail(&mock_server, "/p/4/", "Tile 4", "10.5 USD").await;
    mount_detail(&mock_server, "/p/5/", "Tile 5", "on request").await;
    mount_detail(&mock_server, "/p/6/", "Paint 6", "7").await;

    let config = create_test_config(&base_url, 3, "");
    let report = Coordinator::new(config).unwrap().run().await;

    assert!(report.outcome.is_ok(), "outcome: {:?}", report.outcome);

    // /p/3/ fails with 404, /p/5/ has a malformed price
    let stats = report.stats;
    assert_eq!(stats.sections, 2);
    assert_eq!(stats.listing_pages, 3);
    assert_eq!(stats.discovered, 6);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.fetched, 4);
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.cancelled, 0);
    assert_eq!(stats.discovered, stats.fetched + stats.failed + stats.cancelled);

    assert_eq!(report.records.len(), 4);
    let urls: HashSet<&str> = report.records.iter().map(|r| r.url()).collect();
    assert_eq!(urls.len(), report.records.len());
    assert!(urls.contains(format!("{}/p/6/", base_url).as_str()));

    let first = report
        .records
        .iter()
        .find(|r| r.url().ends_with("/p/1/"))
        .unwrap();
    assert_eq!(first.get("name"), Some(&FieldValue::from("Tile 1")));
    assert_eq!(first.get("price"), Some(&FieldValue::Number(1250.5)));
}

#[tokio::test]
async fn test_pagination_stops_on_partial_page() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_catalog(&mock_server, &["/catalog/tiles/"]).await;

    let mut detail = 0;
    for (page, count) in [(1, 48), (2, 48), (3, 47)] {
        let hrefs: Vec<String> = (0..count)
            .map(|_| {
                detail += 1;
                format!("/p/{}/", detail)
            })
            .collect();
        let refs: Vec<&str> = hrefs.iter().map(String::as_str).collect();
        mount_listing(&mock_server, "/catalog/tiles/", page, thumbs(&refs)).await;
    }

    Mock::given(method("GET"))
        .and(path("/catalog/tiles/"))
        .and(query_param("PAGEN_1", "4"))
        .respond_with(html(""))
        .expect(0)
        .mount(&mock_server)
        .await;

    // Any detail page
    Mock::given(method("GET"))
        .respond_with(html(r#"<h1>Product</h1><span class="price">1</span>"#))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, 48, "");
    let report = Coordinator::new(config).unwrap().run().await;

    assert!(report.is_success());
    assert_eq!(report.sections.len(), 1);
    assert_eq!(report.sections[0].pages, 3);
    assert_eq!(report.sections[0].items, 143);
    assert_eq!(report.records.len(), 143);
    assert_eq!(report.stats.fetched, 143);
}

#[tokio::test]
async fn test_empty_section_stops_after_first_page() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_catalog(&mock_server, &["/catalog/empty/"]).await;
    mount_listing(&mock_server, "/catalog/empty/", 1, String::new()).await;

    Mock::given(method("GET"))
        .and(path("/catalog/empty/"))
        .and(query_param("PAGEN_1", "2"))
        .respond_with(html(""))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, 48, "");
    let report = Coordinator::new(config).unwrap().run().await;

    assert!(report.is_success());
    assert_eq!(report.sections[0].pages, 1);
    assert_eq!(report.sections[0].termination.label(), "exhausted");
    assert!(report.records.is_empty());
}

#[tokio::test]
async fn test_missing_required_field_is_counted_as_failed() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_catalog(&mock_server, &["/catalog/tiles/"]).await;
    mount_listing(&mock_server, "/catalog/tiles/", 1, thumbs(&["/p/1/", "/p/2/"])).await;
    mount_detail(&mock_server, "/p/1/", "Tile 1", "5").await;
    Mock::given(method("GET"))
        .and(path("/p/2/"))
        .respond_with(html(r#"<span class="price">5</span>"#))
        .mount(&mock_server)
        .await;

    let observer = Arc::new(RecordingObserver::new());
    let config = create_test_config(&base_url, 48, "");
    let report = Coordinator::new(config)
        .unwrap()
        .with_observer(observer.clone())
        .run()
        .await;

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.stats.failed, 1);

    let failures: Vec<CrawlEvent> = observer
        .events()
        .into_iter()
        .filter(|e| matches!(e, CrawlEvent::ExtractFailed { .. }))
        .collect();
    assert_eq!(failures.len(), 1);
    match &failures[0] {
        CrawlEvent::ExtractFailed { url, error } => {
            assert!(url.ends_with("/p/2/"));
            assert_eq!(*error, ExtractError::MissingField("name".to_string()));
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_concurrent_sections_share_dedup() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_catalog(&mock_server, &["/catalog/tiles/", "/catalog/floor/"]).await;

    // Both listings answer slowly so the two sections paginate at the same time
    for (section, hrefs) in [
        ("/catalog/tiles/", ["/p/1/", "/p/2/", "/p/3/", "/p/4/"]),
        ("/catalog/floor/", ["/p/3/", "/p/4/", "/p/5/", "/p/6/"]),
    ] {
        Mock::given(method("GET"))
            .and(path(section))
            .and(query_param("PAGEN_1", "1"))
            .respond_with(html(&thumbs(&hrefs)).set_delay(Duration::from_millis(200)))
            .mount(&mock_server)
            .await;
    }

    // Any detail page
    Mock::given(method("GET"))
        .respond_with(html(r#"<h1>Product</h1><span class="price">1</span>"#))
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&base_url, 48, "");
    config.crawler.section_concurrency = 2;
    let report = Coordinator::new(config).unwrap().run().await;

    assert!(report.is_success());
    assert_eq!(report.sections.len(), 2);
    assert!(report.sections.iter().all(|s| s.items == 4));

    let urls: HashSet<&str> = report.records.iter().map(|r| r.url()).collect();
    assert_eq!(urls.len(), report.records.len());
    assert_eq!(report.records.len(), 6);
    assert_eq!(report.stats.discovered, 6);
    assert_eq!(report.stats.duplicates, 2);
    assert_eq!(report.stats.fetched, 6);
}

#[tokio::test]
async fn test_failed_section_does_not_stop_siblings() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_catalog(&mock_server, &["/catalog/broken/", "/catalog/tiles/"]).await;
    Mock::given(method("GET"))
        .and(path("/catalog/broken/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;
    mount_listing(&mock_server, "/catalog/tiles/", 1, thumbs(&["/p/1/"])).await;
    mount_detail(&mock_server, "/p/1/", "Tile 1", "5").await;

    let config = create_test_config(&base_url, 48, "");
    let report = Coordinator::new(config).unwrap().run().await;

    assert!(report.is_success());
    assert_eq!(report.stats.sections, 2);
    assert_eq!(report.stats.sections_failed, 1);
    assert_eq!(report.records.len(), 1);
}

#[tokio::test]
async fn test_catalog_failure_still_finalizes() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/catalog/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, 48, "");
    let report = Coordinator::new(config).unwrap().run().await;

    match &report.outcome {
        Err(CrawlError::Catalog { source, .. }) => {
            assert!(matches!(source, FetchError::HttpStatus { status: 500, .. }));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(report.records.is_empty());
    assert!(report.sections.is_empty());
    assert_eq!(report.stats.discovered, 0);

    // Finalization still produces a (possibly empty) export
    let dir = tempfile::TempDir::new().unwrap();
    let exported = JsonExporter::new(dir.path().join("out.json"))
        .export(&report.records)
        .unwrap();
    assert_eq!(exported, 0);
}

#[tokio::test]
async fn test_inline_records_override() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_catalog(&mock_server, &["/catalog/samples/"]).await;
    mount_listing(
        &mock_server,
        "/catalog/samples/",
        1,
        r#"
        <div class="item">
          <h1>Sample A</h1><span class="price">3</span><a class="sku" href="/s/a/">a</a>
        </div>
        <div class="item">
          <h1>Sample B</h1><span class="price">4</span><a class="sku" href="/s/b/">b</a>
        </div>
        <div class="item"><span class="price">5</span></div>
        "#
        .to_string(),
    )
    .await;

    let extra = r#"
[[listing.override]]
path-prefix = "/catalog/samples/"
layout = "inline-records"
item-selector = ".item"
key-field = "sku"

[[field]]
name = "sku"
selector = "a.sku"
attr = "href"
kind = "url"
"#;
    let config = create_test_config(&base_url, 48, extra);
    let report = Coordinator::new(config).unwrap().run().await;

    assert!(report.is_success());
    assert_eq!(report.stats.discovered, 3);
    assert_eq!(report.stats.fetched, 2);
    assert_eq!(report.stats.failed, 1);

    let mut urls: Vec<&str> = report.records.iter().map(|r| r.url()).collect();
    urls.sort();
    assert_eq!(
        urls,
        vec![
            format!("{}/s/a/", base_url).as_str(),
            format!("{}/s/b/", base_url).as_str()
        ]
    );
}

#[tokio::test]
async fn test_sqlite_export_of_crawl() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_catalog(&mock_server, &["/catalog/tiles/"]).await;
    mount_listing(&mock_server, "/catalog/tiles/", 1, thumbs(&["/p/1/", "/p/2/"])).await;
    mount_detail(&mock_server, "/p/1/", "Tile 1", "5").await;
    mount_detail(&mock_server, "/p/2/", "Tile 2", "6").await;

    let dir = tempfile::TempDir::new().unwrap();
    let db_path = dir.path().join("products.db");
    let mut config = create_test_config(&base_url, 48, "");
    config.output.format = catalog_sweep::config::OutputFormat::Sqlite;
    config.output.path = db_path.display().to_string();

    let exporter = build_exporter(&config.output, &config.fields);
    let report = Coordinator::new(config).unwrap().run().await;
    assert_eq!(exporter.export(&report.records).unwrap(), 2);

    let conn = rusqlite::Connection::open(&db_path).unwrap();
    let total: f64 = conn
        .query_row("SELECT SUM(price) FROM records", [], |row| row.get(0))
        .unwrap();
    assert_eq!(total, 11.0);
}

/// Serves a catalog with one section of slow detail pages
struct SlowShop {
    detail_delay: Duration,
}

#[async_trait]
impl Transport for SlowShop {
    async fn get(&self, url: &str) -> Result<String, FetchError> {
        let body = if url.ends_with("/catalog/") {
            r#"<div class="image"><a href="/catalog/slow/">slow</a></div>"#.to_string()
        } else if url.contains("PAGEN_1=1") {
            thumbs(&["/p/1/", "/p/2/", "/p/3/", "/p/4/"])
        } else if url.contains("PAGEN_1=") {
            String::new()
        } else {
            tokio::time::sleep(self.detail_delay).await;
            "<h1>Slow</h1>".to_string()
        };
        Ok(format!("<html><body>{}</body></html>", body))
    }
}

#[tokio::test]
async fn test_cancellation_settles_all_work() {
    let config = create_test_config("https://shop.test", 48, "");
    let coordinator = Coordinator::with_transport(
        config,
        Arc::new(SlowShop {
            detail_delay: Duration::from_secs(30),
        }),
    )
    .unwrap();

    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let report = tokio::time::timeout(Duration::from_secs(10), coordinator.run())
        .await
        .expect("cancelled run must finish promptly");

    assert!(matches!(report.outcome, Err(CrawlError::Cancelled)));
    assert!(report.records.is_empty());
    assert_eq!(report.stats.discovered, 4);
    assert_eq!(report.stats.cancelled, 4);
    assert_eq!(report.stats.failed, 0);
}

#[tokio::test]
async fn test_run_timeout_cancels() {
    let mut config = create_test_config("https://shop.test", 48, "");
    config.crawler.run_timeout_secs = Some(1);

    let coordinator = Coordinator::with_transport(
        config,
        Arc::new(SlowShop {
            detail_delay: Duration::from_secs(30),
        }),
    )
    .unwrap();

    let report = tokio::time::timeout(Duration::from_secs(10), coordinator.run())
        .await
        .expect("run timeout must end the run");

    assert!(matches!(report.outcome, Err(CrawlError::Cancelled)));
    assert_eq!(
        report.stats.discovered,
        report.stats.fetched + report.stats.failed + report.stats.cancelled
    );
}
