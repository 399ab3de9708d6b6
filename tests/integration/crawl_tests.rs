//! Integration tests for full sweeps
//!
//! Each test builds a small site on a mock server and checks the report.

use crate::{localhost_uri, mount_page, request_count, sweep, test_config};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use sumi_sweep::config::DomainEntry;
use sumi_sweep::output::{format_markdown_report, write_report};
use sumi_sweep::{
    Coordinator, LinkOutcome, LinkVerdict, NoopObserver, PageRecord, ProgressObserver,
};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

#[tokio::test]
async fn test_diamond_topology_fetches_each_page_once() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", r#"<a href="/a">A</a> <a href="/b">B</a>"#).await;
    mount_page(&server, "/a", r#"<a href="/d">D from A</a>"#).await;
    mount_page(&server, "/b", r#"<a href="/d">D from B</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/d"))
        .respond_with(crate::html("<p>leaf</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let report = sweep(test_config(), &base).await;

    assert_eq!(report.summary.total_pages, 4);
    assert_eq!(report.summary.pages_with_errors, 0);
    assert_eq!(report.summary.unique_links, 3);
    assert_eq!(report.summary.checked, 0);
    assert_eq!(report.summary.ok, 3);
    assert!(report.issues.is_empty());
    assert!(!report.cancelled);

    // Internal targets resolve from their pages, never from a HEAD check
    assert_eq!(request_count(&server, "HEAD", "/d").await, 0);
}

#[tokio::test]
async fn test_fan_in_hub_fetched_once() {
    let server = MockServer::start().await;
    let base = server.uri();

    let spokes: String = (0..20)
        .map(|i| format!(r#"<a href="/p{}">P{}</a>"#, i, i))
        .collect();
    mount_page(&server, "/", &spokes).await;
    for i in 0..20 {
        // Every spoke links to the hub and to every other spoke
        let body = format!(r#"<a href="/hub">Hub</a>{}"#, spokes);
        mount_page(&server, &format!("/p{}", i), &body).await;
    }
    Mock::given(method("GET"))
        .and(path("/hub"))
        .respond_with(crate::html(r#"<a href="/">Home</a>"#))
        .expect(1)
        .mount(&server)
        .await;

    let report = sweep(test_config(), &base).await;

    assert_eq!(report.summary.total_pages, 22);
    assert_eq!(report.summary.broken, 0);
    for i in 0..20 {
        assert_eq!(request_count(&server, "GET", &format!("/p{}", i)).await, 1);
    }
}

#[tokio::test]
async fn test_broken_internal_page_not_revalidated() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", r#"<a href="/missing">Missing page</a>"#).await;
    Mock::given(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let report = sweep(test_config(), &base).await;

    assert_eq!(report.summary.total_pages, 2);
    assert_eq!(report.summary.pages_with_errors, 1);
    assert_eq!(report.summary.checked, 0);
    assert_eq!(report.summary.broken, 1);

    let missing = url(&format!("{}/missing", base));
    assert_eq!(
        report.issue(&missing),
        Some(&LinkOutcome::broken(Some(404), "Not Found"))
    );
    assert_eq!(report.issues[0].occurrences.len(), 1);
    assert_eq!(report.issues[0].occurrences[0].text, "Missing page");
}

#[tokio::test]
async fn test_external_links_are_checked() {
    let site = MockServer::start().await;
    let external = MockServer::start().await;
    let ext = localhost_uri(&external);

    mount_page(
        &site,
        "/",
        &format!(
            r#"<a href="{ext}/ok">Fine</a>
               <a href="{ext}/gone">Gone</a>
               <a href="{ext}/private">Members</a>
               <img src="{ext}/logo.png" alt="Logo">"#,
            ext = ext
        ),
    )
    .await;

    Mock::given(path("/ok"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&external)
        .await;
    Mock::given(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&external)
        .await;
    Mock::given(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&external)
        .await;
    Mock::given(path("/private"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&external)
        .await;

    let report = sweep(test_config(), &site.uri()).await;

    assert_eq!(report.summary.total_pages, 1);
    assert_eq!(report.summary.checked, 4);
    assert_eq!(report.summary.ok, 2);
    assert_eq!(report.summary.broken, 1);
    assert_eq!(report.summary.warnings, 1);
    assert_eq!(report.hosts.checked, 1);

    let gone = url(&format!("{}/gone", ext));
    assert_eq!(
        report.issue(&gone),
        Some(&LinkOutcome::broken(Some(404), "Not Found"))
    );

    let private = url(&format!("{}/private", ext));
    assert!(report.issue(&private).unwrap().is_warning());
    assert_eq!(report.pages[0].broken, 1);
    assert_eq!(report.pages[0].warnings, 1);

    // HEAD 404 falls back to one GET before the link is called broken
    assert_eq!(request_count(&external, "GET", "/gone").await, 1);
    assert_eq!(request_count(&external, "GET", "/ok").await, 0);
}

#[tokio::test]
async fn test_redirect_to_crawled_page() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", r#"<a href="/old">Old</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(crate::html(r#"<a href="/">Home</a> <a href="/new">Self</a>"#))
        .expect(1)
        .mount(&server)
        .await;

    let report = sweep(test_config(), &base).await;

    assert_eq!(report.summary.total_pages, 2);
    assert_eq!(report.summary.checked, 0);
    assert_eq!(report.summary.redirects, 1);
    assert_eq!(report.summary.broken, 0);

    let old = url(&format!("{}/old", base));
    assert_eq!(
        report.issue(&old),
        Some(&LinkOutcome::Redirect {
            final_url: url(&format!("{}/new", base)),
        })
    );
}

#[tokio::test]
async fn test_seed_redirect_adopts_new_origin() {
    let old_site = MockServer::start().await;
    let new_site = MockServer::start().await;
    let new_base = localhost_uri(&new_site);

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", format!("{}/", new_base).as_str()))
        .mount(&old_site)
        .await;
    mount_page(&new_site, "/", r#"<a href="/about">About</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(crate::html(r#"<a href="/">Home</a>"#))
        .expect(1)
        .mount(&new_site)
        .await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&new_site)
        .await;

    let report = sweep(test_config(), &old_site.uri()).await;

    assert_eq!(report.origin_host, "localhost");
    assert_eq!(report.summary.total_pages, 2);
    assert_eq!(report.summary.checked, 0);
    assert_eq!(report.summary.broken, 0);
}

/// Mounts `/go` on `site`, redirecting to a landing page on `other` that
/// links to three pages which do not exist
async fn mount_offsite_shortcut(site: &MockServer, other: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/go"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/landing", localhost_uri(other)).as_str()),
        )
        .mount(site)
        .await;
    mount_page(
        other,
        "/landing",
        r#"<a href="/x1">X1</a> <a href="/x2">X2</a> <a href="/x3">X3</a>"#,
    )
    .await;
}

fn assert_offsite_links_ignored(report: &sumi_sweep::Report, site: &str, other: &str) {
    let go = report
        .pages
        .iter()
        .find(|p| p.url.path() == "/go")
        .expect("/go page missing from report");
    assert_eq!(go.status, Some(200));
    assert_eq!(go.final_url, url(&format!("{}/landing", other)));
    assert_eq!(go.references, 0);
    assert_eq!(go.broken, 0);

    for target in ["x1", "x2", "x3"] {
        assert_eq!(report.issue(&url(&format!("{}/{}", other, target))), None);
    }
    assert_eq!(report.summary.broken, 0);
    assert!(report
        .issues
        .iter()
        .flat_map(|v| &v.occurrences)
        .all(|o| o.page_url.as_str().starts_with(site)));
}

#[tokio::test]
async fn test_offsite_redirect_landing_page_links_ignored() {
    let site = MockServer::start().await;
    let other = MockServer::start().await;
    let base = site.uri();

    mount_page(&site, "/", r#"<a href="/go">Our GitHub</a>"#).await;
    mount_offsite_shortcut(&site, &other).await;

    let report = sweep(test_config(), &base).await;

    assert_eq!(report.origin_host, "127.0.0.1");
    assert_eq!(report.summary.total_pages, 2);
    assert_eq!(report.summary.total_references, 1);
    assert_offsite_links_ignored(&report, &base, &localhost_uri(&other));

    for target in ["/x1", "/x2", "/x3"] {
        assert_eq!(request_count(&other, "HEAD", target).await, 0);
        assert_eq!(request_count(&other, "GET", target).await, 0);
    }
}

#[tokio::test]
async fn test_offsite_redirect_from_sitemap_page_links_ignored() {
    let site = MockServer::start().await;
    let other = MockServer::start().await;
    let base = site.uri();

    mount_page(&site, "/", "<p>Rendered by script</p>").await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!(
                r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"><url><loc>{}/go</loc></url></urlset>"#,
                base
            ),
            "application/xml",
        ))
        .mount(&site)
        .await;
    mount_offsite_shortcut(&site, &other).await;

    let mut config = test_config();
    config.crawler.sitemap_fallback = true;

    let report = sweep(config, &base).await;

    assert_eq!(report.summary.total_pages, 2);
    assert_offsite_links_ignored(&report, &base, &localhost_uri(&other));
    assert_eq!(request_count(&other, "HEAD", "/x1").await, 0);
    assert_eq!(request_count(&other, "GET", "/x1").await, 0);
}

#[tokio::test]
async fn test_robots_disallowed_page_checked_as_link() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"))
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/",
        r#"<a href="/public">Public</a> <a href="/private">Private</a>"#,
    )
    .await;
    mount_page(&server, "/public", "<p>hello</p>").await;
    Mock::given(method("GET"))
        .and(path("/private"))
        .respond_with(crate::html("<p>secret</p>"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/private"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let report = sweep(test_config(), &base).await;

    assert_eq!(report.summary.total_pages, 2);
    assert_eq!(report.summary.checked, 1);
    assert_eq!(report.summary.ok, 2);
}

#[tokio::test]
async fn test_sitemap_fallback_when_seed_has_no_links() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", "<p>Rendered by script</p>").await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{base}/</loc></url>
  <url><loc>{base}/one</loc></url>
  <url><loc>{base}/two</loc></url>
  <url><loc>https://elsewhere.example/ignored</loc></url>
</urlset>"#,
                base = base
            ),
            "application/xml",
        ))
        .mount(&server)
        .await;
    mount_page(&server, "/one", "<p>one</p>").await;
    mount_page(&server, "/two", "<p>two</p>").await;

    let mut config = test_config();
    config.crawler.sitemap_fallback = true;

    let report = sweep(config, &base).await;

    assert_eq!(report.summary.total_pages, 3);
    assert_eq!(request_count(&server, "GET", "/").await, 1);
    assert!(report.pages.iter().any(|p| p.url.path() == "/two"));
}

#[tokio::test]
async fn test_no_sitemap_fallback_when_disabled() {
    let server = MockServer::start().await;

    mount_page(&server, "/", "<p>Rendered by script</p>").await;
    Mock::given(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let report = sweep(test_config(), &server.uri()).await;
    assert_eq!(report.summary.total_pages, 1);
}

#[tokio::test]
async fn test_excluded_hosts_never_requested() {
    let site = MockServer::start().await;
    let excluded = MockServer::start().await;

    mount_page(
        &site,
        "/",
        &format!(r#"<a href="{}/tracker">Tracker</a>"#, localhost_uri(&excluded)),
    )
    .await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&excluded)
        .await;

    let mut config = test_config();
    config.exclude = vec![DomainEntry {
        domain: "localhost".to_string(),
    }];

    let report = sweep(config, &site.uri()).await;

    assert_eq!(report.summary.unique_links, 1);
    assert_eq!(report.summary.skipped, 1);
    assert_eq!(report.summary.checked, 0);
    assert_eq!(report.summary.resolved(), 0);
}

#[tokio::test]
async fn test_page_cap_stops_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();

    let links: String = (0..10)
        .map(|i| format!(r#"<a href="/p{}">P{}</a>"#, i, i))
        .collect();
    mount_page(&server, "/", &links).await;
    for i in 0..10 {
        mount_page(&server, &format!("/p{}", i), "<p>leaf</p>").await;
    }
    // Uncrawled pages are still checked as links
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut config = test_config();
    config.crawler.max_pages = 3;

    let report = sweep(config, &base).await;

    assert_eq!(report.summary.total_pages, 3);
    assert_eq!(report.summary.unique_links, 10);
    assert_eq!(report.summary.checked, 8);
    assert_eq!(report.summary.ok, 10);
}

#[tokio::test]
async fn test_cancel_before_start_returns_partial_report() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/a">A</a>"#).await;

    let coordinator = Coordinator::new(test_config(), Arc::new(NoopObserver));
    coordinator.cancel_token().cancel();

    let report = coordinator.run(&server.uri()).await.unwrap();

    assert!(report.cancelled);
    assert!(report.summary.total_pages <= 1);
    assert_eq!(report.summary.checked, 0);
}

#[derive(Default)]
struct CountingObserver {
    pages: AtomicUsize,
    verdicts: AtomicUsize,
    broken: AtomicUsize,
}

impl ProgressObserver for CountingObserver {
    fn on_page(&self, _page: &PageRecord) {
        self.pages.fetch_add(1, Ordering::SeqCst);
    }

    fn on_verdict(&self, _verdict: &LinkVerdict) {
        self.verdicts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_broken_link(&self, _verdict: &LinkVerdict) {
        self.broken.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_observer_sees_pages_and_verdicts() {
    let site = MockServer::start().await;
    let external = MockServer::start().await;
    let ext = localhost_uri(&external);

    mount_page(
        &site,
        "/",
        &format!(
            r#"<a href="/about">About</a> <a href="{ext}/up">Up</a> <a href="{ext}/down">Down</a>"#,
            ext = ext
        ),
    )
    .await;
    mount_page(&site, "/about", "<p>about</p>").await;
    Mock::given(path("/up"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&external)
        .await;
    Mock::given(path("/down"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&external)
        .await;

    let observer = Arc::new(CountingObserver::default());
    let report = Coordinator::new(test_config(), observer.clone())
        .run(&site.uri())
        .await
        .unwrap();

    assert_eq!(observer.pages.load(Ordering::SeqCst), 2);
    assert_eq!(observer.verdicts.load(Ordering::SeqCst), 2);
    assert_eq!(observer.broken.load(Ordering::SeqCst), 1);
    assert_eq!(report.summary.broken, 1);
}

#[tokio::test]
async fn test_report_written_to_disk() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/missing">Missing</a>"#).await;
    Mock::given(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let report = sweep(test_config(), &server.uri()).await;
    let markdown = format_markdown_report(&report);
    assert!(markdown.contains("## Broken Links (1)"));

    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("report.json");
    write_report(&report, sumi_sweep::config::ReportFormat::Json, &json_path).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(value["summary"]["broken"], 1);
    assert_eq!(value["issues"][0]["outcome"]["outcome"], "broken");
    assert_eq!(value["issues"][0]["outcome"]["status"], 404);
}
