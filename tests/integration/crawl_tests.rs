//! Integration tests for full crawl cycles
//!
//! These tests use wiremock to serve feeds, listings and article pages and
//! a scripted browser for rendered sources.

use crate::common::{
    feed_source, list_files, rendered_source, rss, FakeBrowser, FakePage, RecordingPacer, Workspace,
};
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use press_harvest::config::{ListPageSourceConfig, SourceConfig};
use press_harvest::crawler::{Coordinator, Pacer};
use press_harvest::state::{AbsentReason, CandidateOutcome};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JST_ARTICLE: &str = r#"<html><body>
    <section class="inr">
        <h1>Article A</h1>
        <p>Paragraph one.</p>
        <p>Paragraph two.</p>
        <div class="pr_boxDesign1 border-dashed"><p>Press contact</p></div>
    </section>
</body></html>"#;

fn coordinator(
    workspace: &Workspace,
    sources: Vec<SourceConfig>,
    browser: FakeBrowser,
) -> (Coordinator, Arc<RecordingPacer>) {
    let pacer = Arc::new(RecordingPacer::default());
    let coordinator = Coordinator::with_collaborators(
        workspace.config(sources),
        Arc::new(browser),
        pacer.clone(),
    )
    .unwrap();
    (coordinator, pacer)
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_feed_cycle_skips_seen_and_archives_new() {
    let server = MockServer::start().await;
    let a = format!("{}/articles/a", server.uri());
    let b = format!("{}/articles/b", server.uri());

    mount_page(
        &server,
        "/rss/press.xml",
        &rss(&[("Article A", a.as_str()), ("Article B", b.as_str())]),
    )
    .await;
    mount_page(&server, "/articles/a", JST_ARTICLE).await;
    Mock::given(method("GET"))
        .and(path("/articles/b"))
        .respond_with(ResponseTemplate::new(200).set_body_string(JST_ARTICLE))
        .expect(0)
        .mount(&server)
        .await;

    let workspace = Workspace::new();
    workspace.seed_ledger(&[b.as_str()]);

    let (coordinator, _pacer) = coordinator(
        &workspace,
        vec![feed_source("JST", vec![format!("{}/rss/press.xml", server.uri())])],
        FakeBrowser::default(),
    );
    let before = Local::now().naive_local();
    let report = coordinator.run_cycle().await.unwrap();

    let jst = report.source("JST").unwrap();
    assert_eq!(jst.candidates, 2);
    assert_eq!(jst.archived(), 1);
    assert_eq!(jst.count(CandidateOutcome::AlreadySeen), 1);

    let archive = workspace.data_dir().join("JST").join("JST-2024-05-01.txt");
    let content = std::fs::read_to_string(archive).unwrap();
    assert_eq!(
        content,
        "--- Article A ---\n\nArticle A\nParagraph one.\nParagraph two.\n\n"
    );

    let ledger = workspace.ledger();
    assert_eq!(ledger.len(), 2);
    let marked = NaiveDateTime::parse_from_str(&ledger[&a], "%Y-%m-%dT%H:%M:%S%.f").unwrap();
    assert!(marked >= before - chrono::Duration::seconds(1));
    assert!(marked <= Local::now().naive_local());
    assert!(ledger.contains_key(&b));
}

#[tokio::test]
async fn test_back_to_back_cycles_are_idempotent() {
    let server = MockServer::start().await;
    let a = format!("{}/articles/a", server.uri());

    mount_page(&server, "/rss/press.xml", &rss(&[("Article A", a.as_str())])).await;
    Mock::given(method("GET"))
        .and(path("/articles/a"))
        .respond_with(ResponseTemplate::new(200).set_body_string(JST_ARTICLE))
        .expect(1)
        .mount(&server)
        .await;

    let workspace = Workspace::new();
    let (coordinator, _pacer) = coordinator(
        &workspace,
        vec![feed_source("JST", vec![format!("{}/rss/press.xml", server.uri())])],
        FakeBrowser::default(),
    );

    let first = coordinator.run_cycle().await.unwrap();
    assert_eq!(first.total_archived(), 1);

    let archive = workspace.data_dir().join("JST").join("JST-2024-05-01.txt");
    let archive_before = std::fs::read_to_string(&archive).unwrap();
    let ledger_before = std::fs::read_to_string(workspace.ledger_path()).unwrap();

    let second = coordinator.run_cycle().await.unwrap();
    assert_eq!(second.total_archived(), 0);
    assert_eq!(
        second.source("JST").unwrap().count(CandidateOutcome::AlreadySeen),
        1
    );

    assert_eq!(std::fs::read_to_string(&archive).unwrap(), archive_before);
    assert_eq!(
        std::fs::read_to_string(workspace.ledger_path()).unwrap(),
        ledger_before
    );
}

#[tokio::test]
async fn test_fetch_failure_is_not_marked_seen() {
    let server = MockServer::start().await;
    let gone = format!("{}/articles/gone", server.uri());
    let missing = format!("{}/articles/moved", server.uri());

    mount_page(
        &server,
        "/rss/press.xml",
        &rss(&[("Gone", gone.as_str()), ("Moved", missing.as_str())]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/articles/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_page(&server, "/articles/moved", "<html><body><p>Moved</p></body></html>").await;

    let workspace = Workspace::new();
    let (coordinator, _pacer) = coordinator(
        &workspace,
        vec![feed_source("JST", vec![format!("{}/rss/press.xml", server.uri())])],
        FakeBrowser::default(),
    );
    let report = coordinator.run_cycle().await.unwrap();

    let jst = report.source("JST").unwrap();
    assert_eq!(jst.count(CandidateOutcome::FetchFailed), 1);
    assert_eq!(
        jst.count(CandidateOutcome::Skipped(AbsentReason::NoContent)),
        1
    );

    // Fetch failures stay retryable, content decisions are permanent
    let ledger = workspace.ledger();
    assert!(!ledger.contains_key(&gone));
    assert!(ledger.contains_key(&missing));

    let captures = workspace.debug_files();
    assert_eq!(captures.len(), 1);
    assert!(captures[0].starts_with("JST_NoContent_"));
    assert!(list_files(&workspace.data_dir().join("JST")).is_empty());
}

#[tokio::test]
async fn test_list_page_cycle_skips_incomplete_blocks() {
    let server = MockServer::start().await;
    let listing_path = Local::now().format("/staff_picks/%Y/%m").to_string();

    let listing = format!(
        r#"<html><body>
            <div class="gtm-click-measurement-target">
                <a class="entry-link" href="{base}/entry/1">Read</a>
                <h3 class="entry-title">Entry One</h3>
            </div>
            <div class="gtm-click-measurement-target">
                <a class="entry-link">Read</a>
                <h3 class="entry-title">No Link</h3>
            </div>
        </body></html>"#,
        base = server.uri()
    );
    mount_page(&server, &listing_path, &listing).await;
    mount_page(
        &server,
        "/entry/1",
        r#"<html><body>
            <time datetime="2024-04-30T22:10:00+09:00">April 30</time>
            <div class="entry-content"><p>Hello</p><p>World</p></div>
        </body></html>"#,
    )
    .await;

    let workspace = Workspace::new();
    let source = SourceConfig::ListPage(ListPageSourceConfig {
        id: "Hatena-Blog".to_string(),
        list_url: format!("{}/staff_picks", server.uri()),
        entry_selector: "div.gtm-click-measurement-target".to_string(),
        link_selector: "a.entry-link".to_string(),
        title_selector: "h3.entry-title".to_string(),
        content_selector: "div.entry-content".to_string(),
        polite: true,
        pause_after: Some([0.5, 1.2]),
    });
    let (coordinator, pacer) = coordinator(&workspace, vec![source], FakeBrowser::default());
    let report = coordinator.run_cycle().await.unwrap();

    let hatena = report.source("Hatena-Blog").unwrap();
    assert_eq!(hatena.candidates, 1);
    assert_eq!(hatena.archived(), 1);

    let archive = workspace
        .data_dir()
        .join("Hatena-Blog")
        .join("Hatena-Blog-2024-04-30.txt");
    assert_eq!(
        std::fs::read_to_string(archive).unwrap(),
        "--- Entry One ---\n\nHello\nWorld\n\n"
    );

    // Listing and article fetches are polite, then one pause after the entry
    let pauses = pacer.pauses();
    assert_eq!(pauses.len(), 3);
    assert!(pauses[2] >= Duration::from_secs_f64(0.5));
    assert!(pauses[2] <= Duration::from_secs_f64(1.2));
}

#[tokio::test]
async fn test_rendered_cycle_classifies_pages() {
    let server = MockServer::start().await;
    let full = format!("{}/news/full", server.uri());
    let brief = format!("{}/news/brief", server.uri());
    let video = format!("{}/news/video", server.uri());

    mount_page(
        &server,
        "/rss/cat0.xml",
        &rss(&[
            ("Full story", full.as_str()),
            ("Brief", brief.as_str()),
            ("Video", video.as_str()),
        ]),
    )
    .await;
    // cat1 repeats a link from cat0
    mount_page(&server, "/rss/cat1.xml", &rss(&[("Full story", full.as_str())])).await;

    let mut pages = HashMap::new();
    pages.insert(
        full.clone(),
        FakePage {
            document: r#"<html><body><p class="_1i1d7sh2">One.</p><p class="_1i1d7sh2">Two.</p></body></html>"#
                .to_string(),
            content_appears: true,
        },
    );
    pages.insert(
        brief.clone(),
        FakePage {
            document: r#"<html><body><p class="_1i1d7sh2">Only.</p></body></html>"#.to_string(),
            content_appears: true,
        },
    );
    pages.insert(
        video.clone(),
        FakePage {
            document: "<html><body><video></video></body></html>".to_string(),
            content_appears: false,
        },
    );
    let browser = FakeBrowser::with_pages(pages);

    let workspace = Workspace::new();
    let (coordinator, pacer) = coordinator(
        &workspace,
        vec![rendered_source(
            "NHK",
            vec![
                format!("{}/rss/cat0.xml", server.uri()),
                format!("{}/rss/cat1.xml", server.uri()),
            ],
        )],
        browser.clone(),
    );
    let report = coordinator.run_cycle().await.unwrap();

    let nhk = report.source("NHK").unwrap();
    assert_eq!(nhk.candidates, 3);
    assert_eq!(nhk.archived(), 1);
    assert_eq!(nhk.count(CandidateOutcome::Skipped(AbsentReason::Brief)), 1);
    assert_eq!(
        nhk.count(CandidateOutcome::Skipped(AbsentReason::NoContent)),
        1
    );

    assert_eq!(
        std::fs::read_to_string(workspace.data_dir().join("NHK").join("NHK-2024-05-01.txt"))
            .unwrap(),
        "--- Full story ---\n\nOne.\nTwo.\n\n"
    );

    // Every content decision is marked seen
    let ledger = workspace.ledger();
    assert!(ledger.contains_key(&full));
    assert!(ledger.contains_key(&brief));
    assert!(ledger.contains_key(&video));

    // Only the no-content page is captured; brief notices are not
    let captures = workspace.debug_files();
    assert_eq!(captures.len(), 1);
    assert!(captures[0].starts_with("NHK_NoContent_"));

    assert_eq!(browser.launches(), 1);
    assert_eq!(browser.closes(), 1);
    assert_eq!(pacer.pauses(), vec![Duration::from_secs(2); 3]);
}

#[tokio::test]
async fn test_rendered_cycle_without_new_candidates_skips_browser() {
    let server = MockServer::start().await;
    let seen = format!("{}/news/seen", server.uri());
    mount_page(&server, "/rss/cat0.xml", &rss(&[("Seen", seen.as_str())])).await;

    let workspace = Workspace::new();
    workspace.seed_ledger(&[seen.as_str()]);

    let browser = FakeBrowser::default();
    let (coordinator, _pacer) = coordinator(
        &workspace,
        vec![rendered_source("NHK", vec![format!("{}/rss/cat0.xml", server.uri())])],
        browser.clone(),
    );
    let report = coordinator.run_cycle().await.unwrap();

    assert_eq!(
        report.source("NHK").unwrap().count(CandidateOutcome::AlreadySeen),
        1
    );
    assert_eq!(browser.launches(), 0);
}

#[tokio::test]
async fn test_browser_error_is_captured_and_retried_later() {
    let server = MockServer::start().await;
    // No scripted page: navigation fails
    let broken = format!("{}/news/broken", server.uri());
    mount_page(&server, "/rss/cat0.xml", &rss(&[("Broken", broken.as_str())])).await;

    let workspace = Workspace::new();
    let (coordinator, _pacer) = coordinator(
        &workspace,
        vec![rendered_source("NHK", vec![format!("{}/rss/cat0.xml", server.uri())])],
        FakeBrowser::with_pages(HashMap::new()),
    );
    let report = coordinator.run_cycle().await.unwrap();

    assert_eq!(report.source("NHK").unwrap().count(CandidateOutcome::Failed), 1);
    assert!(!workspace.ledger().contains_key(&broken));

    let captures = workspace.debug_files();
    assert_eq!(captures.len(), 1);
    assert!(captures[0].starts_with("NHK_Error_"));
}

#[tokio::test]
async fn test_renderer_failure_aborts_only_that_source() {
    let server = MockServer::start().await;
    let news = format!("{}/news/1", server.uri());
    let press = format!("{}/articles/a", server.uri());

    mount_page(&server, "/rss/cat0.xml", &rss(&[("News", news.as_str())])).await;
    mount_page(&server, "/rss/press.xml", &rss(&[("Article A", press.as_str())])).await;
    mount_page(&server, "/articles/a", JST_ARTICLE).await;

    let workspace = Workspace::new();
    let (coordinator, _pacer) = coordinator(
        &workspace,
        vec![
            rendered_source("NHK", vec![format!("{}/rss/cat0.xml", server.uri())]),
            feed_source("JST", vec![format!("{}/rss/press.xml", server.uri())]),
        ],
        FakeBrowser::failing(),
    );
    let report = coordinator.run_cycle().await.unwrap();

    let nhk = report.source("NHK").unwrap();
    assert!(nhk.is_aborted());
    assert_eq!(nhk.archived(), 0);
    assert_eq!(report.source("JST").unwrap().archived(), 1);

    let ledger = workspace.ledger();
    assert!(!ledger.contains_key(&news));
    assert!(ledger.contains_key(&press));
}

#[tokio::test]
async fn test_enumeration_failure_abandons_source() {
    let server = MockServer::start().await;
    let press = format!("{}/articles/a", server.uri());

    Mock::given(method("GET"))
        .and(path("/rss/broken.xml"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    mount_page(&server, "/rss/press.xml", &rss(&[("Article A", press.as_str())])).await;
    mount_page(&server, "/articles/a", JST_ARTICLE).await;

    let workspace = Workspace::new();
    let (coordinator, _pacer) = coordinator(
        &workspace,
        vec![
            feed_source("Broken", vec![format!("{}/rss/broken.xml", server.uri())]),
            feed_source("JST", vec![format!("{}/rss/press.xml", server.uri())]),
        ],
        FakeBrowser::default(),
    );
    let report = coordinator.run_cycle().await.unwrap();

    assert!(report.source("Broken").unwrap().is_aborted());
    assert_eq!(report.total_archived(), 1);
}

#[tokio::test]
async fn test_partial_feed_failure_keeps_other_feeds() {
    let server = MockServer::start().await;
    let a = format!("{}/articles/a", server.uri());

    Mock::given(method("GET"))
        .and(path("/rss/cat1.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_page(&server, "/rss/cat0.xml", &rss(&[("Article A", a.as_str())])).await;
    mount_page(&server, "/articles/a", JST_ARTICLE).await;

    let workspace = Workspace::new();
    let (coordinator, _pacer) = coordinator(
        &workspace,
        vec![feed_source(
            "JST",
            vec![
                format!("{}/rss/cat0.xml", server.uri()),
                format!("{}/rss/cat1.xml", server.uri()),
            ],
        )],
        FakeBrowser::default(),
    );
    let report = coordinator.run_cycle().await.unwrap();

    let jst = report.source("JST").unwrap();
    assert!(!jst.is_aborted());
    assert_eq!(jst.archived(), 1);
}

#[tokio::test]
async fn test_shift_jis_article_is_archived_as_utf8() {
    let server = MockServer::start().await;
    let a = format!("{}/articles/sjis", server.uri());
    mount_page(&server, "/rss/press.xml", &rss(&[("Japanese", a.as_str())])).await;

    let mut body =
        br#"<html><head><meta charset="Shift_JIS"></head><body><section class="inr"><p>"#.to_vec();
    // "日本語" in Shift_JIS
    body.extend_from_slice(&[0x93, 0xFA, 0x96, 0x7B, 0x8C, 0xEA]);
    body.extend_from_slice(b"</p></section></body></html>");
    Mock::given(method("GET"))
        .and(path("/articles/sjis"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(&server)
        .await;

    let workspace = Workspace::new();
    let (coordinator, _pacer) = coordinator(
        &workspace,
        vec![feed_source("JST", vec![format!("{}/rss/press.xml", server.uri())])],
        FakeBrowser::default(),
    );
    let report = coordinator.run_cycle().await.unwrap();
    assert_eq!(report.source("JST").unwrap().archived(), 1);

    let archive = workspace.data_dir().join("JST").join("JST-2024-05-01.txt");
    assert_eq!(
        std::fs::read_to_string(archive).unwrap(),
        "--- Japanese ---\n\n日本語\n\n"
    );
}

/// Never returns from a pause
struct StallingPacer;

#[async_trait]
impl Pacer for StallingPacer {
    async fn pause(&self, _duration: Duration) {
        std::future::pending::<()>().await;
    }
}

#[tokio::test]
async fn test_abandoned_cycle_still_closes_browser() {
    let server = MockServer::start().await;
    let full = format!("{}/news/full", server.uri());
    mount_page(&server, "/rss/cat0.xml", &rss(&[("Full story", full.as_str())])).await;

    let mut pages = HashMap::new();
    pages.insert(
        full.clone(),
        FakePage {
            document: r#"<html><body><p class="_1i1d7sh2">One.</p><p class="_1i1d7sh2">Two.</p></body></html>"#
                .to_string(),
            content_appears: true,
        },
    );
    let browser = FakeBrowser::with_pages(pages);

    let workspace = Workspace::new();
    let coordinator = Coordinator::with_collaborators(
        workspace.config(vec![rendered_source(
            "NHK",
            vec![format!("{}/rss/cat0.xml", server.uri())],
        )]),
        Arc::new(browser.clone()),
        Arc::new(StallingPacer),
    )
    .unwrap();

    let result = tokio::time::timeout(Duration::from_millis(500), coordinator.run_cycle()).await;
    assert!(result.is_err());
    assert_eq!(browser.launches(), 1);

    // The close is spawned when the cycle future is dropped
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(browser.closes(), 1);
}
