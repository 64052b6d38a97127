//! Result acquisition against canned pages, using the static driver so no
//! browser install is needed.


use js_test_tool::browser::{Browser, BrowserKind, TestResult, TestStatus};
use js_test_tool::{BrowserError, Phase};
use std::time::{Duration, Instant};
use test_server::{errored_page, results_page, StubPage, TestServer};

const PASSING: &str =
    r#"[{"testGroup":"G","testName":"t1","testStatus":"pass","testDetail":""}]"#;

async fn static_browser(timeout: Duration) -> Browser {
    Browser::launch(BrowserKind::Static)
        .await
        .expect("static driver should start")
        .with_timeout(timeout)
        .with_poll_interval(Duration::from_millis(20))
}

async fn serve(pages: Vec<(&'static str, StubPage)>) -> TestServer {
    let server = TestServer::start(pages).await;
    server.wait_ready().await.expect("server should start");
    server
}

#[tokio::test]
async fn test_well_formed_results() {
    let server = serve(vec![("/results", StubPage::ok(results_page(PASSING, true)))]).await;
    let browser = static_browser(Duration::from_secs(5)).await;

    let results = browser
        .get_page_results(&server.page_url("/results"))
        .await
        .expect("results should parse");

    assert_eq!(
        results,
        vec![TestResult {
            test_group: "G".to_string(),
            test_name: "t1".to_string(),
            status: TestStatus::Pass,
            detail: String::new(),
        }]
    );
    println!("✅ Parsed {} result(s)", results.len());
}

#[tokio::test]
async fn test_multiple_results_keep_page_order() {
    let payload = r#"[
        {"testGroup":"Adder","testName":"adds","testStatus":"pass","testDetail":""},
        {"testGroup":"Adder","testName":"overflows","testStatus":"fail","testDetail":"Expected 1 to be 2."},
        {"testGroup":"Player","testName":"plays","testStatus":"pass","testDetail":""}
    ]"#;
    let server = serve(vec![("/results", StubPage::ok(results_page(payload, true)))]).await;
    let browser = static_browser(Duration::from_secs(5)).await;

    let results = browser
        .get_page_results(&server.page_url("/results"))
        .await
        .unwrap();

    let names: Vec<_> = results.iter().map(|r| r.test_name.as_str()).collect();
    assert_eq!(names, vec!["adds", "overflows", "plays"]);
    assert_eq!(results[1].status, TestStatus::Fail);
    assert_eq!(results[1].detail, "Expected 1 to be 2.");
}

#[tokio::test]
async fn test_empty_results_array() {
    let server = serve(vec![("/empty", StubPage::ok(results_page("[]", true)))]).await;
    let browser = static_browser(Duration::from_secs(5)).await;

    let results = browser
        .get_page_results(&server.page_url("/empty"))
        .await
        .expect("empty array is not an error");
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_results_without_done_marker() {
    // Text alone is enough once it is there
    let server = serve(vec![("/results", StubPage::ok(results_page(PASSING, false)))]).await;
    let browser = static_browser(Duration::from_secs(5)).await;

    let results = browser
        .get_page_results(&server.page_url("/results"))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn test_control_characters_in_detail() {
    let payload = "[{\"testGroup\":\"when song paused\",\"testName\":\"should be possible to resume\",\
                   \"testStatus\":\"fail\",\
                   \"testDetail\":\"Error: Expected true to be falsy.\n\tat new jasmine.ExpectationResult\"}]";
    let server = serve(vec![("/results", StubPage::ok(results_page(payload, true)))]).await;
    let browser = static_browser(Duration::from_secs(5)).await;

    let results = browser
        .get_page_results(&server.page_url("/results"))
        .await
        .unwrap();

    assert_eq!(results[0].status, TestStatus::Fail);
    assert_eq!(
        results[0].detail,
        "Error: Expected true to be falsy.\n\tat new jasmine.ExpectationResult"
    );
}

#[tokio::test]
async fn test_missing_results_element() {
    let server = serve(vec![(
        "/wrong",
        StubPage::ok(r#"<html><body><div id="wrong_id">[]</div></body></html>"#),
    )])
    .await;
    let browser = static_browser(Duration::from_secs(5)).await;

    let err = browser
        .get_page_results(&server.page_url("/wrong"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, BrowserError::MissingResults { id: "js_test_tool_results", .. }),
        "unexpected error: {:?}",
        err
    );
}

#[tokio::test]
async fn test_hand_written_markup() {
    let unquoted = "<html><body><div id=js_test_tool_results class=done>[]</div></body></html>";
    let decoy = r#"<html><body>
<!-- <div id="js_test_tool_results" class="done">old</div> -->
<div id="js_test_tool_results" class="done">[{"testGroup":"G","testName":"t","testStatus":"pass"}]</div>
</body></html>"#;
    let server = serve(vec![
        ("/unquoted", StubPage::ok(unquoted)),
        ("/decoy", StubPage::ok(decoy)),
    ])
    .await;
    let browser = static_browser(Duration::from_secs(5)).await;

    let results = browser
        .get_page_results(&server.page_url("/unquoted"))
        .await
        .unwrap();
    assert!(results.is_empty());

    let results = browser
        .get_page_results(&server.page_url("/decoy"))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].test_name, "t");
    println!("✅ Results read from unquoted and commented markup");
}

#[tokio::test]
async fn test_non_json_results() {
    let server = serve(vec![("/garbage", StubPage::ok(results_page("Not JSON", true)))]).await;
    let browser = static_browser(Duration::from_secs(5)).await;

    let err = browser
        .get_page_results(&server.page_url("/garbage"))
        .await
        .unwrap_err();
    assert!(matches!(err, BrowserError::MalformedPayload { .. }), "{:?}", err);
}

#[tokio::test]
async fn test_record_missing_required_keys() {
    let server = serve(vec![(
        "/partial",
        StubPage::ok(results_page(r#"[{"missing_keys":"val"}]"#, true)),
    )])
    .await;
    let browser = static_browser(Duration::from_secs(5)).await;

    let err = browser
        .get_page_results(&server.page_url("/partial"))
        .await
        .unwrap_err();
    assert!(matches!(err, BrowserError::MalformedPayload { .. }), "{:?}", err);
}

#[tokio::test]
async fn test_page_error_is_attached() {
    let server = serve(vec![(
        "/broken",
        StubPage::ok(errored_page("ReferenceError: describe is not defined")),
    )])
    .await;
    let browser = static_browser(Duration::from_secs(5)).await;

    let err = browser
        .get_page_results(&server.page_url("/broken"))
        .await
        .unwrap_err();
    match err {
        BrowserError::MalformedPayload { page_error, .. } => {
            assert_eq!(
                page_error.as_deref(),
                Some("ReferenceError: describe is not defined")
            );
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_http_error_statuses() {
    let server = serve(vec![(
        "/error",
        StubPage::with_status(500, "Internal failure"),
    )])
    .await;
    let browser = static_browser(Duration::from_secs(5)).await;

    let err = browser
        .get_page_results(&server.page_url("/missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, BrowserError::Http { status: 404, .. }), "{:?}", err);

    let err = browser
        .get_page_results(&server.page_url("/error"))
        .await
        .unwrap_err();
    match err {
        BrowserError::Http { status, body, .. } => {
            assert_eq!(status, 500);
            assert!(body.contains("Internal failure"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_unresponsive_server_times_out() {
    let server = serve(vec![]).await;
    let browser = static_browser(Duration::from_millis(500)).await;

    let started = Instant::now();
    let err = browser
        .get_page_results(&server.page_url("/hang"))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(err.is_timeout(), "expected timeout, got {:?}", err);
    assert!(matches!(err, BrowserError::Timeout { phase: Phase::Loading, .. }));
    assert!(elapsed >= Duration::from_millis(450), "returned early: {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "took too long: {:?}", elapsed);
    println!("✅ Timed out after {:?}", elapsed);
}

#[tokio::test]
async fn test_results_that_never_arrive_time_out() {
    let server = serve(vec![("/pending", StubPage::ok(results_page("", false)))]).await;
    let browser = static_browser(Duration::from_millis(300)).await;

    let started = Instant::now();
    let err = browser
        .get_page_results(&server.page_url("/pending"))
        .await
        .unwrap_err();

    assert!(matches!(err, BrowserError::Timeout { phase: Phase::Polling, .. }), "{:?}", err);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_connection_refused() {
    // Grab a free port, then release it so nothing is listening
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/", listener.local_addr().unwrap());
    drop(listener);

    let browser = static_browser(Duration::from_secs(5)).await;
    let err = browser.get_page_results(&url).await.unwrap_err();
    assert!(matches!(err, BrowserError::NavigationFailed { .. }), "{:?}", err);
}

#[tokio::test]
async fn test_quit_is_idempotent() {
    let server = serve(vec![("/results", StubPage::ok(results_page(PASSING, true)))]).await;
    let mut browser = static_browser(Duration::from_secs(5)).await;

    assert!(browser.get_page_results(&server.page_url("/results")).await.is_ok());

    browser.quit().await.unwrap();
    browser.quit().await.unwrap();

    let err = browser
        .get_page_results(&server.page_url("/results"))
        .await
        .unwrap_err();
    assert!(matches!(err, BrowserError::Closed));
}

#[tokio::test]
async fn test_one_browser_many_pages() {
    let server = serve(vec![
        ("/a", StubPage::ok(results_page(PASSING, true))),
        ("/b", StubPage::ok(results_page("[]", true))),
    ])
    .await;
    let browser = static_browser(Duration::from_secs(5)).await;

    for _ in 0..3 {
        assert_eq!(browser.get_page_results(&server.page_url("/a")).await.unwrap().len(), 1);
        assert!(browser.get_page_results(&server.page_url("/b")).await.unwrap().is_empty());
    }
}
