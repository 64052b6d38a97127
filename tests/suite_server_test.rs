//! Suite server routes, checked over real HTTP.

use js_test_tool::{
    Browser, BrowserError, BrowserKind, Phase, ServerConfig, ServerError, SuiteDescription,
    SuiteServer,
};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

const SUITE_YAML: &str = "\
test_suite_name: player
test_runner: jasmine
lib_paths: lib
src_paths: src
spec_paths: spec
fixture_paths: spec/fixtures
";

fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (path, body) in [
        ("lib/jquery.js", "window.$ = {};"),
        ("src/player.js", "function Player() {}"),
        ("src/my file.js", "var spaced = true;"),
        ("src/a#b.js", "var hashed = true;"),
        ("spec/100%25.js", "var percent = true;"),
        ("src/notes.txt", "not served"),
        ("spec/player_spec.js", "describe('Player', function() {});"),
        ("spec/fixtures/player.html", "<div class=\"player\"></div>"),
        ("secret.js", "var secret = 42;"),
    ] {
        let full = dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, body).unwrap();
    }
    dir
}

fn suite(root: &Path, name: &str) -> SuiteDescription {
    let yaml = SUITE_YAML.replace("player\n", &format!("{}\n", name));
    SuiteDescription::from_yaml_str(&yaml, root).unwrap()
}

async fn start(suites: Vec<SuiteDescription>, config: ServerConfig) -> SuiteServer {
    SuiteServer::start(suites, config)
        .await
        .expect("server should start")
}

async fn get(url: String) -> (u16, String, String) {
    let response = reqwest::get(&url).await.unwrap();
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = response.text().await.unwrap();
    (status, content_type, body)
}

#[tokio::test]
async fn test_suite_page_is_rendered() {
    let ws = workspace();
    let server = start(vec![suite(ws.path(), "player")], ServerConfig::default()).await;

    let (status, content_type, body) = get(server.suite_url("player")).await;
    assert_eq!(status, 200);
    assert!(content_type.starts_with("text/html"));
    assert!(body.contains(r#"src="/runner/jasmine/jasmine.js""#));
    assert!(body.contains(r#"src="/suite/player/include/src/player.js""#));
    assert!(body.contains(r#"<div id="js_test_tool_results"></div>"#));
    println!("✅ Rendered page served from {}", server.url());
}

#[tokio::test]
async fn test_unknown_suite_is_not_found() {
    let ws = workspace();
    let server = start(vec![suite(ws.path(), "player")], ServerConfig::default()).await;

    let (status, _, _) = get(server.suite_url("recorder")).await;
    assert_eq!(status, 404);
    let (status, _, _) = get(format!("{}/nothing/here", server.url())).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_includes_serve_resolved_files() {
    let ws = workspace();
    let server = start(vec![suite(ws.path(), "player")], ServerConfig::default()).await;
    let include = format!("{}/suite/player/include", server.url());

    let (status, content_type, body) = get(format!("{}/src/player.js", include)).await;
    assert_eq!(status, 200);
    assert!(content_type.contains("javascript"), "{}", content_type);
    assert_eq!(body, "function Player() {}");

    let (status, content_type, _) = get(format!("{}/spec/fixtures/player.html", include)).await;
    assert_eq!(status, 200);
    assert!(content_type.starts_with("text/html"));

    let (status, _, body) = get(format!("{}/src/my%20file.js", include)).await;
    assert_eq!(status, 200);
    assert_eq!(body, "var spaced = true;");
}

#[tokio::test]
async fn test_rendered_urls_fetch_resolved_files() {
    let ws = workspace();
    let server = start(vec![suite(ws.path(), "player")], ServerConfig::default()).await;
    let (_, _, page) = get(server.suite_url("player")).await;

    let srcs = Regex::new(r#"src="(/suite/[^"]*)""#).unwrap();
    let urls: Vec<String> = srcs.captures_iter(&page).map(|c| c[1].to_string()).collect();
    assert!(urls.contains(&"/suite/player/include/src/a%23b.js".to_string()));
    assert!(urls.contains(&"/suite/player/include/spec/100%2525.js".to_string()));

    for url in &urls {
        let (status, _, _) = get(format!("{}{}", server.url(), url)).await;
        assert_eq!(status, 200, "{} should be served", url);
    }

    let (_, _, body) = get(format!("{}/suite/player/include/src/a%23b.js", server.url())).await;
    assert_eq!(body, "var hashed = true;");
    let (_, _, body) = get(format!("{}/suite/player/include/spec/100%2525.js", server.url())).await;
    assert_eq!(body, "var percent = true;");
    println!("✅ Fetched {} include(s) from their rendered URLs", urls.len());
}

#[tokio::test]
async fn test_includes_refuse_everything_else() {
    let ws = workspace();
    let server = start(vec![suite(ws.path(), "player")], ServerConfig::default()).await;
    let include = format!("{}/suite/player/include", server.url());

    for path in [
        "secret.js",
        "src/notes.txt",
        "src/%2E%2E/secret.js",
        "%2E%2E/%2E%2E/etc/passwd",
        "src/missing.js",
    ] {
        let (status, _, _) = get(format!("{}/{}", include, path)).await;
        assert_eq!(status, 404, "{} should not be served", path);
    }
}

#[tokio::test]
async fn test_embedded_runner_assets() {
    let ws = workspace();
    let server = start(vec![suite(ws.path(), "player")], ServerConfig::default()).await;

    let (status, content_type, body) =
        get(format!("{}/runner/jasmine/jasmine-json.js", server.url())).await;
    assert_eq!(status, 200);
    assert!(content_type.contains("javascript"), "{}", content_type);
    assert!(body.contains("JsonReporter"));

    // Framework files need a runner directory
    let (status, _, _) = get(format!("{}/runner/jasmine/jasmine.js", server.url())).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_runner_dir_assets() {
    let ws = workspace();
    let runner_dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(runner_dir.path().join("jasmine")).unwrap();
    fs::write(runner_dir.path().join("jasmine/jasmine.js"), "var jasmine = {};").unwrap();
    fs::write(runner_dir.path().join("jasmine/jasmine.css"), "body {}").unwrap();

    let server = start(
        vec![suite(ws.path(), "player")],
        ServerConfig {
            runner_dir: Some(runner_dir.path().to_path_buf()),
            ..ServerConfig::default()
        },
    )
    .await;

    let (status, _, body) = get(format!("{}/runner/jasmine/jasmine.js", server.url())).await;
    assert_eq!(status, 200);
    assert_eq!(body, "var jasmine = {};");

    let (status, content_type, _) =
        get(format!("{}/runner/jasmine/jasmine.css", server.url())).await;
    assert_eq!(status, 200);
    assert!(content_type.starts_with("text/css"));

    let (status, _, _) = get(format!("{}/runner/%2E%2E/secret.js", server.url())).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_several_suites() {
    let ws = workspace();
    let server = start(
        vec![suite(ws.path(), "player"), suite(ws.path(), "recorder")],
        ServerConfig::default(),
    )
    .await;

    assert_eq!(server.suite_names(), ["player", "recorder"]);
    let (_, _, body) = get(server.suite_url("recorder")).await;
    assert!(body.contains("/suite/recorder/include/src/player.js"));
}

#[tokio::test]
async fn test_duplicate_suite_names() {
    let ws = workspace();
    let result = SuiteServer::start(
        vec![suite(ws.path(), "player"), suite(ws.path(), "player")],
        ServerConfig::default(),
    )
    .await;
    assert!(matches!(result, Err(ServerError::DuplicateSuite(name)) if name == "player"));
}

#[tokio::test]
async fn test_port_in_use() {
    let ws = workspace();
    let first = start(vec![suite(ws.path(), "player")], ServerConfig::default()).await;

    let result = SuiteServer::start(
        vec![suite(ws.path(), "player")],
        ServerConfig {
            port: first.addr().port(),
            ..ServerConfig::default()
        },
    )
    .await;
    assert!(matches!(result, Err(ServerError::Bind { .. })));
}

#[tokio::test]
async fn test_dev_mode_page() {
    let ws = workspace();
    let server = start(
        vec![suite(ws.path(), "player")],
        ServerConfig {
            dev_mode: true,
            ..ServerConfig::default()
        },
    )
    .await;

    let (_, _, body) = get(server.suite_url("player")).await;
    assert!(body.contains("/runner/jasmine/jasmine-html.js"));
    assert!(body.contains("jasmine.HtmlReporter"));
}

#[tokio::test]
async fn test_unexecuted_page_times_out() {
    // Without a script engine the results element stays empty
    let ws = workspace();
    let server = start(vec![suite(ws.path(), "player")], ServerConfig::default()).await;
    let browser = Browser::launch(BrowserKind::Static)
        .await
        .unwrap()
        .with_timeout(Duration::from_millis(400));

    let err = browser
        .get_page_results(&server.suite_url("player"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, BrowserError::Timeout { phase: Phase::Polling, .. }),
        "{:?}",
        err
    );
}
