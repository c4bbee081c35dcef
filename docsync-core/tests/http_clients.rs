use docsync_core::fetch::{FetchError, Fetcher, HttpFetcher};
use docsync_core::release::{GithubReleaseClient, ReleaseError, ReleaseProvider};
use serde_json::json;
use serial_test::serial;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn fetcher_returns_document_under_base_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/llm-d/llm-d/main/guides/QUICKSTART.md"))
        .respond_with(ResponseTemplate::new(200).set_body_string("# QuickStart\n"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new().unwrap();
    let base = format!("{}/llm-d/llm-d/main/", server.uri());
    let doc = fetcher.fetch(&base, "guides/QUICKSTART.md").await.unwrap();
    assert_eq!(doc.filename, "guides/QUICKSTART.md");
    assert_eq!(doc.content, "# QuickStart\n");
    assert_eq!(doc.url, format!("{base}guides/QUICKSTART.md"));
}

#[tokio::test]
async fn fetcher_maps_missing_document_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new().unwrap();
    let err = fetcher
        .fetch(&format!("{}/org/repo/v1.0.0", server.uri()), "README.md")
        .await
        .unwrap_err();
    assert!(matches!(&err, FetchError::NotFound { .. }), "got {err:?}");
    assert_eq!(err.url(), format!("{}/org/repo/v1.0.0/README.md", server.uri()));
}

#[tokio::test]
async fn fetcher_reports_unexpected_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new().unwrap();
    let err = fetcher
        .fetch(&format!("{}/org/repo/main/", server.uri()), "README.md")
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 500, .. }), "got {err:?}");
}

fn release_json(tag: &str, prerelease: bool) -> serde_json::Value {
    json!({
        "tag_name": tag,
        "name": format!("llm-d {tag}"),
        "html_url": format!("https://github.com/llm-d/llm-d/releases/tag/{tag}"),
        "published_at": "2025-10-10T14:05:00Z",
        "body": "## Components\n",
        "prerelease": prerelease,
        "draft": false
    })
}

#[tokio::test]
async fn latest_release_is_converted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/llm-d/llm-d/releases/latest"))
        .and(header("accept", "application/vnd.github.v3+json"))
        .and(header("authorization", "Bearer t0ken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_json("v0.3.0", false)))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        GithubReleaseClient::with_token(&server.uri(), "llm-d", "llm-d", Some("t0ken".into())).unwrap();
    let release = client.latest().await.unwrap();
    assert_eq!(release.info.version, "v0.3.0");
    assert_eq!(release.info.release_date, "2025-10-10");
    assert_eq!(release.info.release_date_formatted, "October 10, 2025");
    assert_eq!(release.info.release_name, "llm-d v0.3.0");
    assert_eq!(release.body, "## Components\n");
    assert!(!release.is_prerelease);
}

#[tokio::test]
async fn release_list_keeps_prereleases() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/llm-d/llm-d/releases"))
        .and(query_param("per_page", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            release_json("v0.4.0-rc.1", true),
            release_json("v0.3.0", false)
        ])))
        .mount(&server)
        .await;

    let client = GithubReleaseClient::with_token(&server.uri(), "llm-d", "llm-d", None).unwrap();
    let releases = client.fetch_releases(5).await.unwrap();
    let tags: Vec<_> = releases.iter().map(|r| r.info.version.as_str()).collect();
    assert_eq!(tags, ["v0.4.0-rc.1", "v0.3.0"]);
    assert!(releases[0].is_prerelease);
}

#[tokio::test]
async fn rate_limited_release_lookup_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", "1760105100"),
        )
        .mount(&server)
        .await;

    let client = GithubReleaseClient::with_token(&server.uri(), "llm-d", "llm-d", None).unwrap();
    let err = client.latest_release().await.unwrap_err();
    assert!(matches!(err, ReleaseError::Status { status: 403, .. }), "got {err:?}");
}

#[tokio::test]
#[serial]
async fn client_reads_token_from_environment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/llm-d/llm-d/releases/latest"))
        .and(header("authorization", "Bearer from-env"))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_json("v0.3.0", false)))
        .expect(1)
        .mount(&server)
        .await;

    std::env::remove_var("GITHUB_TOKEN");
    std::env::set_var("GH_TOKEN", "from-env");
    let client = GithubReleaseClient::new(&server.uri(), "llm-d", "llm-d");
    std::env::remove_var("GH_TOKEN");

    let info = client.unwrap().latest_release().await.unwrap();
    assert_eq!(info.version, "v0.3.0");
}
