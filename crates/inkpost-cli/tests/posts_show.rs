use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn recent_posts() -> serde_json::Value {
    serde_json::json!({
        "posts": [
            {"_id": "p2", "title": "Second", "slug": "second", "category": "rust"},
            {"_id": "p3", "title": "Third", "slug": "third"}
        ]
    })
}

#[tokio::test]
async fn test_post_renders_article_and_recent() {
    let home = tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/post/getposts"))
        .and(query_param("slug", "hello-world"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "posts": [{
                "_id": "p1",
                "title": "Hello World",
                "slug": "hello-world",
                "category": "react",
                "createdAt": "2024-05-01T10:00:00.000Z",
                "content": "<p>hi</p>"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/post/getposts"))
        .and(query_param("limit", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(recent_posts()))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("inkpost")
        .env("INKPOST_HOME", home.path())
        .args(["--backend-url", &server.uri(), "post", "hello-world"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello World"))
        .stdout(predicate::str::contains("/search?category=react"))
        .stdout(predicate::str::contains("5/1/2024"))
        .stdout(predicate::str::contains("Recent articles"))
        .stdout(predicate::str::contains("Second"))
        .stdout(predicate::str::contains("Third [Category]"));
}

#[tokio::test]
async fn test_post_not_found_shows_error() {
    let home = tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/post/getposts"))
        .and(query_param("slug", "missing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"posts": []})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/post/getposts"))
        .and(query_param("limit", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(recent_posts()))
        .mount(&server)
        .await;

    cargo_bin_cmd!("inkpost")
        .env("INKPOST_HOME", home.path())
        .env("INKPOST_BACKEND_URL", server.uri())
        .args(["post", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Error loading post. Please try again later.",
        ));
}

#[tokio::test]
async fn test_recent_failure_is_silent() {
    let home = tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/post/getposts"))
        .and(query_param("limit", "3"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    cargo_bin_cmd!("inkpost")
        .env("INKPOST_HOME", home.path())
        .env("INKPOST_BACKEND_URL", server.uri())
        .arg("recent")
        .assert()
        .success()
        .stdout(predicate::str::contains("Recent articles"))
        .stdout(predicate::str::contains("(none)"));
}

#[tokio::test]
async fn test_recent_respects_configured_limit() {
    let home = tempdir().unwrap();
    let server = MockServer::start().await;
    std::fs::write(
        home.path().join("config.toml"),
        "[posts]\nrecent_limit = 5\n",
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/api/post/getposts"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(recent_posts()))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("inkpost")
        .env("INKPOST_HOME", home.path())
        .env("INKPOST_BACKEND_URL", server.uri())
        .arg("recent")
        .assert()
        .success()
        .stdout(predicate::str::contains("Second [rust] (second)"));
}

#[test]
fn test_about_shows_blog_intro() {
    let home = tempdir().unwrap();

    cargo_bin_cmd!("inkpost")
        .env("INKPOST_HOME", home.path())
        .arg("about")
        .assert()
        .success()
        .stdout(predicate::str::contains("About Kartik's Blog app"));
}
