//! Integration tests for login/logout/whoami commands.

use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Writes a config whose Google endpoints point at the mock server.
fn write_google_config(home: &Path, server: &MockServer) {
    let config = format!(
        r#"[google]
client_id = "test-client"
authorize_url = "{uri}/o/oauth2/v2/auth"
token_url = "{uri}/token"
userinfo_url = "{uri}/userinfo"
"#,
        uri = server.uri()
    );
    fs::write(home.join("config.toml"), config).unwrap();
}

async fn mount_google(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.test",
                "token_type": "Bearer",
                "expires_in": 3599
            })),
        )
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", "Bearer ya29.test"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Kartik",
                "email": "k@x.com",
                "picture": "http://img"
            })),
        )
        .expect(1)
        .mount(server)
        .await;
}

/// Test: logout when not signed in shows message.
#[test]
fn test_logout_when_not_signed_in() {
    let temp = tempdir().unwrap();

    cargo_bin_cmd!("inkpost")
        .env("INKPOST_HOME", temp.path())
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not signed in"));
}

/// Test: logout removes session.json.
#[test]
fn test_logout_clears_session() {
    let temp = tempdir().unwrap();
    let session_path = temp.path().join("session.json");
    fs::write(&session_path, r#"{"_id": "u1", "username": "kartik"}"#).unwrap();

    cargo_bin_cmd!("inkpost")
        .env("INKPOST_HOME", temp.path())
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed out"));

    assert!(!session_path.exists(), "session.json should be removed");
}

#[test]
fn test_whoami_shows_stored_session() {
    let temp = tempdir().unwrap();
    fs::write(
        temp.path().join("session.json"),
        r#"{"_id": "u1", "username": "kartik", "email": "k@x.com"}"#,
    )
    .unwrap();

    cargo_bin_cmd!("inkpost")
        .env("INKPOST_HOME", temp.path())
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("kartik"))
        .stdout(predicate::str::contains("k@x.com"))
        .stdout(predicate::str::contains("u1"));
}

#[test]
fn test_whoami_when_not_signed_in() {
    let temp = tempdir().unwrap();

    cargo_bin_cmd!("inkpost")
        .env("INKPOST_HOME", temp.path())
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not signed in."));
}

/// Test: login exchanges the pasted code and stores the backend session.
#[tokio::test]
async fn test_login_stores_session() {
    let temp = tempdir().unwrap();
    let server = MockServer::start().await;
    write_google_config(temp.path(), &server);
    mount_google(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/google"))
        .and(body_json(serde_json::json!({
            "name": "Kartik",
            "email": "k@x.com",
            "googlePhotoUrl": "http://img"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "_id": "u1",
            "username": "kartik",
            "email": "k@x.com",
            "profilePicture": "http://img"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/post/getposts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "posts": [{"_id": "p1", "title": "First post", "slug": "first-post", "category": "rust"}]
        })))
        .mount(&server)
        .await;

    cargo_bin_cmd!("inkpost")
        .env("INKPOST_HOME", temp.path())
        .env("INKPOST_NO_BROWSER", "1")
        .env("INKPOST_BACKEND_URL", server.uri())
        .arg("login")
        .write_stdin("auth-code\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed in as kartik"))
        .stdout(predicate::str::contains("First post"));

    let contents = fs::read_to_string(temp.path().join("session.json")).unwrap();
    let session: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(session["_id"], "u1");
    assert_eq!(session["profilePicture"], "http://img");
}

/// Test: a backend rejection shows the notice and stores nothing.
#[tokio::test]
async fn test_login_backend_failure_shows_notice() {
    let temp = tempdir().unwrap();
    let server = MockServer::start().await;
    write_google_config(temp.path(), &server);
    mount_google(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/google"))
        .respond_with(ResponseTemplate::new(500).set_body_string("db down"))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("inkpost")
        .env("INKPOST_HOME", temp.path())
        .env("INKPOST_NO_BROWSER", "1")
        .env("INKPOST_BACKEND_URL", server.uri())
        .arg("login")
        .write_stdin("auth-code\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Google sign-in failed. Check the log for details.",
        ))
        .stderr(predicate::str::contains("Sign-in did not complete"));

    assert!(!temp.path().join("session.json").exists());

    let log = fs::read_to_string(temp.path().join("logs").join("inkpost.log")).unwrap();
    assert!(log.contains("db down"), "raw backend body should be logged");
}

/// Test: login without a configured client id never reaches the backend.
#[test]
fn test_login_without_client_id_fails() {
    let temp = tempdir().unwrap();

    cargo_bin_cmd!("inkpost")
        .env("INKPOST_HOME", temp.path())
        .env("INKPOST_NO_BROWSER", "1")
        .env("INKPOST_BACKEND_URL", "http://127.0.0.1:9")
        .arg("login")
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Google sign-in failed. Check the log for details.",
        ));

    assert!(!temp.path().join("session.json").exists());
}

/// Test: an empty paste cancels the sign-in.
#[tokio::test]
async fn test_login_empty_paste_is_cancelled() {
    let temp = tempdir().unwrap();
    let server = MockServer::start().await;
    write_google_config(temp.path(), &server);

    cargo_bin_cmd!("inkpost")
        .env("INKPOST_HOME", temp.path())
        .env("INKPOST_NO_BROWSER", "1")
        .env("INKPOST_BACKEND_URL", server.uri())
        .arg("login")
        .write_stdin("\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Google sign-in failed"));

    assert!(!temp.path().join("session.json").exists());
}

/// Test: a pasted redirect carrying another state is rejected before any token request.
#[tokio::test]
async fn test_login_pasted_state_mismatch_is_rejected() {
    let temp = tempdir().unwrap();
    let server = MockServer::start().await;
    write_google_config(temp.path(), &server);

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/google"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    cargo_bin_cmd!("inkpost")
        .env("INKPOST_HOME", temp.path())
        .env("INKPOST_NO_BROWSER", "1")
        .env("INKPOST_BACKEND_URL", server.uri())
        .arg("login")
        .write_stdin("code=c&state=wrong\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Google sign-in failed"));

    assert!(!temp.path().join("session.json").exists());

    let log = fs::read_to_string(temp.path().join("logs").join("inkpost.log")).unwrap();
    assert!(log.contains("state mismatch"), "rejection reason should be logged");
}

/// Test: a backend payload with null fields is stored as sent.
#[tokio::test]
async fn test_login_stores_payload_verbatim() {
    let temp = tempdir().unwrap();
    let server = MockServer::start().await;
    write_google_config(temp.path(), &server);
    mount_google(&server).await;

    let payload = serde_json::json!({
        "_id": "u1",
        "username": "kartik",
        "email": null,
        "profilePicture": null,
        "isAdmin": false
    });
    Mock::given(method("POST"))
        .and(path("/api/auth/google"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload.clone()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/post/getposts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"posts": []})))
        .mount(&server)
        .await;

    cargo_bin_cmd!("inkpost")
        .env("INKPOST_HOME", temp.path())
        .env("INKPOST_NO_BROWSER", "1")
        .env("INKPOST_BACKEND_URL", server.uri())
        .arg("login")
        .write_stdin("auth-code\n")
        .assert()
        .success();

    let contents = fs::read_to_string(temp.path().join("session.json")).unwrap();
    let stored: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(stored, payload);
}
