//! HTTP client for the blog backend.
//!
//! Every request is issued once. Callers decide what a failure means for
//! their view; this module only classifies it.

use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::auth::IdentityAssertion;
use crate::session::{PayloadError, SessionPayload};

/// Standard User-Agent header for inkpost requests.
pub const USER_AGENT: &str = concat!("inkpost/", env!("CARGO_PKG_VERSION"));

const GOOGLE_SIGN_IN_PATH: &str = "/api/auth/google";
const GET_POSTS_PATH: &str = "/api/post/getposts";

/// Body of `POST /api/auth/google`.
///
/// Absent claims are sent as `null`; the backend decides which are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSignInRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "googlePhotoUrl")]
    pub google_photo_url: Option<String>,
}

impl From<IdentityAssertion> for BackendSignInRequest {
    fn from(assertion: IdentityAssertion) -> Self {
        Self {
            name: assertion.display_name,
            email: assertion.email,
            google_photo_url: assertion.photo_url,
        }
    }
}

/// A blog post as returned by the listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Empty when the backend omitted `_id`.
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Response of `GET /api/post/getposts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostsResponse {
    #[serde(default)]
    pub posts: Vec<Post>,
}

/// Filter for the post listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostQuery {
    Slug(String),
    Recent(u32),
}

impl PostQuery {
    fn pairs(&self) -> [(&'static str, String); 1] {
        match self {
            PostQuery::Slug(slug) => [("slug", slug.clone())],
            PostQuery::Recent(limit) => [("limit", limit.to_string())],
        }
    }
}

/// Failure of a single backend call.
#[derive(Debug)]
pub enum BackendError {
    /// No response was received.
    Transport(reqwest::Error),
    /// A response arrived with a non-success status.
    Status { status: StatusCode, body: String },
    /// A success response carried a body of the wrong shape.
    Malformed(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Transport(err) => write!(f, "request failed: {err}"),
            BackendError::Status { status, body } if body.is_empty() => {
                write!(f, "HTTP {}", status.as_u16())
            }
            BackendError::Status { status, body } => {
                write!(f, "HTTP {}: {body}", status.as_u16())
            }
            BackendError::Malformed(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PayloadError> for BackendError {
    fn from(err: PayloadError) -> Self {
        BackendError::Malformed(err.to_string())
    }
}

/// Client bound to one backend base URL.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Creates a client for `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Forwards identity claims to `POST /api/auth/google`.
    ///
    /// # Errors
    /// `Transport` when the request could not be sent, `Status` with the raw
    /// body text for non-2xx responses, `Malformed` when a 2xx body is not a
    /// session payload.
    pub async fn sign_in_google(
        &self,
        request: &BackendSignInRequest,
    ) -> Result<SessionPayload, BackendError> {
        let response = self
            .http
            .post(self.url(GOOGLE_SIGN_IN_PATH))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(BackendError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(BackendError::Transport)?;
        if !status.is_success() {
            return Err(BackendError::Status { status, body });
        }

        Ok(SessionPayload::from_body(&body)?)
    }

    /// Fetches `GET /api/post/getposts` with the given filter.
    ///
    /// # Errors
    /// `Transport`, `Status` or `Malformed` as for [`Self::sign_in_google`].
    pub async fn get_posts(&self, query: &PostQuery) -> Result<PostsResponse, BackendError> {
        let response = self
            .http
            .get(self.url(GET_POSTS_PATH))
            .query(&query.pairs())
            .send()
            .await
            .map_err(BackendError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(BackendError::Transport)?;
        if !status.is_success() {
            return Err(BackendError::Status { status, body });
        }

        serde_json::from_str(&body).map_err(|e| BackendError::Malformed(e.to_string()))
    }
}
