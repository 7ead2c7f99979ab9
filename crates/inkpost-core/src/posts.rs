//! Post page: fetches one post by slug plus the recent posts list.
//!
//! The two fetches are independent. The slug fetch owns `loading`, `error`
//! and `post`; the recent fetch owns `recent_posts` and never surfaces an
//! error. Every change is published on a `watch` channel.

use std::fmt;

use chrono::{DateTime, NaiveDate};
use tokio::sync::watch;

use crate::backend::{BackendClient, BackendError, Post, PostQuery};

const PLACEHOLDER_TITLE: &str = "Post Title";
const PLACEHOLDER_CATEGORY: &str = "Category";
const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/600x400";
const PLACEHOLDER_CARD_IMAGE: &str = "https://via.placeholder.com/150";
const PLACEHOLDER_CONTENT: &str = "<p>No content available.</p>";
const PLACEHOLDER_POST_ID: &str = "123";

/// Why the slug fetch produced the error view.
#[derive(Debug)]
pub enum PostFetchError {
    Backend(BackendError),
    /// The backend answered but no post matched the slug.
    NotFound,
}

impl fmt::Display for PostFetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostFetchError::Backend(err) => write!(f, "{err}"),
            PostFetchError::NotFound => write!(f, "no post matches the slug"),
        }
    }
}

impl std::error::Error for PostFetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PostFetchError::Backend(err) => Some(err),
            PostFetchError::NotFound => None,
        }
    }
}

impl From<BackendError> for PostFetchError {
    fn from(err: BackendError) -> Self {
        PostFetchError::Backend(err)
    }
}

/// Fetches the first post matching `slug`.
///
/// # Errors
/// Any backend failure, or `NotFound` when the `posts` array is empty.
pub async fn fetch_post(client: &BackendClient, slug: &str) -> Result<Post, PostFetchError> {
    let response = client.get_posts(&PostQuery::Slug(slug.to_string())).await?;
    response
        .posts
        .into_iter()
        .next()
        .ok_or(PostFetchError::NotFound)
}

/// Fetches up to `limit` recent posts. Failures yield an empty list.
pub async fn fetch_recent(client: &BackendClient, limit: u32) -> Vec<Post> {
    match client.get_posts(&PostQuery::Recent(limit)).await {
        Ok(response) => response.posts,
        Err(err) => {
            tracing::warn!(error = %err, "recent posts unavailable");
            Vec::new()
        }
    }
}

/// View state of the post page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostViewState {
    pub loading: bool,
    pub error: bool,
    pub post: Option<Post>,
    pub recent_posts: Vec<Post>,
}

impl Default for PostViewState {
    fn default() -> Self {
        Self {
            loading: true,
            error: false,
            post: None,
            recent_posts: Vec::new(),
        }
    }
}

/// Post page controller.
pub struct PostPage {
    client: BackendClient,
    recent_limit: u32,
    state: watch::Sender<PostViewState>,
}

impl PostPage {
    pub fn new(client: BackendClient, recent_limit: u32) -> Self {
        Self {
            client,
            recent_limit,
            state: watch::Sender::new(PostViewState::default()),
        }
    }

    /// Subscribes to view state changes.
    pub fn subscribe(&self) -> watch::Receiver<PostViewState> {
        self.state.subscribe()
    }

    /// Returns a snapshot of the current view state.
    pub fn snapshot(&self) -> PostViewState {
        self.state.borrow().clone()
    }

    /// Loads the page for `slug`, running both fetches concurrently.
    ///
    /// Safe to call after every subscriber is gone; updates are then dropped.
    pub async fn mount(&self, slug: &str) {
        self.state.send_modify(|state| {
            state.loading = true;
        });
        tokio::join!(self.load_post(slug), self.load_recent());
    }

    async fn load_post(&self, slug: &str) {
        match fetch_post(&self.client, slug).await {
            Ok(post) => self.state.send_modify(|state| {
                state.post = Some(post);
                state.error = false;
                state.loading = false;
            }),
            Err(err) => {
                tracing::warn!(slug, error = %err, "post fetch failed");
                self.state.send_modify(|state| {
                    state.error = true;
                    state.loading = false;
                });
            }
        }
    }

    async fn load_recent(&self) {
        let posts = fetch_recent(&self.client, self.recent_limit).await;
        self.state.send_modify(|state| {
            state.recent_posts = posts;
        });
    }
}

/// Card shown under "Recent articles".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostCard {
    pub title: String,
    pub category: String,
    pub image: String,
    pub slug: Option<String>,
}

impl From<&Post> for PostCard {
    fn from(post: &Post) -> Self {
        Self {
            title: post.title.clone().unwrap_or_default(),
            category: non_empty(post.category.as_deref())
                .unwrap_or(PLACEHOLDER_CATEGORY)
                .to_string(),
            image: non_empty(post.image.as_deref())
                .unwrap_or(PLACEHOLDER_CARD_IMAGE)
                .to_string(),
            slug: post.slug.clone(),
        }
    }
}

/// Fully resolved article view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleView {
    pub title: String,
    pub category: String,
    /// Link target for the category badge.
    pub category_link: String,
    pub image: String,
    pub published: Option<NaiveDate>,
    pub read_minutes: usize,
    pub content: String,
    /// Post id the comment section is attached to.
    pub comments_for: String,
    pub recent: Vec<PostCard>,
}

/// What the post page shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostView {
    Loading,
    Error,
    Article(ArticleView),
}

/// Renders the view for a state. Pure.
pub fn render(state: &PostViewState) -> PostView {
    if state.loading {
        return PostView::Loading;
    }
    if state.error {
        return PostView::Error;
    }

    let post = state.post.as_ref();
    let category = post.and_then(|p| non_empty(p.category.as_deref()));
    let content = post.and_then(|p| p.content.as_deref());

    PostView::Article(ArticleView {
        title: post
            .and_then(|p| non_empty(p.title.as_deref()))
            .unwrap_or(PLACEHOLDER_TITLE)
            .to_string(),
        category: category.unwrap_or(PLACEHOLDER_CATEGORY).to_string(),
        category_link: format!("/search?category={}", category.unwrap_or("general")),
        image: post
            .and_then(|p| non_empty(p.image.as_deref()))
            .unwrap_or(PLACEHOLDER_IMAGE)
            .to_string(),
        published: post
            .and_then(|p| p.created_at.as_deref())
            .and_then(parse_date),
        read_minutes: post.map_or(1, |_| read_minutes(content.unwrap_or(""))),
        content: non_empty(content).unwrap_or(PLACEHOLDER_CONTENT).to_string(),
        comments_for: post
            .and_then(|p| non_empty(Some(p.id.as_str())))
            .unwrap_or(PLACEHOLDER_POST_ID)
            .to_string(),
        recent: state.recent_posts.iter().map(PostCard::from).collect(),
    })
}

/// Reading time: one minute per thousand characters, rounded to nearest.
pub fn read_minutes(content: &str) -> usize {
    let len = content.chars().count();
    (len + 500) / 1000
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}
