//! Post command handlers.

use anyhow::Result;
use inkpost_core::backend::BackendClient;
use inkpost_core::config::Config;
use inkpost_core::posts::{self, ArticleView, PostCard, PostPage, PostView};

pub async fn show(config: &Config, slug: &str) -> Result<()> {
    let client = BackendClient::new(config.backend_url()?);
    let page = PostPage::new(client, config.posts.recent_limit);
    page.mount(slug).await;

    match posts::render(&page.snapshot()) {
        PostView::Loading => println!("Loading..."),
        PostView::Error => anyhow::bail!("Error loading post. Please try again later."),
        PostView::Article(article) => print_article(&article),
    }
    Ok(())
}

pub async fn recent(config: &Config) -> Result<()> {
    let client = BackendClient::new(config.backend_url()?);
    let posts = posts::fetch_recent(&client, config.posts.recent_limit).await;
    let cards: Vec<PostCard> = posts.iter().map(PostCard::from).collect();
    print_recent(&cards);
    Ok(())
}

fn print_article(article: &ArticleView) {
    println!("{}", article.title);
    println!("[{}] {}", article.category, article.category_link);
    println!("{}", article.image);
    let date = article
        .published
        .map_or_else(|| "Date".to_string(), |d| d.format("%-m/%-d/%Y").to_string());
    println!("{date} · {} mins read", article.read_minutes);
    println!();
    println!("{}", article.content);
    println!();
    println!("Comments for post {} are not available here.", article.comments_for);
    println!();
    print_recent(&article.recent);
}

pub fn print_recent(cards: &[PostCard]) {
    println!("Recent articles");
    if cards.is_empty() {
        println!("  (none)");
        return;
    }
    for card in cards {
        match &card.slug {
            Some(slug) => println!("  - {} [{}] ({slug})", card.title, card.category),
            None => println!("  - {} [{}]", card.title, card.category),
        }
    }
}
