//! News Articles Example
//!
//! Publishes three JSON news articles on an `articles` channel, consumes them
//! live, then resubscribes with `Last-Event-ID: 1` to replay what came after.
//!
//! Run with: `RUST_LOG=info cargo run -p hpx-eventsource --example news_articles`

use std::{borrow::Cow, sync::Arc, time::Duration};

use hpx_eventsource::{
    Event, MemoryRepository, Server,
    client::{self, StreamState},
};
use serde::Serialize;
use tokio::{net::TcpListener, time::timeout};
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct NewsArticle {
    #[serde(skip)]
    id: String,
    title: String,
    content: String,
}

impl NewsArticle {
    fn new(id: &str, title: &str, content: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
        }
    }
}

impl Event for NewsArticle {
    fn id(&self) -> &str {
        &self.id
    }

    fn event_type(&self) -> &str {
        "News Article"
    }

    fn data(&self) -> Cow<'_, str> {
        Cow::Owned(serde_json::to_string(self).unwrap_or_default())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let server = Server::new();
    server.register("articles", Arc::new(MemoryRepository::new()));

    let app = axum::Router::new().route("/articles", server.handler("articles"));
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("http://{}/articles", listener.local_addr()?);
    tokio::spawn(async move { axum::serve(listener, app).await });

    // Live: events arrive in publish order.
    let mut live = client::subscribe(&url, "").await?;
    live.handle().wait_for(StreamState::Open).await;

    let articles = [
        NewsArticle::new(
            "2",
            "Governments struggle to control global price of gas",
            "Hot air....",
        ),
        NewsArticle::new("1", "Tomorrow is another day", "And so is the day after."),
        NewsArticle::new("3", "News for news' sake", "Nothing has happened."),
    ];
    for article in articles {
        server.publish(["articles"], Arc::new(article));
    }

    println!("live:");
    for _ in 0..3 {
        if let Some(event) = timeout(Duration::from_secs(5), live.next_event()).await? {
            println!("  {} {} {}", event.id, event.event, event.data);
        }
    }
    live.close();

    // Replay: everything after id "1", in id order.
    let mut replay = client::subscribe(&url, "1").await?;
    println!("replay after 1:");
    for _ in 0..2 {
        if let Some(event) = timeout(Duration::from_secs(5), replay.next_event()).await? {
            println!("  {} {} {}", event.id, event.event, event.data);
        }
    }
    replay.close();

    server.close();
    Ok(())
}
