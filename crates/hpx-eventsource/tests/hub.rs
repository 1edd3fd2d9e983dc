//! End-to-end tests for the broadcast hub served through axum, consumed with
//! the crate's own client and with raw HTTP requests.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use futures_util::StreamExt;
use hpx_eventsource::{
    MemoryRepository, Publication, Server, ServerConfig,
    client::{Client, ClientConfig, StopOnStatus, Stream, StreamState},
};
use http::StatusCode;
use tokio::{net::TcpListener, time::timeout};

async fn serve(server: &Server, channel: &str) -> SocketAddr {
    let app = axum::Router::new().route("/events", server.handler(channel));
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind hub server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn quiet_server() -> Server {
    Server::with_config(ServerConfig::new().heartbeat_interval(None)).expect("server")
}

fn article(id: &str) -> Arc<Publication> {
    Arc::new(Publication::new(format!("article {id}")).with_id(id))
}

async fn open(addr: SocketAddr, last_event_id: &str) -> Stream {
    let client = Client::new(ClientConfig::new().retry(Duration::from_secs(30))).expect("client");
    let stream = client
        .subscribe(&format!("http://{addr}/events"), last_event_id)
        .await
        .expect("subscribe");
    let reached = timeout(
        Duration::from_secs(2),
        stream.handle().wait_for(StreamState::Open),
    )
    .await
    .expect("timeout");
    assert_eq!(reached, StreamState::Open);
    stream
}

async fn next_id(stream: &mut Stream) -> String {
    let event = timeout(Duration::from_secs(2), stream.next_event())
        .await
        .expect("timeout")
        .expect("event");
    event.id.to_string()
}

#[tokio::test]
async fn test_publish_order_is_preserved() {
    let server = quiet_server();
    let addr = serve(&server, "articles").await;
    let mut stream = open(addr, "").await;
    assert_eq!(server.subscriber_count("articles"), 1);

    for id in ["e1", "e2", "e3"] {
        server.publish(["articles"], article(id));
    }

    assert_eq!(next_id(&mut stream).await, "e1");
    assert_eq!(next_id(&mut stream).await, "e2");
    assert_eq!(next_id(&mut stream).await, "e3");
    stream.close();
}

#[tokio::test]
async fn test_replay_from_last_event_id() {
    let server = quiet_server();
    server.register("articles", Arc::new(MemoryRepository::new()));
    for id in ["2", "1", "3"] {
        server.publish(["articles"], article(id));
    }
    let addr = serve(&server, "articles").await;

    let mut stream = open(addr, "1").await;
    assert_eq!(next_id(&mut stream).await, "2");
    assert_eq!(next_id(&mut stream).await, "3");

    server.publish(["articles"], article("4"));
    assert_eq!(next_id(&mut stream).await, "4");
    stream.close();
}

#[tokio::test]
async fn test_multiline_payload_survives_the_wire() {
    let server = quiet_server();
    let addr = serve(&server, "articles").await;
    let mut stream = open(addr, "").await;

    server.publish(
        ["articles"],
        Arc::new(
            Publication::new("line one\nline two")
                .with_id("m1")
                .with_event_type("article"),
        ),
    );

    let event = timeout(Duration::from_secs(2), stream.next_event())
        .await
        .expect("timeout")
        .expect("event");
    assert_eq!(&*event.id, "m1");
    assert_eq!(&*event.event, "article");
    assert_eq!(&*event.data, "line one\nline two");
    stream.close();
}

#[tokio::test]
async fn test_response_headers_and_no_replay_without_header() {
    let server = quiet_server();
    server.register("articles", Arc::new(MemoryRepository::new()));
    server.publish(["articles"], article("old"));
    let addr = serve(&server, "articles").await;

    let response = timeout(
        Duration::from_secs(2),
        reqwest::get(format!("http://{addr}/events")),
    )
    .await
    .expect("timeout")
    .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["content-type"], "text/event-stream");
    assert_eq!(headers["cache-control"], "no-cache");
    assert_eq!(headers["x-accel-buffering"], "no");

    server.publish(["articles"], article("new"));
    let mut body = response.bytes_stream();
    let chunk = timeout(Duration::from_secs(2), body.next())
        .await
        .expect("timeout")
        .expect("chunk")
        .expect("body");
    assert_eq!(&chunk[..], b"id: new\ndata: article new\n\n");
}

#[tokio::test]
async fn test_heartbeat_comments_on_idle_connection() {
    let server = Server::with_config(
        ServerConfig::new()
            .heartbeat_interval(Some(Duration::from_millis(50)))
            .heartbeat_comment("ping"),
    )
    .expect("server");
    let addr = serve(&server, "articles").await;

    let response = reqwest::get(format!("http://{addr}/events"))
        .await
        .expect("response");
    let mut body = response.bytes_stream();
    let chunk = timeout(Duration::from_secs(2), body.next())
        .await
        .expect("timeout")
        .expect("chunk")
        .expect("body");
    assert_eq!(&chunk[..], b":ping\n");
}

#[tokio::test]
async fn test_close_disconnects_subscribers() {
    let server = quiet_server();
    let addr = serve(&server, "articles").await;

    let client = Client::with_handler(
        ClientConfig::new().retry(Duration::from_millis(50)),
        StopOnStatus::new([StatusCode::SERVICE_UNAVAILABLE]),
    )
    .expect("client");
    let stream = client
        .subscribe(&format!("http://{addr}/events"), "")
        .await
        .expect("subscribe");
    let reached = timeout(
        Duration::from_secs(2),
        stream.handle().wait_for(StreamState::Open),
    )
    .await
    .expect("timeout");
    assert_eq!(reached, StreamState::Open);

    server.close();
    server.close();
    assert!(server.is_closed());
    assert_eq!(server.subscriber_count("articles"), 0);

    // The stream ends, the reconnect is refused with 503, and the handler
    // stops the client.
    let reached = timeout(
        Duration::from_secs(2),
        stream.handle().wait_for(StreamState::Closed),
    )
    .await
    .expect("timeout");
    assert_eq!(reached, StreamState::Closed);

    let response = reqwest::get(format!("http://{addr}/events"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
