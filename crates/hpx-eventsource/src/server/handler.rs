//! HTTP surface of the hub.

use std::{convert::Infallible, sync::Arc};

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{MethodRouter, get},
};
use futures_util::StreamExt;
use tracing::warn;

use super::hub::Server;

const LAST_EVENT_ID: &str = "last-event-id";
const X_ACCEL_BUFFERING: &str = "x-accel-buffering";

impl Server {
    /// A `GET` route streaming `channel` to each caller.
    ///
    /// The request's `Last-Event-ID` header, when present and non-empty,
    /// selects the replay starting point. The response is
    /// `text/event-stream` and stays open until the client goes away or the
    /// hub is closed; a closed hub answers `503 Service Unavailable`.
    pub fn handler<S>(&self, channel: impl Into<String>) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let server = self.clone();
        let channel: Arc<str> = Arc::from(channel.into());

        get(move |headers: HeaderMap| {
            let server = server.clone();
            let channel = Arc::clone(&channel);
            async move { server.respond(&channel, &headers) }
        })
    }

    fn respond(&self, channel: &str, headers: &HeaderMap) -> Response {
        let last_event_id = headers
            .get(LAST_EVENT_ID)
            .and_then(|value| value.to_str().ok())
            .filter(|id| !id.is_empty());

        match self.subscribe(channel, last_event_id) {
            Ok(subscription) => (
                [
                    (
                        header::CONTENT_TYPE,
                        HeaderValue::from_static("text/event-stream"),
                    ),
                    (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
                    (
                        header::HeaderName::from_static(X_ACCEL_BUFFERING),
                        HeaderValue::from_static("no"),
                    ),
                ],
                Body::from_stream(subscription.map(Ok::<_, Infallible>)),
            )
                .into_response(),
            Err(err) => {
                warn!(channel, error = %err, "Rejecting subscriber");
                (StatusCode::SERVICE_UNAVAILABLE, err.to_string()).into_response()
            }
        }
    }
}
