//! Client stream driver.
//!
//! Provides [`Client`], [`Stream`], [`StreamHandle`], [`Events`] and
//! [`Errors`] for consuming an SSE endpoint with automatic reconnection,
//! `Last-Event-ID` resumption and server-advised retry intervals.

use std::{
    future::poll_fn,
    pin::{Pin, pin},
    sync::Arc,
    task::{Context, Poll, ready},
    time::Duration,
};

use futures_util::StreamExt;
use http::HeaderValue;
use parking_lot::Mutex;
use reqwest::Url;
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    oneshot, watch,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    config::ClientConfig,
    handler::{AlwaysReconnect, ReconnectHandler},
    request::{connect, http_client, request_headers},
};
use crate::{
    codec::{DecodeError, Decoder, Publication},
    error::{SseError, SseResult},
    reconnect::Backoff,
};

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// Client stream state machine states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamState {
    /// Establishing a connection, or waiting to retry.
    Connecting,
    /// Receiving events.
    Open,
    /// Terminal; no further events or errors are delivered.
    Closed,
}

impl StreamState {
    /// Returns `true` if the connection is actively streaming.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` if the stream is in its terminal state.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

// ---------------------------------------------------------------------------
// Public API: Client
// ---------------------------------------------------------------------------

/// Entry point for client streams.
///
/// One client can open any number of independent streams; each runs its own
/// background task.
///
/// # Example
///
/// ```rust,no_run
/// use hpx_eventsource::client::{Client, ClientConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::new(ClientConfig::default())?;
/// let mut stream = client.subscribe("http://127.0.0.1:8080/articles", "").await?;
///
/// while let Some(event) = stream.next_event().await {
///     println!("{}: {}", event.id, event.data);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    http: reqwest::Client,
    handler: Arc<dyn ReconnectHandler>,
}

impl Client {
    /// Create a client that reconnects after every error.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails.
    pub fn new(config: ClientConfig) -> SseResult<Self> {
        Self::with_handler(config, AlwaysReconnect)
    }

    /// Create a client whose reconnects are governed by `handler`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails.
    pub fn with_handler<H: ReconnectHandler>(config: ClientConfig, handler: H) -> SseResult<Self> {
        config.validate().map_err(SseError::config)?;
        let http = http_client(&config)?;

        Ok(Self {
            config: Arc::new(config),
            http,
            handler: Arc::new(handler),
        })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Subscribe to the event stream at `url`.
    ///
    /// The first connection attempt runs before this returns. Its failure is
    /// returned only with [`ClientConfig::fail_fast`]; otherwise it is
    /// reported on [`Errors`] and retried in the background. A non-empty
    /// `last_event_id` is sent as `Last-Event-ID` on the first request.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not an absolute `http(s)` URL, if
    /// `last_event_id` is not a valid header value, or (with `fail_fast`) if
    /// the first connection attempt fails.
    pub async fn subscribe(&self, url: &str, last_event_id: &str) -> SseResult<Stream> {
        let parsed = Url::parse(url).map_err(|e| SseError::invalid_url(url, e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SseError::invalid_url(url, "scheme must be http or https"));
        }
        request_headers(&self.config.headers, last_event_id)?;

        info!(url = %parsed, attempt = 0, "SSE connecting");
        let first = match connect(&self.http, &self.config, &parsed, last_event_id).await {
            Err(err) if self.config.fail_fast => {
                warn!(url = %parsed, error = %err, "SSE connection failed");
                return Err(err);
            }
            other => other,
        };

        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(StreamState::Connecting);
        let (event_tx, event_rx) = mpsc::channel(1);
        let (error_tx, error_rx) = mpsc::channel(self.config.error_channel_capacity);
        let last_event_id = Arc::new(Mutex::new(last_event_id.to_string()));

        let driver = Driver {
            config: Arc::clone(&self.config),
            http: self.http.clone(),
            handler: Arc::clone(&self.handler),
            url: parsed,
            backoff: Backoff::new(&self.config),
            last_event_id: Arc::clone(&last_event_id),
            cancel: cancel.clone(),
            state: state_tx,
            events: event_tx,
            errors: error_tx,
        };
        tokio::spawn(driver.run(first));

        Ok(Stream {
            handle: StreamHandle {
                cancel: cancel.clone(),
                state: state_rx,
                last_event_id: Arc::clone(&last_event_id),
            },
            events: Events {
                rx: Output::new(event_rx, cancel.clone()),
                last_event_id,
            },
            errors: Errors {
                rx: Output::new(error_rx, cancel),
            },
        })
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Subscribe to `url` with [`ClientConfig::default`] and [`AlwaysReconnect`].
///
/// # Errors
///
/// See [`Client::subscribe`].
pub async fn subscribe(url: &str, last_event_id: &str) -> SseResult<Stream> {
    Client::new(ClientConfig::default())?
        .subscribe(url, last_event_id)
        .await
}

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

/// A running subscription: a control handle plus the two output sequences.
///
/// Call [`split`](Stream::split) to consume events and errors from
/// independent tasks.
#[derive(Debug)]
pub struct Stream {
    handle: StreamHandle,
    events: Events,
    errors: Errors,
}

impl Stream {
    /// Get a reference to the control handle.
    pub fn handle(&self) -> &StreamHandle {
        &self.handle
    }

    /// Close the stream. See [`StreamHandle::close`].
    pub fn close(&self) {
        self.handle.close();
    }

    /// Receive the next event. Returns `None` once the stream is closed.
    pub async fn next_event(&mut self) -> Option<Publication> {
        self.events.recv().await
    }

    /// Receive the next error. Returns `None` once the stream is closed.
    pub async fn next_error(&mut self) -> Option<SseError> {
        self.errors.recv().await
    }

    /// Split into a control handle, the event sequence and the error
    /// sequence.
    pub fn split(self) -> (StreamHandle, Events, Errors) {
        (self.handle, self.events, self.errors)
    }
}

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// Clone-able handle for controlling and observing a running stream.
#[derive(Clone, Debug)]
pub struct StreamHandle {
    cancel: CancellationToken,
    state: watch::Receiver<StreamState>,
    last_event_id: Arc<Mutex<String>>,
}

impl StreamHandle {
    /// Close the stream.
    ///
    /// Idempotent and safe to call from any task, including while a connect,
    /// read or backoff sleep is in flight. No event or error is observed
    /// after this returns, and the connection is released.
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            info!("SSE connection closing (requested)");
            self.cancel.cancel();
        }
    }

    /// Current state.
    pub fn state(&self) -> StreamState {
        if self.cancel.is_cancelled() {
            return StreamState::Closed;
        }
        *self.state.borrow()
    }

    /// Wait until the stream reaches `target` or closes, returning the state
    /// reached.
    pub async fn wait_for(&self, target: StreamState) -> StreamState {
        let mut state = self.state.clone();
        let reached = state
            .wait_for(|s| *s == target || s.is_closed())
            .await
            .map(|s| *s);
        reached.unwrap_or(StreamState::Closed)
    }

    /// Identifier of the last event the consumer received with a non-empty
    /// id, or the initial one passed to `subscribe`.
    pub fn last_event_id(&self) -> String {
        self.last_event_id.lock().clone()
    }
}

// ---------------------------------------------------------------------------
// Events / Errors
// ---------------------------------------------------------------------------

/// Receiver that goes silent as soon as the stream is closed.
#[derive(Debug)]
struct Output<T> {
    rx: mpsc::Receiver<T>,
    cancel: CancellationToken,
}

impl<T> Output<T> {
    fn new(rx: mpsc::Receiver<T>, cancel: CancellationToken) -> Self {
        Self { rx, cancel }
    }

    fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<T>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        match ready!(self.rx.poll_recv(cx)) {
            Some(item) if !self.cancel.is_cancelled() => Poll::Ready(Some(item)),
            _ => Poll::Ready(None),
        }
    }
}

/// One decoded event on its way to the consumer.
///
/// The driver decodes nothing further until `ack` fires or is dropped.
#[derive(Debug)]
struct Delivery {
    event: Publication,
    /// New resume point, adopted once the consumer takes the event.
    resume_id: Option<String>,
    ack: oneshot::Sender<()>,
}

/// Decoded events, delivered one at a time.
///
/// The stream does not read ahead: the next event is decoded only after the
/// previous one was received. Dropping this closes the stream.
#[derive(Debug)]
pub struct Events {
    rx: Output<Delivery>,
    last_event_id: Arc<Mutex<String>>,
}

impl Events {
    /// Receive the next event. Returns `None` once the stream is closed.
    pub async fn recv(&mut self) -> Option<Publication> {
        poll_fn(|cx| self.poll_event(cx)).await
    }

    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<Publication>> {
        let Some(delivery) = ready!(self.rx.poll_recv(cx)) else {
            return Poll::Ready(None);
        };
        if let Some(id) = delivery.resume_id {
            *self.last_event_id.lock() = id;
        }
        let _ = delivery.ack.send(());
        Poll::Ready(Some(delivery.event))
    }
}

impl futures_core::Stream for Events {
    type Item = Publication;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_event(cx)
    }
}

/// Connection errors, each followed by a reconnect.
///
/// Bounded by [`ClientConfig::error_channel_capacity`]; errors arriving while
/// it is full are dropped.
#[derive(Debug)]
pub struct Errors {
    rx: Output<SseError>,
}

impl Errors {
    /// Receive the next error. Returns `None` once the stream is closed.
    pub async fn recv(&mut self) -> Option<SseError> {
        poll_fn(|cx| self.rx.poll_recv(cx)).await
    }
}

impl futures_core::Stream for Errors {
    type Item = SseError;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

// ---------------------------------------------------------------------------
// Internal: background driver
// ---------------------------------------------------------------------------

/// The long-lived background task that drives one stream.
///
/// It reads events, forwards them to the consumer, and reconnects with
/// exponential backoff on failures.
struct Driver {
    config: Arc<ClientConfig>,
    http: reqwest::Client,
    handler: Arc<dyn ReconnectHandler>,
    url: Url,
    backoff: Backoff,
    last_event_id: Arc<Mutex<String>>,
    cancel: CancellationToken,
    state: watch::Sender<StreamState>,
    events: mpsc::Sender<Delivery>,
    errors: mpsc::Sender<SseError>,
}

impl Driver {
    async fn run(mut self, first: SseResult<reqwest::Response>) {
        let mut pending = Some(first);

        loop {
            let connection = match pending.take() {
                Some(connection) => connection,
                None => {
                    self.state.send_replace(StreamState::Connecting);
                    let last_event_id = self.last_event_id.lock().clone();
                    info!(url = %self.url, attempt = self.backoff.failures(), "SSE connecting");

                    tokio::select! {
                        biased;
                        () = self.stopped() => break,
                        result = connect(&self.http, &self.config, &self.url, &last_event_id) => result,
                    }
                }
            };

            match connection {
                Ok(response) => {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    info!(url = %self.url, "SSE connection established");
                    self.state.send_replace(StreamState::Open);
                    self.backoff.reset();
                    self.handler.on_connect();

                    let outcome = self.read(response).await;
                    self.handler.on_disconnect();
                    let Some(err) = outcome else {
                        break;
                    };

                    self.state.send_replace(StreamState::Connecting);
                    let delay = self.backoff.next_delay();
                    if !self.recover(err, delay).await {
                        break;
                    }
                }
                Err(err) => {
                    warn!(url = %self.url, error = %err, "SSE connection failed");
                    let delay = self.backoff.next_delay();
                    if !self.recover(err, delay).await {
                        break;
                    }
                }
            }
        }

        self.cancel.cancel();
        self.state.send_replace(StreamState::Closed);
        info!(url = %self.url, "SSE stream closed");
    }

    /// Forward events until the connection fails (`Some`) or the stream is
    /// stopped (`None`).
    async fn read(&mut self, response: reqwest::Response) -> Option<SseError> {
        let mut decoder = pin!(Decoder::new(response.bytes_stream()));

        loop {
            let item = tokio::select! {
                biased;
                () = self.stopped() => return None,
                item = decoder.next() => item,
            };

            let event = match item {
                Some(Ok(event)) => event,
                Some(Err(err)) => {
                    warn!(url = %self.url, error = %err, "SSE stream error");
                    return Some(err.into());
                }
                None => return Some(SseError::Decode(DecodeError::EndOfStream)),
            };

            let resume_id = self.observe(&event);
            debug!(event_type = &*event.event, id = &*event.id, "SSE event received");

            let (ack, delivered) = oneshot::channel();
            let delivery = Delivery {
                event,
                resume_id,
                ack,
            };
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return None,
                sent = self.events.send(delivery) => {
                    if sent.is_err() {
                        info!("SSE consumer dropped, shutting down");
                        return None;
                    }
                }
            }
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return None,
                taken = delivered => {
                    if taken.is_err() {
                        info!("SSE consumer dropped, shutting down");
                        return None;
                    }
                }
            }
        }
    }

    /// Adopt a server-advised retry interval and return the event's resume
    /// point, if it has a usable one.
    fn observe(&mut self, event: &Publication) -> Option<String> {
        if let Some(retry) = event.retry
            && self.backoff.set_retry(retry)
        {
            debug!(retry_ms = retry.as_millis() as u64, "SSE retry interval updated");
        }

        if event.id.is_empty() {
            return None;
        }
        if HeaderValue::from_str(&event.id).is_err() {
            debug!(id = &*event.id, "Event id not usable as Last-Event-ID, keeping previous");
            return None;
        }
        Some(event.id.to_string())
    }

    /// Consult the handler, report `err` and sleep. Returns `false` when the
    /// stream should close instead of reconnecting.
    async fn recover(&self, err: SseError, delay: Duration) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if !self.handler.should_reconnect(&err) {
            info!(error = %err, "Reconnect handler requested stop, closing");
            return false;
        }

        self.emit(err);
        warn!(
            delay_ms = delay.as_millis() as u64,
            "SSE reconnecting after backoff"
        );

        tokio::select! {
            biased;
            () = self.stopped() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }

    fn emit(&self, err: SseError) {
        match self.errors.try_send(err) {
            Ok(()) => {}
            Err(TrySendError::Full(err)) => {
                warn!(error = %err, "SSE error channel full, dropping error");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Resolves once the stream was closed or the event consumer went away.
    async fn stopped(&self) {
        tokio::select! {
            () = self.cancel.cancelled() => {}
            () = self.events.closed() => debug!("SSE consumer dropped"),
        }
    }
}
