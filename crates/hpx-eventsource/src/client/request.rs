//! Connection establishment: request headers, manual redirect following and
//! response validation.

use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use reqwest::Url;
use tokio::time::timeout;
use tracing::debug;

use super::config::ClientConfig;
use crate::error::{SseError, SseResult};

/// `Last-Event-ID` request header.
pub const LAST_EVENT_ID: HeaderName = HeaderName::from_static("last-event-id");

/// Headers carried from each request to the next across redirects.
pub const PROPAGATE_HEADERS: [HeaderName; 3] =
    [header::CACHE_CONTROL, header::ACCEPT, LAST_EVENT_ID];

const REDIRECT_STATUSES: [StatusCode; 5] = [
    StatusCode::MOVED_PERMANENTLY,
    StatusCode::FOUND,
    StatusCode::SEE_OTHER,
    StatusCode::TEMPORARY_REDIRECT,
    StatusCode::PERMANENT_REDIRECT,
];

const EVENT_STREAM: &str = "text/event-stream";

/// Build the HTTP client used for every connection of a stream.
///
/// Redirects are disabled here and followed by [`connect`] instead, so that
/// the stream headers survive every hop.
pub(crate) fn http_client(config: &ClientConfig) -> SseResult<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(config.connect_timeout)
        .build()
        .map_err(|e| SseError::config(format!("Failed to build HTTP client: {e}")))
}

/// Headers for one connection attempt: the configured extras plus the three
/// stream headers.
pub(crate) fn request_headers(extra: &HeaderMap, last_event_id: &str) -> SseResult<HeaderMap> {
    let mut headers = extra.clone();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::ACCEPT, HeaderValue::from_static(EVENT_STREAM));

    if !last_event_id.is_empty() {
        let value = HeaderValue::from_str(last_event_id)
            .map_err(|e| SseError::invalid_header(format!("Last-Event-ID: {e}")))?;
        headers.insert(LAST_EVENT_ID, value);
    }

    Ok(headers)
}

/// Open `url`, following redirects, and return the `200 OK` response whose
/// body is the event stream.
pub(crate) async fn connect(
    http: &reqwest::Client,
    config: &ClientConfig,
    url: &Url,
    last_event_id: &str,
) -> SseResult<reqwest::Response> {
    let headers = request_headers(&config.headers, last_event_id)?;
    timeout(config.connect_timeout, follow(http, config, url.clone(), headers))
        .await
        .map_err(|_| SseError::timeout(config.connect_timeout))?
}

async fn follow(
    http: &reqwest::Client,
    config: &ClientConfig,
    mut url: Url,
    mut headers: HeaderMap,
) -> SseResult<reqwest::Response> {
    let mut redirects = 0;

    loop {
        let response = http.get(url.clone()).headers(headers.clone()).send().await?;
        let status = response.status();

        if REDIRECT_STATUSES.contains(&status) {
            if redirects >= config.max_redirects {
                return Err(SseError::RedirectLimit {
                    limit: config.max_redirects,
                });
            }

            let next = redirect_target(&url, response.headers())?;
            redirects += 1;
            debug!(from = %url, to = %next, count = redirects, "Following redirect");

            if next.origin() != url.origin() {
                headers = propagated(&headers);
            }
            url = next;
            continue;
        }

        if status != StatusCode::OK {
            return Err(SseError::invalid_status(status, response.headers().clone()));
        }

        if config.validate_content_type {
            check_content_type(response.headers())?;
        }

        return Ok(response);
    }
}

/// Resolve the `Location` of a redirect response against the request URL.
pub(crate) fn redirect_target(url: &Url, headers: &HeaderMap) -> SseResult<Url> {
    let location = headers
        .get(header::LOCATION)
        .ok_or_else(|| SseError::invalid_redirect("missing Location header"))?
        .to_str()
        .map_err(|e| SseError::invalid_redirect(format!("Location is not valid text: {e}")))?;

    url.join(location)
        .map_err(|e| SseError::invalid_redirect(format!("{location}: {e}")))
}

/// Only the stream headers follow a redirect to another origin.
fn propagated(headers: &HeaderMap) -> HeaderMap {
    let mut kept = HeaderMap::new();
    for name in PROPAGATE_HEADERS {
        if let Some(value) = headers.get(&name) {
            kept.insert(name, value.clone());
        }
    }
    kept
}

fn check_content_type(headers: &HeaderMap) -> SseResult<()> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let media_type = content_type.split(';').next().unwrap_or("").trim();

    if media_type.eq_ignore_ascii_case(EVENT_STREAM) {
        Ok(())
    } else {
        Err(SseError::invalid_content_type(content_type))
    }
}
