//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: matches the two fixed routes,
//! falls back to 404 for everything else and writes the access log.

use http_body_util::Full;
use hyper::body::{Body, Bytes, Incoming};
use hyper::header::{REFERER, USER_AGENT};
use hyper::{Method, Request, Response, Uri};
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use super::{post_info, server_info};
use crate::config::AppState;
use crate::error::DispatchError;
use crate::http::{self, ChannelSink, ResponseSink};
use crate::logger::{self, AccessLogEntry, PayloadLog};

pub const SERVER_INFO_PATH: &str = "/getServerInfo";
pub const POST_INFO_PATH: &str = "/postInfo";

/// Access log status for a connection closed without a response
const NO_RESPONSE_STATUS: u16 = 444;

/// Request URL as received: path plus query string, if any
pub fn request_url(uri: &Uri) -> &str {
    uri.path_and_query()
        .map_or_else(|| uri.path(), hyper::http::uri::PathAndQuery::as_str)
}

/// Try to handle `req`, writing the response into `sink`.
///
/// Returns `false` without touching the sink when no route matches.
/// `true` means the sink has been finalized, or will be by a spawned task.
pub fn dispatch<B, S>(req: Request<B>, sink: S, payload_log: Arc<dyn PayloadLog>) -> bool
where
    B: Body + Send + Unpin + 'static,
    B::Data: Send,
    B::Error: Display + Send,
    S: ResponseSink,
{
    let url = request_url(req.uri());

    if url == SERVER_INFO_PATH && *req.method() == Method::GET {
        server_info::respond(&req, sink);
        return true;
    }

    if url == POST_INFO_PATH && *req.method() == Method::POST {
        post_info::spawn(req.into_body(), sink, payload_log);
        return true;
    }

    false
}

/// Main entry point for HTTP request handling
///
/// An accepted request whose sink is dropped unfinalized (invalid JSON on
/// `POST /postInfo`) yields `DispatchError::Abandoned`, and hyper closes the
/// connection without writing a response.
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, DispatchError> {
    let started = Instant::now();
    let access_log = state.config.logging.access_log;

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        request_url(req.uri()).to_string(),
    );
    entry.set_version(req.version());
    entry.referer = header_string(&req, REFERER);
    entry.user_agent = header_string(&req, USER_AGENT);

    let (sink, rx) = ChannelSink::new();
    let outcome = if dispatch(req, sink, Arc::clone(&state.payload_log)) {
        rx.await.map_err(|_| DispatchError::Abandoned)
    } else {
        Ok(http::build_404_response())
    };

    if outcome.is_err() {
        logger::log_warning(&format!(
            "{} {} accepted but never answered",
            entry.method, entry.url
        ));
    }

    if access_log {
        complete_entry(&mut entry, &outcome, started);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    outcome
}

/// Fill in the response side of an access log entry.
/// A request that was never answered is logged with status 444.
fn complete_entry(
    entry: &mut AccessLogEntry,
    outcome: &Result<Response<Full<Bytes>>, DispatchError>,
    started: Instant,
) {
    match outcome {
        Ok(response) => {
            entry.status = response.status().as_u16();
            entry.body_bytes = response.body().size_hint().exact().unwrap_or(0);
        }
        Err(_) => {
            entry.status = NO_RESPONSE_STATUS;
            entry.body_bytes = 0;
        }
    }
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
}

fn header_string<B>(req: &Request<B>, name: hyper::header::HeaderName) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::sink::RecordingSink;
    use crate::logger::RecordingLog;
    use futures_util::stream;
    use http_body_util::{BodyExt, Empty, StreamBody};
    use hyper::body::Frame;
    use hyper::header::CONTENT_TYPE;
    use hyper::StatusCode;
    use serde_json::{json, Value};
    use std::convert::Infallible;

    type ChunkedBody =
        StreamBody<stream::Iter<std::vec::IntoIter<Result<Frame<Bytes>, Infallible>>>>;

    fn request(method: Method, uri: &str, chunks: &[&'static str]) -> Request<ChunkedBody> {
        let frames: Vec<_> = chunks
            .iter()
            .map(|c| Ok(Frame::data(Bytes::from_static(c.as_bytes()))))
            .collect();
        Request::builder()
            .method(method)
            .uri(uri)
            .header("host", "localhost:8080")
            .header("user-agent", "test-client/1.0")
            .body(StreamBody::new(stream::iter(frames)))
            .unwrap()
    }

    async fn body_json(response: Response<Full<Bytes>>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_get_server_info() {
        let log = Arc::new(RecordingLog::default());
        let req = Request::builder()
            .method(Method::GET)
            .uri(SERVER_INFO_PATH)
            .header("host", "localhost:8080")
            .header("accept", "*/*")
            .header("x-request-id", "42")
            .body(Empty::<Bytes>::new())
            .unwrap();
        let (sink, mut rx) = ChannelSink::new();

        assert!(dispatch(req, sink, log.clone()));

        // Finalized before dispatch returned
        let response = rx.try_recv().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(
            body_json(response).await,
            json!({
                "serverName": "My Node.js Server",
                "requestInfo": {
                    "url": "/getServerInfo",
                    "method": "GET",
                    "headers": {
                        "host": "localhost:8080",
                        "accept": "*/*",
                        "x-request-id": "42"
                    }
                }
            })
        );
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_post_info_acknowledges_and_logs() {
        let log = Arc::new(RecordingLog::default());
        let (sink, rx) = ChannelSink::new();

        assert!(dispatch(
            request(Method::POST, POST_INFO_PATH, &[r#"{"a":1}"#]),
            sink,
            log.clone()
        ));

        let response = rx.await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(
            body_json(response).await,
            json!({"message": "Data received successfully!"})
        );
        assert_eq!(log.entries(), vec![json!({"a": 1})]);
    }

    #[tokio::test]
    async fn test_post_info_chunk_boundaries_do_not_matter() {
        let whole = Arc::new(RecordingLog::default());
        let split = Arc::new(RecordingLog::default());

        let (sink, rx) = ChannelSink::new();
        assert!(dispatch(
            request(Method::POST, POST_INFO_PATH, &[r#"{"a":1}"#]),
            sink,
            whole.clone()
        ));
        rx.await.unwrap();

        let (sink, rx) = ChannelSink::new();
        assert!(dispatch(
            request(Method::POST, POST_INFO_PATH, &[r#"{"a":"#, "1}"]),
            sink,
            split.clone()
        ));
        rx.await.unwrap();

        assert_eq!(whole.entries(), split.entries());
        assert_eq!(split.entries(), vec![json!({"a": 1})]);
    }

    #[tokio::test]
    async fn test_unmatched_routes_leave_sink_untouched() {
        let cases = [
            (Method::GET, POST_INFO_PATH),
            (Method::POST, SERVER_INFO_PATH),
            (Method::PUT, POST_INFO_PATH),
            (Method::GET, "/"),
            (Method::GET, "/getServerInfo/"),
            (Method::GET, "/getserverinfo"),
            (Method::GET, "/getServerInfo?verbose=1"),
        ];

        for (method, uri) in cases {
            let log = Arc::new(RecordingLog::default());
            let sink = RecordingSink::default();

            assert!(
                !dispatch(request(method.clone(), uri, &["{}"]), sink.clone(), log.clone()),
                "{method} {uri} should not be handled"
            );
            assert!(sink.writes().is_empty(), "{method} {uri} wrote to the sink");
            assert!(log.entries().is_empty());
        }
    }

    #[tokio::test]
    async fn test_invalid_json_is_never_answered() {
        let log = Arc::new(RecordingLog::default());
        let (sink, rx) = ChannelSink::new();

        assert!(dispatch(
            request(Method::POST, POST_INFO_PATH, &["not-json"]),
            sink,
            log.clone()
        ));

        assert!(rx.await.is_err());
        assert!(log.entries().is_empty());
    }

    #[test]
    fn test_complete_entry_for_answered_request() {
        let mut entry = AccessLogEntry::new(
            "127.0.0.1".to_string(),
            "GET".to_string(),
            "/missing".to_string(),
        );
        let outcome = Ok(http::build_404_response());

        complete_entry(&mut entry, &outcome, Instant::now());

        assert_eq!(entry.status, 404);
        assert_eq!(entry.body_bytes, "404 Not Found".len() as u64);
    }

    #[test]
    fn test_complete_entry_for_abandoned_request() {
        let mut entry = AccessLogEntry::new(
            "127.0.0.1".to_string(),
            "POST".to_string(),
            POST_INFO_PATH.to_string(),
        );
        let outcome = Err(DispatchError::Abandoned);

        complete_entry(&mut entry, &outcome, Instant::now());

        assert_eq!(entry.status, 444);
        assert_eq!(entry.body_bytes, 0);
        assert!(entry
            .format("common")
            .contains("\"POST /postInfo HTTP/1.1\" 444 0"));
    }

    #[test]
    fn test_request_url_keeps_query() {
        let uri: Uri = "/postInfo?x=1".parse().unwrap();
        assert_eq!(request_url(&uri), "/postInfo?x=1");
        let uri: Uri = "/getServerInfo".parse().unwrap();
        assert_eq!(request_url(&uri), "/getServerInfo");
    }
}
