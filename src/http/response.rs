//! HTTP response building module
//!
//! Helpers for writing JSON bodies into a sink and for the host's fallback responses.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::sink::ResponseSink;
use crate::logger;

/// Serialize `body` as JSON and finalize the sink with it
pub fn send_json<S, T>(mut sink: S, status: StatusCode, body: &T)
where
    S: ResponseSink,
    T: Serialize + ?Sized,
{
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let (status, body) = match serde_json::to_vec(body) {
        Ok(json) => (status, Bytes::from(json)),
        Err(e) => {
            logger::log_error(&format!("Failed to serialize response: {e}"));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Bytes::from_static(br#"{"error":"Internal server error"}"#),
            )
        }
    };

    if let Err(e) = sink.write_head(status, headers) {
        logger::log_error(&format!("Cannot send JSON response: {e}"));
        return;
    }
    sink.end(body);
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header(CONTENT_TYPE, "text/plain")
        .body(Full::new(Bytes::from("404 Not Found")))
        .unwrap_or_else(|e| {
            logger::log_error(&format!("Failed to build 404 response: {e}"));
            Response::new(Full::new(Bytes::from("404 Not Found")))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::sink::{RecordingSink, SinkWrite};

    #[test]
    fn test_send_json_writes_head_then_body() {
        let sink = RecordingSink::default();
        send_json(sink.clone(), StatusCode::OK, &serde_json::json!({"ok": true}));

        let writes = sink.writes();
        assert_eq!(writes.len(), 2);
        match &writes[0] {
            SinkWrite::Head(status, headers) => {
                assert_eq!(*status, StatusCode::OK);
                assert_eq!(headers[CONTENT_TYPE], "application/json");
            }
            other => panic!("expected head, got {other:?}"),
        }
        assert_eq!(writes[1], SinkWrite::End(Bytes::from(r#"{"ok":true}"#)));
    }

    #[test]
    fn test_send_json_refuses_a_second_head() {
        let mut sink = RecordingSink::default();
        sink.write_head(StatusCode::ACCEPTED, HeaderMap::new()).unwrap();

        send_json(sink.clone(), StatusCode::OK, &serde_json::json!({"ok": true}));

        assert_eq!(
            sink.writes(),
            vec![SinkWrite::Head(StatusCode::ACCEPTED, HeaderMap::new())]
        );
    }

    #[test]
    fn test_404_response() {
        let response = build_404_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
    }
}
