//! Response sink module
//!
//! Write-once abstraction over the status line, headers and body of a response.
//! Handlers write through a sink instead of returning a response so that a handler
//! may accept a request and finish it later from a spawned task.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::HeaderMap;
use hyper::{Response, StatusCode};
use tokio::sync::oneshot;

use crate::error::DispatchError;
use crate::logger;

pub trait ResponseSink: Send + 'static {
    /// Set status and headers. Only the first call succeeds; any later call
    /// returns `DispatchError::HeadersAlreadySent` and leaves the head unchanged.
    fn write_head(&mut self, status: StatusCode, headers: HeaderMap) -> Result<(), DispatchError>;

    /// Append the body and finalize. Consumes the sink, so nothing can follow.
    fn end(self, body: Bytes);
}

/// Sink that delivers the finished response over a oneshot channel
///
/// Dropping the sink without calling `end` closes the channel, which the
/// receiving side observes as an abandoned response.
pub struct ChannelSink {
    head: Option<(StatusCode, HeaderMap)>,
    tx: oneshot::Sender<Response<Full<Bytes>>>,
}

impl ChannelSink {
    pub fn new() -> (Self, oneshot::Receiver<Response<Full<Bytes>>>) {
        let (tx, rx) = oneshot::channel();
        (Self { head: None, tx }, rx)
    }
}

impl ResponseSink for ChannelSink {
    fn write_head(&mut self, status: StatusCode, headers: HeaderMap) -> Result<(), DispatchError> {
        if self.head.is_some() {
            return Err(DispatchError::HeadersAlreadySent);
        }
        self.head = Some((status, headers));
        Ok(())
    }

    fn end(self, body: Bytes) {
        let (status, headers) = self
            .head
            .unwrap_or_else(|| (StatusCode::OK, HeaderMap::new()));
        let mut response = Response::new(Full::new(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;

        if self.tx.send(response).is_err() {
            logger::log_warning("Response finalized after the connection went away");
        }
    }
}

/// A single write observed by [`RecordingSink`]
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkWrite {
    Head(StatusCode, HeaderMap),
    End(Bytes),
}

/// Sink that records every write into a shared list
#[cfg(test)]
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub writes: std::sync::Arc<std::sync::Mutex<Vec<SinkWrite>>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn writes(&self) -> Vec<SinkWrite> {
        self.writes.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl ResponseSink for RecordingSink {
    fn write_head(&mut self, status: StatusCode, headers: HeaderMap) -> Result<(), DispatchError> {
        let mut writes = self.writes.lock().unwrap();
        if writes.iter().any(|w| matches!(w, SinkWrite::Head(..))) {
            return Err(DispatchError::HeadersAlreadySent);
        }
        writes.push(SinkWrite::Head(status, headers));
        Ok(())
    }

    fn end(self, body: Bytes) {
        self.writes.lock().unwrap().push(SinkWrite::End(body));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::{HeaderValue, CONTENT_TYPE};

    #[test]
    fn test_channel_sink_delivers_response() {
        let (mut sink, mut rx) = ChannelSink::new();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        sink.write_head(StatusCode::CREATED, headers).unwrap();
        sink.end(Bytes::from_static(b"done"));

        let response = rx.try_recv().unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
    }

    #[test]
    fn test_channel_sink_head_is_write_once() {
        let (mut sink, mut rx) = ChannelSink::new();
        sink.write_head(StatusCode::OK, HeaderMap::new()).unwrap();

        let second = sink.write_head(StatusCode::NOT_FOUND, HeaderMap::new());
        assert!(matches!(second, Err(DispatchError::HeadersAlreadySent)));

        sink.end(Bytes::new());
        assert_eq!(rx.try_recv().unwrap().status(), StatusCode::OK);
    }

    #[test]
    fn test_channel_sink_without_head_defaults_to_ok() {
        let (sink, mut rx) = ChannelSink::new();
        sink.end(Bytes::new());
        assert_eq!(rx.try_recv().unwrap().status(), StatusCode::OK);
    }

    #[test]
    fn test_dropped_channel_sink_closes_receiver() {
        let (sink, mut rx) = ChannelSink::new();
        drop(sink);
        assert!(matches!(
            rx.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
    }
}
