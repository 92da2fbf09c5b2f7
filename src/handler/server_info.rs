//! `GET /getServerInfo` handler
//!
//! Echoes the request line and headers back to the client together with the server name.

use hyper::header::{HeaderMap, COOKIE, SET_COOKIE};
use hyper::{Request, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};

use super::router::request_url;
use crate::http::{send_json, ResponseSink};

pub const SERVER_NAME: &str = "My Node.js Server";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfo<'a> {
    server_name: &'static str,
    request_info: RequestInfo<'a>,
}

#[derive(Debug, Serialize)]
struct RequestInfo<'a> {
    url: &'a str,
    method: &'a str,
    headers: Map<String, Value>,
}

/// Write the server info record for `req` and finalize the sink
pub fn respond<B, S: ResponseSink>(req: &Request<B>, sink: S) {
    let info = ServerInfo {
        server_name: SERVER_NAME,
        request_info: RequestInfo {
            url: request_url(req.uri()),
            method: req.method().as_str(),
            headers: echo_headers(req.headers()),
        },
    };
    send_json(sink, StatusCode::OK, &info);
}

/// Headers where a repeated value is dropped and only the first one is echoed
const SINGLETON_HEADERS: &[&str] = &[
    "age",
    "authorization",
    "content-length",
    "content-type",
    "etag",
    "expires",
    "from",
    "host",
    "if-modified-since",
    "if-unmodified-since",
    "last-modified",
    "location",
    "max-forwards",
    "proxy-authorization",
    "referer",
    "retry-after",
    "server",
    "user-agent",
];

/// Flatten request headers into a JSON object keyed by lowercase name.
///
/// Repeated values: singleton headers keep the first value, `set-cookie`
/// stays a list, `cookie` is joined with "; " and everything else with ", ".
pub fn echo_headers(headers: &HeaderMap) -> Map<String, Value> {
    let mut echoed = Map::new();
    for name in headers.keys() {
        let mut values = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

        let value = if *name == SET_COOKIE {
            Value::Array(values.map(Value::String).collect())
        } else if SINGLETON_HEADERS.contains(&name.as_str()) {
            Value::String(values.next().unwrap_or_default())
        } else {
            let separator = if *name == COOKIE { "; " } else { ", " };
            Value::String(values.collect::<Vec<_>>().join(separator))
        };
        echoed.insert(name.as_str().to_string(), value);
    }
    echoed
}
