//! `POST /postInfo` handler
//!
//! Reads the whole body, parses it as JSON, hands it to the payload log and
//! acknowledges. Invalid JSON is never answered: the sink is dropped unfinalized.

use hyper::body::{Body, Buf};
use hyper::StatusCode;
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;
use std::sync::Arc;

use super::router::POST_INFO_PATH;
use crate::error::DispatchError;
use crate::http::{send_json, ResponseSink};
use crate::logger::{self, PayloadLog};

pub const ACK_MESSAGE: &str = "Data received successfully!";

#[derive(Debug, Serialize)]
struct Acknowledgement {
    message: &'static str,
}

/// Start handling the request on a background task and return immediately
pub fn spawn<B, S>(body: B, sink: S, payload_log: Arc<dyn PayloadLog>)
where
    B: Body + Send + Unpin + 'static,
    B::Data: Send,
    B::Error: Display + Send,
    S: ResponseSink,
{
    tokio::spawn(async move {
        if let Err(e) = receive(body, sink, payload_log.as_ref()).await {
            logger::log_error(&format!("POST {POST_INFO_PATH}: {e}"));
        }
    });
}

/// Accumulate, parse, log and acknowledge
pub async fn receive<B, S>(
    body: B,
    sink: S,
    payload_log: &dyn PayloadLog,
) -> Result<(), DispatchError>
where
    B: Body + Unpin,
    B::Error: Display,
    S: ResponseSink,
{
    let raw = accumulate(body).await?;
    let text = String::from_utf8_lossy(&raw);
    let data = parse_payload(&text)?;

    payload_log.record(&data);

    send_json(
        sink,
        StatusCode::OK,
        &Acknowledgement {
            message: ACK_MESSAGE,
        },
    );
    Ok(())
}

/// Parse any JSON document: nesting depth is unbounded (the stack grows on
/// demand) and numbers keep their literal text, so `1e400` is not rejected.
fn parse_payload(text: &str) -> Result<Value, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

/// Concatenate every data frame until end-of-stream.
/// Text decoding happens once over the whole buffer, so a multi-byte
/// character split across chunks still decodes correctly.
async fn accumulate<B>(mut body: B) -> Result<Vec<u8>, DispatchError>
where
    B: Body + Unpin,
    B::Error: Display,
{
    let mut raw = Vec::new();
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| DispatchError::Body(e.to_string()))?;
        if let Ok(mut data) = frame.into_data() {
            let chunk = data.copy_to_bytes(data.remaining());
            raw.extend_from_slice(&chunk);
        }
    }
    Ok(raw)
}
