//! HTTP protocol layer module
//!
//! Response sinks and response builders, decoupled from the route handlers.

pub mod response;
pub mod sink;

// Re-export commonly used types
pub use response::{build_404_response, send_json};
pub use sink::{ChannelSink, ResponseSink};
