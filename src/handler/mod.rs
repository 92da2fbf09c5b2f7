//! Request handler module
//!
//! Routes requests to the server info and payload handlers.

pub mod post_info;
pub mod router;
pub mod server_info;

// Re-export main entry point
pub use router::handle_request;
