//! Line-delimited JSON protocol: one `Request` per stdin line, one response
//! envelope per stdout line, echoing the request id.

mod error;
mod handlers;
mod helpers;
mod router;
mod types;

pub use error::malformed_request;
pub use router::handle_request;
pub use types::{AppState, Request};
