//! Async side of the interface thread: the administrative server

pub mod admin_server;
pub mod protocol;

pub use admin_server::{watch_interrupt, AdminServer, MAX_LINE_BYTES};
pub use protocol::{parse_request, Request, Response};
