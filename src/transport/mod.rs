//! HTTP plumbing shared by the remote and local adapters.

mod http;

pub use http::{HttpReply, HttpTransport};
