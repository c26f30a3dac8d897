//! Outbound HTTP plumbing shared by the upstream adapters.

mod http;

pub use http::{HttpTransport, TransportError};
