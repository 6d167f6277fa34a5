//! Upstream proxying.
//!
//! # Module Structure
//!
//! - `renderer` - builds the upstream request and relays the answer
//! - `headers` - which headers cross the hop in each direction
//! - `body` - outbound entity (chunked / fixed length, gzip re-encoding)
//! - `client` - shared pooled HTTP client
//! - `forward` - optional hop through a forward proxy
//! - `tls` - trust-all certificate verifier for proxy targets

pub mod body;
mod client;
mod forward;
pub mod headers;
mod renderer;
mod tls;

pub use client::{create_http_client, HttpClient};
pub use renderer::ProxyRenderer;
