//! Outbound HTTP: the retrying, audited transport and the two platform
//! clients built on it.

pub mod downstream;
pub mod transport;
pub mod upstream;

pub use downstream::DownstreamClient;
pub use transport::{RetryingTransport, RetryingTransportBuilder, TransportRequest, TransportResponse};
pub use upstream::UpstreamClient;
