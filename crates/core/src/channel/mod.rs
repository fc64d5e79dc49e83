//! Payment status channel: transports, deduplication and the per-reservation
//! connection adapter.

mod adapter;
mod dedup;
mod simulated;
mod transport;
mod ws;

pub use adapter::ChannelAdapter;
pub use dedup::DedupCache;
pub use simulated::SimulatedStatusTransport;
pub use transport::{ChannelError, StatusStream, StatusTransport};
pub use ws::WsStatusTransport;
