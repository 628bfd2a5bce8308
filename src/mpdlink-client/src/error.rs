use mpdlink_protocol::{EngineError, ErrorEvent, Fault};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },
    #[error("server rejected command: {0}")]
    Fault(#[from] Fault),
    #[error(transparent)]
    Usage(#[from] EngineError),
    /// The connection failed before it became ready.
    #[error("{0}")]
    Connection(ErrorEvent),
    #[error("connection closed before the command completed")]
    ConnectionClosed,
}
