use thiserror::Error;

/// A body line that is not of the form `key: value`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not parse entry \"{line}\"")]
pub struct ParseError {
    pub line: String,
}

/// Violations of the idle/command contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("connection is not established")]
    NotConnected,
    #[error("connection is already established")]
    AlreadyConnected,
    #[error("commands can only be sent while the connection is idling")]
    NotIdling,
    #[error("received a response with no pending command: {status_line}")]
    UnexpectedFrame { status_line: String },
    #[error("expected server greeting, got {status_line}")]
    UnexpectedGreeting { status_line: String },
}
