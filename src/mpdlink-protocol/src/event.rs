use crate::fault::Fault;
use thiserror::Error;

/// Notifications produced by the engine, in the order the causing frames arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The transport is up; the server greeting has not arrived yet.
    Connected,
    /// Greeting received and the idle loop started; commands may be sent.
    Ready { version: String },
    /// A subsystem changed (typed form).
    Changed(Subsystem),
    /// A subsystem changed (name as sent by the server). Always follows the
    /// matching [`Event::Changed`].
    SubsystemChanged { name: String },
    /// The transport closed. Handlers still pending are abandoned.
    Closed,
    Error(ErrorEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorEvent {
    #[error("transport error: {0}")]
    Transport(String),
    /// The idle request failed; the idle loop has stopped.
    #[error("idle failed: {0}")]
    IdleFault(Fault),
    /// A detached command failed.
    #[error("command failed: {0}")]
    Fault(Fault),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Subsystems named in `idle` responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Database,
    Update,
    StoredPlaylist,
    Playlist,
    Player,
    Mixer,
    Output,
    Options,
    Partition,
    Sticker,
    Subscription,
    Message,
    Neighbor,
    Mount,
    Other(String),
}

impl Subsystem {
    pub fn from_name(name: &str) -> Self {
        match name {
            "database" => Subsystem::Database,
            "update" => Subsystem::Update,
            "stored_playlist" => Subsystem::StoredPlaylist,
            "playlist" => Subsystem::Playlist,
            "player" => Subsystem::Player,
            "mixer" => Subsystem::Mixer,
            "output" => Subsystem::Output,
            "options" => Subsystem::Options,
            "partition" => Subsystem::Partition,
            "sticker" => Subsystem::Sticker,
            "subscription" => Subsystem::Subscription,
            "message" => Subsystem::Message,
            "neighbor" => Subsystem::Neighbor,
            "mount" => Subsystem::Mount,
            other => Subsystem::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Subsystem::Database => "database",
            Subsystem::Update => "update",
            Subsystem::StoredPlaylist => "stored_playlist",
            Subsystem::Playlist => "playlist",
            Subsystem::Player => "player",
            Subsystem::Mixer => "mixer",
            Subsystem::Output => "output",
            Subsystem::Options => "options",
            Subsystem::Partition => "partition",
            Subsystem::Sticker => "sticker",
            Subsystem::Subscription => "subscription",
            Subsystem::Message => "message",
            Subsystem::Neighbor => "neighbor",
            Subsystem::Mount => "mount",
            Subsystem::Other(name) => name,
        }
    }
}
