//! Async client for the Music Player Daemon.
//!
//! [`Client::connect`] opens a TCP connection and spawns one task that owns the
//! protocol [`Engine`](mpdlink_protocol::Engine). [`Client`] handles are cheap
//! to clone and talk to that task over a channel; notifications arrive on the
//! paired [`Events`] receiver.
//!
//! ```rust,no_run
//! use mpdlink_client::Client;
//! use mpdlink_core::ConnectionConfig;
//! use mpdlink_protocol::decode;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let (client, mut events) = Client::connect(&ConnectionConfig::default()).await?;
//! events.ready().await?;
//!
//! let status = decode::key_values(&client.send("status").await?)?;
//! println!("state: {:?}", status.get("state"));
//! # Ok(())
//! # }
//! ```

mod client;
mod error;

pub use client::{Client, Events};
pub use error::ClientError;
