//! Client-side engine for the Music Player Daemon control protocol.
//!
//! This crate contains no I/O. It provides:
//! - A frame scanner that splits the server's byte stream into status-terminated frames
//! - A parser for `ACK` fault lines
//! - Decoders turning `key: value` bodies into [`Record`]s
//! - The [`Engine`], which keeps the connection idling and correlates replies
//!   with commands through a FIFO handler queue
//!
//! # Driving the engine
//!
//! ```
//! use mpdlink_protocol::{Engine, Event, Reply};
//! use std::sync::mpsc;
//!
//! let mut engine = Engine::new();
//! engine.handle_connected().unwrap();
//! engine.handle_input(b"OK MPD 0.23.5\n").unwrap();
//!
//! // The engine immediately enters idle.
//! assert_eq!(engine.poll_transmit().as_deref(), Some(&b"idle\n"[..]));
//!
//! let (tx, rx) = mpsc::channel();
//! engine
//!     .send_command("status", Box::new(move |reply: Reply| tx.send(reply).unwrap()))
//!     .unwrap();
//! engine.handle_input(b"OK\nstate: play\nOK\n").unwrap();
//!
//! assert_eq!(rx.recv().unwrap().unwrap(), "state: play\n");
//! assert!(matches!(engine.poll_event(), Some(Event::Connected)));
//! ```

mod command;
pub mod decode;
mod engine;
mod error;
mod event;
mod fault;
mod frame;
mod queue;

pub use command::{batch, quote_arg, Command, COMMAND_LIST_BEGIN, COMMAND_LIST_END};
pub use decode::Record;
pub use engine::{Engine, SessionState};
pub use error::{EngineError, ParseError};
pub use event::{ErrorEvent, Event, Subsystem};
pub use fault::{Fault, FaultKind};
pub use frame::{Frame, FrameScanner, Status};
pub use queue::{Reply, Responder};
