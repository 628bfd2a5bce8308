//! Idle/command sequencer.
//!
//! The server only accepts commands while it is not blocked in `idle`, so every
//! caller command is sent as `noidle`, the command itself, then `idle` again.
//! The reply to the cancelled `idle` is consumed by the idle handler already at
//! the head of the queue; the command reply goes to the caller.
//!
//! Like the rest of this crate the engine performs no I/O: feed it transport
//! events through the `handle_*` methods and drain [`Engine::poll_transmit`] and
//! [`Engine::poll_event`] afterwards.

use crate::command::batch;
use crate::error::EngineError;
use crate::event::{ErrorEvent, Event, Subsystem};
use crate::fault::Fault;
use crate::frame::{Frame, FrameScanner, Status};
use crate::queue::{Handler, HandlerQueue, Reply, Responder};
use std::collections::VecDeque;
use std::fmt;

const IDLE: &str = "idle";
const NOIDLE: &str = "noidle";
const CHANGED_TAG: &str = "changed:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    AwaitingGreeting,
    /// Only the idle request is outstanding.
    Idling,
    /// At least one caller command awaits its reply.
    CommandInFlight,
    /// The idle request failed; no new commands are accepted.
    Halted,
}

#[derive(Debug, Default)]
pub struct Engine {
    state: SessionState,
    /// True while an idle request is outstanding (or queued behind commands).
    idling: bool,
    scanner: FrameScanner,
    queue: HandlerQueue,
    send_buf: VecDeque<Vec<u8>>,
    pending_events: VecDeque<Event>,
    server_version: Option<String>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The transport connected; the server greeting is expected next.
    pub fn handle_connected(&mut self) -> Result<(), EngineError> {
        if self.state != SessionState::Disconnected {
            return Err(EngineError::AlreadyConnected);
        }
        self.state = SessionState::AwaitingGreeting;
        self.pending_events.push_back(Event::Connected);
        Ok(())
    }

    /// Feeds received bytes and dispatches every complete frame, in order.
    ///
    /// An error means the connection is out of sync with the server and should
    /// be closed; an [`ErrorEvent::Protocol`] event has been queued as well.
    pub fn handle_input(&mut self, data: &[u8]) -> Result<(), EngineError> {
        if self.state == SessionState::Disconnected {
            return Err(EngineError::NotConnected);
        }
        self.scanner.push(data);
        while let Some(frame) = self.scanner.next_frame() {
            if let Err(err) = self.dispatch(frame) {
                tracing::error!("{}", err);
                self.pending_events
                    .push_back(Event::Error(ErrorEvent::Protocol(err.to_string())));
                return Err(err);
            }
        }
        Ok(())
    }

    /// The transport closed. Pending handlers are dropped without being called.
    pub fn handle_closed(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }
        let abandoned = self.queue.abandon();
        tracing::info!(abandoned, "connection closed");
        self.scanner = FrameScanner::new();
        self.send_buf.clear();
        self.idling = false;
        self.state = SessionState::Disconnected;
        self.pending_events.push_back(Event::Closed);
    }

    pub fn handle_transport_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("transport error: {}", message);
        self.pending_events
            .push_back(Event::Error(ErrorEvent::Transport(message)));
    }

    /// Sends `command`; `responder` receives its reply.
    pub fn send_command(&mut self, command: &str, responder: Responder) -> Result<(), EngineError> {
        self.submit(command, Handler::Command(responder))
    }

    /// Sends `command` without waiting for its reply. A fault is reported as
    /// an [`ErrorEvent::Fault`] event.
    pub fn send_detached(&mut self, command: &str) -> Result<(), EngineError> {
        self.submit(command, Handler::Detached)
    }

    /// Sends `commands` as one command list answered by a single reply.
    pub fn send_batch<I>(&mut self, commands: I, responder: Responder) -> Result<(), EngineError>
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        self.send_command(&batch(commands), responder)
    }

    pub fn poll_transmit(&mut self) -> Option<Vec<u8>> {
        self.send_buf.pop_front()
    }

    pub fn poll_event(&mut self) -> Option<Event> {
        self.pending_events.pop_front()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_idling(&self) -> bool {
        self.idling
    }

    /// Version announced in the greeting of the current connection.
    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    pub fn pending_commands(&self) -> usize {
        self.queue.pending_commands()
    }

    /// Fails with the error a command sent now would get.
    pub fn ensure_idling(&self) -> Result<(), EngineError> {
        if self.idling {
            return Ok(());
        }
        Err(match self.state {
            SessionState::Disconnected => EngineError::NotConnected,
            _ => EngineError::NotIdling,
        })
    }

    fn submit(&mut self, command: &str, handler: Handler) -> Result<(), EngineError> {
        self.ensure_idling()?;
        tracing::debug!(command, "sending command");
        self.write_line(NOIDLE);
        self.queue.enqueue(handler);
        self.write_line(command);
        self.arm_idle();
        self.state = SessionState::CommandInFlight;
        Ok(())
    }

    fn dispatch(&mut self, frame: Frame) -> Result<(), EngineError> {
        tracing::trace!(status = %frame.status_line(), body_len = frame.body.len(), "frame");

        if self.state == SessionState::AwaitingGreeting {
            let version = frame.greeting_version().map(str::to_string).ok_or_else(|| {
                EngineError::UnexpectedGreeting {
                    status_line: frame.status_line(),
                }
            })?;
            self.begin_idling(version);
            return Ok(());
        }

        let handler = self
            .queue
            .dispatch()
            .ok_or_else(|| EngineError::UnexpectedFrame {
                status_line: frame.status_line(),
            })?;
        let reply: Reply = match frame.status {
            Status::Ack => Err(Fault::parse(&frame.remainder)),
            Status::Ok | Status::ListOk => Ok(frame.body),
        };

        match handler {
            Handler::Idle => self.handle_idle_reply(reply),
            Handler::Command(responder) => responder(reply),
            Handler::Detached => {
                if let Err(fault) = reply {
                    tracing::warn!(kind = fault.kind.symbol(), "command failed: {}", fault);
                    self.pending_events
                        .push_back(Event::Error(ErrorEvent::Fault(fault)));
                }
            }
        }
        self.refresh_state();
        Ok(())
    }

    fn begin_idling(&mut self, version: String) {
        tracing::info!(%version, "server ready");
        self.server_version = Some(version.clone());
        self.arm_idle();
        self.idling = true;
        self.state = SessionState::Idling;
        self.pending_events.push_back(Event::Ready { version });
    }

    fn handle_idle_reply(&mut self, reply: Reply) {
        match reply {
            Ok(body) => {
                for line in body.split('\n').filter(|line| !line.is_empty()) {
                    let name = subsystem_name(line);
                    tracing::debug!(subsystem = name, "subsystem changed");
                    self.pending_events
                        .push_back(Event::Changed(Subsystem::from_name(name)));
                    self.pending_events.push_back(Event::SubsystemChanged {
                        name: name.to_string(),
                    });
                }
                if self.queue.is_empty() && self.state != SessionState::Halted {
                    self.arm_idle();
                }
            }
            Err(fault) => {
                tracing::warn!("idle failed, idle loop stopped: {}", fault);
                self.idling = false;
                self.state = SessionState::Halted;
                self.pending_events
                    .push_back(Event::Error(ErrorEvent::IdleFault(fault)));
            }
        }
    }

    fn arm_idle(&mut self) {
        self.queue.enqueue(Handler::Idle);
        self.write_line(IDLE);
    }

    fn refresh_state(&mut self) {
        if matches!(
            self.state,
            SessionState::Idling | SessionState::CommandInFlight
        ) {
            self.state = if self.queue.pending_commands() > 0 {
                SessionState::CommandInFlight
            } else {
                SessionState::Idling
            };
        }
    }

    fn write_line(&mut self, text: &str) {
        let mut payload = Vec::with_capacity(text.len() + 1);
        payload.extend_from_slice(text.as_bytes());
        payload.push(b'\n');
        self.send_buf.push_back(payload);
    }
}

fn subsystem_name(line: &str) -> &str {
    line.strip_prefix(CHANGED_TAG).unwrap_or(line).trim_start()
}
