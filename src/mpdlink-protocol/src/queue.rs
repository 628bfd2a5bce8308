//! FIFO of pending reply handlers.
//!
//! The protocol carries no request ids: the server answers strictly in request
//! order, so the n-th frame belongs to the n-th handler enqueued.

use crate::fault::Fault;
use std::collections::VecDeque;
use std::fmt;

/// Outcome of one command: the frame body, or the fault the server reported.
pub type Reply = Result<String, Fault>;

/// Single-use continuation invoked with the reply to one command.
pub type Responder = Box<dyn FnOnce(Reply) + Send>;

pub(crate) enum Handler {
    /// The outstanding `idle` long-poll.
    Idle,
    /// A caller command awaiting its reply.
    Command(Responder),
    /// A caller command nobody waits on; faults become error events.
    Detached,
}

impl Handler {
    fn is_command(&self) -> bool {
        !matches!(self, Handler::Idle)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Idle => f.write_str("Idle"),
            Handler::Command(_) => f.write_str("Command"),
            Handler::Detached => f.write_str("Detached"),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct HandlerQueue {
    entries: VecDeque<Handler>,
}

impl HandlerQueue {
    pub(crate) fn enqueue(&mut self, handler: Handler) {
        self.entries.push_back(handler);
    }

    /// Removes the handler owning the next frame.
    pub(crate) fn dispatch(&mut self) -> Option<Handler> {
        self.entries.pop_front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of caller commands still waiting for a reply.
    pub(crate) fn pending_commands(&self) -> usize {
        self.entries.iter().filter(|h| h.is_command()).count()
    }

    /// Drops every pending handler; their commands will never be answered.
    pub(crate) fn abandon(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> Handler {
        let log = Arc::clone(log);
        Handler::Command(Box::new(move |reply: Reply| {
            let body = reply.unwrap_or_else(|fault| fault.to_string());
            log.lock().unwrap().push(format!("{name}:{body}"));
        }))
    }

    #[test]
    fn dispatches_in_submission_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = HandlerQueue::default();
        queue.enqueue(recording(&log, "first"));
        queue.enqueue(Handler::Idle);
        queue.enqueue(recording(&log, "second"));
        assert_eq!(queue.pending_commands(), 2);

        for body in ["a", "idle", "b"] {
            match queue.dispatch().expect("handler pending") {
                Handler::Command(responder) => responder(Ok(body.to_string())),
                Handler::Idle => assert_eq!(body, "idle"),
                Handler::Detached => unreachable!(),
            }
        }

        assert!(queue.is_empty());
        assert_eq!(*log.lock().unwrap(), vec!["first:a", "second:b"]);
    }

    #[test]
    fn empty_queue_has_nothing_to_dispatch() {
        let mut queue = HandlerQueue::default();
        assert!(queue.dispatch().is_none());
    }

    #[test]
    fn abandon_drops_pending_handlers() {
        let mut queue = HandlerQueue::default();
        queue.enqueue(Handler::Idle);
        queue.enqueue(Handler::Detached);
        assert_eq!(queue.abandon(), 2);
        assert!(queue.is_empty());
    }
}
