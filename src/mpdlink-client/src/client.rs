use crate::error::ClientError;
use mpdlink_core::ConnectionConfig;
use mpdlink_protocol::{batch, Engine, Event, Reply, Responder};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};

const READ_BUFFER_SIZE: usize = 8 * 1024;
/// Events held for a receiver that is not keeping up; newer ones are dropped.
const EVENT_CAPACITY: usize = 256;

enum Request {
    Command {
        text: String,
        reply: oneshot::Sender<Result<String, ClientError>>,
    },
    Detached {
        text: String,
    },
}

/// Handle for sending commands over one connection.
#[derive(Debug, Clone)]
pub struct Client {
    requests: mpsc::UnboundedSender<Request>,
}

impl Client {
    pub async fn connect(config: &ConnectionConfig) -> Result<(Client, Events), ClientError> {
        let address = config.address();
        tracing::info!(%address, "connecting");
        let stream = TcpStream::connect((config.host.as_str(), config.port))
            .await
            .map_err(|source| ClientError::Connect { address, source })?;
        if let Err(err) = stream.set_nodelay(true) {
            tracing::debug!("could not disable Nagle's algorithm: {}", err);
        }
        Ok(Self::from_stream(stream))
    }

    /// Runs the protocol over an already connected stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_stream<S>(stream: S) -> (Client, Events)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        tokio::spawn(run(stream, requests_rx, events_tx));
        (
            Client {
                requests: requests_tx,
            },
            Events { rx: events_rx },
        )
    }

    /// Sends one command and returns the body of its reply.
    ///
    /// Only valid once [`Events::ready`] has returned; earlier calls fail with
    /// [`ClientError::Usage`].
    pub async fn send(&self, command: impl fmt::Display) -> Result<String, ClientError> {
        let text = command.to_string();
        self.request(text).await
    }

    /// Sends `commands` as one command list. A fault carries the index of the
    /// failing sub-command in [`Fault::list_position`](mpdlink_protocol::Fault::list_position).
    pub async fn send_batch<I>(&self, commands: I) -> Result<String, ClientError>
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        let text = batch(commands);
        self.request(text).await
    }

    /// Sends a command without waiting for the reply. A fault is published as
    /// an error event.
    pub fn send_detached(&self, command: impl fmt::Display) -> Result<(), ClientError> {
        self.requests
            .send(Request::Detached {
                text: command.to_string(),
            })
            .map_err(|_| ClientError::ConnectionClosed)
    }

    async fn request(&self, text: String) -> Result<String, ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send(Request::Command {
                text,
                reply: reply_tx,
            })
            .map_err(|_| ClientError::ConnectionClosed)?;
        reply_rx.await.map_err(|_| ClientError::ConnectionClosed)?
    }
}

/// Connection notifications, in the order the server caused them.
///
/// At most a fixed number of unread events is kept; while the buffer is full
/// further events are discarded and commands keep being served.
#[derive(Debug)]
pub struct Events {
    rx: mpsc::Receiver<Event>,
}

impl Events {
    /// Next event; `None` once the connection task has finished.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Waits for the server greeting and returns the announced version.
    pub async fn ready(&mut self) -> Result<String, ClientError> {
        while let Some(event) = self.rx.recv().await {
            match event {
                Event::Ready { version } => return Ok(version),
                Event::Error(err) => return Err(ClientError::Connection(err)),
                Event::Closed => return Err(ClientError::ConnectionClosed),
                _ => {}
            }
        }
        Err(ClientError::ConnectionClosed)
    }
}

async fn run<S>(
    stream: S,
    mut requests: mpsc::UnboundedReceiver<Request>,
    events: mpsc::Sender<Event>,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut engine = Engine::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    if let Err(err) = engine.handle_connected() {
        tracing::error!("{}", err);
        return;
    }
    publish(&mut engine, &events);

    loop {
        tokio::select! {
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    engine.handle_closed();
                    break;
                }
                Ok(n) => {
                    if engine.handle_input(&buf[..n]).is_err() {
                        engine.handle_closed();
                        break;
                    }
                }
                Err(err) => {
                    engine.handle_transport_error(err.to_string());
                    engine.handle_closed();
                    break;
                }
            },
            request = requests.recv() => match request {
                Some(request) => submit(&mut engine, request),
                None => {
                    tracing::debug!("all client handles dropped");
                    engine.handle_closed();
                    break;
                }
            },
        }

        if let Err(err) = flush(&mut engine, &mut writer).await {
            engine.handle_transport_error(err.to_string());
            engine.handle_closed();
            break;
        }
        publish(&mut engine, &events);
    }

    publish(&mut engine, &events);
    if let Err(err) = writer.shutdown().await {
        tracing::debug!("shutdown after close failed: {}", err);
    }
}

fn submit(engine: &mut Engine, request: Request) {
    match request {
        Request::Command { text, reply } => {
            if let Err(err) = engine.ensure_idling() {
                let _ = reply.send(Err(err.into()));
                return;
            }
            let responder: Responder = Box::new(move |result: Reply| {
                let _ = reply.send(result.map_err(ClientError::from));
            });
            if let Err(err) = engine.send_command(&text, responder) {
                tracing::error!(command = %text, "command dropped: {}", err);
            }
        }
        Request::Detached { text } => {
            if let Err(err) = engine.send_detached(&text) {
                tracing::warn!(command = %text, "detached command dropped: {}", err);
            }
        }
    }
}

async fn flush<W>(engine: &mut Engine, writer: &mut W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(payload) = engine.poll_transmit() {
        writer.write_all(&payload).await?;
    }
    writer.flush().await
}

fn publish(engine: &mut Engine, events: &mpsc::Sender<Event>) {
    while let Some(event) = engine.poll_event() {
        match events.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::debug!(?event, "event buffer full, dropping event");
            }
            // Nobody listens for events; the connection keeps serving commands.
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpdlink_protocol::{FaultKind, Subsystem};
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream, ReadHalf, WriteHalf};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    struct FakeServer {
        reader: BufReader<ReadHalf<DuplexStream>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl FakeServer {
        async fn send(&mut self, text: &str) {
            self.writer
                .write_all(text.as_bytes())
                .await
                .expect("server write");
        }

        async fn expect_line(&mut self, expected: &str) {
            let mut line = String::new();
            timeout(WAIT, self.reader.read_line(&mut line))
                .await
                .expect("line before timeout")
                .expect("server read");
            assert_eq!(line.trim_end_matches('\n'), expected);
        }
    }

    fn connect_fake() -> (Client, Events, FakeServer) {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let (client, events) = Client::from_stream(client_io);
        let (reader, writer) = tokio::io::split(server_io);
        let server = FakeServer {
            reader: BufReader::new(reader),
            writer,
        };
        (client, events, server)
    }

    async fn ready_session() -> (Client, Events, FakeServer) {
        let (client, mut events, mut server) = connect_fake();
        server.send("OK MPD 0.23.5\n").await;
        let version = timeout(WAIT, events.ready())
            .await
            .expect("ready before timeout")
            .expect("greeting accepted");
        assert_eq!(version, "0.23.5");
        server.expect_line("idle").await;
        (client, events, server)
    }

    async fn next_event(events: &mut Events) -> Event {
        timeout(WAIT, events.recv())
            .await
            .expect("event before timeout")
            .expect("connection task alive")
    }

    #[tokio::test]
    async fn greeting_starts_idle_loop() {
        let (_client, mut events, mut server) = connect_fake();
        assert_eq!(next_event(&mut events).await, Event::Connected);

        server.send("OK MPD 0.24.0\n").await;
        assert_eq!(
            next_event(&mut events).await,
            Event::Ready {
                version: "0.24.0".into()
            }
        );
        server.expect_line("idle").await;
    }

    #[tokio::test]
    async fn command_reply_reaches_caller() {
        let (client, _events, mut server) = ready_session().await;

        let pending = tokio::spawn(async move { client.send("status").await });
        server.expect_line("noidle").await;
        server.expect_line("status").await;
        server.expect_line("idle").await;
        server.send("OK\n").await;
        server.send("volume: 80\nstate: play\nOK\n").await;

        let body = timeout(WAIT, pending)
            .await
            .expect("reply before timeout")
            .expect("task joined")
            .expect("command succeeded");
        assert_eq!(body, "volume: 80\nstate: play\n");
    }

    #[tokio::test]
    async fn fault_is_returned_to_caller() {
        let (client, _events, mut server) = ready_session().await;

        let pending = tokio::spawn(async move { client.send("play 99").await });
        server.expect_line("noidle").await;
        server.expect_line("play 99").await;
        server.expect_line("idle").await;
        server.send("OK\nACK [2@0] {play} Bad song index\n").await;

        let err = timeout(WAIT, pending)
            .await
            .expect("reply before timeout")
            .expect("task joined")
            .expect_err("server rejected");
        match err {
            ClientError::Fault(fault) => {
                assert_eq!(fault.kind, FaultKind::Arg);
                assert_eq!(fault.command.as_deref(), Some("play"));
                assert_eq!(fault.message, "Bad song index");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn batch_is_sent_as_command_list() {
        let (client, _events, mut server) = ready_session().await;

        let pending =
            tokio::spawn(async move { client.send_batch(["clear", "add \"a.mp3\""]).await });
        server.expect_line("noidle").await;
        server.expect_line("command_list_begin").await;
        server.expect_line("clear").await;
        server.expect_line("add \"a.mp3\"").await;
        server.expect_line("command_list_end").await;
        server.expect_line("idle").await;
        server.send("OK\nOK\n").await;

        let body = timeout(WAIT, pending)
            .await
            .expect("reply before timeout")
            .expect("task joined")
            .expect("batch succeeded");
        assert_eq!(body, "");
    }

    #[tokio::test]
    async fn subsystem_changes_are_published_and_idle_rearmed() {
        let (_client, mut events, mut server) = ready_session().await;

        server.send("changed: player\nchanged: mixer\nOK\n").await;
        assert_eq!(
            next_event(&mut events).await,
            Event::Changed(Subsystem::Player)
        );
        assert_eq!(
            next_event(&mut events).await,
            Event::SubsystemChanged {
                name: "player".into()
            }
        );
        assert_eq!(next_event(&mut events).await, Event::Changed(Subsystem::Mixer));
        assert_eq!(
            next_event(&mut events).await,
            Event::SubsystemChanged {
                name: "mixer".into()
            }
        );
        server.expect_line("idle").await;
    }

    #[tokio::test]
    async fn unread_events_are_capped_without_stalling_commands() {
        let (client, mut events, mut server) = ready_session().await;

        // Each change produces two events; nobody reads them meanwhile.
        for _ in 0..EVENT_CAPACITY {
            server.send("changed: mixer\nOK\n").await;
            server.expect_line("idle").await;
        }

        let pending = tokio::spawn(async move { client.send("status").await });
        server.expect_line("noidle").await;
        server.expect_line("status").await;
        server.expect_line("idle").await;
        server.send("OK\nstate: stop\nOK\n").await;
        let body = timeout(WAIT, pending)
            .await
            .expect("reply before timeout")
            .expect("task joined")
            .expect("command succeeded");
        assert_eq!(body, "state: stop\n");

        let mut buffered = 0;
        while events.rx.try_recv().is_ok() {
            buffered += 1;
        }
        assert_eq!(buffered, EVENT_CAPACITY);
    }

    #[tokio::test]
    async fn detached_fault_becomes_error_event() {
        let (client, mut events, mut server) = ready_session().await;

        client.send_detached("next").expect("queued");
        server.expect_line("noidle").await;
        server.expect_line("next").await;
        server.expect_line("idle").await;
        server.send("OK\nACK [55@0] {next} Not playing\n").await;

        match next_event(&mut events).await {
            Event::Error(mpdlink_protocol::ErrorEvent::Fault(fault)) => {
                assert_eq!(fault.kind, FaultKind::PlayerSync);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn command_before_greeting_is_rejected() {
        let (client, _events, _server) = connect_fake();
        let err = timeout(WAIT, client.send("status"))
            .await
            .expect("reply before timeout")
            .expect_err("not ready yet");
        assert!(matches!(
            err,
            ClientError::Usage(mpdlink_protocol::EngineError::NotIdling)
        ));
    }

    #[tokio::test]
    async fn server_hangup_abandons_pending_commands() {
        let (client, mut events, mut server) = ready_session().await;

        let sender = client.clone();
        let pending = tokio::spawn(async move { sender.send("listall").await });
        server.expect_line("noidle").await;
        server.expect_line("listall").await;
        server.expect_line("idle").await;
        drop(server);

        let err = timeout(WAIT, pending)
            .await
            .expect("reply before timeout")
            .expect("task joined")
            .expect_err("connection dropped");
        assert!(matches!(err, ClientError::ConnectionClosed));
        assert_eq!(next_event(&mut events).await, Event::Closed);

        let err = client.send("status").await.expect_err("task has exited");
        assert!(matches!(err, ClientError::ConnectionClosed));
    }

    #[tokio::test]
    async fn bad_greeting_fails_ready() {
        let (_client, mut events, mut server) = connect_fake();
        server.send("OK\n").await;
        let err = timeout(WAIT, events.ready())
            .await
            .expect("ready before timeout")
            .expect_err("not a greeting");
        assert!(matches!(err, ClientError::Connection(_)));
    }

    #[tokio::test]
    async fn connects_over_tcp() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            socket.write_all(b"OK MPD 0.23.5\n").await.expect("greet");
            let mut reader = BufReader::new(socket);
            let mut line = String::new();
            reader.read_line(&mut line).await.expect("read idle");
            line
        });

        let config = ConnectionConfig {
            host: "127.0.0.1".into(),
            port,
        };
        let (_client, mut events) = Client::connect(&config).await.expect("connect");
        assert_eq!(events.ready().await.expect("ready"), "0.23.5");
        let line = timeout(WAIT, server)
            .await
            .expect("server before timeout")
            .expect("server task");
        assert_eq!(line, "idle\n");
    }

    #[tokio::test]
    async fn refused_connection_names_address() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let config = ConnectionConfig {
            host: "127.0.0.1".into(),
            port,
        };
        let err = Client::connect(&config).await.expect_err("nothing listening");
        assert!(matches!(err, ClientError::Connect { .. }));
        assert!(err.to_string().contains(&format!("127.0.0.1:{port}")));
    }
}
