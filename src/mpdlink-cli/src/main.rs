use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use mpdlink_client::{Client, Events};
use mpdlink_core::{init_logging, AppDirs, Config};
use mpdlink_protocol::{decode, Command, ErrorEvent, Event, ParseError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(name = "mpdlink", version, about = "Music Player Daemon protocol client")]
struct Cli {
    /// Server host (takes precedence over config)
    #[arg(long, global = true)]
    host: Option<String>,
    /// Server port (takes precedence over config)
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Read config.toml from this directory and write logs below it
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Send one command; every word after the name is sent as a quoted argument
    Send(SendCommand),
    /// Send full command lines as one command list
    Batch(BatchCommand),
    /// Print subsystem names as the server reports changes
    Watch {
        /// Exit after this many changes
        #[arg(long)]
        count: Option<usize>,
    },
    /// Print the version announced by the server
    Version,
}

#[derive(Debug, Parser, Clone)]
struct SendCommand {
    /// Command name followed by its arguments
    #[arg(required = true, num_args = 1..)]
    words: Vec<String>,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Debug, Parser, Clone)]
struct BatchCommand {
    /// Command lines, sent verbatim
    #[arg(required = true, num_args = 1..)]
    commands: Vec<String>,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Debug, clap::Args, Clone)]
struct OutputArgs {
    /// How to print the reply body
    #[arg(long, value_enum, default_value_t = DecodeMode::Raw)]
    decode: DecodeMode,
    /// Key that starts a new record (with --decode records)
    #[arg(long)]
    start_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DecodeMode {
    /// Body exactly as received
    Raw,
    /// One JSON object; later keys replace earlier ones
    Flat,
    /// JSON array, a repeated key starts a new object
    Records,
    /// JSON array of songs, each starting at a `file` key
    Songs,
}

#[derive(Debug, Error)]
enum RequestError {
    #[error("command name must not be empty")]
    EmptyCommand,
}

#[derive(Debug, Error)]
enum RenderError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("failed to encode reply as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl SendCommand {
    fn command(&self) -> Result<Command, RequestError> {
        let (name, args) = self
            .words
            .split_first()
            .ok_or(RequestError::EmptyCommand)?;
        if name.trim().is_empty() {
            return Err(RequestError::EmptyCommand);
        }
        Ok(Command::new(name.trim()).args(args))
    }
}

impl OutputArgs {
    fn render(&self, body: &str) -> Result<String, RenderError> {
        let rendered = match self.decode {
            DecodeMode::Raw => return Ok(body.trim_end_matches('\n').to_string()),
            DecodeMode::Flat => serde_json::to_string_pretty(&decode::key_values(body)?)?,
            DecodeMode::Records => {
                let records = match &self.start_key {
                    Some(key) => decode::records_by_key(body, key)?,
                    None => decode::records(body)?,
                };
                serde_json::to_string_pretty(&records)?
            }
            DecodeMode::Songs => serde_json::to_string_pretty(&decode::songs(body)?)?,
        };
        Ok(rendered)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let dirs = match &cli.config_dir {
        Some(root) => AppDirs::with_root(root),
        None => AppDirs::discover()?,
    };
    let config = Config::load_or_default(&dirs)?;
    let _logging = init_logging(&config.logging, &dirs)?;

    let connection = config
        .connection
        .clone()
        .with_overrides(cli.host.as_deref(), cli.port);
    let (client, mut events) = Client::connect(&connection).await?;
    let version = events.ready().await?;
    tracing::info!(
        "Connected to {} (server {}, config dir: {})",
        connection.address(),
        version,
        dirs.config_dir().display()
    );

    match cli.command {
        Cmd::Send(send) => {
            let command = send.command()?;
            let body = client.send(&command).await?;
            print_body(&send.output.render(&body)?);
        }
        Cmd::Batch(batch) => {
            let body = client.send_batch(&batch.commands).await?;
            print_body(&batch.output.render(&body)?);
        }
        Cmd::Watch { count } => watch(&mut events, count).await?,
        Cmd::Version => println!("{version}"),
    }

    Ok(())
}

fn print_body(text: &str) {
    if !text.is_empty() {
        println!("{text}");
    }
}

async fn watch(events: &mut Events, limit: Option<usize>) -> Result<()> {
    let mut seen = 0;
    while limit.map_or(true, |limit| seen < limit) {
        let Some(event) = events.recv().await else {
            break;
        };
        match event {
            Event::SubsystemChanged { name } => {
                println!("{name}");
                seen += 1;
            }
            Event::Error(ErrorEvent::IdleFault(fault)) => {
                anyhow::bail!("server stopped reporting changes: {fault}");
            }
            Event::Error(err) => tracing::warn!("{}", err),
            Event::Closed => {
                tracing::info!("Connection closed by server");
                break;
            }
            _ => {}
        }
    }
    Ok(())
}
