//! Parsing of `ACK [<code>@<list-pos>] {<command>} <message>` fault lines.

use serde::Serialize;
use thiserror::Error;

/// Fault classes reported by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultKind {
    NotList,
    Arg,
    Password,
    Permission,
    Unknown,
    NoExist,
    PlaylistMax,
    System,
    PlaylistLoad,
    UpdateAlready,
    PlayerSync,
    Exist,
    /// Code missing or not in the table.
    #[serde(rename = "ERR")]
    Other,
}

impl FaultKind {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => FaultKind::NotList,
            2 => FaultKind::Arg,
            3 => FaultKind::Password,
            4 => FaultKind::Permission,
            5 => FaultKind::Unknown,
            50 => FaultKind::NoExist,
            51 => FaultKind::PlaylistMax,
            52 => FaultKind::System,
            53 => FaultKind::PlaylistLoad,
            54 => FaultKind::UpdateAlready,
            55 => FaultKind::PlayerSync,
            56 => FaultKind::Exist,
            _ => FaultKind::Other,
        }
    }

    pub fn code(&self) -> Option<u32> {
        let code = match self {
            FaultKind::NotList => 1,
            FaultKind::Arg => 2,
            FaultKind::Password => 3,
            FaultKind::Permission => 4,
            FaultKind::Unknown => 5,
            FaultKind::NoExist => 50,
            FaultKind::PlaylistMax => 51,
            FaultKind::System => 52,
            FaultKind::PlaylistLoad => 53,
            FaultKind::UpdateAlready => 54,
            FaultKind::PlayerSync => 55,
            FaultKind::Exist => 56,
            FaultKind::Other => return None,
        };
        Some(code)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            FaultKind::NotList => "NOT_LIST",
            FaultKind::Arg => "ARG",
            FaultKind::Password => "PASSWORD",
            FaultKind::Permission => "PERMISSION",
            FaultKind::Unknown => "UNKNOWN",
            FaultKind::NoExist => "NO_EXIST",
            FaultKind::PlaylistMax => "PLAYLIST_MAX",
            FaultKind::System => "SYSTEM",
            FaultKind::PlaylistLoad => "PLAYLIST_LOAD",
            FaultKind::UpdateAlready => "UPDATE_ALREADY",
            FaultKind::PlayerSync => "PLAYER_SYNC",
            FaultKind::Exist => "EXIST",
            FaultKind::Other => "ERR",
        }
    }
}

/// A server-reported failure of one command (or one command list).
///
/// Malformed fault lines never fail to parse; the affected fields are left empty
/// and the original text is kept as the error message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{raw}")]
pub struct Fault {
    pub kind: FaultKind,
    pub code: Option<u32>,
    /// Index of the failing sub-command inside a command list.
    pub list_position: Option<u32>,
    pub command: Option<String>,
    pub message: String,
    raw: String,
}

impl Fault {
    /// Parses the text following the `ACK` token.
    pub fn parse(remainder: &str) -> Self {
        let raw = remainder.trim().to_string();

        let bracket = delimited(&raw, '[', ']');
        let (code, list_position) = match bracket {
            Some((inner, _)) => {
                let mut parts = inner.splitn(2, '@');
                let code = parts.next().and_then(leading_int);
                let position = parts.next().and_then(leading_int);
                (code, position)
            }
            None => (None, None),
        };

        let brace = delimited(&raw, '{', '}');
        let command = brace.map(|(inner, _)| inner.to_string());

        let message_start = brace.or(bracket).map(|(_, end)| end).unwrap_or(0);
        let message = raw[message_start..].trim().to_string();

        Self {
            kind: code.map(FaultKind::from_code).unwrap_or(FaultKind::Other),
            code,
            list_position,
            command,
            message,
            raw,
        }
    }

    /// The fault line as the server sent it, without the `ACK` token.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Finds the first `open ... close` pair, returning the inner text and the index
/// just past `close`.
fn delimited(text: &str, open: char, close: char) -> Option<(&str, usize)> {
    let start = text.find(open)? + open.len_utf8();
    let len = text[start..].find(close)?;
    Some((&text[start..start + len], start + len + close.len_utf8()))
}

fn leading_int(text: &str) -> Option<u32> {
    let text = text.trim_start();
    let digits = text
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(idx, c)| idx + c.len_utf8())?;
    text[..digits].parse().ok()
}
