//! Incremental framing of the server's output.
//!
//! A frame is any number of body lines followed by a status line starting with
//! `OK`, `ACK` or `list_OK`. The scanner remembers how far it has already looked
//! so a large response arriving in many small chunks is scanned only once.

const GREETING_PREFIX: &str = " MPD ";

/// Sentinel token that terminated a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    ListOk,
    Ack,
}

impl Status {
    pub fn token(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::ListOk => "list_OK",
            Status::Ack => "ACK",
        }
    }

    fn match_line(line: &[u8]) -> Option<Self> {
        [Status::Ok, Status::Ack, Status::ListOk]
            .into_iter()
            .find(|status| line.starts_with(status.token().as_bytes()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub status: Status,
    /// Text following the status token on the status line.
    pub remainder: String,
    /// Everything before the status line, including the trailing newline.
    pub body: String,
}

impl Frame {
    pub fn status_line(&self) -> String {
        format!("{}{}", self.status.token(), self.remainder)
    }

    /// Server version if this is the `OK MPD <version>` connection greeting.
    pub fn greeting_version(&self) -> Option<&str> {
        if self.status != Status::Ok {
            return None;
        }
        self.remainder
            .strip_prefix(GREETING_PREFIX)
            .map(str::trim)
    }
}

#[derive(Debug, Default)]
pub struct FrameScanner {
    buf: Vec<u8>,
    /// Start of the bytes not yet handed out in a frame.
    start: usize,
    /// Start of the first line not yet checked for a status token.
    scanned: usize,
}

impl FrameScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends received bytes. Bytes of frames already returned are dropped
    /// here, once per delivery.
    pub fn push(&mut self, data: &[u8]) {
        if self.start > 0 {
            self.buf.drain(..self.start);
            self.scanned -= self.start;
            self.start = 0;
        }
        self.buf.extend_from_slice(data);
    }

    /// Extracts the earliest complete frame, if any.
    ///
    /// A status line only ends a frame once its newline has arrived; a partial
    /// tail stays buffered.
    pub fn next_frame(&mut self) -> Option<Frame> {
        while let Some(offset) = self.buf[self.scanned..].iter().position(|&b| b == b'\n') {
            let line_end = self.scanned + offset;
            let line = &self.buf[self.scanned..line_end];

            if let Some(status) = Status::match_line(line) {
                let remainder = &line[status.token().len()..];
                let frame = Frame {
                    status,
                    remainder: String::from_utf8_lossy(remainder).into_owned(),
                    body: String::from_utf8_lossy(&self.buf[self.start..self.scanned])
                        .into_owned(),
                };
                self.start = line_end + 1;
                self.scanned = self.start;
                return Some(frame);
            }

            self.scanned = line_end + 1;
        }
        None
    }

    /// Bytes received but not yet consumed by a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len() - self.start
    }
}
