//! Message sources feeding the stream loop
//!
//! The detector only needs a subscription: a receiver of opaque byte
//! messages that closes when the upstream ends.

use async_trait::async_trait;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

/// Channel capacity for reader-backed sources
pub const SOURCE_CHANNEL_BUFFER: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    payload: Vec<u8>,
}

impl Message {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.payload
    }
}

#[derive(Debug)]
pub enum SourceError {
    Io(std::io::Error),
    AlreadySubscribed,
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::Io(err)
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Io(e) => write!(f, "IO error: {}", e),
            SourceError::AlreadySubscribed => write!(f, "Source already subscribed"),
        }
    }
}

impl std::error::Error for SourceError {}

#[async_trait]
pub trait MessageSource: Send {
    async fn subscribe(&mut self) -> Result<mpsc::Receiver<Message>, SourceError>;
}

/// Source over an existing channel, for embedding and tests
pub struct ChannelSource {
    rx: Option<mpsc::Receiver<Message>>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<Message>) -> Self {
        Self { rx: Some(rx) }
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn subscribe(&mut self) -> Result<mpsc::Receiver<Message>, SourceError> {
        self.rx.take().ok_or(SourceError::AlreadySubscribed)
    }
}

/// One message per non-blank line of an async reader
pub struct JsonlSource<R> {
    reader: Option<R>,
    buffer: usize,
}

impl<R> JsonlSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
            buffer: SOURCE_CHANNEL_BUFFER,
        }
    }
}

impl JsonlSource<tokio::fs::File> {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let file = tokio::fs::File::open(path.as_ref()).await?;
        log::info!("📖 Reading passages from: {}", path.as_ref().display());
        Ok(Self::new(file))
    }
}

impl JsonlSource<tokio::io::Stdin> {
    pub fn stdin() -> Self {
        log::info!("📖 Reading passages from stdin");
        Self::new(tokio::io::stdin())
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &line[start..end]
}

#[async_trait]
impl<R> MessageSource for JsonlSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn subscribe(&mut self) -> Result<mpsc::Receiver<Message>, SourceError> {
        let reader = self.reader.take().ok_or(SourceError::AlreadySubscribed)?;
        let (tx, rx) = mpsc::channel(self.buffer);

        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => {
                        log::info!("📭 Input exhausted, closing subscription");
                        break;
                    }
                    Ok(_) => {
                        // Bytes are forwarded untouched; bad payloads are the decoder's call
                        let line = trim_line(&buf);
                        if line.is_empty() {
                            continue;
                        }
                        if tx.send(Message::new(line)).await.is_err() {
                            // Consumer stopped
                            break;
                        }
                    }
                    Err(e) => {
                        log::error!("❌ Input read error: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }
}
