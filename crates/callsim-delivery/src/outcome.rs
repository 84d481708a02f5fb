//! Per-attempt delivery outcome records and their file-backed sink.
//!
//! Every HTTP attempt produces one [`AttemptOutcome`]. Sinks are
//! fire-and-forget: [`OutcomeSink::record`] never blocks and never fails, so
//! logging can not influence delivery control flow.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use bytes::Bytes;
use callsim_core::CallId;
use chrono::{DateTime, Utc};
use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
    sync::{mpsc, oneshot},
};
use tracing::{debug, warn};

/// Default size after which a log file is rotated.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

const ENTRY_SEPARATOR: &str = "----------------------------------------";

/// Result of one POST attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptOutcome {
    /// Call the record belongs to.
    pub call_id: CallId,
    /// Collector endpoint.
    pub url: String,
    /// Request body that was sent.
    pub payload: Bytes,
    /// Response status, absent when no response arrived.
    pub status_code: Option<u16>,
    /// Transport error, absent when a response arrived.
    pub error: Option<String>,
    /// Zero-based attempt index.
    pub attempt: u32,
    /// When the attempt finished.
    pub recorded_at: DateTime<Utc>,
}

impl AttemptOutcome {
    /// Renders the outcome as a multi-line log entry.
    pub fn render(&self) -> String {
        let mut entry = format!(
            "[{}] CallID: {}\nURL: {}\nRequest: {}\nStatusCode: {}\n",
            self.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            self.call_id,
            self.url,
            String::from_utf8_lossy(&self.payload),
            self.status_code.unwrap_or(0),
        );
        if let Some(error) = &self.error {
            entry.push_str(&format!("Error: {error}\n"));
        }
        entry.push_str(ENTRY_SEPARATOR);
        entry.push('\n');
        entry
    }
}

/// Consumer of attempt outcomes.
pub trait OutcomeSink: Send + Sync + fmt::Debug {
    /// Records one outcome. Must return without waiting on I/O.
    fn record(&self, outcome: AttemptOutcome);
}

/// Sink that discards every outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpOutcomeSink;

impl OutcomeSink for NoOpOutcomeSink {
    fn record(&self, _outcome: AttemptOutcome) {}
}

/// Record stream a log file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    /// Call detail records.
    Cdr,
    /// Call status events.
    Status,
}

impl LogStream {
    fn file_prefix(self) -> &'static str {
        match self {
            Self::Cdr => "push_cdr",
            Self::Status => "push_status",
        }
    }
}

impl fmt::Display for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cdr => write!(f, "cdr"),
            Self::Status => write!(f, "status"),
        }
    }
}

enum LogCommand {
    Write(AttemptOutcome),
    Flush(oneshot::Sender<()>),
}

/// Size-rotated text log of attempt outcomes.
///
/// Appends are handled by a single writer task fed through an unbounded
/// channel, so `record` only enqueues. Files are named
/// `push_{stream}_{YYYYMMDDHHMMSS}_{n}.log` where `n` counts rotations.
#[derive(Debug, Clone)]
pub struct FileOutcomeLog {
    commands: mpsc::UnboundedSender<LogCommand>,
    stream: LogStream,
}

impl fmt::Debug for LogCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write(outcome) => f.debug_tuple("Write").field(&outcome.call_id).finish(),
            Self::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl FileOutcomeLog {
    /// Creates `dir` if needed, opens the first log file and starts the
    /// writer task on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the directory or first file can not be
    /// created.
    pub async fn open(
        dir: impl AsRef<Path>,
        stream: LogStream,
        max_file_bytes: u64,
    ) -> std::io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;

        let writer = LogWriter::open(dir, stream, max_file_bytes).await?;
        let (commands, receiver) = mpsc::unbounded_channel();
        tokio::spawn(writer.run(receiver));

        Ok(Self { commands, stream })
    }

    /// Stream this log writes.
    pub fn stream(&self) -> LogStream {
        self.stream
    }

    /// Waits until every outcome recorded so far has been written out.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(LogCommand::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

impl OutcomeSink for FileOutcomeLog {
    fn record(&self, outcome: AttemptOutcome) {
        if self.commands.send(LogCommand::Write(outcome)).is_err() {
            warn!(stream = %self.stream, "outcome log writer stopped; dropping entry");
        }
    }
}

struct LogWriter {
    dir: PathBuf,
    stream: LogStream,
    max_file_bytes: u64,
    rotation: u32,
    file: File,
    written: u64,
}

impl LogWriter {
    async fn open(dir: PathBuf, stream: LogStream, max_file_bytes: u64) -> std::io::Result<Self> {
        let (file, written) = open_log_file(&dir, stream, 0).await?;
        Ok(Self { dir, stream, max_file_bytes, rotation: 0, file, written })
    }

    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<LogCommand>) {
        while let Some(command) = receiver.recv().await {
            match command {
                LogCommand::Write(outcome) => {
                    if let Err(e) = self.append(&outcome).await {
                        warn!(
                            stream = %self.stream,
                            call_id = %outcome.call_id,
                            error = %e,
                            "failed to write outcome log entry"
                        );
                    }
                },
                LogCommand::Flush(ack) => {
                    if let Err(e) = self.file.flush().await {
                        warn!(stream = %self.stream, error = %e, "failed to flush outcome log");
                    }
                    let _ = ack.send(());
                },
            }
        }

        let _ = self.file.flush().await;
        debug!(stream = %self.stream, "outcome log writer stopped");
    }

    async fn append(&mut self, outcome: &AttemptOutcome) -> std::io::Result<()> {
        if self.written > self.max_file_bytes {
            self.rotate().await?;
        }

        let entry = outcome.render();
        self.file.write_all(entry.as_bytes()).await?;
        self.written += entry.len() as u64;
        Ok(())
    }

    async fn rotate(&mut self) -> std::io::Result<()> {
        self.file.flush().await?;
        let rotation = self.rotation + 1;
        let (file, written) = open_log_file(&self.dir, self.stream, rotation).await?;

        self.file = file;
        self.written = written;
        self.rotation = rotation;
        debug!(stream = %self.stream, rotation, "rotated outcome log");
        Ok(())
    }
}

async fn open_log_file(
    dir: &Path,
    stream: LogStream,
    rotation: u32,
) -> std::io::Result<(File, u64)> {
    let file_name = format!(
        "{}_{}_{}.log",
        stream.file_prefix(),
        Utc::now().format("%Y%m%d%H%M%S"),
        rotation
    );
    let file = OpenOptions::new().create(true).append(true).open(dir.join(file_name)).await?;
    let written = file.metadata().await?.len();
    Ok((file, written))
}
