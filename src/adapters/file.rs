//! Chunked replay of a local JSON-lines file.
//!
//! The file is read in fixed-size chunks with a yield between chunks. A carry buffer keeps a
//! partial trailing line until the next chunk completes it, and whatever remains at end of
//! input is flushed as a final line, so a missing trailing newline is fine.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncReadExt};

use super::{AdapterEvent, EventSink};
use crate::data::sample::{Sample, SampleParser};
use crate::error::AdapterError;

pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
pub const PROGRESS_EVERY: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileOptions {
    /// Leading non-blank lines to drop before parsing starts.
    pub skip_lines: usize,
    pub batch_size: usize,
    pub chunk_size: usize,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            skip_lines: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Splits a byte stream into lines across arbitrary chunk boundaries.
#[derive(Debug, Default)]
pub struct LineFramer {
    carry: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning every line it completes (without the terminator).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;
        while let Some(pos) = rest.iter().position(|b| *b == b'\n') {
            self.carry.extend_from_slice(&rest[..pos]);
            lines.push(take_line(&mut self.carry));
            rest = &rest[pos + 1..];
        }
        self.carry.extend_from_slice(rest);
        lines
    }

    /// The unterminated tail, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.carry.is_empty() {
            None
        } else {
            Some(take_line(&mut self.carry))
        }
    }
}

fn take_line(buf: &mut Vec<u8>) -> String {
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    let line = String::from_utf8_lossy(buf).into_owned();
    buf.clear();
    line
}

/// Counters reported once ingestion completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileSummary {
    /// Non-blank lines seen after the header skip.
    pub lines: u64,
    pub samples: u64,
    pub skipped_header: usize,
    pub malformed: u64,
}

struct Ingest<'a> {
    opts: FileOptions,
    parser: &'a SampleParser,
    sink: &'a EventSink,
    batch: Vec<Sample>,
    summary: FileSummary,
}

impl Ingest<'_> {
    fn line(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        if self.summary.skipped_header < self.opts.skip_lines {
            self.summary.skipped_header += 1;
            return;
        }
        self.summary.lines += 1;
        match self.sink.decode_line(self.parser, line) {
            Some(sample) => {
                self.batch.push(sample);
                if self.batch.len() >= self.opts.batch_size.max(1) {
                    self.flush();
                }
            }
            None => self.summary.malformed += 1,
        }
        if self.summary.lines % PROGRESS_EVERY == 0 {
            self.sink.send(AdapterEvent::Progress {
                lines: self.summary.lines,
            });
        }
    }

    fn flush(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        self.summary.samples += self.batch.len() as u64;
        let batch = std::mem::take(&mut self.batch);
        self.sink.send(AdapterEvent::Samples(batch));
    }
}

/// Ingest every record of `reader`, sending sample batches and progress to `sink`.
///
/// Lifecycle events (`Opened`, `Closed`) are left to the caller.
pub async fn ingest_reader<R>(
    mut reader: R,
    opts: FileOptions,
    parser: &SampleParser,
    sink: &EventSink,
) -> Result<FileSummary, AdapterError>
where
    R: AsyncRead + Unpin,
{
    let mut framer = LineFramer::new();
    let mut ingest = Ingest {
        opts,
        parser,
        sink,
        batch: Vec::with_capacity(opts.batch_size),
        summary: FileSummary::default(),
    };
    let mut chunk = vec![0u8; opts.chunk_size.max(1)];
    loop {
        if sink.is_cancelled() {
            return Ok(ingest.summary);
        }
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        for line in framer.push(&chunk[..n]) {
            ingest.line(&line);
        }
        tokio::task::yield_now().await;
    }
    if let Some(tail) = framer.finish() {
        ingest.line(&tail);
    }
    ingest.flush();
    Ok(ingest.summary)
}

/// Label used for a source after its file finished loading.
pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "File".to_string())
}

pub async fn run(path: PathBuf, opts: FileOptions, parser: SampleParser, sink: EventSink) {
    let file = match tokio::fs::File::open(&path).await {
        Ok(f) => f,
        Err(err) => {
            tracing::warn!(source = %sink.source(), path = %path.display(), %err, "cannot open file");
            sink.send(AdapterEvent::Failed(AdapterError::ConnectFailed(format!(
                "{}: {err}",
                path.display()
            ))));
            return;
        }
    };
    sink.send(AdapterEvent::Opened);
    match ingest_reader(file, opts, &parser, &sink).await {
        Ok(summary) => {
            tracing::info!(
                source = %sink.source(),
                lines = summary.lines,
                samples = summary.samples,
                malformed = summary.malformed,
                "file loaded"
            );
            sink.send(AdapterEvent::Label(file_label(&path)));
            sink.send(AdapterEvent::Closed);
        }
        Err(err) => {
            tracing::warn!(source = %sink.source(), %err, "file read failed");
            sink.send(AdapterEvent::Failed(err));
        }
    }
}
