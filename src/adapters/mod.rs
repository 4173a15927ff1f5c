//! Transport adapters and the message channel that carries their output to the UI thread.
//!
//! Every adapter runs as a task on the shared tokio runtime and reports through an
//! [`EventSink`]. The sink tags each [`AdapterEvent`] with the owning source id and the
//! generation the adapter was started for, so the receiving side can drop anything a
//! cancelled adapter still manages to send.

pub mod broker;
pub mod device;
pub mod file;
pub mod socket;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::data::sample::{Sample, SampleParser};
use crate::error::AdapterError;
use crate::source::SourceId;

use self::broker::{BrokerClientResolver, BrokerOptions, BrokerParams};

/// Which adapter a source is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportMode {
    #[default]
    Unset,
    Socket,
    File,
    Device,
    Broker,
}

impl TransportMode {
    pub const SELECTABLE: [TransportMode; 4] = [
        TransportMode::Socket,
        TransportMode::File,
        TransportMode::Device,
        TransportMode::Broker,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TransportMode::Unset => "Select source",
            TransportMode::Socket => "WebSocket",
            TransportMode::File => "Local file",
            TransportMode::Device => "Local device",
            TransportMode::Broker => "MQTT broker",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle and data notifications produced by an adapter.
#[derive(Debug)]
pub enum AdapterEvent {
    /// The transport is open and records may follow.
    Opened,
    /// Parsed samples, in delivery order.
    Samples(Vec<Sample>),
    /// Lines consumed so far (file ingestion).
    Progress { lines: u64 },
    /// The adapter suggests a new label for its source.
    Label(String),
    /// Clean, terminal end of input.
    Closed,
    /// Terminal failure.
    Failed(AdapterError),
}

/// One [`AdapterEvent`] addressed to a source generation.
#[derive(Debug)]
pub struct AdapterMessage {
    pub source: SourceId,
    pub generation: u64,
    pub event: AdapterEvent,
}

/// Callback used to wake the UI after a delivery.
pub type RepaintNotifier = Arc<dyn Fn() + Send + Sync>;

/// Sending half handed to a running adapter.
#[derive(Clone)]
pub struct EventSink {
    tx: Sender<AdapterMessage>,
    source: SourceId,
    generation: u64,
    cancelled: Arc<AtomicBool>,
    repaint: Option<RepaintNotifier>,
}

impl EventSink {
    pub fn new(tx: Sender<AdapterMessage>, source: SourceId, generation: u64) -> Self {
        Self {
            tx,
            source,
            generation,
            cancelled: Arc::new(AtomicBool::new(false)),
            repaint: None,
        }
    }

    pub fn with_repaint(mut self, repaint: Option<RepaintNotifier>) -> Self {
        self.repaint = repaint;
        self
    }

    pub fn source(&self) -> &SourceId {
        &self.source
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Deliver one event. Returns `false` once the adapter should stop: either it was
    /// cancelled or nobody is listening anymore.
    pub fn send(&self, event: AdapterEvent) -> bool {
        if self.is_cancelled() {
            return false;
        }
        let ok = self
            .tx
            .send(AdapterMessage {
                source: self.source.clone(),
                generation: self.generation,
                event,
            })
            .is_ok();
        if let Some(repaint) = &self.repaint {
            repaint();
        }
        ok
    }

    pub(crate) fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Parse one framed line, logging and skipping malformed records.
    pub(crate) fn decode_line(&self, parser: &SampleParser, line: &str) -> Option<Sample> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            return None;
        }
        match parser.parse(line) {
            Ok(sample) => Some(sample),
            Err(err) => {
                tracing::warn!(source = %self.source, %err, "skipping malformed record");
                None
            }
        }
    }
}

/// What to connect a source to.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectRequest {
    Socket { url: String },
    File { path: std::path::PathBuf, skip_lines: usize },
    Device { path: String, baud_rate: u32 },
    Broker(BrokerParams),
}

impl ConnectRequest {
    pub fn mode(&self) -> TransportMode {
        match self {
            ConnectRequest::Socket { .. } => TransportMode::Socket,
            ConnectRequest::File { .. } => TransportMode::File,
            ConnectRequest::Device { .. } => TransportMode::Device,
            ConnectRequest::Broker(_) => TransportMode::Broker,
        }
    }
}

/// Owning handle of a running adapter. Dropping it cancels the adapter.
pub struct AdapterHandle {
    task: Option<JoinHandle<()>>,
    cancelled: Arc<AtomicBool>,
}

impl AdapterHandle {
    /// Stop the adapter. Nothing sent after this call is delivered.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }
}

impl Drop for AdapterHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for AdapterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Settings shared by every adapter started from one spawner.
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub parser: SampleParser,
    pub file_batch_size: usize,
    pub broker: BrokerOptions,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            parser: SampleParser::default(),
            file_batch_size: file::DEFAULT_BATCH_SIZE,
            broker: BrokerOptions::default(),
        }
    }
}

/// Starts adapters on a runtime and wires them to the UI channel.
#[derive(Clone)]
pub struct AdapterSpawner {
    runtime: Handle,
    tx: Sender<AdapterMessage>,
    repaint: Option<RepaintNotifier>,
    resolver: Arc<BrokerClientResolver>,
    settings: AdapterSettings,
}

impl AdapterSpawner {
    pub fn new(
        runtime: Handle,
        tx: Sender<AdapterMessage>,
        resolver: BrokerClientResolver,
        settings: AdapterSettings,
    ) -> Self {
        Self {
            runtime,
            tx,
            repaint: None,
            resolver: Arc::new(resolver),
            settings,
        }
    }

    pub fn set_repaint(&mut self, repaint: RepaintNotifier) {
        self.repaint = Some(repaint);
    }

    pub fn spawn(&self, source: SourceId, generation: u64, request: ConnectRequest) -> AdapterHandle {
        let sink = EventSink::new(self.tx.clone(), source, generation)
            .with_repaint(self.repaint.clone());
        let cancelled = sink.cancel_flag();
        let parser = self.settings.parser.clone();
        tracing::info!(source = %sink.source(), generation, mode = ?request.mode(), "starting adapter");

        let task = match request {
            ConnectRequest::Socket { url } => self.runtime.spawn(socket::run(url, parser, sink)),
            ConnectRequest::File { path, skip_lines } => {
                let opts = file::FileOptions {
                    skip_lines,
                    batch_size: self.settings.file_batch_size,
                    ..file::FileOptions::default()
                };
                self.runtime.spawn(file::run(path, opts, parser, sink))
            }
            ConnectRequest::Device { path, baud_rate } => {
                self.runtime.spawn(device::run(path, baud_rate, parser, sink))
            }
            ConnectRequest::Broker(params) => self.runtime.spawn(broker::run(
                params,
                self.settings.broker.clone(),
                self.resolver.clone(),
                parser,
                sink,
            )),
        };
        AdapterHandle {
            task: Some(task),
            cancelled,
        }
    }
}
