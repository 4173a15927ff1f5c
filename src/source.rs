//! One ingestion session: transport binding, sample store and connection state.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::adapters::{AdapterEvent, AdapterHandle, TransportMode};
use crate::data::export;
use crate::data::store::{SampleStore, StoreLimits};

/// Label of a pane nobody has used yet.
pub const NEW_SOURCE_LABEL: &str = "New Source";

/// Stable, never reused identifier of a [`Source`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    /// Fresh id, unique within this process and very unlikely to collide with restored ones.
    pub fn generate() -> Self {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!(
            "src-{:x}-{n:x}",
            chrono::Utc::now().timestamp_millis()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Connection lifecycle of a source.
///
/// `Error` and `Closed` are terminal for one adapter instance only; connecting again
/// starts over at `Connecting`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Streaming,
    Error(String),
    Closed,
}

impl ConnectionState {
    pub fn label(&self) -> &str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Streaming => "streaming",
            ConnectionState::Error(_) => "error",
            ConnectionState::Closed => "closed",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Streaming)
    }
}

/// View state owned by the source and persisted by the layout store.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DisplayPreferences {
    /// Width of the config side panel in points; `None` uses the default.
    pub left_width: Option<f32>,
    pub collapsed: bool,
}

/// What applying an adapter event changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Applied {
    pub inserted: usize,
    /// This event carried the first sample this source ever stored.
    pub first_sample: bool,
    pub state_changed: bool,
    pub renamed: bool,
}

pub struct Source {
    id: SourceId,
    label: String,
    mode: TransportMode,
    store: SampleStore,
    state: ConnectionState,
    pub display: DisplayPreferences,
    generation: u64,
    adapter: Option<AdapterHandle>,
    used: bool,
    /// Lines consumed by a running file load.
    progress: Option<u64>,
}

impl Source {
    pub fn new(id: SourceId, label: impl Into<String>, limits: StoreLimits) -> Self {
        Self {
            id,
            label: label.into(),
            mode: TransportMode::Unset,
            store: SampleStore::with_limits(limits),
            state: ConnectionState::Idle,
            display: DisplayPreferences::default(),
            generation: 0,
            adapter: None,
            used: false,
            progress: None,
        }
    }

    pub fn id(&self) -> &SourceId {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns `true` when the label actually changed.
    pub fn set_label(&mut self, label: impl Into<String>) -> bool {
        let label = label.into();
        if label == self.label {
            return false;
        }
        self.label = label;
        true
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    /// Pick a transport without starting it (form selection).
    pub fn select_mode(&mut self, mode: TransportMode) {
        self.mode = mode;
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn store(&self) -> &SampleStore {
        &self.store
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn progress(&self) -> Option<u64> {
        self.progress
    }

    /// Untouched panes carry no close control.
    pub fn closable(&self) -> bool {
        self.label != NEW_SOURCE_LABEL
    }

    /// Tear down the current adapter and enter `Connecting` for `mode`.
    ///
    /// Returns the generation the new adapter must report with.
    pub fn begin(&mut self, mode: TransportMode) -> u64 {
        self.teardown();
        self.mode = mode;
        self.generation += 1;
        self.state = ConnectionState::Connecting;
        self.progress = (mode == TransportMode::File).then_some(0);
        self.generation
    }

    pub fn attach(&mut self, handle: AdapterHandle) {
        self.adapter = Some(handle);
    }

    /// Cancel the running adapter, if any. Later messages from it are stale.
    pub fn teardown(&mut self) {
        if let Some(mut adapter) = self.adapter.take() {
            adapter.cancel();
            self.generation += 1;
            tracing::debug!(source = %self.id, "adapter cancelled");
        }
    }

    /// User stop: cancel the adapter and leave a live state for `Closed`.
    pub fn stop(&mut self) -> bool {
        self.teardown();
        self.progress = None;
        if self.state.is_active() {
            self.set_state(ConnectionState::Closed)
        } else {
            false
        }
    }

    /// Mark a start that failed before any adapter ran.
    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        self.progress = None;
        self.set_state(ConnectionState::Error(reason.into()))
    }

    fn set_state(&mut self, state: ConnectionState) -> bool {
        if self.state == state {
            return false;
        }
        tracing::info!(source = %self.id, from = self.state.label(), to = state.label(), "state change");
        self.state = state;
        true
    }

    /// Apply one event from the current adapter generation.
    pub fn apply(&mut self, event: AdapterEvent) -> Applied {
        let mut applied = Applied::default();
        match event {
            AdapterEvent::Opened => {
                applied.state_changed = self.set_state(ConnectionState::Streaming);
            }
            AdapterEvent::Samples(samples) => {
                if samples.is_empty() {
                    return applied;
                }
                applied.inserted = samples.len();
                let mut samples = samples;
                if samples.len() == 1 {
                    if let Some(only) = samples.pop() {
                        self.store.insert(only);
                    }
                } else {
                    self.store.insert_batch(samples);
                }
                if self.state == ConnectionState::Connecting {
                    applied.state_changed = self.set_state(ConnectionState::Streaming);
                }
                if !self.used {
                    self.used = true;
                    applied.first_sample = true;
                }
            }
            AdapterEvent::Progress { lines } => {
                self.progress = Some(lines);
            }
            AdapterEvent::Label(label) => {
                applied.renamed = self.set_label(label);
            }
            AdapterEvent::Closed => {
                self.progress = None;
                self.adapter = None;
                applied.state_changed = self.set_state(ConnectionState::Closed);
            }
            AdapterEvent::Failed(err) => {
                tracing::warn!(source = %self.id, kind = err.kind(), %err, "adapter failed");
                self.progress = None;
                self.adapter = None;
                if err.changes_state() {
                    applied.state_changed =
                        self.set_state(ConnectionState::Error(err.to_string()));
                }
            }
        }
        applied
    }

    /// Full retained history as JSON lines, most recent first.
    pub fn export_history(&self) -> Vec<u8> {
        export::to_jsonl_bytes(&self.store)
    }

    pub fn export_file_name(&self) -> String {
        export::export_file_name(&self.label, self.id.as_str())
    }
}

impl Drop for Source {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("samples", &self.store.len())
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::parse;
    use crate::error::AdapterError;

    fn sample(sec: u32) -> crate::data::sample::Sample {
        parse(&format!(r#"{{"ts":"2024-01-01T00:00:{sec:02}Z","x":1,"y":2,"z":3}}"#)).unwrap()
    }

    fn source() -> Source {
        Source::new(SourceId::from("a"), NEW_SOURCE_LABEL, StoreLimits::default())
    }

    #[test]
    fn ids_are_unique() {
        let a = SourceId::generate();
        let b = SourceId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("src-"));
    }

    #[test]
    fn lifecycle_transitions() {
        let mut s = source();
        assert_eq!(s.state(), &ConnectionState::Idle);
        let g = s.begin(TransportMode::Socket);
        assert_eq!(g, 1);
        assert_eq!(s.state(), &ConnectionState::Connecting);

        assert!(s.apply(AdapterEvent::Opened).state_changed);
        assert_eq!(s.state(), &ConnectionState::Streaming);

        let applied = s.apply(AdapterEvent::Samples(vec![sample(1)]));
        assert!(applied.first_sample);
        assert!(!applied.state_changed);
        assert!(!s.apply(AdapterEvent::Samples(vec![sample(2)])).first_sample);

        let applied = s.apply(AdapterEvent::Failed(AdapterError::StreamClosed("bye".into())));
        assert!(applied.state_changed);
        assert!(matches!(s.state(), ConnectionState::Error(msg) if msg.contains("bye")));
        // retained samples survive the failure
        assert_eq!(s.store().len(), 2);

        // reconnecting re-enters connecting with a new generation
        assert_eq!(s.begin(TransportMode::File), 2);
        assert_eq!(s.state(), &ConnectionState::Connecting);
        assert_eq!(s.progress(), Some(0));
        s.apply(AdapterEvent::Closed);
        assert_eq!(s.state(), &ConnectionState::Closed);
        assert_eq!(s.progress(), None);
    }

    #[test]
    fn stop_leaves_live_states_for_closed() {
        let mut s = source();
        assert!(!s.stop());
        assert_eq!(s.state(), &ConnectionState::Idle);

        s.begin(TransportMode::File);
        assert!(s.stop());
        assert_eq!(s.state(), &ConnectionState::Closed);
        assert_eq!(s.progress(), None);

        s.begin(TransportMode::Socket);
        s.apply(AdapterEvent::Opened);
        assert!(s.stop());
        assert!(!s.state().is_active());

        // a failed source keeps its error
        s.fail("unreachable");
        assert!(!s.stop());
        assert!(matches!(s.state(), ConnectionState::Error(_)));
    }

    #[test]
    fn samples_while_connecting_mean_streaming() {
        let mut s = source();
        s.begin(TransportMode::File);
        assert!(s.apply(AdapterEvent::Samples(vec![sample(0)])).state_changed);
        assert_eq!(s.state(), &ConnectionState::Streaming);
    }

    #[test]
    fn renaming_controls_closability() {
        let mut s = source();
        assert!(!s.closable());
        assert!(s.apply(AdapterEvent::Label("log.jsonl".into())).renamed);
        assert!(s.closable());
        assert!(!s.apply(AdapterEvent::Label("log.jsonl".into())).renamed);
        assert_eq!(s.export_file_name(), "log.jsonl.jsonl");
    }
}
