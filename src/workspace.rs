//! The application context: every source pane, which one is active, and the channel
//! their adapters report on.
//!
//! All mutation happens on the thread that owns the workspace (the UI thread). Adapters
//! only ever talk to it through [`AdapterMessage`]s, which are applied in arrival order
//! by [`Workspace::drain`].

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use tokio::runtime::Handle;

use crate::adapters::broker::BrokerClientResolver;
use crate::adapters::{AdapterMessage, AdapterSpawner, ConnectRequest, RepaintNotifier};
use crate::config::AppConfig;
use crate::data::store::StoreLimits;
use crate::events::{EventController, EventKind, PaneEvent};
use crate::persistence::PaneLayoutSerde;
use crate::source::{DisplayPreferences, Source, SourceId, NEW_SOURCE_LABEL};

/// Parameters of a pane to create.
#[derive(Debug, Clone)]
pub struct NewSource {
    /// Reuse a known id (restore); a fresh one is generated otherwise.
    pub id: Option<SourceId>,
    pub label: String,
    pub display: DisplayPreferences,
    pub activate: bool,
}

impl Default for NewSource {
    fn default() -> Self {
        Self {
            id: None,
            label: NEW_SOURCE_LABEL.to_string(),
            display: DisplayPreferences::default(),
            activate: true,
        }
    }
}

pub struct Workspace {
    sources: Vec<Source>,
    active: Option<SourceId>,
    events: EventController,
    spawner: AdapterSpawner,
    rx: Receiver<AdapterMessage>,
    limits: StoreLimits,
}

impl Workspace {
    /// Empty workspace; call [`restore`](Self::restore) or [`add_source`](Self::add_source)
    /// before use.
    pub fn new(
        config: &AppConfig,
        runtime: Handle,
        resolver: BrokerClientResolver,
        events: EventController,
    ) -> Self {
        let (tx, rx) = std::sync::mpsc::channel();
        let spawner = AdapterSpawner::new(runtime, tx, resolver, config.adapters.clone());
        Self {
            sources: Vec::new(),
            active: None,
            events,
            spawner,
            rx,
            limits: config.store,
        }
    }

    pub fn set_repaint(&mut self, repaint: RepaintNotifier) {
        self.spawner.set_repaint(repaint);
    }

    pub fn events(&self) -> &EventController {
        &self.events
    }

    // ── Lookup ──────────────────────────────────────────────────────────────

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    fn index_of(&self, id: &SourceId) -> Option<usize> {
        self.sources.iter().position(|s| s.id() == id)
    }

    pub fn source(&self, id: &SourceId) -> Option<&Source> {
        self.sources.iter().find(|s| s.id() == id)
    }

    pub fn source_mut(&mut self, id: &SourceId) -> Option<&mut Source> {
        self.sources.iter_mut().find(|s| s.id() == id)
    }

    pub fn active_id(&self) -> Option<&SourceId> {
        self.active.as_ref()
    }

    pub fn active(&self) -> Option<&Source> {
        self.active.as_ref().and_then(|id| self.source(id))
    }

    /// Whether any pane holds samples that would be lost on exit.
    pub fn has_data(&self) -> bool {
        self.sources.iter().any(|s| !s.store().is_empty())
    }

    // ── Pane lifecycle ──────────────────────────────────────────────────────

    pub fn add_source(&mut self, new: NewSource) -> SourceId {
        let id = match new.id {
            Some(id) if self.index_of(&id).is_none() => id,
            _ => SourceId::generate(),
        };
        let mut source = Source::new(id.clone(), new.label, self.limits);
        source.display = new.display;
        tracing::debug!(source = %id, label = source.label(), "pane added");
        self.events
            .emit(PaneEvent::new(EventKind::PANE_ADDED, id.clone()).with_label(source.label()));
        self.sources.push(source);
        if new.activate || self.active.is_none() {
            self.activate(&id);
        }
        id
    }

    /// Add a fresh "New Source" pane.
    pub fn add_idle(&mut self, activate: bool) -> SourceId {
        self.add_source(NewSource {
            activate,
            ..NewSource::default()
        })
    }

    /// Remove a pane, tearing down its adapter. The workspace is never left empty.
    pub fn remove_source(&mut self, id: &SourceId) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        let removed = self.sources.remove(idx);
        drop(removed);
        self.events.emit(PaneEvent::new(EventKind::PANE_REMOVED, id.clone()));

        if self.sources.is_empty() {
            self.active = None;
            self.add_idle(true);
        } else if self.active.as_ref() == Some(id) {
            self.active = None;
            let first = self.sources[0].id().clone();
            self.activate(&first);
        }
        true
    }

    pub fn activate(&mut self, id: &SourceId) -> bool {
        if self.index_of(id).is_none() {
            return false;
        }
        if self.active.as_ref() == Some(id) {
            return true;
        }
        self.active = Some(id.clone());
        self.events
            .emit(PaneEvent::new(EventKind::PANE_ACTIVATED, id.clone()));
        true
    }

    /// Recreate panes from a persisted layout. Falls back to one idle pane.
    pub fn restore(&mut self, panes: Vec<PaneLayoutSerde>) {
        for pane in panes {
            let title = match pane.title.trim() {
                "" => NEW_SOURCE_LABEL.to_string(),
                t => t.to_string(),
            };
            self.add_source(NewSource {
                id: Some(SourceId::from(pane.id)),
                label: title,
                display: DisplayPreferences {
                    left_width: pane.left_width,
                    collapsed: pane.collapsed,
                },
                activate: false,
            });
        }
        if self.sources.is_empty() {
            self.add_idle(true);
        }
    }

    /// Persistable snapshot of every pane, in tab order.
    pub fn layout(&self) -> Vec<PaneLayoutSerde> {
        self.sources
            .iter()
            .map(|s| PaneLayoutSerde {
                id: s.id().to_string(),
                title: s.label().to_string(),
                left_width: s.display.left_width,
                collapsed: s.display.collapsed,
            })
            .collect()
    }

    // ── Display preferences ─────────────────────────────────────────────────

    pub fn set_collapsed(&mut self, id: &SourceId, collapsed: bool) {
        let Some(source) = self.source_mut(id) else {
            return;
        };
        if source.display.collapsed == collapsed {
            return;
        }
        source.display.collapsed = collapsed;
        self.events.emit(
            PaneEvent::new(EventKind::COLLAPSED_CHANGED, id.clone()).with_collapsed(collapsed),
        );
    }

    /// Flip the collapsed flag of the active pane.
    pub fn toggle_active_collapsed(&mut self) {
        if let Some(id) = self.active.clone() {
            let collapsed = self.source(&id).is_some_and(|s| s.display.collapsed);
            self.set_collapsed(&id, !collapsed);
        }
    }

    pub fn set_left_width(&mut self, id: &SourceId, width: f32) {
        let Some(source) = self.source_mut(id) else {
            return;
        };
        if source.display.left_width == Some(width) {
            return;
        }
        source.display.left_width = Some(width);
        self.events
            .emit(PaneEvent::new(EventKind::SPLITTER_CHANGED, id.clone()).with_left_width(width));
    }

    pub fn rename(&mut self, id: &SourceId, label: &str) {
        let label = label.trim();
        if label.is_empty() {
            return;
        }
        if let Some(source) = self.source_mut(id) {
            if source.set_label(label) {
                self.events
                    .emit(PaneEvent::new(EventKind::RENAMED, id.clone()).with_label(label));
            }
        }
    }

    /// Record an export for listeners.
    pub fn note_export(&self, id: &SourceId, path: &str) {
        self.events
            .emit(PaneEvent::new(EventKind::EXPORT, id.clone()).with_path(path));
    }

    // ── Adapters ────────────────────────────────────────────────────────────

    /// Tear down whatever the source runs and start `request`.
    ///
    /// Returns the generation the new adapter reports with, `None` for an unknown source.
    pub fn connect(&mut self, id: &SourceId, request: ConnectRequest) -> Option<u64> {
        let idx = self.index_of(id)?;
        let source = &mut self.sources[idx];
        let generation = source.begin(request.mode());
        let handle = self.spawner.spawn(id.clone(), generation, request);
        source.attach(handle);
        let state = source.state().clone();
        self.events
            .emit(PaneEvent::new(EventKind::STATE_CHANGED, id.clone()).with_state(state));
        Some(generation)
    }

    /// Put a source into `error` for a request that never reached an adapter.
    pub fn fail(&mut self, id: &SourceId, reason: impl Into<String>) {
        let Some(source) = self.source_mut(id) else {
            return;
        };
        source.teardown();
        if source.fail(reason) {
            let state = source.state().clone();
            self.events
                .emit(PaneEvent::new(EventKind::STATE_CHANGED, id.clone()).with_state(state));
        }
    }

    /// Cancel the source's adapter without starting another.
    pub fn disconnect(&mut self, id: &SourceId) {
        let Some(source) = self.source_mut(id) else {
            return;
        };
        if source.stop() {
            let state = source.state().clone();
            self.events
                .emit(PaneEvent::new(EventKind::STATE_CHANGED, id.clone()).with_state(state));
        }
    }

    /// Apply one adapter message. Messages for removed sources or superseded
    /// generations are dropped; returns whether the message was applied.
    pub fn handle(&mut self, msg: AdapterMessage) -> bool {
        let Some(idx) = self.index_of(&msg.source) else {
            tracing::trace!(source = %msg.source, "dropping message for removed source");
            return false;
        };
        let source = &mut self.sources[idx];
        if msg.generation != source.generation() {
            tracing::trace!(
                source = %msg.source,
                generation = msg.generation,
                current = source.generation(),
                "dropping stale adapter message"
            );
            return false;
        }
        let applied = source.apply(msg.event);
        let id = msg.source;
        if applied.state_changed {
            let state = source.state().clone();
            self.events
                .emit(PaneEvent::new(EventKind::STATE_CHANGED, id.clone()).with_state(state));
        }
        if applied.renamed {
            let label = source.label().to_string();
            self.events
                .emit(PaneEvent::new(EventKind::RENAMED, id.clone()).with_label(label));
        }
        if applied.first_sample {
            tracing::info!(source = %id, "first sample received");
            self.events
                .emit(PaneEvent::new(EventKind::FIRST_SAMPLE, id.clone()));
            self.add_idle(false);
        }
        true
    }

    /// Apply everything currently queued. Returns the number of messages applied.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(msg) = self.rx.try_recv() {
            if self.handle(msg) {
                applied += 1;
            }
        }
        applied
    }

    /// Block up to `timeout` for the next message, then drain the rest.
    ///
    /// Returns `None` once every adapter sender is gone.
    pub fn wait(&mut self, timeout: Duration) -> Option<usize> {
        match self.rx.recv_timeout(timeout) {
            Ok(msg) => {
                let first = usize::from(self.handle(msg));
                Some(first + self.drain())
            }
            Err(RecvTimeoutError::Timeout) => Some(0),
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("sources", &self.sources)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}
