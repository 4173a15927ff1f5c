//! Pane lifecycle notifications.
//!
//! The workspace publishes a [`PaneEvent`] whenever something a layout or persistence
//! collaborator may care about happens: panes added or removed, activation, collapse and
//! splitter changes, the first sample of a source, state changes, renames and exports.
//!
//! Each event carries a set of [`EventKind`] flags so one occurrence can match several
//! categories. Subscribers pass an [`EventFilter`]; an event is delivered when
//! `(event.kinds & filter) != 0`.

use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};

use crate::source::{ConnectionState, SourceId};

// ─────────────────────────────────────────────────────────────────────────────
// EventKind – bitflags
// ─────────────────────────────────────────────────────────────────────────────

/// Bitflags describing the categories an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKind(pub u32);

impl EventKind {
    /// A pane (and its source) was created.
    pub const PANE_ADDED: Self = Self(1 << 0);
    /// A pane was removed.
    pub const PANE_REMOVED: Self = Self(1 << 1);
    /// A different pane became the active one.
    pub const PANE_ACTIVATED: Self = Self(1 << 2);
    /// The config side panel of a pane was collapsed or expanded.
    pub const COLLAPSED_CHANGED: Self = Self(1 << 3);
    /// The splitter between config panel and charts was moved.
    pub const SPLITTER_CHANGED: Self = Self(1 << 4);
    /// A source stored its first sample.
    pub const FIRST_SAMPLE: Self = Self(1 << 5);
    /// The connection state of a source changed.
    pub const STATE_CHANGED: Self = Self(1 << 6);
    /// A source got a new label.
    pub const RENAMED: Self = Self(1 << 7);
    /// A source's history was exported.
    pub const EXPORT: Self = Self(1 << 8);

    /// Everything that changes the persisted pane layout.
    pub const LAYOUT: Self = Self(
        Self::PANE_ADDED.0
            | Self::PANE_REMOVED.0
            | Self::COLLAPSED_CHANGED.0
            | Self::SPLITTER_CHANGED.0
            | Self::RENAMED.0,
    );

    /// Wildcard: matches every event kind.
    pub const ALL: Self = Self(u32::MAX);

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Check whether `self` contains all bits in `other`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check whether `self` intersects with `other` (at least one bit in common).
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for EventKind {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for EventKind {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for EventKind {
    type Output = Self;
    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

const NAMES: [(EventKind, &str); 9] = [
    (EventKind::PANE_ADDED, "PANE_ADDED"),
    (EventKind::PANE_REMOVED, "PANE_REMOVED"),
    (EventKind::PANE_ACTIVATED, "PANE_ACTIVATED"),
    (EventKind::COLLAPSED_CHANGED, "COLLAPSED_CHANGED"),
    (EventKind::SPLITTER_CHANGED, "SPLITTER_CHANGED"),
    (EventKind::FIRST_SAMPLE, "FIRST_SAMPLE"),
    (EventKind::STATE_CHANGED, "STATE_CHANGED"),
    (EventKind::RENAMED, "RENAMED"),
    (EventKind::EXPORT, "EXPORT"),
];

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "EMPTY");
        }
        if *self == EventKind::ALL {
            return write!(f, "ALL");
        }
        let mut names: Vec<String> = NAMES
            .iter()
            .filter(|(kind, _)| self.contains(*kind))
            .map(|(_, name)| (*name).to_string())
            .collect();
        let known = NAMES.iter().fold(0, |acc, (k, _)| acc | k.0);
        let extra = self.0 & !known;
        if extra != 0 {
            names.push(format!("0x{extra:x}"));
        }
        write!(f, "{}", names.join("|"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PaneEvent
// ─────────────────────────────────────────────────────────────────────────────

/// One lifecycle notification.
#[derive(Debug, Clone)]
pub struct PaneEvent {
    pub kinds: EventKind,
    /// Seconds since the controller was created; set on emit.
    pub timestamp: f64,
    pub source: SourceId,
    pub label: Option<String>,
    pub collapsed: Option<bool>,
    pub left_width: Option<f32>,
    pub state: Option<ConnectionState>,
    /// Destination of an export, when known.
    pub path: Option<String>,
}

impl PaneEvent {
    pub fn new(kinds: EventKind, source: SourceId) -> Self {
        Self {
            kinds,
            timestamp: 0.0,
            source,
            label: None,
            collapsed: None,
            left_width: None,
            state: None,
            path: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_collapsed(mut self, collapsed: bool) -> Self {
        self.collapsed = Some(collapsed);
        self
    }

    pub fn with_left_width(mut self, width: f32) -> Self {
        self.left_width = Some(width);
        self
    }

    pub fn with_state(mut self, state: ConnectionState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EventFilter
// ─────────────────────────────────────────────────────────────────────────────

/// OR-mask selecting which events a subscriber receives.
#[derive(Debug, Clone, Copy)]
pub struct EventFilter {
    pub mask: EventKind,
}

impl EventFilter {
    pub const fn all() -> Self {
        Self { mask: EventKind::ALL }
    }

    pub const fn only(mask: EventKind) -> Self {
        Self { mask }
    }

    #[inline]
    pub fn matches(&self, event: &PaneEvent) -> bool {
        event.kinds.intersects(self.mask)
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::all()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EventController
// ─────────────────────────────────────────────────────────────────────────────

struct Subscriber {
    filter: EventFilter,
    sender: Sender<PaneEvent>,
}

struct EventCtrlInner {
    subscribers: Vec<Subscriber>,
    start_instant: std::time::Instant,
}

/// Distributes [`PaneEvent`]s to `mpsc` subscribers.
#[derive(Clone)]
pub struct EventController {
    inner: Arc<Mutex<EventCtrlInner>>,
}

impl EventController {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(EventCtrlInner {
                subscribers: Vec::new(),
                start_instant: std::time::Instant::now(),
            })),
        }
    }

    /// Receive every event whose kinds intersect the filter mask.
    pub fn subscribe(&self, filter: EventFilter) -> Receiver<PaneEvent> {
        let (tx, rx) = std::sync::mpsc::channel();
        if let Ok(mut inner) = self.inner.lock() {
            inner.subscribers.push(Subscriber { filter, sender: tx });
        }
        rx
    }

    pub fn subscribe_all(&self) -> Receiver<PaneEvent> {
        self.subscribe(EventFilter::all())
    }

    /// Send to matching subscribers, pruning those whose receiver was dropped.
    pub fn emit(&self, mut event: PaneEvent) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        event.timestamp = inner.start_instant.elapsed().as_secs_f64();
        tracing::trace!(kinds = %event.kinds, source = %event.source, "pane event");
        inner.subscribers.retain(|sub| {
            if sub.filter.matches(&event) {
                sub.sender.send(event.clone()).is_ok()
            } else {
                true
            }
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().map(|i| i.subscribers.len()).unwrap_or(0)
    }
}

impl Default for EventController {
    fn default() -> Self {
        Self::new()
    }
}
