//! magscope crate root: re-exports and module wiring.
//!
//! magscope ingests three-axis magnetometer telemetry from several independent sources at
//! once and shows each one as a pane with four synchronized charts and a history table.
//!
//! The implementation is split into cohesive modules:
//! - `data`: samples, the record parser, the windowed sample store and export
//! - `adapters`: socket, file, serial device and MQTT broker ingestion
//! - `source` / `workspace`: per-source state machine and the set of panes
//! - `render`: chart and time-axis geometry
//! - `events`: lifecycle notifications for layout persistence
//! - `persistence`: theme, pane layout and recent values on disk
//! - `config`: command line and environment resolution
//! - `app`: the egui/eframe window

pub mod adapters;
pub mod app;
pub mod color_scheme;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod persistence;
pub mod render;
pub mod source;
pub mod workspace;

// Public re-exports for a compact external API
pub use adapters::{AdapterEvent, AdapterMessage, ConnectRequest, TransportMode};
pub use app::{run_magscope, MagApp};
pub use config::{AppConfig, Cli};
pub use data::sample::{parse, Channel, Sample, SampleParser};
pub use data::store::{SampleStore, StoreLimits};
pub use error::{AdapterError, ConfigError, MalformedRecord, PersistError, StartupError};
pub use events::{EventController, EventFilter, EventKind, PaneEvent};
pub use source::{ConnectionState, Source, SourceId};
pub use workspace::{NewSource, Workspace};
