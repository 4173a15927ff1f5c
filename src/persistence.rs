//! Client-local state: theme, pane layout and recent input values.
//!
//! Everything is kept in a small key/value store behind [`KeyValueStore`] so the UI never
//! touches the file system directly. [`JsonFileStore`] keeps all keys in one JSON document
//! under the platform config directory; [`MemoryStore`] backs tests and `--data-dir`-less
//! sandboxes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::color_scheme::Theme;
use crate::error::PersistError;

pub const THEME_KEY: &str = "magscope.config.v1";
pub const PANES_KEY: &str = "magscope.panes.v1";
pub const STRICT_OFFLINE_KEY: &str = "magscope.strict_offline";
pub const RECENT_CAP: usize = 10;

/// Backing store for persisted state.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value) -> Result<(), PersistError>;
}

/// In-memory store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), PersistError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// All keys in one pretty-printed JSON object on disk.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, Value>,
}

impl JsonFileStore {
    pub const FILE_NAME: &'static str = "state.json";

    /// Open (or start) the store at `path`. A missing file is an empty store; an
    /// unreadable one is logged and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(txt) => serde_json::from_str(&txt).unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), %err, "ignoring corrupt state file");
                BTreeMap::new()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "cannot read state file");
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    /// Store inside `dir`, or the platform config directory when `dir` is `None`.
    pub fn in_dir(dir: Option<&Path>) -> Option<Self> {
        let dir = match dir {
            Some(d) => d.to_path_buf(),
            None => default_data_dir()?,
        };
        Some(Self::open(dir.join(Self::FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let txt = serde_json::to_string_pretty(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, txt)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), PersistError> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }
}

/// Platform config directory for this application.
pub fn default_data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "magscope", "magscope").map(|d| d.config_dir().to_path_buf())
}

// ---------- Serializable mirror types ----------

/// Persisted per-pane layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaneLayoutSerde {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_width: Option<f32>,
    #[serde(default)]
    pub collapsed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeSerde {
    Light,
    Dark,
}

impl From<Theme> for ThemeSerde {
    fn from(t: Theme) -> Self {
        match t {
            Theme::Light => ThemeSerde::Light,
            Theme::Dark => ThemeSerde::Dark,
        }
    }
}

impl From<ThemeSerde> for Theme {
    fn from(t: ThemeSerde) -> Self {
        match t {
            ThemeSerde::Light => Theme::Light,
            ThemeSerde::Dark => Theme::Dark,
        }
    }
}

/// Global display configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSerde {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeSerde>,
}

/// The recent-value lists offered as input suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecentKind {
    SocketUrl,
    FileName,
    DevicePath,
    BrokerHost,
    BrokerTopic,
}

impl RecentKind {
    pub const ALL: [RecentKind; 5] = [
        RecentKind::SocketUrl,
        RecentKind::FileName,
        RecentKind::DevicePath,
        RecentKind::BrokerHost,
        RecentKind::BrokerTopic,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            RecentKind::SocketUrl => "magscope.history.ws.v1",
            RecentKind::FileName => "magscope.history.files.v1",
            RecentKind::DevicePath => "magscope.history.dev.v1",
            RecentKind::BrokerHost => "magscope.history.mqtt.host.v1",
            RecentKind::BrokerTopic => "magscope.history.mqtt.topic.v1",
        }
    }
}

/// Move `value` to the front of `list`, de-duplicated and capped.
pub fn push_recent(list: &mut Vec<String>, value: &str, cap: usize) -> bool {
    let v = value.trim();
    if v.is_empty() {
        return false;
    }
    list.retain(|x| x != v);
    list.insert(0, v.to_string());
    list.truncate(cap);
    true
}

// ---------- Public API ----------

/// Typed access to persisted state.
pub struct StateStore {
    kv: Box<dyn KeyValueStore>,
    recent_cap: usize,
}

impl StateStore {
    pub fn new(kv: Box<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            recent_cap: RECENT_CAP,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    pub fn with_recent_cap(mut self, cap: usize) -> Self {
        self.recent_cap = cap.max(1);
        self
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.kv.get(key)?;
        serde_json::from_value(value)
            .map_err(|err| tracing::warn!(key, %err, "ignoring unreadable persisted value"))
            .ok()
    }

    fn save<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), PersistError> {
        let value = serde_json::to_value(value)?;
        self.kv.set(key, value)
    }

    pub fn load_theme(&self) -> Option<Theme> {
        self.load::<ConfigSerde>(THEME_KEY)
            .and_then(|c| c.theme)
            .map(Theme::from)
    }

    pub fn save_theme(&mut self, theme: Theme) -> Result<(), PersistError> {
        self.save(
            THEME_KEY,
            &ConfigSerde {
                theme: Some(theme.into()),
            },
        )
    }

    /// Stored panes; entries without an id are dropped.
    pub fn load_panes(&self) -> Vec<PaneLayoutSerde> {
        self.load::<Vec<PaneLayoutSerde>>(PANES_KEY)
            .unwrap_or_default()
            .into_iter()
            .filter(|p| !p.id.trim().is_empty())
            .collect()
    }

    pub fn save_panes(&mut self, panes: &[PaneLayoutSerde]) -> Result<(), PersistError> {
        self.save(PANES_KEY, &panes)
    }

    /// Recent values, most recent first. Non-string and blank entries are skipped.
    pub fn recent(&self, kind: RecentKind) -> Vec<String> {
        let Some(Value::Array(items)) = self.kv.get(kind.key()) else {
            return Vec::new();
        };
        items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s),
                _ => None,
            })
            .take(self.recent_cap)
            .collect()
    }

    pub fn push_recent(&mut self, kind: RecentKind, value: &str) -> Result<Vec<String>, PersistError> {
        let mut list = self.recent(kind);
        if push_recent(&mut list, value, self.recent_cap) {
            self.save(kind.key(), &list)?;
        }
        Ok(list)
    }

    /// Persisted strict offline flag, if one was ever set.
    pub fn strict_offline(&self) -> Option<bool> {
        match self.kv.get(STRICT_OFFLINE_KEY)? {
            Value::Bool(b) => Some(b),
            Value::String(s) => Some(crate::config::is_truthy(&s)),
            Value::Number(n) => Some(n.as_i64().unwrap_or(0) != 0),
            _ => None,
        }
    }

    pub fn set_strict_offline(&mut self, on: bool) -> Result<(), PersistError> {
        self.kv.set(STRICT_OFFLINE_KEY, Value::Bool(on))
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("recent_cap", &self.recent_cap)
            .finish_non_exhaustive()
    }
}
