//! Application configuration resolved from the command line and the environment.

use std::path::PathBuf;

use clap::Parser;

use crate::adapters::broker::{BrokerOptions, BrokerParams};
use crate::adapters::{file, AdapterSettings};
use crate::data::sample::{SampleParser, TemperatureAliases};
use crate::data::store::StoreLimits;
use crate::persistence::RECENT_CAP;

pub const ENV_STRICT_OFFLINE: &str = "MAGSCOPE_STRICT_OFFLINE";
pub const ENV_VERBOSE: &str = "MAGSCOPE_VERBOSE";
pub const ENV_DEBUG: &str = "DEBUG";

/// Command line of the `magscope` binary.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "magscope", version)]
#[command(about = "Live viewer for three-axis magnetometer streams", long_about = None)]
pub struct Cli {
    /// Never fall back to a non-bundled broker client
    #[arg(long)]
    pub strict_offline: bool,

    /// Debug logging (RUST_LOG still wins)
    #[arg(short, long)]
    pub verbose: bool,

    /// Where layout and recent values are stored
    #[arg(long, env = "MAGSCOPE_DATA_DIR", value_name = "PATH")]
    pub data_dir: Option<PathBuf>,
}

/// `1`, `true`, `on`, `yes` (any case).
pub fn is_truthy(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

/// Top-level configuration.
///
/// | Field            | Purpose |
/// |------------------|---------|
/// | `store`          | Retention cap and display windows per source |
/// | `adapters`       | Parser aliases, file batching, broker session options |
/// | `broker_defaults`| Values prefilled in the broker form |
/// | `strict_offline` | Set on the command line / environment; see [`strict_offline`](Self::strict_offline) |
#[derive(Clone, Debug)]
pub struct AppConfig {
    // ── Window / chrome ──────────────────────────────────────────────────────
    pub title: String,
    pub window_size: [f32; 2],

    // ── Operating mode ───────────────────────────────────────────────────────
    pub verbose: bool,
    /// Directory for persisted state; `None` uses the platform config dir.
    pub data_dir: Option<PathBuf>,
    cli_strict_offline: Option<bool>,
    env_strict_offline: Option<bool>,

    // ── Data ─────────────────────────────────────────────────────────────────
    pub store: StoreLimits,
    pub adapters: AdapterSettings,
    pub recent_cap: usize,
    pub broker_defaults: BrokerParams,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "magscope".to_string(),
            window_size: [1400.0, 900.0],
            verbose: false,
            data_dir: None,
            cli_strict_offline: None,
            env_strict_offline: None,
            store: StoreLimits::default(),
            adapters: AdapterSettings {
                parser: SampleParser::new(TemperatureAliases::default()),
                file_batch_size: file::DEFAULT_BATCH_SIZE,
                broker: BrokerOptions::default(),
            },
            recent_cap: RECENT_CAP,
            broker_defaults: BrokerParams::default(),
        }
    }
}

impl AppConfig {
    /// Resolve from the running process. Exits with a usage message on bad arguments.
    pub fn from_process() -> Self {
        Self::from_cli(Cli::parse(), |k| std::env::var(k).ok())
    }

    /// Resolve from parsed arguments and an environment lookup for the flags the
    /// command line leaves unset.
    pub fn from_cli(cli: Cli, env: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self {
            verbose: cli.verbose,
            data_dir: cli.data_dir.filter(|d| !d.as_os_str().is_empty()),
            cli_strict_offline: cli.strict_offline.then_some(true),
            ..Self::default()
        };
        if !cfg.verbose {
            cfg.verbose = [ENV_VERBOSE, ENV_DEBUG]
                .iter()
                .filter_map(|k| env(*k))
                .any(|v| is_truthy(&v));
        }
        cfg.env_strict_offline = env(ENV_STRICT_OFFLINE).map(|v| is_truthy(&v));
        cfg
    }

    /// Strict offline mode: command line first, then the persisted flag, then the
    /// environment. Off when none of them says anything.
    pub fn strict_offline(&self, persisted: Option<bool>) -> bool {
        self.cli_strict_offline
            .or(persisted)
            .or(self.env_strict_offline)
            .unwrap_or(false)
    }

    /// Force strict offline mode regardless of other sources.
    pub fn set_strict_offline(&mut self, on: bool) {
        self.cli_strict_offline = Some(on);
    }

    /// Filter directive used when `RUST_LOG` is unset.
    pub fn default_log_filter(&self) -> &'static str {
        if self.verbose {
            "magscope=debug,info"
        } else {
            "magscope=info,warn"
        }
    }
}
