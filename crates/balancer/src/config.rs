//! Command-line flags and the file-backed balancer configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use spatial_component::{ComponentTypeId, ids};
use spatial_math::{Aabb, DVec2};
use thiserror::Error;

/// Spatial authority balancer.
#[derive(Debug, Clone, Parser)]
#[command(name = "balancer", version, about)]
pub struct Args {
    /// Host handed to launched workers.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port handed to launched workers.
    #[arg(long, default_value_t = 7777)]
    pub port: u16,

    /// Worker id of this balancer. Defaults to `Balancer_<uuid>`.
    #[arg(long)]
    pub worker: Option<String>,

    /// Development mode: workers are launched by hand instead of forked.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub dev: bool,

    /// NATS server URL. Falls back to `NATS_URL`, then the local default.
    #[arg(long)]
    pub nats_url: Option<String>,

    /// JSON file overriding the built-in configuration.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Args {
    /// The balancer's worker id, generating one when none was given.
    #[must_use]
    pub fn worker_id(&self) -> String {
        self.worker
            .clone()
            .unwrap_or_else(|| format!("Balancer_{}", uuid::Uuid::new_v4()))
    }

    /// How sibling processes are started.
    #[must_use]
    pub fn launch_mode(&self) -> LaunchMode {
        if self.dev {
            LaunchMode::External
        } else {
            LaunchMode::Fork
        }
    }
}

/// How simulation workers and bots come into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Spawn the configured executables as child processes.
    Fork,
    /// Log the request; a developer starts the process by hand.
    External,
}

/// Everything the process host needs to start a sibling.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub mode: LaunchMode,
    pub host: String,
    pub port: u16,
    pub worker_executable: PathBuf,
    pub bot_executable: PathBuf,
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("world bounds {0} have no area")]
    EmptyBounds(Aabb),

    #[error("interest margin must be positive, got {0}")]
    InvalidMargin(f64),
}

/// Tunables of the balancer. Every field has a default, so a config file
/// only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// The planar world rectangle partitioned across workers.
    pub world_bounds: Aabb,
    /// Simulation worker executable used in fork mode.
    pub worker_executable: PathBuf,
    /// Bot executable used in fork mode.
    pub bot_executable: PathBuf,
    /// Runtime flag carrying the desired bot count.
    pub bot_flag: String,
    /// Components whose write authority follows entity position.
    pub spatial_components: Vec<ComponentTypeId>,
    /// Spawn a new ship when a connected client's ship is removed.
    pub respawn_ships: bool,
    /// Scale applied to a cell when building its region interest.
    pub interest_margin: f64,
    /// Vertical extent of the region interest box.
    pub interest_height: f64,
    /// Period of the full reconciliation sweep, in milliseconds.
    pub sweep_interval_ms: u64,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            world_bounds: Aabb::new(DVec2::ZERO, DVec2::new(2048.0, 1024.0)),
            worker_executable: PathBuf::from("./server"),
            bot_executable: PathBuf::from("./bot"),
            bot_flag: "NUM_BOTS".to_string(),
            spatial_components: vec![ids::SHIP, ids::BULLET, ids::POSITION, ids::EFFECT],
            respawn_ships: true,
            interest_margin: 1.1,
            interest_height: 10_000.0,
            sweep_interval_ms: 1_000,
        }
    }
}

impl BalancerConfig {
    /// Load a config file, filling missing keys from the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the configuration selected by the command line.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `--config` names an unusable file.
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        match &args.config {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Check the values a file may have broken.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] describing the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world_bounds.area() <= 0.0 {
            return Err(ConfigError::EmptyBounds(self.world_bounds));
        }
        if self.interest_margin <= 0.0 {
            return Err(ConfigError::InvalidMargin(self.interest_margin));
        }
        Ok(())
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }

    /// Combine the executables with the command-line launch settings.
    #[must_use]
    pub fn launch_spec(&self, args: &Args) -> LaunchSpec {
        LaunchSpec {
            mode: args.launch_mode(),
            host: args.host.clone(),
            port: args.port,
            worker_executable: self.worker_executable.clone(),
            bot_executable: self.bot_executable.clone(),
        }
    }
}
