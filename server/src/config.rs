//! Server configuration: TOML file plus command-line overrides

use crate::fleet::FleetRegistry;
use aeromatrix_shared::codec::MAX_MESSAGE_SIZE;
use aeromatrix_shared::protocol::NewDrone;
use aeromatrix_shared::{net, Bounds, FleetError, Orientation};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for '{field}': {message}")]
    Invalid { field: String, message: String },

    #[error("Seed matrix #{index} rejected: {source}")]
    Seed { index: usize, source: FleetError },
}

#[derive(Debug, Clone, Parser)]
#[command(name = "aeromatrix-server")]
#[command(about = "Drone fleet command server")]
pub struct ServerArgs {
    /// TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to listen on, overrides the config file
    #[arg(long)]
    pub listen: Option<SocketAddr>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub idle_timeout_secs: u64,
    pub max_frame_bytes: u32,
    pub fleet: FleetSeed,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], net::DEFAULT_PORT)),
            idle_timeout_secs: net::DEFAULT_IDLE_TIMEOUT_SECS,
            max_frame_bytes: net::DEFAULT_MAX_FRAME_BYTES,
            fleet: FleetSeed::default(),
        }
    }
}

/// Matrices and drones created at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetSeed {
    #[serde(default)]
    pub matrices: Vec<MatrixSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixSeed {
    pub max_x: u32,
    pub max_y: u32,
    #[serde(default)]
    pub drones: Vec<DroneSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroneSeed {
    pub name: String,
    #[serde(default)]
    pub model: String,
    pub x: u32,
    pub y: u32,
    pub orientation: Orientation,
}

impl ServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Build the effective config: file (if any), then CLI overrides.
    /// Not validated here; `FleetServer::from_config` does that.
    pub fn load(args: &ServerArgs) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(listen) = args.listen {
            config.listen_addr = listen;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "idle_timeout_secs".into(),
                message: "must be at least 1".into(),
            });
        }

        if self.max_frame_bytes == 0 || self.max_frame_bytes > MAX_MESSAGE_SIZE {
            return Err(ConfigError::Invalid {
                field: "max_frame_bytes".into(),
                message: format!("must be between 1 and {}", MAX_MESSAGE_SIZE),
            });
        }

        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl FleetSeed {
    /// Create the seeded matrices and drones through the registry's
    /// validated operations. Stops at the first refusal.
    pub async fn apply(&self, registry: &FleetRegistry) -> Result<(), ConfigError> {
        for (index, seed) in self.matrices.iter().enumerate() {
            let view = registry
                .create_matrix(Bounds::new(seed.max_x, seed.max_y))
                .await;

            for drone in &seed.drones {
                registry
                    .create_drone(NewDrone {
                        name: drone.name.clone(),
                        model: drone.model.clone(),
                        x: drone.x,
                        y: drone.y,
                        orientation: drone.orientation,
                        matrix_id: view.id,
                    })
                    .await
                    .map_err(|source| ConfigError::Seed { index, source })?;
            }

            info!(matrix_id = view.id, drones = seed.drones.len(), "Seeded matrix");
        }

        Ok(())
    }
}
