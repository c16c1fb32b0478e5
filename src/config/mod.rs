//! Configuration module - YAML file parsing
//!
//! Three kinds of config feed the server: the server config, one ship
//! class file per hull type, and the panel mapping that binds physical
//! panel actions to station intents.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Server configuration loaded from `server.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Simulation tick rate in Hz
    pub tick_rate: u32,
    /// Port for the UI WebSocket server
    pub websocket_port: u16,
    /// Port for the panel TCP server
    pub tcp_port: u16,
    /// Automatic snapshot interval in seconds
    pub snapshot_interval: u64,
    /// Seed for the world RNG (AI and damage side effects)
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_seed() -> u64 {
    0xCE1E57
}

impl ServerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Read(path.as_ref().display().to_string(), e))?;
        let cfg: ServerConfig = serde_yaml::from_str(&data)
            .map_err(|e| ConfigError::Parse(path.as_ref().display().to_string(), e))?;
        if cfg.tick_rate == 0 {
            return Err(ConfigError::Invalid("tick_rate must be positive"));
        }
        Ok(cfg)
    }
}

/// A ship class definition (one YAML file per class)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipClass {
    pub id: String,
    pub name: String,
    pub mass: f64,
    pub max_speed: f64,
    pub acceleration: f64,
    pub turn_rate: f64,
    #[serde(default)]
    pub engines: Vec<EngineConfig>,
    #[serde(default)]
    pub weapons: Vec<WeaponConfig>,
    #[serde(default)]
    pub shields: ShieldConfig,
    #[serde(default)]
    pub hull: HullConfig,
    #[serde(default)]
    pub subsystems: Vec<SubsystemConfig>,
    #[serde(default)]
    pub launch_bays: Vec<LaunchBayConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub thrust: f64,
    pub health: f64,
    pub power_draw: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub damage: f64,
    pub range: f64,
    pub cooldown_time: f64,
    pub health: f64,
    pub power_draw: f64,
    #[serde(default)]
    pub ammo_capacity: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShieldConfig {
    #[serde(default)]
    pub emitters: Vec<EmitterConfig>,
    #[serde(default)]
    pub recharge_rate: f64,
    #[serde(default)]
    pub power_draw: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitterConfig {
    pub id: String,
    pub facing: String,
    pub strength: f64,
    pub health: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HullConfig {
    #[serde(default)]
    pub sections: Vec<HullSectionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HullSectionConfig {
    pub id: String,
    pub armor: f64,
    pub health: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsystemConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub health: f64,
    pub power_draw: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchBayConfig {
    pub id: String,
    pub capacity: u32,
    pub health: f64,
}

/// Load every `*.yaml` ship class from a directory, keyed by class id
pub fn load_ship_classes(dir: impl AsRef<Path>) -> Result<HashMap<String, ShipClass>, ConfigError> {
    let dir = dir.as_ref();
    let mut classes = HashMap::new();

    let entries = std::fs::read_dir(dir)
        .map_err(|e| ConfigError::Read(dir.display().to_string(), e))?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::Read(dir.display().to_string(), e))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            continue;
        }

        let data = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Read(path.display().to_string(), e))?;
        let class: ShipClass = serde_yaml::from_str(&data)
            .map_err(|e| ConfigError::Parse(path.display().to_string(), e))?;
        classes.insert(class.id.clone(), class);
    }

    Ok(classes)
}

/// Panel mapping file: binds `(panel, action)` pairs to station intents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelMapping {
    pub panels: HashMap<String, PanelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    pub id: String,
    /// Station role this panel belongs to (engineer, flight, ...)
    pub role: String,
    #[serde(default)]
    pub actions: HashMap<String, ActionDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDef {
    pub system: String,
    pub action: String,
}

impl PanelMapping {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Read(path.as_ref().display().to_string(), e))?;
        serde_yaml::from_str(&data)
            .map_err(|e| ConfigError::Parse(path.as_ref().display().to_string(), e))
    }
}

/// Configuration errors (fatal at startup)
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {0}: {1}")]
    Read(String, #[source] std::io::Error),

    #[error("parsing {0}: {1}")]
    Parse(String, #[source] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}
