//! UI stream wire protocol
//!
//! Every message is a JSON object `{type, payload}`. Client messages carry
//! intents and GM commands; the server answers with full-state updates and
//! errors on the same connection.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ship::{Quaternion, Ship, Vector3};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Identify the connection (UI, GM console, panel bridge)
    Register {
        client_type: String,
        #[serde(default)]
        station_role: Option<String>,
    },

    /// Player input (HOTAS axes or a UI action)
    Input(InputMsg),

    /// Privileged game-master command
    GmCommand(GmCommand),

    /// Ask for an immediate full-state update
    RequestState,

    /// Keep-alive; connections quiet for too long are closed
    Heartbeat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "input_type", rename_all = "snake_case")]
pub enum InputMsg {
    /// Raw flight axes for a ship
    Hotas {
        ship_id: String,
        #[serde(default)]
        pitch: f64,
        #[serde(default)]
        yaw: f64,
        #[serde(default)]
        roll: f64,
        #[serde(default)]
        thrust: f64,
    },

    /// A named UI action with a free-form value
    UiAction {
        action: String,
        #[serde(default)]
        value: Value,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum GmCommand {
    Pause,
    Resume,
    CreateSnapshot,
    RestoreSnapshot {
        index: usize,
    },
    SpawnShip {
        ship_id: String,
        class_id: String,
        name: String,
        #[serde(default)]
        is_player: bool,
        position: Vector3,
    },
    RemoveShip {
        ship_id: String,
    },
    DamageShip {
        ship_id: String,
        amount: f64,
        #[serde(default)]
        location: String,
        #[serde(default)]
        damage_type: Option<String>,
    },
    ModifySystem {
        ship_id: String,
        system_type: String,
        system_id: String,
        property: String,
        value: Value,
    },
    SetAiDifficulty {
        ship_id: String,
        difficulty: f64,
    },
    SetAiTacticalMode {
        ship_id: String,
        mode: String,
    },
    StartMission {
        mission_id: String,
    },
    StopMission,
    TriggerEvent {
        event: String,
        #[serde(default)]
        params: Value,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Full world state, broadcast every 50 ms and on demand
    StateUpdate(StateUpdate),

    /// A request on this connection failed
    Error { code: String, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateUpdate {
    pub time: f64,
    pub ships: BTreeMap<String, ShipStateMsg>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipStateMsg {
    pub id: String,
    pub name: String,
    pub class_id: String,
    pub position: Vector3,
    pub velocity: Vector3,
    pub rotation: Quaternion,
    pub systems: SystemsMsg,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemsMsg {
    pub engines: BTreeMap<String, EngineStatus>,
    pub weapons: BTreeMap<String, WeaponStatus>,
    pub shields: BTreeMap<String, ShieldStatus>,
    pub hull: BTreeMap<String, HullStatus>,
    pub power: PowerStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub health: f64,
    pub enabled: bool,
    pub on_fire: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponStatus {
    pub health: f64,
    pub enabled: bool,
    pub cooldown: f64,
    pub armed: bool,
    pub loaded: bool,
    pub locked: bool,
    pub ammo: u32,
    pub on_fire: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShieldStatus {
    pub strength: f64,
    pub health: f64,
    pub facing: String,
    pub on_fire: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HullStatus {
    pub armor: f64,
    pub health: f64,
    pub breached: bool,
    pub on_fire: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerStatus {
    pub current: f64,
    pub max: f64,
    pub generation: f64,
    pub consumption: f64,
}

impl StateUpdate {
    /// Project the full-state message from ship handles. Each ship is read
    /// under its own lock; the world lock is not required here.
    pub fn from_ships(time: f64, ships: &[Arc<Ship>]) -> Self {
        let mut out = BTreeMap::new();

        for ship in ships {
            let msg = ship.with_state(|s| ShipStateMsg {
                id: ship.id.clone(),
                name: ship.name.clone(),
                class_id: ship.class_id.clone(),
                position: s.position,
                velocity: s.velocity,
                rotation: s.rotation,
                systems: SystemsMsg {
                    engines: s
                        .engines
                        .iter()
                        .map(|(id, e)| {
                            (
                                id.clone(),
                                EngineStatus {
                                    health: e.health,
                                    enabled: e.enabled,
                                    on_fire: e.on_fire,
                                },
                            )
                        })
                        .collect(),
                    weapons: s
                        .weapons
                        .iter()
                        .map(|(id, w)| {
                            (
                                id.clone(),
                                WeaponStatus {
                                    health: w.health,
                                    enabled: w.enabled,
                                    cooldown: w.cooldown,
                                    armed: w.armed,
                                    loaded: w.loaded,
                                    locked: w.locked,
                                    ammo: w.ammo_count,
                                    on_fire: w.on_fire,
                                },
                            )
                        })
                        .collect(),
                    shields: s
                        .shields
                        .emitters
                        .iter()
                        .map(|(id, e)| {
                            (
                                id.clone(),
                                ShieldStatus {
                                    strength: e.strength,
                                    health: e.health,
                                    facing: e.facing.clone(),
                                    on_fire: e.on_fire,
                                },
                            )
                        })
                        .collect(),
                    hull: s
                        .hull
                        .sections
                        .iter()
                        .map(|(id, sec)| {
                            (
                                id.clone(),
                                HullStatus {
                                    armor: sec.armor,
                                    health: sec.health,
                                    breached: sec.breached,
                                    on_fire: sec.on_fire,
                                },
                            )
                        })
                        .collect(),
                    power: PowerStatus {
                        current: s.power.current_capacity,
                        max: s.power.max_capacity,
                        generation: s.power.generation,
                        consumption: s.power.consumption,
                    },
                },
            });
            out.insert(ship.id.clone(), msg);
        }

        Self { time, ships: out }
    }
}
