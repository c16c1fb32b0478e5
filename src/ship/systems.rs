//! Ship subsystem components
//!
//! Every health-bearing component can also be addressed uniformly through
//! [`SystemRefMut`], which is what the damage and repair paths use so they
//! do not need one branch per component map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engine {
    pub id: String,
    pub kind: String,
    pub thrust: f64,
    pub max_health: f64,
    pub health: f64,
    pub enabled: bool,
    pub power_draw: f64,
    pub on_fire: bool,
}

impl Engine {
    pub fn from_config(cfg: &config::EngineConfig) -> Self {
        Self {
            id: cfg.id.clone(),
            kind: cfg.kind.clone(),
            thrust: cfg.thrust,
            max_health: cfg.health,
            health: cfg.health,
            enabled: true,
            power_draw: cfg.power_draw,
            on_fire: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    Phaser,
    Torpedo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Weapon {
    pub id: String,
    pub kind: WeaponKind,
    pub damage: f64,
    pub range: f64,
    pub cooldown_time: f64,
    pub cooldown: f64,
    pub max_health: f64,
    pub health: f64,
    pub enabled: bool,
    pub power_draw: f64,
    pub on_fire: bool,
    pub armed: bool,
    pub loaded: bool,
    pub locked: bool,
    pub ammo_capacity: u32,
    pub ammo_count: u32,
}

impl Weapon {
    pub fn from_config(cfg: &config::WeaponConfig) -> Self {
        let kind = match cfg.kind.as_str() {
            "torpedo" => WeaponKind::Torpedo,
            _ => WeaponKind::Phaser,
        };
        Self {
            id: cfg.id.clone(),
            kind,
            damage: cfg.damage,
            range: cfg.range,
            cooldown_time: cfg.cooldown_time,
            cooldown: 0.0,
            max_health: cfg.health,
            health: cfg.health,
            enabled: true,
            power_draw: cfg.power_draw,
            on_fire: false,
            armed: false,
            loaded: false,
            locked: false,
            ammo_capacity: cfg.ammo_capacity,
            ammo_count: cfg.ammo_capacity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShieldSystem {
    pub emitters: BTreeMap<String, ShieldEmitter>,
    pub recharge_rate: f64,
    pub power_draw: f64,
    pub enabled: bool,
}

impl ShieldSystem {
    pub fn from_config(cfg: &config::ShieldConfig) -> Self {
        let mut emitters = BTreeMap::new();
        for em in &cfg.emitters {
            emitters.insert(em.id.clone(), ShieldEmitter::from_config(em));
        }
        Self {
            emitters,
            recharge_rate: cfg.recharge_rate,
            power_draw: cfg.power_draw,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShieldEmitter {
    pub id: String,
    pub facing: String,
    pub max_strength: f64,
    pub strength: f64,
    pub max_health: f64,
    pub health: f64,
    pub on_fire: bool,
}

impl ShieldEmitter {
    pub fn from_config(cfg: &config::EmitterConfig) -> Self {
        Self {
            id: cfg.id.clone(),
            facing: cfg.facing.clone(),
            max_strength: cfg.strength,
            strength: cfg.strength,
            max_health: cfg.health,
            health: cfg.health,
            on_fire: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HullSystem {
    pub sections: BTreeMap<String, HullSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HullSection {
    pub id: String,
    pub max_armor: f64,
    pub armor: f64,
    pub max_health: f64,
    pub health: f64,
    pub breached: bool,
    pub on_fire: bool,
}

impl HullSection {
    pub fn from_config(cfg: &config::HullSectionConfig) -> Self {
        Self {
            id: cfg.id.clone(),
            max_armor: cfg.armor,
            armor: cfg.armor,
            max_health: cfg.health,
            health: cfg.health,
            breached: false,
            on_fire: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subsystem {
    pub id: String,
    pub kind: String,
    pub max_health: f64,
    pub health: f64,
    pub enabled: bool,
    pub power_draw: f64,
    pub on_fire: bool,
}

impl Subsystem {
    pub fn from_config(cfg: &config::SubsystemConfig) -> Self {
        Self {
            id: cfg.id.clone(),
            kind: cfg.kind.clone(),
            max_health: cfg.health,
            health: cfg.health,
            enabled: true,
            power_draw: cfg.power_draw,
            on_fire: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchBay {
    pub id: String,
    pub capacity: u32,
    pub current: u32,
    pub max_health: f64,
    pub health: f64,
    pub on_fire: bool,
}

impl LaunchBay {
    pub fn from_config(cfg: &config::LaunchBayConfig) -> Self {
        Self {
            id: cfg.id.clone(),
            capacity: cfg.capacity,
            current: cfg.capacity,
            max_health: cfg.health,
            health: cfg.health,
            on_fire: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerSystem {
    pub max_capacity: f64,
    pub current_capacity: f64,
    pub generation: f64,
    pub consumption: f64,
    pub breakers: BTreeMap<String, Breaker>,
}

impl Default for PowerSystem {
    fn default() -> Self {
        Self {
            max_capacity: 10_000.0,
            current_capacity: 10_000.0,
            generation: 1_000.0,
            consumption: 0.0,
            breakers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Breaker {
    pub id: String,
    pub system: String,
    pub enabled: bool,
    pub load: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifeSupportSystem {
    pub compartments: BTreeMap<String, Compartment>,
}

impl LifeSupportSystem {
    /// Every hull ships with the same compartment set
    pub fn standard() -> Self {
        let names = ["bridge", "engineering", "weapons_bay", "crew_quarters", "cargo_bay"];
        let mut compartments = BTreeMap::new();
        for name in names {
            compartments.insert(
                name.to_string(),
                Compartment {
                    id: name.to_string(),
                    max_pressure: 101.3,
                    pressure: 101.3,
                    max_oxygen: 21.0,
                    oxygen: 21.0,
                    temperature: 20.0,
                    on_fire: false,
                    breached: false,
                },
            );
        }
        Self { compartments }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Compartment {
    pub id: String,
    pub max_pressure: f64,
    pub pressure: f64,
    pub max_oxygen: f64,
    pub oxygen: f64,
    pub temperature: f64,
    pub on_fire: bool,
    pub breached: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewMember {
    pub role: String,
    pub health: f64,
    pub status: String,
}

/// Canonical station roles, present on every player ship
pub const CREW_ROLES: [&str; 8] = [
    "engineer",
    "flight",
    "weapons",
    "captain",
    "comms",
    "operations",
    "relay",
    "first_officer",
];

/// Which component map a system id refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemKind {
    Engine,
    Weapon,
    Shield,
    Hull,
    Subsystem,
}

impl SystemKind {
    pub fn parse(s: &str) -> Option<SystemKind> {
        match s {
            "engine" => Some(SystemKind::Engine),
            "weapon" => Some(SystemKind::Weapon),
            "shield" => Some(SystemKind::Shield),
            "hull" => Some(SystemKind::Hull),
            "subsystem" => Some(SystemKind::Subsystem),
            _ => None,
        }
    }
}

/// Tagged mutable reference to any health-bearing component, so damage
/// decay and repair run through one code path per operation.
pub enum SystemRefMut<'a> {
    Engine(&'a mut Engine),
    Weapon(&'a mut Weapon),
    Emitter(&'a mut ShieldEmitter),
    Hull(&'a mut HullSection),
    Subsystem(&'a mut Subsystem),
}

impl SystemRefMut<'_> {
    pub fn health(&self) -> f64 {
        match self {
            SystemRefMut::Engine(e) => e.health,
            SystemRefMut::Weapon(w) => w.health,
            SystemRefMut::Emitter(e) => e.health,
            SystemRefMut::Hull(h) => h.health,
            SystemRefMut::Subsystem(s) => s.health,
        }
    }

    pub fn max_health(&self) -> f64 {
        match self {
            SystemRefMut::Engine(e) => e.max_health,
            SystemRefMut::Weapon(w) => w.max_health,
            SystemRefMut::Emitter(e) => e.max_health,
            SystemRefMut::Hull(h) => h.max_health,
            SystemRefMut::Subsystem(s) => s.max_health,
        }
    }

    pub fn on_fire(&self) -> bool {
        match self {
            SystemRefMut::Engine(e) => e.on_fire,
            SystemRefMut::Weapon(w) => w.on_fire,
            SystemRefMut::Emitter(e) => e.on_fire,
            SystemRefMut::Hull(h) => h.on_fire,
            SystemRefMut::Subsystem(s) => s.on_fire,
        }
    }

    fn set_health(&mut self, health: f64) {
        match self {
            SystemRefMut::Engine(e) => e.health = health,
            SystemRefMut::Weapon(w) => w.health = health,
            SystemRefMut::Emitter(e) => e.health = health,
            SystemRefMut::Hull(h) => h.health = health,
            SystemRefMut::Subsystem(s) => s.health = health,
        }
    }

    /// Fire damage: reduce health, floored at 0
    pub fn burn(&mut self, amount: f64) {
        let health = (self.health() - amount).max(0.0);
        self.set_health(health);
    }

    /// Direct health override (GM path), clamped to [0, max]
    pub fn set_health_clamped(&mut self, health: f64) {
        let clamped = health.clamp(0.0, self.max_health());
        self.set_health(clamped);
        if let SystemRefMut::Hull(section) = self {
            if section.health <= 0.0 {
                section.breached = true;
            }
        }
    }

    pub fn set_on_fire(&mut self, on_fire: bool) {
        match self {
            SystemRefMut::Engine(e) => e.on_fire = on_fire,
            SystemRefMut::Weapon(w) => w.on_fire = on_fire,
            SystemRefMut::Emitter(e) => e.on_fire = on_fire,
            SystemRefMut::Hull(h) => h.on_fire = on_fire,
            SystemRefMut::Subsystem(s) => s.on_fire = on_fire,
        }
    }

    /// Flip the enabled flag where the component has one; returns false
    /// for components that are always on
    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        match self {
            SystemRefMut::Engine(e) => {
                e.enabled = enabled;
                true
            }
            SystemRefMut::Weapon(w) => {
                w.enabled = enabled;
                true
            }
            SystemRefMut::Subsystem(s) => {
                s.enabled = enabled;
                true
            }
            SystemRefMut::Emitter(_) | SystemRefMut::Hull(_) => false,
        }
    }

    /// Restore health up to the maximum. A hull section whose health comes
    /// back above zero is no longer breached.
    pub fn repair(&mut self, amount: f64) {
        let health = (self.health() + amount).min(self.max_health());
        self.set_health(health);
        if let SystemRefMut::Hull(section) = self {
            if section.health > 0.0 {
                section.breached = false;
            }
        }
    }
}
