//! Panel projector - derives per-panel indicator/display snapshots
//!
//! Each physical panel id maps to a deterministic projection over the
//! relevant ship subsystems. The manager caches the last projection per
//! panel so late-joining connections can be served immediately.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use serde_json::{json, Value};

use crate::ship::{Ship, ShipState, WeaponKind};

/// Recognized panel ids
pub const PANEL_IDS: [&str; 16] = [
    "engineer_power_main",
    "engineer_damage_main",
    "engineer_systems",
    "flight_main",
    "flight_navigation",
    "weapons_torpedos_1",
    "weapons_torpedos_2",
    "weapons_phasers",
    "captain_command",
    "captain_status",
    "comms_main",
    "operations_power",
    "operations_resources",
    "relay_sensors",
    "relay_scanning",
    "first_officer_main",
];

#[derive(Debug, Clone, Serialize)]
pub struct PanelState {
    pub panel_id: String,
    pub timestamp: f64,
    pub indicators: BTreeMap<String, Indicator>,
    pub displays: BTreeMap<String, Display>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Indicator {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Value,
    pub color: String,
    pub blink: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Display {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Value,
    pub unit: String,
    pub format: String,
}

fn led(value: impl Into<Value>, color: &str, blink: bool) -> Indicator {
    Indicator {
        kind: "led".to_string(),
        value: value.into(),
        color: color.to_string(),
        blink,
    }
}

fn numeric(value: f64, unit: &str, format: &str) -> Display {
    Display {
        kind: "numeric".to_string(),
        value: json!(value),
        unit: unit.to_string(),
        format: format.to_string(),
    }
}

fn text(value: &str) -> Display {
    Display {
        kind: "text".to_string(),
        value: json!(value),
        unit: String::new(),
        format: "%s".to_string(),
    }
}

/// Common health/strength color mapping: red below 25%, yellow below 50%
fn health_color(percent: f64) -> &'static str {
    if percent < 25.0 {
        "red"
    } else if percent < 50.0 {
        "yellow"
    } else {
        "green"
    }
}

pub struct PanelStateManager {
    states: DashMap<String, PanelState>,
}

impl Default for PanelStateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelStateManager {
    pub fn new() -> Self {
        Self {
            states: DashMap::new(),
        }
    }

    /// Project a panel from the ship's current state and cache the result
    pub fn update_from_ship(&self, panel_id: &str, ship: &Arc<Ship>, time: f64) -> PanelState {
        let state = ship.with_state(|s| project(panel_id, s, time));
        self.states.insert(panel_id.to_string(), state.clone());
        state
    }

    pub fn get_state(&self, panel_id: &str) -> Option<PanelState> {
        self.states.get(panel_id).map(|s| s.clone())
    }

    pub fn all_states(&self) -> Vec<PanelState> {
        self.states.iter().map(|s| s.clone()).collect()
    }
}

/// Build the projection for one panel id. Unknown panels produce an empty
/// state rather than an error; the mapping file gates what clients may bind.
pub fn project(panel_id: &str, ship: &ShipState, time: f64) -> PanelState {
    let mut state = PanelState {
        panel_id: panel_id.to_string(),
        timestamp: time,
        indicators: BTreeMap::new(),
        displays: BTreeMap::new(),
    };

    match panel_id {
        "engineer_power_main" => engineer_power(&mut state, ship),
        "engineer_damage_main" => engineer_damage(&mut state, ship),
        "engineer_systems" => engineer_systems(&mut state, ship),
        "flight_main" => flight_main(&mut state, ship),
        "flight_navigation" => flight_navigation(&mut state, ship),
        "weapons_torpedos_1" => {
            torpedo_bay(&mut state, ship, "torpedo_bay_1");
            torpedo_bay(&mut state, ship, "torpedo_bay_2");
        }
        "weapons_torpedos_2" => {
            torpedo_bay(&mut state, ship, "torpedo_bay_3");
            torpedo_bay(&mut state, ship, "torpedo_bay_4");
        }
        "weapons_phasers" => weapons_phasers(&mut state, ship),
        "captain_command" => captain_command(&mut state, ship),
        "captain_status" => captain_status(&mut state, ship),
        "comms_main" => subsystem_panel(&mut state, ship, "comms"),
        "operations_power" => operations_power(&mut state, ship),
        "operations_resources" => operations_resources(&mut state, ship),
        "relay_sensors" => subsystem_panel(&mut state, ship, "sensors"),
        "relay_scanning" => relay_scanning(&mut state),
        "first_officer_main" => first_officer(&mut state, ship),
        _ => {}
    }

    state
}

fn engineer_power(state: &mut PanelState, ship: &ShipState) {
    let power_percent = (ship.power.current_capacity / ship.power.max_capacity) * 100.0;

    state
        .displays
        .insert("power_level".into(), numeric(power_percent, "%", "%.1f"));
    state
        .displays
        .insert("power_generation".into(), numeric(ship.power.generation, "MW", "%.0f"));
    state
        .displays
        .insert("power_consumption".into(), numeric(ship.power.consumption, "MW", "%.0f"));

    state.indicators.insert(
        "power_status".into(),
        led(true, health_color(power_percent), power_percent < 15.0),
    );

    for (id, breaker) in &ship.power.breakers {
        state
            .indicators
            .insert(format!("breaker_{id}"), led(breaker.enabled, "green", false));
        state
            .displays
            .insert(format!("breaker_load_{id}"), numeric(breaker.load, "MW", "%.1f"));
    }
}

fn engineer_damage(state: &mut PanelState, ship: &ShipState) {
    for (id, section) in &ship.hull.sections {
        let health_percent = (section.health / section.max_health) * 100.0;

        state.indicators.insert(
            format!("hull_{id}"),
            led(true, health_color(health_percent), section.on_fire || section.breached),
        );
        state
            .displays
            .insert(format!("hull_health_{id}"), numeric(health_percent, "%", "%.0f"));

        if section.on_fire {
            state
                .indicators
                .insert(format!("fire_{id}"), led(true, "red", true));
        }
        if section.breached {
            state
                .indicators
                .insert(format!("breach_{id}"), led(true, "red", true));
        }
    }

    for (id, comp) in &ship.life_support.compartments {
        state
            .displays
            .insert(format!("pressure_{id}"), numeric(comp.pressure, "kPa", "%.1f"));
        state
            .displays
            .insert(format!("oxygen_{id}"), numeric(comp.oxygen, "%", "%.1f"));
    }
}

fn engineer_systems(state: &mut PanelState, ship: &ShipState) {
    for (id, engine) in &ship.engines {
        let health_percent = (engine.health / engine.max_health) * 100.0;

        state.indicators.insert(
            format!("engine_{id}"),
            led(engine.enabled, health_color(health_percent), engine.on_fire),
        );
        state
            .displays
            .insert(format!("engine_health_{id}"), numeric(health_percent, "%", "%.0f"));
        state.displays.insert(
            format!("engine_thrust_{id}"),
            numeric(engine.thrust * (health_percent / 100.0), "kN", "%.0f"),
        );
    }
}

fn flight_main(state: &mut PanelState, ship: &ShipState) {
    state
        .displays
        .insert("velocity_x".into(), numeric(ship.velocity.x, "m/s", "%.1f"));
    state
        .displays
        .insert("velocity_y".into(), numeric(ship.velocity.y, "m/s", "%.1f"));
    state
        .displays
        .insert("velocity_z".into(), numeric(ship.velocity.z, "m/s", "%.1f"));
    state
        .displays
        .insert("speed".into(), numeric(ship.velocity.length(), "m/s", "%.0f"));
    state
        .displays
        .insert("throttle".into(), numeric(ship.throttle * 100.0, "%", "%.0f"));
    state
        .indicators
        .insert("docked".into(), led(ship.docked, "blue", false));
}

fn flight_navigation(state: &mut PanelState, ship: &ShipState) {
    state
        .displays
        .insert("position_x".into(), numeric(ship.position.x, "km", "%.0f"));
    state
        .displays
        .insert("position_y".into(), numeric(ship.position.y, "km", "%.0f"));
    state
        .displays
        .insert("position_z".into(), numeric(ship.position.z, "km", "%.0f"));

    let forward = ship.rotation.forward();
    let heading = forward.x.atan2(forward.z).to_degrees();
    state
        .displays
        .insert("heading".into(), numeric(heading, "°", "%.1f"));
}

fn torpedo_bay(state: &mut PanelState, ship: &ShipState, bay_id: &str) {
    let Some(weapon) = ship.weapons.get(bay_id) else {
        return;
    };

    state
        .indicators
        .insert(format!("{bay_id}_armed"), led(weapon.armed, "yellow", false));
    state
        .indicators
        .insert(format!("{bay_id}_loaded"), led(weapon.loaded, "green", false));
    state
        .indicators
        .insert(format!("{bay_id}_locked"), led(weapon.locked, "red", false));

    state.displays.insert(
        format!("{bay_id}_ammo"),
        Display {
            kind: "numeric".into(),
            value: json!(weapon.ammo_count),
            unit: String::new(),
            format: "%d".into(),
        },
    );
    state
        .displays
        .insert(format!("{bay_id}_cooldown"), numeric(weapon.cooldown, "s", "%.1f"));

    let health_percent = (weapon.health / weapon.max_health) * 100.0;
    state
        .displays
        .insert(format!("{bay_id}_health"), numeric(health_percent, "%", "%.0f"));
}

fn weapons_phasers(state: &mut PanelState, ship: &ShipState) {
    for (id, weapon) in &ship.weapons {
        if weapon.kind != WeaponKind::Phaser {
            continue;
        }

        let health_percent = (weapon.health / weapon.max_health) * 100.0;
        state.indicators.insert(
            format!("phaser_{id}"),
            led(
                weapon.enabled && weapon.health > 0.0,
                health_color(health_percent),
                weapon.cooldown > 0.0,
            ),
        );
        state
            .displays
            .insert(format!("phaser_health_{id}"), numeric(health_percent, "%", "%.0f"));
        state
            .displays
            .insert(format!("phaser_cooldown_{id}"), numeric(weapon.cooldown, "s", "%.1f"));
    }

    state
        .displays
        .insert("target_id".into(), text(ship.target_id.as_deref().unwrap_or("")));
}

fn captain_command(state: &mut PanelState, ship: &ShipState) {
    state.indicators.insert("red_alert".into(), led(false, "red", false));
    state
        .indicators
        .insert("yellow_alert".into(), led(true, "yellow", false));

    for (role, crew) in &ship.crew {
        state.indicators.insert(
            format!("crew_{role}"),
            led(crew.health > 0.0, health_color(crew.health), crew.status != "healthy"),
        );
    }
}

fn captain_status(state: &mut PanelState, ship: &ShipState) {
    state.displays.insert(
        "hull_integrity".into(),
        numeric(ship.hull_fraction() * 100.0, "%", "%.0f"),
    );
    state.displays.insert(
        "shield_strength".into(),
        numeric(ship.shield_fraction() * 100.0, "%", "%.0f"),
    );

    let power_percent = (ship.power.current_capacity / ship.power.max_capacity) * 100.0;
    state
        .displays
        .insert("power_level".into(), numeric(power_percent, "%", "%.0f"));
}

fn subsystem_panel(state: &mut PanelState, ship: &ShipState, subsystem_id: &str) {
    let Some(subsystem) = ship.subsystems.get(subsystem_id) else {
        return;
    };

    let health_percent = (subsystem.health / subsystem.max_health) * 100.0;
    state.displays.insert(
        format!("{subsystem_id}_health"),
        numeric(health_percent, "%", "%.0f"),
    );
    state.indicators.insert(
        format!("{subsystem_id}_online"),
        led(
            subsystem.enabled && health_percent > 0.0,
            health_color(health_percent),
            false,
        ),
    );
}

fn operations_power(state: &mut PanelState, ship: &ShipState) {
    state
        .indicators
        .insert("shields_enabled".into(), led(ship.shields.enabled, "blue", false));

    for (id, emitter) in &ship.shields.emitters {
        let strength_percent = (emitter.strength / emitter.max_strength) * 100.0;
        state
            .displays
            .insert(format!("shield_{id}"), numeric(strength_percent, "%", "%.0f"));
        state.indicators.insert(
            format!("shield_{id}_status"),
            led(true, health_color(strength_percent), false),
        );
    }
}

fn operations_resources(state: &mut PanelState, ship: &ShipState) {
    for (id, bay) in &ship.launch_bays {
        state.displays.insert(
            format!("bay_{id}_count"),
            Display {
                kind: "numeric".into(),
                value: json!(bay.current),
                unit: format!("/{}", bay.capacity),
                format: "%d".into(),
            },
        );
    }
}

fn relay_scanning(state: &mut PanelState) {
    state
        .indicators
        .insert("scan_active".into(), led(false, "blue", false));
}

fn first_officer(state: &mut PanelState, ship: &ShipState) {
    for (id, subsystem) in &ship.subsystems {
        let health_percent = (subsystem.health / subsystem.max_health) * 100.0;

        state.indicators.insert(
            format!("system_{id}"),
            led(subsystem.enabled, health_color(health_percent), subsystem.on_fire),
        );
        state
            .displays
            .insert(format!("system_health_{id}"), numeric(health_percent, "%", "%.0f"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        EmitterConfig, EngineConfig, HullConfig, HullSectionConfig, ShieldConfig, ShipClass,
        SubsystemConfig, WeaponConfig,
    };
    use crate::ship::Vector3;

    fn full_class() -> ShipClass {
        ShipClass {
            id: "cruiser".into(),
            name: "Cruiser".into(),
            mass: 100_000.0,
            max_speed: 200.0,
            acceleration: 50.0,
            turn_rate: 1.0,
            engines: vec![EngineConfig {
                id: "main_1".into(),
                kind: "main".into(),
                thrust: 50_000.0,
                health: 100.0,
                power_draw: 100.0,
            }],
            weapons: vec![
                WeaponConfig {
                    id: "phaser_1".into(),
                    kind: "phaser".into(),
                    damage: 25.0,
                    range: 2000.0,
                    cooldown_time: 2.0,
                    health: 100.0,
                    power_draw: 50.0,
                    ammo_capacity: 0,
                },
                WeaponConfig {
                    id: "torpedo_bay_1".into(),
                    kind: "torpedo".into(),
                    damage: 100.0,
                    range: 5000.0,
                    cooldown_time: 5.0,
                    health: 100.0,
                    power_draw: 20.0,
                    ammo_capacity: 10,
                },
            ],
            shields: ShieldConfig {
                recharge_rate: 10.0,
                power_draw: 100.0,
                emitters: vec![EmitterConfig {
                    id: "forward".into(),
                    facing: "forward".into(),
                    strength: 500.0,
                    health: 100.0,
                }],
            },
            hull: HullConfig {
                sections: vec![HullSectionConfig {
                    id: "forward".into(),
                    armor: 200.0,
                    health: 500.0,
                }],
            },
            subsystems: vec![
                SubsystemConfig {
                    id: "sensors".into(),
                    kind: "sensors".into(),
                    health: 100.0,
                    power_draw: 30.0,
                },
                SubsystemConfig {
                    id: "comms".into(),
                    kind: "comms".into(),
                    health: 100.0,
                    power_draw: 20.0,
                },
            ],
            launch_bays: vec![],
        }
    }

    fn ship() -> Arc<Ship> {
        Arc::new(Ship::new("hero", "cruiser", "Hero", &full_class(), true))
    }

    #[test]
    fn color_thresholds() {
        assert_eq!(health_color(10.0), "red");
        assert_eq!(health_color(24.9), "red");
        assert_eq!(health_color(25.0), "yellow");
        assert_eq!(health_color(49.9), "yellow");
        assert_eq!(health_color(50.0), "green");
        assert_eq!(health_color(100.0), "green");
    }

    #[test]
    fn engineer_power_panel_shows_capacity() {
        let manager = PanelStateManager::new();
        let state = manager.update_from_ship("engineer_power_main", &ship(), 12.5);

        assert_eq!(state.panel_id, "engineer_power_main");
        assert_eq!(state.timestamp, 12.5);
        assert_eq!(state.displays["power_level"].value, json!(100.0));
        assert_eq!(state.indicators["power_status"].color, "green");
        assert!(!state.indicators["power_status"].blink);
    }

    #[test]
    fn damage_panel_blinks_on_fire_and_breach() {
        let s = ship();
        s.with_state_mut(|st| {
            let section = st.hull.sections.get_mut("forward").unwrap();
            section.on_fire = true;
            section.health = 50.0;
        });

        let state = PanelStateManager::new().update_from_ship("engineer_damage_main", &s, 0.0);
        assert!(state.indicators["hull_forward"].blink);
        assert_eq!(state.indicators["hull_forward"].color, "red");
        assert!(state.indicators.contains_key("fire_forward"));
        assert!(!state.indicators.contains_key("breach_forward"));
    }

    #[test]
    fn flight_main_shows_true_speed() {
        let s = ship();
        s.with_state_mut(|st| st.velocity = Vector3::new(3.0, 4.0, 0.0));
        let state = PanelStateManager::new().update_from_ship("flight_main", &s, 0.0);
        assert_eq!(state.displays["speed"].value, json!(5.0));
    }

    #[test]
    fn torpedo_panel_covers_first_two_bays() {
        let s = ship();
        s.with_state_mut(|st| {
            let w = st.weapons.get_mut("torpedo_bay_1").unwrap();
            w.armed = true;
        });
        let state = PanelStateManager::new().update_from_ship("weapons_torpedos_1", &s, 0.0);

        assert_eq!(state.indicators["torpedo_bay_1_armed"].value, json!(true));
        assert_eq!(state.displays["torpedo_bay_1_ammo"].value, json!(10));
        // bay 2 is not fitted on this class
        assert!(!state.indicators.contains_key("torpedo_bay_2_armed"));
    }

    #[test]
    fn phaser_panel_blinks_during_cooldown() {
        let s = ship();
        s.with_state_mut(|st| st.weapons.get_mut("phaser_1").unwrap().cooldown = 1.5);
        let state = PanelStateManager::new().update_from_ship("weapons_phasers", &s, 0.0);
        assert!(state.indicators["phaser_phaser_1"].blink);
        // torpedo bays never appear on the phaser panel
        assert!(!state.displays.contains_key("phaser_health_torpedo_bay_1"));
    }

    #[test]
    fn captain_status_aggregates_fractions() {
        let s = ship();
        s.with_state_mut(|st| {
            st.hull.sections.get_mut("forward").unwrap().health = 250.0;
            st.shields.emitters.get_mut("forward").unwrap().strength = 100.0;
        });
        let state = PanelStateManager::new().update_from_ship("captain_status", &s, 0.0);
        assert_eq!(state.displays["hull_integrity"].value, json!(50.0));
        assert_eq!(state.displays["shield_strength"].value, json!(20.0));
    }

    #[test]
    fn captain_command_lists_crew() {
        let state = PanelStateManager::new().update_from_ship("captain_command", &ship(), 0.0);
        assert!(state.indicators.contains_key("crew_engineer"));
        assert!(state.indicators.contains_key("crew_first_officer"));
        assert_eq!(state.indicators["crew_captain"].color, "green");
    }

    #[test]
    fn unknown_panel_projects_empty() {
        let state = PanelStateManager::new().update_from_ship("mystery_panel", &ship(), 0.0);
        assert!(state.indicators.is_empty());
        assert!(state.displays.is_empty());
    }

    #[test]
    fn manager_caches_last_projection() {
        let manager = PanelStateManager::new();
        assert!(manager.get_state("captain_status").is_none());
        manager.update_from_ship("captain_status", &ship(), 3.0);
        let cached = manager.get_state("captain_status").unwrap();
        assert_eq!(cached.timestamp, 3.0);
        assert_eq!(manager.all_states().len(), 1);
    }

    #[test]
    fn every_known_panel_projects_without_panicking() {
        let manager = PanelStateManager::new();
        let s = ship();
        for panel_id in PANEL_IDS {
            manager.update_from_ship(panel_id, &s, 1.0);
        }
        assert_eq!(manager.all_states().len(), PANEL_IDS.len());
    }
}
