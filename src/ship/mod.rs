//! Ship model - composite entity of pose, subsystems and crew
//!
//! A [`Ship`] owns its mutable state behind a reader/writer lock so the
//! simulation tick, AI controllers and station intent handlers cannot race
//! each other. Lock acquisition order is always simulator first, then ship.

pub mod math;
pub mod systems;

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::config::ShipClass;

pub use math::{Quaternion, Vector3};
pub use systems::{
    Breaker, Compartment, CrewMember, Engine, HullSection, HullSystem, LaunchBay,
    LifeSupportSystem, PowerSystem, ShieldEmitter, ShieldSystem, Subsystem, SystemKind,
    SystemRefMut, Weapon, WeaponKind, CREW_ROLES,
};

/// Health lost per second by any burning component
const FIRE_DAMAGE_PER_SEC: f64 = 5.0;
/// Velocity retained per tick
const LINEAR_DRAG: f64 = 0.98;
/// Angular velocity retained per tick
const ANGULAR_DRAG: f64 = 0.95;

/// All mutable ship state, guarded by the ship's lock.
///
/// Cloning this struct is a full deep copy; snapshots rely on that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipState {
    pub position: Vector3,
    pub velocity: Vector3,
    pub rotation: Quaternion,
    pub angular_velocity: Vector3,

    pub mass: f64,
    pub max_speed: f64,
    pub acceleration: f64,
    pub turn_rate: f64,

    /// Commanded thrust fraction in [-1, 1]; engines multiply this in
    /// the physics phase. Defaults to full ahead.
    pub throttle: f64,
    pub docked: bool,
    pub target_id: Option<String>,

    pub engines: BTreeMap<String, Engine>,
    pub weapons: BTreeMap<String, Weapon>,
    pub shields: ShieldSystem,
    pub hull: HullSystem,
    pub subsystems: BTreeMap<String, Subsystem>,
    pub launch_bays: BTreeMap<String, LaunchBay>,
    pub power: PowerSystem,
    pub life_support: LifeSupportSystem,
    pub crew: BTreeMap<String, CrewMember>,
}

/// A ship in the world. Identity fields are immutable for the ship's
/// lifetime; everything else lives in the guarded [`ShipState`].
#[derive(Debug)]
pub struct Ship {
    pub id: String,
    pub class_id: String,
    pub name: String,
    pub is_player: bool,
    state: RwLock<ShipState>,
}

impl Ship {
    pub fn new(id: &str, class_id: &str, name: &str, class: &ShipClass, is_player: bool) -> Self {
        let mut engines = BTreeMap::new();
        for cfg in &class.engines {
            engines.insert(cfg.id.clone(), Engine::from_config(cfg));
        }

        let mut weapons = BTreeMap::new();
        for cfg in &class.weapons {
            weapons.insert(cfg.id.clone(), Weapon::from_config(cfg));
        }

        let mut hull = HullSystem::default();
        for cfg in &class.hull.sections {
            hull.sections.insert(cfg.id.clone(), HullSection::from_config(cfg));
        }

        let mut subsystems = BTreeMap::new();
        for cfg in &class.subsystems {
            subsystems.insert(cfg.id.clone(), Subsystem::from_config(cfg));
        }

        let mut launch_bays = BTreeMap::new();
        for cfg in &class.launch_bays {
            launch_bays.insert(cfg.id.clone(), LaunchBay::from_config(cfg));
        }

        let mut crew = BTreeMap::new();
        if is_player {
            for role in CREW_ROLES {
                crew.insert(
                    role.to_string(),
                    CrewMember {
                        role: role.to_string(),
                        health: 100.0,
                        status: "healthy".to_string(),
                    },
                );
            }
        }

        let state = ShipState {
            position: Vector3::ZERO,
            velocity: Vector3::ZERO,
            rotation: Quaternion::IDENTITY,
            angular_velocity: Vector3::ZERO,
            mass: class.mass,
            max_speed: class.max_speed,
            acceleration: class.acceleration,
            turn_rate: class.turn_rate,
            throttle: 1.0,
            docked: false,
            target_id: None,
            engines,
            weapons,
            shields: ShieldSystem::from_config(&class.shields),
            hull,
            subsystems,
            launch_bays,
            power: PowerSystem::default(),
            life_support: LifeSupportSystem::standard(),
            crew,
        };

        Self {
            id: id.to_string(),
            class_id: class_id.to_string(),
            name: name.to_string(),
            is_player,
            state: RwLock::new(state),
        }
    }

    /// Rebuild a ship from a snapshot record
    pub fn from_state(id: &str, class_id: &str, name: &str, is_player: bool, state: ShipState) -> Self {
        Self {
            id: id.to_string(),
            class_id: class_id.to_string(),
            name: name.to_string(),
            is_player,
            state: RwLock::new(state),
        }
    }

    // A panicked writer may poison the lock; the numeric state it guards is
    // still consistent per-field, so recover the guard and keep simulating.
    fn read(&self) -> RwLockReadGuard<'_, ShipState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ShipState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a closure against the ship state under the read lock
    pub fn with_state<R>(&self, f: impl FnOnce(&ShipState) -> R) -> R {
        f(&self.read())
    }

    /// Run a closure against the ship state under the write lock
    pub fn with_state_mut<R>(&self, f: impl FnOnce(&mut ShipState) -> R) -> R {
        f(&mut self.write())
    }

    /// Deep copy of the current state (snapshot path)
    pub fn clone_state(&self) -> ShipState {
        self.read().clone()
    }

    /// Advance the ship by one tick. Phase order matters: flags set by
    /// damage this tick feed the *next* tick's fire decay.
    pub fn update(&self, dt: f64) {
        let mut state = self.write();
        state.update_physics(dt);
        state.update_power(dt);
        state.update_shields(dt);
        state.update_weapons(dt);
        state.update_fire_decay(dt);
        state.update_life_support(dt);
    }

    /// Set the commanded thrust fraction, clamped to [-1, 1]
    pub fn set_throttle(&self, throttle: f64) {
        self.write().throttle = throttle.clamp(-1.0, 1.0);
    }

    /// Add rotational impulse scaled by the ship's turn rate
    pub fn apply_rotation(&self, pitch: f64, yaw: f64, roll: f64) {
        let mut state = self.write();
        let rate = state.turn_rate;
        state.angular_velocity.x += pitch * rate;
        state.angular_velocity.y += yaw * rate;
        state.angular_velocity.z += roll * rate;
    }

    /// Attempt to fire a weapon. Returns false when the weapon is missing,
    /// destroyed, cooling down, or (for torpedoes) not armed/loaded/locked
    /// or out of ammo. On success the cooldown starts and the target is
    /// recorded; projectile spawning is the caller's job.
    pub fn fire_weapon(&self, weapon_id: &str, target_id: &str) -> bool {
        let mut state = self.write();
        let Some(weapon) = state.weapons.get_mut(weapon_id) else {
            return false;
        };
        if weapon.health <= 0.0 || weapon.cooldown > 0.0 {
            return false;
        }

        if weapon.kind == WeaponKind::Torpedo {
            if !weapon.armed || !weapon.loaded || !weapon.locked {
                return false;
            }
            if weapon.ammo_count == 0 {
                return false;
            }
            weapon.ammo_count -= 1;
            weapon.loaded = false;
        }

        weapon.cooldown = weapon.cooldown_time;
        state.target_id = Some(target_id.to_string());
        true
    }

    /// Apply incoming damage at a facing. The shield emitter at the
    /// location absorbs first; overflow reaches the hull, where armor
    /// soaks half the amount before health takes the full hit.
    pub fn take_damage(&self, amount: f64, location: &str) {
        let mut state = self.write();
        state.take_damage(amount, location);
    }
}

impl ShipState {
    fn update_physics(&mut self, dt: f64) {
        let mut total_thrust = 0.0;
        for engine in self.engines.values() {
            if engine.enabled && engine.health > 0.0 {
                total_thrust += engine.thrust * (engine.health / engine.max_health);
            }
        }
        total_thrust *= self.throttle.clamp(-1.0, 1.0);

        let forward = self.rotation.forward();
        let accel = forward.scale(total_thrust / self.mass);

        self.velocity = self.velocity.add(&accel.scale(dt));
        self.velocity = self.velocity.scale(LINEAR_DRAG);

        let speed = self.velocity.length();
        if speed > self.max_speed {
            self.velocity = self.velocity.scale(self.max_speed / speed);
        }

        self.position = self.position.add(&self.velocity.scale(dt));

        self.angular_velocity = self.angular_velocity.scale(ANGULAR_DRAG);

        // Axis is omega/theta with theta = |omega|*dt: the magnitude carries a
        // 1/dt factor the turn-rate constants are tuned against. Keep as is.
        let theta = self.angular_velocity.length() * dt;
        if theta > 1e-3 {
            let axis = self.angular_velocity.scale(1.0 / theta);
            let delta = Quaternion::from_axis_angle(axis, theta);
            self.rotation = delta.multiply(&self.rotation).normalized();
        }
    }

    fn update_power(&mut self, dt: f64) {
        let mut consumption = 0.0;
        for engine in self.engines.values() {
            if engine.enabled {
                consumption += engine.power_draw;
            }
        }
        for weapon in self.weapons.values() {
            if weapon.enabled {
                consumption += weapon.power_draw;
            }
        }
        if self.shields.enabled {
            consumption += self.shields.power_draw;
        }
        for subsystem in self.subsystems.values() {
            if subsystem.enabled {
                consumption += subsystem.power_draw;
            }
        }

        self.power.consumption = consumption;
        self.power.current_capacity = (self.power.current_capacity
            + (self.power.generation - consumption) * dt)
            .clamp(0.0, self.power.max_capacity);
    }

    fn update_shields(&mut self, dt: f64) {
        if !self.shields.enabled {
            return;
        }
        let recharge = self.shields.recharge_rate;
        for emitter in self.shields.emitters.values_mut() {
            if emitter.health > 0.0 && emitter.strength < emitter.max_strength {
                emitter.strength = (emitter.strength + recharge * dt).min(emitter.max_strength);
            }
        }
    }

    fn update_weapons(&mut self, dt: f64) {
        for weapon in self.weapons.values_mut() {
            if weapon.cooldown > 0.0 {
                weapon.cooldown = (weapon.cooldown - dt).max(0.0);
            }
        }
    }

    fn update_fire_decay(&mut self, dt: f64) {
        let burn = FIRE_DAMAGE_PER_SEC * dt;
        for engine in self.engines.values_mut() {
            if engine.on_fire {
                SystemRefMut::Engine(engine).burn(burn);
            }
        }
        for weapon in self.weapons.values_mut() {
            if weapon.on_fire {
                SystemRefMut::Weapon(weapon).burn(burn);
            }
        }
        for emitter in self.shields.emitters.values_mut() {
            if emitter.on_fire {
                SystemRefMut::Emitter(emitter).burn(burn);
            }
        }
        for section in self.hull.sections.values_mut() {
            if section.on_fire {
                SystemRefMut::Hull(section).burn(burn);
            }
        }
        for subsystem in self.subsystems.values_mut() {
            if subsystem.on_fire {
                SystemRefMut::Subsystem(subsystem).burn(burn);
            }
        }
    }

    fn update_life_support(&mut self, dt: f64) {
        for comp in self.life_support.compartments.values_mut() {
            if comp.breached {
                comp.pressure = (comp.pressure - 10.0 * dt).max(0.0);
                comp.oxygen = (comp.oxygen - 2.0 * dt).max(0.0);
            }
            if comp.on_fire {
                comp.oxygen = (comp.oxygen - 0.5 * dt).max(0.0);
                comp.temperature += 10.0 * dt;
            }
        }
    }

    pub fn take_damage(&mut self, amount: f64, location: &str) {
        let location = if location.is_empty() { "forward" } else { location };
        let mut amount = amount;

        if let Some(emitter) = self.shields.emitters.get_mut(location) {
            if emitter.strength > 0.0 {
                emitter.strength -= amount;
                if emitter.strength < 0.0 {
                    amount = -emitter.strength;
                    emitter.strength = 0.0;
                } else {
                    return;
                }
            }
        }

        if let Some(section) = self.hull.sections.get_mut(location) {
            if section.armor > 0.0 {
                section.armor = (section.armor - amount * 0.5).max(0.0);
            }
            section.health -= amount;
            if section.health <= 0.0 {
                section.health = 0.0;
                section.breached = true;
            }
        }
    }

    /// Uniform lookup across the component maps, for damage/repair paths
    pub fn system_mut(&mut self, kind: SystemKind, id: &str) -> Option<SystemRefMut<'_>> {
        match kind {
            SystemKind::Engine => self.engines.get_mut(id).map(SystemRefMut::Engine),
            SystemKind::Weapon => self.weapons.get_mut(id).map(SystemRefMut::Weapon),
            SystemKind::Shield => self.shields.emitters.get_mut(id).map(SystemRefMut::Emitter),
            SystemKind::Hull => self.hull.sections.get_mut(id).map(SystemRefMut::Hull),
            SystemKind::Subsystem => self.subsystems.get_mut(id).map(SystemRefMut::Subsystem),
        }
    }

    /// Aggregate hull integrity in [0, 1]; 1.0 for a hull with no sections
    pub fn hull_fraction(&self) -> f64 {
        let mut total = 0.0;
        let mut max = 0.0;
        for section in self.hull.sections.values() {
            total += section.health;
            max += section.max_health;
        }
        if max == 0.0 {
            return 1.0;
        }
        total / max
    }

    /// Aggregate shield strength in [0, 1]; 0.0 with no emitters
    pub fn shield_fraction(&self) -> f64 {
        let mut total = 0.0;
        let mut max = 0.0;
        for emitter in self.shields.emitters.values() {
            total += emitter.strength;
            max += emitter.max_strength;
        }
        if max == 0.0 {
            return 0.0;
        }
        total / max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        EmitterConfig, EngineConfig, HullSectionConfig, ShieldConfig, ShipClass, WeaponConfig,
    };

    fn test_class() -> ShipClass {
        ShipClass {
            id: "test_ship".into(),
            name: "Test Ship".into(),
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
            hull: crate::config::HullConfig {
                sections: vec![HullSectionConfig {
                    id: "forward".into(),
                    armor: 200.0,
                    health: 500.0,
                }],
            },
            subsystems: vec![],
            launch_bays: vec![],
        }
    }

    #[test]
    fn new_player_ship_has_full_crew() {
        let ship = Ship::new("ship_1", "test_ship", "Test", &test_class(), true);
        ship.with_state(|s| {
            assert_eq!(s.crew.len(), 8);
            assert_eq!(s.life_support.compartments.len(), 5);
            assert_eq!(s.throttle, 1.0);
        });
    }

    #[test]
    fn npc_ship_has_no_crew() {
        let ship = Ship::new("ship_1", "test_ship", "Test", &test_class(), false);
        ship.with_state(|s| assert!(s.crew.is_empty()));
    }

    #[test]
    fn single_tick_accelerates_forward() {
        // One engine, thrust 50000, mass 100000, forward = +Z:
        // v.z = (50000/100000)*0.1*0.98 = 0.049, pos.z = v.z * dt
        let ship = Ship::new("ship_1", "test_ship", "Test", &test_class(), false);
        ship.update(0.1);
        ship.with_state(|s| {
            assert!((s.velocity.z - 0.049).abs() < 1e-9, "velocity.z = {}", s.velocity.z);
            assert!((s.position.z - 0.049 * 0.1).abs() < 1e-9);
            assert!((s.rotation.magnitude() - 1.0).abs() < 1e-4);
        });
    }

    #[test]
    fn speed_clamped_to_max() {
        let ship = Ship::new("ship_1", "test_ship", "Test", &test_class(), false);
        ship.with_state_mut(|s| s.velocity = Vector3::new(0.0, 0.0, 5000.0));
        ship.update(0.1);
        ship.with_state(|s| assert!(s.velocity.length() <= s.max_speed + 1e-9));
    }

    #[test]
    fn zero_throttle_coasts() {
        let ship = Ship::new("ship_1", "test_ship", "Test", &test_class(), false);
        ship.set_throttle(0.0);
        ship.update(0.1);
        ship.with_state(|s| assert_eq!(s.velocity.z, 0.0));
    }

    #[test]
    fn throttle_clamps_input() {
        let ship = Ship::new("ship_1", "test_ship", "Test", &test_class(), false);
        ship.set_throttle(7.5);
        ship.with_state(|s| assert_eq!(s.throttle, 1.0));
    }

    #[test]
    fn damage_absorbed_by_shield_then_hull() {
        // Shield 500, section health 500 armor 200, 600 damage at forward:
        // emitter to 0, hull takes 100 -> armor 150, health 400, no breach
        let ship = Ship::new("ship_1", "test_ship", "Test", &test_class(), false);
        ship.take_damage(600.0, "forward");
        ship.with_state(|s| {
            assert_eq!(s.shields.emitters["forward"].strength, 0.0);
            let section = &s.hull.sections["forward"];
            assert_eq!(section.armor, 150.0);
            assert_eq!(section.health, 400.0);
            assert!(!section.breached);
        });
    }

    #[test]
    fn shield_fully_absorbs_small_hit() {
        let ship = Ship::new("ship_1", "test_ship", "Test", &test_class(), false);
        ship.take_damage(100.0, "forward");
        ship.with_state(|s| {
            assert_eq!(s.shields.emitters["forward"].strength, 400.0);
            assert_eq!(s.hull.sections["forward"].health, 500.0);
        });
    }

    #[test]
    fn hull_depleted_marks_breach() {
        let ship = Ship::new("ship_1", "test_ship", "Test", &test_class(), false);
        ship.take_damage(500.0, "forward"); // drains shield
        ship.take_damage(600.0, "forward");
        ship.with_state(|s| {
            let section = &s.hull.sections["forward"];
            assert_eq!(section.health, 0.0);
            assert!(section.breached);
        });
    }

    #[test]
    fn empty_location_defaults_to_forward() {
        let ship = Ship::new("ship_1", "test_ship", "Test", &test_class(), false);
        ship.take_damage(100.0, "");
        ship.with_state(|s| assert_eq!(s.shields.emitters["forward"].strength, 400.0));
    }

    #[test]
    fn torpedo_fire_consumes_ammo_and_unloads() {
        let ship = Ship::new("ship_1", "test_ship", "Test", &test_class(), false);
        ship.with_state_mut(|s| {
            let w = s.weapons.get_mut("torpedo_bay_1").unwrap();
            w.armed = true;
            w.loaded = true;
            w.locked = true;
        });

        assert!(ship.fire_weapon("torpedo_bay_1", "target_1"));
        ship.with_state(|s| {
            let w = &s.weapons["torpedo_bay_1"];
            assert_eq!(w.ammo_count, 9);
            assert!(!w.loaded);
            assert_eq!(w.cooldown, w.cooldown_time);
            assert_eq!(s.target_id.as_deref(), Some("target_1"));
        });

        // Second shot fails: unloaded and on cooldown
        assert!(!ship.fire_weapon("torpedo_bay_1", "target_1"));
    }

    #[test]
    fn torpedo_fire_requires_readiness() {
        let ship = Ship::new("ship_1", "test_ship", "Test", &test_class(), false);
        assert!(!ship.fire_weapon("torpedo_bay_1", "target_1"));
        assert!(!ship.fire_weapon("missing_weapon", "target_1"));
    }

    #[test]
    fn phaser_fire_only_needs_cooldown_and_health() {
        let ship = Ship::new("ship_1", "test_ship", "Test", &test_class(), false);
        assert!(ship.fire_weapon("phaser_1", "target_1"));
        assert!(!ship.fire_weapon("phaser_1", "target_1"));
    }

    #[test]
    fn cooldown_ticks_down_to_zero() {
        let ship = Ship::new("ship_1", "test_ship", "Test", &test_class(), false);
        assert!(ship.fire_weapon("phaser_1", "t"));
        for _ in 0..30 {
            ship.update(0.1);
        }
        ship.with_state(|s| assert_eq!(s.weapons["phaser_1"].cooldown, 0.0));
    }

    #[test]
    fn fire_burns_health_each_tick() {
        let ship = Ship::new("ship_1", "test_ship", "Test", &test_class(), false);
        ship.with_state_mut(|s| s.engines.get_mut("main_1").unwrap().on_fire = true);
        ship.update(0.1);
        ship.with_state(|s| {
            assert!((s.engines["main_1"].health - 99.5).abs() < 1e-9);
        });
    }

    #[test]
    fn breached_compartment_vents() {
        let ship = Ship::new("ship_1", "test_ship", "Test", &test_class(), false);
        ship.with_state_mut(|s| {
            s.life_support.compartments.get_mut("bridge").unwrap().breached = true;
        });
        ship.update(0.1);
        ship.with_state(|s| {
            let comp = &s.life_support.compartments["bridge"];
            assert!((comp.pressure - 100.3).abs() < 1e-9);
            assert!((comp.oxygen - 20.8).abs() < 1e-9);
        });
    }

    #[test]
    fn burning_compartment_heats_up() {
        let ship = Ship::new("ship_1", "test_ship", "Test", &test_class(), false);
        ship.with_state_mut(|s| {
            s.life_support.compartments.get_mut("bridge").unwrap().on_fire = true;
        });
        ship.update(0.1);
        ship.with_state(|s| {
            let comp = &s.life_support.compartments["bridge"];
            assert!((comp.temperature - 21.0).abs() < 1e-9);
            assert!((comp.oxygen - 20.95).abs() < 1e-9);
        });
    }

    #[test]
    fn shields_recharge_toward_max() {
        let ship = Ship::new("ship_1", "test_ship", "Test", &test_class(), false);
        ship.take_damage(100.0, "forward");
        ship.update(0.1);
        ship.with_state(|s| {
            assert!((s.shields.emitters["forward"].strength - 401.0).abs() < 1e-9);
        });
    }

    #[test]
    fn power_drains_under_load() {
        let ship = Ship::new("ship_1", "test_ship", "Test", &test_class(), false);
        ship.update(1.0);
        ship.with_state(|s| {
            // engine 100 + phaser 50 + torpedo 20 + shields 100 = 270 draw vs 1000 gen
            assert_eq!(s.power.consumption, 270.0);
            assert_eq!(s.power.current_capacity, s.power.max_capacity);
        });
    }

    #[test]
    fn rotation_integrates_angular_velocity() {
        let ship = Ship::new("ship_1", "test_ship", "Test", &test_class(), false);
        ship.apply_rotation(0.0, 1.0, 0.0);
        ship.update(0.1);
        ship.with_state(|s| {
            assert!(s.rotation != Quaternion::IDENTITY);
            assert!((s.rotation.magnitude() - 1.0).abs() < 1e-4);
            // angular drag applied
            assert!((s.angular_velocity.y - 0.95).abs() < 1e-9);
        });
    }
}
