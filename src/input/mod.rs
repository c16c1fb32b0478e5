//! Action router - maps station intents to ship mutations
//!
//! Intents arrive as `(role, system, action, value)` tuples. The action
//! field is a two-part `domain.verb` name; dispatch is keyed on
//! `role.domain.verb`, while `system` carries the argument (breaker id,
//! weapon id, hull location). Every handler operates on the single player
//! ship.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::info;

use crate::error::{GameError, GameResult};
use crate::ship::{Ship, SystemKind, WeaponKind};
use crate::sim::simulator::TORPEDO_LAUNCH_SPEED;
use crate::sim::{DamageController, Simulator};

/// Hull repair applied per damage-control request
const REPAIR_AMOUNT: f64 = 25.0;

/// A station intent, decoded from either transport
#[derive(Debug, Clone)]
pub struct Action {
    pub role: String,
    pub system: String,
    pub action: String,
    pub value: Value,
}

pub struct ActionRouter {
    simulator: Arc<Simulator>,
    damage: Arc<Mutex<DamageController>>,
}

impl ActionRouter {
    pub fn new(simulator: Arc<Simulator>, damage: Arc<Mutex<DamageController>>) -> Self {
        Self { simulator, damage }
    }

    /// Dispatch an intent to its handler. Unknown keys are a NotFound
    /// error; handlers report their own precondition failures.
    pub fn route(&self, action: &Action) -> GameResult<()> {
        let key = format!("{}.{}", action.role, action.action);
        info!(key = %key, system = %action.system, "routing action");

        match key.as_str() {
            "engineer.power.toggle_breaker" => self.toggle_breaker(action),
            "engineer.damage.repair" => self.repair(action),
            "engineer.damage.extinguish_fire" => self.extinguish_fire(action),
            "engineer.damage.seal_breach" => self.seal_breach(action),

            "flight.thrust.set" => self.set_thrust(action),
            "flight.rotation.set" => self.set_rotation(action),
            "flight.docking.release" => self.release_docking(),

            "weapons.torpedo.arm" => self.arm_torpedo(action),
            "weapons.torpedo.load" => self.load_torpedo(action),
            "weapons.torpedo.lock" => self.lock_torpedo(action),
            "weapons.torpedo.fire" => self.fire_torpedo(action),
            "weapons.phaser.fire" => self.fire_phaser(action),
            "weapons.target.set" => self.set_target(action),

            "captain.alert.set" => acknowledge("alert level", action),
            "captain.order.issue" => acknowledge("captain order", action),

            "comms.hail.send" => acknowledge("hail", action),
            "comms.message.send" => acknowledge("message", action),

            "operations.power.route" => {
                info!(system = %action.system, "routing power");
                Ok(())
            }
            "operations.shields.toggle" => self.toggle_shields(action),

            "relay.scan.initiate" => acknowledge("scan target", action),
            "relay.sensors.set_mode" => acknowledge("sensor mode", action),

            "first_officer.system.toggle" => self.toggle_subsystem(action),

            _ => Err(GameError::NotFound(format!("no handler for action: {key}"))),
        }
    }

    fn player_ship(&self) -> GameResult<Arc<Ship>> {
        self.simulator
            .player_ship()
            .ok_or_else(|| GameError::NotFound("no player ship".to_string()))
    }

    fn toggle_breaker(&self, action: &Action) -> GameResult<()> {
        let ship = self.player_ship()?;
        let enabled = as_bool(&action.value)?;
        let breaker_id = &action.system;

        ship.with_state_mut(|s| match s.power.breakers.get_mut(breaker_id) {
            Some(breaker) => {
                breaker.enabled = enabled;
                info!(breaker_id = %breaker_id, enabled, "breaker toggled");
                Ok(())
            }
            None => Err(GameError::NotFound(format!("breaker {breaker_id}"))),
        })
    }

    fn repair(&self, action: &Action) -> GameResult<()> {
        let ship = self.player_ship()?;
        let location = &action.system;
        let damage = self.damage.lock().unwrap_or_else(|e| e.into_inner());
        if !damage.repair(&ship, SystemKind::Hull, location, REPAIR_AMOUNT) {
            return Err(GameError::NotFound(format!("hull section {location}")));
        }
        Ok(())
    }

    fn extinguish_fire(&self, action: &Action) -> GameResult<()> {
        let ship = self.player_ship()?;
        let damage = self.damage.lock().unwrap_or_else(|e| e.into_inner());
        damage.extinguish_fire(&ship, &action.system);
        Ok(())
    }

    fn seal_breach(&self, action: &Action) -> GameResult<()> {
        let ship = self.player_ship()?;
        let damage = self.damage.lock().unwrap_or_else(|e| e.into_inner());
        damage.seal_breach(&ship, &action.system);
        Ok(())
    }

    fn set_thrust(&self, action: &Action) -> GameResult<()> {
        let ship = self.player_ship()?;
        let throttle = as_f64(&action.value)?;
        ship.set_throttle(throttle);
        Ok(())
    }

    fn set_rotation(&self, action: &Action) -> GameResult<()> {
        let ship = self.player_ship()?;
        let obj = action
            .value
            .as_object()
            .ok_or_else(|| GameError::Precondition("invalid rotation value".to_string()))?;

        let axis = |key: &str| obj.get(key).and_then(Value::as_f64).unwrap_or(0.0);
        ship.apply_rotation(axis("pitch"), axis("yaw"), axis("roll"));
        Ok(())
    }

    fn release_docking(&self) -> GameResult<()> {
        let ship = self.player_ship()?;
        ship.with_state_mut(|s| s.docked = false);
        info!("docking clamps released");
        Ok(())
    }

    fn arm_torpedo(&self, action: &Action) -> GameResult<()> {
        let ship = self.player_ship()?;
        let armed = as_bool(&action.value)?;
        let weapon_id = &action.system;

        ship.with_state_mut(|s| match s.weapons.get_mut(weapon_id) {
            Some(weapon) => {
                weapon.armed = armed;
                info!(weapon_id = %weapon_id, armed, "torpedo armed state set");
                Ok(())
            }
            None => Err(GameError::NotFound(format!("weapon {weapon_id}"))),
        })
    }

    fn load_torpedo(&self, action: &Action) -> GameResult<()> {
        let ship = self.player_ship()?;
        let weapon_id = &action.system;

        ship.with_state_mut(|s| match s.weapons.get_mut(weapon_id) {
            Some(weapon) => {
                if weapon.ammo_count == 0 {
                    return Err(GameError::Precondition("no torpedoes remaining".to_string()));
                }
                weapon.loaded = true;
                info!(weapon_id = %weapon_id, "torpedo loaded");
                Ok(())
            }
            None => Err(GameError::NotFound(format!("weapon {weapon_id}"))),
        })
    }

    fn lock_torpedo(&self, action: &Action) -> GameResult<()> {
        let ship = self.player_ship()?;
        let locked = as_bool(&action.value)?;
        let weapon_id = &action.system;

        ship.with_state_mut(|s| match s.weapons.get_mut(weapon_id) {
            Some(weapon) => {
                weapon.locked = locked;
                info!(weapon_id = %weapon_id, locked, "torpedo lock set");
                Ok(())
            }
            None => Err(GameError::NotFound(format!("weapon {weapon_id}"))),
        })
    }

    fn fire_torpedo(&self, action: &Action) -> GameResult<()> {
        let ship = self.player_ship()?;
        let weapon_id = &action.system;

        // Validate before firing so failures carry a reason
        let (damage, target_id) = ship.with_state(|s| {
            let weapon = s
                .weapons
                .get(weapon_id)
                .ok_or_else(|| GameError::NotFound(format!("weapon {weapon_id}")))?;
            if !weapon.armed || !weapon.loaded || !weapon.locked {
                return Err(GameError::Precondition("torpedo not ready to fire".to_string()));
            }
            if weapon.cooldown > 0.0 {
                return Err(GameError::Precondition("torpedo on cooldown".to_string()));
            }
            let target_id = s
                .target_id
                .clone()
                .ok_or_else(|| GameError::Precondition("no target set".to_string()))?;
            Ok((weapon.damage, target_id))
        })?;

        if !ship.fire_weapon(weapon_id, &target_id) {
            return Err(GameError::Precondition("failed to fire torpedo".to_string()));
        }

        let (position, velocity) = ship.with_state(|s| {
            let muzzle = s.rotation.forward().scale(TORPEDO_LAUNCH_SPEED);
            (s.position, s.velocity.add(&muzzle))
        });
        self.simulator.spawn_projectile(
            "torpedo",
            &ship.id,
            Some(target_id.clone()),
            position,
            velocity,
            damage,
        );

        info!(weapon_id = %weapon_id, target_id = %target_id, "torpedo fired");
        Ok(())
    }

    fn fire_phaser(&self, action: &Action) -> GameResult<()> {
        let ship = self.player_ship()?;
        let weapon_id = &action.system;

        let (damage, target_id) = ship.with_state(|s| {
            let weapon = s
                .weapons
                .get(weapon_id)
                .ok_or_else(|| GameError::NotFound(format!("weapon {weapon_id}")))?;
            if weapon.kind != WeaponKind::Phaser {
                return Err(GameError::Precondition(format!("{weapon_id} is not a phaser")));
            }
            if weapon.cooldown > 0.0 {
                return Err(GameError::Precondition("phaser on cooldown".to_string()));
            }
            let target_id = s
                .target_id
                .clone()
                .ok_or_else(|| GameError::Precondition("no target set".to_string()))?;
            Ok((weapon.damage, target_id))
        })?;

        let target = self
            .simulator
            .get_ship(&target_id)
            .ok_or_else(|| GameError::NotFound(format!("target {target_id}")))?;

        if !ship.fire_weapon(weapon_id, &target_id) {
            return Err(GameError::Precondition("failed to fire phaser".to_string()));
        }
        target.take_damage(damage, "forward");

        info!(weapon_id = %weapon_id, target_id = %target_id, damage, "phaser fired");
        Ok(())
    }

    fn set_target(&self, action: &Action) -> GameResult<()> {
        let ship = self.player_ship()?;
        let target_id = as_str(&action.value)?;
        ship.with_state_mut(|s| s.target_id = Some(target_id.to_string()));
        info!(target_id = %target_id, "target set");
        Ok(())
    }

    fn toggle_shields(&self, action: &Action) -> GameResult<()> {
        let ship = self.player_ship()?;
        let enabled = as_bool(&action.value)?;
        ship.with_state_mut(|s| s.shields.enabled = enabled);
        info!(enabled, "shields toggled");
        Ok(())
    }

    fn toggle_subsystem(&self, action: &Action) -> GameResult<()> {
        let ship = self.player_ship()?;
        let enabled = as_bool(&action.value)?;
        let system_id = &action.system;

        ship.with_state_mut(|s| match s.subsystems.get_mut(system_id) {
            Some(subsystem) => {
                subsystem.enabled = enabled;
                info!(system_id = %system_id, enabled, "subsystem toggled");
                Ok(())
            }
            None => Err(GameError::NotFound(format!("subsystem {system_id}"))),
        })
    }
}

/// Log-only handlers for orders that have no ship-state effect
fn acknowledge(what: &str, action: &Action) -> GameResult<()> {
    let value = as_str(&action.value)?;
    info!(value = %value, "{what}");
    Ok(())
}

fn as_bool(value: &Value) -> GameResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| GameError::Precondition("invalid boolean value".to_string()))
}

fn as_f64(value: &Value) -> GameResult<f64> {
    value
        .as_f64()
        .ok_or_else(|| GameError::Precondition("invalid numeric value".to_string()))
}

fn as_str(value: &Value) -> GameResult<&str> {
    value
        .as_str()
        .ok_or_else(|| GameError::Precondition("invalid string value".to_string()))
}
