//! Typed damage resolution, cascading failures and repair
//!
//! Wraps the ship's plain damage absorption with damage-type side effects
//! (fires, overloads, splash) and the cascade that follows a section
//! reaching zero health. All probability draws come from the controller's
//! seeded RNG so a given seed replays identically.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand::SeedableRng;
use tracing::info;

use crate::ship::{Ship, ShipState, SystemKind};

/// Damage categories carried by weapons, hazards and GM commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageKind {
    Kinetic,
    Energy,
    Explosive,
}

impl DamageKind {
    pub fn parse(s: &str) -> Option<DamageKind> {
        match s {
            "kinetic" => Some(DamageKind::Kinetic),
            "energy" => Some(DamageKind::Energy),
            "explosive" => Some(DamageKind::Explosive),
            _ => None,
        }
    }
}

/// Hull locations reachable by splash damage from `location`. The graph
/// is undirected: every entry here appears in its neighbors' entries too.
pub fn adjacent_locations(location: &str) -> &'static [&'static str] {
    match location {
        "forward" => &["port", "starboard", "bridge", "dorsal", "ventral", "weapons_bay"],
        "aft" => &["port", "starboard", "engineering", "dorsal", "ventral"],
        "port" => &["forward", "aft"],
        "starboard" => &["forward", "aft"],
        "dorsal" => &["forward", "aft"],
        "ventral" => &["forward", "aft"],
        "bridge" => &["forward"],
        "engineering" => &["aft"],
        "weapons_bay" => &["forward"],
        _ => &[],
    }
}

pub struct DamageController {
    rng: ChaCha8Rng,
}

impl DamageController {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Apply damage of the given kind at a hull location, then run the
    /// cascading-failure check for that location.
    pub fn apply(&mut self, ship: &Ship, amount: f64, location: &str, kind: Option<DamageKind>) {
        let location = if location.is_empty() { "forward" } else { location };
        let rng = &mut self.rng;

        ship.with_state_mut(|state| {
            match kind {
                Some(DamageKind::Kinetic) => {
                    state.take_damage(amount, location);
                    if rng.gen::<f64>() < 0.3 {
                        start_fire(state, &ship.id, location);
                    }
                }
                Some(DamageKind::Energy) => {
                    state.take_damage(amount * 1.5, location);
                    if rng.gen::<f64>() < 0.2 {
                        overload_subsystems(state, &ship.id, rng);
                    }
                }
                Some(DamageKind::Explosive) => {
                    state.take_damage(amount, location);
                    for adjacent in adjacent_locations(location) {
                        state.take_damage(amount * 0.5, adjacent);
                    }
                    if rng.gen::<f64>() < 0.5 {
                        start_fire(state, &ship.id, location);
                    }
                }
                None => state.take_damage(amount, location),
            }

            check_cascading_failures(state, &ship.id, location, rng);
        });
    }

    pub fn extinguish_fire(&self, ship: &Ship, location: &str) {
        ship.with_state_mut(|state| {
            if let Some(section) = state.hull.sections.get_mut(location) {
                section.on_fire = false;
            }
            if let Some(comp) = state.life_support.compartments.get_mut(location) {
                comp.on_fire = false;
            }
        });
        info!(ship_id = %ship.id, location, "fire extinguished");
    }

    pub fn seal_breach(&self, ship: &Ship, location: &str) {
        ship.with_state_mut(|state| {
            if let Some(comp) = state.life_support.compartments.get_mut(location) {
                comp.breached = false;
            }
            if let Some(section) = state.hull.sections.get_mut(location) {
                section.breached = false;
            }
        });
        info!(ship_id = %ship.id, location, "breach sealed");
    }

    /// Restore health on any health-bearing system, clamped to its maximum
    pub fn repair(&self, ship: &Ship, kind: SystemKind, system_id: &str, amount: f64) -> bool {
        let repaired = ship.with_state_mut(|state| match state.system_mut(kind, system_id) {
            Some(mut system) => {
                system.repair(amount);
                true
            }
            None => false,
        });
        if repaired {
            info!(ship_id = %ship.id, system_id, "system repaired");
        }
        repaired
    }

    /// Refill a compartment's atmosphere; a breached compartment cannot hold it
    pub fn restore_pressure(&self, ship: &Ship, location: &str) {
        ship.with_state_mut(|state| {
            if let Some(comp) = state.life_support.compartments.get_mut(location) {
                if !comp.breached {
                    comp.pressure = comp.max_pressure;
                    comp.oxygen = comp.max_oxygen;
                }
            }
        });
    }
}

fn start_fire(state: &mut ShipState, ship_id: &str, location: &str) {
    if let Some(section) = state.hull.sections.get_mut(location) {
        section.on_fire = true;
        info!(ship_id, location, "fire started");
    }
    if let Some(comp) = state.life_support.compartments.get_mut(location) {
        comp.on_fire = true;
    }
}

fn overload_subsystems(state: &mut ShipState, ship_id: &str, rng: &mut ChaCha8Rng) {
    for subsystem in state.subsystems.values_mut() {
        if rng.gen::<f64>() < 0.1 {
            subsystem.health = (subsystem.health - 20.0).max(0.0);
            if subsystem.health <= 0.0 {
                subsystem.enabled = false;
            }
            info!(ship_id, subsystem_id = %subsystem.id, "system overload");
        }
    }
}

fn check_cascading_failures(
    state: &mut ShipState,
    ship_id: &str,
    location: &str,
    rng: &mut ChaCha8Rng,
) {
    let (depleted, burning) = match state.hull.sections.get(location) {
        Some(section) => (section.health <= 0.0 && !section.breached, section.on_fire),
        None => return,
    };

    if depleted {
        if let Some(section) = state.hull.sections.get_mut(location) {
            section.breached = true;
        }
        info!(ship_id, location, "hull breach");

        if let Some(comp) = state.life_support.compartments.get_mut(location) {
            comp.breached = true;
        }

        for adjacent in adjacent_locations(location) {
            if let Some(comp) = state.life_support.compartments.get_mut(*adjacent) {
                if rng.gen::<f64>() < 0.3 {
                    comp.pressure = (comp.pressure - 20.0).max(0.0);
                    info!(ship_id, compartment = adjacent, "pressure drop");
                }
            }
        }
    }

    if burning {
        for adjacent in adjacent_locations(location) {
            if rng.gen::<f64>() < 0.1 {
                start_fire(state, ship_id, adjacent);
            }
        }
    }
}
