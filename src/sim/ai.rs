//! AI controller - finite-state machine for non-player ships
//!
//! One controller per NPC. Each tick it dispatches on its state, steers the
//! ship through the same guarded interface players use, applies phaser
//! damage directly, and hands torpedo launches back to the simulator as
//! intents so the projectile is spawned under the world lock.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::ship::{Ship, Vector3, WeaponKind};

/// Detection radius for hostile contacts
const THREAT_RANGE: f64 = 5000.0;
/// Preferred engagement distance
const OPTIMAL_RANGE: f64 = 1000.0;
/// Maximum phaser engagement distance
const PHASER_RANGE: f64 = 2000.0;
/// Distance at which a retreating ship feels safe
const DISENGAGE_RANGE: f64 = 8000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiState {
    Patrol,
    Combat,
    Evade,
    Retreat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TacticalMode {
    Aggressive,
    Defensive,
    Balanced,
}

/// Torpedo launch intent handed back to the simulator
#[derive(Debug, Clone)]
pub struct TorpedoLaunch {
    pub weapon_id: String,
    pub target_id: String,
    pub damage: f64,
}

pub struct AiController {
    pub state: AiState,
    pub target_id: Option<String>,
    pub difficulty: f64,
    pub aggression: f64,
    pub tactical_mode: TacticalMode,
}

impl Default for AiController {
    fn default() -> Self {
        Self::new()
    }
}

/// Pose and weapon facts sampled once per tick under a single read lock
struct OwnView {
    position: Vector3,
    forward: Vector3,
    hull_fraction: f64,
    shield_fraction: f64,
    phasers: Vec<(String, f64)>,
    torpedoes: Vec<(String, f64)>,
}

impl AiController {
    pub fn new() -> Self {
        Self {
            state: AiState::Patrol,
            target_id: None,
            difficulty: 1.0,
            aggression: 0.5,
            tactical_mode: TacticalMode::Balanced,
        }
    }

    pub fn set_difficulty(&mut self, difficulty: f64) {
        self.difficulty = difficulty.max(0.0);
    }

    pub fn set_tactical_mode(&mut self, mode: TacticalMode) {
        self.tactical_mode = mode;
        self.aggression = match mode {
            TacticalMode::Aggressive => 1.0,
            TacticalMode::Defensive => 0.2,
            TacticalMode::Balanced => 0.5,
        };
    }

    /// Advance the FSM for one tick and return torpedo launch intents
    pub fn update(
        &mut self,
        _dt: f64,
        ship: &Arc<Ship>,
        ships: &BTreeMap<String, Arc<Ship>>,
        rng: &mut ChaCha8Rng,
    ) -> Vec<TorpedoLaunch> {
        let view = Self::sample(ship);
        let mut launches = Vec::new();

        match self.state {
            AiState::Patrol => self.update_patrol(ship, &view, ships),
            AiState::Combat => self.update_combat(ship, &view, ships, rng, &mut launches),
            AiState::Evade => self.update_evade(ship, &view, ships, rng),
            AiState::Retreat => self.update_retreat(ship, &view, ships),
        }

        self.evaluate_health(ship, &view, rng);
        launches
    }

    fn sample(ship: &Arc<Ship>) -> OwnView {
        ship.with_state(|s| {
            let mut phasers = Vec::new();
            let mut torpedoes = Vec::new();
            for (id, weapon) in &s.weapons {
                if weapon.health <= 0.0 || weapon.cooldown > 0.0 {
                    continue;
                }
                match weapon.kind {
                    WeaponKind::Phaser => phasers.push((id.clone(), weapon.damage)),
                    WeaponKind::Torpedo => {
                        if weapon.ammo_count > 0 {
                            torpedoes.push((id.clone(), weapon.damage));
                        }
                    }
                }
            }
            OwnView {
                position: s.position,
                forward: s.rotation.forward(),
                hull_fraction: s.hull_fraction(),
                shield_fraction: s.shield_fraction(),
                phasers,
                torpedoes,
            }
        })
    }

    fn update_patrol(
        &mut self,
        ship: &Arc<Ship>,
        view: &OwnView,
        ships: &BTreeMap<String, Arc<Ship>>,
    ) {
        ship.set_throttle(0.3);
        ship.apply_rotation(0.0, 0.1 * self.difficulty, 0.0);

        if let Some((threat_id, dist)) = self.nearest_threat(ship, view, ships) {
            if dist < THREAT_RANGE {
                self.state = AiState::Combat;
                self.target_id = Some(threat_id.clone());
                debug!(ship_id = %ship.id, target_id = %threat_id, "entering combat");
            }
        }
    }

    fn update_combat(
        &mut self,
        ship: &Arc<Ship>,
        view: &OwnView,
        ships: &BTreeMap<String, Arc<Ship>>,
        rng: &mut ChaCha8Rng,
        launches: &mut Vec<TorpedoLaunch>,
    ) {
        let Some(target) = self.target_id.as_ref().and_then(|id| ships.get(id)) else {
            self.state = AiState::Patrol;
            self.target_id = None;
            return;
        };

        let target_pos = target.with_state(|s| s.position);
        let dist = view.position.sub(&target_pos).length();
        let to_target = target_pos.sub(&view.position).normalized();
        let dot = to_target.dot(&view.forward);

        let turn_rate = 0.5 * self.difficulty;
        if dot < 0.9 {
            ship.apply_rotation(to_target.y * turn_rate, to_target.x * turn_rate, 0.0);
        }

        if dist > OPTIMAL_RANGE * 1.5 {
            ship.set_throttle(0.8);
        } else if dist < OPTIMAL_RANGE * 0.5 {
            ship.set_throttle(-0.5);
        } else {
            ship.set_throttle(0.3);
        }

        if dot > 0.95 && dist < PHASER_RANGE {
            self.attempt_phaser(ship, view, target);
        }

        if rng.gen::<f64>() < 0.1 * self.aggression {
            self.attempt_torpedo(ship, view, target, launches);
        }
    }

    fn update_evade(
        &mut self,
        ship: &Arc<Ship>,
        view: &OwnView,
        ships: &BTreeMap<String, Arc<Ship>>,
        rng: &mut ChaCha8Rng,
    ) {
        let Some(target) = self.target_id.as_ref().and_then(|id| ships.get(id)) else {
            self.state = AiState::Patrol;
            self.target_id = None;
            return;
        };

        let target_pos = target.with_state(|s| s.position);
        let away = view.position.sub(&target_pos).normalized();

        ship.set_throttle(1.0);
        let roll = rng.gen::<f64>() * 0.2 - 0.1;
        ship.apply_rotation(away.y * 0.5, away.x * 0.5, roll);

        if rng.gen::<f64>() < 0.3 {
            self.state = AiState::Combat;
        }
    }

    fn update_retreat(
        &mut self,
        ship: &Arc<Ship>,
        view: &OwnView,
        ships: &BTreeMap<String, Arc<Ship>>,
    ) {
        ship.set_throttle(1.0);

        let dist = self
            .target_id
            .as_ref()
            .and_then(|id| ships.get(id))
            .map(|target| {
                let target_pos = target.with_state(|s| s.position);
                view.position.sub(&target_pos).length()
            })
            .unwrap_or(10_000.0);

        if dist > DISENGAGE_RANGE {
            debug!(ship_id = %ship.id, "ending retreat");
            self.state = AiState::Patrol;
            self.target_id = None;
        }
    }

    /// Health gates run after every state dispatch
    fn evaluate_health(&mut self, ship: &Arc<Ship>, view: &OwnView, rng: &mut ChaCha8Rng) {
        if view.hull_fraction < 0.3 || view.shield_fraction < 0.2 {
            if self.state != AiState::Retreat {
                debug!(
                    ship_id = %ship.id,
                    hull = view.hull_fraction,
                    shields = view.shield_fraction,
                    "retreating"
                );
                self.state = AiState::Retreat;
            }
            return;
        }

        if view.hull_fraction < 0.6
            && view.shield_fraction < 0.5
            && self.state == AiState::Combat
            && rng.gen::<f64>() < 0.3
        {
            debug!(ship_id = %ship.id, "evading");
            self.state = AiState::Evade;
        }
    }

    fn attempt_phaser(&self, ship: &Arc<Ship>, view: &OwnView, target: &Arc<Ship>) {
        for (weapon_id, damage) in &view.phasers {
            if ship.fire_weapon(weapon_id, &target.id) {
                target.take_damage(damage * self.difficulty, "forward");
                debug!(
                    ship_id = %ship.id,
                    weapon_id = %weapon_id,
                    target_id = %target.id,
                    "phaser hit"
                );
                return;
            }
        }
    }

    fn attempt_torpedo(
        &self,
        ship: &Arc<Ship>,
        view: &OwnView,
        target: &Arc<Ship>,
        launches: &mut Vec<TorpedoLaunch>,
    ) {
        for (weapon_id, damage) in &view.torpedoes {
            ship.with_state_mut(|s| {
                if let Some(weapon) = s.weapons.get_mut(weapon_id) {
                    weapon.armed = true;
                    weapon.loaded = true;
                    weapon.locked = true;
                }
            });
            if ship.fire_weapon(weapon_id, &target.id) {
                launches.push(TorpedoLaunch {
                    weapon_id: weapon_id.clone(),
                    target_id: target.id.clone(),
                    damage: *damage,
                });
                debug!(ship_id = %ship.id, weapon_id = %weapon_id, "torpedo away");
                return;
            }
        }
    }

    /// Nearest ship on the other side of the player/NPC divide
    fn nearest_threat(
        &self,
        ship: &Arc<Ship>,
        view: &OwnView,
        ships: &BTreeMap<String, Arc<Ship>>,
    ) -> Option<(String, f64)> {
        let mut nearest: Option<(String, f64)> = None;
        for (id, other) in ships {
            if *id == ship.id || other.is_player == ship.is_player {
                continue;
            }
            let pos = other.with_state(|s| s.position);
            let dist = view.position.sub(&pos).length();
            if nearest.as_ref().map_or(true, |(_, d)| dist < *d) {
                nearest = Some((id.clone(), dist));
            }
        }
        nearest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        EmitterConfig, HullConfig, HullSectionConfig, ShieldConfig, ShipClass, WeaponConfig,
    };
    use rand::SeedableRng;

    fn combat_class() -> ShipClass {
        ShipClass {
            id: "raider".into(),
            name: "Raider".into(),
            mass: 80_000.0,
            max_speed: 250.0,
            acceleration: 60.0,
            turn_rate: 1.5,
            engines: vec![],
            weapons: vec![WeaponConfig {
                id: "phaser_1".into(),
                kind: "phaser".into(),
                damage: 25.0,
                range: 2000.0,
                cooldown_time: 2.0,
                health: 100.0,
                power_draw: 50.0,
                ammo_capacity: 0,
            }],
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
                    armor: 0.0,
                    health: 100.0,
                }],
            },
            subsystems: vec![],
            launch_bays: vec![],
        }
    }

    fn world(npc_pos: Vector3, player_pos: Vector3) -> BTreeMap<String, Arc<Ship>> {
        let npc = Arc::new(Ship::new("npc_1", "raider", "Raider", &combat_class(), false));
        npc.with_state_mut(|s| s.position = npc_pos);
        let player = Arc::new(Ship::new("player_1", "raider", "Player", &combat_class(), true));
        player.with_state_mut(|s| s.position = player_pos);

        let mut ships = BTreeMap::new();
        ships.insert("npc_1".to_string(), npc);
        ships.insert("player_1".to_string(), player);
        ships
    }

    #[test]
    fn starts_in_patrol() {
        let ai = AiController::new();
        assert_eq!(ai.state, AiState::Patrol);
        assert_eq!(ai.aggression, 0.5);
    }

    #[test]
    fn patrol_engages_nearby_threat() {
        let ships = world(Vector3::ZERO, Vector3::new(0.0, 0.0, 3000.0));
        let npc = ships["npc_1"].clone();
        let mut ai = AiController::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        ai.update(0.1, &npc, &ships, &mut rng);
        assert_eq!(ai.state, AiState::Combat);
        assert_eq!(ai.target_id.as_deref(), Some("player_1"));
    }

    #[test]
    fn patrol_ignores_distant_ships() {
        let ships = world(Vector3::ZERO, Vector3::new(0.0, 0.0, 9000.0));
        let npc = ships["npc_1"].clone();
        let mut ai = AiController::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        ai.update(0.1, &npc, &ships, &mut rng);
        assert_eq!(ai.state, AiState::Patrol);
        assert!(ai.target_id.is_none());
    }

    #[test]
    fn combat_fires_phaser_when_aligned() {
        // Target dead ahead (+Z), within phaser range
        let ships = world(Vector3::ZERO, Vector3::new(0.0, 0.0, 1000.0));
        let npc = ships["npc_1"].clone();
        let player = ships["player_1"].clone();
        let mut ai = AiController::new();
        ai.state = AiState::Combat;
        ai.target_id = Some("player_1".to_string());
        ai.difficulty = 2.0;
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        ai.update(0.1, &npc, &ships, &mut rng);

        // 25 damage * difficulty 2.0 lands on the target's forward shield
        player.with_state(|s| {
            assert_eq!(s.shields.emitters["forward"].strength, 450.0);
        });
        npc.with_state(|s| assert!(s.weapons["phaser_1"].cooldown > 0.0));
    }

    #[test]
    fn combat_without_target_returns_to_patrol() {
        let ships = world(Vector3::ZERO, Vector3::new(0.0, 0.0, 9000.0));
        let npc = ships["npc_1"].clone();
        let mut ai = AiController::new();
        ai.state = AiState::Combat;
        ai.target_id = Some("vanished".to_string());
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        ai.update(0.1, &npc, &ships, &mut rng);
        assert_eq!(ai.state, AiState::Patrol);
    }

    #[test]
    fn low_hull_forces_retreat_from_any_state() {
        let ships = world(Vector3::ZERO, Vector3::new(0.0, 0.0, 1000.0));
        let npc = ships["npc_1"].clone();
        npc.with_state_mut(|s| {
            s.hull.sections.get_mut("forward").unwrap().health = 20.0;
        });

        for start in [AiState::Patrol, AiState::Combat, AiState::Evade] {
            let mut ai = AiController::new();
            ai.state = start;
            ai.target_id = Some("player_1".to_string());
            let mut rng = ChaCha8Rng::seed_from_u64(1);
            ai.update(0.1, &npc, &ships, &mut rng);
            assert_eq!(ai.state, AiState::Retreat, "from {:?}", start);
        }
    }

    #[test]
    fn retreat_ends_beyond_disengage_range() {
        let ships = world(Vector3::ZERO, Vector3::new(0.0, 0.0, 9000.0));
        let npc = ships["npc_1"].clone();
        let mut ai = AiController::new();
        ai.state = AiState::Retreat;
        ai.target_id = Some("player_1".to_string());
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        ai.update(0.1, &npc, &ships, &mut rng);
        assert_eq!(ai.state, AiState::Patrol);
        assert!(ai.target_id.is_none());
    }

    #[test]
    fn tactical_mode_overrides_aggression() {
        let mut ai = AiController::new();
        ai.set_tactical_mode(TacticalMode::Aggressive);
        assert_eq!(ai.aggression, 1.0);
        ai.set_tactical_mode(TacticalMode::Defensive);
        assert_eq!(ai.aggression, 0.2);
        ai.set_tactical_mode(TacticalMode::Balanced);
        assert_eq!(ai.aggression, 0.5);
    }
}
