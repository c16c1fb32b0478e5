//! Simulator - fixed-step world loop, entity registries and snapshots
//!
//! The simulator owns every ship, projectile and inert object behind one
//! reader/writer lock. The tick loop is the only writer during normal
//! operation; intent handlers and the GM mutate entities through the same
//! guarded interface between ticks. Lock order is world first, then ship.

use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::ShipClass;
use crate::error::{GameError, GameResult};
use crate::ship::{Quaternion, Ship, ShipState, Vector3};

use super::ai::{AiController, TacticalMode, TorpedoLaunch};

/// Squared-distance threshold for ship-ship collisions (radius 10)
const COLLISION_DIST_SQ: f64 = 100.0;
/// Squared-distance threshold for a projectile proximity hit
const PROXIMITY_DIST_SQ: f64 = 50.0;
/// Damage each ship takes in a collision
const COLLISION_DAMAGE: f64 = 10.0;
/// Seconds a projectile lives without hitting anything
const DEFAULT_PROJECTILE_LIFETIME: f64 = 10.0;
/// Muzzle speed added along ship-forward when a torpedo launches
pub const TORPEDO_LAUNCH_SPEED: f64 = 500.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projectile {
    pub id: String,
    pub kind: String,
    pub position: Vector3,
    pub velocity: Vector3,
    pub damage: f64,
    pub source_id: String,
    pub target_id: Option<String>,
    pub lifetime: f64,
    pub max_lifetime: f64,
}

/// Inert mission prop with a free-form attribute bag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldObject {
    pub id: String,
    pub kind: String,
    pub position: Vector3,
    pub velocity: Vector3,
    pub rotation: Quaternion,
    pub data: serde_json::Map<String, serde_json::Value>,
}

/// Deep copy of one ship for time travel
#[derive(Debug, Clone)]
pub struct ShipRecord {
    pub id: String,
    pub class_id: String,
    pub name: String,
    pub is_player: bool,
    pub state: ShipState,
}

/// A time-labeled structural copy of the world. Independent of live state:
/// mutating the world after capture never changes a snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub time: f64,
    ships: BTreeMap<String, ShipRecord>,
    projectiles: BTreeMap<String, Projectile>,
    objects: BTreeMap<String, WorldObject>,
}

struct World {
    time: f64,
    ships: BTreeMap<String, Arc<Ship>>,
    projectiles: BTreeMap<String, Projectile>,
    objects: BTreeMap<String, WorldObject>,
    ai: BTreeMap<String, AiController>,
    snapshots: Vec<Snapshot>,
    rng: ChaCha8Rng,
    projectile_seq: u64,
}

pub struct Simulator {
    dt: f64,
    tick_rate: u32,
    paused: AtomicBool,
    classes: HashMap<String, ShipClass>,
    world: RwLock<World>,
}

impl Simulator {
    pub fn new(tick_rate: u32, classes: HashMap<String, ShipClass>, seed: u64) -> Self {
        Self {
            dt: 1.0 / tick_rate as f64,
            tick_rate,
            paused: AtomicBool::new(false),
            classes,
            world: RwLock::new(World {
                time: 0.0,
                ships: BTreeMap::new(),
                projectiles: BTreeMap::new(),
                objects: BTreeMap::new(),
                ai: BTreeMap::new(),
                snapshots: Vec::new(),
                rng: ChaCha8Rng::seed_from_u64(seed),
                projectile_seq: 0,
            }),
        }
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    fn read(&self) -> RwLockReadGuard<'_, World> {
        self.world.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, World> {
        self.world.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pause requests are idempotent
    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            info!("simulator paused");
        }
    }

    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::SeqCst) {
            info!("simulator resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Drive the tick loop until the stop channel fires
    pub async fn run(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        let tick_duration = Duration::from_micros(1_000_000 / self.tick_rate as u64);
        let mut interval = tokio::time::interval(tick_duration);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(tick_rate = self.tick_rate, "simulator started");

        loop {
            tokio::select! {
                _ = stop.changed() => {
                    info!("simulator stopped");
                    return;
                }
                _ = interval.tick() => {
                    if !self.is_paused() {
                        self.tick();
                    }
                }
            }
        }
    }

    /// Advance the world one step: ships, projectiles, AI, collisions.
    /// Must never fail; a panicking ship update is confined to that ship.
    pub fn tick(&self) {
        let mut world = self.write();
        let dt = self.dt;

        world.time += dt;

        for ship in world.ships.values() {
            if catch_unwind(AssertUnwindSafe(|| ship.update(dt))).is_err() {
                let err = GameError::Internal(format!("ship {} update panicked", ship.id));
                error!(error = %err, "ship skipped for this tick");
            }
        }

        world.update_projectiles(dt);

        let launches = world.run_ai(dt);
        for (source_id, launch) in launches {
            world.launch_torpedo(&source_id, launch);
        }

        world.check_collisions();
    }

    pub fn current_time(&self) -> f64 {
        self.read().time
    }

    /// Clone the ship handles for iteration outside the world lock
    pub fn ships(&self) -> Vec<Arc<Ship>> {
        self.read().ships.values().cloned().collect()
    }

    pub fn get_ship(&self, id: &str) -> Option<Arc<Ship>> {
        self.read().ships.get(id).cloned()
    }

    /// The single player-controlled ship, if one exists
    pub fn player_ship(&self) -> Option<Arc<Ship>> {
        self.read().ships.values().find(|s| s.is_player).cloned()
    }

    pub fn spawn_ship(
        &self,
        id: &str,
        class_id: &str,
        name: &str,
        is_player: bool,
        position: Vector3,
    ) -> GameResult<()> {
        let class = self
            .classes
            .get(class_id)
            .ok_or_else(|| GameError::NotFound(format!("ship class {class_id}")))?;

        let ship = Arc::new(Ship::new(id, class_id, name, class, is_player));
        ship.with_state_mut(|s| s.position = position);

        let mut world = self.write();
        world.ships.insert(id.to_string(), ship);
        if !is_player {
            world.ai.insert(id.to_string(), AiController::new());
        }

        info!(ship_id = id, class_id, name, is_player, "spawned ship");
        Ok(())
    }

    pub fn remove_ship(&self, id: &str) {
        let mut world = self.write();
        world.ships.remove(id);
        world.ai.remove(id);
        info!(ship_id = id, "removed ship");
    }

    pub fn spawn_projectile(
        &self,
        kind: &str,
        source_id: &str,
        target_id: Option<String>,
        position: Vector3,
        velocity: Vector3,
        damage: f64,
    ) -> String {
        let mut world = self.write();
        world.spawn_projectile(kind, source_id, target_id, position, velocity, damage)
    }

    pub fn projectile_count(&self) -> usize {
        self.read().projectiles.len()
    }

    pub fn spawn_object(&self, id: &str, kind: &str, position: Vector3) {
        let mut world = self.write();
        world.objects.insert(
            id.to_string(),
            WorldObject {
                id: id.to_string(),
                kind: kind.to_string(),
                position,
                velocity: Vector3::ZERO,
                rotation: Quaternion::IDENTITY,
                data: serde_json::Map::new(),
            },
        );
        info!(object_id = id, kind, "spawned object");
    }

    pub fn remove_object(&self, id: &str) {
        self.write().objects.remove(id);
        info!(object_id = id, "removed object");
    }

    pub fn object_count(&self) -> usize {
        self.read().objects.len()
    }

    pub fn set_ai_difficulty(&self, ship_id: &str, difficulty: f64) -> GameResult<()> {
        let mut world = self.write();
        let controller = world
            .ai
            .get_mut(ship_id)
            .ok_or_else(|| GameError::NotFound(format!("AI controller for {ship_id}")))?;
        controller.set_difficulty(difficulty);
        info!(ship_id, difficulty, "AI difficulty set");
        Ok(())
    }

    pub fn set_ai_tactical_mode(&self, ship_id: &str, mode: TacticalMode) -> GameResult<()> {
        let mut world = self.write();
        let controller = world
            .ai
            .get_mut(ship_id)
            .ok_or_else(|| GameError::NotFound(format!("AI controller for {ship_id}")))?;
        controller.set_tactical_mode(mode);
        info!(ship_id, ?mode, "AI tactical mode set");
        Ok(())
    }

    /// Capture a deep copy of the current world
    pub fn create_snapshot(&self) {
        let mut world = self.write();

        let mut ships = BTreeMap::new();
        for (id, ship) in &world.ships {
            ships.insert(
                id.clone(),
                ShipRecord {
                    id: ship.id.clone(),
                    class_id: ship.class_id.clone(),
                    name: ship.name.clone(),
                    is_player: ship.is_player,
                    state: ship.clone_state(),
                },
            );
        }

        let snapshot = Snapshot {
            time: world.time,
            ships,
            projectiles: world.projectiles.clone(),
            objects: world.objects.clone(),
        };

        world.snapshots.push(snapshot);
        info!(time = world.time, total = world.snapshots.len(), "created snapshot");
    }

    /// Replace live state with the i-th snapshot. The active mission, if
    /// any, is deliberately left untouched.
    pub fn restore_snapshot(&self, index: usize) -> GameResult<()> {
        let mut world = self.write();

        let snapshot = world
            .snapshots
            .get(index)
            .ok_or_else(|| GameError::NotFound(format!("snapshot index {index}")))?
            .clone();

        world.time = snapshot.time;
        world.projectiles = snapshot.projectiles;
        world.objects = snapshot.objects;

        let mut ships = BTreeMap::new();
        for (id, record) in snapshot.ships {
            ships.insert(
                id,
                Arc::new(Ship::from_state(
                    &record.id,
                    &record.class_id,
                    &record.name,
                    record.is_player,
                    record.state,
                )),
            );
        }
        world.ships = ships;

        // Controllers are not part of a snapshot; drop orphans and give
        // restored NPCs a fresh brain.
        let ship_ids: Vec<String> = world.ships.keys().cloned().collect();
        world.ai.retain(|id, _| ship_ids.contains(id));
        let needs_ai: Vec<String> = world
            .ships
            .iter()
            .filter(|(id, ship)| !ship.is_player && !world.ai.contains_key(*id))
            .map(|(id, _)| id.clone())
            .collect();
        for id in needs_ai {
            world.ai.insert(id, AiController::new());
        }

        info!(index, time = world.time, "restored snapshot");
        Ok(())
    }

    pub fn snapshot_count(&self) -> usize {
        self.read().snapshots.len()
    }
}

impl World {
    fn spawn_projectile(
        &mut self,
        kind: &str,
        source_id: &str,
        target_id: Option<String>,
        position: Vector3,
        velocity: Vector3,
        damage: f64,
    ) -> String {
        self.projectile_seq += 1;
        let id = format!("{}_{:06}", kind, self.projectile_seq);

        self.projectiles.insert(
            id.clone(),
            Projectile {
                id: id.clone(),
                kind: kind.to_string(),
                position,
                velocity,
                damage,
                source_id: source_id.to_string(),
                target_id,
                lifetime: 0.0,
                max_lifetime: DEFAULT_PROJECTILE_LIFETIME,
            },
        );

        info!(projectile_id = %id, source_id, "spawned projectile");
        id
    }

    fn update_projectiles(&mut self, dt: f64) {
        let mut expired = Vec::new();

        for (id, projectile) in self.projectiles.iter_mut() {
            projectile.position = projectile.position.add(&projectile.velocity.scale(dt));
            projectile.lifetime += dt;

            if projectile.lifetime > projectile.max_lifetime {
                expired.push(id.clone());
                continue;
            }

            let Some(target) = projectile.target_id.as_ref().and_then(|t| self.ships.get(t))
            else {
                continue;
            };

            let target_pos = target.with_state(|s| s.position);
            if projectile.position.distance_squared(&target_pos) < PROXIMITY_DIST_SQ {
                target.take_damage(projectile.damage, "forward");
                info!(
                    projectile_id = %id,
                    target_id = %target.id,
                    damage = projectile.damage,
                    "projectile hit"
                );
                expired.push(id.clone());
            }
        }

        for id in expired {
            self.projectiles.remove(&id);
        }
    }

    fn run_ai(&mut self, dt: f64) -> Vec<(String, TorpedoLaunch)> {
        let ships = &self.ships;
        let rng = &mut self.rng;
        let mut launches = Vec::new();

        for (ship_id, controller) in self.ai.iter_mut() {
            let Some(ship) = ships.get(ship_id) else {
                continue;
            };
            for launch in controller.update(dt, ship, ships, rng) {
                launches.push((ship_id.clone(), launch));
            }
        }

        launches
    }

    fn launch_torpedo(&mut self, source_id: &str, launch: TorpedoLaunch) {
        let Some(ship) = self.ships.get(source_id) else {
            return;
        };
        let (position, velocity) = ship.with_state(|s| {
            let muzzle = s.rotation.forward().scale(TORPEDO_LAUNCH_SPEED);
            (s.position, s.velocity.add(&muzzle))
        });
        self.spawn_projectile(
            "torpedo",
            source_id,
            Some(launch.target_id),
            position,
            velocity,
            launch.damage,
        );
    }

    /// Squared-distance proximity check over every unordered ship pair.
    /// BTreeMap iteration gives ID order, which is also the lock order.
    fn check_collisions(&mut self) {
        let ships: Vec<&Arc<Ship>> = self.ships.values().collect();

        for i in 0..ships.len() {
            for j in (i + 1)..ships.len() {
                let a = ships[i];
                let b = ships[j];
                let pa = a.with_state(|s| s.position);
                let pb = b.with_state(|s| s.position);

                if pa.distance_squared(&pb) < COLLISION_DIST_SQ {
                    a.take_damage(COLLISION_DAMAGE, "forward");
                    b.take_damage(COLLISION_DAMAGE, "forward");
                    warn!(ship_a = %a.id, ship_b = %b.id, "collision");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HullConfig, HullSectionConfig, ShipClass};

    fn bare_class(id: &str) -> ShipClass {
        ShipClass {
            id: id.into(),
            name: "Test Ship".into(),
            mass: 100_000.0,
            max_speed: 200.0,
            acceleration: 50.0,
            turn_rate: 1.0,
            engines: vec![],
            weapons: vec![],
            shields: Default::default(),
            hull: HullConfig {
                sections: vec![HullSectionConfig {
                    id: "forward".into(),
                    armor: 0.0,
                    health: 500.0,
                }],
            },
            subsystems: vec![],
            launch_bays: vec![],
        }
    }

    fn classes() -> HashMap<String, ShipClass> {
        let mut map = HashMap::new();
        map.insert("test_ship".to_string(), bare_class("test_ship"));
        map
    }

    fn simulator() -> Simulator {
        Simulator::new(60, classes(), 99)
    }

    #[test]
    fn spawn_and_get_ship() {
        let sim = simulator();
        sim.spawn_ship("ship_1", "test_ship", "Test", false, Vector3::new(100.0, 200.0, 300.0))
            .unwrap();

        let ship = sim.get_ship("ship_1").expect("ship should exist");
        ship.with_state(|s| {
            assert_eq!(s.position, Vector3::new(100.0, 200.0, 300.0));
        });
    }

    #[test]
    fn spawn_unknown_class_is_not_found() {
        let sim = simulator();
        let err = sim
            .spawn_ship("ship_1", "no_such_class", "Test", false, Vector3::ZERO)
            .unwrap_err();
        assert!(matches!(err, GameError::NotFound(_)));
    }

    #[test]
    fn remove_ship_drops_ai() {
        let sim = simulator();
        sim.spawn_ship("ship_1", "test_ship", "Test", false, Vector3::ZERO).unwrap();
        sim.remove_ship("ship_1");
        assert!(sim.get_ship("ship_1").is_none());
        assert!(matches!(
            sim.set_ai_difficulty("ship_1", 2.0),
            Err(GameError::NotFound(_))
        ));
    }

    #[test]
    fn player_ship_lookup() {
        let sim = simulator();
        sim.spawn_ship("npc", "test_ship", "NPC", false, Vector3::ZERO).unwrap();
        sim.spawn_ship("hero", "test_ship", "Hero", true, Vector3::ZERO).unwrap();
        assert_eq!(sim.player_ship().unwrap().id, "hero");
    }

    #[test]
    fn pause_and_resume_are_idempotent() {
        let sim = simulator();
        sim.pause();
        sim.pause();
        assert!(sim.is_paused());
        sim.resume();
        sim.resume();
        assert!(!sim.is_paused());
    }

    #[test]
    fn tick_advances_time() {
        let sim = simulator();
        sim.tick();
        sim.tick();
        assert!((sim.current_time() - 2.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn snapshot_restore_brings_ship_back() {
        let sim = simulator();
        sim.spawn_ship("ship_1", "test_ship", "Test", false, Vector3::new(100.0, 0.0, 0.0))
            .unwrap();
        sim.create_snapshot();

        sim.remove_ship("ship_1");
        assert!(sim.get_ship("ship_1").is_none());

        sim.restore_snapshot(0).unwrap();
        let ship = sim.get_ship("ship_1").expect("restored");
        ship.with_state(|s| {
            assert_eq!(s.position, Vector3::new(100.0, 0.0, 0.0));
            assert_eq!(s.hull.sections["forward"].health, 500.0);
        });
    }

    #[test]
    fn restore_of_fresh_snapshot_is_identity() {
        let sim = simulator();
        sim.spawn_ship("ship_1", "test_ship", "Test", false, Vector3::new(5.0, 6.0, 7.0))
            .unwrap();
        sim.tick();

        let before = serde_json::to_string(&sim.get_ship("ship_1").unwrap().clone_state()).unwrap();
        let time_before = sim.current_time();

        sim.create_snapshot();
        sim.restore_snapshot(0).unwrap();

        let after = serde_json::to_string(&sim.get_ship("ship_1").unwrap().clone_state()).unwrap();
        assert_eq!(before, after);
        assert_eq!(sim.current_time(), time_before);
    }

    #[test]
    fn snapshot_is_isolated_from_live_mutation() {
        let sim = simulator();
        sim.spawn_ship("ship_1", "test_ship", "Test", false, Vector3::ZERO).unwrap();
        sim.create_snapshot();

        // Batter the live ship, then rewind
        let ship = sim.get_ship("ship_1").unwrap();
        ship.take_damage(400.0, "forward");
        ship.with_state(|s| assert_eq!(s.hull.sections["forward"].health, 100.0));

        sim.restore_snapshot(0).unwrap();
        let restored = sim.get_ship("ship_1").unwrap();
        restored.with_state(|s| assert_eq!(s.hull.sections["forward"].health, 500.0));
    }

    #[test]
    fn snapshot_can_be_restored_repeatedly() {
        let sim = simulator();
        sim.spawn_ship("ship_1", "test_ship", "Test", false, Vector3::ZERO).unwrap();
        sim.create_snapshot();

        for _ in 0..3 {
            sim.get_ship("ship_1").unwrap().take_damage(400.0, "forward");
            sim.restore_snapshot(0).unwrap();
            sim.get_ship("ship_1")
                .unwrap()
                .with_state(|s| assert_eq!(s.hull.sections["forward"].health, 500.0));
        }
    }

    #[test]
    fn restore_invalid_index_is_not_found() {
        let sim = simulator();
        assert!(matches!(sim.restore_snapshot(0), Err(GameError::NotFound(_))));
    }

    #[test]
    fn restore_recreates_npc_controllers() {
        let sim = simulator();
        sim.spawn_ship("npc", "test_ship", "NPC", false, Vector3::ZERO).unwrap();
        sim.create_snapshot();
        sim.remove_ship("npc");
        sim.restore_snapshot(0).unwrap();
        assert!(sim.set_ai_difficulty("npc", 2.0).is_ok());
    }

    #[test]
    fn overlapping_ships_collide_for_ten_damage() {
        let sim = simulator();
        sim.spawn_ship("ship_a", "test_ship", "A", false, Vector3::ZERO).unwrap();
        sim.spawn_ship("ship_b", "test_ship", "B", false, Vector3::ZERO).unwrap();

        sim.tick();

        for id in ["ship_a", "ship_b"] {
            sim.get_ship(id).unwrap().with_state(|s| {
                assert_eq!(s.hull.sections["forward"].health, 490.0, "{id}");
            });
        }
    }

    #[test]
    fn collision_radius_is_ten_units() {
        // d^2 = 144 > 100: no collision even though d < 100
        let sim = simulator();
        sim.spawn_ship("ship_a", "test_ship", "A", false, Vector3::ZERO).unwrap();
        sim.spawn_ship("ship_b", "test_ship", "B", false, Vector3::new(12.0, 0.0, 0.0))
            .unwrap();

        sim.tick();

        sim.get_ship("ship_a").unwrap().with_state(|s| {
            assert_eq!(s.hull.sections["forward"].health, 500.0);
        });
    }

    #[test]
    fn projectile_hits_target_in_proximity() {
        let sim = simulator();
        sim.spawn_ship("victim", "test_ship", "Victim", true, Vector3::new(0.0, 0.0, 500.0))
            .unwrap();
        sim.spawn_projectile(
            "torpedo",
            "attacker",
            Some("victim".to_string()),
            Vector3::new(0.0, 0.0, 499.0),
            Vector3::ZERO,
            80.0,
        );

        sim.tick();

        assert_eq!(sim.projectile_count(), 0);
        sim.get_ship("victim").unwrap().with_state(|s| {
            assert_eq!(s.hull.sections["forward"].health, 420.0);
        });
    }

    #[test]
    fn projectile_expires_after_max_lifetime() {
        let sim = Simulator::new(1, classes(), 99);
        sim.spawn_projectile("torpedo", "src", None, Vector3::ZERO, Vector3::ZERO, 10.0);

        for _ in 0..11 {
            sim.tick();
        }
        assert_eq!(sim.projectile_count(), 0);
    }

    #[test]
    fn untargeted_projectile_just_flies() {
        let sim = simulator();
        sim.spawn_ship("bystander", "test_ship", "B", true, Vector3::ZERO).unwrap();
        sim.spawn_projectile(
            "torpedo",
            "src",
            None,
            Vector3::ZERO,
            Vector3::new(0.0, 0.0, 100.0),
            10.0,
        );

        sim.tick();

        assert_eq!(sim.projectile_count(), 1);
        sim.get_ship("bystander").unwrap().with_state(|s| {
            assert_eq!(s.hull.sections["forward"].health, 500.0);
        });
    }

    #[test]
    fn identical_seeds_tick_identically() {
        let build = || {
            let sim = Simulator::new(60, classes(), 1234);
            sim.spawn_ship("hero", "test_ship", "Hero", true, Vector3::ZERO).unwrap();
            sim.spawn_ship("npc_1", "test_ship", "R1", false, Vector3::new(0.0, 0.0, 3000.0))
                .unwrap();
            sim.spawn_ship("npc_2", "test_ship", "R2", false, Vector3::new(0.0, 3000.0, 0.0))
                .unwrap();
            sim
        };

        let a = build();
        let b = build();
        for _ in 0..120 {
            a.tick();
            b.tick();
        }

        assert_eq!(a.current_time(), b.current_time());
        for ship_a in a.ships() {
            let ship_b = b.get_ship(&ship_a.id).unwrap();
            let state_a = serde_json::to_string(&ship_a.clone_state()).unwrap();
            let state_b = serde_json::to_string(&ship_b.clone_state()).unwrap();
            assert_eq!(state_a, state_b, "ship {}", ship_a.id);
        }
    }
}
