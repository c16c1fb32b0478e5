//! Game-master controller
//!
//! Executes privileged commands arriving over the UI stream: time control,
//! snapshots, entity lifecycle, typed damage, direct system edits, AI
//! tuning and the mission start/stop/event paths. Also owns the automatic
//! snapshot ticker.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::error::{GameError, GameResult};
use crate::mission::{MissionEngine, MissionStatus};
use crate::net::protocol::GmCommand;
use crate::ship::SystemKind;
use crate::sim::{DamageController, DamageKind, Simulator, TacticalMode};

pub struct GameMaster {
    simulator: Arc<Simulator>,
    missions: Arc<MissionEngine>,
    damage: Arc<Mutex<DamageController>>,
}

impl GameMaster {
    pub fn new(
        simulator: Arc<Simulator>,
        missions: Arc<MissionEngine>,
        damage: Arc<Mutex<DamageController>>,
    ) -> Self {
        Self {
            simulator,
            missions,
            damage,
        }
    }

    /// Execute one GM command. Failures are reported to the caller and
    /// leave the session alive.
    pub fn handle(&self, command: GmCommand) -> GameResult<()> {
        match command {
            GmCommand::Pause => {
                self.simulator.pause();
                Ok(())
            }
            GmCommand::Resume => {
                self.simulator.resume();
                Ok(())
            }
            GmCommand::CreateSnapshot => {
                self.simulator.create_snapshot();
                Ok(())
            }
            GmCommand::RestoreSnapshot { index } => self.simulator.restore_snapshot(index),
            GmCommand::SpawnShip {
                ship_id,
                class_id,
                name,
                is_player,
                position,
            } => self
                .simulator
                .spawn_ship(&ship_id, &class_id, &name, is_player, position),
            GmCommand::RemoveShip { ship_id } => {
                self.simulator.remove_ship(&ship_id);
                Ok(())
            }
            GmCommand::DamageShip {
                ship_id,
                amount,
                location,
                damage_type,
            } => self.damage_ship(&ship_id, amount, &location, damage_type.as_deref()),
            GmCommand::ModifySystem {
                ship_id,
                system_type,
                system_id,
                property,
                value,
            } => self.modify_system(&ship_id, &system_type, &system_id, &property, &value),
            GmCommand::SetAiDifficulty { ship_id, difficulty } => {
                self.simulator.set_ai_difficulty(&ship_id, difficulty)
            }
            GmCommand::SetAiTacticalMode { ship_id, mode } => {
                let mode = parse_tactical_mode(&mode)?;
                self.simulator.set_ai_tactical_mode(&ship_id, mode)
            }
            GmCommand::StartMission { mission_id } => self.missions.start_mission(&mission_id),
            GmCommand::StopMission => {
                self.missions.stop_mission();
                Ok(())
            }
            GmCommand::TriggerEvent { event, params } => {
                // Event dispatch runs off the network task; the mission
                // engine serializes concurrent events internally
                let missions = self.missions.clone();
                tokio::task::spawn_blocking(move || {
                    if let Err(e) = missions.trigger_event(&event, params) {
                        error!(error = %e, "mission event dispatch failed");
                    }
                });
                Ok(())
            }
        }
    }

    fn damage_ship(
        &self,
        ship_id: &str,
        amount: f64,
        location: &str,
        damage_type: Option<&str>,
    ) -> GameResult<()> {
        let ship = self
            .simulator
            .get_ship(ship_id)
            .ok_or_else(|| GameError::NotFound(format!("ship {ship_id}")))?;

        let kind = damage_type.and_then(DamageKind::parse);
        let mut damage = self.damage.lock().unwrap_or_else(|e| e.into_inner());
        damage.apply(&ship, amount, location, kind);

        info!(ship_id, amount, location, ?kind, "GM damage applied");
        Ok(())
    }

    fn modify_system(
        &self,
        ship_id: &str,
        system_type: &str,
        system_id: &str,
        property: &str,
        value: &Value,
    ) -> GameResult<()> {
        let ship = self
            .simulator
            .get_ship(ship_id)
            .ok_or_else(|| GameError::NotFound(format!("ship {ship_id}")))?;

        let kind = SystemKind::parse(system_type)
            .ok_or_else(|| GameError::NotFound(format!("system type {system_type}")))?;

        ship.with_state_mut(|state| {
            let mut system = state
                .system_mut(kind, system_id)
                .ok_or_else(|| GameError::NotFound(format!("{system_type} {system_id}")))?;

            match property {
                "health" => {
                    let health = value.as_f64().ok_or_else(|| {
                        GameError::Precondition("health must be numeric".to_string())
                    })?;
                    system.set_health_clamped(health);
                }
                "on_fire" => {
                    let on_fire = value.as_bool().ok_or_else(|| {
                        GameError::Precondition("on_fire must be boolean".to_string())
                    })?;
                    system.set_on_fire(on_fire);
                }
                "enabled" => {
                    let enabled = value.as_bool().ok_or_else(|| {
                        GameError::Precondition("enabled must be boolean".to_string())
                    })?;
                    if !system.set_enabled(enabled) {
                        return Err(GameError::Precondition(format!(
                            "{system_type} has no enabled flag"
                        )));
                    }
                }
                other => {
                    return Err(GameError::NotFound(format!("property {other}")));
                }
            }
            Ok(())
        })?;

        info!(ship_id, system_type, system_id, property, "GM modified system");
        Ok(())
    }

    /// Compact world overview for the health endpoint
    pub fn summary(&self) -> Value {
        let ships: Vec<Value> = self
            .simulator
            .ships()
            .iter()
            .map(|ship| {
                ship.with_state(|s| {
                    json!({
                        "id": ship.id,
                        "name": ship.name,
                        "class_id": ship.class_id,
                        "is_player": ship.is_player,
                        "hull_pct": s.hull_fraction() * 100.0,
                        "shield_pct": s.shield_fraction() * 100.0,
                    })
                })
            })
            .collect();

        let mission = self.missions.active_mission_id().map(|id| {
            json!({
                "id": id,
                "status": match self.missions.status() {
                    Some(MissionStatus::Won) => "won".to_string(),
                    Some(MissionStatus::Lost(reason)) => format!("lost: {reason}"),
                    _ => "running".to_string(),
                },
                "objectives": self.missions.objectives().len(),
            })
        });

        json!({
            "time": self.simulator.current_time(),
            "paused": self.simulator.is_paused(),
            "ships": ships,
            "active_mission": mission,
            "snapshot_count": self.simulator.snapshot_count(),
        })
    }

    /// Capture a snapshot on a fixed cadence while the server runs
    pub async fn run_snapshot_ticker(
        self: Arc<Self>,
        interval_secs: u64,
        mut stop: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await; // the first tick completes immediately

        loop {
            tokio::select! {
                _ = stop.changed() => {
                    info!("snapshot ticker stopped");
                    return;
                }
                _ = ticker.tick() => {
                    self.simulator.create_snapshot();
                }
            }
        }
    }
}

fn parse_tactical_mode(mode: &str) -> GameResult<TacticalMode> {
    match mode {
        "aggressive" => Ok(TacticalMode::Aggressive),
        "defensive" => Ok(TacticalMode::Defensive),
        "balanced" => Ok(TacticalMode::Balanced),
        other => Err(GameError::Precondition(format!("unknown tactical mode {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HullConfig, HullSectionConfig, ShipClass};
    use crate::ship::Vector3;
    use std::collections::HashMap;

    fn setup() -> (Arc<Simulator>, GameMaster) {
        let mut classes = HashMap::new();
        classes.insert(
            "scout".to_string(),
            ShipClass {
                id: "scout".into(),
                name: "Scout".into(),
                mass: 60_000.0,
                max_speed: 300.0,
                acceleration: 80.0,
                turn_rate: 2.0,
                engines: vec![crate::config::EngineConfig {
                    id: "main_1".into(),
                    kind: "main".into(),
                    thrust: 40_000.0,
                    health: 100.0,
                    power_draw: 80.0,
                }],
                weapons: vec![],
                shields: Default::default(),
                hull: HullConfig {
                    sections: vec![HullSectionConfig {
                        id: "forward".into(),
                        armor: 0.0,
                        health: 200.0,
                    }],
                },
                subsystems: vec![],
                launch_bays: vec![],
            },
        );
        let sim = Arc::new(Simulator::new(60, classes, 3));
        let missions = Arc::new(MissionEngine::new(sim.clone()));
        let damage = Arc::new(Mutex::new(DamageController::new(3)));
        let gm = GameMaster::new(sim.clone(), missions, damage);
        (sim, gm)
    }

    #[test]
    fn spawn_and_remove_round_trip() {
        let (sim, gm) = setup();
        gm.handle(GmCommand::SpawnShip {
            ship_id: "scout_1".into(),
            class_id: "scout".into(),
            name: "Scout One".into(),
            is_player: false,
            position: Vector3::new(10.0, 20.0, 30.0),
        })
        .unwrap();
        assert!(sim.get_ship("scout_1").is_some());

        gm.handle(GmCommand::RemoveShip { ship_id: "scout_1".into() }).unwrap();
        assert!(sim.get_ship("scout_1").is_none());
    }

    #[test]
    fn pause_resume_snapshot_restore() {
        let (sim, gm) = setup();
        gm.handle(GmCommand::Pause).unwrap();
        assert!(sim.is_paused());
        gm.handle(GmCommand::Resume).unwrap();
        assert!(!sim.is_paused());

        gm.handle(GmCommand::SpawnShip {
            ship_id: "scout_1".into(),
            class_id: "scout".into(),
            name: "Scout One".into(),
            is_player: false,
            position: Vector3::ZERO,
        })
        .unwrap();
        gm.handle(GmCommand::CreateSnapshot).unwrap();
        gm.handle(GmCommand::RemoveShip { ship_id: "scout_1".into() }).unwrap();
        gm.handle(GmCommand::RestoreSnapshot { index: 0 }).unwrap();
        assert!(sim.get_ship("scout_1").is_some());
    }

    #[test]
    fn restore_bad_index_fails_without_killing_session() {
        let (_sim, gm) = setup();
        assert!(matches!(
            gm.handle(GmCommand::RestoreSnapshot { index: 9 }),
            Err(GameError::NotFound(_))
        ));
    }

    #[test]
    fn typed_damage_reaches_the_ship() {
        let (sim, gm) = setup();
        gm.handle(GmCommand::SpawnShip {
            ship_id: "scout_1".into(),
            class_id: "scout".into(),
            name: "Scout One".into(),
            is_player: false,
            position: Vector3::ZERO,
        })
        .unwrap();

        gm.handle(GmCommand::DamageShip {
            ship_id: "scout_1".into(),
            amount: 40.0,
            location: "forward".into(),
            damage_type: Some("energy".into()),
        })
        .unwrap();

        sim.get_ship("scout_1").unwrap().with_state(|s| {
            assert_eq!(s.hull.sections["forward"].health, 140.0);
        });
    }

    #[test]
    fn damage_unknown_ship_is_not_found() {
        let (_sim, gm) = setup();
        assert!(matches!(
            gm.handle(GmCommand::DamageShip {
                ship_id: "ghost".into(),
                amount: 10.0,
                location: "forward".into(),
                damage_type: None,
            }),
            Err(GameError::NotFound(_))
        ));
    }

    #[test]
    fn modify_system_sets_health_and_flags() {
        let (sim, gm) = setup();
        gm.handle(GmCommand::SpawnShip {
            ship_id: "scout_1".into(),
            class_id: "scout".into(),
            name: "Scout One".into(),
            is_player: false,
            position: Vector3::ZERO,
        })
        .unwrap();

        gm.handle(GmCommand::ModifySystem {
            ship_id: "scout_1".into(),
            system_type: "engine".into(),
            system_id: "main_1".into(),
            property: "health".into(),
            value: json!(250.0),
        })
        .unwrap();
        gm.handle(GmCommand::ModifySystem {
            ship_id: "scout_1".into(),
            system_type: "engine".into(),
            system_id: "main_1".into(),
            property: "on_fire".into(),
            value: json!(true),
        })
        .unwrap();

        sim.get_ship("scout_1").unwrap().with_state(|s| {
            // clamped to max health
            assert_eq!(s.engines["main_1"].health, 100.0);
            assert!(s.engines["main_1"].on_fire);
        });
    }

    #[test]
    fn modify_hull_enabled_is_rejected() {
        let (_sim, gm) = setup();
        gm.handle(GmCommand::SpawnShip {
            ship_id: "scout_1".into(),
            class_id: "scout".into(),
            name: "Scout One".into(),
            is_player: false,
            position: Vector3::ZERO,
        })
        .unwrap();

        assert!(matches!(
            gm.handle(GmCommand::ModifySystem {
                ship_id: "scout_1".into(),
                system_type: "hull".into(),
                system_id: "forward".into(),
                property: "enabled".into(),
                value: json!(false),
            }),
            Err(GameError::Precondition(_))
        ));
    }

    #[test]
    fn tactical_mode_parse_rejects_unknown() {
        let (_sim, gm) = setup();
        assert!(matches!(
            gm.handle(GmCommand::SetAiTacticalMode {
                ship_id: "scout_1".into(),
                mode: "reckless".into(),
            }),
            Err(GameError::Precondition(_))
        ));
    }

    #[test]
    fn summary_reflects_world() {
        let (_sim, gm) = setup();
        gm.handle(GmCommand::SpawnShip {
            ship_id: "scout_1".into(),
            class_id: "scout".into(),
            name: "Scout One".into(),
            is_player: true,
            position: Vector3::ZERO,
        })
        .unwrap();
        gm.handle(GmCommand::CreateSnapshot).unwrap();

        let summary = gm.summary();
        assert_eq!(summary["snapshot_count"], 1);
        assert_eq!(summary["ships"].as_array().unwrap().len(), 1);
        assert_eq!(summary["ships"][0]["id"], "scout_1");
    }
}
