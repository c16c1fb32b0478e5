//! Mission engine - scripted scenarios on an embedded interpreter
//!
//! Missions are Rhai scripts that define `on_start()` and optionally
//! `on_event(name, params)`. The script API is a fixed set of world
//! mutators registered on a fresh, operation-limited engine per mission,
//! so a runaway or failing script is confined to that mission. At most one
//! mission is active at a time.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rhai::{Dynamic, Map, Scope, AST};
use tracing::{error, info, warn};

use crate::config::ConfigError;
use crate::error::{GameError, GameResult};
use crate::ship::Vector3;
use crate::sim::Simulator;

/// Hard ceiling on script operations per call, so a looping script cannot
/// stall the dispatch thread
const MAX_SCRIPT_OPS: u64 = 500_000;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MissionStatus {
    #[default]
    Running,
    Won,
    Lost(String),
}

#[derive(Debug, Clone)]
pub struct Objective {
    pub id: String,
    pub description: String,
    pub completed: bool,
}

/// Script-visible mission state, shared with the registered API functions
#[derive(Debug, Default)]
pub struct MissionRuntime {
    pub objectives: Vec<Objective>,
    pub status: MissionStatus,
}

struct ActiveMission {
    id: String,
    engine: rhai::Engine,
    ast: AST,
    scope: Scope<'static>,
    runtime: Arc<Mutex<MissionRuntime>>,
}

struct Inner {
    missions: HashMap<String, String>,
    active: Option<ActiveMission>,
}

pub struct MissionEngine {
    simulator: Arc<Simulator>,
    inner: Mutex<Inner>,
}

impl MissionEngine {
    pub fn new(simulator: Arc<Simulator>) -> Self {
        Self {
            simulator,
            inner: Mutex::new(Inner {
                missions: HashMap::new(),
                active: None,
            }),
        }
    }

    /// Load every `*.rhai` script from a directory, keyed by file stem
    pub fn load_missions(&self, dir: impl AsRef<Path>) -> Result<usize, ConfigError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| ConfigError::Read(dir.display().to_string(), e))?;

        let mut count = 0;
        for entry in entries {
            let entry = entry.map_err(|e| ConfigError::Read(dir.display().to_string(), e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("rhai") {
                continue;
            }

            let source = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::Read(path.display().to_string(), e))?;
            let id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("mission")
                .to_string();

            info!(mission_id = %id, "loaded mission");
            self.register_mission(&id, &source);
            count += 1;
        }

        Ok(count)
    }

    pub fn register_mission(&self, id: &str, source: &str) {
        let mut inner = self.lock();
        inner.missions.insert(id.to_string(), source.to_string());
    }

    pub fn mission_ids(&self) -> Vec<String> {
        let inner = self.lock();
        let mut ids: Vec<String> = inner.missions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Start a mission: compile its script, register the API and run
    /// `on_start`. Starting while another mission is active is a
    /// precondition error.
    pub fn start_mission(&self, mission_id: &str) -> GameResult<()> {
        let mut inner = self.lock();

        if let Some(active) = &inner.active {
            return Err(GameError::Precondition(format!(
                "mission {} is already active",
                active.id
            )));
        }

        let source = inner
            .missions
            .get(mission_id)
            .ok_or_else(|| GameError::NotFound(format!("mission {mission_id}")))?
            .clone();

        let runtime = Arc::new(Mutex::new(MissionRuntime::default()));
        let engine = self.build_engine(runtime.clone());

        let ast = engine
            .compile(&source)
            .map_err(|e| GameError::Script(format!("compiling {mission_id}: {e}")))?;

        let mut active = ActiveMission {
            id: mission_id.to_string(),
            engine,
            ast,
            scope: Scope::new(),
            runtime,
        };

        call_script_fn(&mut active, "on_start", ())?;

        info!(mission_id, "mission started");
        inner.active = Some(active);
        Ok(())
    }

    /// Stop the active mission and release its script resources
    pub fn stop_mission(&self) {
        let mut inner = self.lock();
        if let Some(active) = inner.active.take() {
            info!(mission_id = %active.id, "mission stopped");
        }
    }

    /// Dispatch an external event into the active mission's `on_event`.
    /// Script failure stops the mission; the simulator is unaffected.
    pub fn trigger_event(&self, event: &str, params: serde_json::Value) -> GameResult<()> {
        let mut inner = self.lock();
        let Some(active) = inner.active.as_mut() else {
            return Ok(());
        };

        let map = json_to_map(&params);
        let result = call_script_fn(active, "on_event", (event.to_string(), map));

        if let Err(e) = &result {
            error!(mission_id = %active.id, error = %e, "mission event failed, stopping mission");
            inner.active = None;
        }
        result
    }

    pub fn active_mission_id(&self) -> Option<String> {
        self.lock().active.as_ref().map(|m| m.id.clone())
    }

    pub fn status(&self) -> Option<MissionStatus> {
        let inner = self.lock();
        inner.active.as_ref().map(|m| {
            m.runtime
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .status
                .clone()
        })
    }

    pub fn objectives(&self) -> Vec<Objective> {
        let inner = self.lock();
        inner
            .active
            .as_ref()
            .map(|m| {
                m.runtime
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .objectives
                    .clone()
            })
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fresh engine with the restricted mission API registered
    fn build_engine(&self, runtime: Arc<Mutex<MissionRuntime>>) -> rhai::Engine {
        let mut engine = rhai::Engine::new();
        engine.set_max_operations(MAX_SCRIPT_OPS);

        let sim = self.simulator.clone();
        engine.register_fn(
            "spawn_ship",
            move |id: &str, class_id: &str, name: &str, is_player: bool, pos: Map| -> bool {
                let position = map_to_vector(&pos);
                match sim.spawn_ship(id, class_id, name, is_player, position) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(error = %e, "mission spawn_ship failed");
                        false
                    }
                }
            },
        );

        let sim = self.simulator.clone();
        engine.register_fn("remove_ship", move |id: &str| {
            sim.remove_ship(id);
        });

        let sim = self.simulator.clone();
        engine.register_fn("spawn_object", move |id: &str, kind: &str, pos: Map| {
            sim.spawn_object(id, kind, map_to_vector(&pos));
        });

        let sim = self.simulator.clone();
        engine.register_fn("remove_object", move |id: &str| {
            sim.remove_object(id);
        });

        let sim = self.simulator.clone();
        engine.register_fn("damage_ship", move |id: &str, amount: f64, location: &str| {
            if let Some(ship) = sim.get_ship(id) {
                ship.take_damage(amount, location);
            }
        });
        let sim = self.simulator.clone();
        engine.register_fn("damage_ship", move |id: &str, amount: i64, location: &str| {
            if let Some(ship) = sim.get_ship(id) {
                ship.take_damage(amount as f64, location);
            }
        });

        let rt = runtime.clone();
        engine.register_fn("set_objective", move |id: &str, description: &str| {
            let mut rt = rt.lock().unwrap_or_else(|e| e.into_inner());
            rt.objectives.push(Objective {
                id: id.to_string(),
                description: description.to_string(),
                completed: false,
            });
            info!(objective_id = id, description, "objective set");
        });

        let rt = runtime.clone();
        engine.register_fn("complete_objective", move |id: &str| {
            let mut rt = rt.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(obj) = rt.objectives.iter_mut().find(|o| o.id == id) {
                obj.completed = true;
                info!(objective_id = id, "objective completed");
            }
        });

        let rt = runtime.clone();
        engine.register_fn("mission_win", move || {
            let mut rt = rt.lock().unwrap_or_else(|e| e.into_inner());
            rt.status = MissionStatus::Won;
            info!("mission won");
        });

        let rt = runtime;
        engine.register_fn("mission_lose", move |reason: &str| {
            let mut rt = rt.lock().unwrap_or_else(|e| e.into_inner());
            rt.status = MissionStatus::Lost(reason.to_string());
            info!(reason, "mission lost");
        });

        engine.register_fn("log", |message: &str| {
            info!(target: "mission", "{message}");
        });

        engine
    }
}

/// Call a script function, tolerating its absence
fn call_script_fn(
    active: &mut ActiveMission,
    name: &str,
    args: impl rhai::FuncArgs,
) -> GameResult<()> {
    let result =
        active
            .engine
            .call_fn::<Dynamic>(&mut active.scope, &active.ast, name, args);

    match result {
        Ok(_) => Ok(()),
        // Only the entry point itself may be absent; a missing function
        // *inside* the script is a real script error
        Err(e) => match *e {
            rhai::EvalAltResult::ErrorFunctionNotFound(missing, _)
                if missing.starts_with(name) =>
            {
                warn!(mission_id = %active.id, function = name, "script function not defined");
                Ok(())
            }
            other => Err(GameError::Script(format!("{name}: {other}"))),
        },
    }
}

fn map_to_vector(map: &Map) -> Vector3 {
    Vector3::new(map_f64(map, "x"), map_f64(map, "y"), map_f64(map, "z"))
}

fn map_f64(map: &Map, key: &str) -> f64 {
    map.get(key)
        .map(|v| {
            v.as_float()
                .or_else(|_| v.as_int().map(|i| i as f64))
                .unwrap_or(0.0)
        })
        .unwrap_or(0.0)
}

fn json_to_map(value: &serde_json::Value) -> Map {
    let mut map = Map::new();
    if let Some(obj) = value.as_object() {
        for (k, v) in obj {
            map.insert(k.as_str().into(), json_to_dynamic(v));
        }
    }
    map
}

fn json_to_dynamic(value: &serde_json::Value) -> Dynamic {
    match value {
        serde_json::Value::Null => Dynamic::UNIT,
        serde_json::Value::Bool(b) => (*b).into(),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.into()
            } else {
                n.as_f64().unwrap_or(0.0).into()
            }
        }
        serde_json::Value::String(s) => s.clone().into(),
        serde_json::Value::Array(items) => {
            let arr: rhai::Array = items.iter().map(json_to_dynamic).collect();
            arr.into()
        }
        serde_json::Value::Object(_) => json_to_map(value).into(),
    }
}
