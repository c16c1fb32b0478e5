//! Application state shared across network handlers

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::{PanelMapping, ServerConfig, ShipClass};
use crate::gm::GameMaster;
use crate::input::ActionRouter;
use crate::mission::MissionEngine;
use crate::net::tcp::PanelRegistry;
use crate::net::ws::UiClientRegistry;
use crate::panel::PanelStateManager;
use crate::sim::{DamageController, Simulator};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub simulator: Arc<Simulator>,
    pub missions: Arc<MissionEngine>,
    pub gm: Arc<GameMaster>,
    pub router: Arc<ActionRouter>,
    pub panel_mappings: Arc<PanelMapping>,
    pub panel_states: Arc<PanelStateManager>,
    pub ui_clients: Arc<UiClientRegistry>,
    pub panels: Arc<PanelRegistry>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        ship_classes: HashMap<String, ShipClass>,
        panel_mappings: PanelMapping,
    ) -> Self {
        let config = Arc::new(config);

        let simulator = Arc::new(Simulator::new(config.tick_rate, ship_classes, config.seed));
        let damage = Arc::new(Mutex::new(DamageController::new(config.seed)));
        let missions = Arc::new(MissionEngine::new(simulator.clone()));
        let gm = Arc::new(GameMaster::new(
            simulator.clone(),
            missions.clone(),
            damage.clone(),
        ));
        let router = Arc::new(ActionRouter::new(simulator.clone(), damage));

        Self {
            config,
            simulator,
            missions,
            gm,
            router,
            panel_mappings: Arc::new(panel_mappings),
            panel_states: Arc::new(PanelStateManager::new()),
            ui_clients: Arc::new(UiClientRegistry::new()),
            panels: Arc::new(PanelRegistry::new()),
        }
    }
}
