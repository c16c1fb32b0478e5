//! World simulation modules

pub mod ai;
pub mod damage;
pub mod simulator;

pub use ai::{AiController, AiState, TacticalMode, TorpedoLaunch};
pub use damage::{DamageController, DamageKind};
pub use simulator::{Projectile, Simulator, Snapshot, WorldObject};
