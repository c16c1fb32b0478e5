//! Shared error kinds for intent handling and scripting

/// Errors surfaced back to the client or GM that requested an operation.
///
/// Transport failures are handled at the connection that produced them and
/// never appear here; config failures live in [`crate::config::ConfigError`].
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// Unknown ship, weapon, panel, action or snapshot index. No state was mutated.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation's preconditions were not met (torpedo not ready, no
    /// target, no ammo, on cooldown). No state was mutated.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A mission script failed at runtime. The mission is stopped; the
    /// simulator is unaffected.
    #[error("script error: {0}")]
    Script(String),

    /// Invariant violation. Logged and survived; must never crash the simulator.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GameError {
    /// Stable machine-readable code for wire feedback
    pub fn code(&self) -> &'static str {
        match self {
            GameError::NotFound(_) => "not_found",
            GameError::Precondition(_) => "precondition_failed",
            GameError::Script(_) => "script_error",
            GameError::Internal(_) => "internal_error",
        }
    }
}

pub type GameResult<T> = Result<T, GameError>;
