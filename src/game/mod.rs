// Round engine: the pure reducer and the actors that own each lobby

// Public API
pub use actor::{ActorContext, Command, CommitOutcome};
pub use engine::{apply, check_invariants, check_turn_order, ApplyContext, Effect, Transition};
pub use errors::{ErrorCode, GameError};
pub use generator::{
    GenerationError, HttpOptionGenerator, OptionGenerator, PlaceholderOptionGenerator,
};
pub use intents::Intent;
pub use manager::LobbyManager;
pub use rules::{GameRules, PlayerOrder};

pub mod actor;
pub mod engine;
pub mod errors;
pub mod generator;
pub mod intents;
mod manager;
pub mod rules;
pub mod scorer;
pub mod timer;
