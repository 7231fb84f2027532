//! The privileged controller: owns the browser tab and runs one job at a time.
mod effect;
mod msg;
mod state;
mod update;

pub use effect::Effect;
pub use msg::Msg;
pub use state::{Dispatch, OrchestratorConfig, OrchestratorState, Phase};
pub use update::update;
