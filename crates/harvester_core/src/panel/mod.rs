//! The user-facing driver: owns the intended job list and asks the
//! orchestrator to advance one job at a time.
mod effect;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use msg::Msg;
pub use state::{Outstanding, PanelConfig, PanelState};
pub use update::update;
pub use view_model::{PanelViewModel, RowStatus, RowView};
