use std::time::Duration;

use crate::Command;

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send a command to the orchestrator; the reply comes back through
    /// [`crate::panel::Msg::from_reply`].
    Send(Command),
    /// Deliver `Msg::StallTimeout { token }` after `after`.
    ArmStallTimer { token: u64, after: Duration },
    /// Deliver `Msg::AdvanceDue` after `after`.
    ScheduleAdvance { after: Duration },
    /// The queue is exhausted.
    SessionComplete { completed: usize, failed: usize },
}
