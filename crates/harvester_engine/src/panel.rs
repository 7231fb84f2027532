use std::collections::VecDeque;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use harvester_core::panel::{update, Effect, Msg, PanelState, PanelViewModel};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::orchestrator::OrchestratorHandle;
use crate::types::ChannelError;

/// Receives the panel's view model whenever it changed.
pub trait PanelView: Send {
    fn render(&mut self, view: &PanelViewModel);

    fn session_complete(&mut self, _summary: SessionSummary) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub completed: usize,
    pub failed: usize,
}

/// Handle to a running panel task.
pub struct PanelHandle {
    tx: mpsc::UnboundedSender<Msg>,
    complete: watch::Receiver<Option<SessionSummary>>,
}

impl PanelHandle {
    /// Start a panel against `orchestrator`. The panel resyncs with the
    /// orchestrator before doing anything else.
    pub fn spawn(
        orchestrator: OrchestratorHandle,
        state: PanelState,
        view: Box<dyn PanelView>,
    ) -> Result<(Self, JoinHandle<PanelState>), ChannelError> {
        let events = orchestrator.attach_panel()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let (complete_tx, complete) = watch::channel(None);
        let runtime = PanelRuntime {
            self_tx: tx.downgrade(),
            orchestrator,
            view,
            complete_tx,
        };
        let task = tokio::spawn(run(state, rx, events, runtime));
        Ok((Self { tx, complete }, task))
    }

    pub fn dispatch(&self, msg: Msg) -> Result<(), ChannelError> {
        self.tx.send(msg).map_err(|_| ChannelError::Stopped)
    }

    /// Wait until the queue is exhausted. `None` if the panel stopped first.
    pub async fn completed(&mut self) -> Option<SessionSummary> {
        match self.complete.wait_for(Option::is_some).await {
            Ok(summary) => *summary,
            Err(_) => None,
        }
    }
}

struct PanelRuntime {
    self_tx: mpsc::WeakUnboundedSender<Msg>,
    orchestrator: OrchestratorHandle,
    view: Box<dyn PanelView>,
    complete_tx: watch::Sender<Option<SessionSummary>>,
}

async fn run(
    mut state: PanelState,
    mut rx: mpsc::UnboundedReceiver<Msg>,
    mut events: mpsc::UnboundedReceiver<harvester_core::Event>,
    mut runtime: PanelRuntime,
) -> PanelState {
    state = runtime.process(state, Msg::Started).await;
    loop {
        let msg = tokio::select! {
            msg = rx.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
            event = events.recv() => match event {
                Some(event) => Msg::Event(event),
                None => {
                    engine_warn!("Orchestrator event channel closed");
                    break;
                }
            },
        };
        state = runtime.process(state, msg).await;
    }
    state
}

impl PanelRuntime {
    /// Apply `msg` and everything it leads to synchronously (command replies).
    async fn process(&mut self, mut state: PanelState, msg: Msg) -> PanelState {
        let mut queue = VecDeque::from([msg]);
        while let Some(msg) = queue.pop_front() {
            let (next, effects) = update(state, msg);
            state = next;
            for effect in effects {
                if let Some(follow_up) = self.execute(effect).await {
                    queue.push_back(follow_up);
                }
            }
        }
        if !state.is_complete() {
            self.complete_tx.send_if_modified(|summary| summary.take().is_some());
        }
        if state.consume_dirty() {
            self.view.render(&state.view());
        }
        state
    }

    async fn execute(&mut self, effect: Effect) -> Option<Msg> {
        match effect {
            Effect::Send(command) => {
                engine_debug!("Panel sends {}", command.kind());
                let reply = self
                    .orchestrator
                    .send(command.clone())
                    .await
                    .map_err(|err| err.to_string());
                Msg::from_reply(&command, reply)
            }
            Effect::ArmStallTimer { token, after } => {
                self.deliver_after(after, Msg::StallTimeout { token });
                None
            }
            Effect::ScheduleAdvance { after } => {
                self.deliver_after(after, Msg::AdvanceDue);
                None
            }
            Effect::SessionComplete { completed, failed } => {
                engine_info!("Session complete: {} completed, {} failed", completed, failed);
                let summary = SessionSummary { completed, failed };
                self.view.session_complete(summary);
                self.complete_tx.send_replace(Some(summary));
                None
            }
        }
    }

    fn deliver_after(&self, after: Duration, msg: Msg) {
        let self_tx = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(tx) = self_tx.upgrade() {
                let _ = tx.send(msg);
            }
        });
    }
}
