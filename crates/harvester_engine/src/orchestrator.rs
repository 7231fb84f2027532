use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use engine_logging::{
    engine_debug, engine_error, engine_info, engine_warn, set_dispatch_context,
    with_dispatch_context,
};
use harvester_core::orchestrator::{update, Effect, Msg, OrchestratorState};
use harvester_core::{Command, Event, RequestId, Response, SessionSnapshot};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::enrich::Summarizer;
use crate::extract::PageExtractor;
use crate::navigate::NavigationController;
use crate::persist::SnapshotStore;
use crate::types::{ChannelError, ExtractError, NavigationError};

/// Everything the orchestrator needs from the outside world.
pub struct Collaborators {
    pub navigator: NavigationController,
    pub extractor: Arc<dyn PageExtractor>,
    pub summarizer: Arc<dyn Summarizer>,
    pub store: Arc<dyn SnapshotStore>,
    pub extraction_timeout: Duration,
}

enum Input {
    Command {
        command: Command,
        reply: oneshot::Sender<Response>,
    },
    Msg(Msg),
    AttachPanel(mpsc::UnboundedSender<Event>),
}

/// Cloneable handle to the orchestrator task.
#[derive(Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::UnboundedSender<Input>,
}

impl OrchestratorHandle {
    /// Start the orchestrator on the current tokio runtime. The task ends
    /// when every handle is dropped and returns the final state.
    pub fn spawn(
        state: OrchestratorState,
        collaborators: Collaborators,
    ) -> (Self, JoinHandle<OrchestratorState>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let runtime = Runtime {
            self_tx: tx.downgrade(),
            navigator: Arc::new(collaborators.navigator),
            extractor: collaborators.extractor,
            summarizer: collaborators.summarizer,
            store: collaborators.store,
            extraction_timeout: collaborators.extraction_timeout,
            navigations: HashMap::new(),
            panel: None,
            undelivered: VecDeque::new(),
        };
        let task = tokio::spawn(run(state, rx, runtime));
        (Self { tx }, task)
    }

    /// Send a command and wait for its reply.
    pub async fn send(&self, command: Command) -> Result<Response, ChannelError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Input::Command { command, reply })
            .map_err(|_| ChannelError::Stopped)?;
        response.await.map_err(|_| ChannelError::ReplyDropped)
    }

    /// Subscribe to events. Replaces any previously attached panel; events
    /// that could not be delivered earlier are flushed to the new one first.
    pub fn attach_panel(&self) -> Result<mpsc::UnboundedReceiver<Event>, ChannelError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.tx
            .send(Input::AttachPanel(events_tx))
            .map_err(|_| ChannelError::Stopped)?;
        Ok(events_rx)
    }

    /// Report a place data response observed in `tab_id`, when the browser
    /// knows which tab it came from.
    pub fn capture_signal(&self, url: String, tab_id: Option<String>) -> Result<(), ChannelError> {
        self.tx
            .send(Input::Msg(Msg::CaptureSignal { url, tab_id }))
            .map_err(|_| ChannelError::Stopped)
    }
}

struct Runtime {
    self_tx: mpsc::WeakUnboundedSender<Input>,
    navigator: Arc<NavigationController>,
    extractor: Arc<dyn PageExtractor>,
    summarizer: Arc<dyn Summarizer>,
    store: Arc<dyn SnapshotStore>,
    extraction_timeout: Duration,
    navigations: HashMap<RequestId, CancellationToken>,
    panel: Option<mpsc::UnboundedSender<Event>>,
    undelivered: VecDeque<Event>,
}

async fn run(
    mut state: OrchestratorState,
    mut rx: mpsc::UnboundedReceiver<Input>,
    mut runtime: Runtime,
) -> OrchestratorState {
    while let Some(input) = rx.recv().await {
        let (msg, mut reply) = match input {
            Input::Command { command, reply } => {
                engine_debug!("Command {}", command.kind());
                (Msg::Command(command), Some(reply))
            }
            Input::Msg(msg) => (msg, None),
            Input::AttachPanel(events) => {
                runtime.attach(events);
                continue;
            }
        };

        let previous = state.dispatch().map(|dispatch| dispatch.request_id);
        let (next, effects) = update(state, msg);
        state = next;
        set_dispatch_context(state.dispatch().map(|d| d.request_id).or(previous));
        for effect in effects {
            runtime.execute(effect, &mut reply);
        }
        set_dispatch_context(None);
        // A command whose reply was not part of the effects still gets one.
        if let Some(reply) = reply {
            let _ = reply.send(Response::ok());
        }
    }
    runtime.cancel_all();
    state
}

impl Runtime {
    fn execute(&mut self, effect: Effect, reply: &mut Option<oneshot::Sender<Response>>) {
        match effect {
            Effect::Reply(response) => {
                if let Some(reply) = reply.take() {
                    let _ = reply.send(response);
                }
            }
            Effect::Navigate { request_id, url } => self.navigate(request_id, url),
            Effect::ArmCaptureTimeout { request_id, after } => {
                self.deliver_after(after, Msg::CaptureTimedOut { request_id });
            }
            Effect::Extract { request_id, url } => self.extract(request_id, url),
            Effect::Enrich { request_id, record } => {
                let summarizer = self.summarizer.clone();
                self.spawn_msg(async move {
                    let mut record = record;
                    let enrichment = summarizer.summarize(&record).await;
                    if enrichment.processed {
                        record.summary = enrichment.summary;
                    }
                    Msg::EnrichmentFinished { request_id, record }
                });
            }
            Effect::ScheduleRetry { request_id, after } => {
                engine_info!("Retrying in {:?}", after);
                self.deliver_after(after, Msg::RetryDue { request_id });
            }
            Effect::CancelNavigation { request_id } => {
                if let Some(token) = self.navigations.remove(&request_id) {
                    token.cancel();
                }
            }
            Effect::Emit(event) => self.emit(event),
            Effect::Persist(snapshot) => self.persist(&snapshot),
        }
    }

    fn navigate(&mut self, request_id: RequestId, url: String) {
        let token = CancellationToken::new();
        self.navigations.insert(request_id, token.clone());
        let navigator = self.navigator.clone();
        engine_info!("Navigating to {}", url);
        let self_tx = self.self_tx.clone();
        tokio::spawn(async move {
            let ok = match open_and_settle(&navigator, &self_tx, request_id, &url, &token).await {
                Ok(()) => true,
                Err(NavigationError::Cancelled) => return,
                Err(err) => {
                    with_dispatch_context(request_id, || {
                        engine_warn!("Navigation to {} failed: {}", url, err)
                    });
                    false
                }
            };
            send_upgraded(&self_tx, Msg::NavigationFinished { request_id, ok });
        });
    }

    fn extract(&self, request_id: RequestId, url: String) {
        let extractor = self.extractor.clone();
        let limit = self.extraction_timeout;
        self.spawn_msg(async move {
            let outcome = tokio::time::timeout(limit, extractor.extract(&url))
                .await
                .unwrap_or(Err(ExtractError::Timeout));
            let record = match outcome {
                Ok(record) => record,
                Err(err) => {
                    with_dispatch_context(request_id, || {
                        engine_warn!("Extraction of {} failed: {}", url, err)
                    });
                    None
                }
            };
            Msg::ExtractionFinished { request_id, record }
        });
    }

    fn emit(&mut self, event: Event) {
        if let Some(panel) = &self.panel {
            match panel.send(event) {
                Ok(()) => return,
                Err(mpsc::error::SendError(event)) => {
                    engine_debug!("Panel detached; buffering event for {}", event.url());
                    self.panel = None;
                    self.undelivered.push_back(event);
                }
            }
        } else {
            self.undelivered.push_back(event);
        }
    }

    fn attach(&mut self, events: mpsc::UnboundedSender<Event>) {
        while let Some(event) = self.undelivered.pop_front() {
            if let Err(mpsc::error::SendError(event)) = events.send(event) {
                self.undelivered.push_front(event);
                return;
            }
        }
        self.panel = Some(events);
    }

    fn persist(&self, snapshot: &SessionSnapshot) {
        if let Err(err) = self.store.save(snapshot) {
            engine_error!("Failed to persist session snapshot: {}", err);
        }
    }

    fn deliver_after(&self, after: Duration, msg: Msg) {
        self.spawn_msg(async move {
            tokio::time::sleep(after).await;
            msg
        });
    }

    fn spawn_msg<F>(&self, future: F)
    where
        F: std::future::Future<Output = Msg> + Send + 'static,
    {
        let self_tx = self.self_tx.clone();
        tokio::spawn(async move {
            let msg = future.await;
            send_upgraded(&self_tx, msg);
        });
    }

    fn cancel_all(&mut self) {
        for (_, token) in self.navigations.drain() {
            token.cancel();
        }
    }
}

/// Open the tab, report which one it is, then wait for the page to settle.
async fn open_and_settle(
    navigator: &NavigationController,
    self_tx: &mpsc::WeakUnboundedSender<Input>,
    request_id: RequestId,
    url: &str,
    cancel: &CancellationToken,
) -> Result<(), NavigationError> {
    let tab_id = navigator.open_tab(url, cancel).await?;
    send_upgraded(self_tx, Msg::TabOpened { request_id, tab_id });
    navigator.settle(cancel).await
}

fn send_upgraded(self_tx: &mpsc::WeakUnboundedSender<Input>, msg: Msg) {
    if let Some(tx) = self_tx.upgrade() {
        let _ = tx.send(Input::Msg(msg));
    }
}
