use crate::{Command, Event, Response, SessionSnapshot};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// The panel context (re)started; it must resync before advancing.
    Started,
    /// Full state answered by the orchestrator.
    StateReceived(SessionSnapshot),
    /// `get_state` could not be delivered; carry on with local state.
    ResyncFailed { error: String },
    /// The external collection step produced a fresh URL list.
    UrlsCollected(Vec<String>),
    /// Operator asked to start (or resume) processing.
    StartClicked,
    /// Operator cleared everything.
    ClearClicked,
    /// Orchestrator answered a `process_url`.
    ProcessReplied { url: String, response: Response },
    /// A `process_url` never reached the orchestrator.
    DeliveryFailed { url: String, error: String },
    /// Event pushed by the orchestrator.
    Event(Event),
    StallTimeout { token: u64 },
    AdvanceDue,
    NoOp,
}

impl Msg {
    /// Map the outcome of a sent command to the message the panel should see.
    /// Replies to fire-and-forget commands map to `None`.
    pub fn from_reply(command: &Command, reply: Result<Response, String>) -> Option<Msg> {
        match (command, reply) {
            (Command::GetState, Ok(response)) => {
                Some(Msg::StateReceived(response.state.unwrap_or_default()))
            }
            (Command::GetState, Err(error)) => Some(Msg::ResyncFailed { error }),
            (Command::ProcessUrl { url, .. }, Ok(response)) => Some(Msg::ProcessReplied {
                url: url.clone(),
                response,
            }),
            (Command::ProcessUrl { url, .. }, Err(error)) => Some(Msg::DeliveryFailed {
                url: url.clone(),
                error,
            }),
            _ => None,
        }
    }
}
