use crate::{Command, PlaceRecord, RequestId};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// A command from the panel.
    Command(Command),
    /// Navigation for an attempt finished; `ok` is false when neither updating
    /// nor creating a tab worked.
    NavigationFinished { request_id: RequestId, ok: bool },
    /// The navigation for an attempt picked or opened `tab_id`.
    TabOpened { request_id: RequestId, tab_id: String },
    /// The capture listener saw a network completion matching the place data
    /// pattern, in `tab_id` when the browser reports it.
    CaptureSignal { url: String, tab_id: Option<String> },
    CaptureTimedOut { request_id: RequestId },
    /// `None` covers both "nothing usable on the page" and collaborator errors.
    ExtractionFinished {
        request_id: RequestId,
        record: Option<PlaceRecord>,
    },
    EnrichmentFinished {
        request_id: RequestId,
        record: PlaceRecord,
    },
    RetryDue { request_id: RequestId },
}
