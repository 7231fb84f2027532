use std::time::Duration;

use crate::{Event, PlaceRecord, RequestId, Response, SessionSnapshot};

/// Side effects requested by the orchestrator state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Answer the command currently being handled.
    Reply(Response),
    /// Point the tab at `url`; report back with `Msg::NavigationFinished`.
    Navigate { request_id: RequestId, url: String },
    /// Deliver `Msg::CaptureTimedOut` after `after` unless the attempt moved on.
    ArmCaptureTimeout { request_id: RequestId, after: Duration },
    /// Run the extraction collaborator against the live page.
    Extract { request_id: RequestId, url: String },
    /// Run the enrichment collaborator over a validated record.
    Enrich { request_id: RequestId, record: PlaceRecord },
    /// Deliver `Msg::RetryDue` after the backoff delay.
    ScheduleRetry { request_id: RequestId, after: Duration },
    /// Stop waiting on the navigation of an attempt that has been resolved.
    CancelNavigation { request_id: RequestId },
    Emit(Event),
    Persist(SessionSnapshot),
}
