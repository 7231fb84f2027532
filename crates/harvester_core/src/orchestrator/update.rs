use super::{Dispatch, Effect, Msg, OrchestratorState, Phase};
use crate::{check_keys, Command, Event, KeyCheck, PlaceRecord, Response, SessionSnapshot};

/// Pure update function: applies a message to the orchestrator and returns
/// the effects the runtime must carry out.
pub fn update(mut state: OrchestratorState, msg: Msg) -> (OrchestratorState, Vec<Effect>) {
    let effects = match msg {
        Msg::Command(command) => handle_command(&mut state, command),
        Msg::NavigationFinished { request_id, ok } => {
            if ok || !state.is_current(request_id) || state.phase != Phase::AwaitingCapture {
                Vec::new()
            } else {
                schedule_retry(&mut state, "navigation failed: no tab could be updated or opened")
            }
        }
        Msg::TabOpened { request_id, tab_id } => {
            if state.is_current(request_id) {
                if let Some(dispatch) = state.dispatch.as_mut() {
                    dispatch.tab_id = Some(tab_id);
                }
            }
            Vec::new()
        }
        Msg::CaptureSignal { tab_id, .. } => on_capture_signal(&mut state, tab_id.as_deref()),
        Msg::CaptureTimedOut { request_id } => {
            if state.is_current(request_id) && state.phase == Phase::AwaitingCapture {
                schedule_retry(&mut state, "no place data captured before timeout")
            } else {
                Vec::new()
            }
        }
        Msg::ExtractionFinished { request_id, record } => {
            if state.is_current(request_id) && state.phase == Phase::Extracting {
                on_extracted(&mut state, record)
            } else {
                Vec::new()
            }
        }
        Msg::EnrichmentFinished { request_id, record } => {
            if state.is_current(request_id) && state.phase == Phase::Enriching {
                record_result(&mut state, record)
            } else {
                Vec::new()
            }
        }
        Msg::RetryDue { request_id } => {
            if state.is_current(request_id) && state.phase == Phase::Retrying {
                on_retry_due(&mut state)
            } else {
                Vec::new()
            }
        }
    };

    (state, effects)
}

fn handle_command(state: &mut OrchestratorState, command: Command) -> Vec<Effect> {
    match command {
        Command::GetState => vec![Effect::Reply(Response::with_state(state.snapshot()))],
        Command::SetCollectedUrls { urls } => {
            state.session.set_collected_urls(&urls);
            vec![
                Effect::Reply(Response::ok()),
                Effect::Persist(state.snapshot()),
            ]
        }
        Command::ProcessUrl { url, state: incoming } => process_url(state, url, incoming),
        Command::ClearCapturedData => {
            let mut effects: Vec<Effect> = abandon_dispatch(state).into_iter().collect();
            state.session.reset();
            state.locked = false;
            effects.push(Effect::Reply(Response::ok()));
            effects.push(Effect::Persist(state.snapshot()));
            effects
        }
        Command::ProcessingComplete => {
            let mut effects: Vec<Effect> = abandon_dispatch(state).into_iter().collect();
            state.session.set_complete(true);
            effects.push(Effect::Reply(Response::ok()));
            effects.push(Effect::Persist(state.snapshot()));
            effects
        }
    }
}

fn process_url(
    state: &mut OrchestratorState,
    url: String,
    incoming: Option<SessionSnapshot>,
) -> Vec<Effect> {
    let mut effects = Vec::new();
    if state.locked {
        effects.extend(abandon_dispatch(state));
        state.locked = false;
    }

    let url = url.trim().to_string();
    if url.is_empty() {
        effects.push(Effect::Reply(Response::rejected("empty url")));
        return effects;
    }
    if let Some(dispatch) = &state.dispatch {
        effects.push(Effect::Reply(Response::busy(&dispatch.url)));
        return effects;
    }
    if state.session.is_complete() {
        effects.push(Effect::Reply(Response::rejected("session already complete")));
        return effects;
    }

    if let Some(snapshot) = incoming {
        state.session.apply_snapshot(&snapshot);
    }
    state.session.jobs_mut().push(&url);
    if state.session.jobs().retries_exhausted(&url) {
        effects.push(Effect::Reply(Response::exhausted(&url)));
        return effects;
    }

    effects.push(Effect::Reply(Response::ok()));
    effects.extend(start_attempt(state, url));
    effects
}

fn start_attempt(state: &mut OrchestratorState, url: String) -> Vec<Effect> {
    let request_id = state.mint_request_id();
    let attempt = state.session.jobs().retry_count(&url) + 1;
    state.session.jobs_mut().mark_in_flight(&url);
    state.session.set_active_job(Some(url.clone()));
    state.dispatch = Some(Dispatch {
        url: url.clone(),
        request_id,
        attempt,
        tab_id: None,
        has_processed_signal: false,
    });
    state.phase = Phase::AwaitingCapture;

    vec![
        Effect::Navigate { request_id, url },
        Effect::ArmCaptureTimeout {
            request_id,
            after: state.config.capture_timeout,
        },
    ]
}

fn on_capture_signal(state: &mut OrchestratorState, tab_id: Option<&str>) -> Vec<Effect> {
    if state.phase != Phase::AwaitingCapture {
        return Vec::new();
    }
    let Some(dispatch) = state.dispatch.as_mut() else {
        return Vec::new();
    };
    // Later signals for the same attempt are ignored, as are responses from a
    // tab other than the one this attempt navigated.
    if dispatch.has_processed_signal {
        return Vec::new();
    }
    if let (Some(expected), Some(actual)) = (dispatch.tab_id.as_deref(), tab_id) {
        if expected != actual {
            return Vec::new();
        }
    }
    dispatch.has_processed_signal = true;
    state.phase = Phase::Extracting;
    vec![Effect::Extract {
        request_id: dispatch.request_id,
        url: dispatch.url.clone(),
    }]
}

fn on_extracted(state: &mut OrchestratorState, record: Option<PlaceRecord>) -> Vec<Effect> {
    let Some(record) = record else {
        return schedule_retry(state, "no usable place data on page");
    };
    if !record.has_key() {
        return schedule_retry(state, "extracted record has no place id");
    }
    let Some(request_id) = state.dispatch.as_ref().map(|dispatch| dispatch.request_id) else {
        return Vec::new();
    };

    let expected = state
        .dispatch
        .as_ref()
        .and_then(|dispatch| state.keys.derive(&dispatch.url))
        .map(|derived| derived.key);
    match check_keys(expected.as_deref(), Some(record.place_id.as_str())) {
        KeyCheck::Mismatch => {
            let reason = format!(
                "place id mismatch: url has {}, page reported {}",
                expected.unwrap_or_default(),
                record.place_id
            );
            schedule_retry(state, reason)
        }
        KeyCheck::Match | KeyCheck::Unverifiable => {
            if state.config.enrich {
                state.phase = Phase::Enriching;
                vec![Effect::Enrich { request_id, record }]
            } else {
                record_result(state, record)
            }
        }
    }
}

fn record_result(state: &mut OrchestratorState, mut record: PlaceRecord) -> Vec<Effect> {
    let Some(dispatch) = state.dispatch.take() else {
        return Vec::new();
    };
    if record.url.is_empty() {
        record.url = dispatch.url.clone();
    }
    state.session.record_result(&dispatch.url, record.clone());
    state.session.set_active_job(None);
    state.phase = Phase::Idle;

    let persisted = state.session.snapshot();
    let mut current_state = persisted.clone();
    current_state.current_url = Some(dispatch.url);
    vec![
        Effect::CancelNavigation {
            request_id: dispatch.request_id,
        },
        Effect::Emit(Event::XhrCaptured {
            data: record,
            current_state,
        }),
        Effect::Persist(persisted),
    ]
}

fn schedule_retry(state: &mut OrchestratorState, reason: impl Into<String>) -> Vec<Effect> {
    let Some(dispatch) = state.dispatch.as_ref() else {
        return Vec::new();
    };
    let url = dispatch.url.clone();
    let request_id = dispatch.request_id;
    let retries = state.session.jobs().retry_count(&url);
    if !state.config.retry.allows_retry(retries) {
        return fail_job(state, reason.into());
    }

    state.session.jobs_mut().increment_retry(&url);
    state.phase = Phase::Retrying;
    vec![
        Effect::CancelNavigation { request_id },
        Effect::ScheduleRetry {
            request_id,
            after: state.config.retry.backoff(retries),
        },
        Effect::Emit(Event::RetryProcessing { url }),
    ]
}

fn fail_job(state: &mut OrchestratorState, reason: String) -> Vec<Effect> {
    let Some(dispatch) = state.dispatch.take() else {
        return Vec::new();
    };
    state.session.jobs_mut().mark_failed(&dispatch.url);
    state.session.set_active_job(None);
    state.phase = Phase::Idle;

    let error = format!(
        "Failed to process location data after {} attempts: {reason}",
        dispatch.attempt
    );
    vec![
        Effect::CancelNavigation {
            request_id: dispatch.request_id,
        },
        Effect::Emit(Event::AuthFailed {
            url: dispatch.url,
            error,
        }),
        Effect::Persist(state.session.snapshot()),
    ]
}

fn on_retry_due(state: &mut OrchestratorState) -> Vec<Effect> {
    if state.session.is_complete() {
        return abandon_dispatch(state).into_iter().collect();
    }
    let Some(url) = state.dispatch.as_ref().map(|dispatch| dispatch.url.clone()) else {
        return Vec::new();
    };
    start_attempt(state, url)
}

/// Drop the in-flight job, if any, returning it to pending.
fn abandon_dispatch(state: &mut OrchestratorState) -> Option<Effect> {
    state.phase = Phase::Idle;
    let active = state.session.active_job().map(str::to_string);
    state.session.set_active_job(None);
    let dispatch = state.dispatch.take();
    if let Some(url) = dispatch.as_ref().map(|d| d.url.as_str()).or(active.as_deref()) {
        state.session.jobs_mut().release(url);
    }
    dispatch.map(|dispatch| Effect::CancelNavigation {
        request_id: dispatch.request_id,
    })
}
