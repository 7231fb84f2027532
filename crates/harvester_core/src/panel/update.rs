use super::{Effect, Msg, Outstanding, PanelState};
use crate::{keys_agree, Command, Event, PlaceRecord, Response, SessionSnapshot};

/// Pure update function for the panel side.
pub fn update(mut state: PanelState, msg: Msg) -> (PanelState, Vec<Effect>) {
    let effects = match msg {
        Msg::Started => {
            state.synced = false;
            state.mark_dirty();
            vec![Effect::Send(Command::GetState)]
        }
        Msg::StateReceived(snapshot) => on_state_received(&mut state, snapshot),
        Msg::ResyncFailed { .. } => {
            state.synced = true;
            state.mark_dirty();
            advance(&mut state)
        }
        Msg::UrlsCollected(urls) => {
            let stats = state.session.set_collected_urls(&urls);
            state.last_collection = Some(stats);
            state.complete = false;
            state.mark_dirty();
            vec![Effect::Send(Command::SetCollectedUrls {
                urls: state.session.jobs().urls(),
            })]
        }
        Msg::StartClicked => {
            if state.running {
                Vec::new()
            } else {
                state.running = true;
                state.complete = false;
                state.mark_dirty();
                advance(&mut state)
            }
        }
        Msg::ClearClicked => {
            state.session.reset();
            state.outstanding = None;
            state.running = false;
            state.complete = false;
            state.errors.clear();
            state.last_collection = None;
            state.mark_dirty();
            vec![Effect::Send(Command::ClearCapturedData)]
        }
        Msg::ProcessReplied { url, response } => on_process_reply(&mut state, url, response),
        Msg::DeliveryFailed { url, error } => {
            handle_failure(&mut state, &url, format!("command not delivered: {error}"))
        }
        Msg::Event(event) => on_event(&mut state, event),
        Msg::StallTimeout { token } => {
            match state.outstanding.as_ref() {
                Some(outstanding) if outstanding.token == token => {
                    let url = outstanding.url.clone();
                    handle_failure(&mut state, &url, "Processing stalled, retrying...".to_string())
                }
                _ => Vec::new(),
            }
        }
        Msg::AdvanceDue => advance(&mut state),
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn on_state_received(state: &mut PanelState, snapshot: SessionSnapshot) -> Vec<Effect> {
    state.session.apply_snapshot(&snapshot);
    state.synced = true;
    state.mark_dirty();

    match snapshot.current_url.filter(|_| snapshot.is_processing) {
        Some(url) => {
            // The orchestrator is mid-job: wait on it rather than dispatching.
            if state.is_outstanding(&url) {
                return Vec::new();
            }
            state.session.jobs_mut().push(&url);
            state.session.jobs_mut().mark_in_flight(&url);
            state.session.set_active_job(Some(url.clone()));
            state.running = true;
            arm_outstanding(state, url)
        }
        None => {
            if let Some(stale) = state.outstanding.take() {
                state.session.jobs_mut().release(&stale.url);
                state.session.set_active_job(None);
            }
            advance(state)
        }
    }
}

fn on_process_reply(state: &mut PanelState, url: String, response: Response) -> Vec<Effect> {
    if response.success {
        return Vec::new();
    }
    if response.busy {
        if !state.is_outstanding(&url) {
            return Vec::new();
        }
        state.outstanding = None;
        state.session.jobs_mut().release(&url);
        state.session.set_active_job(None);
        state.mark_dirty();
        return vec![Effect::ScheduleAdvance {
            after: state.config.busy_retry_delay,
        }];
    }
    let reason = response
        .error
        .unwrap_or_else(|| "request rejected".to_string());
    if response.exhausted {
        return give_up(state, &url, reason);
    }
    handle_failure(state, &url, reason)
}

/// The orchestrator will not run this job again. The reason it gave when it
/// failed the job is kept over the rejection text.
fn give_up(state: &mut PanelState, url: &str, reason: String) -> Vec<Effect> {
    if state.session.is_processed(url) {
        return Vec::new();
    }
    state.session.jobs_mut().mark_failed(url);
    state.errors.entry(url.to_string()).or_insert(reason);
    if state.is_outstanding(url) {
        state.outstanding = None;
        state.session.set_active_job(None);
    }
    state.mark_dirty();
    vec![Effect::ScheduleAdvance {
        after: state.config.failure_cooldown,
    }]
}

fn on_event(state: &mut PanelState, event: Event) -> Vec<Effect> {
    match event {
        Event::XhrCaptured {
            data,
            current_state,
        } => on_result(state, data, current_state),
        Event::AuthFailed { url, error } => handle_failure(state, &url, error),
        Event::RetryProcessing { url } => {
            if !state.is_outstanding(&url) {
                return Vec::new();
            }
            state
                .errors
                .insert(url.clone(), "Retrying...".to_string());
            state.mark_dirty();
            arm_outstanding(state, url)
        }
    }
}

fn on_result(
    state: &mut PanelState,
    record: PlaceRecord,
    current_state: SessionSnapshot,
) -> Vec<Effect> {
    let current_url = current_state.current_url.clone();
    state.session.apply_snapshot(&current_state);
    state.mark_dirty();

    let outstanding_url = state.outstanding.as_ref().map(|o| o.url.clone());
    if !record.has_key() {
        return match outstanding_url {
            Some(url) => handle_failure(state, &url, "No place ID found in response".to_string()),
            None => Vec::new(),
        };
    }

    let url = current_url
        .or_else(|| outstanding_url.clone())
        .or_else(|| find_url_by_key(state, &record.place_id));
    if let Some(url) = url.as_deref() {
        state.session.record_result(url, record);
        state.errors.remove(url);
    }

    let resolves_outstanding = match (&outstanding_url, &url) {
        (Some(outstanding), Some(url)) => outstanding == url,
        (Some(_), None) => false,
        (None, _) => true,
    };
    if !resolves_outstanding {
        return Vec::new();
    }
    state.outstanding = None;
    state.session.set_active_job(None);
    vec![Effect::ScheduleAdvance {
        after: state.config.result_cooldown,
    }]
}

fn find_url_by_key(state: &PanelState, place_id: &str) -> Option<String> {
    state
        .session
        .jobs()
        .iter()
        .filter(|job| !state.session.is_processed(&job.id))
        .find(|job| {
            state
                .keys
                .derive(&job.id)
                .is_some_and(|derived| keys_agree(&derived.key, place_id))
        })
        .map(|job| job.id.clone())
}

fn handle_failure(state: &mut PanelState, url: &str, reason: String) -> Vec<Effect> {
    if state.session.is_processed(url) {
        return Vec::new();
    }
    if let Some(count) = state.session.jobs_mut().increment_retry(url) {
        if count >= state.config.max_retries {
            state.session.jobs_mut().mark_failed(url);
        }
    }
    state.errors.insert(url.to_string(), reason);
    if state.is_outstanding(url) {
        state.outstanding = None;
        state.session.set_active_job(None);
    }
    state.mark_dirty();
    vec![Effect::ScheduleAdvance {
        after: state.config.failure_cooldown,
    }]
}

/// Hand the next pending job to the orchestrator, or finish the session when
/// none is left. At most one job is outstanding at a time.
fn advance(state: &mut PanelState) -> Vec<Effect> {
    if !state.running || !state.synced || state.outstanding.is_some() {
        return Vec::new();
    }

    let next = state.session.jobs().next_pending().map(|job| job.id.clone());
    match next {
        Some(url) => {
            state.session.jobs_mut().mark_in_flight(&url);
            state.session.set_active_job(Some(url.clone()));
            state.mark_dirty();
            let mut effects = vec![Effect::Send(Command::ProcessUrl {
                url: url.clone(),
                state: Some(state.session.snapshot()),
            })];
            effects.extend(arm_outstanding(state, url));
            effects
        }
        None => {
            state.running = false;
            state.complete = true;
            state.mark_dirty();
            let counts = state.session.jobs().counts();
            vec![
                Effect::Send(Command::ProcessingComplete),
                Effect::SessionComplete {
                    completed: counts.completed,
                    failed: counts.failed,
                },
            ]
        }
    }
}

fn arm_outstanding(state: &mut PanelState, url: String) -> Vec<Effect> {
    let token = state.mint_token();
    state.outstanding = Some(Outstanding { url, token });
    vec![Effect::ArmStallTimer {
        token,
        after: state.config.stall_timeout,
    }]
}
