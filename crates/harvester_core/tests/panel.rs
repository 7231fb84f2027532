use std::sync::Once;
use std::time::Duration;

use harvester_core::panel::{update, Effect, Msg, PanelState, RowStatus};
use harvester_core::{Command, DedupeStats, Event, JobStatus, PlaceRecord, Response, SessionSnapshot};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn place_url(name: &str, hex: &str) -> String {
    format!("https://www.google.com/maps/place/{name}/data=!4m2!3m1!1s0x1:{hex}!8m2")
}

/// Panel that has synced with the orchestrator and holds `urls`.
fn synced_panel(urls: &[String]) -> PanelState {
    let (state, _) = update(PanelState::default(), Msg::Started);
    let (state, _) = update(state, Msg::StateReceived(SessionSnapshot::default()));
    let (state, _) = update(state, Msg::UrlsCollected(urls.to_vec()));
    state
}

fn captured(url: &str, place_id: &str) -> Event {
    let data = PlaceRecord {
        place_id: place_id.to_string(),
        name: "Pine Park".into(),
        url: url.to_string(),
        ..PlaceRecord::default()
    };
    Event::XhrCaptured {
        current_state: SessionSnapshot {
            collected_urls: vec![url.to_string()],
            processed_data: vec![(place_id.to_string(), data.clone())],
            url_to_place_id: vec![(url.to_string(), place_id.to_string())],
            is_processing: false,
            current_url: Some(url.to_string()),
        },
        data,
    }
}

fn stall_token(effects: &[Effect]) -> u64 {
    effects
        .iter()
        .find_map(|effect| match effect {
            Effect::ArmStallTimer { token, .. } => Some(*token),
            _ => None,
        })
        .expect("stall timer armed")
}

#[test]
fn started_panel_resyncs_before_advancing() {
    init_logging();
    let a = place_url("A", "0x1");
    let (state, effects) = update(PanelState::default(), Msg::Started);
    assert_eq!(effects, vec![Effect::Send(Command::GetState)]);

    let (state, _) = update(state, Msg::UrlsCollected(vec![a.clone()]));
    let (state, effects) = update(state, Msg::StartClicked);
    assert!(effects.is_empty());
    assert!(state.is_running());

    let (state, effects) = update(state, Msg::StateReceived(SessionSnapshot::default()));
    assert!(matches!(
        &effects[0],
        Effect::Send(Command::ProcessUrl { url, state: Some(_) }) if *url == a
    ));
    assert_eq!(
        effects[1],
        Effect::ArmStallTimer {
            token: 1,
            after: Duration::from_secs(15),
        }
    );
    assert_eq!(state.outstanding().map(|o| o.url.as_str()), Some(a.as_str()));
}

#[test]
fn collected_urls_are_deduplicated_and_forwarded() {
    init_logging();
    let a = place_url("A", "0x1");
    let (mut state, effects) = update(
        PanelState::default(),
        Msg::UrlsCollected(vec![a.clone(), format!("{a}/"), " ".into()]),
    );

    assert_eq!(
        effects,
        vec![Effect::Send(Command::SetCollectedUrls {
            urls: vec![a.clone()],
        })]
    );
    let view = state.view();
    assert_eq!(
        view.last_collection,
        Some(DedupeStats {
            enqueued: 1,
            skipped: 1,
        })
    );
    assert_eq!(view.rows.len(), 1);
    assert!(state.consume_dirty());
    assert!(!state.consume_dirty());
}

#[test]
fn result_event_records_and_advances_after_cooldown() {
    init_logging();
    let a = place_url("A", "0x1");
    let b = place_url("B", "0x2");
    let state = synced_panel(&[a.clone(), b.clone()]);
    let (state, _) = update(state, Msg::StartClicked);

    let (state, effects) = update(state, Msg::Event(captured(&a, "0x1:0x1")));
    assert_eq!(
        effects,
        vec![Effect::ScheduleAdvance {
            after: Duration::from_secs(2),
        }]
    );
    assert!(state.outstanding().is_none());
    let row = &state.view().rows[0];
    assert_eq!(row.status, RowStatus::Completed);
    assert_eq!(row.record.as_ref().map(|r| r.name.as_str()), Some("Pine Park"));

    let (state, effects) = update(state, Msg::AdvanceDue);
    assert!(matches!(
        &effects[0],
        Effect::Send(Command::ProcessUrl { url, .. }) if *url == b
    ));
    assert_eq!(state.view().rows[1].status, RowStatus::Processing);
}

#[test]
fn duplicate_result_event_is_idempotent() {
    init_logging();
    let a = place_url("A", "0x1");
    let state = synced_panel(&[a.clone()]);
    let (state, _) = update(state, Msg::StartClicked);
    let (state, _) = update(state, Msg::Event(captured(&a, "0x1:0x1")));
    let before = state.session().clone();
    let (state, _) = update(state, Msg::Event(captured(&a, "0x1:0x1")));

    assert_eq!(state.session(), &before);
}

#[test]
fn busy_reply_releases_job_without_spending_retries() {
    init_logging();
    let a = place_url("A", "0x1");
    let state = synced_panel(&[a.clone()]);
    let (state, _) = update(state, Msg::StartClicked);

    let (state, effects) = update(
        state,
        Msg::ProcessReplied {
            url: a.clone(),
            response: Response::busy("https://elsewhere"),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::ScheduleAdvance {
            after: Duration::from_secs(2),
        }]
    );
    assert!(state.outstanding().is_none());
    let job = state.session().jobs().get(&a).cloned().expect("job");
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.retry_count, 0);
}

#[test]
fn stall_timeout_counts_as_failure_and_stale_tokens_are_ignored() {
    init_logging();
    let a = place_url("A", "0x1");
    let state = synced_panel(&[a.clone()]);
    let (state, effects) = update(state, Msg::StartClicked);
    let first = stall_token(&effects);

    let (state, effects) = update(state, Msg::Event(Event::RetryProcessing { url: a.clone() }));
    let second = stall_token(&effects);
    assert_ne!(first, second);

    let (state, effects) = update(state, Msg::StallTimeout { token: first });
    assert!(effects.is_empty());
    assert!(state.outstanding().is_some());

    let (state, effects) = update(state, Msg::StallTimeout { token: second });
    assert_eq!(
        effects,
        vec![Effect::ScheduleAdvance {
            after: Duration::from_secs(5),
        }]
    );
    assert_eq!(state.session().jobs().retry_count(&a), 1);
    assert_eq!(
        state.view().rows[0].status,
        RowStatus::Error("Processing stalled, retrying...".into())
    );
}

#[test]
fn repeated_failures_mark_job_failed_and_session_completes() {
    init_logging();
    let a = place_url("A", "0x1");
    let b = place_url("B", "0x2");
    let mut state = synced_panel(&[a.clone(), b.clone()]);
    let (next, _) = update(state, Msg::StartClicked);
    state = next;

    for _ in 0..3 {
        let (next, _) = update(
            state,
            Msg::Event(Event::AuthFailed {
                url: a.clone(),
                error: "no data".into(),
            }),
        );
        let (next, _) = update(next, Msg::AdvanceDue);
        state = next;
    }

    assert_eq!(
        state.session().jobs().get(&a).map(|job| job.status),
        Some(JobStatus::Failed)
    );
    assert_eq!(state.outstanding().map(|o| o.url.clone()), Some(b.clone()));

    let (state, _) = update(state, Msg::Event(captured(&b, "0x1:0x2")));
    let (state, effects) = update(state, Msg::AdvanceDue);
    assert_eq!(
        effects,
        vec![
            Effect::Send(Command::ProcessingComplete),
            Effect::SessionComplete {
                completed: 1,
                failed: 1,
            },
        ]
    );
    assert!(state.is_complete());
    assert!(!state.is_running());
    assert_eq!(state.view().rows[0].status, RowStatus::Failed("no data".into()));
}

#[test]
fn restarted_panel_adopts_job_already_in_flight() {
    init_logging();
    let a = place_url("A", "0x1");
    let (state, _) = update(PanelState::default(), Msg::Started);
    let (state, effects) = update(
        state,
        Msg::StateReceived(SessionSnapshot {
            collected_urls: vec![a.clone()],
            is_processing: true,
            current_url: Some(a.clone()),
            ..SessionSnapshot::default()
        }),
    );

    assert!(matches!(&effects[..], [Effect::ArmStallTimer { .. }]));
    assert!(state.is_running());
    assert_eq!(state.outstanding().map(|o| o.url.as_str()), Some(a.as_str()));

    let (state, effects) = update(state, Msg::Event(captured(&a, "0x1:0x1")));
    assert_eq!(effects.len(), 1);
    assert!(state.session().is_processed(&a));
}

#[test]
fn clear_resets_everything_and_notifies_orchestrator() {
    init_logging();
    let a = place_url("A", "0x1");
    let state = synced_panel(&[a.clone()]);
    let (state, _) = update(state, Msg::StartClicked);
    let (state, _) = update(state, Msg::Event(captured(&a, "0x1:0x1")));
    let (state, effects) = update(state, Msg::ClearClicked);

    assert_eq!(effects, vec![Effect::Send(Command::ClearCapturedData)]);
    assert!(state.view().rows.is_empty());
    assert!(state.session().results().is_empty());
    assert!(!state.is_running());
}

#[test]
fn result_without_place_id_fails_outstanding_job() {
    init_logging();
    let a = place_url("A", "0x1");
    let state = synced_panel(&[a.clone()]);
    let (state, _) = update(state, Msg::StartClicked);
    let (state, effects) = update(
        state,
        Msg::Event(Event::XhrCaptured {
            data: PlaceRecord::default(),
            current_state: SessionSnapshot::default(),
        }),
    );

    assert_eq!(effects.len(), 1);
    assert_eq!(state.session().jobs().retry_count(&a), 1);
    assert!(!state.session().is_processed(&a));
}

#[test]
fn replies_map_to_messages() {
    let a = "https://x".to_string();
    let process = Command::ProcessUrl {
        url: a.clone(),
        state: None,
    };

    assert_eq!(
        Msg::from_reply(&process, Err("closed".into())),
        Some(Msg::DeliveryFailed {
            url: a.clone(),
            error: "closed".into(),
        })
    );
    assert_eq!(
        Msg::from_reply(&Command::GetState, Ok(Response::ok())),
        Some(Msg::StateReceived(SessionSnapshot::default()))
    );
    assert_eq!(Msg::from_reply(&Command::ClearCapturedData, Ok(Response::ok())), None);
}

#[test]
fn noop_leaves_state_untouched() {
    let state = PanelState::default();
    let (next, effects) = update(state.clone(), Msg::NoOp);

    assert_eq!(next.view(), state.view());
    assert!(effects.is_empty());
}

#[test]
fn exhausted_rejection_keeps_the_original_failure_reason() {
    init_logging();
    let a = place_url("A", "0x1");
    let b = place_url("B", "0x2");
    let (state, _) = update(synced_panel(&[a.clone(), b.clone()]), Msg::StartClicked);
    let reason = "Failed to process location data after 4 attempts: no place data captured before timeout";

    let (state, _) = update(
        state,
        Msg::Event(Event::AuthFailed {
            url: a.clone(),
            error: reason.into(),
        }),
    );
    let (state, effects) = update(state, Msg::AdvanceDue);
    assert!(matches!(
        &effects[0],
        Effect::Send(Command::ProcessUrl { url, .. }) if *url == a
    ));

    let (state, effects) = update(
        state,
        Msg::ProcessReplied {
            url: a.clone(),
            response: Response::exhausted(&a),
        },
    );
    assert!(matches!(&effects[..], [Effect::ScheduleAdvance { .. }]));
    assert_eq!(
        state.session().jobs().get(&a).map(|job| job.status),
        Some(JobStatus::Failed)
    );
    assert_eq!(state.view().rows[0].status, RowStatus::Failed(reason.into()));

    let (_state, effects) = update(state, Msg::AdvanceDue);
    assert!(matches!(
        &effects[0],
        Effect::Send(Command::ProcessUrl { url, .. }) if *url == b
    ));
}
