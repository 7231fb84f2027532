//! A panel restarting against an orchestrator restored from a mid-job
//! snapshot, wired through the two pure cores.

use std::sync::Once;

use harvester_core::orchestrator::{self, OrchestratorConfig, OrchestratorState};
use harvester_core::panel::{self, PanelState};
use harvester_core::{Command, Response, SessionSnapshot};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn place_url(name: &str, hex: &str) -> String {
    format!("https://www.google.com/maps/place/{name}/data=!4m2!3m1!1s0x1:{hex}!8m2")
}

/// Run `command` through the orchestrator and return its reply.
fn ask(state: OrchestratorState, command: Command) -> (OrchestratorState, Response) {
    let (state, effects) = orchestrator::update(state, orchestrator::Msg::Command(command));
    let reply = effects
        .into_iter()
        .find_map(|effect| match effect {
            orchestrator::Effect::Reply(response) => Some(response),
            _ => None,
        })
        .expect("orchestrator replied");
    (state, reply)
}

#[test]
fn panel_redispatches_the_job_left_by_a_restored_lock() {
    init_logging();
    let a = place_url("A", "0x1");
    let b = place_url("B", "0x2");
    let saved = SessionSnapshot {
        collected_urls: vec![a.clone(), b.clone()],
        is_processing: true,
        current_url: Some(a.clone()),
        ..SessionSnapshot::default()
    };
    let config = OrchestratorConfig {
        enrich: false,
        ..OrchestratorConfig::default()
    };
    let orchestrator_state = OrchestratorState::restore(config, &saved);

    let (panel_state, effects) = panel::update(PanelState::default(), panel::Msg::Started);
    assert_eq!(effects, vec![panel::Effect::Send(Command::GetState)]);

    let (orchestrator_state, reply) = ask(orchestrator_state, Command::GetState);
    let Some(msg) = panel::Msg::from_reply(&Command::GetState, Ok(reply)) else {
        panic!("get_state reply maps to a message");
    };
    let (panel_state, effects) = panel::update(panel_state, msg);
    assert!(effects.is_empty());
    assert!(panel_state.outstanding().is_none());
    assert!(!panel_state.is_running());

    let (panel_state, _) = panel::update(panel_state, panel::Msg::UrlsCollected(vec![a.clone(), b]));
    let (panel_state, effects) = panel::update(panel_state, panel::Msg::StartClicked);
    let dispatched = effects.iter().find_map(|effect| match effect {
        panel::Effect::Send(command @ Command::ProcessUrl { .. }) => Some(command.clone()),
        _ => None,
    });
    let Some(command) = dispatched else {
        panic!("panel sent no process_url: {effects:?}");
    };
    assert!(matches!(&command, Command::ProcessUrl { url, .. } if *url == a));
    assert_eq!(panel_state.outstanding().map(|o| o.url.clone()), Some(a.clone()));

    let (orchestrator_state, reply) = ask(orchestrator_state, command);
    assert_eq!(reply, Response::ok());
    assert!(!orchestrator_state.is_locked());
    assert_eq!(orchestrator_state.dispatch().map(|d| d.url.as_str()), Some(a.as_str()));
}
