//! Property tests: evaluation is a pure function of the machine, the
//! starting configuration and the message sequence.

use orthostate::{
    ActiveConfiguration, InMemoryConfiguration, PseudostateKind, StateMachine, StateMachineBuilder,
};
use proptest::prelude::*;

/// Composite "operational" state with a deep-history entry, a sibling
/// to bounce through, and final states that complete the machine.
fn player() -> StateMachine<String> {
    let mut b = StateMachineBuilder::new("player");
    let root = b.root_region("root");
    let init = b.pseudostate(root, "initial", PseudostateKind::Initial);
    let operational = b.state(root, "operational");
    let flipped = b.state(root, "flipped");
    let done = b.final_state(root, "done");

    let media = b.region(operational, "media");
    let history = b.pseudostate(media, "history", PseudostateKind::DeepHistory);
    let stopped = b.state(media, "stopped");
    let active = b.state(media, "active");
    let finished = b.final_state(media, "finished");

    let playback = b.region(active, "playback");
    let p_init = b.pseudostate(playback, "initial", PseudostateKind::Initial);
    let running = b.state(playback, "running");
    let paused = b.state(playback, "paused");

    b.to(init, operational).completion();
    b.to(history, stopped).completion();
    b.to(p_init, running).completion();
    b.to(stopped, active).when(|m: &String| m == "play");
    b.to(running, paused).when(|m: &String| m == "pause");
    b.to(paused, running).when(|m: &String| m == "play");
    b.to(operational, flipped).when(|m: &String| m == "flip");
    b.to(flipped, operational).when(|m: &String| m == "flip");
    b.to(stopped, finished).when(|m: &String| m == "off");
    b.to(active, finished).when(|m: &String| m == "off");
    b.to(operational, done).completion();

    b.build().unwrap()
}

fn scripts() -> impl Strategy<Value = Vec<&'static str>> {
    proptest::collection::vec(
        proptest::sample::select(vec!["play", "pause", "flip", "off", "noise"]),
        0..32,
    )
}

proptest! {
    #[test]
    fn test_identical_scripts_yield_identical_configurations(script in scripts()) {
        let machine = player();
        let mut a = InMemoryConfiguration::new();
        let mut b = InMemoryConfiguration::new();
        machine.initialise(&mut a);
        machine.initialise(&mut b);

        for m in &script {
            let fired_a = machine.evaluate(&mut a, &m.to_string());
            let fired_b = machine.evaluate(&mut b, &m.to_string());
            prop_assert_eq!(fired_a, fired_b);
            prop_assert_eq!(&a, &b);
        }
    }

    #[test]
    fn test_termination_is_absorbing(script in scripts()) {
        let machine = player();
        let mut config = InMemoryConfiguration::new();
        machine.initialise(&mut config);

        let mut frozen: Option<InMemoryConfiguration> = None;
        for m in &script {
            let fired = machine.evaluate(&mut config, &m.to_string());
            match &frozen {
                Some(snapshot) => {
                    prop_assert!(!fired);
                    prop_assert_eq!(snapshot, &config);
                }
                None => {
                    if config.is_terminated() {
                        frozen = Some(config.clone());
                    }
                }
            }
        }
    }

    #[test]
    fn test_unrecognised_messages_never_change_the_configuration(script in scripts()) {
        let machine = player();
        let mut config = InMemoryConfiguration::new();
        machine.initialise(&mut config);

        for m in &script {
            let before = config.clone();
            let fired = machine.evaluate(&mut config, &m.to_string());
            if !fired {
                prop_assert_eq!(&before, &config);
            }
        }
    }
}
