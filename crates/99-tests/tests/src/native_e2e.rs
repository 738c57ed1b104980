use corelink::{LinkConfig, LinkKind};
use corelink_sim::{
    run, verify_backpressure, verify_burst, verify_flood, ScenarioConfig, ScenarioKind,
};

const SLOTS: u16 = 8;

fn config(kind: ScenarioKind) -> ScenarioConfig {
    ScenarioConfig::new(kind).with_link(LinkConfig::default().with_slots(SLOTS))
}

#[test]
fn pumped_flood() {
    let report = run(&config(ScenarioKind::flood(500))).expect("flood run");
    verify_flood(&report).expect("flood verification");
    assert!(report.sender.pool_exhausted > 0, "flood should outrun the pool");
}

#[test]
fn pumped_burst_respects_slot_budget() {
    let report = run(&config(ScenarioKind::burst(20, 12))).expect("burst run");
    verify_burst(&report, SLOTS as usize).expect("burst verification");
}

#[test]
fn pumped_backpressure() {
    let report = run(&config(ScenarioKind::backpressure(200))).expect("backpressure run");
    verify_backpressure(&report).expect("backpressure verification");
    assert_eq!(report.done_doorbells as usize, report.send_doorbells as usize);
}

#[test]
fn flow_controlled_backpressure() {
    let config = config(ScenarioKind::backpressure(120)).with_flow_control(true);
    let report = run(&config).expect("backpressure run");
    verify_backpressure(&report).expect("backpressure verification");
}

#[test]
fn every_link_preset_floods_cleanly() {
    for kind in LinkKind::ALL {
        let config = ScenarioConfig::new(ScenarioKind::flood(300))
            .with_link(LinkConfig::preset(kind));
        let report = run(&config).expect("flood run");
        verify_flood(&report).unwrap_or_else(|err| panic!("{}: {err}", kind.name()));
    }
}

#[test]
fn threaded_flood() {
    let config = config(ScenarioKind::flood(2_000)).threaded(true);
    let report = run(&config).expect("threaded flood run");
    verify_flood(&report).expect("threaded flood verification");
}

#[test]
fn threaded_flow_controlled_backpressure() {
    let config = config(ScenarioKind::backpressure(300))
        .with_flow_control(true)
        .threaded(true)
        .with_seed(11);
    let report = run(&config).expect("threaded backpressure run");
    verify_backpressure(&report).expect("threaded backpressure verification");
}

#[test]
#[ignore]
fn slow_threaded_flood_many_seeds() {
    for seed in 0..32 {
        let config = config(ScenarioKind::flood(20_000))
            .threaded(true)
            .with_seed(seed);
        let report = run(&config).expect("threaded flood run");
        verify_flood(&report).unwrap_or_else(|err| panic!("seed {seed}: {err}"));
    }
}
