//! Same seed, same dice, same faces

use dice_tray::engine::{DiceEngine, EngineConfig};
use dice_tray::sim::{
    DieKind, FramePacing, ModelRegistry, PhysicsWorld, RollRequest, SettleConfig, SettleReason,
    resolve_values, simulate_roll,
};
use dice_tray::transport::{LoopbackBus, channel_name};

fn registry() -> ModelRegistry {
    ModelRegistry::builtin().unwrap()
}

/// Manual frame interval; integral so every client's elapsed time is exact
const TICK_MS: f64 = 16.0;

fn pacing() -> FramePacing {
    FramePacing {
        frame_ms: TICK_MS,
        substeps: 1,
    }
}

/// Drive an engine with a manual clock until its roll settles
fn run_to_settlement(engine: &mut DiceEngine, start: f64) -> f64 {
    run_at(engine, start, TICK_MS)
}

fn run_at(engine: &mut DiceEngine, start: f64, tick_ms: f64) -> f64 {
    let mut now = start;
    while engine.frame_pending() {
        now += tick_ms;
        engine.advance(now);
        assert!(now - start < 20_000.0, "roll never settled");
    }
    now
}

#[test]
fn test_seed_12345_two_d6() {
    let request = RollRequest::new(12345, 2, 6, "room", "tab").unwrap();
    let roll = simulate_roll(
        &registry(),
        &request,
        &SettleConfig::default(),
        FramePacing::default(),
    )
    .unwrap();
    assert_eq!(roll.result.values.len(), 2);
    assert!(roll.result.values.iter().all(|v| (1..=6).contains(v)));
}

#[test]
fn test_independent_runs_match() {
    let registry = registry();
    for (seed, count, sides) in [(1, 1, 4), (99, 5, 6), (4242, 3, 10), (7, 2, 12)] {
        let request = RollRequest::new(seed, count, sides, "room", "tab").unwrap();
        let settle = SettleConfig::default();
        let a = simulate_roll(&registry, &request, &settle, FramePacing::default()).unwrap();
        let b = simulate_roll(&registry, &request, &settle, FramePacing::default()).unwrap();
        assert_eq!(a.result, b.result, "seed {seed}");
        assert_eq!(a.steps, b.steps);
        assert_eq!(a.elapsed_ms, b.elapsed_ms);
    }
}

#[test]
fn test_fresh_worlds_are_bitwise_identical() {
    let registry = registry();
    let mut a = PhysicsWorld::build_with(&registry, 31337, 6, DieKind::D20).unwrap();
    let mut b = PhysicsWorld::build_with(&registry, 31337, 6, DieKind::D20).unwrap();
    for _ in 0..120 {
        a.step();
        b.step();
    }
    assert_eq!(a.visuals(), b.visuals());
    assert_eq!(a.draws(), b.draws());
}

#[test]
fn test_result_length_and_range_across_seeds() {
    let registry = registry();
    let settle = SettleConfig::default();
    for kind in DieKind::ALL {
        for seed in 0..4u32 {
            let count = seed % 4 + 1;
            let request =
                RollRequest::new(seed * 7919 + 1, count, kind.sides(), "room", "tab").unwrap();
            let roll = simulate_roll(&registry, &request, &settle, FramePacing::default()).unwrap();
            assert_eq!(roll.result.values.len(), count as usize);
            assert!(
                roll.result.values.iter().all(|v| kind.is_valid_value(*v)),
                "{kind} seed {}: {:?}",
                request.seed,
                roll.result.values
            );
        }
    }
}

#[test]
fn test_settlement_window() {
    let registry = registry();
    let settle = SettleConfig::default();
    for seed in [3u32, 17, 256, 9001] {
        let request = RollRequest::new(seed, 4, 8, "room", "tab").unwrap();
        let roll = simulate_roll(&registry, &request, &settle, pacing()).unwrap();
        assert!(roll.steps >= settle.min_steps(), "seed {seed} settled early");
        assert!(roll.steps <= settle.max_steps(), "seed {seed} settled late");
        if roll.reason == SettleReason::AtRest {
            assert!(roll.steps >= u64::from(settle.rest_steps));
        }
    }
}

#[test]
fn test_values_hold_after_settlement() {
    let registry = registry();
    let settle = SettleConfig::default();
    for (seed, count, sides) in [(777, 3, 20), (31337, 3, 20), (12345, 2, 6), (4242, 3, 10)] {
        let request = RollRequest::new(seed, count, sides, "room", "tab").unwrap();
        let roll = simulate_roll(&registry, &request, &settle, pacing()).unwrap();

        // The dice keep lying on the same faces however long the world runs on
        for extra in [30, 120, 600] {
            let mut world = PhysicsWorld::build(&registry, &request).unwrap();
            for _ in 0..roll.steps + extra {
                world.step();
            }
            let values = resolve_values(&registry, world.orientations()).unwrap();
            assert_eq!(values, roll.result.values, "seed {seed} +{extra} steps");
        }
    }
}

#[test]
fn test_frame_rate_does_not_change_values() {
    let registry = registry();
    for (seed, count, sides) in [(777, 3, 20), (31337, 3, 20), (5, 4, 6), (808, 2, 8)] {
        let request = RollRequest::new(seed, count, sides, "room", "peer").unwrap();
        let headless =
            simulate_roll(&registry, &request, &SettleConfig::default(), pacing()).unwrap();

        // 30 Hz falls behind the safety timer and catches up
        for hz in [30.0, 60.0, 120.0, 144.0] {
            let mut engine = DiceEngine::new(EngineConfig::new("room", "me"));
            engine.on_assets_loaded(ModelRegistry::builtin(), 0.0);
            assert!(engine.receive_request(request.clone(), 0.0));
            run_at(&mut engine, 0.0, 1000.0 / hz);

            assert_eq!(engine.active_steps(), headless.steps, "seed {seed} at {hz} Hz");
            assert_eq!(
                engine.last_result().unwrap().values,
                headless.result.values,
                "seed {seed} at {hz} Hz"
            );
        }
    }
}

#[test]
fn test_two_clients_same_message_same_values() {
    let bus = LoopbackBus::new();
    let channel = channel_name("tavern");

    let mut sender = DiceEngine::new(EngineConfig::new("tavern", "sender"));
    let mut left = DiceEngine::new(EngineConfig::new("tavern", "left"));
    let mut right = DiceEngine::new(EngineConfig::new("tavern", "right"));
    sender.add_transport(Box::new(bus.join(&channel, "broadcast")));
    left.add_transport(Box::new(bus.join(&channel, "broadcast")));
    right.add_transport(Box::new(bus.join(&channel, "broadcast")));
    for engine in [&mut sender, &mut left, &mut right] {
        engine.on_assets_loaded(ModelRegistry::builtin(), 0.0);
    }

    sender.trigger_seeded_roll(777, 3, 20, 0.0).unwrap();

    // The two receivers pick the message up at different wall times
    assert_eq!(left.poll_transports(5.0), 1);
    assert_eq!(right.poll_transports(40.0), 1);
    run_to_settlement(&mut sender, 0.0);
    run_to_settlement(&mut left, 5.0);
    run_to_settlement(&mut right, 40.0);

    let a = left.last_result().unwrap();
    let b = right.last_result().unwrap();
    assert_eq!(a.values.len(), 3);
    assert_eq!(a.values, b.values);
    assert_eq!(a.values, sender.last_result().unwrap().values);
    assert!(a.values.iter().all(|v| (1..=20).contains(v)));
    assert_eq!(a.triggered_by, "sender");
}

#[test]
fn test_engine_matches_headless() {
    let request = RollRequest::new(2024, 2, 6, "room", "peer").unwrap();
    let headless = simulate_roll(&registry(), &request, &SettleConfig::default(), pacing()).unwrap();

    let mut engine = DiceEngine::new(EngineConfig::new("room", "me"));
    engine.on_assets_loaded(ModelRegistry::builtin(), 0.0);
    assert!(engine.receive_request(request, 0.0));
    run_to_settlement(&mut engine, 0.0);
    assert_eq!(engine.last_result().unwrap().values, headless.result.values);
}
