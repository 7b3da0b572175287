// tests/test_fixed_step.rs
// Fixed-step clock and simulation driver properties: accumulation across
// arbitrary frame splits, tie handling, catch-up capping, render blending

use glam::{Quat, Vec3};
use umbra3d::sim::{FixedStepClock, FixedStepConfig, RigidTransform, RigidWorld, SimulationDriver};

fn clock(step: f32, cap: u32) -> FixedStepClock {
    FixedStepClock::new(FixedStepConfig {
        step_seconds: step,
        max_catch_up_steps: cap,
    })
    .unwrap()
}

// ============================================================================
// Accumulation properties
// ============================================================================

#[test]
fn total_steps_match_total_time_regardless_of_split() {
    // Power-of-two durations stay exact in f32, so equality is exact
    let step = 0.25;
    let splits: [&[f32]; 4] = [
        &[4.0],
        &[2.0, 2.0],
        &[0.125; 32],
        &[1.0, 0.5, 0.5, 0.125, 0.125, 0.25, 1.5],
    ];

    for dts in splits {
        let total: f32 = dts.iter().sum();
        assert_eq!(total, 4.0);

        let mut c = clock(step, u32::MAX);
        let mut steps = 0;
        for &dt in dts {
            steps += c.advance(dt).steps;
        }
        assert_eq!(steps, 16, "4.0s at 0.25s steps is 16 steps");
        assert_eq!(c.accumulated(), 0.0);
    }
}

#[test]
fn irregular_splits_agree_within_one_step() {
    let step = 1.0 / 60.0;
    let dts = [0.013, 0.021, 0.0005, 0.047, 0.016, 0.033, 0.0161, 0.009];
    let total: f32 = dts.iter().sum();

    let mut c = clock(step, u32::MAX);
    let mut steps = 0;
    for &dt in &dts {
        steps += c.advance(dt).steps;
    }

    let expected = (total / step).floor() as u32;
    assert!(
        steps == expected || steps == expected.saturating_sub(1) || steps == expected + 1,
        "{} steps vs floor {}",
        steps,
        expected
    );
    // Whatever was not stepped is still in the accumulator
    let simulated = steps as f32 * step;
    assert!((simulated + c.accumulated() - total).abs() < 1e-4);
    assert!(c.accumulated() < step);
}

#[test]
fn remainder_is_time_modulo_step() {
    let mut c = clock(0.25, u32::MAX);
    c.advance(1.1);
    assert!((c.accumulated() - 0.1).abs() < 1e-6);
    c.advance(0.2);
    // 0.1 + 0.2 crosses one step, leaving 0.05
    assert!((c.accumulated() - 0.05).abs() < 1e-6);
}

#[test]
fn exact_tie_takes_the_step_and_leaves_zero() {
    let mut c = clock(0.5, 8);
    let drain = c.advance(1.5);
    assert_eq!(drain.steps, 3);
    assert_eq!(c.accumulated(), 0.0);
}

#[test]
fn accumulated_always_stays_below_one_step() {
    let mut c = clock(1.0 / 60.0, 8);
    for i in 0..1000 {
        c.advance((i % 7) as f32 * 0.004);
        assert!(c.accumulated() < c.step());
    }
}

// ============================================================================
// Catch-up cap
// ============================================================================

#[test]
fn cap_limits_steps_and_reports_dropped_time() {
    let mut c = clock(0.01, 4);
    // 100 whole steps of backlog after a stall
    let drain = c.advance(1.0);
    assert_eq!(drain.steps, 4);
    let expected_drop = 96.0 * 0.01;
    assert!(
        (drain.dropped_seconds - expected_drop).abs() < 1e-3,
        "dropped {} expected {}",
        drain.dropped_seconds,
        expected_drop
    );
    assert!(c.accumulated() < c.step());
}

#[test]
fn frames_under_the_cap_drop_nothing() {
    let mut c = clock(0.01, 4);
    for _ in 0..100 {
        let drain = c.advance(0.035);
        assert_eq!(drain.dropped_seconds, 0.0);
        assert!(drain.steps <= 4);
    }
}

// ============================================================================
// Blend factor
// ============================================================================

#[test]
fn alpha_is_the_sub_step_fraction() {
    let mut c = clock(0.1, 8);
    assert_eq!(c.alpha(), 0.0);
    c.advance(0.05);
    assert!((c.alpha() - 0.5).abs() < 1e-6);
    c.advance(0.075);
    // 0.125 total drains one step, leaving 0.025
    assert!((c.alpha() - 0.25).abs() < 1e-5);
    assert!(c.alpha() >= 0.0 && c.alpha() < 1.0);
}

// ============================================================================
// Driver over a scripted world
// ============================================================================

struct ScriptedWorld {
    step_count: u32,
    step_sizes: Vec<f32>,
    bodies: Vec<Vec3>,
    velocity: Vec3,
}

impl ScriptedWorld {
    fn new(bodies: usize, velocity: Vec3) -> Self {
        Self {
            step_count: 0,
            step_sizes: Vec::new(),
            bodies: vec![Vec3::ZERO; bodies],
            velocity,
        }
    }
}

impl RigidWorld for ScriptedWorld {
    fn step(&mut self, dt: f32) {
        self.step_count += 1;
        self.step_sizes.push(dt);
        for body in &mut self.bodies {
            *body += self.velocity * dt;
        }
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn body_transform(&self, index: usize) -> RigidTransform {
        RigidTransform {
            position: self.bodies[index],
            orientation: Quat::IDENTITY,
        }
    }
}

#[test]
fn driver_steps_the_world_with_the_fixed_step_only() {
    let mut driver = SimulationDriver::new(
        ScriptedWorld::new(2, Vec3::Y),
        FixedStepConfig {
            step_seconds: 0.02,
            max_catch_up_steps: 8,
        },
    )
    .unwrap();

    driver.advance(0.05);
    driver.advance(0.05);
    // 0.1s at 0.02 is five steps, each exactly step-sized
    assert_eq!(driver.world().step_count, 5);
    assert!(driver.world().step_sizes.iter().all(|&dt| dt == 0.02));
}

#[test]
fn snapshots_follow_the_latest_step() {
    let mut driver = SimulationDriver::new(
        ScriptedWorld::new(1, Vec3::X),
        FixedStepConfig {
            step_seconds: 0.1,
            max_catch_up_steps: 8,
        },
    )
    .unwrap();

    assert_eq!(driver.transforms()[0].position, Vec3::ZERO);
    driver.advance(0.1);
    assert!((driver.transforms()[0].position.x - 0.1).abs() < 1e-6);

    // A frame too short for a step leaves the snapshot alone
    driver.advance(0.04);
    assert!((driver.transforms()[0].position.x - 0.1).abs() < 1e-6);
}

#[test]
fn blended_transforms_interpolate_between_the_last_two_steps() {
    let mut driver = SimulationDriver::new(
        ScriptedWorld::new(1, Vec3::X),
        FixedStepConfig {
            step_seconds: 0.1,
            max_catch_up_steps: 8,
        },
    )
    .unwrap();

    // Two whole steps plus 30% of a third
    driver.advance(0.23);
    let alpha = driver.clock().alpha();
    assert!((alpha - 0.3).abs() < 1e-4);

    let blended = driver.blended_transforms()[0].position.x;
    let expected = 0.1 + 0.1 * alpha;
    assert!(
        (blended - expected).abs() < 1e-5,
        "blended {} expected {}",
        blended,
        expected
    );

    // Matrices carry the same translation
    let matrix = driver.blended_matrices()[0];
    assert!((matrix.w_axis.x - blended).abs() < 1e-6);
}

#[test]
fn world_mutations_surface_after_the_next_step() {
    let mut driver = SimulationDriver::new(
        ScriptedWorld::new(1, Vec3::ZERO),
        FixedStepConfig {
            step_seconds: 0.1,
            max_catch_up_steps: 8,
        },
    )
    .unwrap();

    driver.world_mut().bodies[0] = Vec3::new(5.0, 0.0, 0.0);
    // Snapshot not refreshed until a step runs
    assert_eq!(driver.transforms()[0].position, Vec3::ZERO);
    driver.advance(0.1);
    assert_eq!(driver.transforms()[0].position, Vec3::new(5.0, 0.0, 0.0));
}

#[test]
fn capped_driver_reports_the_drop() {
    let mut driver = SimulationDriver::new(
        ScriptedWorld::new(1, Vec3::X),
        FixedStepConfig {
            step_seconds: 0.01,
            max_catch_up_steps: 2,
        },
    )
    .unwrap();

    let drain = driver.advance(0.1);
    assert_eq!(drain.steps, 2);
    assert_eq!(driver.world().step_count, 2);
    assert!(drain.dropped_seconds > 0.0);
}
