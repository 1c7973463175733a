use criterion::{Criterion, black_box, criterion_group, criterion_main};
use fence_core::calibration::{Calibration, StepsPerUnit};
use fence_core::config::MotionCfg;
use fence_core::planner::{CarriageState, plan};
use fence_core::units::Length;

fn bench_plan(c: &mut Criterion) {
    let cal = Calibration {
        steps_per_unit: StepsPerUnit::per_mm(100).unwrap(),
        backlash_steps: 5,
        min_position: Length::ZERO,
        max_position: Length::from_mm(3_000),
        home_offset: Length::ZERO,
    };
    let motion = MotionCfg::default();
    let carriage = CarriageState::homed_at(Length::from_mm(1_500));

    c.bench_function("plan_long_move", |b| {
        b.iter(|| {
            plan(
                black_box(&carriage),
                black_box(Length::from_mm(300)),
                &cal,
                &motion,
            )
        })
    });

    c.bench_function("plan_short_move", |b| {
        b.iter(|| {
            plan(
                black_box(&carriage),
                black_box(Length::from_mm(1_501)),
                &cal,
                &motion,
            )
        })
    });
}

criterion_group!(benches, bench_plan);
criterion_main!(benches);
