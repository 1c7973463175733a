use fence_core::calibration::{Calibration, StepsPerUnit};
use fence_core::config::MotionCfg;
use fence_core::error::PlanError;
use fence_core::planner::{CarriageState, plan};
use fence_core::units::Length;
use fence_traits::Direction;
use rstest::rstest;

/// 100 steps/mm, 5 steps backlash, 0..3000 mm track.
fn cal() -> Calibration {
    Calibration {
        steps_per_unit: StepsPerUnit::per_mm(100).unwrap(),
        backlash_steps: 5,
        min_position: Length::ZERO,
        max_position: Length::from_mm(3_000),
        home_offset: Length::ZERO,
    }
}

fn motion() -> MotionCfg {
    MotionCfg::default()
}

fn homed_at(mm: i64, last: Option<Direction>) -> CarriageState {
    CarriageState {
        position: Length::from_mm(mm),
        last_direction: last,
        is_homed: true,
    }
}

#[test]
fn forward_move_from_home_has_no_backlash() {
    // current=0mm homed (direction unknown), target=150mm.
    let cmd = plan(&homed_at(0, None), Length::from_mm(150), &cal(), &motion()).unwrap();
    assert_eq!(cmd.direction, Direction::Forward);
    assert_eq!(cmd.steps, 15_000);
}

#[test]
fn reversal_adds_exactly_the_backlash_steps() {
    // current=150mm after a forward move, target=100mm.
    let cmd = plan(
        &homed_at(150, Some(Direction::Forward)),
        Length::from_mm(100),
        &cal(),
        &motion(),
    )
    .unwrap();
    assert_eq!(cmd.direction, Direction::Reverse);
    assert_eq!(cmd.steps, 5_005);
}

#[rstest]
#[case(Direction::Forward)]
#[case(Direction::Reverse)]
fn same_direction_move_has_no_backlash(#[case] dir: Direction) {
    let (from, to) = match dir {
        Direction::Forward => (100, 200),
        Direction::Reverse => (200, 100),
    };
    let with_history = plan(
        &homed_at(from, Some(dir)),
        Length::from_mm(to),
        &cal(),
        &motion(),
    )
    .unwrap();
    let fresh = plan(&homed_at(from, None), Length::from_mm(to), &cal(), &motion()).unwrap();
    assert_eq!(with_history.steps, 10_000);
    assert_eq!(with_history.steps, fresh.steps);
}

#[rstest]
#[case(3_500)]
#[case(-1)]
fn out_of_bounds_target_is_rejected_not_clamped(#[case] target_mm: i64) {
    let carriage = homed_at(0, None);
    let before = carriage;
    assert_eq!(
        plan(&carriage, Length::from_mm(target_mm), &cal(), &motion()),
        Err(PlanError::OutOfBounds)
    );
    // Planning is pure: the carriage state is untouched.
    assert_eq!(carriage, before);
}

#[test]
fn boundary_targets_are_allowed() {
    assert!(plan(&homed_at(100, None), Length::ZERO, &cal(), &motion()).is_ok());
    assert!(plan(&homed_at(100, None), Length::from_mm(3_000), &cal(), &motion()).is_ok());
}

#[test]
fn unhomed_carriage_is_rejected() {
    assert_eq!(
        plan(
            &CarriageState::unhomed(),
            Length::from_mm(100),
            &cal(),
            &motion()
        ),
        Err(PlanError::NotHomed)
    );
}

#[test]
fn invalid_calibration_is_fatal() {
    let mut bad = cal();
    bad.max_position = bad.min_position;
    assert_eq!(
        plan(&homed_at(0, None), Length::ZERO, &bad, &motion()),
        Err(PlanError::ZeroOrNegativeCalibration)
    );
}

#[test]
fn replanning_the_reached_target_is_a_no_op() {
    let carriage = homed_at(0, None);
    let target = Length::from_mm(150);
    let first = plan(&carriage, target, &cal(), &motion()).unwrap();
    // After a completed move the controller sets position = target.
    let arrived = homed_at(150, Some(first.direction));
    let again = plan(&arrived, target, &cal(), &motion()).unwrap();
    assert!(again.is_no_op());
    assert!(again.profile.segments.is_empty());
}

#[test]
fn long_move_profile_is_trapezoidal() {
    let cmd = plan(&homed_at(0, None), Length::from_mm(1_000), &cal(), &motion()).unwrap();
    let m = motion();
    // Reaches cruise rate in the middle, starts and ends slow.
    assert_eq!(cmd.profile.rate_at(cmd.steps / 2), m.max_velocity_sps);
    assert!(cmd.profile.rate_at(0) < m.max_velocity_sps);
    assert_eq!(
        cmd.profile.segments.last().unwrap().steps_per_sec,
        m.start_velocity_sps
    );
    assert!(cmd.estimated_duration_ms() > 0);
}

#[test]
fn short_move_profile_never_reaches_cruise() {
    // 5 mm move with a 10 mm ramp distance: triangular profile.
    let cmd = plan(&homed_at(0, None), Length::from_mm(5), &cal(), &motion()).unwrap();
    let m = motion();
    assert!(
        cmd.profile
            .segments
            .iter()
            .all(|s| s.steps_per_sec < m.max_velocity_sps)
    );
}
