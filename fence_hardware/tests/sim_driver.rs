use fence_hardware::SimulatedDriver;
use fence_traits::{Direction, DriveStatus, MotionDriver, MoveCommand, VelocityProfile};
use rstest::rstest;
use std::time::{Duration, Instant};

fn cmd(direction: Direction, steps: u32) -> MoveCommand {
    MoveCommand {
        direction,
        steps,
        profile: VelocityProfile::flat(5000),
    }
}

/// Poll until a terminal status or the (real-time) deadline expires.
fn poll_to_end(driver: &mut SimulatedDriver, handle: fence_traits::MoveHandle) -> DriveStatus {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let status = driver.poll(handle).expect("poll");
        if status != DriveStatus::Pending {
            return status;
        }
        assert!(Instant::now() < deadline, "driver never finished");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[rstest]
#[case(Direction::Forward, 500, 500)]
#[case(Direction::Reverse, 500, -500)]
fn completes_and_tracks_position(
    #[case] direction: Direction,
    #[case] steps: u32,
    #[case] expected: i64,
) {
    let mut driver = SimulatedDriver::with_time_scale(1000);
    let handle = driver.execute(&cmd(direction, steps)).expect("execute");
    assert_eq!(poll_to_end(&mut driver, handle), DriveStatus::Completed);
    assert_eq!(driver.position_steps(), expected);
}

#[test]
fn zero_step_command_completes_immediately() {
    let mut driver = SimulatedDriver::with_time_scale(1000);
    let handle = driver.execute(&MoveCommand::no_op()).expect("execute");
    assert_eq!(poll_to_end(&mut driver, handle), DriveStatus::Completed);
    assert_eq!(driver.position_steps(), 0);
}

#[test]
fn injected_stall_is_reported_short_of_target() {
    let mut driver = SimulatedDriver::with_time_scale(1000);
    driver.stall_at_step(200);
    let handle = driver
        .execute(&cmd(Direction::Forward, 1000))
        .expect("execute");
    assert_eq!(poll_to_end(&mut driver, handle), DriveStatus::Stalled);
    assert!(driver.position_steps() < 1000);
}

#[test]
fn injected_fault_is_reported() {
    let mut driver = SimulatedDriver::with_time_scale(1000);
    driver.fail_next();
    let handle = driver
        .execute(&cmd(Direction::Forward, 100))
        .expect("execute");
    assert_eq!(poll_to_end(&mut driver, handle), DriveStatus::Faulted);
    assert_eq!(driver.position_steps(), 0);
}

#[test]
fn halt_stops_pulsing_mid_move() {
    // Slow profile in real time so the halt lands mid-move.
    let mut driver = SimulatedDriver::new();
    let handle = driver
        .execute(&MoveCommand {
            direction: Direction::Forward,
            steps: 100_000,
            profile: VelocityProfile::flat(50_000),
        })
        .expect("execute");
    std::thread::sleep(Duration::from_millis(20));
    driver.halt(handle).expect("halt");
    std::thread::sleep(Duration::from_millis(50));
    let travelled = driver.position_steps();
    assert!(travelled < 100_000, "halt ignored: {travelled}");
    // No further progress after the halt settles.
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(driver.position_steps(), travelled);
}

#[test]
fn seek_home_returns_counter_to_zero() {
    let mut driver = SimulatedDriver::with_time_scale(1000);
    let handle = driver
        .execute(&cmd(Direction::Forward, 2_000))
        .expect("execute");
    assert_eq!(poll_to_end(&mut driver, handle), DriveStatus::Completed);

    let handle = driver.seek_home().expect("seek_home");
    assert_eq!(poll_to_end(&mut driver, handle), DriveStatus::Completed);
    assert_eq!(driver.position_steps(), 0);
}

#[test]
fn busy_driver_rejects_overlapping_commands() {
    let mut driver = SimulatedDriver::new();
    let slow = MoveCommand {
        direction: Direction::Forward,
        steps: 100_000,
        profile: VelocityProfile::flat(50_000),
    };
    let handle = driver.execute(&slow).expect("execute");
    assert!(driver.execute(&slow).is_err(), "overlap accepted");
    driver.halt(handle).expect("halt");
}
