use fence_core::calibration::{Calibration, StepsPerUnit};
use fence_core::error::StoreError;
use fence_core::store::CalibrationStore;
use fence_core::units::Length;
use std::fs;
use tempfile::tempdir;

fn sample_cal() -> Calibration {
    Calibration {
        steps_per_unit: StepsPerUnit::new(6_400, Length::from_mm(40)).unwrap(),
        backlash_steps: 12,
        min_position: Length::ZERO,
        max_position: Length::from_mm(2_400),
        home_offset: Length::from_mm(3),
    }
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("calibration.toml");

    let mut store = CalibrationStore::open(&path, 0.20);
    store.replace(sample_cal()).expect("replace");

    let loaded = CalibrationStore::load_from(&path).expect("load");
    assert_eq!(loaded, sample_cal());

    // A fresh store picks the persisted record up.
    let reopened = CalibrationStore::open(&path, 0.20);
    assert_eq!(*reopened.calibration(), sample_cal());
}

#[test]
fn save_leaves_no_temp_file_behind() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("calibration.toml");
    let mut store = CalibrationStore::open(&path, 0.20);
    store.replace(sample_cal()).expect("replace");

    let names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["calibration.toml".to_string()]);
}

#[test]
fn missing_file_falls_back_to_safe_defaults() {
    let dir = tempdir().unwrap();
    let store = CalibrationStore::open(dir.path().join("nope.toml"), 0.20);
    assert_eq!(*store.calibration(), Calibration::safe_default());
}

#[test]
fn corrupt_record_is_reported_and_fallback_applies() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("calibration.toml");
    fs::write(&path, "steps_per_unit = \"garbage\"").unwrap();

    match CalibrationStore::load_from(&path) {
        Err(StoreError::Corrupt(_)) => {}
        other => panic!("expected Corrupt, got {other:?}"),
    }
    // open() surfaces a warning but still yields a usable store.
    let store = CalibrationStore::open(&path, 0.20);
    assert_eq!(*store.calibration(), Calibration::safe_default());
}

#[test]
fn invariant_violations_count_as_corrupt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("calibration.toml");
    // min == max violates the record invariants even though the TOML parses.
    fs::write(
        &path,
        "schema_version = 1\n\
         steps_per_unit = { steps = 100, span_nm = 1000000 }\n\
         backlash_steps = 0\n\
         min_position_nm = 0\n\
         max_position_nm = 0\n\
         home_offset_nm = 0\n",
    )
    .unwrap();
    assert!(matches!(
        CalibrationStore::load_from(&path),
        Err(StoreError::Corrupt(_))
    ));
}

#[test]
fn unknown_fields_are_ignored_and_missing_fields_default() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("calibration.toml");
    fs::write(
        &path,
        "schema_version = 1\n\
         backlash_steps = 7\n\
         some_future_knob = true\n",
    )
    .unwrap();
    let loaded = CalibrationStore::load_from(&path).expect("forward-compatible load");
    assert_eq!(loaded.backlash_steps, 7);
    assert_eq!(
        loaded.steps_per_unit,
        Calibration::safe_default().steps_per_unit
    );
}

#[test]
fn plausible_run_is_persisted_immediately() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("calibration.toml");
    let mut store = CalibrationStore::open(&path, 0.20);
    store.replace(sample_cal()).expect("replace");

    // 160 steps/mm prior; a run observing ~159 steps/mm is plausible.
    store
        .update_from_calibration_run(15_900, Length::from_mm(100))
        .expect("plausible");
    let reloaded = CalibrationStore::load_from(&path).expect("load");
    assert_eq!(
        reloaded.steps_per_unit,
        StepsPerUnit::new(15_900, Length::from_mm(100)).unwrap()
    );
    // The rest of the record is untouched.
    assert_eq!(reloaded.backlash_steps, 12);
}

#[test]
fn implausible_run_keeps_the_persisted_record() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("calibration.toml");
    let mut store = CalibrationStore::open(&path, 0.20);
    store.replace(sample_cal()).expect("replace");

    assert!(
        store
            .update_from_calibration_run(100, Length::from_mm(100))
            .is_err()
    );
    assert_eq!(*store.calibration(), sample_cal());
    assert_eq!(
        CalibrationStore::load_from(&path).expect("load"),
        sample_cal()
    );
}

#[test]
fn volatile_store_never_touches_disk() {
    let mut store = CalibrationStore::volatile(sample_cal(), 0.20);
    store
        .update_from_calibration_run(16_000, Length::from_mm(100))
        .expect("update");
    assert_eq!(
        store.calibration().steps_per_unit,
        StepsPerUnit::per_mm(160).unwrap()
    );
}
