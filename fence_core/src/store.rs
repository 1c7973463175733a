//! Calibration persistence: load with safe fallback, atomic save, and the
//! plausibility guard for calibration runs.

use crate::calibration::{Calibration, StepsPerUnit};
use crate::error::{CalibrationError, Result, StoreError};
use crate::units::Length;
use std::fs;
use std::path::{Path, PathBuf};

/// Owner of the device calibration.
///
/// The engine holds exactly one store; the planner borrows the current
/// [`Calibration`] read-only per move. Mutation happens only through the
/// calibration-run path (or `replace`) and is persisted immediately with an
/// atomic temp-file-and-rename, so a crash mid-write never corrupts the
/// previous valid record.
pub struct CalibrationStore {
    path: Option<PathBuf>,
    current: Calibration,
    tolerance: f64,
}

impl CalibrationStore {
    /// Open the store backed by `path`, falling back to
    /// [`Calibration::safe_default`] with a warning when the record is
    /// missing or unusable.
    pub fn open(path: impl Into<PathBuf>, tolerance: f64) -> Self {
        let path = path.into();
        let current = match Self::load_from(&path) {
            Ok(cal) => cal,
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no calibration record; using safe defaults");
                Calibration::safe_default()
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "calibration record unusable; falling back to safe defaults"
                );
                Calibration::safe_default()
            }
        };
        Self {
            path: Some(path),
            current,
            tolerance,
        }
    }

    /// In-memory store without persistence, for tests and dry runs.
    pub fn volatile(cal: Calibration, tolerance: f64) -> Self {
        Self {
            path: None,
            current: cal,
            tolerance,
        }
    }

    /// Read and validate a calibration record.
    pub fn load_from(path: &Path) -> std::result::Result<Calibration, StoreError> {
        let text = fs::read_to_string(path)?;
        let file = fence_config::load_calibration_toml(&text)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        if file.schema_version > fence_config::CALIBRATION_SCHEMA_VERSION {
            tracing::warn!(
                found = file.schema_version,
                supported = fence_config::CALIBRATION_SCHEMA_VERSION,
                "calibration record from a newer schema; reading known fields only"
            );
        }
        Calibration::try_from(&file).map_err(|msg| StoreError::Corrupt(msg.to_string()))
    }

    /// Persist the current calibration atomically. A no-op for volatile
    /// stores.
    pub fn save(&self) -> std::result::Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = fence_config::CalibrationFile::from(&self.current);
        let text =
            toml::to_string_pretty(&file).map_err(|e| StoreError::Encode(e.to_string()))?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), "calibration saved");
        Ok(())
    }

    pub fn calibration(&self) -> &Calibration {
        &self.current
    }

    /// Replace the whole record (explicit calibration procedure); validates
    /// and persists immediately.
    pub fn replace(&mut self, cal: Calibration) -> Result<()> {
        cal.validate()
            .map_err(|msg| eyre::Report::new(StoreError::Corrupt(msg.to_string())))?;
        self.current = cal;
        self.save()?;
        Ok(())
    }

    /// Recompute steps-per-unit from a measured reference move.
    ///
    /// Rejects the run with [`CalibrationError::Implausible`] when the new
    /// ratio deviates from the prior one by more than the configured
    /// tolerance; a botched run must not silently corrupt future moves. The
    /// prior calibration is retained on any error.
    pub fn update_from_calibration_run(
        &mut self,
        observed_steps: u64,
        observed_length: Length,
    ) -> Result<Calibration> {
        if observed_length.as_nm() <= 0 {
            return Err(eyre::Report::new(CalibrationError::ZeroObservedLength));
        }
        let next = StepsPerUnit::new(observed_steps, observed_length)
            .ok_or_else(|| eyre::Report::new(CalibrationError::ZeroObservedLength))?;

        let prior = self.current.steps_per_unit.as_steps_per_mm();
        let observed = next.as_steps_per_mm();
        let deviation = ((observed - prior) / prior).abs();
        if deviation > self.tolerance {
            return Err(eyre::Report::new(CalibrationError::Implausible {
                prior_steps_per_mm: prior,
                observed_steps_per_mm: observed,
                tolerance_pct: self.tolerance * 100.0,
            }));
        }

        self.current.steps_per_unit = next;
        self.save()?;
        tracing::info!(
            steps_per_mm = observed,
            deviation_pct = deviation * 100.0,
            "calibration updated from run"
        );
        Ok(self.current)
    }
}
