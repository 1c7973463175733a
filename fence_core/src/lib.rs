#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Saw-fence positioning engine (hardware-agnostic).
//!
//! Positions a motorized fence stop along a linear track to a requested cut
//! length, then signals readiness for a manual saw cut, repeating for a
//! queued list of lengths. All motor interaction goes through the
//! `fence_traits::MotionDriver` trait.
//!
//! ## Architecture
//!
//! - **Units**: canonical nanometre lengths; parse/format for inch
//!   (fractional) and metric entry (`units` module)
//! - **Calibration**: rational steps-per-unit, backlash, track limits
//!   (`calibration`), persisted atomically (`store`)
//! - **Planning**: bounded, backlash-compensated step commands with
//!   trapezoidal velocity profiles (`planner`)
//! - **Queue**: FIFO cut list with operator edits (`queue`)
//! - **Control**: the `Controller` state machine, sole owner of device state
//!   (`controller`), reporting through `status`
//!
//! ## Canonical units
//!
//! Internals operate in **nanometres** (`i64`) so inch fractions and metric
//! decimals convert exactly and repeated conversions cannot drift. See
//! [`units::Length`].

pub mod calibration;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod mocks;
pub mod planner;
pub mod queue;
pub mod status;
pub mod store;
pub mod units;
pub mod util;

pub use calibration::{Calibration, StepsPerUnit};
pub use config::{DisplayCfg, MotionCfg};
pub use controller::{Controller, ControllerBuilder};
pub use error::{
    BuildError, CalibrationError, ControlError, FaultReason, ParseError, PlanError, QueueError,
    StoreError,
};
pub use planner::{CarriageState, plan};
pub use queue::{CutItem, CutQueue, ItemId, ItemStatus, RequestedLength};
pub use status::{QueueItemView, StateKind, StatusSnapshot};
pub use store::CalibrationStore;
pub use units::{Length, UnitMode, format_length, parse_length};
