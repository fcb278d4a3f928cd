//! Auto-capture loop: capture, advance, detect the end, switch parcels.

pub mod controller;
pub mod tracker;

pub use controller::{CaptureController, ControllerStatus, LoopSummary, StartOutcome};
pub use tracker::{EndSignal, SequenceTracker, STUCK_LIMIT};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoopState {
    Idle,
    Capturing,
    AwaitAdvance,
    SwitchingParcel,
    Stopped,
}

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    Cancelled,
    MaxCaptureCount,
    /// End of the parcel with auto-switch disabled
    SequenceComplete,
    /// End of the parcel and no further parcel could be opened
    AllParcelsComplete,
    StuckSafetyStop,
    NextButtonMissing,
}

/// Fixed pauses of the loop. Only the capture delay and the parcel switch
/// delay are user settings.
#[derive(Debug, Clone)]
pub struct LoopTimings {
    pub after_capture: Duration,
    pub next_click_retry: Duration,
    pub next_click_retries: u32,
    pub toast_check: Duration,
    pub switch_verify: Duration,
    pub after_zoom: Duration,
    pub zoom_levels: u32,
    pub after_switch: Duration,
}

impl Default for LoopTimings {
    fn default() -> Self {
        Self {
            after_capture: Duration::from_millis(2000),
            next_click_retry: Duration::from_millis(1000),
            next_click_retries: 3,
            toast_check: Duration::from_millis(1000),
            switch_verify: Duration::from_millis(2000),
            after_zoom: Duration::from_millis(500),
            zoom_levels: 2,
            after_switch: Duration::from_millis(5000),
        }
    }
}

impl LoopTimings {
    /// No pauses at all; for driving the loop against a scripted viewer.
    pub fn instant() -> Self {
        Self {
            after_capture: Duration::ZERO,
            next_click_retry: Duration::ZERO,
            toast_check: Duration::ZERO,
            switch_verify: Duration::ZERO,
            after_zoom: Duration::ZERO,
            after_switch: Duration::ZERO,
            ..Self::default()
        }
    }
}
