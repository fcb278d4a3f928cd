//! The seam between inference and the browser tab.
//!
//! Everything the capture pipeline and the loop need from the page goes
//! through [`Viewer`]. The Chrome implementation lives in
//! [`crate::browser::ChromeViewer`]; tests drive a scripted in-memory one.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::LabelIds;
use crate::error::Result;
use crate::extract::DocumentSnapshot;

/// Raw PNG bytes of one viewport capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    pub png: Vec<u8>,
}

/// Result of an injected click helper: `"none"` in the page, or what was clicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    None,
    Clicked(String),
}

impl ClickOutcome {
    /// Interpret a helper's string result; empty and `"none"` mean nothing happened.
    pub fn from_result(raw: &str) -> Self {
        if raw.is_empty() || raw == "none" {
            ClickOutcome::None
        } else {
            ClickOutcome::Clicked(raw.to_string())
        }
    }

    pub fn clicked(&self) -> bool {
        matches!(self, ClickOutcome::Clicked(_))
    }
}

/// Which end-of-sequence probe to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndProbe {
    /// "Last image" text anywhere on the page, checked when position signals
    /// are inconclusive
    Indicator,
    /// Transient "already the last image" toast after clicking next
    Toast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageLoadReason {
    AlreadyComplete,
    Onload,
    Error,
    Timeout,
    NoImageFound,
    NoResult,
}

/// Outcome of waiting for the main image to finish loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLoad {
    pub loaded: bool,
    pub reason: ImageLoadReason,
    #[serde(rename = "waitedMs")]
    pub elapsed_ms: u64,
}

impl ImageLoad {
    pub fn new(loaded: bool, reason: ImageLoadReason, elapsed: Duration) -> Self {
        Self {
            loaded,
            reason,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// User-facing feedback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Transient status line
    Toast(String),
    /// Blocking message the user has to acknowledge
    Alert(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::Toast(message) | Notice::Alert(message) => message,
        }
    }
}

/// Operations on one viewer tab.
///
/// Implementations are remote calls; every method is awaited before the next
/// step, and none of them is expected to run concurrently with another on the
/// same tab.
#[async_trait]
pub trait Viewer: Send + Sync {
    /// Companion label scan (`项目编号：` / `地块编号：` captions).
    async fn label_ids(&self) -> Result<LabelIds>;

    /// Serialized document tree of the tab, main document first.
    async fn snapshot(&self) -> Result<DocumentSnapshot>;

    /// Make sure the "all azimuths" filter is on; true when it had to be clicked.
    async fn prepare_view(&self) -> Result<bool>;

    /// Open the exclusive capture session.
    async fn attach(&self) -> Result<()>;

    /// Capture the visible layout viewport as PNG.
    async fn capture_viewport(&self) -> Result<Screenshot>;

    /// Close the capture session. Safe to call when not attached.
    async fn detach(&self) -> Result<()>;

    async fn click_next_image(&self) -> Result<ClickOutcome>;

    async fn click_next_parcel(&self) -> Result<bool>;

    async fn click_first_thumbnail(&self) -> Result<bool>;

    async fn detect_end_of_sequence(&self, probe: EndProbe) -> Result<bool>;

    async fn zoom_map(&self, levels: u32) -> Result<ClickOutcome>;

    /// Wait for the largest visible image to load, bounded by `timeout`.
    async fn wait_for_image(&self, timeout: Duration) -> Result<ImageLoad>;

    async fn notify(&self, notice: Notice) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_outcome_from_helper_result() {
        assert_eq!(ClickOutcome::from_result("none"), ClickOutcome::None);
        assert_eq!(ClickOutcome::from_result(""), ClickOutcome::None);
        assert!(ClickOutcome::from_result("clicked .el-carousel__arrow--right").clicked());
    }

    #[test]
    fn test_image_load_wire_format() {
        let parsed: ImageLoad =
            serde_json::from_str(r#"{"loaded":false,"reason":"no-image-found","waitedMs":0}"#).unwrap();
        assert_eq!(parsed.reason, ImageLoadReason::NoImageFound);
        assert!(!parsed.loaded);
    }
}
