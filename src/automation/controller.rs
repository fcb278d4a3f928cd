//! The auto-capture controller.
//!
//! One loop per controller. [`CaptureController::start`] spawns it,
//! [`CaptureController::stop`] asks it to finish after the current step.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::RwLock;

use super::tracker::{EndSignal, SequenceTracker};
use super::{LoopState, LoopTimings, StopReason};
use crate::capture::{CaptureRecord, CaptureService};
use crate::error::Result;
use crate::settings::Settings;
use crate::viewer::{ClickOutcome, EndProbe, Notice};

pub const SEQUENCE_DONE_MESSAGE: &str = "当前地块截图完成！（自动切换已禁用）";
pub const ALL_PARCELS_DONE_MESSAGE: &str = "全部地块已截图完成！";
pub const PARCEL_SWITCHED_MESSAGE: &str =
    "已切换到新地块并尝试自动放大地图！如果箭头仍不清晰，请手动调整后点击确定继续。";

/// Snapshot of the controller for status queries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStatus {
    pub running: bool,
    pub state: LoopState,
    /// Captures attempted by the current (or last) run
    pub captured: u32,
    /// Captures saved since the controller was created
    pub saved_total: u32,
    pub parcel_id: String,
    pub current: u32,
    pub total: u32,
    pub last_path: Option<String>,
    pub last_stop: Option<StopReason>,
}

impl Default for ControllerStatus {
    fn default() -> Self {
        Self {
            running: false,
            state: LoopState::Idle,
            captured: 0,
            saved_total: 0,
            parcel_id: String::new(),
            current: 0,
            total: 0,
            last_path: None,
            last_stop: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopSummary {
    pub captured: u32,
    pub reason: StopReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

enum EndAction {
    Switched,
    Stop(StopReason),
}

pub struct CaptureController {
    service: Arc<CaptureService>,
    timings: LoopTimings,
    running: AtomicBool,
    cancel: AtomicBool,
    status: RwLock<ControllerStatus>,
}

impl CaptureController {
    pub fn new(service: Arc<CaptureService>) -> Self {
        Self::with_timings(service, LoopTimings::default())
    }

    pub fn with_timings(service: Arc<CaptureService>, timings: LoopTimings) -> Self {
        Self {
            service,
            timings,
            running: AtomicBool::new(false),
            cancel: AtomicBool::new(false),
            status: RwLock::new(ControllerStatus::default()),
        }
    }

    pub fn service(&self) -> &Arc<CaptureService> {
        &self.service
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn status(&self) -> ControllerStatus {
        let mut status = self.status.read().await.clone();
        status.running = self.is_running();
        status
    }

    /// Spawn the loop in the background. A second start while a loop is
    /// active does nothing.
    pub fn start(self: &Arc<Self>) -> StartOutcome {
        if !self.claim() {
            debug!("Auto capture already running");
            return StartOutcome::AlreadyRunning;
        }
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_claimed().await;
        });
        StartOutcome::Started
    }

    /// Run the loop to completion on the current task. `None` when another
    /// loop is already active.
    pub async fn run(&self) -> Option<LoopSummary> {
        if !self.claim() {
            return None;
        }
        Some(self.run_claimed().await)
    }

    /// Ask the loop to stop; it finishes the step in progress first.
    pub fn stop(&self) {
        if self.is_running() {
            info!("Stop requested");
            self.cancel.store(true, Ordering::SeqCst);
        }
    }

    /// One manual capture, sharing sequence memory with the loop.
    pub async fn capture_once(&self) -> Result<CaptureRecord> {
        let result = self.service.capture().await;
        if let Ok(record) = &result {
            self.record_saved(record).await;
        }
        result
    }

    fn claim(&self) -> bool {
        let claimed = self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if claimed {
            self.cancel.store(false, Ordering::SeqCst);
        }
        claimed
    }

    async fn run_claimed(&self) -> LoopSummary {
        {
            let mut status = self.status.write().await;
            status.captured = 0;
            status.last_stop = None;
        }
        info!("Auto capture started");

        let (reason, captured) = self.drive().await;

        let swept = self.service.sweep_memory().await;
        if swept > 0 {
            debug!("Dropped {} stale sequence memory entries", swept);
        }
        {
            let mut status = self.status.write().await;
            status.state = LoopState::Stopped;
            status.last_stop = Some(reason);
        }
        self.running.store(false, Ordering::SeqCst);

        info!("Auto capture finished: {:?}, {} capture(s)", reason, captured);
        self.notify(Notice::Toast(format!("自动截图已结束，共截图 {} 张", captured)))
            .await;

        LoopSummary { captured, reason }
    }

    async fn drive(&self) -> (StopReason, u32) {
        let mut tracker = SequenceTracker::new();
        let mut captured: u32 = 0;

        loop {
            if self.cancel.load(Ordering::SeqCst) {
                return (StopReason::Cancelled, captured);
            }

            let settings = self.service.settings().get().await;
            if settings.max_capture_count > 0 && captured >= settings.max_capture_count {
                info!("Reached max capture count {}", settings.max_capture_count);
                return (StopReason::MaxCaptureCount, captured);
            }

            self.set_state(LoopState::Capturing).await;
            let position = match self.service.capture().await {
                Ok(record) => {
                    self.record_saved(&record).await;
                    Some((record.context.current, record.context.total))
                }
                Err(_) => None,
            };
            captured += 1;
            self.status.write().await.captured = captured;
            match settings.max_capture_count {
                0 => info!("Captured {}", captured),
                max => info!("Captured {}/{}", captured, max),
            }

            tokio::time::sleep(self.timings.after_capture).await;
            if self.cancel.load(Ordering::SeqCst) {
                return (StopReason::Cancelled, captured);
            }
            self.set_state(LoopState::AwaitAdvance).await;

            let signal = tracker.observe(position);
            let at_end = match signal {
                EndSignal::Stuck => {
                    warn!("Position unchanged for {} captures, stopping", tracker.streak());
                    return (StopReason::StuckSafetyStop, captured);
                }
                EndSignal::Last => {
                    info!("Reached the last image by position");
                    true
                }
                EndSignal::Wrapped => {
                    info!("Position wrapped around to the start");
                    true
                }
                EndSignal::Continue => false,
                EndSignal::Inconclusive => self.probe_end(EndProbe::Indicator).await,
            };

            if at_end {
                match self.handle_end(&settings).await {
                    EndAction::Switched => {
                        tracker.reset();
                        tokio::time::sleep(self.timings.after_switch).await;
                        continue;
                    }
                    EndAction::Stop(reason) => return (reason, captured),
                }
            }

            if !self.click_next_with_retry().await {
                warn!("Next button not found, stopping");
                self.notify(Notice::Toast("未找到下一张按钮，自动截图已停止".to_string()))
                    .await;
                return (StopReason::NextButtonMissing, captured);
            }

            tokio::time::sleep(self.timings.toast_check).await;
            if self.probe_end(EndProbe::Toast).await {
                info!("Viewer reported the last image after advancing");
                match self.handle_end(&settings).await {
                    EndAction::Switched => {
                        tracker.reset();
                        tokio::time::sleep(self.timings.after_switch).await;
                        continue;
                    }
                    EndAction::Stop(reason) => return (reason, captured),
                }
            }

            match self.service.viewer().wait_for_image(settings.capture_delay()).await {
                Ok(load) => debug!("Image load: {:?} after {}ms", load.reason, load.elapsed_ms),
                Err(e) => debug!("Image load wait failed: {}", e),
            }
        }
    }

    async fn handle_end(&self, settings: &Settings) -> EndAction {
        if !settings.auto_switch_parcel {
            self.notify(Notice::Alert(SEQUENCE_DONE_MESSAGE.to_string())).await;
            return EndAction::Stop(StopReason::SequenceComplete);
        }

        self.set_state(LoopState::SwitchingParcel).await;
        if self.switch_parcel(settings).await {
            EndAction::Switched
        } else {
            self.notify(Notice::Alert(ALL_PARCELS_DONE_MESSAGE.to_string())).await;
            EndAction::Stop(StopReason::AllParcelsComplete)
        }
    }

    /// Open the next parcel and its first photo. Succeeds only when the
    /// parcel identifier actually changed.
    async fn switch_parcel(&self, settings: &Settings) -> bool {
        let viewer = self.service.viewer();
        let before = self.current_parcel_id().await;
        info!("Switching parcel from {:?}", before);

        match viewer.click_next_parcel().await {
            Ok(true) => {}
            Ok(false) => {
                info!("No next parcel button");
                return false;
            }
            Err(e) => {
                warn!("Failed to click next parcel: {}", e);
                return false;
            }
        }
        tokio::time::sleep(settings.parcel_switch_delay()).await;

        match viewer.click_first_thumbnail().await {
            Ok(true) => {}
            Ok(false) => {
                warn!("No thumbnail to open in the new parcel");
                return false;
            }
            Err(e) => {
                warn!("Failed to open first thumbnail: {}", e);
                return false;
            }
        }
        tokio::time::sleep(self.timings.switch_verify).await;

        let after = self.current_parcel_id().await;
        if after.is_empty() || after == before {
            warn!("Parcel did not change ({:?} -> {:?})", before, after);
            return false;
        }
        info!("Switched parcel to {}", after);

        match viewer.zoom_map(self.timings.zoom_levels).await {
            Ok(ClickOutcome::Clicked(how)) => debug!("Map zoom: {}", how),
            Ok(ClickOutcome::None) => debug!("No map to zoom"),
            Err(e) => debug!("Map zoom failed: {}", e),
        }
        tokio::time::sleep(self.timings.after_zoom).await;

        self.notify(Notice::Alert(PARCEL_SWITCHED_MESSAGE.to_string())).await;
        true
    }

    async fn current_parcel_id(&self) -> String {
        match self.service.discover_context().await {
            Ok(context) => context.parcel_id,
            Err(e) => {
                debug!("No context while switching parcel: {}", e);
                String::new()
            }
        }
    }

    async fn click_next_with_retry(&self) -> bool {
        let viewer = self.service.viewer();
        for attempt in 0..=self.timings.next_click_retries {
            if attempt > 0 {
                debug!("Retrying next click ({}/{})", attempt, self.timings.next_click_retries);
                tokio::time::sleep(self.timings.next_click_retry).await;
            }
            match viewer.click_next_image().await {
                Ok(ClickOutcome::Clicked(how)) => {
                    debug!("Next image: {}", how);
                    return true;
                }
                Ok(ClickOutcome::None) => {}
                Err(e) => debug!("Next click failed: {}", e),
            }
        }
        false
    }

    async fn probe_end(&self, probe: EndProbe) -> bool {
        match self.service.viewer().detect_end_of_sequence(probe).await {
            Ok(found) => found,
            Err(e) => {
                debug!("End probe {:?} failed: {}", probe, e);
                false
            }
        }
    }

    async fn record_saved(&self, record: &CaptureRecord) {
        let mut status = self.status.write().await;
        status.saved_total += 1;
        status.parcel_id = record.context.parcel_id.clone();
        status.current = record.context.current;
        status.total = record.context.total;
        status.last_path = Some(record.saved.path.clone());
    }

    async fn set_state(&self, state: LoopState) {
        self.status.write().await.state = state;
    }

    async fn notify(&self, notice: Notice) {
        if let Err(e) = self.service.viewer().notify(notice).await {
            debug!("Notification failed: {}", e);
        }
    }
}
