//! [`Viewer`] over a Chrome tab.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotParams, EnableParams, GetLayoutMetricsParams,
};
use log::{debug, warn};

use super::chrome::ChromeDriver;
use super::scripts;
use crate::context::LabelIds;
use crate::error::{CaptureError, Result};
use crate::extract::DocumentSnapshot;
use crate::viewer::{
    ClickOutcome, EndProbe, ImageLoad, ImageLoadReason, Notice, Screenshot, Viewer,
};

/// Slack on top of the in-page image timeout before the call is abandoned.
const IMAGE_WAIT_GRACE: Duration = Duration::from_secs(2);

pub struct ChromeViewer {
    driver: ChromeDriver,
    attached: AtomicBool,
}

impl ChromeViewer {
    pub fn new(driver: ChromeDriver) -> Self {
        Self {
            driver,
            attached: AtomicBool::new(false),
        }
    }

    pub fn into_driver(self) -> ChromeDriver {
        self.driver
    }

    async fn run_in_documents<T: serde::de::DeserializeOwned>(&self, body: &str) -> Result<Option<T>> {
        self.driver
            .execute_script_typed::<Option<T>>(&scripts::in_every_document(body))
            .await
    }

    async fn open_session(&self) -> Result<()> {
        let page = self.driver.current_page().await?;
        page.execute(EnableParams::default()).await?;
        match self.driver.execute_script(scripts::HIDE_SCROLLBARS).await {
            Ok(_) => {}
            Err(e) => debug!("Could not hide scrollbars: {}", e),
        }
        Ok(())
    }
}

#[async_trait]
impl Viewer for ChromeViewer {
    async fn label_ids(&self) -> Result<LabelIds> {
        self.driver.execute_script_typed(scripts::LABEL_IDS).await
    }

    async fn snapshot(&self) -> Result<DocumentSnapshot> {
        self.driver.execute_script_typed(scripts::SNAPSHOT).await
    }

    async fn prepare_view(&self) -> Result<bool> {
        Ok(self
            .run_in_documents::<bool>(scripts::ENSURE_ALL_AZIMUTHS)
            .await?
            .unwrap_or(false))
    }

    async fn attach(&self) -> Result<()> {
        if self
            .attached
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CaptureError::Transport(
                "Another capture session is active".to_string(),
            ));
        }
        if let Err(e) = self.open_session().await {
            self.attached.store(false, Ordering::SeqCst);
            return Err(CaptureError::Transport(format!(
                "Failed to open capture session: {}",
                e
            )));
        }
        Ok(())
    }

    async fn capture_viewport(&self) -> Result<Screenshot> {
        let page = self.driver.current_page().await?;

        let metrics = page.execute(GetLayoutMetricsParams::default()).await?;
        let metrics = serde_json::to_value(&*metrics)
            .map_err(|e| CaptureError::Transport(format!("Unreadable layout metrics: {}", e)))?;
        let viewport = &metrics["cssLayoutViewport"];
        let width = viewport["clientWidth"].as_f64().unwrap_or(0.0).ceil();
        let height = viewport["clientHeight"].as_f64().unwrap_or(0.0).ceil();
        if width <= 0.0 || height <= 0.0 {
            return Err(CaptureError::Transport("Viewport has no size".to_string()));
        }

        let params: CaptureScreenshotParams = serde_json::from_value(serde_json::json!({
            "format": "png",
            "fromSurface": true,
            "captureBeyondViewport": false,
            "clip": { "x": 0, "y": 0, "width": width, "height": height, "scale": 1 }
        }))
        .map_err(|e| CaptureError::Transport(format!("Invalid screenshot parameters: {}", e)))?;

        let response = page
            .execute(params)
            .await
            .map_err(|e| CaptureError::Transport(format!("Page.captureScreenshot failed: {}", e)))?;

        let png = general_purpose::STANDARD
            .decode(&response.data)
            .map_err(|e| CaptureError::Transport(format!("Failed to decode screenshot: {}", e)))?;

        debug!("Captured {}x{} viewport ({} bytes)", width, height, png.len());
        Ok(Screenshot { png })
    }

    async fn detach(&self) -> Result<()> {
        if !self.attached.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(e) = self.driver.execute_script(scripts::RESTORE_SCROLLBARS).await {
            warn!("Could not restore scrollbars: {}", e);
        }
        Ok(())
    }

    async fn click_next_image(&self) -> Result<ClickOutcome> {
        let raw = self
            .run_in_documents::<String>(scripts::CLICK_NEXT_IMAGE)
            .await?
            .unwrap_or_default();
        Ok(ClickOutcome::from_result(&raw))
    }

    async fn click_next_parcel(&self) -> Result<bool> {
        Ok(self
            .run_in_documents::<bool>(scripts::CLICK_NEXT_PARCEL)
            .await?
            .unwrap_or(false))
    }

    async fn click_first_thumbnail(&self) -> Result<bool> {
        Ok(self
            .run_in_documents::<bool>(scripts::CLICK_FIRST_THUMBNAIL)
            .await?
            .unwrap_or(false))
    }

    async fn detect_end_of_sequence(&self, probe: EndProbe) -> Result<bool> {
        let body = match probe {
            EndProbe::Indicator => scripts::LAST_IMAGE_INDICATOR,
            EndProbe::Toast => scripts::LAST_IMAGE_TOAST,
        };
        Ok(self.run_in_documents::<bool>(body).await?.unwrap_or(false))
    }

    async fn zoom_map(&self, levels: u32) -> Result<ClickOutcome> {
        let body = scripts::ZOOM_MAP.replace("__LEVELS__", &levels.to_string());
        let raw = self
            .run_in_documents::<String>(&body)
            .await?
            .unwrap_or_default();
        Ok(ClickOutcome::from_result(&raw))
    }

    async fn wait_for_image(&self, timeout: Duration) -> Result<ImageLoad> {
        let script = scripts::WAIT_FOR_IMAGE.replace("__TIMEOUT_MS__", &timeout.as_millis().to_string());
        match tokio::time::timeout(
            timeout + IMAGE_WAIT_GRACE,
            self.driver.execute_script_typed::<Option<ImageLoad>>(&script),
        )
        .await
        {
            Ok(Ok(Some(load))) => Ok(load),
            Ok(Ok(None)) => Ok(ImageLoad::new(false, ImageLoadReason::NoResult, Duration::ZERO)),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(ImageLoad::new(false, ImageLoadReason::Timeout, timeout)),
        }
    }

    async fn notify(&self, notice: Notice) -> Result<()> {
        let script = match &notice {
            Notice::Toast(message) => scripts::with_message(scripts::TOAST, message),
            Notice::Alert(message) => scripts::with_message(scripts::ALERT, message),
        };
        self.driver.execute_script(&script).await.map(|_| ())
    }
}
