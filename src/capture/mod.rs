//! Single-shot capture pipeline: discover context, resolve and stabilize the
//! position, capture the viewport, save under the derived name.

pub mod naming;
pub mod save;
pub mod screenshot;

pub use naming::{capture_relative_path, derive_folder, sanitize_output_root};
pub use save::{DiskSink, SavedFile};
pub use screenshot::{capture_until_not_blank, is_blank_png, BLANK_RETRY_DELAY};

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::context::{aggregate, NormalizedContext};
use crate::error::{CaptureError, Result};
use crate::extract::extract_frames;
use crate::sequence::{resolve_sequence, ResolvedSequence, SequenceStabilizer};
use crate::settings::SettingsStore;
use crate::viewer::{Notice, Viewer};

pub const NO_CONTEXT_MESSAGE: &str =
    "未识别到项目/地块编号或当前序号（1/N），请确认位于举证照片的大图查看器";

/// Tunables for the capture pipeline.
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Pause between blank-frame retries
    pub blank_retry_delay: Duration,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            blank_retry_delay: BLANK_RETRY_DELAY,
        }
    }
}

/// One saved capture.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRecord {
    pub context: NormalizedContext,
    pub sequence: ResolvedSequence,
    /// `outputRoot/folder/baseName.png`
    pub relative_path: String,
    pub saved: SavedFile,
    pub timestamp: String,
}

pub struct CaptureService {
    viewer: Arc<dyn Viewer>,
    settings: Arc<SettingsStore>,
    sink: DiskSink,
    stabilizer: Mutex<SequenceStabilizer>,
    options: CaptureOptions,
}

impl CaptureService {
    pub fn new(viewer: Arc<dyn Viewer>, settings: Arc<SettingsStore>, sink: DiskSink) -> Self {
        Self::with_options(viewer, settings, sink, CaptureOptions::default())
    }

    pub fn with_options(
        viewer: Arc<dyn Viewer>,
        settings: Arc<SettingsStore>,
        sink: DiskSink,
        options: CaptureOptions,
    ) -> Self {
        Self {
            viewer,
            settings,
            sink,
            stabilizer: Mutex::new(SequenceStabilizer::default()),
            options,
        }
    }

    pub fn viewer(&self) -> &Arc<dyn Viewer> {
        &self.viewer
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn sink(&self) -> &DiskSink {
        &self.sink
    }

    /// Read the page and build the normalized context, without capturing.
    pub async fn discover_context(&self) -> Result<NormalizedContext> {
        let (labels, label_error) = match self.viewer.label_ids().await {
            Ok(labels) => {
                debug!("Label-based IDs: {:?}", labels);
                (Some(labels), None)
            }
            Err(e) => {
                warn!("Failed to get IDs from label scan: {}", e);
                (None, Some(e.to_string()))
            }
        };

        let snapshot = self.viewer.snapshot().await?;
        let frames = extract_frames(&snapshot);
        debug!("Extracted {} document(s)", frames.len());

        let mut context = aggregate(&frames, labels.as_ref())?;
        context.error = label_error;
        Ok(context)
    }

    /// Run one capture and save it. Feedback goes to the user through the
    /// viewer; the error is still returned to the caller.
    pub async fn capture(&self) -> Result<CaptureRecord> {
        let result = self.capture_inner().await;
        match &result {
            Ok(record) => {
                info!("Saved {}", record.saved.path);
                self.notify(Notice::Toast(format!("已保存：{}", record.relative_path)))
                    .await;
            }
            Err(CaptureError::NoContext) => {
                warn!("No project/parcel identifier on the page");
                self.notify(Notice::Toast(NO_CONTEXT_MESSAGE.to_string())).await;
            }
            Err(e) => {
                warn!("Capture failed: {}", e);
                self.notify(Notice::Toast(format!("截图失败：{}", e))).await;
            }
        }
        result
    }

    async fn capture_inner(&self) -> Result<CaptureRecord> {
        let mut context = self.discover_context().await?;
        let settings = self.settings.get().await;

        let resolved = resolve_sequence(&context);
        let sequence = self
            .stabilizer
            .lock()
            .await
            .stabilize(context.memory_key(), resolved);
        context.current = sequence.current;
        if sequence.total > 0 {
            context.total = sequence.total;
        }
        debug!(
            "Sequence for {}: {}/{} ({}, {:.2})",
            context.memory_key(),
            sequence.current,
            sequence.total,
            sequence.source,
            sequence.confidence
        );

        let relative_path = capture_relative_path(&context, &settings.output_root);

        match self.viewer.prepare_view().await {
            Ok(true) => debug!("Enabled the all-azimuths filter"),
            Ok(false) => {}
            Err(e) => warn!("Failed to prepare view: {}", e),
        }

        let png = self.capture_png().await?;
        let saved = self.sink.save(&relative_path, &png).await?;

        Ok(CaptureRecord {
            context,
            sequence,
            relative_path,
            saved,
            timestamp: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Attach, capture with blank retry, and detach on every path.
    async fn capture_png(&self) -> Result<Vec<u8>> {
        self.viewer.attach().await?;
        let captured = capture_until_not_blank(self.viewer.as_ref(), self.options.blank_retry_delay).await;
        if let Err(e) = self.viewer.detach().await {
            warn!("Failed to detach capture session: {}", e);
        }
        Ok(captured?.png)
    }

    async fn notify(&self, notice: Notice) {
        if let Err(e) = self.viewer.notify(notice).await {
            debug!("Notification failed: {}", e);
        }
    }

    /// Drop sequence memory that went stale.
    pub async fn sweep_memory(&self) -> usize {
        self.stabilizer.lock().await.expire()
    }

    /// Forget every parcel's sequence memory.
    pub async fn reset_memory(&self) {
        self.stabilizer.lock().await.reset();
    }
}
