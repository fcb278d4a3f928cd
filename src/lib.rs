pub mod automation;
pub mod browser;
pub mod capture;
pub mod context;
pub mod error;
pub mod extract;
pub mod sequence;
pub mod settings;
pub mod viewer;

//  Re-export commonly used items
pub use automation::{CaptureController, ControllerStatus, LoopState, LoopTimings, StopReason};
pub use browser::{ChromeDriver, ChromeViewer, ConnectionMode};
pub use capture::{CaptureRecord, CaptureService, DiskSink};
pub use context::{aggregate, LabelIds, NormalizedContext};
pub use error::{CaptureError, Result};
pub use extract::{extract_frames, DocumentSnapshot, EvidenceBundle, RawFrameContext};
pub use sequence::{resolve_sequence, ResolvedSequence, SequenceSource, SequenceStabilizer};
pub use settings::{Settings, SettingsStore};
pub use viewer::{ClickOutcome, EndProbe, ImageLoad, Notice, Screenshot, Viewer};
