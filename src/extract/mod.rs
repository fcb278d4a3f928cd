//! Pattern/Signal Extraction
//!
//! Scans serialized document snapshots (the main document plus every reachable
//! same-origin frame) for identifier candidates and position counters. This is
//! the only layer that looks at page markup; everything downstream consumes the
//! `RawFrameContext` records produced here.
//!
//! All entry points are synchronous because `scraper::Html` is `!Send`; parse
//! trees never outlive a single call.

mod carousel;
mod counters;
mod identifiers;
mod patterns;
mod text;
mod walk;

pub use carousel::CarouselState;
pub use counters::{RatioNode, SpinNode};
pub use identifiers::LabelCandidate;
pub use patterns::{has_index_hint, parse_leading_int, parse_positive, parse_ratio};
pub use walk::{extract_document, extract_frames, MAX_FRAME_DEPTH};

use serde::{Deserialize, Serialize};

/// One document in the tab as serialized by the snapshot script.
///
/// `html` is `None` and `accessible` is false for frames that threw on access
/// (cross-origin); those are skipped silently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    /// Identity of the document, unique within one snapshot
    #[serde(default)]
    pub key: String,

    #[serde(default)]
    pub href: String,

    #[serde(default = "default_accessible")]
    pub accessible: bool,

    #[serde(default)]
    pub has_body: bool,

    #[serde(default)]
    pub has_document_element: bool,

    /// Serialized markup of the document element
    #[serde(default)]
    pub html: Option<String>,

    /// Rendered `innerText` of the body, when the browser provided it
    #[serde(default)]
    pub text: Option<String>,

    /// Child frames in discovery order
    #[serde(default)]
    pub frames: Vec<DocumentSnapshot>,
}

fn default_accessible() -> bool {
    true
}

impl DocumentSnapshot {
    /// Build an accessible snapshot from raw markup (used by tests and fixtures).
    pub fn from_html(key: impl Into<String>, href: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            href: href.into(),
            accessible: true,
            has_body: true,
            has_document_element: true,
            html: Some(html.into()),
            text: None,
            frames: Vec::new(),
        }
    }

    /// Snapshot of a frame the browser refused to expose.
    pub fn inaccessible(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            href: String::new(),
            accessible: false,
            has_body: false,
            has_document_element: false,
            html: None,
            text: None,
            frames: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_frame(mut self, frame: DocumentSnapshot) -> Self {
        self.frames.push(frame);
        self
    }
}

/// Extraction result for a single document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFrameContext {
    pub parcel_id: String,
    pub project_id: String,
    /// 0 = unknown
    pub current: u32,
    /// 0 = unknown
    pub total: u32,
    pub href: String,
    pub has_body: bool,
    pub has_document_element: bool,
    pub evidence: EvidenceBundle,
}

/// Which label selectors matched anything in the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorsHit {
    pub parcel_label: bool,
    pub project_label: bool,
    pub spin: bool,
}

/// Structured evidence gathered from one document.
///
/// Carries everything the resolver needs, so nothing downstream has to touch
/// the markup again.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    /// Traversal position, e.g. `depth:1`
    pub source: String,
    pub href: String,
    pub parcel_id: String,
    pub project_id: String,
    pub current: u32,
    pub total: u32,
    pub text_head: String,
    pub id_matches: Vec<String>,
    pub ratio_matches: Vec<String>,
    pub counter_matches: Vec<u32>,
    pub total_hints: Vec<u32>,
    pub selectors_hit: SelectorsHit,
    pub ratio_elements: Vec<RatioNode>,
    pub ratio_attributes: Vec<String>,
    pub spin_elements: Vec<SpinNode>,
    pub carousel: Option<CarouselState>,
    pub label_candidates: Vec<LabelCandidate>,
}

impl EvidenceBundle {
    /// Diagnostic slice kept on a normalized context.
    pub fn trimmed(&self) -> Self {
        Self {
            source: self.source.clone(),
            href: self.href.clone(),
            parcel_id: self.parcel_id.clone(),
            project_id: self.project_id.clone(),
            current: self.current,
            total: self.total,
            text_head: self.text_head.chars().take(100).collect(),
            id_matches: self.id_matches.iter().take(3).cloned().collect(),
            ratio_matches: self.ratio_matches.iter().take(3).cloned().collect(),
            counter_matches: self.counter_matches.iter().take(3).copied().collect(),
            total_hints: self.total_hints.iter().take(3).copied().collect(),
            selectors_hit: self.selectors_hit,
            ratio_elements: self.ratio_elements.iter().take(2).cloned().collect(),
            ratio_attributes: self.ratio_attributes.iter().take(2).cloned().collect(),
            spin_elements: self.spin_elements.iter().take(2).cloned().collect(),
            carousel: self.carousel.clone(),
            label_candidates: Vec::new(),
        }
    }
}
