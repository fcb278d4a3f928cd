//! Context Aggregator
//!
//! Merges per-frame extraction results into the one context a capture works
//! against.

use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, Result};
use crate::extract::{EvidenceBundle, RawFrameContext};

/// Evidence entries exposed on a normalized context.
pub const EVIDENCE_EXPOSED: usize = 3;

/// Identifiers reported by the companion label scan. They take precedence
/// over frame-derived values whenever non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelIds {
    pub project_id: String,
    pub parcel_id: String,
}

impl LabelIds {
    pub fn is_empty(&self) -> bool {
        self.project_id.is_empty() && self.parcel_id.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedContext {
    pub parcel_id: String,
    pub project_id: String,
    pub current: u32,
    pub total: u32,
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub evidence: Vec<EvidenceBundle>,
}

impl NormalizedContext {
    /// Key used for per-parcel sequence memory.
    pub fn memory_key(&self) -> &str {
        if self.parcel_id.is_empty() {
            &self.project_id
        } else {
            &self.parcel_id
        }
    }

    pub fn has_identifier(&self) -> bool {
        !self.parcel_id.is_empty() || !self.project_id.is_empty()
    }
}

/// Project code implied by a parcel code: everything before the first hyphen.
pub fn project_from_parcel(parcel_id: &str) -> &str {
    parcel_id.split('-').next().unwrap_or_default()
}

/// Merge extraction results, nearest frame first, each field independently.
///
/// Returns [`CaptureError::NoContext`] when neither identifier is found.
pub fn aggregate(frames: &[RawFrameContext], labels: Option<&LabelIds>) -> Result<NormalizedContext> {
    let mut context = NormalizedContext::default();

    for frame in frames {
        take_first(&mut context.href, &frame.href);
        take_first(&mut context.parcel_id, &frame.parcel_id);
        take_first(&mut context.project_id, &frame.project_id);
        if context.current == 0 {
            context.current = frame.current;
        }
        if context.total == 0 {
            context.total = frame.total;
        }
    }

    if let Some(labels) = labels {
        if !labels.parcel_id.is_empty() {
            context.parcel_id = labels.parcel_id.clone();
        }
        if !labels.project_id.is_empty() {
            context.project_id = labels.project_id.clone();
        }
    }

    if context.project_id.is_empty() && !context.parcel_id.is_empty() {
        context.project_id = project_from_parcel(&context.parcel_id).to_string();
    }

    context.evidence = frames
        .iter()
        .take(EVIDENCE_EXPOSED)
        .map(|frame| frame.evidence.trimmed())
        .collect();

    if !context.has_identifier() {
        return Err(CaptureError::NoContext);
    }
    Ok(context)
}

fn take_first(slot: &mut String, candidate: &str) {
    if slot.is_empty() && !candidate.is_empty() {
        *slot = candidate.to_string();
    }
}
