//! Sequence position inference: per-capture resolution and per-parcel
//! stabilization.

pub mod resolver;
pub mod stabilizer;

pub use resolver::{fuse, resolve_sequence, signals_from_evidence, Candidate, Signal};
pub use stabilizer::{SequenceMemory, SequenceStabilizer, DEFAULT_MAX_AGE};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Confidence weights per heuristic. Fixed, not learned.
pub mod confidence {
    pub const CAROUSEL: f64 = 0.85;
    pub const RATIO: f64 = 0.65;
    pub const SPIN_HINT: f64 = 0.6;
    pub const COUNTER: f64 = 0.55;
    pub const SPIN: f64 = 0.4;
    pub const CONTEXT: f64 = 0.3;

    /// Candidates within this distance of the best are treated as ties.
    pub const MARGIN: f64 = 0.05;

    /// At or above this a candidate may exceed the known total.
    pub const OVERRIDE: f64 = 0.8;

    /// Below this the stabilizer distrusts jumps of more than one.
    pub const TRUSTED_JUMP: f64 = 0.7;
}

/// Which heuristic produced the accepted `current`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SequenceSource {
    #[default]
    #[serde(rename = "")]
    None,
    Context,
    Carousel,
    RatioText,
    RatioNode,
    Counter,
    SpinHint,
    Spin,
    FallbackAuto,
    StabilizedForward,
    StabilizedBackward,
}

impl SequenceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceSource::None => "",
            SequenceSource::Context => "context",
            SequenceSource::Carousel => "carousel",
            SequenceSource::RatioText => "ratio-text",
            SequenceSource::RatioNode => "ratio-node",
            SequenceSource::Counter => "counter",
            SequenceSource::SpinHint => "spin-hint",
            SequenceSource::Spin => "spin",
            SequenceSource::FallbackAuto => "fallback-auto",
            SequenceSource::StabilizedForward => "stabilized-forward",
            SequenceSource::StabilizedBackward => "stabilized-backward",
        }
    }

    /// True for the ratio heuristics (text or node).
    pub fn is_ratio(&self) -> bool {
        matches!(self, SequenceSource::RatioText | SequenceSource::RatioNode)
    }
}

impl fmt::Display for SequenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best estimate of the displayed image's position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSequence {
    pub current: u32,
    /// 0 = unknown
    pub total: u32,
    /// In [0, 1]
    pub confidence: f64,
    pub source: SequenceSource,
}

impl ResolvedSequence {
    pub fn new(current: u32, total: u32, confidence: f64, source: SequenceSource) -> Self {
        Self {
            current,
            total,
            confidence,
            source,
        }
    }
}
