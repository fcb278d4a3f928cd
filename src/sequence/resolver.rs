//! Sequence Resolver
//!
//! Evidence is flattened into an ordered list of [`Signal`]s and folded
//! through a single candidate-preference rule by [`fuse`]. Nothing here
//! touches the page.

use super::confidence::{
    CAROUSEL, CONTEXT, COUNTER, MARGIN, OVERRIDE, RATIO, SPIN, SPIN_HINT,
};
use super::{ResolvedSequence, SequenceSource};
use crate::context::NormalizedContext;
use crate::extract::{parse_positive, parse_ratio, EvidenceBundle};

/// A proposed value for `current`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub value: u32,
    pub confidence: f64,
    pub source: SequenceSource,
}

/// One observation, in evidence order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    /// Observed sequence length; the largest one wins
    Total(u32),
    Current(Candidate),
}

impl Signal {
    pub fn current(value: u32, confidence: f64, source: SequenceSource) -> Self {
        Signal::Current(Candidate {
            value,
            confidence,
            source,
        })
    }
}

/// Resolve the displayed position from a normalized context and its evidence.
pub fn resolve_sequence(context: &NormalizedContext) -> ResolvedSequence {
    let signals: Vec<Signal> = context
        .evidence
        .iter()
        .flat_map(signals_from_evidence)
        .collect();
    fuse(context.current, context.total, &signals)
}

/// Flatten one evidence bundle into signals, carousel first.
pub fn signals_from_evidence(evidence: &EvidenceBundle) -> Vec<Signal> {
    let mut signals = Vec::new();

    if let Some(carousel) = &evidence.carousel {
        if carousel.total > 0 {
            signals.push(Signal::Total(carousel.total));
        }
        if carousel.current > 0 {
            signals.push(Signal::current(carousel.current, CAROUSEL, SequenceSource::Carousel));
        }
    }

    for text in &evidence.ratio_matches {
        push_ratio(&mut signals, text, SequenceSource::RatioText);
    }
    for node in &evidence.ratio_elements {
        push_ratio(&mut signals, &node.text, SequenceSource::RatioNode);
    }
    for combined in &evidence.ratio_attributes {
        push_ratio(&mut signals, combined, SequenceSource::RatioNode);
    }

    for counter in &evidence.counter_matches {
        signals.push(Signal::current(*counter, COUNTER, SequenceSource::Counter));
    }
    for hint in &evidence.total_hints {
        signals.push(Signal::Total(*hint));
    }

    for spin in &evidence.spin_elements {
        let (confidence, source) = if spin.has_index_hint() {
            (SPIN_HINT, SequenceSource::SpinHint)
        } else {
            (SPIN, SequenceSource::Spin)
        };
        let values = [
            &spin.aria_value_now,
            &spin.value,
            &spin.aria_value_text,
            &spin.text,
        ];
        for raw in values {
            if let Some(value) = parse_positive(raw.trim()) {
                signals.push(Signal::current(value, confidence, source));
            }
        }
    }

    signals
}

fn push_ratio(signals: &mut Vec<Signal>, text: &str, source: SequenceSource) {
    if let Some((current, total)) = parse_ratio(text) {
        signals.push(Signal::Total(total));
        signals.push(Signal::current(current, RATIO, source));
    }
}

/// Fold signals over a baseline taken from the context itself.
pub fn fuse(baseline_current: u32, baseline_total: u32, signals: &[Signal]) -> ResolvedSequence {
    let mut best = ResolvedSequence {
        current: baseline_current,
        total: baseline_total,
        confidence: if baseline_current > 0 { CONTEXT } else { 0.0 },
        source: if baseline_current > 0 {
            SequenceSource::Context
        } else {
            SequenceSource::None
        },
    };

    for signal in signals {
        match *signal {
            Signal::Total(total) => {
                if total > best.total {
                    best.total = total;
                }
            }
            Signal::Current(candidate) => prefer(&mut best, candidate),
        }
    }

    if best.total > 0 && best.current > best.total && best.confidence < OVERRIDE {
        best.current = best.total;
    }
    if best.current == 0 {
        best.current = 1;
    }
    best
}

fn prefer(best: &mut ResolvedSequence, candidate: Candidate) {
    if candidate.value == 0 {
        return;
    }
    if best.current == 0 || candidate.confidence > best.confidence + MARGIN {
        best.current = candidate.value;
        best.confidence = candidate.confidence;
        best.source = candidate.source;
        return;
    }
    if candidate.confidence < best.confidence - MARGIN {
        return;
    }

    let within_total =
        best.total == 0 || candidate.value <= best.total || candidate.confidence >= OVERRIDE;
    let consistent = candidate.value.abs_diff(best.current) <= 1
        || candidate.confidence >= best.confidence;
    if within_total && consistent {
        best.current = candidate.value;
        best.confidence = best.confidence.max(candidate.confidence);
        best.source = candidate.source;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{CarouselState, SpinNode};

    fn candidate(value: u32, confidence: f64, source: SequenceSource) -> Signal {
        Signal::current(value, confidence, source)
    }

    #[test]
    fn test_empty_defaults_to_first_image() {
        let resolved = fuse(0, 0, &[]);
        assert_eq!(resolved.current, 1);
        assert_eq!(resolved.confidence, 0.0);
        assert_eq!(resolved.source, SequenceSource::None);
    }

    #[test]
    fn test_baseline_from_context() {
        let resolved = fuse(4, 9, &[]);
        assert_eq!(resolved, ResolvedSequence::new(4, 9, CONTEXT, SequenceSource::Context));
    }

    #[test]
    fn test_higher_confidence_replaces() {
        let resolved = fuse(
            7,
            0,
            &[candidate(3, COUNTER, SequenceSource::Counter), candidate(2, CAROUSEL, SequenceSource::Carousel)],
        );
        assert_eq!(resolved.current, 2);
        assert_eq!(resolved.source, SequenceSource::Carousel);
    }

    #[test]
    fn test_tie_requires_consistency() {
        // Within margin, far from the best and less confident: rejected
        let resolved = fuse(
            0,
            0,
            &[candidate(3, RATIO, SequenceSource::RatioText), candidate(8, SPIN_HINT, SequenceSource::SpinHint)],
        );
        assert_eq!(resolved.current, 3);

        // Within margin and adjacent: accepted, confidence keeps the max
        let resolved = fuse(
            0,
            0,
            &[candidate(3, RATIO, SequenceSource::RatioText), candidate(4, SPIN_HINT, SequenceSource::SpinHint)],
        );
        assert_eq!(resolved.current, 4);
        assert_eq!(resolved.confidence, RATIO);
        assert_eq!(resolved.source, SequenceSource::SpinHint);
    }

    #[test]
    fn test_tie_respects_known_total() {
        let resolved = fuse(
            0,
            0,
            &[
                Signal::Total(5),
                candidate(4, RATIO, SequenceSource::RatioText),
                candidate(6, RATIO, SequenceSource::RatioNode),
            ],
        );
        assert_eq!(resolved.current, 4);
    }

    #[test]
    fn test_total_only_increases() {
        let resolved = fuse(0, 10, &[Signal::Total(4), Signal::Total(12), Signal::Total(11)]);
        assert_eq!(resolved.total, 12);
    }

    #[test]
    fn test_clamp_to_total_below_override() {
        let resolved = fuse(0, 0, &[Signal::Total(5), candidate(9, RATIO, SequenceSource::RatioText)]);
        assert_eq!(resolved.current, 5);

        let resolved = fuse(0, 0, &[Signal::Total(5), candidate(9, CAROUSEL, SequenceSource::Carousel)]);
        assert_eq!(resolved.current, 9);
    }

    #[test]
    fn test_unknown_total_never_clamps() {
        let resolved = fuse(0, 0, &[candidate(42, SPIN, SequenceSource::Spin)]);
        assert_eq!(resolved.current, 42);
        assert_eq!(resolved.total, 0);
    }

    #[test]
    fn test_evidence_order_and_weights() {
        let evidence = EvidenceBundle {
            carousel: Some(CarouselState {
                current: 2,
                total: 6,
                ..CarouselState::default()
            }),
            ratio_matches: vec!["3/10".into()],
            counter_matches: vec![5],
            total_hints: vec![7],
            spin_elements: vec![SpinNode {
                aria_value_now: "1".into(),
                aria_label: "sequence".into(),
                ..SpinNode::default()
            }],
            ..EvidenceBundle::default()
        };
        let signals = signals_from_evidence(&evidence);
        assert_eq!(
            signals,
            vec![
                Signal::Total(6),
                Signal::current(2, CAROUSEL, SequenceSource::Carousel),
                Signal::Total(10),
                Signal::current(3, RATIO, SequenceSource::RatioText),
                Signal::current(5, COUNTER, SequenceSource::Counter),
                Signal::Total(7),
                Signal::current(1, SPIN_HINT, SequenceSource::SpinHint),
            ]
        );
        let resolved = fuse(0, 0, &signals);
        assert_eq!(resolved.current, 2);
        assert_eq!(resolved.total, 10);
        assert_eq!(resolved.source, SequenceSource::Carousel);
    }
}
