//! Sequence Stabilizer
//!
//! Smooths resolved positions against the last accepted position of the same
//! parcel. Memory is owned by one stabilizer instance; callers that share it
//! across tasks wrap it in a lock.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::debug;

use super::confidence::TRUSTED_JUMP;
use super::{ResolvedSequence, SequenceSource};

/// Inactivity after which a parcel's memory is swept.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(30 * 60);

/// Last accepted position for one parcel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceMemory {
    pub last: u32,
    pub total: u32,
    pub updated_at: Instant,
}

#[derive(Debug)]
pub struct SequenceStabilizer {
    entries: HashMap<String, SequenceMemory>,
    max_age: Duration,
}

impl Default for SequenceStabilizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_AGE)
    }
}

impl SequenceStabilizer {
    pub fn new(max_age: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            max_age,
        }
    }

    pub fn stabilize(&mut self, key: &str, resolved: ResolvedSequence) -> ResolvedSequence {
        self.stabilize_at(key, resolved, Instant::now())
    }

    /// Stabilize `resolved` for `key` and record the outcome as of `now`.
    ///
    /// An empty key has no memory and passes through unchanged.
    pub fn stabilize_at(&mut self, key: &str, resolved: ResolvedSequence, now: Instant) -> ResolvedSequence {
        if key.is_empty() {
            return resolved;
        }

        let prior = self.entries.get(key).copied();
        let prior_last = prior.map(|memory| memory.last).unwrap_or(0);
        let prior_total = prior.map(|memory| memory.total).unwrap_or(0);

        let mut result = resolved;
        if result.total == 0 {
            result.total = prior_total;
        }
        let bound = result.total;

        if result.current == 0 {
            let next = prior_last.saturating_add(1);
            result.current = if bound > 0 { next.min(bound) } else { next };
            result.source = SequenceSource::FallbackAuto;
        } else if prior_last > 0 {
            let delta = i64::from(result.current) - i64::from(prior_last);
            let trusted = result.confidence >= TRUSTED_JUMP;

            if delta > 1 && !trusted {
                let next = prior_last.saturating_add(1);
                result.current = (if bound > 0 { next.min(bound) } else { next }).max(1);
                result.source = SequenceSource::StabilizedForward;
            } else if delta < -1 && !trusted {
                let wrapped =
                    result.current == 1 && bound > 0 && prior_last.saturating_add(1) >= bound;
                if !wrapped {
                    // Backward jumps keep the resolved value; only the floor applies.
                    result.current = result.current.max(1);
                    result.source = SequenceSource::StabilizedBackward;
                }
            }
        }

        if result.total > 0 && result.current > result.total {
            result.current = result.total;
        }

        if result.source != resolved.source || result.current != resolved.current {
            debug!(
                "Stabilized {}: {} -> {} ({})",
                key, resolved.current, result.current, result.source
            );
        }

        self.entries.insert(
            key.to_string(),
            SequenceMemory {
                last: result.current,
                total: resolved.total.max(prior_total),
                updated_at: now,
            },
        );

        result
    }

    pub fn get(&self, key: &str) -> Option<&SequenceMemory> {
        self.entries.get(key)
    }

    /// Drop memory untouched for longer than the configured max age.
    pub fn expire(&mut self) -> usize {
        self.expire_at(Instant::now())
    }

    pub fn expire_at(&mut self, now: Instant) -> usize {
        let max_age = self.max_age;
        let before = self.entries.len();
        self.entries
            .retain(|_, memory| now.saturating_duration_since(memory.updated_at) <= max_age);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!("Expired {} sequence memory entries", removed);
        }
        removed
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(current: u32, total: u32, confidence: f64) -> ResolvedSequence {
        ResolvedSequence::new(current, total, confidence, SequenceSource::RatioText)
    }

    fn primed(last: u32, total: u32) -> SequenceStabilizer {
        let mut stabilizer = SequenceStabilizer::default();
        stabilizer.stabilize("F24ABC-1-2", seq(last, total, 0.9));
        stabilizer
    }

    #[test]
    fn test_first_observation_accepted() {
        let mut stabilizer = SequenceStabilizer::default();
        let result = stabilizer.stabilize("P1-1", seq(4, 10, 0.3));
        assert_eq!(result, seq(4, 10, 0.3));
        assert_eq!(stabilizer.get("P1-1").map(|m| m.last), Some(4));
    }

    #[test]
    fn test_empty_key_passes_through() {
        let mut stabilizer = SequenceStabilizer::default();
        let result = stabilizer.stabilize("", seq(9, 3, 0.1));
        assert_eq!(result.current, 9);
        assert!(stabilizer.is_empty());
    }

    #[test]
    fn test_missing_current_advances_from_memory() {
        let mut stabilizer = primed(3, 4);
        let result = stabilizer.stabilize("F24ABC-1-2", seq(0, 0, 0.0));
        assert_eq!(result.current, 4);
        assert_eq!(result.total, 4);
        assert_eq!(result.source, SequenceSource::FallbackAuto);

        let result = stabilizer.stabilize("F24ABC-1-2", seq(0, 0, 0.0));
        assert_eq!(result.current, 4);
    }

    #[test]
    fn test_trusted_jump_accepted() {
        let mut stabilizer = primed(2, 10);
        let result = stabilizer.stabilize("F24ABC-1-2", seq(7, 10, 0.85));
        assert_eq!(result.current, 7);
        assert_eq!(result.source, SequenceSource::RatioText);
    }

    #[test]
    fn test_backward_jump_keeps_resolved_value() {
        let mut stabilizer = primed(8, 10);
        let result = stabilizer.stabilize("F24ABC-1-2", seq(3, 10, 0.4));
        assert_eq!(result.current, 3);
        assert_eq!(result.source, SequenceSource::StabilizedBackward);
    }

    #[test]
    fn test_memory_total_never_shrinks() {
        let mut stabilizer = primed(2, 10);
        stabilizer.stabilize("F24ABC-1-2", seq(3, 6, 0.65));
        assert_eq!(stabilizer.get("F24ABC-1-2").map(|m| m.total), Some(10));
    }

    #[test]
    fn test_saturated_memory_does_not_overflow() {
        let mut stabilizer = primed(u32::MAX, 0);
        let result = stabilizer.stabilize("F24ABC-1-2", seq(0, 0, 0.0));
        assert_eq!(result.current, u32::MAX);
        assert_eq!(result.source, SequenceSource::FallbackAuto);

        let result = stabilizer.stabilize("F24ABC-1-2", seq(1, 10, 0.3));
        assert_eq!(result.current, 1);
        assert_eq!(result.total, 10);
    }

    #[test]
    fn test_expire_sweeps_stale_entries() {
        let start = Instant::now();
        let mut stabilizer = SequenceStabilizer::new(Duration::from_secs(60));
        stabilizer.stabilize_at("old", seq(1, 0, 0.3), start);
        stabilizer.stabilize_at("fresh", seq(1, 0, 0.3), start + Duration::from_secs(50));

        assert_eq!(stabilizer.expire_at(start + Duration::from_secs(90)), 1);
        assert!(stabilizer.get("old").is_none());
        assert!(stabilizer.get("fresh").is_some());

        stabilizer.reset();
        assert_eq!(stabilizer.len(), 0);
    }
}
