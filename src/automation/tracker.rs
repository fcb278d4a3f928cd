//! End-of-sequence decisions from consecutive capture positions.

/// Identical positions in a row after which the loop gives up.
pub const STUCK_LIMIT: u32 = 25;

/// What the latest position says about the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndSignal {
    /// Position known and not yet at the end
    Continue,
    /// `current >= total`
    Last,
    /// Same position for [`STUCK_LIMIT`] captures in a row
    Stuck,
    /// Position went backwards
    Wrapped,
    /// Position unknown; the page has to be asked
    Inconclusive,
}

impl EndSignal {
    pub fn is_end(&self) -> bool {
        matches!(self, EndSignal::Last | EndSignal::Stuck | EndSignal::Wrapped)
    }
}

/// Remembers the previous capture's position for one parcel run.
#[derive(Debug, Default, Clone)]
pub struct SequenceTracker {
    previous: Option<u32>,
    streak: u32,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the position of the capture just taken (`None` when the capture
    /// failed) and classify it.
    pub fn observe(&mut self, position: Option<(u32, u32)>) -> EndSignal {
        let (current, total) = position.unwrap_or((0, 0));
        let known = current > 0 && total > 0;

        let mut wrapped = false;
        match self.previous {
            Some(previous) if current > 0 && current == previous => self.streak += 1,
            Some(previous) if current > 0 && current < previous => {
                wrapped = true;
                self.streak = 1;
            }
            _ if current > 0 => self.streak = 1,
            _ => self.streak = 0,
        }
        self.previous = (current > 0).then_some(current);

        if known && current >= total {
            EndSignal::Last
        } else if self.streak >= STUCK_LIMIT {
            EndSignal::Stuck
        } else if wrapped {
            EndSignal::Wrapped
        } else if known {
            EndSignal::Continue
        } else {
            EndSignal::Inconclusive
        }
    }

    /// Identical positions seen in a row, including the latest.
    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.streak = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_position_ends_sequence() {
        let mut tracker = SequenceTracker::new();
        assert_eq!(tracker.observe(Some((9, 10))), EndSignal::Continue);
        assert_eq!(tracker.observe(Some((10, 10))), EndSignal::Last);
    }

    #[test]
    fn test_stuck_after_limit_identical_positions() {
        let mut tracker = SequenceTracker::new();
        for _ in 1..STUCK_LIMIT {
            assert_eq!(tracker.observe(Some((3, 10))), EndSignal::Continue);
        }
        assert_eq!(tracker.observe(Some((3, 10))), EndSignal::Stuck);
        assert_eq!(tracker.streak(), STUCK_LIMIT);
    }

    #[test]
    fn test_progress_resets_streak() {
        let mut tracker = SequenceTracker::new();
        for _ in 0..10 {
            tracker.observe(Some((3, 10)));
        }
        tracker.observe(Some((4, 10)));
        assert_eq!(tracker.streak(), 1);
    }

    #[test]
    fn test_decrease_is_wrap() {
        let mut tracker = SequenceTracker::new();
        tracker.observe(Some((7, 0)));
        assert_eq!(tracker.observe(Some((1, 0))), EndSignal::Wrapped);
    }

    #[test]
    fn test_unknown_position_is_inconclusive() {
        let mut tracker = SequenceTracker::new();
        assert_eq!(tracker.observe(None), EndSignal::Inconclusive);
        assert_eq!(tracker.observe(Some((4, 0))), EndSignal::Inconclusive);
        assert_eq!(tracker.streak(), 1);
        assert_eq!(tracker.observe(None), EndSignal::Inconclusive);
        assert_eq!(tracker.streak(), 0);
    }

    #[test]
    fn test_reset_forgets_previous() {
        let mut tracker = SequenceTracker::new();
        tracker.observe(Some((8, 0)));
        tracker.reset();
        assert_eq!(tracker.observe(Some((1, 0))), EndSignal::Inconclusive);
    }
}
