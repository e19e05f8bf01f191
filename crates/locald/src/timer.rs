// locald/timer.rs
// Hysteresis primitive for one (session, violation kind) pair

/// Tracks a continuous positive-observation episode.
///
/// `onset_ms` is set iff the condition has been true on every observation
/// since that instant. A single negative observation ends the episode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViolationTimer {
    onset_ms: Option<i64>,
    confirmed: bool,
}

impl ViolationTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, is_condition_true: bool, now_ms: i64) {
        if is_condition_true {
            if self.onset_ms.is_none() {
                self.onset_ms = Some(now_ms);
            }
        } else {
            self.onset_ms = None;
            self.confirmed = false;
        }
    }

    pub fn is_confirmed(&self, now_ms: i64, required_ms: i64) -> bool {
        match self.onset_ms {
            Some(onset) => now_ms.saturating_sub(onset) >= required_ms,
            None => false,
        }
    }

    /// Record that the current episode matured; returns true the first time
    pub fn mark_confirmed(&mut self) -> bool {
        let first = !self.confirmed;
        self.confirmed = true;
        first
    }

    pub fn onset_ms(&self) -> Option<i64> {
        self.onset_ms
    }
}
