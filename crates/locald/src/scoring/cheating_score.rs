// scoring/cheating_score.rs
// Weighted, normalized cheating score over grouped violation tallies

use crate::config::ScoringConfig;
use proctor_core::{Severity, ViolationKind, ViolationTally};

/// Pure scorer: the same tallies always produce the same score.
///
/// raw   = Σ severity_weight × kind_weight × count
/// score = min(max_score, raw / normalizer × 100)
#[derive(Debug, Clone, Default)]
pub struct CheatingScorer {
    config: ScoringConfig,
}

impl CheatingScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    fn severity_weight(&self, severity: Severity) -> u64 {
        self.config
            .severity_weights
            .get(&severity)
            .copied()
            .unwrap_or(0) as u64
    }

    fn kind_weight(&self, kind: ViolationKind) -> u64 {
        self.config
            .kind_weights
            .get(&kind)
            .copied()
            .unwrap_or(self.config.default_kind_weight) as u64
    }

    /// Unnormalized weighted total
    pub fn raw_score(&self, tallies: &[ViolationTally]) -> u64 {
        tallies
            .iter()
            .map(|t| {
                self.severity_weight(t.severity)
                    .saturating_mul(self.kind_weight(t.kind))
                    .saturating_mul(t.count)
            })
            .fold(0u64, u64::saturating_add)
    }

    pub fn score(&self, tallies: &[ViolationTally]) -> f64 {
        let raw = self.raw_score(tallies) as f64;
        let score = raw / self.config.normalizer * 100.0;
        score.clamp(0.0, self.config.max_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(kind: ViolationKind, severity: Severity, count: u64) -> ViolationTally {
        ViolationTally {
            kind,
            severity,
            count,
        }
    }

    #[test]
    fn test_phone_and_tab_switch_example() {
        let scorer = CheatingScorer::default();
        let tallies = [
            tally(ViolationKind::PhoneDetected, Severity::High, 2),
            tally(ViolationKind::TabSwitch, Severity::Medium, 1),
        ];
        assert_eq!(scorer.raw_score(&tallies), 46);
        let score = scorer.score(&tallies);
        assert!((score - 30.666_666).abs() < 1e-3);

        // No hidden state between calls
        assert_eq!(scorer.score(&tallies), score);
    }

    #[test]
    fn test_unlisted_kind_uses_default_weight() {
        let scorer = CheatingScorer::default();
        let tallies = [tally(ViolationKind::BookDetected, Severity::Low, 3)];
        assert_eq!(scorer.raw_score(&tallies), 3);
    }

    #[test]
    fn test_score_is_bounded() {
        let scorer = CheatingScorer::default();
        assert_eq!(scorer.score(&[]), 0.0);

        let tallies = [tally(ViolationKind::MultiplePersons, Severity::High, 1000)];
        assert_eq!(scorer.score(&tallies), 100.0);
    }

    #[test]
    fn test_huge_counts_saturate_at_max_score() {
        let scorer = CheatingScorer::default();
        let tallies = [
            tally(ViolationKind::PhoneDetected, Severity::High, u64::MAX),
            tally(ViolationKind::TabSwitch, Severity::Medium, u64::MAX),
        ];
        assert_eq!(scorer.raw_score(&tallies), u64::MAX);
        assert_eq!(scorer.score(&tallies), 100.0);
    }

    #[test]
    fn test_custom_weights() {
        let mut config = ScoringConfig::default();
        config.kind_weights.insert(ViolationKind::BookDetected, 10);
        config.normalizer = 100.0;
        let scorer = CheatingScorer::new(config);

        let tallies = [tally(ViolationKind::BookDetected, Severity::Medium, 2)];
        assert_eq!(scorer.raw_score(&tallies), 60);
        assert_eq!(scorer.score(&tallies), 60.0);
    }
}
