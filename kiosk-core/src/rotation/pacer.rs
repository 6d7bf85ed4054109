use std::time::Duration;

use tracing::info;

use crate::config::RotationSection;

/// Recomputes the stay-on-page interval from the cumulative success rate.
///
/// A monotone damping policy over two running counters: poor success slows
/// the rotation down (longer stays, fewer requests), near-perfect success
/// speeds it up, both clamped to the configured bounds. Thresholds are
/// strict; a rate of exactly 0.5 or 0.9 changes nothing.
#[derive(Debug, Clone)]
pub struct AdaptivePacer {
    current: f64,
    min: f64,
    max: f64,
    enabled: bool,
}

impl AdaptivePacer {
    pub fn new(section: &RotationSection) -> Self {
        Self {
            current: section.stay_interval_secs,
            min: section.min_interval_secs,
            max: section.max_interval_secs,
            enabled: section.adaptive,
        }
    }

    /// Called once per URL visit with the session counters.
    pub fn observe(&mut self, total_visits: u64, successful_visits: u64) {
        if !self.enabled || total_visits == 0 {
            return;
        }
        let success_rate = successful_visits as f64 / total_visits as f64;
        let target = if success_rate < 0.5 {
            (self.current * 1.5).min(self.max)
        } else if success_rate > 0.9 {
            (self.current * 0.8).max(self.min)
        } else {
            self.current
        };
        if target != self.current {
            info!(
                from_secs = self.current,
                to_secs = target,
                success_rate = format_args!("{success_rate:.2}"),
                "adjusting stay interval"
            );
            self.current = target;
        }
    }

    pub fn seconds(&self) -> f64 {
        self.current
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pacer(stay: f64) -> AdaptivePacer {
        AdaptivePacer::new(&RotationSection {
            stay_interval_secs: stay,
            adaptive: true,
            min_interval_secs: 30.0,
            max_interval_secs: 180.0,
            ..RotationSection::default()
        })
    }

    #[test]
    fn low_success_rate_raises_interval() {
        let mut pacer = pacer(90.0);
        // 2 successes out of 10 attempts: 20%.
        pacer.observe(10, 2);
        assert_eq!(pacer.seconds(), 135.0);
    }

    #[test]
    fn high_success_rate_lowers_interval() {
        let mut pacer = pacer(90.0);
        // 19 of 20: 95%.
        pacer.observe(20, 19);
        assert_eq!(pacer.seconds(), 72.0);
    }

    #[test]
    fn raised_interval_is_capped_at_max() {
        let mut pacer = pacer(150.0);
        pacer.observe(10, 1);
        assert_eq!(pacer.seconds(), 180.0);
        pacer.observe(12, 1);
        assert_eq!(pacer.seconds(), 180.0);
    }

    #[test]
    fn lowered_interval_is_clamped_at_min() {
        let mut pacer = pacer(32.0);
        pacer.observe(100, 99);
        assert_eq!(pacer.seconds(), 30.0);
        pacer.observe(101, 100);
        assert_eq!(pacer.seconds(), 30.0);
    }

    #[test]
    fn boundary_rates_change_nothing() {
        let mut pacer = pacer(90.0);
        pacer.observe(2, 1); // exactly 0.5
        assert_eq!(pacer.seconds(), 90.0);
        pacer.observe(10, 9); // exactly 0.9
        assert_eq!(pacer.seconds(), 90.0);
    }

    #[test]
    fn mid_band_rate_changes_nothing() {
        let mut pacer = pacer(90.0);
        pacer.observe(10, 7);
        assert_eq!(pacer.seconds(), 90.0);
    }

    #[test]
    fn zero_visits_changes_nothing() {
        let mut pacer = pacer(90.0);
        pacer.observe(0, 0);
        assert_eq!(pacer.seconds(), 90.0);
    }

    #[test]
    fn disabled_pacer_never_moves() {
        let mut pacer = AdaptivePacer::new(&RotationSection {
            adaptive: false,
            ..RotationSection::default()
        });
        pacer.observe(10, 1);
        assert_eq!(pacer.seconds(), 90.0);
    }

    #[test]
    fn repeated_observation_with_unchanged_counters_reaches_a_fixed_point() {
        let mut pacer = pacer(90.0);
        pacer.observe(10, 2);
        assert_eq!(pacer.seconds(), 135.0);
        // Same counters keep raising until the cap, then stabilize.
        pacer.observe(10, 2);
        assert_eq!(pacer.seconds(), 180.0);
        pacer.observe(10, 2);
        assert_eq!(pacer.seconds(), 180.0);
    }

    #[test]
    fn stable_at_caps_under_repeated_observation() {
        let mut pacer = pacer(90.0);
        for total in 1..=20u64 {
            pacer.observe(total * 10, total); // steady 10% success
        }
        assert_eq!(pacer.seconds(), 180.0);
    }
}
