//! Converts clock, increment and moves-to-go into a per-move budget.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::limits::SearchLimits;

/// Assumed game horizon when `movestogo` is absent.
const DEFAULT_MOVE_HORIZON: u64 = 30;
/// Never plan to burn more than this fraction of the remaining clock.
const MAX_CLOCK_RATIO_NUM: u64 = 8;
const MAX_CLOCK_RATIO_DEN: u64 = 10;
/// Reserve against GUI and pipe latency.
const MOVE_OVERHEAD_MS: u64 = 30;

/// Per-search time budget with a PV-instability widening term.
pub struct TimeManager {
    start: Instant,
    /// Target time for this move.
    optimum_ms: u64,
    /// Hard ceiling for this move.
    maximum_ms: u64,
    /// Extra time granted while the best move keeps flapping.
    unstable_extra_ms: AtomicU64,
    managed: bool,
}

impl TimeManager {
    pub fn new(limits: &SearchLimits) -> TimeManager {
        let managed = limits.use_time_management();
        let (optimum_ms, maximum_ms) = if managed {
            budget(limits.time.unwrap_or(0), limits.increment.unwrap_or(0), limits.moves_to_go)
        } else {
            (u64::MAX, u64::MAX)
        };

        TimeManager {
            start: Instant::now(),
            optimum_ms,
            maximum_ms,
            unstable_extra_ms: AtomicU64::new(0),
            managed,
        }
    }

    /// Milliseconds since the search started.
    #[inline]
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// The soft target, widened while the PV is unstable.
    pub fn available_time_ms(&self) -> u64 {
        let extra = self.unstable_extra_ms.load(Ordering::Relaxed);
        (self.optimum_ms + extra).min(self.maximum_ms)
    }

    /// The hard ceiling.
    #[inline]
    pub fn maximum_time_ms(&self) -> u64 {
        self.maximum_ms
    }

    #[inline]
    pub fn is_managed(&self) -> bool {
        self.managed
    }

    /// Feed the best-move change counts of the current and previous
    /// iteration; frequent changes buy more time.
    pub fn pv_instability(&self, cur_changes: u32, prev_changes: u32) {
        let extra = cur_changes as u64 * (self.optimum_ms / 2)
            + prev_changes as u64 * (self.optimum_ms / 3);
        self.unstable_extra_ms.store(extra, Ordering::Relaxed);
    }
}

fn budget(time_ms: u64, increment_ms: u64, moves_to_go: Option<u32>) -> (u64, u64) {
    let clock_cap = time_ms * MAX_CLOCK_RATIO_NUM / MAX_CLOCK_RATIO_DEN;
    let horizon = match moves_to_go {
        Some(mtg) => (mtg as u64).clamp(1, 50),
        None => DEFAULT_MOVE_HORIZON,
    };

    let base = time_ms / horizon + increment_ms * 8 / 10;
    let optimum = base.min(clock_cap).saturating_sub(MOVE_OVERHEAD_MS).max(1);
    let maximum = (base * 5 + increment_ms).min(clock_cap).saturating_sub(MOVE_OVERHEAD_MS).max(1);

    (optimum.min(maximum), maximum)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock_limits(time: u64, inc: u64, mtg: Option<u32>) -> SearchLimits {
        SearchLimits {
            time: Some(time),
            increment: Some(inc),
            moves_to_go: mtg,
            ..Default::default()
        }
    }

    #[test]
    fn unmanaged_limits_have_no_budget() {
        let tm = TimeManager::new(&SearchLimits::infinite());
        assert!(!tm.is_managed());
        assert_eq!(tm.maximum_time_ms(), u64::MAX);
    }

    #[test]
    fn budget_scales_with_clock() {
        let small = TimeManager::new(&clock_limits(1_000, 0, None));
        let large = TimeManager::new(&clock_limits(600_000, 0, None));
        assert!(small.available_time_ms() < large.available_time_ms());
        assert!(small.maximum_time_ms() <= 1_000 * 8 / 10);
        assert!(large.available_time_ms() <= large.maximum_time_ms());
    }

    #[test]
    fn moves_to_go_concentrates_time() {
        let spread = TimeManager::new(&clock_limits(60_000, 0, None));
        let focused = TimeManager::new(&clock_limits(60_000, 0, Some(5)));
        assert!(focused.available_time_ms() > spread.available_time_ms());
    }

    #[test]
    fn instability_extends_available_time() {
        let tm = TimeManager::new(&clock_limits(60_000, 0, None));
        let base = tm.available_time_ms();
        tm.pv_instability(2, 1);
        assert!(tm.available_time_ms() >= base);
        tm.pv_instability(0, 0);
        assert_eq!(tm.available_time_ms(), base);
    }

    #[test]
    fn available_never_exceeds_maximum() {
        let tm = TimeManager::new(&clock_limits(10_000, 0, Some(2)));
        tm.pv_instability(50, 50);
        assert!(tm.available_time_ms() <= tm.maximum_time_ms());
    }
}
