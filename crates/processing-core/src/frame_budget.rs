//! Frame budget: when the render loop must stop, and how far along it is.

/// Why the render loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Source video reached its end.
    Ended,
    /// Source video was paused externally.
    Paused,
    /// Elapsed ticks ran past the duration estimate plus grace.
    BudgetExceeded,
    /// The export was dismissed.
    Aborted,
    /// The recorder rejected a frame.
    Failed,
}

/// Duration-derived frame estimate with a small grace margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBudget {
    /// Estimated total frames; `None` when the duration is unknown.
    estimated_total: Option<u64>,
    grace: u64,
}

impl FrameBudget {
    pub fn new(estimated_total: Option<u64>, grace: u64) -> Self {
        Self {
            estimated_total,
            grace,
        }
    }

    pub fn estimated_total(&self) -> Option<u64> {
        self.estimated_total
    }

    /// True once `ticks` exceeds the estimate by more than the grace.
    ///
    /// `ticks` counts every render tick, including those that produced no
    /// frame.
    pub fn exceeded(&self, ticks: u64) -> bool {
        match self.estimated_total {
            Some(total) => ticks > total.saturating_add(self.grace),
            None => false,
        }
    }

    /// Progress percentage, capped below 100 until the export completes.
    pub fn progress_percent(&self, frames_rendered: u64) -> f64 {
        const CAP: f64 = 99.0;
        match self.estimated_total {
            Some(total) if total > 0 => {
                (frames_rendered as f64 / total as f64 * 100.0).min(CAP)
            }
            _ => 0.0,
        }
    }
}

/// Decide whether the loop should stop before painting the next frame.
///
/// Checks run in priority order: abort, ended, paused, budget.
pub fn stop_reason(
    budget: &FrameBudget,
    ticks: u64,
    aborted: bool,
    ended: bool,
    paused: bool,
) -> Option<StopReason> {
    if aborted {
        Some(StopReason::Aborted)
    } else if ended {
        Some(StopReason::Ended)
    } else if paused {
        Some(StopReason::Paused)
    } else if budget.exceeded(ticks) {
        Some(StopReason::BudgetExceeded)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_exceeded_after_grace() {
        let budget = FrameBudget::new(Some(300), 15);
        assert!(!budget.exceeded(300));
        assert!(!budget.exceeded(315));
        assert!(budget.exceeded(316));
    }

    #[test]
    fn test_unknown_duration_never_exceeds() {
        let budget = FrameBudget::new(None, 15);
        assert!(!budget.exceeded(u64::MAX));
        assert_eq!(budget.progress_percent(1_000), 0.0);
    }

    #[test]
    fn test_progress_capped_below_hundred() {
        let budget = FrameBudget::new(Some(300), 15);
        assert_eq!(budget.progress_percent(150), 50.0);
        assert_eq!(budget.progress_percent(300), 99.0);
        assert_eq!(budget.progress_percent(310), 99.0);
    }

    #[test]
    fn test_stop_priority() {
        let budget = FrameBudget::new(Some(10), 0);
        assert_eq!(stop_reason(&budget, 0, true, true, true), Some(StopReason::Aborted));
        assert_eq!(stop_reason(&budget, 0, false, true, true), Some(StopReason::Ended));
        assert_eq!(stop_reason(&budget, 0, false, false, true), Some(StopReason::Paused));
        assert_eq!(stop_reason(&budget, 11, false, false, false), Some(StopReason::BudgetExceeded));
        assert_eq!(stop_reason(&budget, 5, false, false, false), None);
    }

    #[test]
    fn test_budget_stops_a_source_that_never_reports_ending() {
        let budget = FrameBudget::new(Some(30), 15);
        assert_eq!(stop_reason(&budget, 45, false, false, false), None);
        assert_eq!(stop_reason(&budget, 46, false, false, false), Some(StopReason::BudgetExceeded));
    }
}
