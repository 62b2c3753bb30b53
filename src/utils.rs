//! Utility helpers: window sizing.

/// Suggest a sliding-window length for a horizon with a known number of
/// breakpoints.
///
/// Uses the SW-UCB tuning `tau = 2 sqrt(T ln T / Υ_T)` from Garivier & Moulines
/// 2008 (arXiv:0805.3415), with `T = horizon` and `Υ_T = max(n_changes, 1)`.
///
/// # Returns
///
/// A window length clamped to `[1, horizon]` (1 for a zero horizon).
///
/// # Example
///
/// ```rust
/// use banditlab::suggested_window_size;
///
/// // A year of daily rounds split into three phases (two breakpoints).
/// let w = suggested_window_size(365, 2);
/// assert!(w > 30 && w < 100);
/// ```
pub fn suggested_window_size(horizon: u64, n_changes: usize) -> usize {
    if horizon <= 1 {
        return 1;
    }
    let t = horizon as f64;
    let changes = n_changes.max(1) as f64;
    let tau = 2.0 * (t * t.ln() / changes).sqrt();
    let max = usize::try_from(horizon).unwrap_or(usize::MAX);
    (tau.round() as usize).clamp(1, max)
}

/// Per-arm window length when `k` arms share a horizon.
///
/// Each arm's window holds only its own rewards, and an arm is pulled roughly
/// `horizon / k` times, so the suggestion is made for that per-arm horizon.
pub fn suggested_window_size_for_k(k: usize, horizon: u64, n_changes: usize) -> usize {
    let k = k.max(1) as u64;
    suggested_window_size((horizon / k).max(1), n_changes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggested_window_size_is_clamped() {
        assert_eq!(suggested_window_size(0, 3), 1);
        assert_eq!(suggested_window_size(1, 0), 1);
        // Short horizons never exceed the horizon itself.
        assert!(suggested_window_size(5, 1) <= 5);
    }

    #[test]
    fn suggested_window_size_decreases_with_more_changes() {
        let few = suggested_window_size(10_000, 1);
        let many = suggested_window_size(10_000, 50);
        assert!(few > many, "more breakpoints → shorter window");
    }

    #[test]
    fn suggested_window_size_increases_with_horizon() {
        assert!(suggested_window_size(100_000, 5) > suggested_window_size(1_000, 5));
    }

    #[test]
    fn suggested_window_size_for_k_scales_down_with_more_arms() {
        let few = suggested_window_size_for_k(2, 10_000, 3);
        let many = suggested_window_size_for_k(50, 10_000, 3);
        assert!(few >= many, "more arms share the same horizon → smaller per-arm window");
    }
}
