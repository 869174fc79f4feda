// ============================================================
// Layer 6 — Progress Timing
// ============================================================
// Human-readable elapsed / remaining time for the training
// progress line, e.g. "3m 12s (- 41m 7s)".

/// Whole seconds as "Xm Ys".
pub fn as_minutes(secs: f64) -> String {
    let secs    = secs.max(0.0);
    let minutes = (secs / 60.0).floor();
    let rest    = secs - minutes * 60.0;
    format!("{}m {}s", minutes as u64, rest as u64)
}

/// Elapsed time and estimated time left, given the fraction of work
/// done so far. The remaining estimate is `elapsed / percent - elapsed`.
pub fn time_since(elapsed: f64, percent: f64) -> String {
    let remaining = if percent > 0.0 {
        elapsed / percent - elapsed
    } else {
        0.0
    };
    format!("{} (- {})", as_minutes(elapsed), as_minutes(remaining))
}
