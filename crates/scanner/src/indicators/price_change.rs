use common::Bar;

/// Percent change from the first close to the last close of `bars`.
///
/// Signed: negative when the window closed lower than it opened.
/// Returns `None` for empty input or a non-positive first close.
pub fn price_change_pct(bars: &[Bar]) -> Option<f64> {
    let first = bars.first()?.close;
    let last = bars.last()?.close;
    if first <= 0.0 || !first.is_finite() {
        return None;
    }
    Some((last - first) / first * 100.0)
}
