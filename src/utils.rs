// Utility functions

/// Rounds to two decimal places (monetary values).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Rounds to one decimal place (percentages, demand units).
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Margin of `price` over `cost` as a percentage; 0 when the price is
/// non-positive.
pub fn margin_percent(price: f64, cost: f64) -> f64 {
    if price > 0.0 {
        (price - cost) / price * 100.0
    } else {
        0.0
    }
}
