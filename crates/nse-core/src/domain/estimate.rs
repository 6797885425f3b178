//! Estimate, deviation and flood-delay mathematics.

use std::f64::consts::PI;

use super::Estimate;

/// Calibration constant correcting the expected maximum of the proximity
/// order statistic.
pub const SIZE_ESTIMATE_CORRECTION: f64 = 0.332747;

/// Network size implied by a best proximity: `2^(p - 0.332747)`.
pub fn size_from_proximity(proximity: f64) -> f64 {
    (proximity - SIZE_ESTIMATE_CORRECTION).exp2()
}

/// Population standard deviation, rounded to the nearest integer.
///
/// Zero or one value yields 0.
pub fn std_deviation(values: &[f64]) -> u32 {
    if values.len() < 2 {
        return 0;
    }
    let mean = mean(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    to_count(variance.sqrt())
}

/// Peer-count estimate and deviation from recent best proximities.
///
/// `proximities` is ordered most recent first; callers bound its length by the
/// configured window. An empty slice yields `(0, 0)`.
pub fn estimate_and_deviation(proximities: &[u8]) -> Estimate {
    if proximities.is_empty() {
        return Estimate::default();
    }
    let sizes: Vec<f64> = proximities
        .iter()
        .map(|p| size_from_proximity(f64::from(*p)))
        .collect();

    Estimate {
        peers: to_count(mean(&sizes)),
        std_deviation: std_deviation(&sizes),
    }
}

/// Delay before flooding our own claim.
///
/// `frequency/2 - frequency/π · atan(proximity - previous_estimate)`: claims
/// far above what the previous estimate predicts go out almost immediately,
/// claims far below wait almost the whole round.
pub fn flood_delay(frequency_secs: u64, own_proximity: u16, previous_estimate: f64) -> f64 {
    let frequency = frequency_secs as f64;
    frequency / 2.0 - (frequency / PI) * (f64::from(own_proximity) - previous_estimate).atan()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Round to a non-negative integer, saturating at `u32::MAX`.
fn to_count(value: f64) -> u32 {
    if !value.is_finite() {
        return if value > 0.0 { u32::MAX } else { 0 };
    }
    value.round().clamp(0.0, f64::from(u32::MAX)) as u32
}
