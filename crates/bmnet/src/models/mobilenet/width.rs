//! # Width Multiplier Scaling
//!
//! A MobileNet width multiplier scales every channel count in the
//! network to trade accuracy for compute/size. Conventional multipliers
//! are 1.0, 0.75, 0.5 and 0.25; any positive value is accepted, and the
//! model configs reject multipliers that scale a stage to zero channels.

/// Scale a base channel count by a width multiplier.
///
/// Truncates toward zero; for the positive inputs used by the stage
/// tables this is ``floor(base * multiplier)``, matching the published
/// MobileNet schedules' integer-cast semantics (not rounding).
pub fn scale_channels(
    base: usize,
    multiplier: f64,
) -> usize {
    (base as f64 * multiplier) as usize
}
