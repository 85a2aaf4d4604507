//! Two-stop color ramps used by the Simulate color modes

use ember_core::Color;

/// Linear interpolation between two floats
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Linear interpolation between two RGBA colors, `t` clamped to [0, 1]
pub fn lerp_color(a: Color, b: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    Color::new(
        lerp_f32(a.r, b.r, t),
        lerp_f32(a.g, b.g, t),
        lerp_f32(a.b, b.b, t),
        lerp_f32(a.a, b.a, t),
    )
}

/// `value / max` clamped to [0, 1]; a non-positive max saturates
pub fn ramp(value: f32, max: f32) -> f32 {
    if max <= 0.0 {
        return 1.0;
    }
    (value / max).clamp(0.0, 1.0)
}
