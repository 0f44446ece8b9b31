//! Color space helpers

use glam::Vec3;

/// Luma weights for linear RGB
const LUMA: Vec3 = Vec3::new(0.299, 0.587, 0.114);

/// Convert one sRGB channel in 0..1 to linear.
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Convert an sRGB color with channels in 0..1 to linear. Out of range
/// channels are clamped.
pub fn srgb_color_to_linear(color: [f32; 3]) -> Vec3 {
    let c = Vec3::from_array(color).clamp(Vec3::ZERO, Vec3::ONE);
    Vec3::new(srgb_to_linear(c.x), srgb_to_linear(c.y), srgb_to_linear(c.z))
}

/// Convert an 8-bit sRGB color to linear.
pub fn srgb8_to_linear(color: [u8; 3]) -> Vec3 {
    srgb_color_to_linear(color.map(|c| c as f32 / 255.0))
}

/// Perceived brightness of a linear color
pub fn luminance(color: Vec3) -> f32 {
    color.dot(LUMA)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srgb_endpoints() {
        assert_eq!(srgb_to_linear(0.0), 0.0);
        assert!((srgb_to_linear(1.0) - 1.0).abs() < 1e-6);
        // Mid grey is much darker in linear space
        assert!((srgb_to_linear(0.5) - 0.214).abs() < 1e-3);
    }

    #[test]
    fn test_byte_colors() {
        let a = srgb8_to_linear([255, 128, 0]);
        let b = srgb_color_to_linear([1.0, 128.0 / 255.0, 0.0]);
        assert!((a - b).length() < 1e-5);
        assert!((a.x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_dim_colors_stay_dim() {
        // A byte color of 1 is nearly black, not full white
        let dim = srgb8_to_linear([1, 1, 1]);
        assert!(dim.x < 0.01);

        // Float channels are never rescaled, only clamped
        assert_eq!(srgb_color_to_linear([255.0, 2.0, 1.0]), Vec3::ONE);
        assert!(srgb_color_to_linear([1.0 / 255.0; 3]).x < 0.01);
    }

    #[test]
    fn test_luminance() {
        assert!((luminance(Vec3::ONE) - 1.0).abs() < 1e-6);
        assert!(luminance(Vec3::X) < luminance(Vec3::Y));
        assert!(luminance(Vec3::Z) < luminance(Vec3::X));
    }
}
