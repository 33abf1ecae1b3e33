//! Angle unit conversion and nalgebra extensions

use nalgebra::Vector3;

/// Mathematical constants
pub const DEG_TO_RAD: f32 = core::f32::consts::PI / 180.0;
pub const RAD_TO_DEG: f32 = 180.0 / core::f32::consts::PI;

/// Convert an angle in radians to degrees
///
/// # Example
/// ```
/// use fused_attitude::degrees_from_radians;
///
/// let degrees = degrees_from_radians(core::f32::consts::FRAC_PI_2);
/// assert!((degrees - 90.0).abs() < 1e-4);
/// ```
#[inline]
pub fn degrees_from_radians(radians: f32) -> f32 {
    radians * 180.0 / core::f32::consts::PI
}

/// Convert an angle in degrees to radians
#[inline]
pub fn radians_from_degrees(degrees: f32) -> f32 {
    degrees * core::f32::consts::PI / 180.0
}

/// Extension trait for Vector3 unit conversions
pub trait Vector3Ext {
    /// Convert degrees to radians
    fn deg_to_rad(&self) -> Vector3<f32>;

    /// Convert radians to degrees
    fn rad_to_deg(&self) -> Vector3<f32>;
}

impl Vector3Ext for Vector3<f32> {
    fn deg_to_rad(&self) -> Vector3<f32> {
        self.map(radians_from_degrees)
    }

    fn rad_to_deg(&self) -> Vector3<f32> {
        self.map(degrees_from_radians)
    }
}
