//! Madgwick gradient-descent orientation filter
//!
//! Fuses Magnetic, Angular Rate and Gravity (MARG) readings. The gyroscope is
//! integrated every step; the accelerometer and magnetometer contribute a
//! normalized gradient-descent correction scaled by `beta`.
//!
//! References: Madgwick, "An efficient orientation filter for inertial and
//! inertial/magnetic sensor arrays" (2010).

use nalgebra::{Matrix3x4, Quaternion, Vector3, Vector4};

use crate::engine::FusionEngine;

/// Default gain (rad/s)
pub const DEFAULT_BETA: f32 = 0.1;

/// Default sample rate in Hz
pub const DEFAULT_SAMPLE_FREQUENCY: f32 = 512.0;

/// MARG orientation filter
///
/// The quaternion describes the sensor frame relative to an earth frame
/// whose Z axis points up and whose X axis follows the horizontal component
/// of the magnetic field.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use fused_attitude::{FusionEngine, Madgwick};
///
/// let mut filter = Madgwick::new(100.0, 0.1);
///
/// let gyroscope = Vector3::new(0.0, 0.0, 0.0);       // rad/s
/// let accelerometer = Vector3::new(0.0, 0.0, 1.0);   // gravity, up
/// let magnetometer = Vector3::new(0.6, 0.0, -0.8);
///
/// filter.update(gyroscope, accelerometer, magnetometer);
/// let q = filter.quaternion();
/// assert!((q.norm() - 1.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Madgwick {
    /// Current orientation estimate, kept at unit norm
    quaternion: Quaternion<f32>,
    /// Gradient step gain
    beta: f32,
    /// Sample rate in Hz
    sample_frequency: f32,
    /// Cached `1 / sample_frequency`
    sample_period: f32,
}

impl Madgwick {
    /// Gradient step gain
    pub fn beta(&self) -> f32 {
        self.beta
    }

    /// Sample rate in Hz
    pub fn sample_frequency(&self) -> f32 {
        self.sample_frequency
    }

    /// Overwrite the orientation estimate
    ///
    /// The quaternion is normalized; a zero quaternion is ignored.
    pub fn set_quaternion(&mut self, quaternion: Quaternion<f32>) {
        if let Some(unit) = normalized(quaternion) {
            self.quaternion = unit;
        }
    }

    /// Reset the estimate to the identity orientation
    pub fn reset(&mut self) {
        self.quaternion = Quaternion::identity();
    }

    /// Normalized objective gradient, or `None` when no correction applies
    ///
    /// Without a usable accelerometer reading the filter falls back to pure
    /// gyroscope integration. Without a magnetometer reading only the gravity
    /// objective is used.
    fn gradient(
        &self,
        accelerometer: Vector3<f32>,
        magnetometer: Vector3<f32>,
    ) -> Option<Quaternion<f32>> {
        let a = accelerometer.try_normalize(0.0)?;
        let q = self.quaternion;
        let (w, x, y, z) = (q.w, q.i, q.j, q.k);

        // Gravity objective and Jacobian
        let f_g = Vector3::new(
            2.0 * (x * z - w * y) - a.x,
            2.0 * (w * x + y * z) - a.y,
            2.0 * (0.5 - x * x - y * y) - a.z,
        );
        #[rustfmt::skip]
        let j_g = Matrix3x4::new(
            -2.0 * y, 2.0 * z, -2.0 * w, 2.0 * x,
            2.0 * x, 2.0 * w, 2.0 * z, 2.0 * y,
            0.0, -4.0 * x, -4.0 * y, 0.0,
        );
        let mut nabla: Vector4<f32> = j_g.transpose() * f_g;

        if let Some(m) = magnetometer.try_normalize(0.0) {
            // Earth field direction from the current estimate
            let h = (q * Quaternion::from_imag(m) * q.conjugate()).imag();
            let bx = (h.x * h.x + h.y * h.y).sqrt();
            let bz = h.z;

            let f_b = Vector3::new(
                2.0 * bx * (0.5 - y * y - z * z) + 2.0 * bz * (x * z - w * y) - m.x,
                2.0 * bx * (x * y - w * z) + 2.0 * bz * (w * x + y * z) - m.y,
                2.0 * bx * (w * y + x * z) + 2.0 * bz * (0.5 - x * x - y * y) - m.z,
            );
            let j_b = Matrix3x4::new(
                -2.0 * bz * y,
                2.0 * bz * z,
                -4.0 * bx * y - 2.0 * bz * w,
                -4.0 * bx * z + 2.0 * bz * x,
                -2.0 * bx * z + 2.0 * bz * x,
                2.0 * bx * y + 2.0 * bz * w,
                2.0 * bx * x + 2.0 * bz * z,
                -2.0 * bx * w + 2.0 * bz * y,
                2.0 * bx * y,
                2.0 * bx * z - 4.0 * bz * x,
                2.0 * bx * w - 4.0 * bz * y,
                2.0 * bx * x,
            );
            nabla += j_b.transpose() * f_b;
        }

        let nabla = nabla.try_normalize(0.0)?;
        Some(Quaternion::new(nabla[0], nabla[1], nabla[2], nabla[3]))
    }
}

impl FusionEngine for Madgwick {
    fn new(sample_frequency: f32, beta: f32) -> Self {
        Self {
            quaternion: Quaternion::identity(),
            beta,
            sample_frequency,
            sample_period: 1.0 / sample_frequency,
        }
    }

    fn update(
        &mut self,
        gyroscope: Vector3<f32>,
        accelerometer: Vector3<f32>,
        magnetometer: Vector3<f32>,
    ) {
        let q = self.quaternion;

        // dq/dt = 0.5 * q * ω
        let mut q_dot = q * Quaternion::from_imag(gyroscope) * 0.5;

        if let Some(step) = self.gradient(accelerometer, magnetometer) {
            q_dot = q_dot - step * self.beta;
        }

        let integrated = q + q_dot * self.sample_period;

        // Keep the previous estimate if integration degenerated
        if let Some(unit) = normalized(integrated) {
            self.quaternion = unit;
        }
    }

    fn quaternion(&self) -> Quaternion<f32> {
        self.quaternion
    }
}

/// Unit quaternion with the same direction, `None` for zero or non-finite norm
fn normalized(quaternion: Quaternion<f32>) -> Option<Quaternion<f32>> {
    let norm = quaternion.norm();
    (norm > 0.0 && norm.is_finite()).then(|| quaternion / norm)
}

impl Default for Madgwick {
    fn default() -> Self {
        <Self as FusionEngine>::new(DEFAULT_SAMPLE_FREQUENCY, DEFAULT_BETA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::euler::QuaternionExt;
    use nalgebra::UnitQuaternion;

    /// Rotate an earth-frame vector into the sensor frame of `q`
    fn to_sensor(q: Quaternion<f32>, earth: Vector3<f32>) -> Vector3<f32> {
        (q.conjugate() * Quaternion::from_imag(earth) * q).imag()
    }

    #[test]
    fn test_new_filter() {
        let filter = Madgwick::new(100.0, 0.5);
        assert_eq!(filter.quaternion(), Quaternion::identity());
        assert_eq!(filter.beta(), 0.5);
        assert_eq!(filter.sample_frequency(), 100.0);
        assert_eq!(filter.q0(), 1.0);
    }

    #[test]
    fn test_level_and_aligned_stays_at_identity() {
        let mut filter = Madgwick::new(100.0, 0.5);
        let gyro = Vector3::zeros();
        let accel = Vector3::new(0.0, 0.0, 1.0);
        let mag = Vector3::new(1.0, 0.0, 0.0);

        for _ in 0..500 {
            filter.update(gyro, accel, mag);
        }

        let q = filter.quaternion();
        assert!((q.w - 1.0).abs() < 1e-6);
        assert!(q.imag().norm() < 1e-6);
    }

    #[test]
    fn test_gyroscope_only_integration() {
        let mut filter = Madgwick::new(100.0, 0.5);
        let gyro = Vector3::new(0.0, 0.0, 0.5); // 0.5 rad/s about Z

        // Zero accelerometer disables the correction entirely
        for _ in 0..100 {
            filter.update(gyro, Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0));
        }

        let angles = filter.quaternion().attitude_angles().unwrap();
        assert!((angles.yaw - 0.5).abs() < 0.01, "yaw: {}", angles.yaw);
        assert!(angles.roll.abs() < 1e-4);
        assert!(angles.pitch.abs() < 1e-4);
    }

    #[test]
    fn test_gravity_only_convergence() {
        let mut filter = Madgwick::new(100.0, 1.0);
        let tilt = 0.4f32;
        // Rotated by `tilt` about X, gravity appears in +Y
        let accel = Vector3::new(0.0, tilt.sin(), tilt.cos());

        for _ in 0..500 {
            filter.update(Vector3::zeros(), accel, Vector3::zeros());
        }

        let angles = filter.quaternion().attitude_angles().unwrap();
        assert!((angles.pitch - tilt).abs() < 0.05, "pitch: {}", angles.pitch);
        assert!(angles.roll.abs() < 0.05);
    }

    #[test]
    fn test_marg_convergence() {
        let truth = UnitQuaternion::from_euler_angles(0.3, -0.2, 0.8).into_inner();
        let accel = to_sensor(truth, Vector3::new(0.0, 0.0, 1.0));
        let mag = to_sensor(truth, Vector3::new(0.6, 0.0, -0.8));

        let mut filter = Madgwick::new(100.0, 2.0);
        for _ in 0..1000 {
            filter.update(Vector3::zeros(), accel, mag);
        }

        let estimate = UnitQuaternion::from_quaternion(filter.quaternion());
        let angle = estimate.angle_to(&UnitQuaternion::from_quaternion(truth));
        assert!(angle < 0.1, "residual angle: {} rad", angle);
    }

    #[test]
    fn test_quaternion_stays_normalized() {
        let mut filter = Madgwick::new(200.0, 0.3);

        for i in 0..1000 {
            let t = i as f32 * 0.005;
            filter.update(
                Vector3::new(t.sin(), 0.5 * t.cos(), 0.2),
                Vector3::new(0.1 * t.cos(), 0.1, 1.0),
                Vector3::new(0.5, 0.1 * t.sin(), -0.7),
            );
        }

        assert!((filter.quaternion().norm() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_set_quaternion_and_reset() {
        let mut filter = Madgwick::default();
        assert_eq!(filter.sample_frequency(), DEFAULT_SAMPLE_FREQUENCY);
        assert_eq!(filter.beta(), DEFAULT_BETA);

        filter.set_quaternion(Quaternion::new(2.0, 0.0, 0.0, 0.0));
        assert_eq!(filter.quaternion(), Quaternion::identity());

        filter.set_quaternion(Quaternion::new(0.0, 0.0, 0.0, 1.0));
        assert_eq!(filter.q3(), 1.0);

        // Zero quaternion is ignored
        filter.set_quaternion(Quaternion::new(0.0, 0.0, 0.0, 0.0));
        assert_eq!(filter.q3(), 1.0);

        filter.reset();
        assert_eq!(filter.quaternion(), Quaternion::identity());
    }
}
