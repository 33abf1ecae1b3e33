//! Fusion engine abstraction

use nalgebra::{Quaternion, Vector3};

/// Sensor fusion algorithm driven by the attitude driver
///
/// An engine turns a stream of gyroscope, accelerometer and magnetometer
/// readings into an orientation quaternion. The driver calls
/// [`update`](FusionEngine::update) once per sample, never concurrently,
/// and reads the quaternion back immediately afterwards.
///
/// # Example
/// ```
/// use nalgebra::{Quaternion, Vector3};
/// use fused_attitude::FusionEngine;
///
/// /// Engine that only integrates the gyroscope
/// struct Gyro {
///     q: Quaternion<f32>,
///     period: f32,
/// }
///
/// impl FusionEngine for Gyro {
///     fn new(sample_frequency: f32, _beta: f32) -> Self {
///         Gyro { q: Quaternion::identity(), period: 1.0 / sample_frequency }
///     }
///
///     fn update(&mut self, gyroscope: Vector3<f32>, _: Vector3<f32>, _: Vector3<f32>) {
///         let q_dot = self.q * Quaternion::from_imag(gyroscope) * 0.5;
///         self.q = (self.q + q_dot * self.period).normalize();
///     }
///
///     fn quaternion(&self) -> Quaternion<f32> {
///         self.q
///     }
/// }
///
/// let mut engine = Gyro::new(100.0, 0.0);
/// engine.update(Vector3::new(0.0, 0.0, 1.0), Vector3::zeros(), Vector3::zeros());
/// assert!(engine.q3() > 0.0);
/// ```
pub trait FusionEngine {
    /// Construct an engine for the given sample rate (Hz) and gain
    fn new(sample_frequency: f32, beta: f32) -> Self
    where
        Self: Sized;

    /// Advance the orientation estimate by one sample period
    ///
    /// # Arguments
    /// * `gyroscope` - Angular rate in radians per second
    /// * `accelerometer` - Gravity direction, pointing up when level
    /// * `magnetometer` - Magnetic field vector, any unit
    fn update(
        &mut self,
        gyroscope: Vector3<f32>,
        accelerometer: Vector3<f32>,
        magnetometer: Vector3<f32>,
    );

    /// Current orientation quaternion (`w` is the scalar part)
    fn quaternion(&self) -> Quaternion<f32>;

    fn q0(&self) -> f32 {
        self.quaternion().w
    }

    fn q1(&self) -> f32 {
        self.quaternion().i
    }

    fn q2(&self) -> f32 {
        self.quaternion().j
    }

    fn q3(&self) -> f32 {
        self.quaternion().k
    }
}
