//! Sample records flowing through the attitude pipeline

use nalgebra::{Quaternion, Vector3};

use crate::euler::EulerAngles;

/// One raw motion sample as produced by a sensor source
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use fused_attitude::RawSample;
///
/// let sample = RawSample::new(
///     Vector3::new(0.0, 0.0, 0.1),  // rad/s
///     Vector3::new(0.0, 0.0, -1.0), // g, device convention
///     Vector3::new(20.0, 0.0, -40.0),
/// );
/// assert_eq!(sample.gyroscope.z, 0.1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    /// Angular rate in radians per second
    pub gyroscope: Vector3<f32>,
    /// Specific force or gravity vector, as reported by the device
    ///
    /// The driver negates this vector before it reaches the fusion engine.
    pub accelerometer: Vector3<f32>,
    /// Magnetic field vector
    pub magnetometer: Vector3<f32>,
}

impl RawSample {
    pub const fn new(
        gyroscope: Vector3<f32>,
        accelerometer: Vector3<f32>,
        magnetometer: Vector3<f32>,
    ) -> Self {
        Self {
            gyroscope,
            accelerometer,
            magnetometer,
        }
    }
}

/// A raw sample together with the source's own attitude estimate
///
/// This is the unit a [`SensorSource`](crate::SensorSource) hands to the
/// driver. The reference attitude, when present, is in radians and is only
/// carried through to the consumer for comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub raw: RawSample,
    pub reference: Option<EulerAngles>,
}

impl SensorReading {
    /// Reading without a reference attitude
    pub const fn new(raw: RawSample) -> Self {
        Self {
            raw,
            reference: None,
        }
    }

    /// Attach a reference attitude in radians
    pub const fn with_reference(mut self, reference: EulerAngles) -> Self {
        self.reference = Some(reference);
        self
    }
}

impl From<RawSample> for SensorReading {
    fn from(raw: RawSample) -> Self {
        Self::new(raw)
    }
}

/// Result record delivered to the consumer once per processed sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttitudeSample {
    /// Zero-based position of this sample in the driver's output stream
    pub sequence: u64,
    /// The reading as delivered by the source, before sign correction
    pub raw: RawSample,
    /// Fusion engine quaternion after the update (`w` is `q0`)
    pub quaternion: Quaternion<f32>,
    /// Decomposed attitude in degrees
    pub euler: EulerAngles,
    /// Source's reference attitude in degrees, if it provided one
    pub reference: Option<EulerAngles>,
}

impl AttitudeSample {
    pub fn q0(&self) -> f32 {
        self.quaternion.w
    }

    pub fn q1(&self) -> f32 {
        self.quaternion.i
    }

    pub fn q2(&self) -> f32 {
        self.quaternion.j
    }

    pub fn q3(&self) -> f32 {
        self.quaternion.k
    }
}
