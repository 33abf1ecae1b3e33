//! Quaternion to Euler angle decomposition
//!
//! The decomposition follows the device-attitude convention used by mobile
//! motion frameworks: pitch is the rotation about X, roll about Y and yaw
//! about Z. The gimbal-lock singularity is detected on the `q0*q1 + q2*q3`
//! term, scaled by the squared norm so near-unit quaternions from a drifting
//! filter are handled without renormalizing first.

use nalgebra::Quaternion;

use crate::error::{AttitudeError, Result};
use crate::math::{degrees_from_radians, radians_from_degrees};

/// Tolerance applied to the gimbal-lock test
pub const SINGULARITY_TOLERANCE: f32 = 1e-7;

/// Roll, pitch and yaw
///
/// Units depend on context: the decomposer produces radians, the driver
/// reports degrees. Use [`EulerAngles::to_degrees`] and
/// [`EulerAngles::to_radians`] at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl EulerAngles {
    pub const fn new(roll: f32, pitch: f32, yaw: f32) -> Self {
        Self { roll, pitch, yaw }
    }

    /// Interpret the angles as radians and convert them to degrees
    pub fn to_degrees(self) -> Self {
        Self {
            roll: degrees_from_radians(self.roll),
            pitch: degrees_from_radians(self.pitch),
            yaw: degrees_from_radians(self.yaw),
        }
    }

    /// Interpret the angles as degrees and convert them to radians
    pub fn to_radians(self) -> Self {
        Self {
            roll: radians_from_degrees(self.roll),
            pitch: radians_from_degrees(self.pitch),
            yaw: radians_from_degrees(self.yaw),
        }
    }
}

/// Decompose the quaternion `(q0, q1, q2, q3)` into Euler angles in radians
///
/// `q0` is the scalar part. The input does not need to be normalized; the
/// squared norm is used as the divisor wherever the formula depends on it.
///
/// At the north pole (`q0*q1 + q2*q3` above one half of the squared norm)
/// roll is zero, pitch is `π` and yaw is `2 * atan2(q2, q0)`. The south pole
/// mirrors this with pitch `-π` and yaw `-2 * atan2(q2, q0)`.
///
/// A finite quaternion whose squared norm over- or underflows `f32` is first
/// rescaled so its largest component is one.
///
/// # Errors
/// [`AttitudeError::InvalidOrientation`] if every component is zero or any
/// component is not finite.
///
/// # Example
/// ```
/// use fused_attitude::decompose;
///
/// let angles = decompose(1.0, 0.0, 0.0, 0.0).unwrap();
/// assert_eq!((angles.roll, angles.pitch, angles.yaw), (0.0, 0.0, 0.0));
///
/// assert!(decompose(0.0, 0.0, 0.0, 0.0).is_err());
/// ```
pub fn decompose(q0: f32, q1: f32, q2: f32, q3: f32) -> Result<EulerAngles> {
    let components = [q0, q1, q2, q3];
    if components.iter().any(|c| !c.is_finite()) || components.iter().all(|&c| c == 0.0) {
        return Err(AttitudeError::InvalidOrientation);
    }

    let unit_length = components.iter().map(|c| c * c).sum::<f32>();
    if unit_length.is_normal() {
        return Ok(decompose_nonzero(q0, q1, q2, q3, unit_length));
    }

    let scale = components.iter().fold(0.0f32, |max, c| max.max(c.abs()));
    let [q0, q1, q2, q3] = components.map(|c| c / scale);
    Ok(decompose_nonzero(
        q0,
        q1,
        q2,
        q3,
        q0 * q0 + q1 * q1 + q2 * q2 + q3 * q3,
    ))
}

/// Branch selection and trigonometry for a representable squared norm
fn decompose_nonzero(q0: f32, q1: f32, q2: f32, q3: f32, unit_length: f32) -> EulerAngles {
    let x2 = q1 * q1;
    let y2 = q2 * q2;
    let z2 = q3 * q3;

    let abcd = q0 * q1 + q2 * q3;

    if abcd > (0.5 - SINGULARITY_TOLERANCE) * unit_length {
        return EulerAngles {
            roll: 0.0,
            pitch: core::f32::consts::PI,
            yaw: 2.0 * q2.atan2(q0),
        };
    }

    if abcd < (-0.5 + SINGULARITY_TOLERANCE) * unit_length {
        return EulerAngles {
            roll: 0.0,
            pitch: -core::f32::consts::PI,
            yaw: -2.0 * q2.atan2(q0),
        };
    }

    let adbc = q0 * q3 - q1 * q2;
    let acbd = q0 * q2 - q1 * q3;

    EulerAngles {
        roll: (2.0 * acbd).atan2(1.0 - 2.0 * (y2 + x2)),
        // floating-point overshoot near the poles must not leave asin's domain
        pitch: (2.0 * abcd / unit_length).clamp(-1.0, 1.0).asin(),
        yaw: (2.0 * adbc).atan2(1.0 - 2.0 * (z2 + x2)),
    }
}

/// Extension trait for decomposing nalgebra quaternions
pub trait QuaternionExt {
    /// Euler angles in radians
    fn attitude_angles(&self) -> Result<EulerAngles>;

    /// Euler angles in degrees
    fn attitude_angles_degrees(&self) -> Result<EulerAngles> {
        self.attitude_angles().map(EulerAngles::to_degrees)
    }
}

impl QuaternionExt for Quaternion<f32> {
    fn attitude_angles(&self) -> Result<EulerAngles> {
        decompose(self.w, self.i, self.j, self.k)
    }
}
