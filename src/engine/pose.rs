//! Head pose snapshot shared by every engine backend.

use serde::{Deserialize, Serialize};

/// Tracked head position and orientation at one instant.
///
/// `orientation` is (x, y, z, w). Engines must hand out unit quaternions; nothing
/// downstream normalises them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadPose {
    /// Nanoseconds in the producing engine's clock domain (XrTime for OpenXR).
    pub timestamp_ns: i64,
    pub position: [f32; 3],
    pub orientation: [f32; 4],
}

impl HeadPose {
    /// Returned when no engine pose is available. Timestamp 0 marks it.
    pub const IDENTITY: HeadPose = HeadPose {
        timestamp_ns: 0,
        position: [0.0, 0.0, 0.0],
        orientation: [0.0, 0.0, 0.0, 1.0],
    };

    pub fn new(timestamp_ns: i64, position: [f32; 3], orientation: [f32; 4]) -> Self {
        Self {
            timestamp_ns,
            position,
            orientation,
        }
    }

    #[inline]
    pub fn is_sentinel(&self) -> bool {
        self.timestamp_ns == 0
    }

    pub fn orientation_norm(&self) -> f32 {
        self.orientation.iter().map(|c| c * c).sum::<f32>().sqrt()
    }

    pub fn is_unit_orientation(&self, tolerance: f32) -> bool {
        (self.orientation_norm() - 1.0).abs() <= tolerance
    }

    /// Quaternion for a rotation of `radians` about +Y.
    pub fn yaw_orientation(radians: f32) -> [f32; 4] {
        let half = radians * 0.5;
        [0.0, half.sin(), 0.0, half.cos()]
    }
}

impl Default for HeadPose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<(openxr::Time, openxr::Posef)> for HeadPose {
    fn from((time, pose): (openxr::Time, openxr::Posef)) -> Self {
        Self {
            timestamp_ns: time.as_nanos(),
            position: [pose.position.x, pose.position.y, pose.position.z],
            orientation: [
                pose.orientation.x,
                pose.orientation.y,
                pose.orientation.z,
                pose.orientation.w,
            ],
        }
    }
}
