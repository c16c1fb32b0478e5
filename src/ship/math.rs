//! Vector and quaternion value types for ship kinematics

use serde::{Deserialize, Serialize};

/// 3D vector value type
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Squared distance between two points. Collision and proximity checks
    /// compare this directly against their thresholds.
    pub fn distance_squared(&self, other: &Vector3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// Unit vector in the same direction, or +Z for degenerate input
    pub fn normalized(&self) -> Vector3 {
        let mag = self.length();
        if mag < 1e-4 {
            return Vector3::new(0.0, 0.0, 1.0);
        }
        Vector3::new(self.x / mag, self.y / mag, self.z / mag)
    }

    pub fn dot(&self, other: &Vector3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn scale(&self, s: f64) -> Vector3 {
        Vector3::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn add(&self, other: &Vector3) -> Vector3 {
        Vector3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(&self, other: &Vector3) -> Vector3 {
        Vector3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

/// Rotation quaternion, kept unit-normalized
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion { w: 1.0, x: 0.0, y: 0.0, z: 0.0 };

    /// Quaternion for a rotation of `angle` radians about `axis`
    pub fn from_axis_angle(axis: Vector3, angle: f64) -> Quaternion {
        let half = angle * 0.5;
        let s = half.sin();
        Quaternion {
            w: half.cos(),
            x: axis.x * s,
            y: axis.y * s,
            z: axis.z * s,
        }
    }

    /// Hamilton product `self ⊗ other`
    pub fn multiply(&self, other: &Quaternion) -> Quaternion {
        Quaternion {
            w: self.w * other.w - self.x * other.x - self.y * other.y - self.z * other.z,
            x: self.w * other.x + self.x * other.w + self.y * other.z - self.z * other.y,
            y: self.w * other.y - self.x * other.z + self.y * other.w + self.z * other.x,
            z: self.w * other.z + self.x * other.y - self.y * other.x + self.z * other.w,
        }
    }

    pub fn magnitude(&self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Renormalize; degenerate quaternions collapse to identity
    pub fn normalized(&self) -> Quaternion {
        let mag = self.magnitude();
        if mag < 1e-4 {
            return Quaternion::IDENTITY;
        }
        Quaternion {
            w: self.w / mag,
            x: self.x / mag,
            y: self.y / mag,
            z: self.z / mag,
        }
    }

    /// Ship-forward direction for this orientation (+Z at identity)
    pub fn forward(&self) -> Vector3 {
        Vector3 {
            x: 2.0 * (self.x * self.z + self.w * self.y),
            y: 2.0 * (self.y * self.z - self.w * self.x),
            z: 1.0 - 2.0 * (self.x * self.x + self.y * self.y),
        }
    }
}
