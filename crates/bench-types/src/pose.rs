use serde::{Deserialize, Serialize};

/// Resolved transform of a placed component: position plus the facing
/// angle of its interface normal, measured about +Z from +X. Baseplate
/// layouts are planar; `position[2]` carries the optical-axis elevation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: [f64; 3],
    pub angle: f64,
}

impl Pose {
    pub fn new(position: [f64; 3], angle: f64) -> Self {
        Self { position, angle }
    }

    /// Unit normal of the interface plane (horizontal).
    pub fn normal(&self) -> [f64; 3] {
        [self.angle.cos(), self.angle.sin(), 0.0]
    }

    /// Unit in-plane tangent, `z_hat x normal`.
    pub fn tangent(&self) -> [f64; 3] {
        [-self.angle.sin(), self.angle.cos(), 0.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_normal_and_tangent_orthogonal() {
        let pose = Pose::new([1.0, 2.0, 3.0], 0.7);
        let n = pose.normal();
        let t = pose.tangent();
        let dot = n[0] * t[0] + n[1] * t[1] + n[2] * t[2];
        assert!(dot.abs() < 1e-12);
    }

    #[test]
    fn test_quarter_turn() {
        let pose = Pose::new([0.0; 3], FRAC_PI_2);
        let n = pose.normal();
        assert!(n[0].abs() < 1e-12);
        assert!((n[1] - 1.0).abs() < 1e-12);
    }
}
