use glam::{EulerRot, Mat4, Quat, Vec3};

/// Model transform owned by the active point cloud. Rotation is composed
/// incrementally by the orchestrator's per-frame rotate step; mutation is
/// confined to the render thread by construction.
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    /// Transform that spins a [0,1]³ cloud about its own center: points
    /// are shifted to straddle the origin, then rotated.
    pub fn centered_unit() -> Self {
        Self {
            position: Vec3::splat(-0.5),
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    /// Composes an incremental XYZ Euler rotation (radians) into the
    /// current orientation.
    pub fn rotate(&mut self, dx: f32, dy: f32, dz: f32) {
        let delta = Quat::from_euler(EulerRot::XYZ, dx, dy, dz);
        self.rotation = (delta * self.rotation).normalize();
    }

    /// Model matrix: rotate and scale about the origin after the local
    /// translation, so `centered_unit` spins about the cloud's center.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_quat(self.rotation)
            * Mat4::from_scale(self.scale)
            * Mat4::from_translation(self.position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rotate_composes_incrementally() {
        let mut t = Transform::default();
        t.rotate(0.0, 0.1, 0.0);
        t.rotate(0.0, 0.1, 0.0);
        let expected = Quat::from_euler(EulerRot::XYZ, 0.0, 0.2, 0.0);
        assert!(t.rotation.angle_between(expected) < 1e-5);
    }

    #[test]
    fn centered_unit_spins_about_cloud_center() {
        let mut t = Transform::centered_unit();
        t.rotate(0.0, std::f32::consts::PI, 0.0);
        // The cube center (0.5, 0.5, 0.5) must stay fixed under rotation.
        let center = t.matrix().transform_point3(Vec3::splat(0.5));
        assert_relative_eq!(center.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(center.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(center.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn rotation_stays_normalized() {
        let mut t = Transform::default();
        for _ in 0..1000 {
            t.rotate(0.01, 0.02, 0.003);
        }
        assert_relative_eq!(t.rotation.length(), 1.0, epsilon = 1e-4);
    }
}
