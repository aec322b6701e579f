use super::math::{Mat4, Vec3};
use std::f32::consts::FRAC_PI_2;

/// Orbiting perspective camera.
///
/// `phi` is the polar angle from +z and `theta` the azimuth, both radians.
/// With `phi = 0` and `theta = -pi/2` the view is the plain xy plane: x to
/// the right, y up, which is also how screen space is laid out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub phi: f32,
    pub theta: f32,
    /// Distance from the eye to the focal plane through `center`.
    pub distance: f32,
    pub center: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            phi: 0.0,
            theta: -FRAC_PI_2,
            distance: 20.0,
            center: Vec3::ZERO,
        }
    }
}

impl Camera {
    pub fn from_degrees(phi: f32, theta: f32, distance: f32) -> Self {
        Self {
            phi: phi.to_radians(),
            theta: theta.to_radians(),
            distance,
            center: Vec3::ZERO,
        }
    }

    pub fn set_orientation(&mut self, phi: f32, theta: f32) {
        self.phi = phi;
        self.theta = theta;
    }

    pub fn eye(&self) -> Vec3 {
        let (sp, cp) = self.phi.sin_cos();
        let (st, ct) = self.theta.sin_cos();
        self.center + Vec3::new(sp * ct, sp * st, cp).scale(self.distance)
    }

    /// World to camera-aligned coordinates, z towards the eye.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::rotation_x(-self.phi)
            .mul(&Mat4::rotation_z(-self.theta - FRAC_PI_2))
            .mul(&Mat4::translation(-self.center))
    }

    /// Projects a world point onto the focal plane. The returned z is the
    /// depth in camera coordinates, kept for ordering.
    pub fn project(&self, p: Vec3) -> Vec3 {
        let q = self.view_matrix().transform_point(p);
        let denom = self.distance - q.z;
        let factor = if denom.abs() < 1e-4 { 1.0 } else { self.distance / denom };
        Vec3::new(q.x * factor, q.y * factor, q.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_view_is_flat() {
        let cam = Camera::default();
        let p = cam.project(Vec3::new(1.5, -2.0, 0.0));
        assert!(p.approx_eq(&Vec3::new(1.5, -2.0, 0.0), 1e-5));
        assert!(cam.eye().approx_eq(&Vec3::new(0.0, 0.0, 20.0), 1e-4));
    }

    #[test]
    fn test_eye_lies_on_view_axis() {
        let cam = Camera::from_degrees(65.0, -45.0, 20.0);
        let eye = cam.view_matrix().transform_point(cam.eye());
        assert!(eye.approx_eq(&Vec3::new(0.0, 0.0, 20.0), 1e-3));
    }

    #[test]
    fn test_nearer_points_appear_larger() {
        let cam = Camera::default();
        let far = cam.project(Vec3::new(1.0, 0.0, -5.0));
        let near = cam.project(Vec3::new(1.0, 0.0, 5.0));
        assert!(near.x > 1.0 && far.x < 1.0);
    }
}
