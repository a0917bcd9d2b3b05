//! Math utilities and types
//!
//! Provides the nalgebra aliases used across the engine and the two matrix
//! builders the VR frame pipeline needs: a view matrix from a tracked pose and
//! an asymmetric projection from per-eye field-of-view tangents.
//!
//! ## Conventions
//!
//! - View space is right-handed with -Z forward, matching OpenXR poses.
//! - Projections map depth into `[0, 1]`, matching Direct3D clip space.
//! - Matrices are column-major (`nalgebra` storage order).

use serde::{Deserialize, Serialize};

pub use nalgebra::{Isometry3, Matrix4, Quaternion, Translation3, Unit, UnitQuaternion, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Quaternion type for rotations
pub type Quat = UnitQuaternion<f32>;

/// Orientation and position of a tracked object
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Unit orientation quaternion
    pub orientation: Quat,
    /// Position in meters
    pub position: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// Identity pose (no rotation, origin)
    pub fn identity() -> Self {
        Self {
            orientation: Quat::identity(),
            position: Vec3::zeros(),
        }
    }

    /// Create a pose from an orientation and a position
    pub fn new(orientation: Quat, position: Vec3) -> Self {
        Self { orientation, position }
    }

    /// Create a pose from raw quaternion components `(x, y, z, w)`
    ///
    /// The quaternion is renormalized, so slightly drifted runtime values are
    /// accepted.
    pub fn from_components(orientation: [f32; 4], position: [f32; 3]) -> Self {
        let [x, y, z, w] = orientation;
        Self {
            orientation: Quat::from_quaternion(Quaternion::new(w, x, y, z)),
            position: Vec3::new(position[0], position[1], position[2]),
        }
    }

    /// Camera-to-world transform described by this pose
    pub fn to_isometry(&self) -> Isometry3<f32> {
        Isometry3::from_parts(Translation3::from(self.position), self.orientation)
    }
}

/// Field of view expressed as four half-angles in radians
///
/// `angle_left` and `angle_down` are normally negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fov {
    /// Angle of the left frustum plane
    pub angle_left: f32,
    /// Angle of the right frustum plane
    pub angle_right: f32,
    /// Angle of the top frustum plane
    pub angle_up: f32,
    /// Angle of the bottom frustum plane
    pub angle_down: f32,
}

impl Fov {
    /// Symmetric field of view from a vertical angle and an aspect ratio
    pub fn symmetric(fov_y: f32, aspect: f32) -> Self {
        let half_y = fov_y * 0.5;
        let half_x = (half_y.tan() * aspect).atan();
        Self {
            angle_left: -half_x,
            angle_right: half_x,
            angle_up: half_y,
            angle_down: -half_y,
        }
    }
}

impl Default for Fov {
    fn default() -> Self {
        Self::symmetric(std::f32::consts::FRAC_PI_2, 1.0)
    }
}

/// Build the view matrix for a camera located at `pose`
///
/// This is the inverse of the camera transform: the transposed rotation, with
/// the translation column set to `-Rᵀ·p`.
pub fn pose_to_view_matrix(pose: &Pose) -> Mat4 {
    let rotation = pose.orientation.to_rotation_matrix();
    let inverse_rotation = rotation.transpose();
    let translation = -(inverse_rotation * pose.position);

    let mut view = inverse_rotation.to_homogeneous();
    view[(0, 3)] = translation.x;
    view[(1, 3)] = translation.y;
    view[(2, 3)] = translation.z;
    view
}

/// Build an asymmetric perspective projection from field-of-view half-angles
///
/// # Arguments
/// * `fov` - the four frustum half-angles
/// * `near` - distance to the near plane (positive)
/// * `far` - distance to the far plane (positive, greater than `near`)
///
/// # Returns
/// A right-handed projection with depth mapped to `[0, 1]`.
pub fn fov_to_projection_matrix(fov: &Fov, near: f32, far: f32) -> Mat4 {
    let tan_left = fov.angle_left.tan();
    let tan_right = fov.angle_right.tan();
    let tan_up = fov.angle_up.tan();
    let tan_down = fov.angle_down.tan();

    let tan_width = tan_right - tan_left;
    let tan_height = tan_up - tan_down;
    let depth = far - near;

    let mut projection = Mat4::zeros();
    projection[(0, 0)] = 2.0 / tan_width;
    projection[(0, 2)] = (tan_right + tan_left) / tan_width;
    projection[(1, 1)] = 2.0 / tan_height;
    projection[(1, 2)] = (tan_up + tan_down) / tan_height;
    projection[(2, 2)] = -far / depth;
    projection[(2, 3)] = -(far * near) / depth;
    projection[(3, 2)] = -1.0;
    projection
}

/// Convert a matrix to a column-major array for upload to a graphics API
pub fn to_column_major(matrix: &Mat4) -> [f32; 16] {
    let mut out = [0.0; 16];
    out.copy_from_slice(matrix.as_slice());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Standard symmetric right-handed perspective with a `[0, 1]` depth range
    fn reference_perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let f = 1.0 / (fov_y * 0.5).tan();
        let mut m = Mat4::zeros();
        m[(0, 0)] = f / aspect;
        m[(1, 1)] = f;
        m[(2, 2)] = far / (near - far);
        m[(2, 3)] = (near * far) / (near - far);
        m[(3, 2)] = -1.0;
        m
    }

    #[test]
    fn test_identity_pose_gives_identity_view() {
        let view = pose_to_view_matrix(&Pose::identity());
        assert_relative_eq!(view, Mat4::identity(), epsilon = 1e-6);
    }

    #[test]
    fn test_view_matrix_is_inverse_of_camera_transform() {
        let poses = [
            Pose::new(Quat::from_euler_angles(0.1, 0.7, -0.3), Vec3::new(1.0, 1.6, -2.0)),
            Pose::new(Quat::from_euler_angles(-1.2, 0.0, 0.4), Vec3::new(-0.03, 1.7, 0.5)),
            Pose::from_components([0.0, 0.7071068, 0.0, 0.7071068], [0.0, 0.0, 3.0]),
        ];

        for pose in &poses {
            let camera = pose.to_isometry().to_homogeneous();
            let view = pose_to_view_matrix(pose);
            assert_relative_eq!(view * camera, Mat4::identity(), epsilon = 1e-5);
        }
    }

    #[test]
    fn test_view_matrix_moves_camera_position_to_origin() {
        let pose = Pose::new(Quat::from_euler_angles(0.3, -0.5, 0.2), Vec3::new(2.0, -1.0, 4.0));
        let view = pose_to_view_matrix(&pose);
        let origin = view.transform_point(&nalgebra::Point3::from(pose.position));
        assert_relative_eq!(origin.coords, Vec3::zeros(), epsilon = 1e-5);
    }

    #[test]
    fn test_symmetric_fov_matches_reference_perspective() {
        let cases = [
            (std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0),
            (1.2, 16.0 / 9.0, 0.05, 50.0),
            (0.6, 0.75, 1.0, 1000.0),
            (1.9, 1832.0 / 1920.0, 0.1, 100.0),
        ];

        for (fov_y, aspect, near, far) in cases {
            let fov = Fov::symmetric(fov_y, aspect);
            let projection = fov_to_projection_matrix(&fov, near, far);
            let reference = reference_perspective(fov_y, aspect, near, far);
            assert_relative_eq!(projection, reference, epsilon = 1e-4, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_asymmetric_fov_maps_frustum_edges_to_clip_bounds() {
        let fov = Fov {
            angle_left: -0.9,
            angle_right: 0.7,
            angle_up: 0.8,
            angle_down: -0.95,
        };
        let projection = fov_to_projection_matrix(&fov, 0.1, 100.0);

        // A point on the right frustum plane at depth 1 lands on x = +1.
        let right = projection * Vec4::new(fov.angle_right.tan(), 0.0, -1.0, 1.0);
        assert_relative_eq!(right.x / right.w, 1.0, epsilon = 1e-5);

        let left = projection * Vec4::new(fov.angle_left.tan(), 0.0, -1.0, 1.0);
        assert_relative_eq!(left.x / left.w, -1.0, epsilon = 1e-5);

        let up = projection * Vec4::new(0.0, fov.angle_up.tan(), -1.0, 1.0);
        assert_relative_eq!(up.y / up.w, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_projection_depth_range() {
        let projection = fov_to_projection_matrix(&Fov::default(), 0.1, 100.0);

        let near = projection * Vec4::new(0.0, 0.0, -0.1, 1.0);
        let far = projection * Vec4::new(0.0, 0.0, -100.0, 1.0);
        assert_relative_eq!(near.z / near.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_column_major_layout() {
        let projection = fov_to_projection_matrix(&Fov::default(), 0.1, 100.0);
        let raw = to_column_major(&projection);
        assert_eq!(raw[11], -1.0);
        assert_eq!(raw[14], projection[(2, 3)]);
    }
}
