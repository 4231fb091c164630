//! Host world matrices to renderer transforms.
//!
//! The renderer takes 16 floats, row by row: the first three rows are the
//! basis vectors of the linear part, the last row carries the translation,
//! and the homogeneous column is `(0, 0, 0, 1)`. Host matrices are `glam`
//! matrices (column vectors, translation in `w_axis`), so renderer row `i`
//! is host column `i`.
//!
//! Cameras and sun lights flip the second and third rows to turn the host's
//! view basis (looking down `-Z`, `Y` up) into the renderer's.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Affine 4×4 transform in the renderer's row layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform(pub [f32; 16]);

impl Transform {
    pub const IDENTITY: Self = Self([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    /// Fixed orientation of the environment sphere: host `Z` up becomes the
    /// renderer's `Y` up, with the `X` and `Z` axes mirrored.
    pub const ENVIRONMENT: Self = Self([
        -1.0, 0.0, 0.0, 0.0, //
        0.0, 0.0, -1.0, 0.0, //
        0.0, -1.0, 0.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    /// Regular objects (meshes and instances).
    pub fn object(m: &Mat4) -> Self {
        Self::from_basis(
            m.x_axis.truncate(),
            m.y_axis.truncate(),
            m.z_axis.truncate(),
            m.w_axis.truncate(),
        )
    }

    /// Cameras: generic layout with the view and up rows negated.
    pub fn camera(m: &Mat4) -> Self {
        Self::from_basis(
            m.x_axis.truncate(),
            -m.y_axis.truncate(),
            -m.z_axis.truncate(),
            m.w_axis.truncate(),
        )
    }

    /// Point lights are spheres of `radius`; host rotation and scale are
    /// discarded, only the position survives.
    pub fn point_light(m: &Mat4, radius: f32) -> Self {
        Self::from_basis(
            Vec3::X * radius,
            Vec3::Y * radius,
            Vec3::Z * radius,
            m.w_axis.truncate(),
        )
    }

    /// Sun lights: the linear part scaled by the apparent disc `radius`,
    /// with the camera row negation.
    pub fn sun_light(m: &Mat4, radius: f32) -> Self {
        Self::from_basis(
            m.x_axis.truncate() * radius,
            -m.y_axis.truncate() * radius,
            -m.z_axis.truncate() * radius,
            m.w_axis.truncate(),
        )
    }

    fn from_basis(x: Vec3, y: Vec3, z: Vec3, translation: Vec3) -> Self {
        Self([
            x.x,
            x.y,
            x.z,
            0.0,
            y.x,
            y.y,
            y.z,
            0.0,
            z.x,
            z.y,
            z.z,
            0.0,
            translation.x,
            translation.y,
            translation.z,
            1.0,
        ])
    }

    /// Row `i` of the renderer layout.
    pub fn row(&self, i: usize) -> [f32; 4] {
        let o = i * 4;
        [self.0[o], self.0[o + 1], self.0[o + 2], self.0[o + 3]]
    }

    pub fn translation(&self) -> [f32; 3] {
        [self.0[12], self.0[13], self.0[14]]
    }

    pub fn as_array(&self) -> &[f32; 16] {
        &self.0
    }
}
