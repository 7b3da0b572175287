// src/shadows/light_frame.rs
// Orthonormal light-space frame fitted tightly to the scene bounds,
// producing the world-to-shadow transform used by both moment rendering
// and shadow evaluation
// RELEVANT FILES: src/shadows/bounds.rs, src/shadows/pipeline.rs, tests/test_light_frame.rs

use glam::{Mat4, Vec3, Vec4};

use super::bounds::Aabb;

/// Up reference for the basis; swapped for X when the light is nearly vertical
const UP_REFERENCE: Vec3 = Vec3::Y;
const UP_FALLBACK: Vec3 = Vec3::X;
/// |y| threshold beyond which the Y reference degenerates
const VERTICAL_LIMIT: f32 = 0.99;
/// Lower bound keeping zero-volume bounds invertible
const MIN_HALF_EXTENT: f32 = 1e-4;

/// Light-aligned orthonormal frame enclosing the scene bounds
#[derive(Debug, Clone, Copy)]
pub struct LightFrame {
    /// Frame right axis
    pub basis_x: Vec3,
    /// Frame up axis
    pub basis_y: Vec3,
    /// Direction light travels, away from the source
    pub basis_z: Vec3,
    /// Tight half extents of the bounds along each axis
    pub half_extents: Vec3,
    /// Center of the fitted bounds
    pub centroid: Vec3,
}

impl LightFrame {
    /// Fit the frame for a directional light. `light_direction` points from
    /// the scene toward the light, the same vector an N.L term uses; a
    /// zero-length input defaults to an overhead light.
    pub fn fit(light_direction: Vec3, bounds: &Aabb) -> Self {
        let toward_light = light_direction.try_normalize().unwrap_or(Vec3::Y);
        let basis_z = -toward_light;
        let up = if basis_z.y.abs() > VERTICAL_LIMIT {
            UP_FALLBACK
        } else {
            UP_REFERENCE
        };
        let basis_x = basis_z.cross(up).normalize();
        let basis_y = basis_x.cross(basis_z).normalize();

        let centroid = bounds.centroid();
        let mut half_extents = Vec3::ZERO;
        for corner in bounds.corners() {
            let v = corner - centroid;
            half_extents.x = half_extents.x.max(v.dot(basis_x).abs());
            half_extents.y = half_extents.y.max(v.dot(basis_y).abs());
            half_extents.z = half_extents.z.max(v.dot(basis_z).abs());
        }

        Self {
            basis_x,
            basis_y,
            basis_z,
            half_extents,
            centroid,
        }
    }

    /// Matrix from shadow-frame coordinates in [-1, 1]^3 back to world space
    pub fn shadow_to_world(&self) -> Mat4 {
        let ext = self.half_extents.max(Vec3::splat(MIN_HALF_EXTENT));
        Mat4::from_cols(
            (self.basis_x * ext.x).extend(0.0),
            (self.basis_y * ext.y).extend(0.0),
            (self.basis_z * ext.z).extend(0.0),
            self.centroid.extend(1.0),
        )
    }

    /// Matrix taking world positions into the frame; inside the fitted box
    /// every coordinate lands in [-1, 1], and depth grows away from the light.
    pub fn world_to_shadow(&self) -> Mat4 {
        self.shadow_to_world().inverse()
    }

    /// World-to-shadow with z remapped to [0, 1] for the rasterizer's clip
    /// conventions; this is the matrix the GPU passes consume.
    pub fn world_to_clip(&self) -> Mat4 {
        let remap = Mat4::from_cols(
            Vec4::X,
            Vec4::Y,
            Vec4::new(0.0, 0.0, 0.5, 0.0),
            Vec4::new(0.0, 0.0, 0.5, 1.0),
        );
        remap * self.world_to_shadow()
    }

    /// Direction from the scene toward the light
    pub fn light_direction(&self) -> Vec3 {
        -self.basis_z
    }
}
