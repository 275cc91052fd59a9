//! Rigid quaternion + translation transform (§6 external collaborator,
//! supplemented per `SPEC_FULL.md` §C.1 from `lib/transform.c`): translate,
//! axis-angle rotate, raw quaternion application, composition, inversion,
//! and point/mesh application with independent no-offset/invert options.
//!
//! The original hand-rolls quaternion multiplication and a cached rotation
//! matrix; `glam::Quat` already provides both, so this is the same rigid
//! transform expressed through the crate's existing math dependency rather
//! than reimplemented by hand.

use glam::{Quat, Vec3};
use tracing::instrument;

use crate::error::Result;
use crate::mesh::indexed::IndexedMesh;

/// A rigid transform: a rotation followed by a translation, both applied in
/// world space (§C.1).
#[derive(Clone, Copy, Debug)]
pub struct Transform {
    pub rotation: Quat,
    pub translation: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            rotation: Quat::IDENTITY,
            translation: Vec3::ZERO,
        }
    }

    /// Adds `delta` to the translation directly, in world space —
    /// independent of the current rotation, matching `LP_Transform_Translate`.
    pub fn translate(&mut self, delta: Vec3) {
        self.translation += delta;
    }

    /// Rotates by `angle_rad` around `axis`, prepended in world space (the
    /// new rotation is applied *after* whatever this transform already
    /// accumulated, matching `LP_Transform_Rotate`'s `Combine(tt, trans)`).
    pub fn rotate(&mut self, axis: Vec3, angle_rad: f32) {
        if angle_rad == 0.0 {
            return;
        }
        let delta = Transform {
            rotation: Quat::from_axis_angle(axis.normalize(), angle_rad),
            translation: Vec3::ZERO,
        };
        *self = Transform::combine(&delta, self);
    }

    /// Prepends a raw quaternion rotation, world-space, matching
    /// `LP_Transform_ApplyQauternion`.
    pub fn apply_quaternion(&mut self, q: Quat) {
        let delta = Transform {
            rotation: q,
            translation: Vec3::ZERO,
        };
        *self = Transform::combine(&delta, self);
    }

    /// Composes `a` after `b`: `combine(a, b)(p) == a(b(p))`, matching
    /// `LP_Transform_Combine(dest, a, b)`.
    pub fn combine(a: &Transform, b: &Transform) -> Transform {
        Transform {
            rotation: a.rotation * b.rotation,
            translation: a.rotation * b.translation + a.translation,
        }
    }

    /// The inverse transform, such that `self.invert().apply_point(self.apply_point(p, false, false), false, false) == p`.
    pub fn invert(&self) -> Transform {
        let inv_rotation = self.rotation.conjugate();
        Transform {
            rotation: inv_rotation,
            translation: inv_rotation * (-self.translation),
        }
    }

    /// Applies this transform to a point. `no_offset` skips the
    /// translation component; `invert` applies the inverse rotation (and,
    /// unless `no_offset`, subtracts the translation before rotating)
    /// instead of the forward transform (§C.1 `NO_OFFSET`/`INVERT` flags).
    pub fn apply_point(&self, p: Vec3, no_offset: bool, invert: bool) -> Vec3 {
        if invert {
            let src = if no_offset { p } else { p - self.translation };
            self.rotation.conjugate() * src
        } else {
            let rotated = self.rotation * p;
            if no_offset { rotated } else { rotated + self.translation }
        }
    }

    /// Applies this transform to every vertex of `mesh`, re-deduplicating
    /// the transformed positions through a fresh mesh (§C.1
    /// `LP_Transform_VertexList`). Truncates to `F = 3`; a rigid transform
    /// has nothing meaningful to do with attributes beyond position.
    #[instrument(skip(self, mesh))]
    pub fn apply_mesh(&self, mesh: &IndexedMesh, no_offset: bool, invert: bool) -> Result<IndexedMesh> {
        let transformed: Vec<Vec3> = (0..mesh.num_vertices())
            .map(|i| self.apply_point(mesh.position3(i as u32), no_offset, invert))
            .collect();

        let mut out = IndexedMesh::new(3, mesh.primitive_kind());
        for &index in mesh.indices() {
            let p = transformed[index as usize];
            out.add(&[p.x, p.y, p.z])?;
        }
        out.finalize();
        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mesh::indexed::PrimitiveKind;
    use std::f32::consts::PI;

    #[test]
    fn translate_then_invert_round_trips() {
        let mut t = Transform::identity();
        t.translate(Vec3::new(1.0, 2.0, 3.0));
        let p = Vec3::new(5.0, -1.0, 0.5);
        let moved = t.apply_point(p, false, false);
        let back = t.invert().apply_point(moved, false, false);
        assert!((back - p).length() < 1e-5);
    }

    #[test]
    fn rotate_quarter_turn_about_z() {
        let mut t = Transform::identity();
        t.rotate(Vec3::Z, PI / 2.0);
        let p = t.apply_point(Vec3::X, true, false);
        assert!((p - Vec3::Y).length() < 1e-4);
    }

    #[test]
    fn combine_applies_b_then_a() {
        let mut a = Transform::identity();
        a.translate(Vec3::X);
        let mut b = Transform::identity();
        b.rotate(Vec3::Z, PI / 2.0);

        let combined = Transform::combine(&a, &b);
        let p = Vec3::X;
        let expected = a.apply_point(b.apply_point(p, false, false), false, false);
        assert!((combined.apply_point(p, false, false) - expected).length() < 1e-5);
    }

    #[test]
    fn apply_mesh_preserves_index_structure() {
        let mut mesh = IndexedMesh::new(3, PrimitiveKind::Triangle);
        mesh.add(&[0.0, 0.0, 0.0]).unwrap();
        mesh.add(&[1.0, 0.0, 0.0]).unwrap();
        mesh.add(&[0.0, 1.0, 0.0]).unwrap();
        mesh.finalize();

        let mut t = Transform::identity();
        t.translate(Vec3::new(10.0, 0.0, 0.0));
        let out = t.apply_mesh(&mesh, false, false).unwrap();
        assert_eq!(out.num_vertices(), 3);
        assert_eq!(out.num_indices(), 3);
        assert!((out.position3(0) - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-5);
    }
}
