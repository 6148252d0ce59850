//! Equi-angular cubemap (EAC) UV layout.
//!
//! The frame holds six faces in a 3×2 grid: the top row is right, front and
//! left; the bottom row is bottom, back and top, each rotated a quarter turn.
//! Faces store angularly spaced samples, so the fragment stage warps the
//! linearly interpolated UV with [`angular_remap`] before sampling.
//!
//! Rows of neighbouring faces are not continuous in the frame, and bilinear
//! filtering bleeds across the seam. Every face is therefore shrunk by
//! [`CONT_CORRECT`] texels on its top and bottom edge.

use std::f32::consts::FRAC_2_PI;

use crate::mesh::{self, SurfaceMesh};

/// Width of the strip dropped on each discontinuous face edge, in texels.
pub const CONT_CORRECT: f32 = 2.0;

const THIRD: f32 = 1.0 / 3.0;
const TWO_THIRDS: f32 = 2.0 / 3.0;

// Corner lists, counter-clockwise from the face's own bottom-left.
const RIGHT: [[f32; 2]; 4] = [[0.0, 0.5], [THIRD, 0.5], [THIRD, 1.0], [0.0, 1.0]];
const FRONT: [[f32; 2]; 4] = [[THIRD, 0.5], [TWO_THIRDS, 0.5], [TWO_THIRDS, 1.0], [THIRD, 1.0]];
const LEFT: [[f32; 2]; 4] = [[TWO_THIRDS, 0.5], [1.0, 0.5], [1.0, 1.0], [TWO_THIRDS, 1.0]];
const BOTTOM: [[f32; 2]; 4] = [[THIRD, 0.0], [THIRD, 0.5], [0.0, 0.5], [0.0, 0.0]];
const BACK: [[f32; 2]; 4] = [[THIRD, 0.5], [THIRD, 0.0], [TWO_THIRDS, 0.0], [TWO_THIRDS, 0.5]];
const TOP: [[f32; 2]; 4] = [[1.0, 0.0], [1.0, 0.5], [TWO_THIRDS, 0.5], [TWO_THIRDS, 0.0]];

/// Box face order (+X, -X, +Y, -Y, +Z, -Z) mapped to frame faces.
const FACES: [[[f32; 2]; 4]; mesh::BOX_FACES] = [RIGHT, LEFT, TOP, BOTTOM, FRONT, BACK];

/// Which part of the frame a cube samples from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EacRows {
    /// Mono layout, the whole frame.
    Full,
    /// Upper half of a stacked stereo frame.
    Top,
    /// Lower half of a stacked stereo frame.
    Bottom,
}

impl EacRows {
    /// Map a UV in eye-local space into frame space.
    pub fn map(self, uv: [f32; 2]) -> [f32; 2] {
        match self {
            EacRows::Full => uv,
            EacRows::Top => [uv[0], uv[1] * 0.5 + 0.5],
            EacRows::Bottom => [uv[0], uv[1] * 0.5],
        }
    }

    fn map_rect(self, rect: [f32; 4]) -> [f32; 4] {
        let [x, y] = self.map([rect[0], rect[1]]);
        let h = if self == EacRows::Full { rect[3] } else { rect[3] * 0.5 };
        [x, y, rect[2], h]
    }

    /// Fraction of the frame height this cube covers.
    pub fn height_fraction(self) -> f32 {
        match self {
            EacRows::Full => 1.0,
            EacRows::Top | EacRows::Bottom => 0.5,
        }
    }
}

/// Continuity inset in normalized V for a frame `frame_height` texels high.
///
/// Zero for an empty frame rather than dividing by zero.
pub fn continuity_inset(frame_height: f32) -> f32 {
    if frame_height > 0.0 {
        CONT_CORRECT / frame_height
    } else {
        0.0
    }
}

/// Shrink a face quad by `inset` on its lowest and highest V edge.
///
/// The inset is capped at a quarter of the face height so the two edges
/// never cross on frames only a few texels high. Returns the adjusted
/// corners and the face's adjusted bounding rect.
pub fn inset_face(quad: [[f32; 2]; 4], inset: f32) -> ([[f32; 2]; 4], [f32; 4]) {
    let low = quad.iter().map(|c| c[1]).fold(f32::INFINITY, f32::min);
    let high = quad.iter().map(|c| c[1]).fold(f32::NEG_INFINITY, f32::max);
    let inset = inset.clamp(0.0, 0.25 * (high - low));
    let min_u = quad.iter().map(|c| c[0]).fold(f32::INFINITY, f32::min);
    let max_u = quad.iter().map(|c| c[0]).fold(f32::NEG_INFINITY, f32::max);

    let mut out = quad;
    for corner in &mut out {
        if (corner[1] - low).abs() < f32::EPSILON {
            corner[1] += inset;
        } else if (corner[1] - high).abs() < f32::EPSILON {
            corner[1] -= inset;
        }
    }

    let rect = [min_u, low + inset, max_u - min_u, (high - low - 2.0 * inset).max(0.0)];
    (out, rect)
}

/// Equi-angular to linear correction within a face rect.
///
/// `q = 2/π · atan(2·(p − 0.5)) + 0.5` where `p` is the UV relative to the
/// rect. Same formula as the fragment stage of the EAC shader.
pub fn angular_remap(uv: [f32; 2], rect: [f32; 4]) -> [f32; 2] {
    let mut out = uv;
    for k in 0..2 {
        let (origin, extent) = (rect[k], rect[k + 2]);
        if extent <= 0.0 {
            continue;
        }
        let p = (uv[k] - origin) / extent - 0.5;
        let q = FRAC_2_PI * (2.0 * p).atan() + 0.5;
        out[k] = origin + q * extent;
    }
    out
}

/// Cube of edge `size` textured with the EAC layout of a `frame_height`
/// texel high frame.
pub fn build_eac_cube(size: f32, frame_height: f32, rows: EacRows) -> SurfaceMesh {
    let mut mesh = mesh::build_box(size);
    let inset = continuity_inset(frame_height * rows.height_fraction());

    for (face, quad) in FACES.iter().enumerate() {
        let (quad, rect) = inset_face(*quad, inset);
        let quad = quad.map(|uv| rows.map(uv));
        mesh::set_box_face_uvs(&mut mesh, face, quad, rows.map_rect(rect));
    }

    mesh
}
