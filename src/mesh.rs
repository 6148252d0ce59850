// mesh.rs — sphere / box / plane generators for screen surfaces
//
// Layouts follow the usual Y-up convention: UV (0,0) is the bottom-left of the
// frame, v grows upwards.

use std::f32::consts::PI;

/// Rect covering the whole texture, used by faces without EAC correction.
pub const FULL_RECT: [f32; 4] = [0.0, 0.0, 1.0, 1.0];

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMesh {
    pub positions: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    /// Per vertex: `[x, y, w, h]` of the UV rect the vertex's face samples from.
    pub face_rects: Vec<[f32; 4]>,
    pub indices: Vec<u32>,
}

impl SurfaceMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Apply `f` to every UV coordinate.
    pub fn map_uvs(&mut self, mut f: impl FnMut([f32; 2]) -> [f32; 2]) {
        for uv in &mut self.uvs {
            *uv = f(*uv);
        }
    }

    /// Axis-aligned bounds of all UVs as `(min, max)`.
    pub fn uv_bounds(&self) -> ([f32; 2], [f32; 2]) {
        let mut min = [f32::INFINITY; 2];
        let mut max = [f32::NEG_INFINITY; 2];
        for uv in &self.uvs {
            for k in 0..2 {
                min[k] = min[k].min(uv[k]);
                max[k] = max[k].max(uv[k]);
            }
        }
        (min, max)
    }
}

/// Sphere (or a longitude slice of one) centred on the origin.
///
/// `phi_start`/`phi_length` select the longitude range, so a hemisphere is
/// `build_sphere(r, w, h, PI, PI)`. Rows run from the north pole down, and the
/// UV is the native longitude-latitude mapping.
pub fn build_sphere(
    radius: f32,
    width_segments: u32,
    height_segments: u32,
    phi_start: f32,
    phi_length: f32,
) -> SurfaceMesh {
    let lon = width_segments.max(3) as usize;
    let lat = height_segments.max(2) as usize;

    let mut positions = Vec::with_capacity((lat + 1) * (lon + 1));
    let mut uvs = Vec::with_capacity((lat + 1) * (lon + 1));
    let mut indices = Vec::with_capacity(lat * lon * 6);

    for i in 0..=lat {
        let v = i as f32 / lat as f32;
        let theta = PI * v;
        let y = radius * theta.cos();
        let sin_t = theta.sin();

        for j in 0..=lon {
            let u = j as f32 / lon as f32;
            let phi = phi_start + u * phi_length;

            let x = -radius * phi.cos() * sin_t;
            let z = radius * phi.sin() * sin_t;

            positions.push([x, y, z]);
            uvs.push([u, 1.0 - v]);
        }
    }

    // Skip the degenerate triangles touching the poles.
    for i in 0..lat {
        for j in 0..lon {
            let a = (i * (lon + 1) + j + 1) as u32;
            let b = (i * (lon + 1) + j) as u32;
            let c = b + (lon + 1) as u32;
            let d = a + (lon + 1) as u32;

            if i != 0 {
                indices.extend_from_slice(&[a, b, d]);
            }
            if i != lat - 1 {
                indices.extend_from_slice(&[b, c, d]);
            }
        }
    }

    let face_rects = vec![FULL_RECT; positions.len()];
    SurfaceMesh {
        positions,
        uvs,
        face_rects,
        indices,
    }
}

/// Box plane order: +X, -X, +Y, -Y, +Z, -Z. Each plane owns four vertices.
pub const BOX_FACES: usize = 6;

/// Axis-aligned cube of edge `size` with one quad per face.
///
/// Every face stores its vertices as bottom-left, bottom-right, top-left,
/// top-right (in the face's own u/v frame) and is split into triangles
/// `(0, 2, 1)` and `(2, 3, 1)`.
pub fn build_box(size: f32) -> SurfaceMesh {
    // (u axis, v axis, w axis, u dir, v dir, w sign)
    const PLANES: [(usize, usize, usize, f32, f32, f32); BOX_FACES] = [
        (2, 1, 0, -1.0, -1.0, 1.0),  // +X
        (2, 1, 0, 1.0, -1.0, -1.0),  // -X
        (0, 2, 1, 1.0, 1.0, 1.0),    // +Y
        (0, 2, 1, 1.0, -1.0, -1.0),  // -Y
        (0, 1, 2, 1.0, -1.0, 1.0),   // +Z
        (0, 1, 2, -1.0, -1.0, -1.0), // -Z
    ];

    let half = size * 0.5;
    let mut mesh = SurfaceMesh {
        positions: Vec::with_capacity(BOX_FACES * 4),
        uvs: Vec::with_capacity(BOX_FACES * 4),
        face_rects: Vec::with_capacity(BOX_FACES * 4),
        indices: Vec::with_capacity(BOX_FACES * 6),
    };

    for (face, &(ua, va, wa, udir, vdir, wsign)) in PLANES.iter().enumerate() {
        for iy in 0..2 {
            let y = iy as f32 * size - half;
            for ix in 0..2 {
                let x = ix as f32 * size - half;
                let mut p = [0.0f32; 3];
                p[ua] = x * udir;
                p[va] = y * vdir;
                p[wa] = half * wsign;
                mesh.positions.push(p);
                mesh.uvs.push([ix as f32, 1.0 - iy as f32]);
                mesh.face_rects.push(FULL_RECT);
            }
        }

        let base = (face * 4) as u32;
        let (a, d, b, c) = (base, base + 1, base + 2, base + 3);
        mesh.indices.extend_from_slice(&[a, b, d, b, c, d]);
    }

    mesh
}

/// Assign a UV quad to one face of a mesh from [`build_box`].
///
/// `quad` lists the atlas corners counter-clockwise starting at the
/// bottom-left as seen in the texture. Corners are mapped onto the face's
/// vertices so the face keeps its winding relative to its neighbours.
pub fn set_box_face_uvs(mesh: &mut SurfaceMesh, face: usize, quad: [[f32; 2]; 4], rect: [f32; 4]) {
    let base = face * 4;
    let slots = [quad[2], quad[3], quad[1], quad[0]];
    for (k, uv) in slots.into_iter().enumerate() {
        mesh.uvs[base + k] = uv;
        mesh.face_rects[base + k] = rect;
    }
}

/// Flat rectangle in the XY plane facing +Z.
pub fn build_plane(width: f32, height: f32) -> SurfaceMesh {
    let (hw, hh) = (width * 0.5, height * 0.5);
    let positions = vec![[-hw, hh, 0.0], [hw, hh, 0.0], [-hw, -hh, 0.0], [hw, -hh, 0.0]];
    let uvs = vec![[0.0, 1.0], [1.0, 1.0], [0.0, 0.0], [1.0, 0.0]];
    SurfaceMesh {
        positions,
        uvs,
        face_rects: vec![FULL_RECT; 4],
        indices: vec![0, 2, 1, 2, 3, 1],
    }
}
