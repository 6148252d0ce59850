//! Projection builder: turns a [`ProjectionDescriptor`] into screen surfaces.
//!
//! One builder function per projection kind, looked up through a single
//! table. Builders are pure; the caller owns (and disposes) what they return.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use glam::{Quat, Vec3};

use crate::eac::{self, EacRows};
use crate::mesh::{self, SurfaceMesh};
use crate::projection::{ProjectionDescriptor, ProjectionKind};
use crate::surface::{
    BuiltScreens, Material, ScreenSurface, ShaderKind, SurfaceRole, TextureRef, Transform,
};

/// Distance from the viewer to the flat `SBS_MONO` screen.
pub const FLAT_SCREEN_DISTANCE: f32 = 2.0;

const THIRD: f32 = 1.0 / 3.0;
const TWO_THIRDS: f32 = 2.0 / 3.0;

/// The frame a build samples from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub texture: TextureRef,
    pub width: u32,
    pub height: u32,
}

impl FrameInfo {
    /// Width over height, or 1.0 for an empty frame.
    pub fn aspect(&self) -> f32 {
        if self.width == 0 || self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Viewer parameters some layouts depend on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildContext {
    pub frame: FrameInfo,
    /// Rendering to a headset (two separate eye views).
    pub xr: bool,
    /// Vertical field of view of the camera, radians.
    pub fov_y: f32,
    pub viewport_aspect: f32,
    pub flat_distance: f32,
}

impl BuildContext {
    pub fn new(frame: FrameInfo) -> Self {
        Self {
            frame,
            xr: false,
            fov_y: 75f32.to_radians(),
            viewport_aspect: 16.0 / 9.0,
            flat_distance: FLAT_SCREEN_DISTANCE,
        }
    }
}

type BuildFn = fn(&ProjectionDescriptor, &BuildContext) -> BuiltScreens;

const BUILDERS: [(ProjectionKind, BuildFn); 11] = [
    (ProjectionKind::Sphere360, build_sphere_360),
    (ProjectionKind::Sphere360Lr, build_sphere_360_lr),
    (ProjectionKind::Sphere360Tb, build_sphere_360_tb),
    (ProjectionKind::Cube360, build_cube_360),
    (ProjectionKind::Half180, build_half_180_lr),
    (ProjectionKind::Half180Lr, build_half_180_lr),
    (ProjectionKind::Half180Tb, build_half_180_tb),
    (ProjectionKind::Half180Mono, build_half_180_mono),
    (ProjectionKind::Eac, build_eac),
    (ProjectionKind::EacLr, build_eac_lr),
    (ProjectionKind::FlatSbsMono, build_flat_sbs),
];

/// Build the surfaces for `desc`. `NONE` (and an unresolved `AUTO`) build
/// nothing.
pub fn build(desc: &ProjectionDescriptor, ctx: &BuildContext) -> Option<BuiltScreens> {
    let Some((_, builder)) = BUILDERS.iter().find(|(kind, _)| *kind == desc.kind) else {
        if desc.kind == ProjectionKind::Auto {
            log::warn!("AUTO projection reached the builder unresolved, building nothing");
        }
        return None;
    };

    let screens = builder(desc, ctx);
    log::debug!(
        "built {} with {} surface(s), {} vertices each",
        desc.kind,
        screens.len(),
        screens.iter().next().map(|s| s.geometry.vertex_count()).unwrap_or(0)
    );
    Some(screens)
}

// ── UV splits ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Split {
    /// Left eye in the left half, right eye in the right half.
    SideBySide,
    /// Left eye in the top half, right eye in the bottom half.
    TopBottom,
}

fn split_uvs(mesh: &SurfaceMesh, split: Split) -> (SurfaceMesh, SurfaceMesh) {
    let mut left = mesh.clone();
    let mut right = mesh.clone();
    match split {
        Split::SideBySide => {
            left.map_uvs(|[u, v]| [u * 0.5, v]);
            right.map_uvs(|[u, v]| [u * 0.5 + 0.5, v]);
        }
        Split::TopBottom => {
            left.map_uvs(|[u, v]| [u, v * 0.5 + 0.5]);
            right.map_uvs(|[u, v]| [u, v * 0.5]);
        }
    }
    (left, right)
}

fn basic(ctx: &BuildContext) -> Material {
    Material {
        texture: ctx.frame.texture,
        shader: ShaderKind::Basic,
    }
}

fn stereo_pair(
    mesh: &SurfaceMesh,
    split: Split,
    material: Material,
    transform: Transform,
) -> BuiltScreens {
    let (l, r) = split_uvs(mesh, split);
    BuiltScreens::Pair {
        left: ScreenSurface::new(SurfaceRole::Left, l, material).with_transform(transform),
        right: ScreenSurface::new(SurfaceRole::Right, r, material).with_transform(transform),
    }
}

// ── Spheres ──────────────────────────────────────────────────

fn sphere_transform() -> Transform {
    Transform {
        rotation: Quat::from_rotation_y(-FRAC_PI_2),
        scale: Vec3::new(-1.0, 1.0, 1.0),
        ..Transform::IDENTITY
    }
}

fn full_sphere(desc: &ProjectionDescriptor) -> SurfaceMesh {
    mesh::build_sphere(desc.radius, desc.detail_level, desc.detail_level, 0.0, TAU)
}

fn build_sphere_360(desc: &ProjectionDescriptor, ctx: &BuildContext) -> BuiltScreens {
    let surface = ScreenSurface::new(SurfaceRole::Mono, full_sphere(desc), basic(ctx));
    BuiltScreens::Single(surface.with_transform(sphere_transform()))
}

fn build_sphere_360_lr(desc: &ProjectionDescriptor, ctx: &BuildContext) -> BuiltScreens {
    stereo_pair(&full_sphere(desc), Split::SideBySide, basic(ctx), sphere_transform())
}

fn build_sphere_360_tb(desc: &ProjectionDescriptor, ctx: &BuildContext) -> BuiltScreens {
    stereo_pair(&full_sphere(desc), Split::TopBottom, basic(ctx), sphere_transform())
}

// ── Hemispheres ──────────────────────────────────────────────

// Longitudes [pi, 2pi] already face -Z, only the mirror is needed.
fn hemisphere_transform() -> Transform {
    Transform {
        scale: Vec3::new(-1.0, 1.0, 1.0),
        ..Transform::IDENTITY
    }
}

fn hemisphere(desc: &ProjectionDescriptor) -> SurfaceMesh {
    mesh::build_sphere(desc.radius, desc.detail_level, desc.detail_level, PI, PI)
}

fn build_half_180_lr(desc: &ProjectionDescriptor, ctx: &BuildContext) -> BuiltScreens {
    stereo_pair(&hemisphere(desc), Split::SideBySide, basic(ctx), hemisphere_transform())
}

fn build_half_180_tb(desc: &ProjectionDescriptor, ctx: &BuildContext) -> BuiltScreens {
    stereo_pair(&hemisphere(desc), Split::TopBottom, basic(ctx), hemisphere_transform())
}

fn build_half_180_mono(desc: &ProjectionDescriptor, ctx: &BuildContext) -> BuiltScreens {
    let surface = ScreenSurface::new(SurfaceRole::Mono, hemisphere(desc), basic(ctx));
    BuiltScreens::Single(surface.with_transform(hemisphere_transform()))
}

// ── Cubemaps ─────────────────────────────────────────────────

const fn cell(x0: f32, y0: f32, x1: f32, y1: f32) -> [[f32; 2]; 4] {
    [[x0, y0], [x1, y0], [x1, y1], [x0, y1]]
}

/// 3×2 atlas: top row left, right, top; bottom row bottom, front, back.
/// Listed in box face order (+X, -X, +Y, -Y, +Z, -Z).
const CUBE_ATLAS: [[[f32; 2]; 4]; mesh::BOX_FACES] = [
    cell(THIRD, 0.5, TWO_THIRDS, 1.0), // right
    cell(0.0, 0.5, THIRD, 1.0),        // left
    cell(TWO_THIRDS, 0.5, 1.0, 1.0),   // top
    cell(0.0, 0.0, THIRD, 0.5),        // bottom
    cell(THIRD, 0.0, TWO_THIRDS, 0.5), // front
    cell(TWO_THIRDS, 0.0, 1.0, 0.5),   // back
];

fn cube_transform() -> Transform {
    Transform {
        rotation: Quat::from_rotation_y(PI),
        ..Transform::IDENTITY
    }
}

fn build_cube_360(desc: &ProjectionDescriptor, ctx: &BuildContext) -> BuiltScreens {
    let mut geometry = mesh::build_box(desc.radius * 2.0);
    for (face, quad) in CUBE_ATLAS.iter().enumerate() {
        mesh::set_box_face_uvs(&mut geometry, face, *quad, mesh::FULL_RECT);
    }
    let surface = ScreenSurface::new(SurfaceRole::Mono, geometry, basic(ctx));
    BuiltScreens::Single(surface.with_transform(cube_transform()))
}

fn eac_surface(
    role: SurfaceRole,
    desc: &ProjectionDescriptor,
    ctx: &BuildContext,
    rows: EacRows,
) -> ScreenSurface {
    let geometry = eac::build_eac_cube(desc.radius * 2.0, ctx.frame.height as f32, rows);
    let material = Material {
        texture: ctx.frame.texture,
        shader: ShaderKind::Eac,
    };
    ScreenSurface::new(role, geometry, material).with_transform(cube_transform())
}

fn build_eac(desc: &ProjectionDescriptor, ctx: &BuildContext) -> BuiltScreens {
    BuiltScreens::Single(eac_surface(SurfaceRole::Mono, desc, ctx, EacRows::Full))
}

fn build_eac_lr(desc: &ProjectionDescriptor, ctx: &BuildContext) -> BuiltScreens {
    BuiltScreens::Pair {
        left: eac_surface(SurfaceRole::Left, desc, ctx, EacRows::Top),
        right: eac_surface(SurfaceRole::Right, desc, ctx, EacRows::Bottom),
    }
}

// ── Flat side-by-side ────────────────────────────────────────

/// Largest `(width, height)` of a `content_aspect` rectangle that fits the
/// camera's view at `distance`.
pub fn fit_to_view(content_aspect: f32, fov_y: f32, viewport_aspect: f32, distance: f32) -> (f32, f32) {
    let content_aspect = if content_aspect > 0.0 { content_aspect } else { 1.0 };
    let viewport_aspect = if viewport_aspect > 0.0 { viewport_aspect } else { 1.0 };

    let view_h = 2.0 * distance * (fov_y * 0.5).tan();
    let view_w = view_h * viewport_aspect;

    if content_aspect > viewport_aspect {
        (view_w, view_w / content_aspect)
    } else {
        (view_h * content_aspect, view_h)
    }
}

/// Transform placing the flat screen `distance` in front of the viewer.
pub fn flat_screen_transform(distance: f32) -> Transform {
    Transform {
        position: Vec3::new(0.0, 0.0, -distance),
        ..Transform::IDENTITY
    }
}

fn build_flat_sbs(_desc: &ProjectionDescriptor, ctx: &BuildContext) -> BuiltScreens {
    // Each eye's image is half the frame wide.
    let half_aspect = ctx.frame.aspect() * 0.5;
    let (w, h) = fit_to_view(half_aspect, ctx.fov_y, ctx.viewport_aspect, ctx.flat_distance);
    let plane = mesh::build_plane(w, h);
    let transform = flat_screen_transform(ctx.flat_distance);

    if ctx.xr {
        stereo_pair(&plane, Split::SideBySide, basic(ctx), transform)
    } else {
        let mut left = plane;
        left.map_uvs(|[u, v]| [u * 0.5, v]);
        let surface = ScreenSurface::new(SurfaceRole::Mono, left, basic(ctx));
        BuiltScreens::Single(surface.with_transform(transform))
    }
}
