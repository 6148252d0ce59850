//! Per-eye visibility of screen surfaces.
//!
//! Masks are always derived from the surface's build role, never from its
//! current mask, so repeated calls and mono/stereo round trips are stable.

use crate::surface::{BuiltScreens, Eye, EyeMask, ScreenSurface, SurfaceRole};

/// Assign eye masks for the current mono/stereo mode.
///
/// Stereo: left/right surfaces keep their own eye, a single surface is seen by
/// both. Force-mono: the left surface is seen by both eyes and the right one
/// is hidden entirely. Must run again after every rebuild.
pub fn assign(screens: &mut BuiltScreens, force_mono: bool) {
    for surface in screens.iter_mut() {
        surface.eye_mask = mask_for(surface.role, force_mono);
    }
}

fn mask_for(role: SurfaceRole, force_mono: bool) -> EyeMask {
    match (role, force_mono) {
        (SurfaceRole::Mono, _) => EyeMask::Both,
        (SurfaceRole::Left, false) => EyeMask::LeftOnly,
        (SurfaceRole::Right, false) => EyeMask::RightOnly,
        (SurfaceRole::Left, true) => EyeMask::Both,
        (SurfaceRole::Right, true) => EyeMask::Hidden,
    }
}

/// Surfaces an eye should draw, with their position in the built set.
pub fn visible_to(
    screens: &BuiltScreens,
    eye: Eye,
) -> impl Iterator<Item = (usize, &ScreenSurface)> {
    screens
        .iter()
        .enumerate()
        .filter(move |(_, s)| s.eye_mask.visible_to(eye))
}

/// Which eye layers the camera renders.
///
/// A flat display has one view that renders the left-eye layer, so stereo
/// sources show their left image instead of both overlapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraLayers {
    pub stereo: bool,
}

impl CameraLayers {
    pub fn for_display(stereo: bool) -> Self {
        Self { stereo }
    }

    pub fn views(&self) -> &'static [Eye] {
        if self.stereo {
            &[Eye::Left, Eye::Right]
        } else {
            &[Eye::Left]
        }
    }
}

impl Default for CameraLayers {
    fn default() -> Self {
        Self::for_display(false)
    }
}
