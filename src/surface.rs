// surface.rs — renderable screen surfaces produced by a projection build

use glam::{Mat4, Quat, Vec3};

use crate::mesh::SurfaceMesh;

/// Opaque handle to the texture holding the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureRef(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderKind {
    /// Plain texture lookup.
    Basic,
    /// Equi-angular remap inside each face rect before the lookup.
    Eac,
}

impl ShaderKind {
    pub fn as_u32(self) -> u32 {
        match self {
            ShaderKind::Basic => 0,
            ShaderKind::Eac => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Material {
    pub texture: TextureRef,
    pub shader: ShaderKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Eye {
    Left,
    Right,
}

/// What a surface was built for. Never changes after the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceRole {
    Mono,
    Left,
    Right,
}

/// Which eyes draw a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EyeMask {
    Both,
    LeftOnly,
    RightOnly,
    Hidden,
}

impl EyeMask {
    pub fn visible_to(self, eye: Eye) -> bool {
        match self {
            EyeMask::Both => true,
            EyeMask::LeftOnly => eye == Eye::Left,
            EyeMask::RightOnly => eye == Eye::Right,
            EyeMask::Hidden => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenSurface {
    pub role: SurfaceRole,
    pub geometry: SurfaceMesh,
    pub material: Material,
    pub eye_mask: EyeMask,
    pub transform: Transform,
    /// Camera orientation at the first tick against the current source.
    /// Informational only; cleared on a source swap and read back through
    /// `SceneGraphManager::heading_since_source`.
    pub base_orientation: Option<Quat>,
}

impl ScreenSurface {
    pub fn new(role: SurfaceRole, geometry: SurfaceMesh, material: Material) -> Self {
        let eye_mask = match role {
            SurfaceRole::Mono => EyeMask::Both,
            SurfaceRole::Left => EyeMask::LeftOnly,
            SurfaceRole::Right => EyeMask::RightOnly,
        };
        Self {
            role,
            geometry,
            material,
            eye_mask,
            transform: Transform::IDENTITY,
            base_orientation: None,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}

/// Result of one projection build.
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltScreens {
    Single(ScreenSurface),
    Pair {
        left: ScreenSurface,
        right: ScreenSurface,
    },
}

impl BuiltScreens {
    pub fn len(&self) -> usize {
        match self {
            BuiltScreens::Single(_) => 1,
            BuiltScreens::Pair { .. } => 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScreenSurface> {
        let (first, second) = match self {
            BuiltScreens::Single(s) => (s, None),
            BuiltScreens::Pair { left, right } => (left, Some(right)),
        };
        std::iter::once(first).chain(second)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ScreenSurface> {
        let (first, second) = match self {
            BuiltScreens::Single(s) => (s, None),
            BuiltScreens::Pair { left, right } => (left, Some(right)),
        };
        std::iter::once(first).chain(second)
    }
}
