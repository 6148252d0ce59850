// projection.rs — projection kinds and the build descriptor

use std::fmt;
use std::str::FromStr;

use crate::error::ViewerError;

/// Default sphere radius in world units.
pub const DEFAULT_RADIUS: f32 = 256.0;
/// Default number of width/height segments of sphere geometry.
pub const DEFAULT_DETAIL: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectionKind {
    None,
    Auto,
    Sphere360,     // equirectangular, mono
    Sphere360Lr,   // equirectangular, left/right packed
    Sphere360Tb,   // equirectangular, top/bottom packed
    Cube360,       // 3x2 cubemap atlas
    Half180,       // hemisphere, left/right packed
    Half180Lr,
    Half180Tb,
    Half180Mono,
    Eac,           // YouTube equi-angular cubemap
    EacLr,
    FlatSbsMono,   // flat side-by-side frame on a plane
}

impl ProjectionKind {
    /// Every kind that produces geometry.
    pub const BUILDABLE: [ProjectionKind; 11] = [
        ProjectionKind::Sphere360,
        ProjectionKind::Sphere360Lr,
        ProjectionKind::Sphere360Tb,
        ProjectionKind::Cube360,
        ProjectionKind::Half180,
        ProjectionKind::Half180Lr,
        ProjectionKind::Half180Tb,
        ProjectionKind::Half180Mono,
        ProjectionKind::Eac,
        ProjectionKind::EacLr,
        ProjectionKind::FlatSbsMono,
    ];

    /// Canonical identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectionKind::None => "NONE",
            ProjectionKind::Auto => "AUTO",
            ProjectionKind::Sphere360 => "360",
            ProjectionKind::Sphere360Lr => "360_LR",
            ProjectionKind::Sphere360Tb => "360_TB",
            ProjectionKind::Cube360 => "360_CUBE",
            ProjectionKind::Half180 => "180",
            ProjectionKind::Half180Lr => "180_LR",
            ProjectionKind::Half180Tb => "180_TB",
            ProjectionKind::Half180Mono => "180_MONO",
            ProjectionKind::Eac => "EAC",
            ProjectionKind::EacLr => "EAC_LR",
            ProjectionKind::FlatSbsMono => "SBS_MONO",
        }
    }

    /// Layouts that only cover the front half of the sphere.
    pub fn is_half_view(self) -> bool {
        matches!(
            self,
            ProjectionKind::Half180
                | ProjectionKind::Half180Lr
                | ProjectionKind::Half180Tb
                | ProjectionKind::Half180Mono
        )
    }

    pub fn is_flat(self) -> bool {
        self == ProjectionKind::FlatSbsMono
    }

    /// Whether the build depends on the pixel size of the frame.
    pub fn depends_on_frame_size(self) -> bool {
        matches!(
            self,
            ProjectionKind::Eac | ProjectionKind::EacLr | ProjectionKind::FlatSbsMono
        )
    }
}

impl fmt::Display for ProjectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectionKind {
    type Err = ViewerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim() {
            "NONE" => ProjectionKind::None,
            "AUTO" => ProjectionKind::Auto,
            "360" | "Sphere" | "equirectangular" => ProjectionKind::Sphere360,
            "360_LR" => ProjectionKind::Sphere360Lr,
            "360_TB" => ProjectionKind::Sphere360Tb,
            "Cube" | "360_CUBE" => ProjectionKind::Cube360,
            "180" => ProjectionKind::Half180,
            "180_LR" => ProjectionKind::Half180Lr,
            "180_TB" => ProjectionKind::Half180Tb,
            "180_MONO" => ProjectionKind::Half180Mono,
            "EAC" => ProjectionKind::Eac,
            "EAC_LR" => ProjectionKind::EacLr,
            "SBS_MONO" => ProjectionKind::FlatSbsMono,
            other => return Err(ViewerError::UnknownProjection(other.to_string())),
        };
        Ok(kind)
    }
}

/// Everything a single projection build needs besides the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionDescriptor {
    pub kind: ProjectionKind,
    pub detail_level: u32,
    pub radius: f32,
}

impl ProjectionDescriptor {
    pub fn new(kind: ProjectionKind) -> Self {
        Self {
            kind,
            detail_level: DEFAULT_DETAIL,
            radius: DEFAULT_RADIUS,
        }
    }

    pub fn with_detail(mut self, detail_level: u32) -> Self {
        self.detail_level = detail_level;
        self
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    /// Resolve `AUTO` against an external metadata hint.
    ///
    /// Resolution happens exactly once: a hint that is itself `AUTO`, is
    /// unknown, or is absent yields `NONE`.
    pub fn resolve(self, hint: Option<&str>) -> Self {
        if self.kind != ProjectionKind::Auto {
            return self;
        }

        let resolved = match hint.map(str::parse::<ProjectionKind>) {
            Some(Ok(ProjectionKind::Auto)) | None => ProjectionKind::None,
            Some(Ok(kind)) => kind,
            Some(Err(err)) => {
                log::warn!("AUTO projection hint rejected: {err}");
                ProjectionKind::None
            }
        };

        if resolved == ProjectionKind::None {
            log::warn!("AUTO projection has no usable hint, using NONE");
        }

        Self {
            kind: resolved,
            ..self
        }
    }
}

impl Default for ProjectionDescriptor {
    fn default() -> Self {
        Self::new(ProjectionKind::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_alias() {
        let cases = [
            ("NONE", ProjectionKind::None),
            ("AUTO", ProjectionKind::Auto),
            ("360", ProjectionKind::Sphere360),
            ("Sphere", ProjectionKind::Sphere360),
            ("equirectangular", ProjectionKind::Sphere360),
            ("360_LR", ProjectionKind::Sphere360Lr),
            ("360_TB", ProjectionKind::Sphere360Tb),
            ("Cube", ProjectionKind::Cube360),
            ("360_CUBE", ProjectionKind::Cube360),
            ("180", ProjectionKind::Half180),
            ("180_LR", ProjectionKind::Half180Lr),
            ("180_TB", ProjectionKind::Half180Tb),
            ("180_MONO", ProjectionKind::Half180Mono),
            ("EAC", ProjectionKind::Eac),
            ("EAC_LR", ProjectionKind::EacLr),
            ("SBS_MONO", ProjectionKind::FlatSbsMono),
        ];
        for (id, kind) in cases {
            assert_eq!(id.parse::<ProjectionKind>(), Ok(kind), "{id}");
        }
    }

    #[test]
    fn canonical_names_round_trip() {
        for kind in ProjectionKind::BUILDABLE {
            assert_eq!(kind.as_str().parse::<ProjectionKind>(), Ok(kind));
        }
    }

    #[test]
    fn unknown_identifier_is_rejected() {
        assert_eq!(
            "360_SBS".parse::<ProjectionKind>(),
            Err(ViewerError::UnknownProjection("360_SBS".into()))
        );
        // identifiers are case sensitive
        assert!("sphere".parse::<ProjectionKind>().is_err());
    }

    #[test]
    fn auto_resolves_once() {
        let auto = ProjectionDescriptor::new(ProjectionKind::Auto);
        assert_eq!(auto.resolve(Some("EAC")).kind, ProjectionKind::Eac);
        assert_eq!(auto.resolve(Some("AUTO")).kind, ProjectionKind::None);
        assert_eq!(auto.resolve(None).kind, ProjectionKind::None);
        assert_eq!(auto.resolve(Some("bogus")).kind, ProjectionKind::None);
    }

    #[test]
    fn resolve_keeps_concrete_kinds() {
        let desc = ProjectionDescriptor::new(ProjectionKind::Cube360).with_detail(8);
        assert_eq!(desc.resolve(Some("EAC")), desc);
    }
}
