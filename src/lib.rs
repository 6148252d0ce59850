//! Projection geometry and stereo compositing core of a panoramic / VR
//! frame viewer.
//!
//! A decoded frame is mapped onto one or two screen surfaces (sphere,
//! hemisphere, cubemap, equi-angular cubemap or a flat plane) according to
//! its layout. [`scene::SceneGraphManager`] keeps those surfaces, the per-eye
//! visibility masks and the camera orientation consistent while the layout,
//! the source and the mono/stereo mode change at runtime.

pub mod builder;
pub mod compositor;
pub mod config;
pub mod eac;
pub mod error;
pub mod i18n;
pub mod mesh;
pub mod orientation;
pub mod projection;
pub mod renderer;
pub mod scene;
pub mod source;
pub mod surface;

pub use error::{ConfigError, FrameError, ViewerError};
pub use projection::{ProjectionDescriptor, ProjectionKind};
pub use scene::{RenderPlan, SceneGraphManager, SurfaceBackend, SurfaceId, ViewerEvent};
