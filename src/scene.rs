//! Scene graph manager: owns the attached screen surfaces and the orientation
//! state, and keeps both consistent across projection and source changes.
//!
//! Every rebuild goes through [`SurfaceSlot::replace`], which disposes the old
//! set before the new one is attached, so two sets never coexist.

use glam::Quat;

use crate::builder::{self, BuildContext, FrameInfo, FLAT_SCREEN_DISTANCE};
use crate::compositor::{self, CameraLayers};
use crate::error::{FrameError, ViewerError};
use crate::orientation::{Euler, OrientationController};
use crate::projection::{ProjectionDescriptor, ProjectionKind, DEFAULT_DETAIL, DEFAULT_RADIUS};
use crate::source::FrameSource;
use crate::surface::{BuiltScreens, Eye, ScreenSurface, TextureRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

/// GPU side of the scene. Implemented by the renderer.
pub trait SurfaceBackend {
    /// Upload geometry and material for a new surface.
    fn attach(&mut self, id: SurfaceId, surface: &ScreenSurface);
    /// Mask, transform or texture of an attached surface changed.
    fn update(&mut self, id: SurfaceId, surface: &ScreenSurface);
    /// Release every GPU resource of the surface.
    fn dispose(&mut self, id: SurfaceId);
    /// Make the source's current pixels available to the surfaces.
    fn upload_frame(&mut self, source: &dyn FrameSource) -> Result<(), FrameError>;
}

/// Overlays (HUD, gallery) that draw on every layer and must follow camera
/// layer changes.
pub trait LayerObserver {
    fn refresh_layers(&mut self, layers: CameraLayers);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewerEvent {
    ProjectionChanged(ProjectionKind),
    OrientationChanged(Euler),
}

/// Viewer-wide parameters that outlive individual builds.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerSettings {
    pub detail_level: u32,
    pub radius: f32,
    /// Render two eye views instead of one.
    pub stereo_display: bool,
    pub fov_y: f32,
    pub viewport_aspect: f32,
    pub flat_distance: f32,
    /// Metadata hint used to resolve `AUTO`.
    pub projection_hint: Option<String>,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            detail_level: DEFAULT_DETAIL,
            radius: DEFAULT_RADIUS,
            stereo_display: false,
            fov_y: 75f32.to_radians(),
            viewport_aspect: 16.0 / 9.0,
            flat_distance: FLAT_SCREEN_DISTANCE,
            projection_hint: None,
        }
    }
}

/// One eye's share of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct EyeView {
    pub eye: Eye,
    pub camera: Quat,
    pub surfaces: Vec<SurfaceId>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderPlan {
    pub views: Vec<EyeView>,
}

#[derive(Debug)]
struct AttachedSet {
    ids: Vec<SurfaceId>,
    screens: BuiltScreens,
}

impl AttachedSet {
    fn entries_mut(&mut self) -> impl Iterator<Item = (SurfaceId, &mut ScreenSurface)> {
        self.ids.iter().copied().zip(self.screens.iter_mut())
    }
}

/// Holder of the single attached surface set.
#[derive(Debug, Default)]
struct SurfaceSlot {
    set: Option<AttachedSet>,
    next_id: u64,
}

impl SurfaceSlot {
    /// Dispose the current set, then attach `screens` (if any).
    fn replace(&mut self, backend: &mut dyn SurfaceBackend, screens: Option<BuiltScreens>) {
        self.release(backend);

        let Some(screens) = screens else {
            return;
        };
        let mut ids = Vec::with_capacity(screens.len());
        for surface in screens.iter() {
            self.next_id += 1;
            let id = SurfaceId(self.next_id);
            backend.attach(id, surface);
            ids.push(id);
        }
        self.set = Some(AttachedSet { ids, screens });
    }

    fn release(&mut self, backend: &mut dyn SurfaceBackend) {
        if let Some(set) = self.set.take() {
            for id in set.ids {
                backend.dispose(id);
            }
        }
    }
}

pub struct SceneGraphManager<B: SurfaceBackend> {
    backend: B,
    settings: ViewerSettings,
    current: ProjectionDescriptor,
    /// Requested before any frame was available to build against.
    pending: Option<ProjectionDescriptor>,
    slot: SurfaceSlot,
    force_mono: bool,
    orientation: OrientationController,
    layers: CameraLayers,
    observers: Vec<Box<dyn LayerObserver>>,
    events: Vec<ViewerEvent>,
    frame: Option<FrameInfo>,
    running: bool,
}

impl<B: SurfaceBackend> SceneGraphManager<B> {
    pub fn new(backend: B, settings: ViewerSettings, orientation: OrientationController) -> Self {
        let layers = CameraLayers::for_display(settings.stereo_display);
        Self {
            backend,
            settings,
            current: ProjectionDescriptor::default(),
            pending: None,
            slot: SurfaceSlot::default(),
            force_mono: false,
            orientation,
            layers,
            observers: Vec::new(),
            events: Vec::new(),
            frame: None,
            running: true,
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn LayerObserver>) {
        self.observers.push(observer);
    }

    // ── Accessors ────────────────────────────────────────────

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn current(&self) -> ProjectionDescriptor {
        self.current
    }

    pub fn settings(&self) -> &ViewerSettings {
        &self.settings
    }

    pub fn screens(&self) -> Option<&BuiltScreens> {
        self.slot.set.as_ref().map(|s| &s.screens)
    }

    pub fn surface_ids(&self) -> &[SurfaceId] {
        self.slot.set.as_ref().map(|s| s.ids.as_slice()).unwrap_or(&[])
    }

    pub fn force_mono(&self) -> bool {
        self.force_mono
    }

    pub fn layers(&self) -> CameraLayers {
        self.layers
    }

    pub fn orientation(&self) -> &OrientationController {
        &self.orientation
    }

    /// Drag input and sensor permission go straight to the controller.
    pub fn orientation_mut(&mut self) -> &mut OrientationController {
        &mut self.orientation
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn take_events(&mut self) -> Vec<ViewerEvent> {
        std::mem::take(&mut self.events)
    }

    // ── Projection ───────────────────────────────────────────

    /// Switch projection. `AUTO` is resolved here, once.
    ///
    /// After teardown nothing changes and no event is emitted.
    pub fn set_projection(
        &mut self,
        desc: ProjectionDescriptor,
    ) -> Result<ProjectionKind, ViewerError> {
        if !self.running {
            return Err(ViewerError::TornDown);
        }
        let desc = desc.resolve(self.settings.projection_hint.as_deref());
        log::info!("projection -> {}", desc.kind);

        self.current = desc;
        self.events.push(ViewerEvent::ProjectionChanged(desc.kind));

        if self.frame.is_some() {
            self.pending = None;
            self.rebuild();
        } else {
            self.pending = Some(desc);
        }
        Ok(desc.kind)
    }

    /// Switch projection by identifier. Unknown identifiers switch to `NONE`
    /// and return the error as a warning for the caller.
    pub fn set_projection_id(&mut self, id: &str) -> Result<ProjectionKind, ViewerError> {
        let kind = id.parse::<ProjectionKind>();
        let requested = kind.as_ref().copied().unwrap_or(ProjectionKind::None);
        let desc = ProjectionDescriptor::new(requested)
            .with_detail(self.settings.detail_level)
            .with_radius(self.settings.radius);

        match kind {
            Ok(_) => self.set_projection(desc),
            Err(err) => {
                self.set_projection(desc)?;
                log::warn!("{err}");
                Err(err)
            }
        }
    }

    fn build_context(&self, frame: FrameInfo) -> BuildContext {
        BuildContext {
            frame,
            xr: self.settings.stereo_display,
            fov_y: self.settings.fov_y,
            viewport_aspect: self.settings.viewport_aspect,
            flat_distance: self.settings.flat_distance,
        }
    }

    /// Dispose, build, mask, attach. Runs synchronously.
    fn rebuild(&mut self) {
        let Some(frame) = self.frame else {
            self.pending = Some(self.current);
            return;
        };

        let ctx = self.build_context(frame);
        let mut screens = builder::build(&self.current, &ctx);
        if let Some(screens) = screens.as_mut() {
            compositor::assign(screens, self.force_mono);
        }
        self.slot.replace(&mut self.backend, screens);

        let kind = self.current.kind;
        self.orientation.set_half_view(kind.is_half_view());
        self.orientation
            .set_flat(kind.is_flat().then_some(self.settings.flat_distance));

        self.sync_layers();
    }

    fn sync_layers(&mut self) {
        self.layers = CameraLayers::for_display(self.settings.stereo_display);
        for observer in &mut self.observers {
            observer.refresh_layers(self.layers);
        }
    }

    // ── Mono / stereo ────────────────────────────────────────

    pub fn set_force_mono(&mut self, enabled: bool) {
        self.force_mono = enabled;
        if let Some(set) = self.slot.set.as_mut() {
            compositor::assign(&mut set.screens, enabled);
            for (id, surface) in set.entries_mut() {
                self.backend.update(id, surface);
            }
        }
        self.sync_layers();
    }

    /// Switch between a single view and per-eye views.
    pub fn set_stereo_display(&mut self, stereo: bool) {
        if self.settings.stereo_display == stereo {
            return;
        }
        self.settings.stereo_display = stereo;
        if self.current.kind.is_flat() {
            // flat layouts build one plane per eye in stereo
            self.rebuild();
        } else {
            self.sync_layers();
        }
    }

    pub fn set_viewport_aspect(&mut self, aspect: f32) {
        if aspect <= 0.0 || (aspect - self.settings.viewport_aspect).abs() < f32::EPSILON {
            return;
        }
        self.settings.viewport_aspect = aspect;
        if self.current.kind.is_flat() {
            self.rebuild();
        }
    }

    // ── Orientation ──────────────────────────────────────────

    pub fn set_orientation_offset(&mut self, offset: Euler) {
        self.orientation.set_offset(offset);
        self.emit_orientation();
    }

    pub fn reset_orientation_offset(&mut self) {
        self.orientation.reset_offset();
        self.emit_orientation();
    }

    /// Make the current view direction forward. Only a changed offset is
    /// reported; without a sensor the orbit resets and the offset stays.
    pub fn recenter(&mut self) {
        let before = self.orientation.offset();
        self.orientation.recenter();
        if self.orientation.offset() != before {
            self.emit_orientation();
        }
    }

    fn emit_orientation(&mut self) {
        self.events
            .push(ViewerEvent::OrientationChanged(self.orientation.offset()));
    }

    // ── Source ───────────────────────────────────────────────

    /// A different frame source took over.
    ///
    /// With surfaces attached the geometry is kept and only the texture is
    /// swapped, unless the layout depends on a frame size that changed.
    pub fn set_source(&mut self, info: FrameInfo) {
        let previous = self.frame.replace(info);

        if self.slot.set.is_none() {
            if self.running {
                if let Some(desc) = self.pending.take() {
                    self.current = desc;
                }
                self.rebuild();
            }
            return;
        }

        let resized = previous
            .map(|p| (p.width, p.height) != (info.width, info.height))
            .unwrap_or(true);
        if resized && self.current.kind.depends_on_frame_size() {
            log::debug!("frame size changed to {}x{}, rebuilding", info.width, info.height);
            self.rebuild();
            return;
        }

        self.swap_texture(info.texture);
    }

    fn swap_texture(&mut self, texture: TextureRef) {
        if let Some(set) = self.slot.set.as_mut() {
            for (id, surface) in set.entries_mut() {
                surface.material.texture = texture;
                surface.base_orientation = None;
                self.backend.update(id, surface);
            }
        }
    }

    // ── Frame loop ───────────────────────────────────────────

    /// Run one tick: rebuild if needed, upload the frame, update orientation
    /// and produce the per-eye render plan.
    ///
    /// Returns `Ok(None)` once torn down. A refused frame upload tears the
    /// viewer down and returns [`ViewerError::SourceNotPermitted`].
    pub fn frame(
        &mut self,
        source: &dyn FrameSource,
        dt: f32,
        sensor: Option<Quat>,
    ) -> Result<Option<RenderPlan>, ViewerError> {
        if !self.running {
            return Ok(None);
        }

        let ready = source.has_enough_data();
        if ready {
            let info = source.info();
            if self.frame != Some(info) {
                self.set_source(info);
            }

            if let Err(err) = self.backend.upload_frame(source) {
                log::error!("frame upload failed: {err}");
                self.teardown();
                return Err(err.into());
            }
        }

        let camera = self.orientation.update(dt, sensor);

        if let Some(transform) = self.orientation.flat_screen_transform() {
            if let Some(set) = self.slot.set.as_mut() {
                for (id, surface) in set.entries_mut() {
                    surface.transform = transform;
                    self.backend.update(id, surface);
                }
            }
        }

        if let Some(set) = self.slot.set.as_mut() {
            for surface in set.screens.iter_mut() {
                surface.base_orientation.get_or_insert(camera);
            }
        }

        Ok(Some(self.render_plan(camera)))
    }

    fn render_plan(&self, camera: Quat) -> RenderPlan {
        let views = self
            .layers
            .views()
            .iter()
            .map(|&eye| EyeView {
                eye,
                camera,
                surfaces: match self.slot.set.as_ref() {
                    Some(set) => compositor::visible_to(&set.screens, eye)
                        .map(|(index, _)| set.ids[index])
                        .collect(),
                    None => Vec::new(),
                },
            })
            .collect();
        RenderPlan { views }
    }

    /// Camera rotation relative to where it pointed when the current source
    /// was first shown. `None` until a tick has run against that source.
    pub fn heading_since_source(&self) -> Option<Quat> {
        let base = self
            .slot
            .set
            .as_ref()?
            .screens
            .iter()
            .next()?
            .base_orientation?;
        Some(base.inverse() * self.orientation.camera())
    }

    /// Release every surface and stop the loop. Later ticks do nothing.
    pub fn teardown(&mut self) {
        if !self.running {
            return;
        }
        self.slot.release(&mut self.backend);
        self.observers.clear();
        self.orientation.reset();
        self.pending = None;
        self.running = false;
        log::info!("viewer torn down");
    }
}
