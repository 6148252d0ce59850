//! End-to-end behaviour of the scene graph manager against a recording
//! backend: rebuild ordering, masks across rebuilds, source swaps, flat
//! screen tracking and teardown.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::f32::consts::FRAC_PI_2;
use std::rc::Rc;

use glam::{EulerRot, Quat, Vec3};
use image::RgbaImage;

use panorama_vr::compositor::CameraLayers;
use panorama_vr::error::FrameError;
use panorama_vr::orientation::{Euler, OrientationController};
use panorama_vr::scene::{LayerObserver, ViewerSettings};
use panorama_vr::source::{FrameSource, StillFrame};
use panorama_vr::surface::{Eye, EyeMask, ScreenSurface, ShaderKind};
use panorama_vr::{
    ProjectionDescriptor, ProjectionKind, SceneGraphManager, SurfaceBackend, SurfaceId, ViewerError,
    ViewerEvent,
};

// ── Helpers ──────────────────────────────────────────────────

#[derive(Default)]
struct Recording {
    live: BTreeMap<SurfaceId, ScreenSurface>,
    attaches: usize,
    disposes: usize,
    uploads: usize,
    max_live: usize,
}

impl SurfaceBackend for Recording {
    fn attach(&mut self, id: SurfaceId, surface: &ScreenSurface) {
        self.live.insert(id, surface.clone());
        self.attaches += 1;
        self.max_live = self.max_live.max(self.live.len());
    }

    fn update(&mut self, id: SurfaceId, surface: &ScreenSurface) {
        if let Some(live) = self.live.get_mut(&id) {
            *live = surface.clone();
        }
    }

    fn dispose(&mut self, id: SurfaceId) {
        assert!(self.live.remove(&id).is_some(), "disposed unknown surface {id:?}");
        self.disposes += 1;
    }

    fn upload_frame(&mut self, source: &dyn FrameSource) -> Result<(), FrameError> {
        source.pixels()?;
        self.uploads += 1;
        Ok(())
    }
}

#[derive(Clone, Default)]
struct LayerLog(Rc<RefCell<Vec<CameraLayers>>>);

impl LayerObserver for LayerLog {
    fn refresh_layers(&mut self, layers: CameraLayers) {
        self.0.borrow_mut().push(layers);
    }
}

fn scene_with(settings: ViewerSettings) -> SceneGraphManager<Recording> {
    SceneGraphManager::new(Recording::default(), settings, OrientationController::default())
}

fn scene() -> SceneGraphManager<Recording> {
    scene_with(ViewerSettings {
        detail_level: 8,
        ..ViewerSettings::default()
    })
}

fn frame(width: u32, height: u32) -> StillFrame {
    StillFrame::from_image(RgbaImage::new(width, height))
}

fn desc(kind: ProjectionKind) -> ProjectionDescriptor {
    ProjectionDescriptor::new(kind).with_detail(8)
}

fn masks(scene: &SceneGraphManager<Recording>) -> Vec<EyeMask> {
    scene.backend().live.values().map(|s| s.eye_mask).collect()
}

// ── Rebuilds ─────────────────────────────────────────────────

#[test]
fn switching_back_and_forth_keeps_one_attached_set() {
    let mut scene = scene();
    let source = frame(64, 32);
    scene.frame(&source, 0.016, None).unwrap();

    for _ in 0..2 {
        scene.set_projection(desc(ProjectionKind::Sphere360)).unwrap();
        scene.frame(&source, 0.016, None).unwrap();
        assert_eq!(scene.backend().live.len(), 1);

        scene.set_projection(desc(ProjectionKind::Half180Mono)).unwrap();
        scene.frame(&source, 0.016, None).unwrap();
        assert_eq!(scene.backend().live.len(), 1);
    }
    assert_eq!(scene.backend().max_live, 1);
    assert_eq!(scene.backend().attaches, 4);
    assert_eq!(scene.backend().disposes, 3);
}

#[test]
fn stereo_pairs_are_released_before_the_next_pair() {
    let mut scene = scene();
    scene.frame(&frame(64, 32), 0.016, None).unwrap();

    scene.set_projection(desc(ProjectionKind::Sphere360Lr)).unwrap();
    scene.set_projection(desc(ProjectionKind::EacLr)).unwrap();
    scene.set_projection(desc(ProjectionKind::Half180Tb)).unwrap();

    assert_eq!(scene.backend().live.len(), 2);
    assert_eq!(scene.backend().max_live, 2);
}

#[test]
fn sphere_360_lr_builds_matching_eye_surfaces() {
    let mut scene = scene();
    scene.frame(&frame(64, 32), 0.016, None).unwrap();
    scene.set_projection(desc(ProjectionKind::Sphere360Lr)).unwrap();

    let live: Vec<_> = scene.backend().live.values().collect();
    assert_eq!(live.len(), 2);
    assert_eq!(live[0].eye_mask, EyeMask::LeftOnly);
    assert_eq!(live[1].eye_mask, EyeMask::RightOnly);
    assert_eq!(
        live[0].geometry.vertex_count(),
        live[1].geometry.vertex_count()
    );
}

#[test]
fn force_mono_survives_rebuilds() {
    let mut scene = scene();
    scene.frame(&frame(64, 32), 0.016, None).unwrap();
    scene.set_projection(desc(ProjectionKind::Sphere360Tb)).unwrap();
    scene.set_force_mono(true);
    assert_eq!(masks(&scene), vec![EyeMask::Both, EyeMask::Hidden]);

    scene.set_projection(desc(ProjectionKind::EacLr)).unwrap();
    assert_eq!(masks(&scene), vec![EyeMask::Both, EyeMask::Hidden]);

    scene.set_force_mono(false);
    assert_eq!(masks(&scene), vec![EyeMask::LeftOnly, EyeMask::RightOnly]);
}

#[test]
fn layer_observers_follow_rebuilds() {
    let log = LayerLog::default();
    let mut scene = scene();
    scene.add_observer(Box::new(log.clone()));
    scene.frame(&frame(64, 32), 0.016, None).unwrap();

    let before = log.0.borrow().len();
    scene.set_projection(desc(ProjectionKind::Cube360)).unwrap();
    assert_eq!(log.0.borrow().len(), before + 1);
    assert_eq!(log.0.borrow().last(), Some(&CameraLayers::for_display(false)));
}

// ── Identifiers ──────────────────────────────────────────────

#[test]
fn unknown_identifier_falls_back_to_none() {
    let mut scene = scene();
    scene.frame(&frame(64, 32), 0.016, None).unwrap();
    scene.set_projection(desc(ProjectionKind::Sphere360)).unwrap();
    scene.take_events();

    let err = scene.set_projection_id("dome").unwrap_err();
    assert_eq!(err, ViewerError::UnknownProjection("dome".into()));
    assert_eq!(scene.current().kind, ProjectionKind::None);
    assert!(scene.backend().live.is_empty());
    assert_eq!(
        scene.take_events(),
        vec![ViewerEvent::ProjectionChanged(ProjectionKind::None)]
    );
}

#[test]
fn aliases_select_the_same_layout() {
    let mut scene = scene();
    scene.frame(&frame(64, 32), 0.016, None).unwrap();
    assert_eq!(scene.set_projection_id("equirectangular"), Ok(ProjectionKind::Sphere360));
    assert_eq!(scene.set_projection_id("Cube"), Ok(ProjectionKind::Cube360));
    assert_eq!(scene.set_projection_id("360_CUBE"), Ok(ProjectionKind::Cube360));
}

#[test]
fn auto_resolves_from_hint_once() {
    let mut scene = scene_with(ViewerSettings {
        detail_level: 8,
        projection_hint: Some("180_LR".into()),
        ..ViewerSettings::default()
    });
    scene.frame(&frame(64, 32), 0.016, None).unwrap();

    assert_eq!(scene.set_projection_id("AUTO"), Ok(ProjectionKind::Half180Lr));
    assert_eq!(scene.current().kind, ProjectionKind::Half180Lr);
    assert_eq!(scene.backend().live.len(), 2);
}

#[test]
fn auto_without_hint_builds_nothing() {
    let mut scene = scene();
    scene.frame(&frame(64, 32), 0.016, None).unwrap();
    assert_eq!(scene.set_projection_id("AUTO"), Ok(ProjectionKind::None));
    assert!(scene.backend().live.is_empty());
}

// ── Sources ──────────────────────────────────────────────────

#[test]
fn new_source_swaps_texture_without_rebuild() {
    let mut scene = scene();
    let first = frame(64, 32);
    scene.frame(&first, 0.016, None).unwrap();
    scene.set_projection(desc(ProjectionKind::Sphere360Lr)).unwrap();
    scene.frame(&first, 0.016, None).unwrap();
    assert!(scene.screens().unwrap().iter().all(|s| s.base_orientation.is_some()));

    let second = frame(128, 64);
    scene.set_source(second.info());

    assert_eq!(scene.backend().attaches, 2);
    assert!(scene
        .backend()
        .live
        .values()
        .all(|s| s.material.texture == second.texture()));
    assert!(scene.screens().unwrap().iter().all(|s| s.base_orientation.is_none()));

    scene.frame(&second, 0.016, None).unwrap();
    assert!(scene.screens().unwrap().iter().all(|s| s.base_orientation.is_some()));
}

#[test]
fn eac_rebuilds_when_frame_height_changes() {
    let mut scene = scene();
    scene.frame(&frame(384, 216), 0.016, None).unwrap();
    scene.set_projection(desc(ProjectionKind::Eac)).unwrap();
    assert_eq!(scene.backend().attaches, 1);

    scene.frame(&frame(384, 216), 0.016, None).unwrap();
    assert_eq!(scene.backend().attaches, 1, "same size only swaps textures");

    scene.frame(&frame(768, 432), 0.016, None).unwrap();
    assert_eq!(scene.backend().attaches, 2);
    let live = scene.backend().live.values().next().unwrap();
    assert_eq!(live.material.shader, ShaderKind::Eac);
}

#[test]
fn projection_requested_before_data_builds_on_first_frame() {
    let mut scene = scene();
    scene.set_projection(desc(ProjectionKind::Half180Mono)).unwrap();
    assert!(scene.backend().live.is_empty());

    let loading = frame(0, 0);
    scene.frame(&loading, 0.016, None).unwrap();
    assert!(scene.backend().live.is_empty());
    assert_eq!(scene.backend().uploads, 0);

    scene.frame(&frame(64, 32), 0.016, None).unwrap();
    assert_eq!(scene.backend().live.len(), 1);
    assert_eq!(scene.backend().uploads, 1);
}

#[test]
fn refused_frame_tears_the_viewer_down() {
    let mut scene = scene();
    scene.set_projection(desc(ProjectionKind::Sphere360)).unwrap();
    let restricted = frame(64, 32).restricted();

    let err = scene.frame(&restricted, 0.016, None).unwrap_err();
    assert!(matches!(err, ViewerError::SourceNotPermitted(_)));
    assert!(scene.backend().live.is_empty());
    assert!(!scene.is_running());

    assert_eq!(scene.frame(&frame(64, 32), 0.016, None), Ok(None));
    assert!(scene.backend().live.is_empty());
}

#[test]
fn teardown_releases_everything() {
    let log = LayerLog::default();
    let mut scene = scene();
    scene.add_observer(Box::new(log.clone()));
    scene.frame(&frame(64, 32), 0.016, None).unwrap();
    scene.set_projection(desc(ProjectionKind::EacLr)).unwrap();
    scene.teardown();

    assert!(scene.backend().live.is_empty());
    assert_eq!(scene.backend().disposes, 2);

    let notified = log.0.borrow().len();
    scene.take_events();
    assert_eq!(
        scene.set_projection(desc(ProjectionKind::Sphere360)),
        Err(ViewerError::TornDown)
    );
    assert_eq!(scene.current().kind, ProjectionKind::EacLr);
    assert!(scene.take_events().is_empty());
    assert!(scene.backend().live.is_empty());
    assert_eq!(log.0.borrow().len(), notified);

    scene.frame(&frame(64, 32), 0.016, None).unwrap();
    assert!(scene.backend().live.is_empty(), "nothing pending after teardown");
}

// ── Orientation ──────────────────────────────────────────────

#[test]
fn flat_screen_follows_offset() {
    let mut scene = scene();
    let source = frame(64, 16);
    scene.frame(&source, 0.016, None).unwrap();
    scene.set_projection(desc(ProjectionKind::FlatSbsMono)).unwrap();

    scene.set_orientation_offset(Euler::new(0.0, FRAC_PI_2, 0.0));
    scene.frame(&source, 0.016, None).unwrap();

    let distance = scene.settings().flat_distance;
    let screen = scene.backend().live.values().next().unwrap();
    let expected = Vec3::new(-distance, 0.0, 0.0);
    assert!(
        (screen.transform.position - expected).length() < 1e-4,
        "{:?}",
        screen.transform.position
    );
}

#[test]
fn offset_changes_are_reported_once() {
    let mut scene = scene();
    scene.set_orientation_offset(Euler::new(0.1, 0.2, 0.0));
    scene.reset_orientation_offset();

    assert_eq!(
        scene.take_events(),
        vec![
            ViewerEvent::OrientationChanged(Euler::new(0.1, 0.2, 0.0)),
            ViewerEvent::OrientationChanged(Euler::ZERO),
        ]
    );
    assert_eq!(scene.orientation().offset(), Euler::ZERO);
    assert!(scene.take_events().is_empty());
}

#[test]
fn stereo_display_renders_each_eye_its_own_surface() {
    let mut scene = scene_with(ViewerSettings {
        detail_level: 8,
        stereo_display: true,
        ..ViewerSettings::default()
    });
    let source = frame(64, 32);
    scene.frame(&source, 0.016, None).unwrap();
    scene.set_projection(desc(ProjectionKind::Sphere360Tb)).unwrap();

    let plan = scene.frame(&source, 0.016, None).unwrap().unwrap();
    assert_eq!(plan.views.len(), 2);
    assert_eq!(plan.views[0].eye, Eye::Left);
    assert_eq!(plan.views[1].eye, Eye::Right);
    assert_eq!(plan.views[0].surfaces.len(), 1);
    assert_eq!(plan.views[1].surfaces.len(), 1);
    assert_ne!(plan.views[0].surfaces, plan.views[1].surfaces);

    scene.set_force_mono(true);
    let plan = scene.frame(&source, 0.016, None).unwrap().unwrap();
    assert_eq!(plan.views[0].surfaces, plan.views[1].surfaces);
}

#[test]
fn flat_layout_splits_into_eyes_on_stereo_display() {
    let mut scene = scene();
    let source = frame(64, 16);
    scene.frame(&source, 0.016, None).unwrap();
    scene.set_projection(desc(ProjectionKind::FlatSbsMono)).unwrap();
    assert_eq!(scene.backend().live.len(), 1);

    scene.set_stereo_display(true);
    assert_eq!(scene.backend().live.len(), 2);
    assert_eq!(scene.backend().max_live, 2);
}

#[test]
fn entering_flat_layout_looks_straight_at_the_plane() {
    let mut scene = scene();
    let source = frame(64, 16);
    scene.frame(&source, 0.016, None).unwrap();
    scene.orientation_mut().drag(1.0, 0.5);
    scene.frame(&source, 0.016, None).unwrap();
    assert!(scene.orientation().orbit().yaw() > 0.9);

    scene.set_projection(desc(ProjectionKind::FlatSbsMono)).unwrap();
    assert_eq!(scene.orientation().orbit().yaw(), 0.0);
    assert_eq!(scene.orientation().orbit().pitch(), 0.0);
    assert_eq!(scene.orientation().camera(), Quat::IDENTITY);

    let plan = scene.frame(&source, 0.016, None).unwrap().unwrap();
    assert!(plan.views[0].camera.angle_between(Quat::IDENTITY) < 1e-6);
}

#[test]
fn half_view_layout_limits_azimuth() {
    let mut scene = scene();
    let source = frame(64, 32);
    scene.frame(&source, 0.016, None).unwrap();
    scene.set_projection(desc(ProjectionKind::Half180Mono)).unwrap();

    scene.orientation_mut().drag(2.5, 0.0);
    scene.frame(&source, 0.016, None).unwrap();
    assert!((scene.orientation().orbit().yaw() - FRAC_PI_2).abs() < 1e-6);

    scene.orientation_mut().drag(-5.0, 0.0);
    scene.frame(&source, 0.016, None).unwrap();
    assert!((scene.orientation().orbit().yaw() + FRAC_PI_2).abs() < 1e-6);

    scene.set_projection(desc(ProjectionKind::Sphere360)).unwrap();
    scene.orientation_mut().drag(4.0, 0.0);
    scene.frame(&source, 0.016, None).unwrap();
    assert!(scene.orientation().orbit().yaw() > FRAC_PI_2);
}

#[test]
fn recenter_without_sensor_reports_nothing() {
    let mut scene = scene();
    let source = frame(64, 32);
    scene.frame(&source, 0.016, None).unwrap();
    scene.orientation_mut().drag(0.7, 0.2);
    scene.frame(&source, 0.016, None).unwrap();
    scene.take_events();

    scene.recenter();
    assert!(scene.take_events().is_empty());
    assert_eq!(scene.orientation().orbit().yaw(), 0.0);
    assert_eq!(scene.orientation().offset(), Euler::ZERO);
}

#[test]
fn heading_restarts_with_each_source() {
    let mut scene = scene();
    let first = frame(64, 32);
    assert_eq!(scene.heading_since_source(), None);
    scene.frame(&first, 0.016, None).unwrap();
    scene.set_projection(desc(ProjectionKind::Sphere360)).unwrap();
    scene.frame(&first, 0.016, None).unwrap();
    let start = scene.heading_since_source().unwrap();
    assert!(start.angle_between(Quat::IDENTITY) < 1e-6);

    scene.orientation_mut().drag(0.5, 0.0);
    scene.frame(&first, 0.016, None).unwrap();
    let (yaw, _, _) = scene.heading_since_source().unwrap().to_euler(EulerRot::YXZ);
    assert!((yaw - 0.5).abs() < 1e-4, "{yaw}");

    let second = frame(128, 64);
    scene.set_source(second.info());
    assert_eq!(scene.heading_since_source(), None);
    scene.frame(&second, 0.016, None).unwrap();
    let restarted = scene.heading_since_source().unwrap();
    assert!(restarted.angle_between(Quat::IDENTITY) < 1e-6);
}
