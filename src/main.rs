// main.rs — desktop host: window, input, menus, background image loading

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::Context as _;
use winit::{
    dpi::{LogicalSize, PhysicalPosition},
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{Fullscreen, Window, WindowBuilder},
};

use panorama_vr::config::ViewerConfig;
use panorama_vr::orientation::Euler;
use panorama_vr::renderer::Renderer;
use panorama_vr::source::StillFrame;
use panorama_vr::{i18n, ProjectionDescriptor, ProjectionKind, SceneGraphManager, ViewerEvent};

/// Offset change per arrow key press, radians.
const OFFSET_STEP: f32 = 5.0 * std::f32::consts::PI / 180.0;

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

type LoadResult = anyhow::Result<StillFrame>;

/// What the menus asked for during one UI pass. Applied after rendering,
/// when the scene is no longer borrowed by the renderer.
enum UiAction {
    OpenImage(PathBuf),
    SetProjection(ProjectionKind),
    SetForceMono(bool),
    SetStereo(bool),
    SetOffset(Euler),
    ResetOffset,
    Recenter,
    SetLang(String),
    SetShowFps(bool),
    ToggleFullscreen,
    Exit,
}

/// Values the menus display, refreshed every frame from the scene.
struct UiState {
    projection: ProjectionKind,
    force_mono: bool,
    stereo: bool,
    offset: Euler,
    lang: String,
    is_loading: bool,
    is_fullscreen: bool,
    show_fps: bool,
    fps: f32,
    /// Yaw turned since the current image was first shown.
    heading: Option<f32>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ViewerConfig::from_env().context("reading configuration")?;
    i18n::init(config.lang.clone());

    let event_loop = EventLoop::new();
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(i18n::tr("app.title"))
            .with_inner_size(LogicalSize::new(1280, 720))
            .build(&event_loop)
            .context("creating window")?,
    );

    let renderer = pollster::block_on(Renderer::new(window.clone(), config.fov_y_deg.to_radians()))?;
    let aspect = renderer.view_aspect(config.stereo_preview);
    let mut settings = config.settings();
    settings.viewport_aspect = aspect;

    let mut scene = SceneGraphManager::new(renderer, settings, config.orientation());
    scene.set_force_mono(config.force_mono);
    if let Err(err) = scene.set_projection_id(&config.projection) {
        log::warn!("{err}");
    }

    let (tx, rx): (Sender<LoadResult>, Receiver<LoadResult>) = channel();

    // shown until the first image arrives; never ready, so nothing is uploaded
    let mut current = StillFrame::from_image(image::RgbaImage::new(0, 0));
    let mut ui = UiState {
        projection: scene.current().kind,
        force_mono: config.force_mono,
        stereo: config.stereo_preview,
        offset: Euler::ZERO,
        lang: config.lang.clone(),
        is_loading: false,
        is_fullscreen: false,
        show_fps: false,
        fps: 0.0,
        heading: None,
    };

    if let Some(path) = config.image.clone() {
        ui.is_loading = true;
        start_load_image(path, tx.clone());
    }

    let mut mouse_pressed = false;
    let mut last_mouse_pos: Option<PhysicalPosition<f64>> = None;
    let mut last_tick = Instant::now();
    let mut fps_window_start = Instant::now();
    let mut frame_count = 0u32;

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        match rx.try_recv() {
            Ok(Ok(frame)) => {
                current = frame;
                ui.is_loading = false;
            }
            Ok(Err(err)) => {
                log::error!("{err:#}");
                ui.is_loading = false;
            }
            Err(_) => {}
        }

        match event {
            Event::WindowEvent { event, .. } => {
                let renderer = scene.backend_mut();
                let response = renderer.egui_state.on_event(&renderer.egui_ctx, &event);
                if response.consumed {
                    return;
                }

                match event {
                    WindowEvent::CloseRequested => {
                        scene.teardown();
                        *control_flow = ControlFlow::Exit;
                    }

                    WindowEvent::Resized(new_size) => {
                        scene.backend_mut().resize(new_size);
                        let aspect = scene.backend().view_aspect(ui.stereo);
                        scene.set_viewport_aspect(aspect);
                    }

                    WindowEvent::KeyboardInput { input, .. }
                        if input.state == ElementState::Pressed =>
                    {
                        let action = match input.virtual_keycode {
                            Some(VirtualKeyCode::O) => pick_image().map(UiAction::OpenImage),
                            Some(VirtualKeyCode::R) => Some(UiAction::Recenter),
                            Some(VirtualKeyCode::M) => Some(UiAction::SetForceMono(!scene.force_mono())),
                            Some(VirtualKeyCode::S) => Some(UiAction::SetStereo(!ui.stereo)),
                            Some(VirtualKeyCode::F11) => Some(UiAction::ToggleFullscreen),
                            Some(VirtualKeyCode::Left) => Some(nudge(scene.orientation().offset(), 0.0, OFFSET_STEP)),
                            Some(VirtualKeyCode::Right) => Some(nudge(scene.orientation().offset(), 0.0, -OFFSET_STEP)),
                            Some(VirtualKeyCode::Up) => Some(nudge(scene.orientation().offset(), OFFSET_STEP, 0.0)),
                            Some(VirtualKeyCode::Down) => Some(nudge(scene.orientation().offset(), -OFFSET_STEP, 0.0)),
                            _ => None,
                        };
                        if let Some(action) = action {
                            apply(action, &mut scene, &mut ui, &window, &tx, control_flow);
                        }
                    }

                    WindowEvent::MouseInput { state, button, .. } => {
                        if button == MouseButton::Left {
                            mouse_pressed = state == ElementState::Pressed;
                            if !mouse_pressed {
                                last_mouse_pos = None;
                            }
                        }
                    }

                    WindowEvent::CursorMoved { position, .. } => {
                        if mouse_pressed {
                            if let Some(last_pos) = last_mouse_pos {
                                let dx = (position.x - last_pos.x) as f32;
                                let dy = (position.y - last_pos.y) as f32;
                                let size = scene.backend().size;
                                let fov_y = scene.backend().fov_y;

                                if size.width > 0 && size.height > 0 {
                                    // one pixel of drag moves the content by one pixel
                                    let aspect = size.width as f32 / size.height as f32;
                                    let fov_x = 2.0 * ((fov_y / 2.0).tan() * aspect).atan();
                                    scene.orientation_mut().drag(
                                        dx * fov_x / size.width as f32,
                                        dy * fov_y / size.height as f32,
                                    );
                                }
                            }
                            last_mouse_pos = Some(position);
                        }
                    }

                    WindowEvent::DroppedFile(path) => {
                        apply(UiAction::OpenImage(path), &mut scene, &mut ui, &window, &tx, control_flow);
                    }

                    _ => {}
                }
            }

            Event::RedrawRequested(_) => {
                let now = Instant::now();
                let dt = now.duration_since(last_tick).as_secs_f32();
                last_tick = now;

                frame_count += 1;
                let elapsed = now.duration_since(fps_window_start).as_secs_f32();
                if elapsed >= 1.0 {
                    ui.fps = frame_count as f32 / elapsed;
                    frame_count = 0;
                    fps_window_start = now;
                }

                let plan = match scene.frame(&current, dt, None) {
                    Ok(Some(plan)) => plan,
                    Ok(None) => {
                        *control_flow = ControlFlow::Exit;
                        return;
                    }
                    Err(err) => {
                        log::error!("{err}");
                        *control_flow = ControlFlow::Exit;
                        return;
                    }
                };

                for event in scene.take_events() {
                    match event {
                        ViewerEvent::ProjectionChanged(kind) => ui.projection = kind,
                        ViewerEvent::OrientationChanged(offset) => ui.offset = offset,
                    }
                }
                ui.force_mono = scene.force_mono();
                ui.heading = scene
                    .heading_since_source()
                    .map(|q| q.to_euler(glam::EulerRot::YXZ).0);

                let mut actions = Vec::new();
                let result = scene
                    .backend_mut()
                    .render_with_ui(&window, &plan, |ctx| draw_ui(ctx, &ui, &mut actions));

                match result {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => {
                        let size = scene.backend().size;
                        scene.backend_mut().resize(size);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => *control_flow = ControlFlow::Exit,
                    Err(e) => log::warn!("render error: {e:?}"),
                }

                for action in actions {
                    apply(action, &mut scene, &mut ui, &window, &tx, control_flow);
                }
            }

            Event::MainEventsCleared => {
                window.request_redraw();
            }

            _ => {}
        }
    });
}

fn nudge(offset: Euler, pitch: f32, yaw: f32) -> UiAction {
    UiAction::SetOffset(Euler::new(offset.pitch + pitch, offset.yaw + yaw, offset.roll))
}

fn pick_image() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter(&i18n::tr("file.filter.images"), &IMAGE_EXTENSIONS)
        .pick_file()
}

fn apply(
    action: UiAction,
    scene: &mut SceneGraphManager<Renderer>,
    ui: &mut UiState,
    window: &Window,
    tx: &Sender<LoadResult>,
    control_flow: &mut ControlFlow,
) {
    match action {
        UiAction::OpenImage(path) => {
            ui.is_loading = true;
            start_load_image(path, tx.clone());
        }
        UiAction::SetProjection(kind) => {
            let settings = scene.settings();
            let desc = ProjectionDescriptor::new(kind)
                .with_detail(settings.detail_level)
                .with_radius(settings.radius);
            if let Err(err) = scene.set_projection(desc) {
                log::warn!("{err}");
            }
        }
        UiAction::SetForceMono(enabled) => scene.set_force_mono(enabled),
        UiAction::SetStereo(stereo) => {
            ui.stereo = stereo;
            scene.set_stereo_display(stereo);
            let aspect = scene.backend().view_aspect(stereo);
            scene.set_viewport_aspect(aspect);
        }
        UiAction::SetOffset(offset) => scene.set_orientation_offset(offset),
        UiAction::ResetOffset => scene.reset_orientation_offset(),
        UiAction::Recenter => scene.recenter(),
        UiAction::SetLang(lang) => {
            i18n::init(lang.clone());
            window.set_title(&i18n::tr("app.title"));
            ui.lang = lang;
        }
        UiAction::SetShowFps(show) => ui.show_fps = show,
        UiAction::ToggleFullscreen => {
            ui.is_fullscreen = !ui.is_fullscreen;
            window.set_fullscreen(ui.is_fullscreen.then_some(Fullscreen::Borderless(None)));
        }
        UiAction::Exit => {
            scene.teardown();
            *control_flow = ControlFlow::Exit;
        }
    }
}

fn start_load_image(path: PathBuf, tx: Sender<LoadResult>) {
    thread::spawn(move || {
        log::info!(
            "{}",
            i18n::tr_with("log.loading_image_bg", &[("path", path.display().to_string())])
        );
        let result = StillFrame::open(&path)
            .with_context(|| i18n::tr_with("error.decode_image", &[("path", path.display().to_string())]));
        if tx.send(result).is_err() {
            log::error!("{}", i18n::tr("error.send_to_main_failed"));
        }
    });
}

fn draw_ui(ctx: &egui::Context, ui_state: &UiState, actions: &mut Vec<UiAction>) {
    egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
        egui::menu::bar(ui, |ui| {
            ui.menu_button(i18n::tr("menu.file"), |ui| {
                if ui.button(i18n::tr("menu.open_image")).clicked() {
                    ui.close_menu();
                    if let Some(path) = pick_image() {
                        actions.push(UiAction::OpenImage(path));
                    }
                }
                if ui.button(i18n::tr("menu.exit")).clicked() {
                    actions.push(UiAction::Exit);
                }
            });

            ui.menu_button(i18n::tr("menu.projection"), |ui| {
                let kinds = std::iter::once(ProjectionKind::None).chain(ProjectionKind::BUILDABLE);
                for kind in kinds {
                    if ui
                        .radio(ui_state.projection == kind, kind.as_str())
                        .clicked()
                    {
                        actions.push(UiAction::SetProjection(kind));
                        ui.close_menu();
                    }
                }
            });

            ui.menu_button(i18n::tr("menu.view"), |ui| {
                let mut force_mono = ui_state.force_mono;
                if ui.checkbox(&mut force_mono, i18n::tr("view.force_mono")).clicked() {
                    actions.push(UiAction::SetForceMono(force_mono));
                }
                let mut stereo = ui_state.stereo;
                if ui.checkbox(&mut stereo, i18n::tr("view.stereo_preview")).clicked() {
                    actions.push(UiAction::SetStereo(stereo));
                }
                if ui.button(i18n::tr("view.recenter")).clicked() {
                    actions.push(UiAction::Recenter);
                    ui.close_menu();
                }
                if ui
                    .button(if ui_state.is_fullscreen {
                        i18n::tr("view.fullscreen.exit")
                    } else {
                        i18n::tr("view.fullscreen.enter")
                    })
                    .clicked()
                {
                    actions.push(UiAction::ToggleFullscreen);
                    ui.close_menu();
                }

                ui.separator();
                ui.label(i18n::tr("view.offset"));
                let mut pitch = ui_state.offset.pitch.to_degrees();
                let mut yaw = ui_state.offset.yaw.to_degrees();
                let pitch_changed = ui
                    .add(egui::Slider::new(&mut pitch, -90.0..=90.0).text(i18n::tr("view.pitch")))
                    .changed();
                let yaw_changed = ui
                    .add(egui::Slider::new(&mut yaw, -180.0..=180.0).text(i18n::tr("view.yaw")))
                    .changed();
                if pitch_changed || yaw_changed {
                    actions.push(UiAction::SetOffset(Euler::new(
                        pitch.to_radians(),
                        yaw.to_radians(),
                        ui_state.offset.roll,
                    )));
                }
                if ui.button(i18n::tr("view.reset_offset")).clicked() {
                    actions.push(UiAction::ResetOffset);
                }

                ui.separator();
                let mut show_fps = ui_state.show_fps;
                if ui.checkbox(&mut show_fps, i18n::tr("view.show_fps")).changed() {
                    actions.push(UiAction::SetShowFps(show_fps));
                }
            });

            ui.menu_button(i18n::tr("menu.language"), |ui| {
                for (code, name) in i18n::LANGUAGES {
                    if ui.radio(ui_state.lang == code, name).clicked() {
                        actions.push(UiAction::SetLang(code.to_string()));
                        ui.close_menu();
                    }
                }
            });
        });
    });

    egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if ui_state.is_loading {
                ui.label(
                    egui::RichText::new(i18n::tr("status.loading_image"))
                        .color(egui::Color32::YELLOW),
                );
                ui.label("|");
            }

            ui.label(i18n::tr_with(
                "status.projection",
                &[("kind", ui_state.projection.to_string())],
            ));
            if ui_state.force_mono {
                ui.label("|");
                ui.label(i18n::tr("status.mono"));
            }
            ui.label("|");
            ui.label(format!("Yaw: {:.1}°", ui_state.offset.yaw.to_degrees()));
            ui.label("|");
            ui.label(format!("Pitch: {:.1}°", ui_state.offset.pitch.to_degrees()));
            if let Some(heading) = ui_state.heading {
                ui.label("|");
                ui.label(format!("Turned: {:.1}°", heading.to_degrees()));
            }

            if ui_state.show_fps {
                ui.label("|");
                ui.label(
                    egui::RichText::new(format!("FPS: {:.1}", ui_state.fps))
                        .color(egui::Color32::GREEN),
                );
            }
        });
    });
}
