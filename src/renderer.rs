// renderer.rs — wgpu backend: screen surfaces, per-eye views, egui overlay

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context as _};
use glam::{Mat4, Quat};
use image::RgbaImage;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::error::FrameError;
use crate::scene::{RenderPlan, SurfaceBackend, SurfaceId};
use crate::source::FrameSource;
use crate::surface::{Eye, ScreenSurface, TextureRef};

const NEAR: f32 = 0.05;
const FAR: f32 = 1000.0;

/// Pick the first system or bundled font that covers CJK text so translated
/// menus render. egui's built-in fonts are kept as fallback.
fn setup_egui_ui_fonts(ctx: &egui::Context) {
    let mut candidates: Vec<PathBuf> = Vec::new();

    if cfg!(windows) {
        let win_fonts = PathBuf::from(r"C:\Windows\Fonts");
        for f in ["msyh.ttf", "simhei.ttf", "meiryo.ttf", "malgun.ttf", "arialuni.ttf"] {
            candidates.push(win_fonts.join(f));
        }
    } else if cfg!(target_os = "macos") {
        for f in [
            "/System/Library/Fonts/PingFang.ttc",
            "/System/Library/Fonts/Hiragino Sans GB.ttc",
            "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",
        ] {
            candidates.push(PathBuf::from(f));
        }
    } else if cfg!(unix) {
        for f in [
            "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
            "/usr/share/fonts/truetype/noto/NotoSansCJK-Regular.ttc",
            "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
        ] {
            candidates.push(PathBuf::from(f));
        }
    }

    let bundled = ["NotoSansSC-Regular.otf", "NotoSansCJK-Regular.ttc"];
    if let Some(dir) = std::env::current_exe().ok().and_then(|e| e.parent().map(|p| p.to_path_buf())) {
        candidates.extend(bundled.iter().map(|f| dir.join("assets").join(f)));
    }
    candidates.extend(bundled.iter().map(|f| PathBuf::from("assets").join(f)));

    // ab_glyph rejects fonts egui could not rasterize either
    let chosen = candidates.into_iter().find_map(|path| {
        let bytes = std::fs::read(&path).ok()?;
        ab_glyph::FontArc::try_from_vec(bytes.clone()).ok()?;
        Some((path, bytes))
    });

    let Some((font_path, font_bytes)) = chosen else {
        log::info!("{}", crate::i18n::tr("font.not_found"));
        return;
    };
    log::info!(
        "{}",
        crate::i18n::tr_with("font.using", &[("path", font_path.display().to_string())])
    );

    let mut fonts = egui::FontDefinitions::default();
    fonts
        .font_data
        .insert("ui".to_owned(), egui::FontData::from_owned(font_bytes));
    for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
        if let Some(list) = fonts.families.get_mut(&family) {
            list.insert(0, "ui".to_owned());
        }
    }
    ctx.set_fonts(fonts);
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct ScreenVertex {
    position: [f32; 3],
    uv: [f32; 2],
    face_rect: [f32; 4],
}

impl ScreenVertex {
    const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    fn buffer_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::SIZE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // position
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // uv
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                // face_rect
                wgpu::VertexAttribute {
                    offset: 20,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct SurfaceUniform {
    model: [[f32; 4]; 4],
    shader_kind: u32,
    pad: [u32; 3],
}

impl SurfaceUniform {
    fn from_surface(surface: &ScreenSurface) -> Self {
        Self {
            model: surface.transform.matrix().to_cols_array_2d(),
            shader_kind: surface.material.shader.as_u32(),
            pad: [0; 3],
        }
    }
}

struct GpuSurface {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Camera buffer of one eye. Each eye needs its own buffer: writes to a
/// shared one would all land before the single submit.
struct EyeCamera {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct FrameTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
    /// Source texture and frame index currently on the GPU.
    uploaded: Option<(TextureRef, u64)>,
}

impl FrameTexture {
    fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        width: u32,
        height: u32,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            label: Some("frame_texture"),
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
            label: Some("frame_bind_group"),
        });

        Self {
            texture,
            bind_group,
            width,
            height,
            uploaded: None,
        }
    }

    fn write(&self, queue: &wgpu::Queue, pixels: &[u8]) {
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * self.width),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }
}

fn uniform_layout_entry(visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub struct Renderer {
    surface: wgpu::Surface,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pub size: winit::dpi::PhysicalSize<u32>,
    pipeline: wgpu::RenderPipeline,

    surface_layout: wgpu::BindGroupLayout,
    frame_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    frame: FrameTexture,
    eyes: Vec<EyeCamera>,
    surfaces: HashMap<SurfaceId, GpuSurface>,

    /// Vertical field of view, radians.
    pub fov_y: f32,

    // UI
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl Renderer {
    pub async fn new(window: Arc<Window>, fov_y: f32) -> anyhow::Result<Self> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = unsafe { instance.create_surface(window.as_ref()) }
            .context("creating window surface")?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow!("no GPU adapter compatible with the window"))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    features: wgpu::Features::empty(),
                    limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                    label: None,
                },
                None,
            )
            .await
            .context("requesting GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no formats"))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            // stereo halves sit next to each other, never wrap into the other eye
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[uniform_layout_entry(wgpu::ShaderStages::VERTEX)],
            label: Some("camera_layout"),
        });
        let surface_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[uniform_layout_entry(
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            )],
            label: Some("surface_layout"),
        });
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
            label: Some("frame_layout"),
        });

        // grey placeholder until the first frame arrives
        let frame = FrameTexture::new(&device, &frame_layout, &sampler, 2, 2);
        frame.write(&queue, &[48; 16]);

        let eyes = [Eye::Left, Eye::Right]
            .iter()
            .map(|eye| {
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(match eye {
                        Eye::Left => "left_camera",
                        Eye::Right => "right_camera",
                    }),
                    contents: bytemuck::cast_slice(&[CameraUniform {
                        view_proj: Mat4::IDENTITY.to_cols_array_2d(),
                    }]),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                });
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    layout: &camera_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                    label: Some("camera_bind_group"),
                });
                EyeCamera { buffer, bind_group }
            })
            .collect();

        let shader = device.create_shader_module(wgpu::include_wgsl!("shader_screen.wgsl"));
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("screen_pipeline_layout"),
            bind_group_layouts: &[&camera_layout, &surface_layout, &frame_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("screen_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[ScreenVertex::buffer_layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // surfaces are seen from inside, and mirrored by their transforms
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            // one visible surface per eye, nothing to depth sort
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        let egui_ctx = egui::Context::default();
        setup_egui_ui_fonts(&egui_ctx);
        let mut egui_state = egui_winit::State::new(window.as_ref());
        egui_state.set_pixels_per_point(window.scale_factor() as f32);
        let egui_renderer = egui_wgpu::Renderer::new(&device, config.format, None, 1);

        log::info!("renderer ready: {:?}, {:?}", adapter.get_info().backend, surface_format);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            pipeline,
            surface_layout,
            frame_layout,
            sampler,
            frame,
            eyes,
            surfaces: HashMap::new(),
            fov_y,
            egui_ctx,
            egui_state,
            egui_renderer,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Aspect of a single eye view.
    pub fn view_aspect(&self, stereo: bool) -> f32 {
        let width = if stereo {
            self.config.width as f32 / 2.0
        } else {
            self.config.width as f32
        };
        width / self.config.height.max(1) as f32
    }

    fn write_camera(&self, slot: usize, camera: Quat, aspect: f32) {
        let proj = Mat4::perspective_rh(self.fov_y, aspect, NEAR, FAR);
        let view = Mat4::from_quat(camera.conjugate());
        let uniform = CameraUniform {
            view_proj: (proj * view).to_cols_array_2d(),
        };
        self.queue
            .write_buffer(&self.eyes[slot].buffer, 0, bytemuck::cast_slice(&[uniform]));
    }

    pub fn render_with_ui(
        &mut self,
        window: &Window,
        plan: &RenderPlan,
        run_ui: impl FnOnce(&egui::Context),
    ) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let views = plan.views.len().max(1) as f32;
        let eye_width = self.config.width as f32 / views;
        let aspect = self.view_aspect(plan.views.len() > 1);
        for (slot, eye_view) in plan.views.iter().enumerate().take(self.eyes.len()) {
            self.write_camera(slot, eye_view.camera, aspect);
        }

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Screen Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(2, &self.frame.bind_group, &[]);

            for (slot, eye_view) in plan.views.iter().enumerate().take(self.eyes.len()) {
                render_pass.set_viewport(
                    slot as f32 * eye_width,
                    0.0,
                    eye_width,
                    self.config.height as f32,
                    0.0,
                    1.0,
                );
                render_pass.set_bind_group(0, &self.eyes[slot].bind_group, &[]);

                for id in &eye_view.surfaces {
                    let Some(gpu) = self.surfaces.get(id) else {
                        continue;
                    };
                    render_pass.set_bind_group(1, &gpu.bind_group, &[]);
                    render_pass.set_vertex_buffer(0, gpu.vertex_buffer.slice(..));
                    render_pass
                        .set_index_buffer(gpu.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(0..gpu.index_count, 0, 0..1);
                }
            }
        }

        let raw_input = self.egui_state.take_egui_input(window);
        let full_output = self.egui_ctx.run(raw_input, run_ui);

        self.egui_state
            .handle_platform_output(window, &self.egui_ctx, full_output.platform_output);
        let clipped_primitives = self.egui_ctx.tessellate(full_output.shapes);

        let screen_descriptor = egui_wgpu::renderer::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: window.scale_factor() as f32,
        };

        for (id, delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, delta);
        }
        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &clipped_primitives,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });
            self.egui_renderer
                .render(&mut render_pass, &clipped_primitives, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

impl SurfaceBackend for Renderer {
    fn attach(&mut self, id: SurfaceId, surface: &ScreenSurface) {
        let mesh = &surface.geometry;
        let vertices: Vec<ScreenVertex> = mesh
            .positions
            .iter()
            .zip(&mesh.uvs)
            .zip(&mesh.face_rects)
            .map(|((&position, &uv), &face_rect)| ScreenVertex {
                position,
                uv,
                face_rect,
            })
            .collect();

        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("screen_vertices"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("screen_indices"),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("screen_uniform"),
                contents: bytemuck::cast_slice(&[SurfaceUniform::from_surface(surface)]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.surface_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("screen_bind_group"),
        });

        log::debug!(
            "attached surface {} ({:?}, {} vertices)",
            id.0,
            surface.role,
            vertices.len()
        );
        self.surfaces.insert(
            id,
            GpuSurface {
                vertex_buffer,
                index_buffer,
                index_count: mesh.indices.len() as u32,
                uniform_buffer,
                bind_group,
            },
        );
    }

    fn update(&mut self, id: SurfaceId, surface: &ScreenSurface) {
        if let Some(gpu) = self.surfaces.get(&id) {
            self.queue.write_buffer(
                &gpu.uniform_buffer,
                0,
                bytemuck::cast_slice(&[SurfaceUniform::from_surface(surface)]),
            );
        }
    }

    fn dispose(&mut self, id: SurfaceId) {
        if let Some(gpu) = self.surfaces.remove(&id) {
            gpu.vertex_buffer.destroy();
            gpu.index_buffer.destroy();
            gpu.uniform_buffer.destroy();
            log::debug!("disposed surface {}", id.0);
        }
    }

    fn upload_frame(&mut self, source: &dyn FrameSource) -> Result<(), FrameError> {
        let key = (source.texture(), source.frame_index());
        if self.frame.uploaded == Some(key) {
            return Ok(());
        }

        let pixels = source.pixels()?;
        let (src_w, src_h) = source.dimensions();
        let max = self.device.limits().max_texture_dimension_2d;

        let scaled;
        let (data, width, height) = if src_w > max || src_h > max {
            let scale = max as f32 / src_w.max(src_h) as f32;
            let (new_w, new_h) = (
                ((src_w as f32 * scale) as u32).max(1),
                ((src_h as f32 * scale) as u32).max(1),
            );
            log::warn!(
                "{}",
                crate::i18n::tr_with(
                    "gpu.image_too_large_scaled",
                    &[
                        ("src_w", src_w.to_string()),
                        ("src_h", src_h.to_string()),
                        ("max", max.to_string()),
                        ("new_w", new_w.to_string()),
                        ("new_h", new_h.to_string()),
                    ]
                )
            );
            let image = RgbaImage::from_raw(src_w, src_h, pixels.to_vec()).ok_or(
                FrameError::SizeMismatch {
                    expected: src_w as usize * src_h as usize * 4,
                    actual: pixels.len(),
                },
            )?;
            scaled = image::imageops::resize(
                &image,
                new_w,
                new_h,
                image::imageops::FilterType::Lanczos3,
            );
            (scaled.as_raw().as_slice(), new_w, new_h)
        } else {
            (pixels, src_w, src_h)
        };

        if (width, height) != (self.frame.width, self.frame.height) {
            self.frame =
                FrameTexture::new(&self.device, &self.frame_layout, &self.sampler, width, height);
        }
        self.frame.write(&self.queue, data);
        self.frame.uploaded = Some(key);
        Ok(())
    }
}
