//! WGPU-based rendering engine for the RSM renderer
//!
//! Owns the device, the surface and every GPU resource of the pass sequence. A frame syncs
//! all uniforms through the queue, records the active frame plan into one command encoder,
//! lets the UI draw on top and submits once.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use wgpu::TextureFormat;

use super::{
    passes::{
        CompositeLoad, CompositeTarget, PassExecutor, PassKind, PassOutputs, PassSchedule,
        PlannedPass, PASS_SEQUENCE,
    },
    pipeline_manager::PipelineManager,
    program::ProgramId,
    render_pass_ext::DrawScene,
    settings::{light_uniforms, LightingSettings},
};
use crate::{
    config::AppConfig,
    error::RenderError,
    gfx::{
        camera::Camera,
        light::SpotLight,
        resources::{
            capture::{self, CaptureError},
            kernels::generate_sample_kernel, DitherPattern, FrameUniforms, MaterialBindings,
            MaterialLibrary, ResourceRegistry, TargetId, TargetSizing,
        },
        scene::Scene,
    },
};

/// Bind group slot of the per-frame globals in every pass
pub const GLOBALS_GROUP: u32 = 0;
/// Slot of a geometry program's parameter block, after object and material
const GEOMETRY_PARAMS_GROUP: u32 = 3;

/// Core rendering engine managing GPU resources and draw calls
///
/// The RenderEngine handles all low-level graphics operations including:
/// - Surface and device management
/// - Program and pipeline creation
/// - Render target allocation and resize
/// - Uniform synchronization
/// - UI overlay rendering
pub struct RenderEngine {
    surface: wgpu::Surface<'static>,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: wgpu::SurfaceConfiguration,
    format: TextureFormat,
    pipeline_manager: PipelineManager,
    registry: ResourceRegistry,
    frame_uniforms: FrameUniforms,
    materials: MaterialBindings,
    schedule: PassSchedule,
    kernel_size: u32,
    dither: DitherPattern,
}

impl RenderEngine {
    /// Creates a new render engine for the given window
    ///
    /// Acquires the device, allocates every render target, uploads the sample kernel and
    /// dither pattern, compiles all programs and validates the frame plans. Any failure is
    /// fatal and returned.
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        app_config: &AppConfig,
    ) -> Result<RenderEngine, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("Using adapter: {:?}", adapter.get_info());

        let border_supported = adapter
            .features()
            .contains(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER);
        let required_features = if border_supported {
            wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER
        } else {
            log::warn!("Clamp-to-border unsupported, RSM reads fall back to clamp-to-edge");
            wgpu::Features::empty()
        };

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("WGPU Device"),
                required_features,
                required_limits: wgpu::Limits {
                    max_texture_dimension_2d: 4096,
                    ..wgpu::Limits::downlevel_defaults()
                },
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;
        let device = Arc::new(device);
        let queue = Arc::new(queue);

        let surface_capabilities = surface.get_capabilities(&adapter);
        let format = surface_capabilities
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_capabilities.formats.first().copied())
            .ok_or(RenderError::UnsupportedSurface)?;
        let alpha_mode = surface_capabilities
            .alpha_modes
            .first()
            .copied()
            .ok_or(RenderError::UnsupportedSurface)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: present_mode(app_config.window.vsync),
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let rsm = &app_config.rsm;
        let sizing = TargetSizing::new((config.width, config.height), rsm.resolution);
        let mut registry = ResourceRegistry::new(&device, sizing, border_supported)?;
        let kernel = generate_sample_kernel(rsm.kernel_size, rsm.kernel_seed);
        registry.upload_static(&device, &queue, &kernel, rsm.dither)?;

        let frame_uniforms = FrameUniforms::new(&device, 1);
        let materials = MaterialBindings::new(&device, &queue, &MaterialLibrary::new());

        let composite = app_config.lighting.composite;
        let schedule = PassSchedule::new(composite)?;
        let composite_format = match composite.target() {
            Some(id) => id.desc().format.format(),
            None => format,
        };

        let mut pipeline_manager = PipelineManager::new(device.clone());
        for program in ProgramId::ALL {
            pipeline_manager.load_program(program.layout())?;
        }
        for descriptor in PASS_SEQUENCE {
            let shared_layouts = match descriptor.kind {
                PassKind::Geometry(_) => vec![
                    frame_uniforms.global_layout(),
                    frame_uniforms.object_layout(),
                    materials.bind_group_layout(),
                ],
                PassKind::Fullscreen => vec![frame_uniforms.global_layout()],
            };
            pipeline_manager.register_pass(
                descriptor,
                &shared_layouts,
                composite_format,
                app_config.handedness,
            )?;
        }
        pipeline_manager.refresh_textures(&registry)?;

        log::info!(
            "Render engine ready: {}x{} {:?}, {} programs, composite {:?}",
            config.width,
            config.height,
            format,
            pipeline_manager.get_stats().loaded_programs,
            composite
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            format,
            pipeline_manager,
            registry,
            frame_uniforms,
            materials,
            schedule,
            kernel_size: rsm.kernel_size,
            dither: rsm.dither,
        })
    }

    /// Creates bindings for the scene's materials
    pub fn prepare_scene(&mut self, scene: &Scene) {
        self.materials
            .rebuild(&self.device, &self.queue, &scene.materials);
    }

    /// Renders one frame of the active lighting mode
    ///
    /// A lost or outdated surface is reconfigured and the frame skipped.
    ///
    /// # Arguments
    /// * `scene` - Meshes drawn by the geometry passes
    /// * `camera` - Camera with an up-to-date view
    /// * `light` - Spot light with an up-to-date view-projection
    /// * `settings` - Indirect lighting tunables
    /// * `ui_callback` - Optional function that renders UI elements over the frame
    pub fn render_frame<F>(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        light: &SpotLight,
        settings: &LightingSettings,
        ui_callback: Option<F>,
    ) -> Result<(), RenderError>
    where
        F: FnOnce(&wgpu::Device, &wgpu::Queue, &mut wgpu::CommandEncoder, &wgpu::TextureView),
    {
        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::info!("Surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(error) => {
                log::warn!("Skipping frame: {}", error);
                return Ok(());
            }
        };

        if settings.dither.enabled() && settings.dither != self.dither {
            self.registry
                .set_dither(&self.device, &self.queue, settings.dither)?;
            self.dither = settings.dither;
        }

        self.sync_uniforms(scene, camera, light, settings);
        self.pipeline_manager.refresh_textures(&self.registry)?;

        let surface_texture_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let plan = self.schedule.plan(settings.mode);
        plan.execute(&mut GpuPassExecutor {
            encoder: &mut encoder,
            surface_view: &surface_texture_view,
            registry: &self.registry,
            pipelines: &self.pipeline_manager,
            uniforms: &self.frame_uniforms,
            materials: &self.materials,
            scene,
        })?;

        if plan.composite() == CompositeTarget::Accumulation {
            // The passes never touch the surface; give the overlay a defined background
            encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Surface Clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_texture_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
        }

        if let Some(ui_callback) = ui_callback {
            ui_callback(
                &self.device,
                &self.queue,
                &mut encoder,
                &surface_texture_view,
            );
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        Ok(())
    }

    /// Queues every uniform write of the frame
    fn sync_uniforms(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        light: &SpotLight,
        settings: &LightingSettings,
    ) {
        self.frame_uniforms
            .sync(&self.device, &self.queue, camera, light, scene.models());
        self.materials.sync(&self.queue, &scene.materials);

        let indirect =
            settings.indirect_uniforms(self.kernel_size, self.registry.sizing().rsm_resolution);
        for (name, value) in light_uniforms(light).into_iter().chain(indirect) {
            for program in ProgramId::ALL {
                self.pipeline_manager.set_uniform(program, name, value);
            }
        }
        self.pipeline_manager.upload_params(&self.queue);
    }

    /// Resizes the surface and reallocates display-sized targets
    ///
    /// Zero dimensions (a minimized window) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Ok(());
        }

        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.registry.on_resize(&self.device, width, height)?;
        Ok(())
    }

    /// Width over height of the display-sized targets
    pub fn aspect(&self) -> f32 {
        self.registry.sizing().aspect()
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Returns the surface texture format
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Number of samples in the uploaded kernel
    pub fn kernel_size(&self) -> u32 {
        self.kernel_size
    }

    /// Reads a color target back and writes it under `dir`, returning the written file
    pub fn save_target(&self, id: TargetId, dir: &Path) -> Result<PathBuf, CaptureError> {
        let stem = capture::file_stem(id).ok_or(CaptureError::Unsupported(id))?;
        let image = capture::read_target(&self.device, &self.queue, &self.registry, id)?;
        image.save(dir, stem)
    }

    pub fn set_vsync(&mut self, enable: bool) {
        self.config.present_mode = present_mode(enable);
        self.surface.configure(&self.device, &self.config);
        log::info!("VSync {}", if enable { "enabled" } else { "disabled" });
    }
}

fn present_mode(vsync: bool) -> wgpu::PresentMode {
    if vsync {
        wgpu::PresentMode::AutoVsync
    } else {
        wgpu::PresentMode::AutoNoVsync
    }
}

/// Records planned passes into the frame's command encoder
struct GpuPassExecutor<'a> {
    encoder: &'a mut wgpu::CommandEncoder,
    surface_view: &'a wgpu::TextureView,
    registry: &'a ResourceRegistry,
    pipelines: &'a PipelineManager,
    uniforms: &'a FrameUniforms,
    materials: &'a MaterialBindings,
    scene: &'a Scene,
}

impl<'a> GpuPassExecutor<'a> {
    fn target_view(&self, id: TargetId) -> Result<&'a wgpu::TextureView, RenderError> {
        self.registry.view(id).ok_or(RenderError::MissingTarget(id))
    }
}

impl PassExecutor for GpuPassExecutor<'_> {
    type Error = RenderError;

    fn execute(
        &mut self,
        pass: &PlannedPass,
        composite: CompositeTarget,
    ) -> Result<(), RenderError> {
        let descriptor = pass.descriptor;
        let pipeline = self
            .pipelines
            .pipeline(descriptor.id)
            .ok_or(RenderError::MissingPipeline(descriptor.id))?;

        let (color_views, depth_view) = match descriptor.outputs {
            PassOutputs::Attachments { color, depth } => {
                let views = color
                    .iter()
                    .map(|&id| {
                        self.target_view(id)
                            .map(|view| (view, wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let depth = depth.map(|id| self.target_view(id)).transpose()?;
                (views, depth)
            }
            PassOutputs::Composite => {
                let view = match composite.target() {
                    Some(id) => self.target_view(id)?,
                    None => self.surface_view,
                };
                let load = match pass.composite {
                    Some(CompositeLoad::Load) => wgpu::LoadOp::Load,
                    _ => wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                };
                (vec![(view, load)], None)
            }
        };

        let color_attachments: Vec<_> = color_views
            .into_iter()
            .map(|(view, load)| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();

        let label = format!("{} Pass", descriptor.id);
        let mut render_pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&label),
            color_attachments: &color_attachments,
            depth_stencil_attachment: depth_view.map(|view| {
                wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(GLOBALS_GROUP, self.uniforms.global_bind_group(), &[]);
        let params = self.pipelines.params_bind_group(descriptor.program);

        match descriptor.kind {
            PassKind::Geometry(_) => {
                if let Some(params) = params {
                    render_pass.set_bind_group(GEOMETRY_PARAMS_GROUP, params, &[]);
                }
                render_pass.draw_scene(self.scene, self.uniforms, self.materials);
            }
            PassKind::Fullscreen => {
                let mut group = GLOBALS_GROUP + 1;
                if let Some(params) = params {
                    render_pass.set_bind_group(group, params, &[]);
                    group += 1;
                }
                match self.pipelines.texture_bind_group(descriptor.program) {
                    Some(textures) => render_pass.set_bind_group(group, textures, &[]),
                    None => log::trace!("{} has no texture bindings", descriptor.id),
                }
                render_pass.draw(0..3, 0..1);
            }
        }

        log::trace!("Recorded {} ({:?})", descriptor.id, pass.composite);
        Ok(())
    }
}
