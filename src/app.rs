use anyhow::Context;
use std::{path::Path, sync::Arc, time::Instant};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowAttributes, WindowId},
};

use crate::{
    config::AppConfig,
    gfx::{
        camera::{Camera, CameraController, ControllerAction, TransformArena},
        light::SpotLight,
        rendering::{LightingSettings, RenderEngine},
        scene::Scene,
    },
    ui::{tunables_panel, PanelChanges, Tunables, UiManager},
};

/// Frame callback type used when no overlay is drawn
type NoUi = fn(&wgpu::Device, &wgpu::Queue, &mut wgpu::CommandEncoder, &wgpu::TextureView);

pub struct BounceApp {
    event_loop: Option<EventLoop<()>>,
    app_state: AppState,
}

struct AppState {
    config: AppConfig,
    window: Option<Arc<Window>>,
    render_engine: Option<RenderEngine>,
    ui_manager: Option<UiManager>,
    scene: Scene,
    camera: Camera,
    transforms: TransformArena,
    controller: CameraController,
    light: SpotLight,
    settings: LightingSettings,
    vsync: bool,
    last_frame: Instant,
    error: Option<anyhow::Error>,
}

impl BounceApp {
    /// Creates the application; the window and GPU state are built once the loop resumes
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        config.validate().context("Invalid configuration")?;
        let event_loop = EventLoop::new().context("Failed to create event loop")?;

        let aspect = config.window.width as f32 / config.window.height.max(1) as f32;
        let camera = Camera::flythrough(&config.camera, aspect, config.handedness);
        let controller = CameraController::new(&config.camera, config.handedness);
        let light = SpotLight::new(&config.light);
        let settings = LightingSettings::from_config(&config);
        let vsync = config.window.vsync;

        Ok(Self {
            event_loop: Some(event_loop),
            app_state: AppState {
                config,
                window: None,
                render_engine: None,
                ui_manager: None,
                scene: Scene::new(),
                camera,
                transforms: TransformArena::new(),
                controller,
                light,
                settings,
                vsync,
                last_frame: Instant::now(),
                error: None,
            },
        })
    }

    /// Runs the event loop until the window closes or a fatal error occurs
    pub fn run(mut self) -> anyhow::Result<()> {
        let event_loop = self
            .event_loop
            .take()
            .context("Event loop already consumed")?;
        event_loop.set_control_flow(ControlFlow::Poll);

        event_loop
            .run_app(&mut self.app_state)
            .context("Failed to run event loop")?;

        match self.app_state.error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl AppState {
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        self.error = Some(error);
        event_loop.exit();
    }

    fn init_gpu(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window_config = &self.config.window;
        let window = event_loop
            .create_window(
                WindowAttributes::default()
                    .with_title(window_config.title.clone())
                    .with_inner_size(PhysicalSize::new(window_config.width, window_config.height))
                    .with_resizable(window_config.resizable),
            )
            .context("Failed to create window")?;
        let window = Arc::new(window);
        self.window = Some(window.clone());

        let (width, height) = window.inner_size().into();
        let config = &self.config;
        let mut renderer = pollster::block_on(RenderEngine::new(
            window.clone(),
            width,
            height,
            config,
        ))?;

        self.scene = Scene::load_obj(renderer.device(), &config.scene.path, config.scene.scale)?;
        renderer.prepare_scene(&self.scene);

        self.ui_manager = Some(UiManager::new(
            renderer.device(),
            renderer.queue(),
            renderer.surface_format(),
            &window,
        ));
        self.camera.set_aspect(renderer.aspect());
        self.render_engine = Some(renderer);
        self.last_frame = Instant::now();
        Ok(())
    }

    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32();
        self.last_frame = now;

        let intent = self.controller.take_intent();
        self.camera.integrate(dt, &intent);
        self.camera.update(&self.transforms);
        self.scene.update_transforms();
        self.light.follow_camera(&self.camera);

        let AppState {
            config,
            window,
            render_engine,
            ui_manager,
            scene,
            camera,
            light,
            settings,
            vsync,
            ..
        } = self;
        let (Some(window), Some(engine)) = (window.as_ref(), render_engine.as_mut()) else {
            return;
        };

        // The panel edits the live values; the frame renders with this snapshot
        let frame_light = light.clone();
        let frame_settings = *settings;
        let kernel_size = engine.kernel_size();
        let mut materials = scene.materials.clone();
        let mut changes = PanelChanges::default();

        let result = match ui_manager.as_mut() {
            Some(ui) => engine.render_frame(
                scene,
                camera,
                &frame_light,
                &frame_settings,
                Some(
                    |device: &wgpu::Device,
                     queue: &wgpu::Queue,
                     encoder: &mut wgpu::CommandEncoder,
                     view: &wgpu::TextureView| {
                        ui.draw(device, queue, encoder, window, view, |frame_ui| {
                            changes = tunables_panel(
                                frame_ui,
                                Tunables {
                                    light,
                                    settings,
                                    materials: &mut materials,
                                    kernel_size,
                                    vsync,
                                },
                            );
                        });
                    },
                ),
            ),
            None => engine.render_frame::<NoUi>(scene, camera, &frame_light, &frame_settings, None),
        };

        if changes.materials {
            scene.materials = materials;
        }
        if changes.vsync {
            engine.set_vsync(*vsync);
        }
        if let Some(target) = changes.save {
            let dir = Path::new(&config.capture.directory);
            match engine.save_target(target, dir) {
                Ok(path) => log::info!("Saved {:?} to {}", target, path.display()),
                Err(e) => log::error!("Failed to save {:?}: {}", target, e),
            }
        }

        if let Err(e) = result {
            self.fail(event_loop, anyhow::Error::new(e).context("Failed to render frame"));
        }
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        if let Err(e) = self.init_gpu(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.render_engine.is_none() {
            return;
        }
        let Some(window) = self.window.clone() else {
            return;
        };

        // Handle UI input first
        let captured = match self.ui_manager.as_mut() {
            Some(ui_manager) => ui_manager.handle_window_event(&window, window_id, &event),
            None => false,
        };

        match event {
            WindowEvent::KeyboardInput { event, .. } if !captured => {
                match self.controller.process_keyed_events(&event) {
                    Some(ControllerAction::TogglePanel) => {
                        if let Some(ui_manager) = self.ui_manager.as_mut() {
                            ui_manager.toggle_visible();
                        }
                    }
                    Some(ControllerAction::Quit) => event_loop.exit(),
                    None => (),
                }
            }
            WindowEvent::MouseInput { state, button, .. } if !captured => {
                self.controller.process_mouse_button(button, state);
            }
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                let Some(engine) = self.render_engine.as_mut() else {
                    return;
                };
                if let Err(e) = engine.resize(width, height) {
                    self.fail(event_loop, anyhow::Error::new(e).context("Failed to resize"));
                    return;
                }
                self.camera.set_aspect(engine.aspect());
            }
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                self.frame(event_loop);
            }
            _ => (),
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        // Don't process camera events when UI is active
        if let Some(ui_manager) = self.ui_manager.as_ref() {
            if ui_manager.wants_input() {
                return;
            }
        }

        self.controller.process_events(&event);
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}
