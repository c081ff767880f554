//! Window, event loop and the glue between winit, egui and the viewer

use crate::desktop_renderer::DesktopRenderer;
use crate::instance::{Forwarded, InstanceServer};
use crate::menu::{self, MenuAction, MenuModel, MenuOutput, ViewportLabel};
use crate::notifier::{self, DialogNotifier};
use anyhow::{Context as _, Result};
use instant::Instant;
use meshview_core::{ViewRect, ViewerConfig};
use meshview_gpu::{GpuContext, RenderConfig, SceneRenderer};
use meshview_io::{FormatSet, LoadPipeline, LoaderRegistry};
use meshview_viewer::{LoadTicket, PointerButton, RequestOrigin, RequestTarget, Viewer};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use winit::{
    dpi::LogicalSize,
    event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy, EventLoopWindowTarget},
    window::{Window, WindowBuilder},
};

/// Events delivered to the event loop from outside winit
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Open a file as if chosen from the File menu
    Open(PathBuf),
    /// Background loads finished and are waiting in the pipeline
    LoadsReady,
    /// A later launch handed its arguments over to this window
    SecondLaunch(Forwarded),
}

pub fn run(config: ViewerConfig, file: Option<PathBuf>, mut instance: Option<InstanceServer>) -> Result<()> {
    let event_loop: EventLoop<AppEvent> = EventLoopBuilder::with_user_event()
        .build()
        .context("Failed to create event loop")?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("meshview")
            .with_inner_size(LogicalSize::new(1200.0, 800.0))
            .build(&event_loop)
            .context("Failed to create window")?,
    );

    if let Some(server) = instance.as_mut() {
        let proxy = Mutex::new(event_loop.create_proxy());
        server.serve(move |request| {
            if let Ok(proxy) = proxy.lock() {
                let _ = proxy.send_event(AppEvent::SecondLaunch(request));
            }
        });
    }

    let mut app = App::new(window, event_loop.create_proxy(), config)?;
    if let Some(file) = file {
        app.open(&file, RequestOrigin::LaunchArgument, RequestTarget::Active);
    }

    event_loop.run(move |event, target| {
        target.set_control_flow(ControlFlow::Wait);
        app.handle(event, target);
    })?;
    drop(instance);
    Ok(())
}

struct App {
    window: Arc<Window>,
    viewer: Viewer<DesktopRenderer, DialogNotifier>,
    pipeline: LoadPipeline<LoadTicket>,
    proxy: EventLoopProxy<AppEvent>,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    cursor: (f32, f32),
    // Only the first file of a multi-file drop is opened
    drop_taken: bool,
    // Viewport area and surface size last handed to the viewer
    applied: Option<(ViewRect, u32, u32)>,
    last_frame: Instant,
}

impl App {
    fn new(window: Arc<Window>, proxy: EventLoopProxy<AppEvent>, config: ViewerConfig) -> Result<Self> {
        let size = window.inner_size();
        let (context, surface) = pollster::block_on(GpuContext::with_surface(window.clone()))?;
        let scene = SceneRenderer::new(context, surface, size.width, size.height, RenderConfig::from_viewer(&config))?;

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &*window,
            Some(window.scale_factor() as f32),
            None,
        );

        let area = ViewRect::new(0.0, 0.0, size.width as f32, size.height as f32);
        let viewer = Viewer::new(config, area, DesktopRenderer::new(scene), DialogNotifier);

        let waker = Mutex::new(proxy.clone());
        let pipeline = LoadPipeline::new(LoaderRegistry::with_defaults(viewer.formats()))
            .context("Failed to start loader threads")?
            .with_waker(move || {
                if let Ok(proxy) = waker.lock() {
                    // Fails only once the event loop is gone
                    let _ = proxy.send_event(AppEvent::LoadsReady);
                }
            });

        info!("meshview {} ready", env!("CARGO_PKG_VERSION"));
        Ok(Self {
            window,
            viewer,
            pipeline,
            proxy,
            egui_ctx,
            egui_state,
            cursor: (0.0, 0.0),
            drop_taken: false,
            applied: None,
            last_frame: Instant::now(),
        })
    }

    fn handle(&mut self, event: Event<AppEvent>, target: &EventLoopWindowTarget<AppEvent>) {
        match event {
            Event::UserEvent(AppEvent::Open(path)) => {
                self.open(&path, RequestOrigin::OpenMenu, RequestTarget::Active);
            }
            Event::UserEvent(AppEvent::SecondLaunch(request)) => {
                self.window.set_minimized(false);
                self.window.focus_window();
                if let Some(file) = request.file {
                    self.open(&file, RequestOrigin::LaunchArgument, RequestTarget::Active);
                }
            }
            Event::UserEvent(AppEvent::LoadsReady) => {
                for outcome in self.pipeline.drain() {
                    self.viewer.complete(outcome.ticket, &outcome.path, outcome.result);
                }
                self.window.request_redraw();
            }
            Event::WindowEvent { event, .. } => self.window_event(event, target),
            Event::AboutToWait => self.drop_taken = false,
            _ => {}
        }
    }

    fn window_event(&mut self, event: WindowEvent, target: &EventLoopWindowTarget<AppEvent>) {
        let response = self.egui_state.on_window_event(&self.window, &event);
        if response.repaint {
            self.window.request_redraw();
        }

        match event {
            WindowEvent::CloseRequested => target.exit(),
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => self.window.request_redraw(),
            WindowEvent::RedrawRequested => self.redraw(target),
            WindowEvent::DroppedFile(path) => {
                if !self.drop_taken {
                    self.drop_taken = true;
                    let (x, y) = self.cursor;
                    self.open(&path, RequestOrigin::DragAndDrop, RequestTarget::At { x, y });
                } else {
                    info!("Ignoring extra dropped file {}", path.display());
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x as f32, position.y as f32);
                self.viewer.pointer_move(self.cursor.0, self.cursor.1);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let button = match button {
                    MouseButton::Left => PointerButton::Primary,
                    MouseButton::Right => PointerButton::Secondary,
                    MouseButton::Middle => PointerButton::Middle,
                    _ => return,
                };
                match state {
                    ElementState::Pressed if !response.consumed && !self.egui_ctx.wants_pointer_input() => {
                        self.viewer.pointer_down(button, self.cursor.0, self.cursor.1);
                    }
                    ElementState::Pressed => {}
                    ElementState::Released => self.viewer.pointer_up(),
                }
            }
            WindowEvent::MouseWheel { delta, .. } if !response.consumed => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(position) => position.y as f32 / 100.0,
                };
                self.viewer.scroll(self.cursor.0, self.cursor.1, lines);
            }
            _ => {}
        }
    }

    fn open(&mut self, path: &Path, origin: RequestOrigin, target: RequestTarget) {
        if let Some(job) = self.viewer.request(path, origin, target) {
            self.pipeline.submit(job.ticket, job.kind, job.path);
        }
    }

    fn menu_model(&self) -> MenuModel {
        let layout = self.viewer.layout();
        let active = layout.active();
        MenuModel {
            layout: layout.mode(),
            viewports: layout
                .iter()
                .map(|viewport| ViewportLabel {
                    rect: viewport.rect,
                    active: viewport.id == active,
                    status: self.viewer.status(viewport.id).map(|status| {
                        menu::status_line(&status.file_name, status.triangle_count, status.texture.as_deref())
                    }),
                })
                .collect(),
        }
    }

    fn apply(&mut self, action: MenuAction, target: &EventLoopWindowTarget<AppEvent>) {
        match action {
            MenuAction::OpenFile => {
                if let Some(path) = pick_file(self.viewer.formats()) {
                    if self.proxy.send_event(AppEvent::Open(path)).is_err() {
                        warn!("Event loop closed before the file could be opened");
                    }
                }
            }
            MenuAction::Quit => target.exit(),
            MenuAction::NewViewport => {
                self.viewer.add_viewport();
            }
            MenuAction::CloseViewport => {
                let active = self.viewer.layout().active();
                self.viewer.close_viewport(active);
            }
            MenuAction::OpenRepository => notifier::open_repository(),
            MenuAction::About => notifier::show_about(),
        }
    }

    fn redraw(&mut self, target: &EventLoopWindowTarget<AppEvent>) {
        let size = self.window.inner_size();
        if size.width == 0 || size.height == 0 {
            return;
        }

        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32().min(0.1);
        self.last_frame = now;

        let model = self.menu_model();
        let raw_input = self.egui_state.take_egui_input(&self.window);
        let mut menu_output = MenuOutput::default();
        let full_output = self.egui_ctx.run(raw_input, |ctx| menu_output = menu::show(ctx, &model));
        self.egui_state
            .handle_platform_output(&self.window, full_output.platform_output);

        for action in menu_output.actions {
            self.apply(action, target);
        }

        let pixels_per_point = full_output.pixels_per_point;
        let area = menu_output
            .viewport_area
            .map(|rect| menu::to_pixels(rect, pixels_per_point))
            .unwrap_or_else(|| ViewRect::new(0.0, 0.0, size.width as f32, size.height as f32));
        let wanted = (area, size.width, size.height);
        if self.applied != Some(wanted) {
            self.viewer.resize(area, size.width, size.height);
            self.applied = Some(wanted);
        }

        let primitives = self.egui_ctx.tessellate(full_output.shapes, pixels_per_point);
        self.viewer
            .renderer_mut()
            .set_overlay(primitives, full_output.textures_delta, pixels_per_point);
        self.viewer.frame(dt);
        self.window.request_redraw();
    }
}

/// Native open dialog with one filter per accepted kind of file
fn pick_file(formats: FormatSet) -> Option<PathBuf> {
    let textures = formats.texture_extensions();
    let all: Vec<&str> = formats
        .model_extensions()
        .into_iter()
        .chain(textures.iter().copied())
        .collect();

    let mut dialog = rfd::FileDialog::new()
        .set_title("Open File")
        .add_filter("All supported files", &all)
        .add_filter("OBJ File with MTL", &["obj"])
        .add_filter("FBX File", &["fbx"])
        .add_filter("GLTF File", &["gltf", "glb"]);
    if formats.stl {
        dialog = dialog.add_filter("STL File", &["stl"]);
    }
    dialog.add_filter("Image (Texture) File", textures).pick_file()
}
