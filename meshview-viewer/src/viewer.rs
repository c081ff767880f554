//! The viewer: routes file requests, owns sessions and drives the render loop
//!
//! Nothing here touches a window system. The desktop shell feeds input and
//! load completions in and supplies a [`Renderer`] and a [`Notifier`].

use crate::controls::PointerButton;
use crate::intake::{IntakeRouter, LoadPurpose, LoadTicket, RequestOrigin, RequestTarget};
use crate::registry::{SessionHandle, SessionRegistry};
use crate::session::{SceneSession, SessionStatus};
use crate::viewport::{Viewport, ViewportId, ViewportLayout};
use meshview_core::{DrawView, Scene, ViewRect, ViewerConfig};
use meshview_io::{Asset, FileKind, FormatSet, LoadError};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// GPU side of the viewer. Scenes are uploaded once per session and drawn
/// by key every frame.
pub trait Renderer {
    /// Upload a session's scene, replacing anything stored under `key`
    fn upload(&mut self, key: u64, scene: &Scene) -> meshview_core::Result<()>;

    /// Drop everything stored under `key`
    fn release(&mut self, key: u64);

    /// Resize the output surface, in physical pixels
    fn resize(&mut self, width: u32, height: u32);

    /// Draw one frame. An empty `views` still clears the output.
    fn draw(&mut self, views: &[DrawView]) -> meshview_core::Result<()>;
}

/// Shows user-facing alerts
pub trait Notifier {
    fn alert(&mut self, message: &str);
}

/// A load the shell should run in the background and hand back to
/// [`Viewer::complete`]
#[derive(Debug, Clone, PartialEq)]
pub struct LoadJob {
    pub ticket: LoadTicket,
    pub kind: FileKind,
    pub path: PathBuf,
}

/// What happened to a completed load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// A new session replaced the viewport's contents
    Attached(SessionHandle),
    /// A texture was applied to a live session
    Textured(SessionHandle),
    /// Superseded by a newer request; nothing changed
    Stale,
    /// The load failed and the user was alerted; nothing changed
    Failed,
}

pub struct Viewer<R: Renderer, N: Notifier> {
    config: ViewerConfig,
    formats: FormatSet,
    layout: ViewportLayout,
    sessions: SessionRegistry,
    intake: IntakeRouter,
    renderer: R,
    notifier: N,
    drag: Option<ViewportId>,
}

impl<R: Renderer, N: Notifier> Viewer<R, N> {
    /// Create a viewer drawing into `area` with one empty viewport
    pub fn new(config: ViewerConfig, area: ViewRect, renderer: R, notifier: N) -> Self {
        Self {
            formats: FormatSet::new(config.enable_stl),
            layout: ViewportLayout::new(config.layout, area),
            config,
            sessions: SessionRegistry::new(),
            intake: IntakeRouter::new(),
            renderer,
            notifier,
            drag: None,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn formats(&self) -> FormatSet {
        self.formats
    }

    pub fn layout(&self) -> &ViewportLayout {
        &self.layout
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Live session shown in `viewport`
    pub fn session(&self, viewport: ViewportId) -> Option<&SceneSession> {
        let handle = self.layout.get(viewport)?.session?;
        self.sessions.get(handle)
    }

    pub fn status(&self, viewport: ViewportId) -> Option<&SessionStatus> {
        self.session(viewport).map(|session| &session.status)
    }

    /// Viewports that have nothing loaded yet
    pub fn empty_viewports(&self) -> impl Iterator<Item = &Viewport> {
        self.layout
            .iter()
            .filter(|viewport| viewport.session.map_or(true, |h| !self.sessions.contains(h)))
    }

    /// Route a file path into a load job.
    ///
    /// Empty paths are ignored. Unsupported extensions and textures with no
    /// model to apply them to raise an alert and change nothing.
    pub fn request(&mut self, path: &Path, origin: RequestOrigin, target: RequestTarget) -> Option<LoadJob> {
        if path.as_os_str().is_empty() {
            debug!("Ignoring empty path from {}", origin);
            return None;
        }

        let kind = match self.formats.classify(&path.to_string_lossy()) {
            Ok(kind) => kind,
            Err(err) => {
                warn!("Rejected {} from {}: {}", path.display(), origin, err);
                self.notifier.alert(&err.to_string());
                return None;
            }
        };

        let viewport = self.resolve(target);
        self.layout.set_active(viewport);

        let ticket = if kind.is_model() {
            self.intake.issue_model(viewport)
        } else {
            let current = self
                .layout
                .get(viewport)
                .and_then(|v| v.session)
                .filter(|handle| self.sessions.contains(*handle));
            match current {
                Some(session) => self.intake.issue_texture(viewport, session),
                None => {
                    warn!("Texture {} requested with no model in {}", path.display(), viewport);
                    self.notifier.alert(&LoadError::TextureBeforeModel.to_string());
                    return None;
                }
            }
        };

        info!("Requested {} from {} for {}", path.display(), origin, viewport);
        Some(LoadJob {
            ticket,
            kind,
            path: path.to_path_buf(),
        })
    }

    fn resolve(&self, target: RequestTarget) -> ViewportId {
        match target {
            RequestTarget::Active => self.layout.active(),
            RequestTarget::At { x, y } => self.layout.viewport_at(x, y).unwrap_or_else(|| self.layout.active()),
            RequestTarget::Viewport(id) if self.layout.get(id).is_some() => id,
            RequestTarget::Viewport(_) => self.layout.active(),
        }
    }

    /// Apply a finished load if it is still wanted
    pub fn complete(&mut self, ticket: LoadTicket, path: &Path, result: Result<Asset, LoadError>) -> Completion {
        if !self.intake.is_current(&ticket) {
            debug!("Discarding stale result for {}", path.display());
            return Completion::Stale;
        }

        match ticket.purpose {
            LoadPurpose::Model => match result {
                Ok(Asset::Model(object)) => self.attach(ticket.viewport, object, path),
                Ok(Asset::Texture(_)) => {
                    warn!("Model request for {} produced a texture", path.display());
                    Completion::Stale
                }
                Err(err) => self.fail(err),
            },
            LoadPurpose::Texture { session } => {
                let still_shown = self.layout.get(ticket.viewport).and_then(|v| v.session) == Some(session);
                if !still_shown || !self.sessions.contains(session) {
                    debug!("Discarding texture {} for a replaced session", path.display());
                    return Completion::Stale;
                }
                match result {
                    Ok(Asset::Texture(texture)) => {
                        let file_name = display_name(path);
                        if let Some(live) = self.sessions.get_mut(session) {
                            live.apply_texture(&texture, &file_name);
                            info!("Applied texture {} to {}", file_name, ticket.viewport);
                        }
                        self.upload(session);
                        self.draw();
                        Completion::Textured(session)
                    }
                    Ok(Asset::Model(_)) => {
                        warn!("Texture request for {} produced a model", path.display());
                        Completion::Stale
                    }
                    Err(err) => self.fail(err),
                }
            }
        }
    }

    fn fail(&mut self, err: LoadError) -> Completion {
        error!("{}", err);
        self.notifier.alert(&err.to_string());
        Completion::Failed
    }

    /// Replace whatever `viewport` shows with a new session around `object`
    fn attach(&mut self, viewport: ViewportId, object: meshview_core::SceneNode, path: &Path) -> Completion {
        let Some(rect) = self.layout.get(viewport).map(|v| v.rect) else {
            return Completion::Stale;
        };

        if let Some(previous) = self.layout.get_mut(viewport).and_then(|v| v.session.take()) {
            self.release_session(previous);
        }

        let session = SceneSession::attach(object, viewport, rect, &self.config, &display_name(path));
        let handle = self.sessions.insert(session);
        if let Some(slot) = self.layout.get_mut(viewport) {
            slot.session = Some(handle);
        }

        self.upload(handle);
        // First visible frame is already framed
        self.draw();
        Completion::Attached(handle)
    }

    fn upload(&mut self, handle: SessionHandle) {
        if let Some(session) = self.sessions.get(handle) {
            if let Err(err) = self.renderer.upload(handle.key(), &session.scene) {
                error!("Failed to upload scene for {}: {}", session.status.file_name, err);
            }
        }
    }

    fn release_session(&mut self, handle: SessionHandle) {
        if let Some(session) = self.sessions.release(handle) {
            debug!("Released session for {}", session.status.file_name);
        }
        self.renderer.release(handle.key());
    }

    /// One tick of the render loop: advance every session's controls by `dt`
    /// seconds, then draw all of them
    pub fn frame(&mut self, dt: f32) {
        for viewport in self.layout.iter() {
            if let Some(session) = viewport.session.and_then(|h| self.sessions.get_mut(h)) {
                session.advance(dt);
            }
        }
        self.draw();
    }

    fn draw(&mut self) {
        let views: Vec<DrawView> = self
            .layout
            .iter()
            .filter(|viewport| !viewport.rect.is_empty())
            .filter_map(|viewport| {
                let handle = viewport.session?;
                let session = self.sessions.get(handle)?;
                Some(session.draw_view(handle.key(), viewport.rect))
            })
            .collect();

        if let Err(err) = self.renderer.draw(&views) {
            warn!("Frame skipped: {}", err);
        }
    }

    /// Follow a window resize: `area` is the part of the window the viewports
    /// share, `width` and `height` the full surface size
    pub fn resize(&mut self, area: ViewRect, width: u32, height: u32) {
        self.layout.set_area(area);
        self.sync_aspects();
        self.renderer.resize(width, height);
    }

    fn sync_aspects(&mut self) {
        for viewport in self.layout.iter() {
            if let Some(session) = viewport.session.and_then(|h| self.sessions.get_mut(h)) {
                session.resize(viewport.rect);
            }
        }
    }

    /// Add an empty viewport in the multi layout
    pub fn add_viewport(&mut self) -> Option<ViewportId> {
        let id = self.layout.add()?;
        self.sync_aspects();
        info!("Opened {}", id);
        Some(id)
    }

    /// Close a viewport and release its session. The last viewport stays.
    pub fn close_viewport(&mut self, id: ViewportId) -> bool {
        let Some(removed) = self.layout.close(id) else {
            return false;
        };
        if let Some(handle) = removed.session {
            self.release_session(handle);
        }
        self.intake.forget(id);
        if self.drag == Some(id) {
            self.drag = None;
        }
        self.sync_aspects();
        info!("Closed {}", id);
        true
    }

    pub fn pointer_down(&mut self, button: PointerButton, x: f32, y: f32) {
        let Some(id) = self.layout.viewport_at(x, y) else {
            return;
        };
        self.layout.set_active(id);
        self.drag = Some(id);
        if let Some(session) = self.session_in(id) {
            session.controls.pointer_down(button, x, y);
        }
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        let Some(id) = self.drag else {
            return;
        };
        let height = self.layout.get(id).map_or(1.0, |v| v.rect.height);
        if let Some(session) = self.session_in(id) {
            session.controls.pointer_move(x, y, height, &session.camera);
        }
    }

    pub fn pointer_up(&mut self) {
        if let Some(id) = self.drag.take() {
            if let Some(session) = self.session_in(id) {
                session.controls.pointer_up();
            }
        }
    }

    /// Wheel input over a window position; positive lines zoom in
    pub fn scroll(&mut self, x: f32, y: f32, lines: f32) {
        let Some(id) = self.layout.viewport_at(x, y) else {
            return;
        };
        if let Some(session) = self.session_in(id) {
            session.controls.scroll(lines);
        }
    }

    fn session_in(&mut self, id: ViewportId) -> Option<&mut SceneSession> {
        let handle = self.layout.get(id)?.session?;
        self.sessions.get_mut(handle)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
