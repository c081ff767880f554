//! File intake: where open requests come from and which ones are still wanted
//!
//! Every request draws a fresh generation number. A completed load is applied
//! only if its generation is still the latest one issued for its viewport, so
//! the viewport always ends on the most recently requested file no matter in
//! which order loads finish.

use crate::registry::SessionHandle;
use crate::viewport::ViewportId;
use std::collections::HashMap;
use std::fmt;

/// Where a file path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOrigin {
    /// Command line argument, of this launch or a later one forwarded to it
    LaunchArgument,
    /// File › Open or an "open" event forwarded to the window
    OpenMenu,
    DragAndDrop,
}

impl fmt::Display for RequestOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequestOrigin::LaunchArgument => "launch argument",
            RequestOrigin::OpenMenu => "open menu",
            RequestOrigin::DragAndDrop => "drag and drop",
        })
    }
}

/// Which viewport a request is for
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RequestTarget {
    Active,
    /// The viewport under a window position, falling back to the active one
    At { x: f32, y: f32 },
    Viewport(ViewportId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPurpose {
    Model,
    /// Texture overlay for the session that was current when it was requested
    Texture { session: SessionHandle },
}

/// Identifies one load request for staleness checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub viewport: ViewportId,
    pub generation: u64,
    pub purpose: LoadPurpose,
}

/// Hands out tickets and remembers the latest one per viewport and purpose
#[derive(Debug, Default)]
pub struct IntakeRouter {
    next_generation: u64,
    latest_model: HashMap<ViewportId, u64>,
    latest_texture: HashMap<ViewportId, u64>,
}

impl IntakeRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    pub fn issue_model(&mut self, viewport: ViewportId) -> LoadTicket {
        let generation = self.next();
        self.latest_model.insert(viewport, generation);
        LoadTicket {
            viewport,
            generation,
            purpose: LoadPurpose::Model,
        }
    }

    pub fn issue_texture(&mut self, viewport: ViewportId, session: SessionHandle) -> LoadTicket {
        let generation = self.next();
        self.latest_texture.insert(viewport, generation);
        LoadTicket {
            viewport,
            generation,
            purpose: LoadPurpose::Texture { session },
        }
    }

    /// Whether no newer request of the same purpose was issued for the ticket's
    /// viewport. Session liveness for textures is checked by the caller.
    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        let latest = match ticket.purpose {
            LoadPurpose::Model => &self.latest_model,
            LoadPurpose::Texture { .. } => &self.latest_texture,
        };
        latest.get(&ticket.viewport) == Some(&ticket.generation)
    }

    /// Forget a closed viewport; its pending loads become stale
    pub fn forget(&mut self, viewport: ViewportId) {
        self.latest_model.remove(&viewport);
        self.latest_texture.remove(&viewport);
    }
}
