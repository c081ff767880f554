//! Viewport layout: how the drawable area is split between sessions

use crate::registry::SessionHandle;
use meshview_core::{LayoutMode, ViewRect};
use std::fmt;

/// Stable identity of a viewport, never reused within one layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewportId(u32);

impl ViewportId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ViewportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewport {}", self.0)
    }
}

/// A rectangle of the window hosting at most one session
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub id: ViewportId,
    pub rect: ViewRect,
    pub session: Option<SessionHandle>,
}

#[derive(Debug, Clone)]
pub struct ViewportLayout {
    mode: LayoutMode,
    area: ViewRect,
    viewports: Vec<Viewport>,
    active: ViewportId,
    next_id: u32,
}

impl ViewportLayout {
    /// A layout with a single empty viewport covering `area`
    pub fn new(mode: LayoutMode, area: ViewRect) -> Self {
        let first = ViewportId(0);
        let mut layout = Self {
            mode,
            area,
            viewports: vec![Viewport {
                id: first,
                rect: area,
                session: None,
            }],
            active: first,
            next_id: 1,
        };
        layout.arrange();
        layout
    }

    pub fn mode(&self) -> LayoutMode {
        self.mode
    }

    pub fn area(&self) -> ViewRect {
        self.area
    }

    /// Change the drawable area and re-tile every viewport
    pub fn set_area(&mut self, area: ViewRect) {
        self.area = area;
        self.arrange();
    }

    /// Add an empty viewport. Only the multi layout grows.
    pub fn add(&mut self) -> Option<ViewportId> {
        if self.mode != LayoutMode::Multi {
            return None;
        }
        let id = ViewportId(self.next_id);
        self.next_id += 1;
        self.viewports.push(Viewport {
            id,
            rect: ViewRect::default(),
            session: None,
        });
        self.active = id;
        self.arrange();
        Some(id)
    }

    /// Remove a viewport, returning it so its session can be released. The
    /// last viewport is never removed.
    pub fn close(&mut self, id: ViewportId) -> Option<Viewport> {
        if self.viewports.len() <= 1 {
            return None;
        }
        let index = self.viewports.iter().position(|v| v.id == id)?;
        let removed = self.viewports.remove(index);
        if self.active == id {
            let fallback = index.min(self.viewports.len() - 1);
            self.active = self.viewports[fallback].id;
        }
        self.arrange();
        Some(removed)
    }

    pub fn active(&self) -> ViewportId {
        self.active
    }

    pub fn set_active(&mut self, id: ViewportId) -> bool {
        if self.get(id).is_some() {
            self.active = id;
            true
        } else {
            false
        }
    }

    pub fn get(&self, id: ViewportId) -> Option<&Viewport> {
        self.viewports.iter().find(|v| v.id == id)
    }

    pub fn get_mut(&mut self, id: ViewportId) -> Option<&mut Viewport> {
        self.viewports.iter_mut().find(|v| v.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Viewport> {
        self.viewports.iter()
    }

    pub fn len(&self) -> usize {
        self.viewports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewports.is_empty()
    }

    /// Viewport under a window position
    pub fn viewport_at(&self, x: f32, y: f32) -> Option<ViewportId> {
        self.viewports
            .iter()
            .find(|v| v.rect.contains(x, y))
            .map(|v| v.id)
    }

    /// Near-square grid filled row by row
    fn arrange(&mut self) {
        let count = self.viewports.len().max(1);
        let columns = (count as f32).sqrt().ceil() as usize;
        let rows = count.div_ceil(columns);
        let cell_width = self.area.width / columns as f32;
        let cell_height = self.area.height / rows as f32;

        for (index, viewport) in self.viewports.iter_mut().enumerate() {
            let (row, column) = (index / columns, index % columns);
            viewport.rect = ViewRect::new(
                (self.area.x + column as f32 * cell_width).floor(),
                (self.area.y + row as f32 * cell_height).floor(),
                cell_width.floor(),
                cell_height.floor(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area() -> ViewRect {
        ViewRect::new(0.0, 24.0, 800.0, 600.0)
    }

    #[test]
    fn test_single_layout_never_grows() {
        let mut layout = ViewportLayout::new(LayoutMode::Single, area());
        assert!(layout.add().is_none());
        assert_eq!(layout.len(), 1);
        assert_eq!(layout.iter().next().unwrap().rect, area());
        assert!(layout.close(layout.active()).is_none());
    }

    #[test]
    fn test_multi_layout_tiles_grid() {
        let mut layout = ViewportLayout::new(LayoutMode::Multi, area());
        let second = layout.add().unwrap();
        let third = layout.add().unwrap();
        assert_eq!(layout.active(), third);

        // Three viewports tile as two columns by two rows
        let rects: Vec<_> = layout.iter().map(|v| v.rect).collect();
        assert_eq!(rects[0], ViewRect::new(0.0, 24.0, 400.0, 300.0));
        assert_eq!(rects[1], ViewRect::new(400.0, 24.0, 400.0, 300.0));
        assert_eq!(rects[2], ViewRect::new(0.0, 324.0, 400.0, 300.0));

        assert_eq!(layout.viewport_at(600.0, 100.0), Some(second));
        assert_eq!(layout.viewport_at(100.0, 400.0), Some(third));
        assert_eq!(layout.viewport_at(600.0, 400.0), None);
    }

    #[test]
    fn test_close_moves_active_and_retiles() {
        let mut layout = ViewportLayout::new(LayoutMode::Multi, area());
        let first = layout.active();
        let second = layout.add().unwrap();

        let removed = layout.close(second).unwrap();
        assert_eq!(removed.id, second);
        assert_eq!(layout.active(), first);
        assert_eq!(layout.iter().next().unwrap().rect, area());
        assert!(layout.get(second).is_none());

        // Ids are not reused
        let third = layout.add().unwrap();
        assert_ne!(third, second);
    }

    #[test]
    fn test_resize_retiles() {
        let mut layout = ViewportLayout::new(LayoutMode::Multi, area());
        layout.add();
        layout.set_area(ViewRect::new(0.0, 0.0, 1000.0, 500.0));
        let rects: Vec<_> = layout.iter().map(|v| v.rect).collect();
        assert_eq!(rects[1], ViewRect::new(500.0, 0.0, 500.0, 500.0));
    }
}
