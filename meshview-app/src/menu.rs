//! egui menu bar and per-viewport overlays

use egui::{Align2, Color32, FontId, Key, KeyboardShortcut, Modifiers, Rect, Stroke};
use meshview_core::{LayoutMode, ViewRect};

pub const OPEN_SHORTCUT: KeyboardShortcut = KeyboardShortcut::new(Modifiers::COMMAND, Key::O);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    OpenFile,
    Quit,
    NewViewport,
    CloseViewport,
    OpenRepository,
    About,
}

/// What one viewport shows in its overlay
#[derive(Debug, Clone)]
pub struct ViewportLabel {
    /// Physical pixels
    pub rect: ViewRect,
    pub active: bool,
    /// `None` for an empty viewport
    pub status: Option<String>,
}

/// Everything the UI needs from the viewer for one frame
#[derive(Debug, Clone)]
pub struct MenuModel {
    pub layout: LayoutMode,
    pub viewports: Vec<ViewportLabel>,
}

#[derive(Debug, Default)]
pub struct MenuOutput {
    pub actions: Vec<MenuAction>,
    /// Space left for viewports below the menu bar, in points
    pub viewport_area: Option<Rect>,
}

pub fn show(ctx: &egui::Context, model: &MenuModel) -> MenuOutput {
    let mut output = MenuOutput::default();

    if ctx.input_mut(|input| input.consume_shortcut(&OPEN_SHORTCUT)) {
        output.actions.push(MenuAction::OpenFile);
    }

    egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
        egui::menu::bar(ui, |ui| {
            ui.menu_button("File", |ui| {
                let open = egui::Button::new("Open File…").shortcut_text(ctx.format_shortcut(&OPEN_SHORTCUT));
                if ui.add(open).clicked() {
                    output.actions.push(MenuAction::OpenFile);
                    ui.close_menu();
                }
                ui.separator();
                if ui.button("Quit").clicked() {
                    output.actions.push(MenuAction::Quit);
                    ui.close_menu();
                }
            });

            if model.layout == LayoutMode::Multi {
                ui.menu_button("View", |ui| {
                    if ui.button("New Viewport").clicked() {
                        output.actions.push(MenuAction::NewViewport);
                        ui.close_menu();
                    }
                    let closable = model.viewports.len() > 1;
                    if ui.add_enabled(closable, egui::Button::new("Close Viewport")).clicked() {
                        output.actions.push(MenuAction::CloseViewport);
                        ui.close_menu();
                    }
                });
            }

            ui.menu_button("Help", |ui| {
                if ui.button("GitHub Repository").clicked() {
                    output.actions.push(MenuAction::OpenRepository);
                    ui.close_menu();
                }
                if ui.button("About").clicked() {
                    output.actions.push(MenuAction::About);
                    ui.close_menu();
                }
            });
        });
    });

    output.viewport_area = Some(ctx.available_rect());
    paint_overlays(ctx, model);
    output
}

fn paint_overlays(ctx: &egui::Context, model: &MenuModel) {
    let painter = ctx.layer_painter(egui::LayerId::new(egui::Order::Background, egui::Id::new("viewport_overlays")));
    let pixels_per_point = ctx.pixels_per_point();
    let multi = model.layout == LayoutMode::Multi;
    let placeholder = placeholder_text(ctx);

    for viewport in &model.viewports {
        let rect = to_points(viewport.rect, pixels_per_point);
        match &viewport.status {
            Some(status) => {
                painter.text(
                    rect.left_bottom() + egui::vec2(8.0, -8.0),
                    Align2::LEFT_BOTTOM,
                    status,
                    FontId::proportional(13.0),
                    Color32::from_gray(200),
                );
            }
            None => {
                painter.text(
                    rect.center(),
                    Align2::CENTER_CENTER,
                    &placeholder,
                    FontId::proportional(16.0),
                    Color32::from_gray(150),
                );
            }
        }

        if multi {
            let color = if viewport.active {
                Color32::from_rgb(90, 140, 220)
            } else {
                Color32::from_gray(60)
            };
            painter.rect_stroke(rect.shrink(0.5), 0.0, Stroke::new(1.0, color));
        }
    }
}

/// Empty viewport hint, naming the open shortcut the way this OS writes it
pub fn placeholder_text(ctx: &egui::Context) -> String {
    format!(
        "No model loaded\nDrop a 3D file here or press {} to open one",
        ctx.format_shortcut(&OPEN_SHORTCUT)
    )
}

/// Physical pixel rectangle to egui points
pub fn to_points(rect: ViewRect, pixels_per_point: f32) -> Rect {
    let scale = if pixels_per_point > 0.0 { pixels_per_point } else { 1.0 };
    Rect::from_min_size(
        egui::pos2(rect.x / scale, rect.y / scale),
        egui::vec2(rect.width / scale, rect.height / scale),
    )
}

/// egui points to a physical pixel rectangle
pub fn to_pixels(rect: Rect, pixels_per_point: f32) -> ViewRect {
    ViewRect::new(
        (rect.min.x * pixels_per_point).round(),
        (rect.min.y * pixels_per_point).round(),
        (rect.width() * pixels_per_point).round(),
        (rect.height() * pixels_per_point).round(),
    )
}

/// "model.obj · 12 triangles · texture wood.png"
pub fn status_line(file_name: &str, triangles: usize, texture: Option<&str>) -> String {
    let mut line = format!("{} · {} triangles", file_name, triangles);
    if let Some(texture) = texture {
        line.push_str(" · texture ");
        line.push_str(texture);
    }
    line
}
