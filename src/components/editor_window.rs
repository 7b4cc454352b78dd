use std::time::{Duration, Instant};

use egui::{self, Color32, Rect, Sense, Stroke, Vec2};

use crate::components::editor::{EditSession, EditTool, PALETTE};
use crate::grid::{PixelGrid, Quilt};
use crate::log_warn;

// ============================================================================
// EDITOR WINDOW: modal view over one EditSession
// ============================================================================

/// What the window wants the app to do after this frame.
pub enum EditorAction {
    Keep,
    Save,
    Cancel,
}

pub struct EditorWindow {
    session: EditSession,
    last_hover: Option<(usize, usize)>,
    /// Mouse is down and painting with the draw tool.
    painting: bool,
}

impl EditorWindow {
    pub fn new(session: EditSession) -> Self {
        Self {
            session,
            last_hover: None,
            painting: false,
        }
    }

    /// Square index and finished pixels.
    pub fn save(self) -> (usize, PixelGrid) {
        let index = self.session.index();
        (index, self.session.save())
    }

    pub fn close(self) {
        self.session.close();
    }

    /// Ctrl/Cmd+Z while the editor is open.
    pub fn undo(&mut self) {
        self.session.local_undo();
        self.last_hover = None;
    }

    pub fn show(&mut self, ctx: &egui::Context, quilt: &Quilt, now: Instant) -> EditorAction {
        let mut open = true;
        let mut action = EditorAction::Keep;
        let title = format!("Square {}", self.session.index() + 1);

        egui::Window::new(title)
            .id(egui::Id::new("square_editor"))
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, Vec2::ZERO)
            .open(&mut open)
            .show(ctx, |ui| {
                self.toolbar(ui);
                ui.add_space(6.0);
                self.canvas(ui, quilt, now);
                ui.add_space(6.0);
                self.palette(ui);
                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    if ui.button("Save").clicked() {
                        action = EditorAction::Save;
                    }
                    if ui.button("Cancel").clicked() {
                        action = EditorAction::Cancel;
                    }
                    if self.session.seam_matches() > 0 {
                        ui.weak(format!("Seams matched: {}", self.session.seam_matches()));
                    }
                });
            });

        if !open || ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            action = EditorAction::Cancel;
        }

        // Keep frames coming while a stroke can still time out or a flash fades
        if self.session.in_stroke(now) {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
        if self.session.is_flashing(now) {
            ctx.request_repaint_after(Duration::from_millis(16));
        }
        action
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            for tool in [EditTool::Draw, EditTool::Bucket] {
                if ui
                    .selectable_label(self.session.tool == tool, tool.label())
                    .clicked()
                {
                    self.session.tool = tool;
                    self.session.clear_hover();
                    self.last_hover = None;
                }
            }
            ui.separator();
            if ui.button("⟲").on_hover_text("Rotate left").clicked() {
                self.session.rotate_counter_clockwise();
            }
            if ui.button("⟳").on_hover_text("Rotate right").clicked() {
                self.session.rotate_clockwise();
            }
            if ui.button("Clear").clicked() {
                self.session.clear();
            }
            if ui
                .add_enabled(self.session.can_undo(), egui::Button::new("Undo"))
                .clicked()
            {
                self.undo();
            }
        });
    }

    fn palette(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            for color in PALETTE {
                let (rect, resp) = ui.allocate_exact_size(Vec2::splat(28.0), Sense::click());
                let p = ui.painter();
                p.rect_filled(rect, 4.0, color.to_color32());
                let selected = self.session.color == color;
                let border = if selected {
                    Stroke::new(2.5, ui.visuals().strong_text_color())
                } else {
                    Stroke::new(1.0, Color32::from_black_alpha(60))
                };
                p.rect_stroke(rect, 4.0, border);
                if resp.on_hover_text(color.to_hex()).clicked() {
                    self.session.color = color;
                    self.session.clear_hover();
                    self.last_hover = None;
                }
            }
        });
    }

    fn canvas(&mut self, ui: &mut egui::Ui, quilt: &Quilt, now: Instant) {
        let halo = match self.session.halo(quilt) {
            Ok(h) => h,
            Err(e) => {
                log_warn!("Cannot build halo for square {}: {}", self.session.index(), e);
                ui.label("This square no longer fits the quilt.");
                return;
            }
        };

        let side = halo.side() as f32;
        let extent = ui.available_width().clamp(240.0, 480.0);
        let cell = (extent / side).floor().max(4.0);
        let (rect, resp) =
            ui.allocate_exact_size(Vec2::splat(cell * side), Sense::click_and_drag());

        let cell_at = |pos: egui::Pos2| -> Option<(usize, usize)> {
            if !rect.contains(pos) {
                return None;
            }
            let local = pos - rect.min;
            let col = (local.x / cell) as usize;
            let row = (local.y / cell) as usize;
            halo.editable_at(row, col)
        };

        // -- Input ------------------------------------------------------
        let hovered = resp.hover_pos().and_then(cell_at);
        if hovered != self.last_hover {
            self.last_hover = hovered;
            match hovered {
                Some((r, c)) => {
                    if let Err(e) = self.session.hover(r, c) {
                        log_warn!("Hover at ({}, {}) ignored: {}", r, c, e);
                    }
                }
                None => self.session.clear_hover(),
            }
        }

        match self.session.tool {
            EditTool::Draw => {
                let down = resp.is_pointer_button_down_on() || resp.dragged();
                if down {
                    let target = resp.interact_pointer_pos().and_then(cell_at);
                    if let Some((r, c)) = target {
                        let color = self.session.color;
                        let changed = self.session.working().get(r, c).ok() != Some(color);
                        if changed || !self.painting {
                            if let Err(e) = self.session.draw(r, c, color, now) {
                                log_warn!("Draw at ({}, {}) ignored: {}", r, c, e);
                            } else if let Err(e) = self.session.check_seams(quilt, r, c) {
                                log_warn!("Seam check at ({}, {}) failed: {}", r, c, e);
                            }
                        }
                    }
                    self.painting = true;
                } else if self.painting {
                    self.painting = false;
                    self.session.end_stroke();
                }
            }
            EditTool::Bucket => {
                if resp.clicked()
                    && let Some((r, c)) = resp.interact_pointer_pos().and_then(cell_at)
                {
                    let color = self.session.color;
                    if let Err(e) = self.session.bucket_fill(r, c, color, now) {
                        log_warn!("Fill at ({}, {}) ignored: {}", r, c, e);
                    }
                    self.last_hover = None;
                }
            }
        }

        // -- Paint ------------------------------------------------------
        // Rebuild after input so this frame shows the new pixels
        let halo = self.session.halo(quilt).unwrap_or(halo);
        let painter = ui.painter_at(rect);
        let preview = self.session.hover_preview();
        let preview_tint = {
            let c = self.session.color.to_color32();
            Color32::from_rgba_unmultiplied(c.r(), c.g(), c.b(), 150)
        };

        for (r, row) in halo.rows().enumerate() {
            for (c, hc) in row.iter().enumerate() {
                let min = rect.min + Vec2::new(c as f32 * cell, r as f32 * cell);
                let px = Rect::from_min_size(min, Vec2::splat(cell));
                painter.rect_filled(px, 0.0, hc.color.to_color32());
                if hc.is_halo() {
                    painter.rect_filled(px, 0.0, Color32::from_white_alpha(110));
                } else if let Some(pos) = halo.editable_at(r, c)
                    && preview.contains(&pos)
                {
                    painter.rect_filled(px.shrink(cell * 0.2), 1.0, preview_tint);
                }
            }
        }

        // Editable area border and grid lines
        let depth = halo.depth() as f32 * cell;
        let inner = Rect::from_min_size(
            rect.min + Vec2::splat(depth),
            Vec2::splat(self.session.working().size() as f32 * cell),
        );
        let line = Stroke::new(0.5, Color32::from_black_alpha(25));
        for i in 1..self.session.working().size() {
            let off = i as f32 * cell;
            painter.line_segment(
                [inner.left_top() + Vec2::new(off, 0.0), inner.left_bottom() + Vec2::new(off, 0.0)],
                line,
            );
            painter.line_segment(
                [inner.left_top() + Vec2::new(0.0, off), inner.right_top() + Vec2::new(0.0, off)],
                line,
            );
        }
        painter.rect_stroke(inner, 0.0, Stroke::new(1.5, Color32::from_black_alpha(140)));

        if self.session.is_flashing(now) {
            let fade = 1.0 - self.session.flash_progress(now);
            let alpha = (fade * 160.0) as u8;
            painter.rect_filled(inner, 0.0, Color32::from_white_alpha(alpha));
        }
    }
}
