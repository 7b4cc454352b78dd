use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use eframe::egui::{self, Color32, Pos2, Rect, Stroke, Vec2};

use crate::cache;
use crate::color::Color;
use crate::components::autoscroll::{AutoScrollConfig, AutoScroller};
use crate::components::editor::EditSession;
use crate::components::editor_window::{EditorAction, EditorWindow};
use crate::components::gesture::{
    DragCopy, GestureConfig, GesturePhase, GestureTracker, in_drag_hotspot,
};
use crate::components::timer::Timed;
use crate::config::Settings;
use crate::error::Result;
use crate::grid::PixelGrid;
use crate::ops::export::export_png;
use crate::session::{QuiltSession, SessionOptions};
use crate::store::{MemoryStore, QuiltStore};
use crate::{log_err, log_info, log_warn};

const TOAST_DURATION: Duration = Duration::from_secs(3);
/// Saves after which the drag hint stops appearing.
const DRAG_HINT_SAVES: usize = 2;
const GRID_GAP: f32 = 4.0;
const MAX_GRID_WIDTH: f32 = 1000.0;

#[cfg(target_os = "macos")]
const UNDO_SHORTCUT: &str = "Cmd+Z";
#[cfg(not(target_os = "macos"))]
const UNDO_SHORTCUT: &str = "Ctrl+Z";

// ============================================================================
// APP STATE
// ============================================================================

/// Pointer interaction on the grid that started on a square.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Press {
    /// Mouse press away from the drag handle; opens the editor on release.
    Click(usize),
    /// Touch press waiting for the gesture tracker to decide.
    Touch(usize),
}

pub struct QuiltApp {
    settings: Settings,
    session: QuiltSession,
    store_label: String,
    offline: bool,
    cache_path: PathBuf,

    editor: Option<EditorWindow>,
    preview: bool,
    saves: usize,
    toast: Option<Timed<String>>,

    // Grid interaction
    gesture: GestureTracker,
    drag: DragCopy,
    autoscroll: AutoScroller,
    press: Option<Press>,
    square_rects: Vec<Rect>,
    viewport: Rect,
    scroll_y: f32,
    scroll_to: Option<f32>,
}

impl QuiltApp {
    /// Open the configured store (or an in-memory one when none is usable)
    /// and start syncing.
    pub fn new(settings: Settings) -> Result<Self> {
        let (store, offline): (Arc<dyn QuiltStore>, bool) = match settings.open_store() {
            Ok(store) => (store, false),
            Err(e) => {
                log_warn!("Working offline: {}", e);
                (Arc::new(MemoryStore::new()), true)
            }
        };
        let store_label = if offline {
            "offline".to_string()
        } else {
            store.describe()
        };

        let options = SessionOptions {
            undo_persists: settings.undo_persists,
            max_history: settings.max_history,
        };
        let mut session = QuiltSession::new(Arc::clone(&store), settings.layout, options)?;

        let cache_path = cache::cache_path();
        match cache::load(&cache_path, &store_label) {
            Ok(Some(quilt)) => {
                if let Err(e) = session.adopt(quilt) {
                    log_warn!("Discarding cached quilt: {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => {
                log_info!("No usable cache at {}: {}", cache_path.display(), e);
            }
        }

        if let Err(e) = session.attach_remote() {
            log_err!("Could not subscribe to {}: {}", store_label, e);
        }

        Ok(Self {
            gesture: GestureTracker::new(GestureConfig::default(), settings.touch_mode),
            settings,
            session,
            store_label,
            offline,
            cache_path,
            editor: None,
            preview: false,
            saves: 0,
            toast: None,
            drag: DragCopy::default(),
            autoscroll: AutoScroller::new(AutoScrollConfig::default()),
            press: None,
            square_rects: Vec::new(),
            viewport: Rect::NOTHING,
            scroll_y: 0.0,
            scroll_to: None,
        })
    }

    fn show_toast(&mut self, message: impl Into<String>, now: Instant) {
        self.toast = Some(Timed::new(message.into(), now, TOAST_DURATION));
    }

    fn remember(&self) {
        if let Err(e) = cache::save(&self.cache_path, &self.store_label, self.session.quilt()) {
            log_warn!("Could not write quilt cache: {}", e);
        }
    }

    // ------------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------------

    fn open_editor(&mut self, index: usize) {
        match EditSession::open(self.session.quilt(), index, self.settings.editor_config()) {
            Ok(session) => self.editor = Some(EditorWindow::new(session)),
            Err(e) => {
                log_warn!("Cannot open square {}: {}", index, e);
            }
        }
    }

    fn save_square(&mut self, index: usize, pixels: PixelGrid, now: Instant) {
        if let Err(e) = self.session.commit_square_update(index, pixels) {
            log_err!("Saving square {} failed: {}", index, e);
            return;
        }
        self.remember();
        self.saves += 1;
        if self.saves <= DRAG_HINT_SAVES {
            self.show_toast("Drag the corner of a square to copy your design", now);
        }
    }

    fn copy_pattern(&mut self, from: usize, to: usize, now: Instant) {
        if let Err(e) = self.session.commit_pattern_copy(from, to) {
            log_err!("Copying square {} to {} failed: {}", from, to, e);
            return;
        }
        self.remember();
        self.show_toast(format!("Pattern copied! Press {} to undo", UNDO_SHORTCUT), now);
    }

    fn undo(&mut self) {
        if self.session.undo() {
            self.remember();
        }
    }

    fn export(&mut self, now: Instant) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("PNG image", &["png"])
            .set_file_name("pixel-quilt.png")
            .save_file()
        else {
            return;
        };
        match export_png(self.session.quilt(), &path, 8) {
            Ok(()) => {
                log_info!("Exported quilt to {}", path.display());
                self.show_toast("Quilt exported", now);
            }
            Err(e) => {
                log_err!("Export to {} failed: {}", path.display(), e);
                self.show_toast("Export failed", now);
            }
        }
    }

    fn toggle_touch_mode(&mut self) {
        let mode = self.gesture.mode().toggled();
        self.gesture.set_mode(mode);
        self.settings.touch_mode = mode;
        // Persist only the toggle; command-line overrides stay out of the file
        let mut stored = Settings::settings_path()
            .map(|p| Settings::load_from(&p))
            .unwrap_or_default();
        stored.touch_mode = mode;
        if let Err(e) = stored.save() {
            log_warn!("Could not save settings: {}", e);
        }
    }

    // ------------------------------------------------------------------------
    // Top bar
    // ------------------------------------------------------------------------

    fn top_bar(&mut self, ctx: &egui::Context, now: Instant) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Pixel Quilt");
                ui.separator();
                let undo = ui
                    .add_enabled(self.session.can_undo(), egui::Button::new("Undo"))
                    .on_hover_text(UNDO_SHORTCUT);
                if undo.clicked() {
                    self.undo();
                }
                ui.toggle_value(&mut self.preview, "Preview");
                if ui
                    .button(self.gesture.mode().label())
                    .on_hover_text("How touch movement on the grid is read")
                    .clicked()
                {
                    self.toggle_touch_mode();
                }
                if ui.button("Export PNG").clicked() {
                    self.export(now);
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let failed = self.session.failed_writes();
                    if self.offline {
                        ui.colored_label(Color32::from_rgb(0xEA, 0x68, 0x47), "offline");
                    } else if failed > 0 {
                        ui.colored_label(
                            Color32::from_rgb(0xEA, 0x68, 0x47),
                            format!("{} ({} failed writes)", self.store_label, failed),
                        );
                    } else {
                        ui.weak(&self.store_label);
                    }
                });
            });
        });
    }

    // ------------------------------------------------------------------------
    // Grid
    // ------------------------------------------------------------------------

    fn grid(&mut self, ctx: &egui::Context, now: Instant) {
        let touching = ctx.input(|i| i.any_touches());
        let touch_scrolls = touching
            && !self.drag.is_active()
            && (!self.gesture.is_tracking() || self.gesture.phase() == GesturePhase::Scroll);

        egui::CentralPanel::default()
            .frame(egui::Frame::central_panel(&ctx.style()).fill(Color32::from_gray(18)))
            .show(ctx, |ui| {
                let mut area = egui::ScrollArea::vertical()
                    .id_source("quilt_grid")
                    .auto_shrink([false, false])
                    .drag_to_scroll(touch_scrolls);
                if let Some(y) = self.scroll_to.take() {
                    area = area.vertical_scroll_offset(y.max(0.0));
                }
                let output = area.show(ui, |ui| self.paint_grid(ui));
                self.viewport = output.inner_rect;
                self.scroll_y = output.state.offset.y;
            });

        if !self.preview && self.editor.is_none() {
            self.handle_grid_pointer(ctx, now);
        }
        self.paint_drag_ghost(ctx);
    }

    fn paint_grid(&mut self, ui: &mut egui::Ui) {
        let quilt = self.session.quilt();
        let columns = quilt.columns().max(1);
        let gap = if self.preview { 0.0 } else { GRID_GAP };
        let width = ui.available_width().min(MAX_GRID_WIDTH);
        let square = ((width - gap * (columns as f32 - 1.0)) / columns as f32).floor().max(8.0);
        let rows = quilt.len().div_ceil(columns);
        let total = Vec2::new(
            square * columns as f32 + gap * (columns as f32 - 1.0),
            square * rows as f32 + gap * (rows.saturating_sub(1)) as f32,
        );

        let (outer, _) = ui.allocate_exact_size(Vec2::new(ui.available_width(), total.y), egui::Sense::hover());
        let origin = Pos2::new(outer.center().x - total.x / 2.0, outer.top());
        let painter = ui.painter();

        self.square_rects.clear();
        for (i, grid) in quilt.squares().iter().enumerate() {
            let (r, c) = (i / columns, i % columns);
            let min = origin + Vec2::new(c as f32 * (square + gap), r as f32 * (square + gap));
            let rect = Rect::from_min_size(min, Vec2::splat(square));
            paint_square(painter, rect, grid, 255);

            if !self.preview {
                let is_candidate = self.drag.candidate() == Some(i) && self.drag.source() != Some(i);
                if is_candidate {
                    painter.rect_stroke(rect.expand(2.0), 2.0, Stroke::new(3.0, Color32::from_rgb(0x89, 0xB9, 0xDA)));
                } else if self.drag.source() == Some(i) {
                    painter.rect_stroke(rect, 0.0, Stroke::new(2.0, Color32::from_white_alpha(160)));
                }
                paint_drag_handle(painter, rect);
            }
            self.square_rects.push(rect);
        }
    }

    fn square_at(&self, pos: Pos2) -> Option<usize> {
        if !self.viewport.contains(pos) {
            return None;
        }
        self.square_rects.iter().position(|r| r.contains(pos))
    }

    fn handle_grid_pointer(&mut self, ctx: &egui::Context, now: Instant) {
        let (pos, pressed, down, released, touching) = ctx.input(|i| {
            (
                i.pointer.interact_pos(),
                i.pointer.primary_pressed(),
                i.pointer.primary_down(),
                i.pointer.primary_released(),
                i.any_touches(),
            )
        });
        if pressed
            && let Some(p) = pos
            && let Some(index) = self.square_at(p)
        {
            let rect = self.square_rects[index];
            if touching {
                self.gesture.pointer_down(p, now);
                self.press = Some(Press::Touch(index));
            } else if in_drag_hotspot(p - rect.min, rect.size()) {
                self.drag.begin(index, p);
                self.autoscroll.start(now);
                self.press = None;
            } else {
                self.press = Some(Press::Click(index));
            }
        }

        if down && let Some(p) = pos {
            if let Some(Press::Touch(source)) = self.press {
                let phase = self.gesture.pointer_move(p, now);
                if phase == GesturePhase::Drag && !self.drag.is_active() {
                    self.drag.begin(source, p);
                    self.autoscroll.start(now);
                }
                if !phase.is_committed() {
                    // Long press must fire without further movement
                    ctx.request_repaint_after(Duration::from_millis(50));
                }
            }
            if self.drag.is_active() {
                let hovered = self.square_at(p);
                self.drag.update(p, hovered);
                let delta = self.autoscroll.step(self.viewport, p, now);
                if delta != 0.0 {
                    self.scroll_to = Some(self.scroll_y + delta);
                }
                ctx.request_repaint();
            }
        }

        if released {
            let release_pos = pos;
            match self.press.take() {
                Some(Press::Touch(source)) => {
                    if self.gesture.pointer_up(now) == GesturePhase::Tap {
                        self.open_editor(source);
                    }
                }
                Some(Press::Click(source)) => {
                    if release_pos.and_then(|p| self.square_at(p)) == Some(source) {
                        self.open_editor(source);
                    }
                }
                None => {}
            }
            if self.drag.is_active() {
                self.autoscroll.stop();
                if let Some(request) = self.drag.release() {
                    self.copy_pattern(request.from, request.to, now);
                }
            }
        }

        // Pointer left the window mid-gesture
        if !down && !released && (self.drag.is_active() || self.press.is_some()) {
            self.drag.cancel();
            self.autoscroll.stop();
            self.gesture.reset();
            self.press = None;
        }
    }

    fn paint_drag_ghost(&self, ctx: &egui::Context) {
        let Some(source) = self.drag.source() else {
            return;
        };
        let (Some(grid), Some(rect)) = (
            self.session.quilt().squares().get(source),
            self.square_rects.get(source),
        ) else {
            return;
        };
        let size = rect.size() * 0.8;
        let ghost = Rect::from_center_size(self.drag.ghost(), size);
        let painter = ctx.layer_painter(egui::LayerId::new(
            egui::Order::Tooltip,
            egui::Id::new("drag_ghost"),
        ));
        painter.rect_filled(ghost.expand(3.0).translate(Vec2::new(2.0, 3.0)), 3.0, Color32::from_black_alpha(90));
        paint_square(&painter, ghost, grid, 200);
    }

    fn paint_toast(&mut self, ctx: &egui::Context, now: Instant) {
        let Some(toast) = &self.toast else {
            return;
        };
        if !toast.is_live(now) {
            self.toast = None;
            return;
        }
        egui::Area::new(egui::Id::new("toast"))
            .anchor(egui::Align2::CENTER_BOTTOM, Vec2::new(0.0, -28.0))
            .order(egui::Order::Foreground)
            .interactable(false)
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.label(&toast.value);
                });
            });
        ctx.request_repaint_after(Duration::from_millis(250));
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        let undo = ctx.input(|i| {
            i.modifiers.command && !i.modifiers.shift && i.key_pressed(egui::Key::Z)
        });
        if !undo {
            return;
        }
        match &mut self.editor {
            Some(editor) => editor.undo(),
            None => self.undo(),
        }
    }
}

impl eframe::App for QuiltApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        // --- Remote changes ---
        if self.session.poll_remote() {
            self.remember();
        }
        if self.session.is_attached() {
            ctx.request_repaint_after(self.settings.poll_interval());
        }

        self.handle_keys(ctx);
        self.top_bar(ctx, now);
        self.grid(ctx, now);

        // --- Editor window ---
        let action = match &mut self.editor {
            Some(editor) => editor.show(ctx, self.session.quilt(), now),
            None => EditorAction::Keep,
        };
        match action {
            EditorAction::Keep => {}
            EditorAction::Save => {
                if let Some(editor) = self.editor.take() {
                    let (index, pixels) = editor.save();
                    self.save_square(index, pixels, now);
                }
            }
            EditorAction::Cancel => {
                if let Some(editor) = self.editor.take() {
                    editor.close();
                }
            }
        }

        self.paint_toast(ctx, now);
    }
}

// ============================================================================
// PAINTING HELPERS
// ============================================================================

fn paint_square(painter: &egui::Painter, rect: Rect, grid: &PixelGrid, alpha: u8) {
    let n = grid.size().max(1);
    let cell = rect.width() / n as f32;
    for (r, row) in grid.rows().enumerate() {
        for (c, color) in row.iter().enumerate() {
            let min = rect.min + Vec2::new(c as f32 * cell, r as f32 * cell);
            // Overlap by a hair so no seams show between cells
            let px = Rect::from_min_size(min, Vec2::splat(cell + 0.5));
            painter.rect_filled(px.intersect(rect), 0.0, with_alpha(*color, alpha));
        }
    }
}

fn with_alpha(color: Color, alpha: u8) -> Color32 {
    if alpha == 255 {
        color.to_color32()
    } else {
        Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), alpha)
    }
}

/// Small corner grip marking the drag-to-copy handle.
fn paint_drag_handle(painter: &egui::Painter, rect: Rect) {
    let s = rect.width() * 0.2;
    let corner = rect.left_bottom();
    let stroke = Stroke::new(1.5, Color32::from_black_alpha(70));
    for k in 1..=3 {
        let d = s * k as f32 / 4.0;
        painter.line_segment([corner + Vec2::new(0.0, -d), corner + Vec2::new(d, 0.0)], stroke);
    }
}
