use std::sync::Arc;

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use egui::{Color32, RichText, Stroke, Vec2};
use parking_lot::Mutex;

use super::ui_types::{ClickSession, ImagePlacement};

const CROSS_RADIUS: f32 = 8.;

pub struct ClickApp {
    title: String,
    min_points: usize,
    max_points: Option<usize>,
    image_size: Vec2,
    /// Decoded pixels, consumed when the texture is created
    pending: Option<image::RgbaImage>,
    texture: Option<egui::TextureHandle>,
    session: Arc<Mutex<ClickSession>>,
}

/// New
impl ClickApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        title: String,
        min_points: usize,
        max_points: Option<usize>,
        image: image::RgbaImage,
        session: Arc<Mutex<ClickSession>>,
    ) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        Self {
            title,
            min_points,
            max_points,
            image_size: Vec2::new(image.width() as f32, image.height() as f32),
            pending: Some(image),
            texture: None,
            session,
        }
    }

    fn texture(&mut self, ctx: &egui::Context) -> Option<egui::TextureHandle> {
        if let Some(image) = self.pending.take() {
            let max_side = ctx.input(|i| i.max_texture_side) as u32;
            let image = downscale_to_fit(image, max_side);
            let color = egui::ColorImage::from_rgba_unmultiplied(
                [image.width() as usize, image.height() as usize],
                image.as_raw(),
            );
            self.texture = Some(ctx.load_texture("click_image", color, egui::TextureOptions::LINEAR));
        }
        self.texture.clone()
    }

    fn status_line(&self, ui: &mut egui::Ui) {
        let n = self.session.lock().points.len();
        let target = match self.max_points {
            Some(max) => format!("{} / {}", n, max),
            None => format!("{} (at least {})", n, self.min_points),
        };
        let color = if n >= self.min_points {
            Color32::LIGHT_GREEN
        } else {
            Color32::LIGHT_GRAY
        };
        ui.horizontal(|ui| {
            ui.label(RichText::new(format!("Points: {}", target)).color(color).size(16.));
            ui.separator();
            ui.label("Left click: add  |  Right click / Backspace: remove last  |  Enter: done  |  Esc: abort");
        });
    }

    fn image_view(&mut self, ui: &mut egui::Ui) {
        let Some(texture) = self.texture(ui.ctx()) else {
            ui.label("No image");
            return;
        };

        let size = ImagePlacement::fit(self.image_size, ui.available_size());

        let img = egui::Image::from_texture((texture.id(), size))
            .fit_to_exact_size(size)
            .max_size(size)
            .sense(egui::Sense::click());

        let resp = ui.add(img);

        let placement = ImagePlacement {
            rect: resp.rect,
            image_size: self.image_size,
        };

        let mut session = self.session.lock();

        if resp.clicked() {
            if let Some(pos) = resp.interact_pointer_pos() {
                session.add(placement.to_image(pos));
            }
        }
        if resp.secondary_clicked() {
            session.undo();
        }
        if resp.middle_clicked() {
            session.finish();
        }

        let painter = ui.painter_at(resp.rect);
        let stroke = Stroke::new(2.0, Color32::RED);

        for (i, p) in session.points.iter().enumerate() {
            let pos = placement.to_screen(*p);
            painter.line_segment(
                [
                    pos + Vec2::new(-CROSS_RADIUS, -CROSS_RADIUS),
                    pos + Vec2::new(CROSS_RADIUS, CROSS_RADIUS),
                ],
                stroke,
            );
            painter.line_segment(
                [
                    pos + Vec2::new(-CROSS_RADIUS, CROSS_RADIUS),
                    pos + Vec2::new(CROSS_RADIUS, -CROSS_RADIUS),
                ],
                stroke,
            );
            painter.text(
                pos + Vec2::new(CROSS_RADIUS, -CROSS_RADIUS),
                egui::Align2::LEFT_BOTTOM,
                format!("{}", i + 1),
                egui::FontId::proportional(14.),
                Color32::RED,
            );
        }
    }
}

impl eframe::App for ClickApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        {
            let mut session = self.session.lock();
            if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
                session.cancel();
            }
            if ctx.input(|i| i.key_pressed(egui::Key::Enter)) {
                session.finish();
            }
            if ctx.input(|i| i.key_pressed(egui::Key::Backspace) || i.key_pressed(egui::Key::Delete)) {
                session.undo();
            }
        }

        egui::TopBottomPanel::top("title").show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.label(RichText::new(&self.title).size(18.).strong());
            });
            self.status_line(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                self.image_view(ui);
            });
        });

        if self.session.lock().is_done() {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }
}

/// Shrinks `image` so neither side exceeds `max_side`; smaller images pass
/// through untouched.
pub fn downscale_to_fit(image: image::RgbaImage, max_side: u32) -> image::RgbaImage {
    let (w, h) = image.dimensions();
    let longest = w.max(h);
    if max_side == 0 || longest <= max_side {
        return image;
    }
    let scale = max_side as f64 / longest as f64;
    let nw = ((w as f64 * scale).round() as u32).clamp(1, max_side);
    let nh = ((h as f64 * scale).round() as u32).clamp(1, max_side);
    debug!("downscaling {}x{} to {}x{} for display", w, h, nw, nh);
    image::imageops::resize(&image, nw, nh, image::imageops::FilterType::Triangle)
}
