use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use egui::{Pos2, Rect, Vec2};

use crate::types::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEnd {
    Finished,
    Cancelled,
}

/// Click state shared between the window and the caller waiting on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClickSession {
    pub points: Vec<Point>,
    pub max_points: Option<usize>,
    pub end: Option<CaptureEnd>,
}

impl ClickSession {
    pub fn new(max_points: Option<usize>) -> Self {
        Self {
            max_points,
            ..Default::default()
        }
    }

    /// Records a click. Reaching `max_points` finishes the session.
    pub fn add(&mut self, p: Point) {
        if self.is_done() {
            return;
        }
        self.points.push(p);
        debug!("click {}: ({:.1}, {:.1})", self.points.len(), p.x, p.y);
        if self.max_points.is_some_and(|max| self.points.len() >= max) {
            self.end = Some(CaptureEnd::Finished);
        }
    }

    /// Removes the most recent click.
    pub fn undo(&mut self) -> Option<Point> {
        if self.is_done() {
            return None;
        }
        let p = self.points.pop();
        if let Some(p) = p {
            debug!("removed click ({:.1}, {:.1})", p.x, p.y);
        }
        p
    }

    pub fn finish(&mut self) {
        self.end.get_or_insert(CaptureEnd::Finished);
    }

    pub fn cancel(&mut self) {
        self.end.get_or_insert(CaptureEnd::Cancelled);
    }

    pub fn is_done(&self) -> bool {
        self.end.is_some()
    }
}

/// Where the image sits on screen and how big it is in pixels.
///
/// Image coordinates follow the usual plotting convention: the centre of the
/// top-left pixel is (0, 0), so its area spans -0.5..0.5 on both axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePlacement {
    pub rect: Rect,
    pub image_size: Vec2,
}

impl ImagePlacement {
    /// Largest size with the image's aspect ratio that fits in `available`.
    pub fn fit(image_size: Vec2, available: Vec2) -> Vec2 {
        if image_size.x <= 0. || image_size.y <= 0. {
            return Vec2::ZERO;
        }
        let scale = (available.x / image_size.x).min(available.y / image_size.y);
        image_size * scale.max(0.)
    }

    pub fn scale(&self) -> Vec2 {
        self.rect.size() / self.image_size
    }

    pub fn to_image(&self, pos: Pos2) -> Point {
        let v = (pos - self.rect.min) / self.scale();
        Point::new(v.x as f64 - 0.5, v.y as f64 - 0.5)
    }

    pub fn to_screen(&self, p: Point) -> Pos2 {
        let v = Vec2::new(p.x as f32 + 0.5, p.y as f32 + 0.5) * self.scale();
        self.rect.min + v
    }
}
