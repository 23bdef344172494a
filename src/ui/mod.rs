pub mod app;
pub mod ui_types;

use std::sync::Arc;

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use parking_lot::Mutex;

use self::{
    app::ClickApp,
    ui_types::{CaptureEnd, ClickSession},
};
use crate::{
    capture::{CaptureError, CaptureRequest, PointCapture},
    types::PointSequence,
};

/// Native window that collects clicks on an image.
///
/// Each request opens a fresh window on the calling thread and blocks until
/// it closes. Closing the window keeps the clicks made so far; Escape throws
/// them away and reports [`CaptureError::Cancelled`].
#[derive(Debug, Clone)]
pub struct ClickWindow {
    pub inner_size: [f32; 2],
}

impl Default for ClickWindow {
    fn default() -> Self {
        Self {
            inner_size: [1200., 800.],
        }
    }
}

impl PointCapture for ClickWindow {
    fn collect(&mut self, request: &CaptureRequest) -> Result<PointSequence, CaptureError> {
        let image = image::open(&request.image)?.to_rgba8();
        debug!(
            "loaded {} ({}x{})",
            request.image.display(),
            image.width(),
            image.height()
        );

        let session = Arc::new(Mutex::new(ClickSession::new(request.max_points)));

        let native_options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_title(request.window_title())
                .with_inner_size(self.inner_size)
                .with_min_inner_size([400.0, 300.0]),
            ..Default::default()
        };

        let app_session = session.clone();
        let title = request.title.clone();
        let (min_points, max_points) = (request.min_points, request.max_points);

        eframe::run_native(
            "point_clicker",
            native_options,
            Box::new(move |cc| {
                Ok(Box::new(ClickApp::new(
                    cc,
                    title,
                    min_points,
                    max_points,
                    image,
                    app_session,
                )))
            }),
        )
        .map_err(|e| CaptureError::Window(e.to_string()))?;

        let session = session.lock();
        match session.end {
            Some(CaptureEnd::Cancelled) => {
                info!("capture of {} cancelled", request.image.display());
                Err(CaptureError::Cancelled)
            }
            Some(CaptureEnd::Finished) | None => Ok(session.points.iter().copied().collect()),
        }
    }
}
