use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, error, info, trace, warn};

use crate::{console::Console, types::PointSequence};

#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("Image not found: {}", .0.display())]
    ImageNotFound(PathBuf),
    #[error("Need at least {required} points, but only got {got}")]
    InsufficientPoints { required: usize, got: usize },
    #[error("Expected at most {max} points, but got {got}")]
    TooManyPoints { max: usize, got: usize },
    #[error("Point capture cancelled by the operator")]
    Cancelled,
    #[error("Failed to load image: {0}")]
    Image(#[from] image::ImageError),
    #[error("Display window failed: {0}")]
    Window(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One image to click on.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub image: PathBuf,
    /// Window heading, may span several lines
    pub title: String,
    pub min_points: usize,
    /// Capture ends by itself once this many points are clicked
    pub max_points: Option<usize>,
    /// Extra instruction lines printed before the window opens
    pub hints: Vec<String>,
}

impl CaptureRequest {
    pub fn new(image: impl Into<PathBuf>, title: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            title: title.into(),
            min_points: 1,
            max_points: None,
            hints: vec![],
        }
    }

    pub fn min_points(mut self, n: usize) -> Self {
        self.min_points = n;
        self
    }

    /// Exactly `n` points: minimum and maximum both.
    pub fn exactly(mut self, n: usize) -> Self {
        self.min_points = n;
        self.max_points = Some(n);
        self
    }

    pub fn hints<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hints = lines.into_iter().map(Into::into).collect();
        self
    }

    pub fn window_title(&self) -> &str {
        self.title.lines().next().unwrap_or_default()
    }
}

/// Something that shows an image and hands back the points the operator
/// clicked on it, in click order.
///
/// Implementations block until the operator is done. They do not enforce
/// `min_points`; [`capture_points`] does that.
pub trait PointCapture {
    fn collect(&mut self, request: &CaptureRequest) -> Result<PointSequence, CaptureError>;
}

impl<T: PointCapture + ?Sized> PointCapture for &mut T {
    fn collect(&mut self, request: &CaptureRequest) -> Result<PointSequence, CaptureError> {
        (**self).collect(request)
    }
}

/// Shows one image, waits for the clicks and checks the count.
///
/// A missing image fails before anything is displayed. Too few points is an
/// error and nothing is returned.
pub fn capture_points<C, R, W>(
    capturer: &mut C,
    console: &mut Console<R, W>,
    request: &CaptureRequest,
) -> Result<PointSequence, CaptureError>
where
    C: PointCapture + ?Sized,
    R: BufRead,
    W: Write,
{
    if !request.image.is_file() {
        return Err(CaptureError::ImageNotFound(request.image.clone()));
    }

    console.banner(&request.title)?;
    for hint in &request.hints {
        console.line(hint)?;
    }
    console.rule()?;

    debug!(
        "capturing {} (min {}, max {:?})",
        request.image.display(),
        request.min_points,
        request.max_points
    );
    let points = capturer.collect(request)?;

    if points.len() < request.min_points {
        return Err(CaptureError::InsufficientPoints {
            required: request.min_points,
            got: points.len(),
        });
    }
    if let Some(max) = request.max_points {
        if points.len() > max {
            return Err(CaptureError::TooManyPoints {
                max,
                got: points.len(),
            });
        }
    }

    console.line(format!(
        "\n✓ Collected {} points from {}",
        points.len(),
        request.image.display()
    ))?;
    info!("collected {} points from {}", points.len(), request.image.display());
    Ok(points)
}
