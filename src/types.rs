use std::path::Path;

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use ndarray::Array2;

/// Pixel coordinate in image space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// Ordered points clicked on one image.
///
/// The order carries meaning: either a corner role (top-left, top-right,
/// bottom-right, bottom-left) or the index of a correspondence shared with
/// another image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointSequence(Vec<Point>);

impl PointSequence {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, p: Point) {
        self.0.push(p);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.0.iter()
    }

    /// First `n` points, in their original order.
    pub fn prefix(&self, n: usize) -> Self {
        Self(self.0.iter().take(n).copied().collect())
    }

    /// `(N, 2)` array with one `[x, y]` row per point.
    pub fn to_array(&self) -> Array2<f64> {
        let mut out = Array2::zeros((self.0.len(), 2));
        for (mut row, p) in out.rows_mut().into_iter().zip(&self.0) {
            row[0] = p.x;
            row[1] = p.y;
        }
        out
    }

    pub fn from_array(array: &Array2<f64>) -> Result<Self> {
        ensure!(
            array.ncols() == 2,
            "Expected an (N, 2) array, got shape {:?}",
            array.shape()
        );
        Ok(Self(
            array
                .rows()
                .into_iter()
                .map(|row| Point::new(row[0], row[1]))
                .collect(),
        ))
    }
}

impl From<Vec<Point>> for PointSequence {
    fn from(points: Vec<Point>) -> Self {
        Self(points)
    }
}

impl FromIterator<Point> for PointSequence {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a PointSequence {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Point sequences keyed by image name, in insertion order.
///
/// Filled once per image during a session and written out in one piece at
/// the end; there is no incremental save.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionResult {
    entries: Vec<(String, PointSequence)>,
}

impl CollectionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, points: PointSequence) -> Result<()> {
        let name = name.into();
        if self.get(&name).is_some() {
            bail!("Duplicate entry name: {}", name);
        }
        self.entries.push((name, points));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&PointSequence> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, points)| points)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PointSequence)> {
        self.entries.iter().map(|(n, p)| (n.as_str(), p))
    }

    /// Writes every entry as an `(N, 2)` float64 array into one `.npz` archive.
    pub fn save_npz<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let arrays = self
            .entries
            .iter()
            .map(|(name, points)| (name.clone(), points.to_array()))
            .collect::<Vec<_>>();
        crate::npz::write_npz(path, &arrays)
            .with_context(|| format!("Failed to write archive {}", path.display()))?;
        debug!("Wrote {} arrays to {}", arrays.len(), path.display());
        Ok(())
    }

    pub fn load_npz<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let arrays = crate::npz::read_npz(path)
            .with_context(|| format!("Failed to read archive {}", path.display()))?;
        let mut out = Self::new();
        for (name, array) in arrays {
            let points = PointSequence::from_array(&array)
                .with_context(|| format!("Bad array for entry {}", name))?;
            out.insert(name, points)?;
        }
        Ok(out)
    }
}
