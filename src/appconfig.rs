use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub const CORNERS_CONFIG_FILE: &str = "painting_corners.toml";
pub const CORRESPONDENCE_CONFIG_FILE: &str = "correspondence_points.toml";

/// A painting photo plus the real-world size of the painting.
///
/// The size is only shown to the operator as context, nothing is computed
/// from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaintingSpec {
    pub file: PathBuf,
    pub title: String,
    pub width_cm: f64,
    pub height_cm: f64,
}

impl PaintingSpec {
    pub fn new(file: &str, title: &str, width_cm: f64, height_cm: f64) -> Self {
        Self {
            file: PathBuf::from(file),
            title: title.to_string(),
            width_cm,
            height_cm,
        }
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width_cm / self.height_cm
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CornerSessionConfig {
    pub output: PathBuf,
    pub paintings: Vec<PaintingSpec>,
}

impl Default for CornerSessionConfig {
    fn default() -> Self {
        CornerSessionConfig {
            output: PathBuf::from("painting_corners.npz"),
            paintings: vec![
                PaintingSpec::new(
                    "Christinas World — Wyeth.jpeg",
                    "Christina's World — Wyeth",
                    121.3,
                    82.9,
                ),
                PaintingSpec::new(
                    "The Starry Night — Van Gogh.jpeg",
                    "The Starry Night — Van Gogh",
                    92.1,
                    73.7,
                ),
                PaintingSpec::new(
                    "Les Demoiselles dAvignon — Picasso.jpeg",
                    "Les Demoiselles d'Avignon — Picasso",
                    233.7,
                    243.9,
                ),
                PaintingSpec::new(
                    "Dance (I) — Matisse.jpeg",
                    "Dance (I) — Matisse",
                    390.1,
                    259.7,
                ),
                PaintingSpec::new(
                    "Girl Before a Mirror — Picasso.jpeg",
                    "Girl Before a Mirror — Picasso",
                    130.2,
                    162.3,
                ),
                PaintingSpec::new(
                    "The Birth of the World — Miró.jpeg",
                    "The Birth of the World — Miró",
                    200.7,
                    250.8,
                ),
            ],
        }
    }
}

impl CornerSessionConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.paintings.is_empty(), "No paintings configured");
        for p in &self.paintings {
            ensure!(
                p.width_cm > 0. && p.height_cm > 0.,
                "Painting {} has non-positive dimensions {} x {}",
                p.file.display(),
                p.width_cm,
                p.height_cm
            );
        }
        Ok(())
    }
}

/// An image plus the name the operator sees for it ("Image 3").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSpec {
    pub file: PathBuf,
    pub label: String,
}

impl ImageSpec {
    pub fn new(file: &str, label: &str) -> Self {
        Self {
            file: PathBuf::from(file),
            label: label.to_string(),
        }
    }
}

/// What to do when the second image gets a different number of clicks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchPolicy {
    /// Keep the common prefix of both sequences and warn
    #[default]
    Truncate,
    /// Abort without writing anything
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrespondenceConfig {
    pub first: ImageSpec,
    pub second: ImageSpec,
    pub min_points: usize,
    pub output: PathBuf,
    pub first_key: String,
    pub second_key: String,
    pub mismatch: MismatchPolicy,
}

impl Default for CorrespondenceConfig {
    fn default() -> Self {
        CorrespondenceConfig {
            first: ImageSpec::new("image_3.png", "Image 3"),
            second: ImageSpec::new("image_4.png", "Image 4"),
            min_points: 4,
            output: PathBuf::from("correspondence_points.npz"),
            first_key: "image1points".to_string(),
            second_key: "image2points".to_string(),
            mismatch: MismatchPolicy::Truncate,
        }
    }
}

impl CorrespondenceConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.min_points > 0, "min_points must be at least 1");
        ensure!(
            self.first_key != self.second_key,
            "Array names must differ, both are {:?}",
            self.first_key
        );
        Ok(())
    }
}

/// Reads a TOML config, falling back to defaults when the file is absent.
pub fn load_or_default<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if !path.exists() {
        debug!("no config at {}, using built-in defaults", path.display());
        return Ok(T::default());
    }
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config = toml::from_str(&s)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    info!("loaded config from {}", path.display());
    Ok(config)
}

pub fn save_to_file<T: Serialize, P: AsRef<Path>>(config: &T, path: P) -> Result<()> {
    let s = toml::to_string_pretty(config).context("Failed to serialize config to TOML")?;
    std::fs::write(path, s)?;
    Ok(())
}
