//! Four-corner collection over a fixed list of painting photos.

use std::io::{BufRead, Write};

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use crate::{
    appconfig::CornerSessionConfig,
    capture::{capture_points, CaptureRequest, PointCapture},
    console::Console,
    types::CollectionResult,
    SessionOutcome,
};

pub const CORNER_LABELS: [&str; 4] = ["Top-left", "Top-right", "Bottom-right", "Bottom-left"];

/// Archive entry name for the `i`-th painting.
pub fn entry_name(i: usize) -> String {
    format!("corners_{}", i)
}

/// Runs the corner session: confirm overwrite, click four corners on every
/// configured painting, write one archive.
///
/// Nothing is displayed and nothing is written when the operator declines to
/// overwrite an existing archive. Any capture error aborts the whole session
/// before the archive is touched.
pub fn run_corner_session<C, R, W>(
    config: &CornerSessionConfig,
    capturer: &mut C,
    console: &mut Console<R, W>,
) -> Result<SessionOutcome>
where
    C: PointCapture + ?Sized,
    R: BufRead,
    W: Write,
{
    config.validate()?;
    let n = config.paintings.len();

    console.banner("PAINTING CORNER POINT COLLECTION")?;
    console.line(format!(
        "\nThis script will help you click 4 corner points on each of the {} painting images.",
        n
    ))?;
    console.line("\nFor each image, click the corners in this order:")?;
    for (i, label) in CORNER_LABELS.iter().enumerate() {
        console.line(format!("  {}. {} corner of the painting", i + 1, label))?;
    }
    console.blank()?;
    console.rule()?;

    if config.output.exists() {
        let prompt = format!(
            "\n⚠ '{}' already exists. Overwrite? (y/n): ",
            config.output.display()
        );
        if !console.confirm(&prompt)? {
            console.line("Exiting without overwriting.")?;
            info!("kept existing {}", config.output.display());
            return Ok(SessionOutcome::Declined);
        }
    }

    let mut result = CollectionResult::new();

    for (i, painting) in config.paintings.iter().enumerate() {
        let file = painting.file.display();

        console.banner(format!("Image {}/{}: {}", i + 1, n, file))?;
        console.line(format!(
            "Painting dimensions: {:.1}cm × {:.1}cm",
            painting.width_cm, painting.height_cm
        ))?;
        console.line(format!("Aspect ratio: {:.3}", painting.aspect_ratio()))?;
        console.rule()?;

        console.pause(&format!(
            "\nPress Enter to start clicking points on {}...",
            file
        ))?;

        let request = CaptureRequest::new(
            painting.file.clone(),
            format!(
                "Image {} - {}\nClick 4 corners (Top-left, Top-right, Bottom-right, Bottom-left)",
                i + 1,
                painting.title
            ),
        )
        .exactly(CORNER_LABELS.len())
        .hints(
            std::iter::once("Click 4 corners of the painting in this order:".to_string())
                .chain(
                    CORNER_LABELS
                        .iter()
                        .enumerate()
                        .map(|(j, label)| format!("  {}. {} corner", j + 1, label)),
                )
                .chain(std::iter::once("Press ENTER when done".to_string())),
        );

        let corners = capture_points(capturer, console, &request)
            .with_context(|| format!("Corner capture failed for {}", file))?;

        console.line(format!("\nCollected points for Image {}:", i + 1))?;
        for (label, p) in CORNER_LABELS.iter().zip(corners.iter()) {
            console.line(format!("  {}: {}", label, p))?;
        }

        result.insert(entry_name(i), corners)?;
    }

    result.save_npz(&config.output)?;
    info!(
        "saved {} corner sets to {}",
        result.len(),
        config.output.display()
    );

    let output = config.output.display().to_string();
    console.banner("ALL CORNER POINTS COLLECTED SUCCESSFULLY!")?;
    console.line(format!("\nPoints saved to: {}", output))?;
    console.line("\nSummary:")?;
    for (i, (painting, (_, corners))) in config.paintings.iter().zip(result.iter()).enumerate() {
        console.line(format!(
            "  Image {} ({}): {} points",
            i + 1,
            painting.file.display(),
            corners.len()
        ))?;
    }

    console.blank()?;
    console.rule()?;
    console.line("To load these points in your notebook, use:")?;
    console.line(format!("  data = np.load('{}')", output))?;
    console.line("  corner_points = {")?;
    for i in 0..n {
        let sep = if i + 1 < n { "," } else { "" };
        console.line(format!("      {}: data['{}']{}", i, entry_name(i), sep))?;
    }
    console.line("  }")?;
    console.rule()?;

    Ok(SessionOutcome::Saved {
        path: config.output.clone(),
        result,
    })
}
