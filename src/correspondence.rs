//! Corresponding points across a pair of images.

use std::io::{BufRead, Write};

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use crate::{
    appconfig::{CorrespondenceConfig, MismatchPolicy},
    capture::{capture_points, CaptureRequest, PointCapture},
    console::Console,
    types::{CollectionResult, PointSequence},
    SessionOutcome,
};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum CorrespondenceError {
    #[error("Number of points don't match: {first} on the first image, {second} on the second")]
    CountMismatch { first: usize, second: usize },
}

/// Makes both sequences the same length.
///
/// Equal lengths pass through. Otherwise, under [`MismatchPolicy::Truncate`]
/// both are cut to the shorter length, keeping the earliest clicks, and under
/// [`MismatchPolicy::Fail`] the mismatch is an error.
pub fn reconcile(
    first: PointSequence,
    second: PointSequence,
    policy: MismatchPolicy,
) -> Result<(PointSequence, PointSequence), CorrespondenceError> {
    if first.len() == second.len() {
        return Ok((first, second));
    }
    match policy {
        MismatchPolicy::Fail => Err(CorrespondenceError::CountMismatch {
            first: first.len(),
            second: second.len(),
        }),
        MismatchPolicy::Truncate => {
            let n = first.len().min(second.len());
            Ok((first.prefix(n), second.prefix(n)))
        }
    }
}

/// Python source that rebuilds `points` as a numpy array named `name`.
///
/// Values use Rust's shortest round-trip float formatting so pasting the
/// literal gives back the exact coordinates.
pub fn numpy_literal(name: &str, points: &PointSequence) -> String {
    let mut s = format!("{} = np.array([\n", name);
    for p in points {
        s += &format!("    [{:?}, {:?}],\n", p.x, p.y);
    }
    s += "])";
    s
}

fn capture_hints(min_points: usize) -> Vec<String> {
    vec![
        "Instructions:".to_string(),
        format!("  - Left-click to select points (at least {} points)", min_points),
        "  - Points will be marked with red crosses as you click".to_string(),
        "  - Press ENTER when you're done selecting points".to_string(),
        "  - Right-click to remove the last point".to_string(),
    ]
}

/// Runs the pair session: click points on the first image, click the same
/// points in the same order on the second, reconcile, write one archive.
///
/// The second image is asked for as many points as the first got, but only
/// `min_points` are enforced; a different count goes through [`reconcile`].
pub fn run_correspondence_session<C, R, W>(
    config: &CorrespondenceConfig,
    capturer: &mut C,
    console: &mut Console<R, W>,
) -> Result<SessionOutcome>
where
    C: PointCapture + ?Sized,
    R: BufRead,
    W: Write,
{
    config.validate()?;
    let first_label = &config.first.label;
    let second_label = &config.second.label;

    console.banner("IMAGE CORRESPONDENCE POINT CLICKING")?;
    console.line("\nThis script will help you select corresponding points on two images.")?;
    console.line(format!(
        "You'll click points on {} first, then corresponding points on {}.",
        first_label, second_label
    ))?;
    console.line("\nIMPORTANT:")?;
    console.line(format!(
        "  - Click at least {} points (more is better for accuracy)",
        config.min_points
    ))?;
    console.line("  - Click corresponding points in the SAME ORDER on both images")?;
    console.line(format!(
        "  - Example: if you click the top-left corner first on {},",
        first_label
    ))?;
    console.line(format!("    click the top-left corner first on {} too", second_label))?;
    console.rule()?;

    console.pause(&format!(
        "\nPress Enter to start clicking points on {}...",
        first_label
    ))?;

    let request = CaptureRequest::new(
        config.first.file.clone(),
        format!("{} - Click points (Press Enter when done)", first_label),
    )
    .min_points(config.min_points)
    .hints(capture_hints(config.min_points));
    let first = capture_points(capturer, console, &request)
        .with_context(|| format!("Point capture failed for {}", config.first.file.display()))?;

    let n = first.len();
    console.line(format!("\nYou clicked {} points on {}.", n, first_label))?;
    console.line(format!(
        "\nNow you'll click the corresponding points on {}.",
        second_label
    ))?;
    console.line("Make sure to click them in the SAME ORDER!")?;

    console.pause(&format!(
        "\nPress Enter to start clicking {} points on {}...",
        n, second_label
    ))?;

    let request = CaptureRequest::new(
        config.second.file.clone(),
        format!(
            "{} - Click {} corresponding points in same order (Press Enter when done)",
            second_label, n
        ),
    )
    .min_points(config.min_points)
    .hints(capture_hints(n));
    let second = capture_points(capturer, console, &request)
        .with_context(|| format!("Point capture failed for {}", config.second.file.display()))?;

    if second.len() != n {
        warn!(
            "point count mismatch: {} on {}, {} on {}",
            n,
            first_label,
            second.len(),
            second_label
        );
        console.line("\n⚠ Warning: Number of points don't match!")?;
        console.line(format!("  {}: {} points", first_label, n))?;
        console.line(format!("  {}: {} points", second_label, second.len()))?;
        if config.mismatch == MismatchPolicy::Truncate {
            console.line(format!(
                "\nUsing first {} points from each image.",
                n.min(second.len())
            ))?;
        }
    }
    let (first, second) = reconcile(first, second, config.mismatch)?;

    let mut result = CollectionResult::new();
    result.insert(config.first_key.clone(), first.clone())?;
    result.insert(config.second_key.clone(), second.clone())?;
    result.save_npz(&config.output)?;
    info!(
        "saved {} correspondences to {}",
        first.len(),
        config.output.display()
    );

    let output = config.output.display().to_string();
    console.banner("POINTS COLLECTED SUCCESSFULLY!")?;
    console.line(format!("\nTotal correspondences: {}", first.len()))?;
    console.line(format!("\nPoints saved to: {}", output))?;
    for (label, points) in [(first_label, &first), (second_label, &second)] {
        console.line(format!("\n{} points:", label))?;
        for (i, p) in points.iter().enumerate() {
            console.line(format!("  Point {}: {}", i + 1, p))?;
        }
    }

    console.blank()?;
    console.rule()?;
    console.line("To use these points in your notebook, run:")?;
    console.line(format!("  data = np.load('{}')", output))?;
    console.line(format!("  {0} = data['{0}']", config.first_key))?;
    console.line(format!("  {0} = data['{0}']", config.second_key))?;
    console.rule()?;

    console.line("\nAs numpy arrays (for copying into notebook):")?;
    console.line(format!("\n{}", numpy_literal(&config.first_key, &first)))?;
    console.line(format!("\n{}", numpy_literal(&config.second_key, &second)))?;

    Ok(SessionOutcome::Saved {
        path: config.output.clone(),
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        appconfig::ImageSpec,
        capture::{testing::*, CaptureError},
        console::{printed, scripted},
        types::Point,
    };

    fn seq(n: usize, offset: f64) -> Vec<(f64, f64)> {
        (0..n).map(|i| (offset + i as f64, offset + 2. * i as f64)).collect()
    }

    fn config_in(dir: &std::path::Path) -> CorrespondenceConfig {
        touch_images(dir, &["left.png", "right.png"]);
        CorrespondenceConfig {
            first: ImageSpec {
                file: dir.join("left.png"),
                label: "Image 3".to_string(),
            },
            second: ImageSpec {
                file: dir.join("right.png"),
                label: "Image 4".to_string(),
            },
            output: dir.join("correspondence_points.npz"),
            ..Default::default()
        }
    }

    #[test]
    fn reconcile_truncates_to_common_prefix() {
        let a: PointSequence = seq(6, 0.).into_iter().map(Point::from).collect();
        let b: PointSequence = seq(4, 100.).into_iter().map(Point::from).collect();

        let (a2, b2) = reconcile(a.clone(), b.clone(), MismatchPolicy::Truncate).unwrap();
        assert_eq!(a2, a.prefix(4));
        assert_eq!(b2, b);

        let (b3, a3) = reconcile(b.clone(), a.clone(), MismatchPolicy::Truncate).unwrap();
        assert_eq!(b3, b);
        assert_eq!(a3, a.prefix(4));
    }

    #[test]
    fn reconcile_can_refuse_mismatch() {
        let a: PointSequence = seq(5, 0.).into_iter().map(Point::from).collect();
        let b: PointSequence = seq(4, 0.).into_iter().map(Point::from).collect();
        assert_eq!(
            reconcile(a.clone(), b, MismatchPolicy::Fail).unwrap_err(),
            CorrespondenceError::CountMismatch { first: 5, second: 4 }
        );
        assert!(reconcile(a.clone(), a, MismatchPolicy::Fail).is_ok());
    }

    #[test]
    fn numpy_literal_round_trips_values() {
        let points: PointSequence = vec![Point::new(100.0, 0.1), Point::new(-3.25, 1e-7)].into();
        assert_eq!(
            numpy_literal("image1points", &points),
            "image1points = np.array([\n    [100.0, 0.1],\n    [-3.25, 1e-7],\n])"
        );
    }

    #[test]
    fn matching_counts_are_saved_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let mut capturer = ScriptedCapture::new([seq(5, 0.), seq(5, 50.)]);
        let mut console = scripted("\n\n");

        run_correspondence_session(&config, &mut capturer, &mut console).unwrap();

        let loaded = CollectionResult::load_npz(&config.output).unwrap();
        assert_eq!(loaded.len(), 2);
        let first = loaded.get("image1points").unwrap().to_array();
        let second = loaded.get("image2points").unwrap().to_array();
        assert_eq!(first.shape(), &[5, 2]);
        assert_eq!(second.shape(), &[5, 2]);
        assert_eq!(second[[4, 1]], 58.);

        assert_eq!(capturer.shown[0].min_points, 4);
        assert_eq!(capturer.shown[1].min_points, 4);
        assert!(capturer.shown[1].title.contains("Click 5 corresponding points"));
        assert!(capturer.shown.iter().all(|r| r.max_points.is_none()));

        let out = printed(&console);
        assert!(out.contains("Total correspondences: 5"));
        assert!(out.contains("image2points = np.array([\n    [50.0, 50.0],"));
        assert!(!out.contains("Warning"));
    }

    #[test]
    fn shorter_second_image_truncates_both() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let raw_first = seq(7, 0.);
        let raw_second = seq(5, 30.);
        let mut capturer = ScriptedCapture::new([raw_first.clone(), raw_second.clone()]);
        let mut console = scripted("\n\n");

        run_correspondence_session(&config, &mut capturer, &mut console).unwrap();

        let loaded = CollectionResult::load_npz(&config.output).unwrap();
        let as_pairs = |name: &str| {
            loaded
                .get(name)
                .unwrap()
                .iter()
                .map(|p| (p.x, p.y))
                .collect::<Vec<_>>()
        };
        assert_eq!(as_pairs("image1points"), raw_first[..5].to_vec());
        assert_eq!(as_pairs("image2points"), raw_second);

        let out = printed(&console);
        assert!(out.contains("⚠ Warning: Number of points don't match!"));
        assert!(out.contains("  Image 3: 7 points"));
        assert!(out.contains("  Image 4: 5 points"));
        assert!(out.contains("Using first 5 points from each image."));
    }

    #[test]
    fn second_image_only_enforces_configured_minimum() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let mut capturer = ScriptedCapture::new([seq(6, 0.), seq(4, 30.)]);
        let mut console = scripted("\n\n");

        run_correspondence_session(&config, &mut capturer, &mut console).unwrap();

        assert_eq!(capturer.shown[1].min_points, config.min_points);
        assert!(capturer.shown[1].title.contains("Click 6 corresponding points"));
        let loaded = CollectionResult::load_npz(&config.output).unwrap();
        assert_eq!(loaded.get("image1points").unwrap().len(), 4);
        assert_eq!(loaded.get("image2points").unwrap().len(), 4);
    }

    #[test]
    fn second_image_below_minimum_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let mut capturer = ScriptedCapture::new([seq(6, 0.), seq(3, 30.)]);
        let mut console = scripted("\n\n");

        let err = run_correspondence_session(&config, &mut capturer, &mut console).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<CaptureError>(),
            Some(CaptureError::InsufficientPoints { required: 4, got: 3 })
        ));
        assert!(!config.output.exists());
    }

    #[test]
    fn longer_second_image_truncates_too() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let mut capturer = ScriptedCapture::new([seq(4, 0.), seq(6, 10.)]);
        let mut console = scripted("\n\n");

        run_correspondence_session(&config, &mut capturer, &mut console).unwrap();

        let loaded = CollectionResult::load_npz(&config.output).unwrap();
        assert_eq!(loaded.get("image1points").unwrap().len(), 4);
        assert_eq!(loaded.get("image2points").unwrap().len(), 4);
    }

    #[test]
    fn strict_policy_writes_nothing_on_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let config = CorrespondenceConfig {
            mismatch: MismatchPolicy::Fail,
            ..config_in(dir.path())
        };
        let mut capturer = ScriptedCapture::new([seq(6, 0.), seq(5, 0.)]);
        let mut console = scripted("\n\n");

        let err = run_correspondence_session(&config, &mut capturer, &mut console).unwrap_err();
        assert_eq!(
            err.downcast_ref::<CorrespondenceError>(),
            Some(&CorrespondenceError::CountMismatch { first: 6, second: 5 })
        );
        assert!(!config.output.exists());
    }

    #[test]
    fn first_image_needs_the_minimum() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let mut capturer = ScriptedCapture::new([seq(3, 0.)]);
        let mut console = scripted("\n");

        let err = run_correspondence_session(&config, &mut capturer, &mut console).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CaptureError>(),
            Some(CaptureError::InsufficientPoints { required: 4, got: 3 })
        ));
        assert_eq!(capturer.shown.len(), 1);
        assert!(!config.output.exists());
    }

    #[test]
    fn missing_second_image_shows_only_the_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.second.file = dir.path().join("missing.png");
        let mut capturer = ScriptedCapture::new([seq(4, 0.), seq(4, 0.)]);
        let mut console = scripted("\n\n");

        let err = run_correspondence_session(&config, &mut capturer, &mut console).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CaptureError>(),
            Some(CaptureError::ImageNotFound(_))
        ));
        assert_eq!(capturer.shown.len(), 1);
        assert!(!config.output.exists());
    }
}
