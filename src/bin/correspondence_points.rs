//! Click corresponding points on two images and save them to
//! `correspondence_points.npz` as `image1points` and `image2points`.
//!
//! Click at least four points on the first image, then the same points in
//! the same order on the second.

use std::process::ExitCode;

use anyhow::Result;

use point_clicker::{
    appconfig::{self, CorrespondenceConfig},
    cli,
    console::Console,
    correspondence::run_correspondence_session,
    ui::ClickWindow,
    SessionOutcome,
};

fn run() -> Result<SessionOutcome> {
    let config: CorrespondenceConfig =
        appconfig::load_or_default(appconfig::CORRESPONDENCE_CONFIG_FILE)?;
    let mut window = ClickWindow::default();
    let mut console = Console::stdio();
    run_correspondence_session(&config, &mut window, &mut console)
}

fn main() -> ExitCode {
    cli::init();
    cli::finish(run())
}
