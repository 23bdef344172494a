//! Click the four corners of each painting photo and save them to
//! `painting_corners.npz`.
//!
//! Click order for every image: top-left, top-right, bottom-right,
//! bottom-left. The archive holds one `(4, 2)` array per image, named
//! `corners_0` to `corners_5`.

use std::process::ExitCode;

use anyhow::Result;

use point_clicker::{
    appconfig::{self, CornerSessionConfig},
    cli,
    console::Console,
    corners::run_corner_session,
    ui::ClickWindow,
    SessionOutcome,
};

fn run() -> Result<SessionOutcome> {
    let config: CornerSessionConfig = appconfig::load_or_default(appconfig::CORNERS_CONFIG_FILE)?;
    let mut window = ClickWindow::default();
    let mut console = Console::stdio();
    run_corner_session(&config, &mut window, &mut console)
}

fn main() -> ExitCode {
    cli::init();
    cli::finish(run())
}
