#![allow(unused_imports)]
#![allow(unused_doc_comments)]

pub mod appconfig;
pub mod capture;
pub mod cli;
pub mod console;
pub mod corners;
pub mod correspondence;
pub mod interrupt;
pub mod logging;
pub mod npz;
pub mod types;
pub mod ui;

pub use self::capture::{CaptureError, CaptureRequest, PointCapture};
pub use self::types::{CollectionResult, Point, PointSequence};

/// Outcome of one interactive session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// Every image was captured and the archive was written.
    Saved {
        path: std::path::PathBuf,
        result: CollectionResult,
    },
    /// The operator refused to overwrite an existing archive.
    Declined,
}
