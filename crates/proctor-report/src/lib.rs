//! proctor-report: Results export and text rendering.
//!
//! Writes the `interview_results_*.json` file a finished session leaves
//! behind and formats test runs and submission results as plain text.

pub mod export;
pub mod summary;

pub use export::{ResultsExport, SessionInfo};
