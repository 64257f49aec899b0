//! Reporting helpers for converted batches.

use std::path::Path;

use serde::Serialize;

use crate::job::{ImageJob, JobStatus};

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Format a byte count for display (1024-based, up to two decimals).
///
/// ```ignore
/// assert_eq!(format_file_size(1536), "1.5 KB");
/// ```
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let formatted = format!("{value:.2}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", SIZE_UNITS[unit])
}

/// Output file name: the source name with its extension replaced by `.webp`.
///
/// Names without an extension, including dotfiles such as `.bashrc`, get
/// `.webp` appended.
pub fn webp_file_name(source_name: &str) -> String {
    Path::new(source_name)
        .with_extension("webp")
        .to_string_lossy()
        .into_owned()
}

/// Encoded size as a rounded percentage of the original size.
pub fn size_ratio_percent(encoded: u64, original: u64) -> Option<u64> {
    if original == 0 {
        return None;
    }
    Some((encoded as f64 / original as f64 * 100.0).round() as u64)
}

/// Job counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub pending: usize,
    pub in_flight: usize,
    pub completed: usize,
    pub failed: usize,
}

impl BatchSummary {
    /// Count the jobs of a batch.
    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a ImageJob>) -> Self {
        let mut summary = Self::default();
        for job in jobs {
            summary.total += 1;
            match job.status() {
                JobStatus::Pending => summary.pending += 1,
                JobStatus::InFlight => summary.in_flight += 1,
                JobStatus::Completed => summary.completed += 1,
                JobStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }

    /// Jobs not yet in a terminal state.
    pub fn outstanding(&self) -> usize {
        self.pending + self.in_flight
    }

    /// No job is waiting on the worker.
    pub fn is_settled(&self) -> bool {
        self.in_flight == 0
    }
}
