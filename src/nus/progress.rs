// nus/progress.rs from rustiiu (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustiiu
//
// Implements console progress reporting for downloads.

use std::io::{self, Write};
use std::path::Path;
use crate::nus::download::DownloadObserver;

const SIZE_UNITS: [&str; 9] = ["B", "KB", "MB", "GB", "T", "P", "E", "Z", "Y"];
const BAR_LENGTH: u64 = 10;

/// Formats a size in bytes with binary prefixes, like "1.50 MB".
pub fn bytes_to_human(size: u64) -> String {
    for (i, symbol) in SIZE_UNITS.iter().enumerate().skip(1).rev() {
        let prefix = 1u128 << (i * 10);
        if size as u128 >= prefix {
            return format!("{:.2} {}", size as f64 / prefix as f64, symbol);
        }
    }
    format!("{:.2} {}", size as f64, SIZE_UNITS[0])
}

/// Builds a progress line like "[###       ] 3.00 KB of 10.00 KB, 30%".
pub fn progress_bar(part: u64, total: u64) -> String {
    let ratio = if total == 0 { 1.0 } else { (part as f64 / total as f64).min(1.0) };
    let percent = (ratio * 100.0) as u64;
    let bar_len = (ratio * BAR_LENGTH as f64) as usize;
    format!(
        "[{}{}] {} of {}, {}%",
        "#".repeat(bar_len),
        " ".repeat(BAR_LENGTH as usize - bar_len),
        bytes_to_human(part),
        bytes_to_human(total),
        percent
    )
}

/// Prints download progress to stdout, redrawing the progress bar in place.
pub struct ConsoleProgress;

impl DownloadObserver for ConsoleProgress {
    fn on_attempt(&self, attempt: u32, retry_count: u32) {
        println!("*Attempt {} of {}", attempt, retry_count);
    }

    fn on_skip(&self, path: &Path, _size: u64) {
        println!("-File {} skipped.", path.display());
    }

    fn on_progress(&self, downloaded: u64, expected: u64) {
        let mut stdout = io::stdout().lock();
        // Padding clears whatever was left over from a longer previous line.
        let _ = write!(stdout, " Downloaded {}{}\r", progress_bar(downloaded, expected), " ".repeat(20));
        let _ = stdout.flush();
    }

    fn on_complete(&self, _path: &Path, size: u64) {
        println!("Download complete: {}{}", bytes_to_human(size), " ".repeat(40));
    }
}
