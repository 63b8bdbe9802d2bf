//! Per-video detection window log

use std::io::{self, Write};

use crate::domain::window::WindowSummary;

/// Writes one text block per closed window
pub struct WindowLog<W: Write> {
    writer: W,
    saved_only: bool,
}

impl<W: Write> WindowLog<W> {
    pub fn new(writer: W, saved_only: bool) -> Self {
        Self {
            writer,
            saved_only,
        }
    }

    /// Append a block for `summary`; returns false when the saved-only policy skipped it
    pub fn record(&mut self, summary: &WindowSummary) -> io::Result<bool> {
        if self.saved_only && !summary.saved {
            return Ok(false);
        }

        self.writer.write_all(format_block(summary).as_bytes())?;
        Ok(true)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Render the log block for one window
pub fn format_block(summary: &WindowSummary) -> String {
    format!(
        "\n==== Detection Window for '{}' ====\n \
         - Timestamp: {:.2} seconds\n \
         - Frame count: {}\n \
         - Window length: {} frames\n \
         - Detection percentage: {:.2}\n \
         - Average confidence level: {:.2}\n \
         - Median confidence level: {:.2}\n \
         - Peak confidence level: {:.2}\n \
         - Saved to output: {}\n",
        summary.class_name,
        summary.timestamp_secs,
        summary.frame_count,
        summary.window_length,
        summary.detection_percentage,
        summary.confidence.mean,
        summary.confidence.median,
        summary.confidence.peak,
        if summary.saved { "Yes" } else { "No" },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::window::ConfidenceStats;

    fn summary(saved: bool) -> WindowSummary {
        WindowSummary {
            class_name: "cat".to_string(),
            timestamp_secs: 1.0 / 3.0,
            frame_count: 3,
            window_length: 5,
            detection_percentage: 0.6,
            confidence: ConfidenceStats {
                mean: 0.6,
                median: 0.5,
                peak: 0.9,
            },
            saved,
            buffered_frames: 21,
        }
    }

    #[test]
    fn test_block_format() {
        let expected = "\n==== Detection Window for 'cat' ====\n \
                        - Timestamp: 0.33 seconds\n \
                        - Frame count: 3\n \
                        - Window length: 5 frames\n \
                        - Detection percentage: 0.60\n \
                        - Average confidence level: 0.60\n \
                        - Median confidence level: 0.50\n \
                        - Peak confidence level: 0.90\n \
                        - Saved to output: Yes\n";
        assert_eq!(format_block(&summary(true)), expected);
    }

    #[test]
    fn test_saved_only_skips_unsaved_windows() {
        let mut log = WindowLog::new(Vec::new(), true);
        assert!(!log.record(&summary(false)).unwrap());
        assert!(log.record(&summary(true)).unwrap());

        let text = String::from_utf8(log.into_inner()).unwrap();
        assert_eq!(text.matches("==== Detection Window").count(), 1);
        assert!(text.contains("Saved to output: Yes"));
    }

    #[test]
    fn test_all_windows_logged_by_default() {
        let mut log = WindowLog::new(Vec::new(), false);
        log.record(&summary(false)).unwrap();
        log.record(&summary(true)).unwrap();

        let text = String::from_utf8(log.into_inner()).unwrap();
        assert!(text.contains("Saved to output: No"));
        assert!(text.contains("Saved to output: Yes"));
    }
}
