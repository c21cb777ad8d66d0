//! Running record counter and elapsed-time summary.

use std::time::{Duration, Instant};

use crate::output::Output;

/// Minimum time between two running counter updates.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Rate-limited progress for search and scan runs.
#[derive(Debug)]
pub struct ProgressReporter {
    started: Instant,
    last_tick: Instant,
}

impl ProgressReporter {
    /// Start timing at `now`.
    pub fn start(now: Instant) -> Self {
        Self {
            started: now,
            last_tick: now,
        }
    }

    /// Show `Record: <count>` if a second has passed since the last update.
    ///
    /// Returns whether a line was written.
    pub fn tick(&mut self, count: u64, now: Instant, out: &mut Output<'_>) -> bool {
        if out.verbosity() < 2 || now.saturating_duration_since(self.last_tick) < TICK_INTERVAL {
            return false;
        }
        self.last_tick = now;
        out.status_inline(2, format_args!("\rRecord: {count}"));
        true
    }

    /// Final summary: processed count and elapsed time.
    pub fn finish(&self, processed: u64, now: Instant, out: &mut Output<'_>) -> Duration {
        let elapsed = now.saturating_duration_since(self.started);
        out.status_inline(2, format_args!("\r"));
        out.status_line(1, format_args!("Processed records: {processed}"));
        out.status_line(1, format_args!("Done in {}.", format_elapsed(elapsed)));
        elapsed
    }
}

/// Format a duration as `H:MM:SS`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_format() {
        assert_eq!(format_elapsed(Duration::ZERO), "0:00:00");
        assert_eq!(format_elapsed(Duration::from_millis(61_900)), "0:01:01");
        assert_eq!(format_elapsed(Duration::from_secs(3 * 3600 + 7)), "3:00:07");
        assert_eq!(format_elapsed(Duration::from_secs(100 * 3600)), "100:00:00");
    }

    #[test]
    fn tick_is_rate_limited() {
        let t0 = Instant::now();
        let (mut status, mut trace) = (Vec::new(), Vec::new());
        {
            let mut out = Output::new(&mut status, &mut trace, 2);
            let mut progress = ProgressReporter::start(t0);
            assert!(!progress.tick(1, t0 + Duration::from_millis(500), &mut out));
            assert!(progress.tick(2, t0 + Duration::from_millis(1000), &mut out));
            assert!(!progress.tick(3, t0 + Duration::from_millis(1900), &mut out));
            assert!(progress.tick(4, t0 + Duration::from_millis(2100), &mut out));
        }
        assert_eq!(String::from_utf8(status).unwrap(), "\rRecord: 2\rRecord: 4");
    }

    #[test]
    fn tick_silent_below_two() {
        let t0 = Instant::now();
        let (mut status, mut trace) = (Vec::new(), Vec::new());
        {
            let mut out = Output::new(&mut status, &mut trace, 1);
            let mut progress = ProgressReporter::start(t0);
            assert!(!progress.tick(1, t0 + Duration::from_secs(5), &mut out));
        }
        assert!(status.is_empty());
    }

    #[test]
    fn summary_lines() {
        let t0 = Instant::now();
        let (mut status, mut trace) = (Vec::new(), Vec::new());
        {
            let mut out = Output::new(&mut status, &mut trace, 1);
            let progress = ProgressReporter::start(t0);
            let elapsed = progress.finish(42, t0 + Duration::from_secs(75), &mut out);
            assert_eq!(elapsed, Duration::from_secs(75));
        }
        assert_eq!(
            String::from_utf8(status).unwrap(),
            "Processed records: 42\nDone in 0:01:15.\n"
        );
    }
}
