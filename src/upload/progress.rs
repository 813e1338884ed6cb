use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// Percentage of acknowledged chunks, rounded half away from zero.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn percent(acknowledged: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let acknowledged = acknowledged.min(total);
    ((acknowledged as f64 / total as f64) * 100.0).round() as u8
}

/// Turns chunk acknowledgments into percentages for a caller's callback.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self { callback }
    }

    /// Reports progress after `acknowledged` of `total` chunks, returning the
    /// value passed to the callback.
    pub fn report(&self, acknowledged: u64, total: u64) -> u8 {
        let value = percent(acknowledged, total);
        self.emit(value);
        value
    }

    /// Reports 0, used when an upload is cancelled.
    pub fn reset(&self) {
        self.emit(0);
    }

    fn emit(&self, value: u8) {
        if let Some(callback) = &self.callback {
            callback(value);
        }
    }
}

/// Progress bar for one file, counting percent points.
///
/// # Panics
///
/// Panics if the progress bar template string is invalid (which should not happen with the hardcoded template).
#[must_use]
pub fn file_progress_bar(file_name: &str) -> ProgressBar {
    let pb = ProgressBar::new(100);
    #[allow(clippy::expect_used)]
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .expect("Failed to set progress bar template")
            .progress_chars("#>-"),
    );
    pb.set_message(format!("Uploading {file_name}"));
    pb
}

/// Adapts a progress bar into a progress callback.
pub fn bar_callback(pb: ProgressBar) -> impl Fn(u8) + Send + Sync + 'static {
    move |value| pb.set_position(u64::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording() -> (ProgressReporter, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = ProgressReporter::new(Some(Arc::new(move |v| sink.lock().unwrap().push(v))));
        (reporter, seen)
    }

    #[test]
    fn test_three_chunk_sequence() {
        let (reporter, seen) = recording();
        for k in 1..=3 {
            reporter.report(k, 3);
        }
        assert_eq!(*seen.lock().unwrap(), vec![33, 67, 100]);
    }

    #[test]
    fn test_sequence_is_monotonic_and_ends_at_100() {
        for total in 1..=250u64 {
            let values: Vec<u8> = (1..=total).map(|k| percent(k, total)).collect();
            assert!(values[0] > 0, "first ack must report progress for total={total}");
            assert!(values.windows(2).all(|w| w[0] <= w[1]));
            assert_eq!(*values.last().unwrap(), 100);
        }
    }

    #[test]
    fn test_reset_reports_zero() {
        let (reporter, seen) = recording();
        reporter.report(1, 2);
        reporter.reset();
        assert_eq!(*seen.lock().unwrap(), vec![50, 0]);
    }

    #[test]
    fn test_no_callback_is_fine() {
        let reporter = ProgressReporter::default();
        assert_eq!(reporter.report(1, 4), 25);
    }
}
