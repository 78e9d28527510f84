//! The operator-visible progress sink a [`super::downloader`] reports into.
//!
//! The end-user interface that renders this lives outside this crate; this
//! trait is the seam it plugs into.

/// Receives progress notifications for a single download.
pub trait ProgressSink: Send + Sync {
    /// Called with a monotonically non-decreasing percentage in `0..=100`
    /// as bytes are written to the local file.
    fn on_progress(&self, percent: u8);

    /// Called exactly once, when the transfer finishes successfully.
    fn on_complete(&self) {}

    /// Called exactly once, when the transfer aborts. `message` is suitable
    /// for display to an end user.
    fn on_error(&self, message: &str) {
        let _ = message;
    }
}

/// A sink that discards every notification. Useful for callers (and tests)
/// that don't need progress reporting.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn on_progress(&self, _percent: u8) {}
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::ProgressSink;
    use parking_lot::Mutex;

    /// Records every call for assertions in downloader tests.
    #[derive(Default)]
    pub struct RecordingProgressSink {
        pub percents: Mutex<Vec<u8>>,
        pub completed: Mutex<bool>,
        pub error: Mutex<Option<String>>,
    }

    impl ProgressSink for RecordingProgressSink {
        fn on_progress(&self, percent: u8) {
            self.percents.lock().push(percent);
        }

        fn on_complete(&self) {
            *self.completed.lock() = true;
        }

        fn on_error(&self, message: &str) {
            *self.error.lock() = Some(message.to_string());
        }
    }
}
