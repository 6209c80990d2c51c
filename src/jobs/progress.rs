/// Receives progress reports from a long-running operation.
///
/// `fraction` is in `[0, 1]`; implementations clamp out-of-range values.
pub trait ProgressSink: Send + Sync {
    fn report(&self, fraction: f64, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(f64, &str) + Send + Sync,
{
    fn report(&self, fraction: f64, message: &str) { self(fraction, message) }
}

/// A sink that drops every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _fraction: f64, _message: &str) {}
}

/// Maps a stage's `[0, 1]` progress onto `[start, start + span]` of a parent sink.
pub struct ScaledProgress<'a> {
    inner: &'a dyn ProgressSink,
    start: f64,
    span: f64,
}

impl<'a> ScaledProgress<'a> {
    pub fn new(inner: &'a dyn ProgressSink, start: f64, end: f64) -> Self {
        Self { inner, start, span: end - start }
    }
}

impl ProgressSink for ScaledProgress<'_> {
    fn report(&self, fraction: f64, message: &str) {
        self.inner.report(self.start + fraction.clamp(0.0, 1.0) * self.span, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn scaled_progress_maps_into_parent_range() {
        let seen = Mutex::new(Vec::new());
        let parent = |fraction: f64, message: &str| seen.lock().unwrap().push((fraction, message.to_string()));

        let stage = ScaledProgress::new(&parent, 0.2, 0.6);
        stage.report(0.0, "start");
        stage.report(0.5, "half");
        stage.report(2.0, "over");

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen[0], (0.2, "start".to_string()));
        assert!((seen[1].0 - 0.4).abs() < 1e-12);
        assert!((seen[2].0 - 0.6).abs() < 1e-12);
    }
}
