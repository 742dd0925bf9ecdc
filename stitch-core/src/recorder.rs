use crate::step::RedactedInput;
use std::time::Duration;
use tracing::{error, info};

/// Observability boundary for step invocations. The executor emits exactly
/// one started/finished pair per invocation; implementations forward them
/// to whatever collector the embedding application uses.
pub trait Recorder: Send + Sync + 'static {
    fn record_step_started(&self, plugin: &str, slug: &str, input: &RedactedInput);
    fn record_step_finished(&self, plugin: &str, slug: &str, success: bool, elapsed: Duration);
}

pub struct BaseRecorder {}

impl BaseRecorder {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for BaseRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder for BaseRecorder {
    fn record_step_started(&self, plugin: &str, slug: &str, input: &RedactedInput) {
        info!(plugin, slug, input = %input, "Step started");
    }

    fn record_step_finished(&self, plugin: &str, slug: &str, success: bool, elapsed: Duration) {
        if success {
            info!(plugin, slug, ?elapsed, "Step finished");
        } else {
            error!(plugin, slug, ?elapsed, "Step failed");
        }
    }
}
