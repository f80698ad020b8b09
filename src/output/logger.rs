use crate::model::{Failure, Success};
use crate::output::{Report, Sink};
use tracing::{error, info};

/// Logs every outcome as it arrives and keeps them in a `Report`.
#[derive(Debug, Default)]
pub struct LoggerSink {
    pub report: Report,
}

impl LoggerSink {
    pub fn new() -> LoggerSink {
        LoggerSink::default()
    }

    pub fn into_report(self) -> Report {
        self.report
    }
}

impl Sink for LoggerSink {
    fn success(&mut self, outcome: Success) {
        info!(
            "Check {} succeeded (latency: {}ms / response time: {}ms)",
            outcome.request,
            outcome.latency.as_millis(),
            outcome.response_time.as_millis()
        );
        self.report.success(outcome);
    }

    fn failure(&mut self, outcome: Failure) {
        error!("Check {} failed\n{}", outcome.request, outcome.error);
        self.report.failure(outcome);
    }
}
