pub mod logger;


use crate::model::{Failure, Success};
use crate::Result;
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

/// Receives the outcome of every executed request and comparison.
pub trait Sink {
    fn success(&mut self, outcome: Success);
    fn failure(&mut self, outcome: Failure);
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn success(&mut self, outcome: Success) {
        (**self).success(outcome)
    }

    fn failure(&mut self, outcome: Failure) {
        (**self).failure(outcome)
    }
}

/// Collects outcomes in the order they were reported.
#[derive(Debug, Default)]
pub struct Report {
    pub successes: Vec<Success>,
    pub failures: Vec<Failure>,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Successes first, then failures.
    pub fn records(&self) -> Vec<OutcomeRecord> {
        self.successes
            .iter()
            .map(OutcomeRecord::from)
            .chain(self.failures.iter().map(OutcomeRecord::from))
            .collect()
    }
}

impl Sink for Report {
    fn success(&mut self, outcome: Success) {
        self.successes.push(outcome);
    }

    fn failure(&mut self, outcome: Failure) {
        self.failures.push(outcome);
    }
}

/// One line of the machine-readable report. Times are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeRecord {
    pub method: String,
    pub target: String,
    pub host: Option<String>,
    pub success: bool,
    pub latency: Option<f64>,
    pub response_time: Option<f64>,
    pub error: Option<String>,
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

impl From<&Success> for OutcomeRecord {
    fn from(outcome: &Success) -> Self {
        OutcomeRecord {
            method: outcome.request.method().to_string(),
            target: outcome.request.resolved_target(),
            host: outcome.request.host(),
            success: true,
            latency: Some(millis(outcome.latency)),
            response_time: Some(millis(outcome.response_time)),
            error: None,
        }
    }
}

impl From<&Failure> for OutcomeRecord {
    fn from(outcome: &Failure) -> Self {
        OutcomeRecord {
            method: outcome.request.method().to_string(),
            target: outcome.request.resolved_target(),
            host: outcome.request.host(),
            success: false,
            latency: None,
            response_time: outcome.response_time.map(millis),
            error: Some(outcome.error.clone()),
        }
    }
}

/// Writes the report as JSON lines.
pub fn write_records<W: Write>(writer: &mut W, report: &Report) -> Result<()> {
    for record in report.records() {
        serde_json::to_writer(&mut *writer, &record)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}
