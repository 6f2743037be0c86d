//! UI-facing conversion lifecycle.
//!
//! A [`ConversionJob`] tracks a single conversion from `Pending` to
//! `Completed` or `Error`, with a progress fraction a front-end can bind to.
//! The core runs one job at a time per caller and never queues.

use crate::convert::Converter;
use crate::format::FileFormat;
use crate::input::InputFile;
use crate::output::ConversionOutput;
use crate::progress::ConversionStage;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Converting,
    Completed,
    Error,
}

#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub input: InputFile,
    pub source: FileFormat,
    pub target: FileFormat,
    status: JobStatus,
    progress: f32,
    output: Option<ConversionOutput>,
    error: Option<String>,
}

impl ConversionJob {
    pub fn new(input: InputFile, source: FileFormat, target: FileFormat) -> Self {
        Self {
            input,
            source,
            target,
            status: JobStatus::Pending,
            progress: 0.0,
            output: None,
            error: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Completion fraction in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn output(&self) -> Option<&ConversionOutput> {
        self.output.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Error)
    }

    /// Move progress forward to `stage`. Progress never goes backwards.
    pub fn advance(&mut self, stage: &ConversionStage) {
        if self.is_finished() {
            return;
        }
        self.status = JobStatus::Converting;
        self.progress = self.progress.max(stage.fraction()).min(1.0);
    }

    fn complete(&mut self, output: ConversionOutput) {
        self.status = JobStatus::Completed;
        self.progress = 1.0;
        self.output = Some(output);
        self.error = None;
    }

    fn fail(&mut self, message: String) {
        self.status = JobStatus::Error;
        self.progress = 1.0;
        self.output = None;
        self.error = Some(message);
    }

    /// Run the job to completion on `converter`.
    ///
    /// A finished job is left untouched; the returned status is final.
    pub async fn run(&mut self, converter: &Converter) -> JobStatus {
        if self.is_finished() {
            return self.status;
        }
        self.advance(&ConversionStage::Validating);
        match converter
            .convert_file(&self.input, self.source, self.target)
            .await
        {
            Ok(output) => self.complete(output),
            Err(e) => self.fail(e.to_string()),
        }
        self.status
    }
}
