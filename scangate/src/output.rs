use serde::Serialize;

use crate::endpoint::Endpoint;
use crate::poll::{PollError, PollOutcome};
use crate::result::MaterialChange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Passed,
    Failed,
    Error,
}

/// What a poll run ended with, in a shape fit for printing.
#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub scan: Endpoint,
    pub id: String,
    pub status: ReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocking: Vec<MaterialChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_url: Option<String>,
}

impl ScanReport {
    pub fn new(scan: Endpoint, id: &str, result: &Result<PollOutcome, PollError>) -> Self {
        let scan_url = result
            .as_ref()
            .ok()
            .and_then(|outcome| crate::result::scan_url(outcome.payload()));
        let (status, reason, blocking) = match result {
            Ok(PollOutcome::Success { .. }) => (ReportStatus::Passed, None, vec![]),
            Ok(PollOutcome::Failure {
                reason, blocking, ..
            }) => (ReportStatus::Failed, Some(reason.clone()), blocking.clone()),
            Err(e) => (ReportStatus::Error, Some(e.to_string()), vec![]),
        };
        Self {
            scan,
            id: id.to_string(),
            status,
            reason,
            blocking,
            scan_url,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == ReportStatus::Passed
    }
}

/// An error that ended a command before a report existed. `scan` and `id` are
/// filled in as far as the command got.
#[derive(Debug, Serialize)]
pub struct ErrorReport<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan: Option<Endpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<&'a str>,
    pub status: ReportStatus,
    pub reason: &'a str,
}

impl<'a> ErrorReport<'a> {
    pub fn new(reason: &'a str) -> Self {
        Self {
            scan: None,
            id: None,
            status: ReportStatus::Error,
            reason,
        }
    }

    pub fn scan(mut self, scan: Option<Endpoint>) -> Self {
        self.scan = scan;
        self
    }

    pub fn id(mut self, id: Option<&'a str>) -> Self {
        self.id = id;
        self
    }
}

fn headline(scan: Endpoint) -> &'static str {
    match scan {
        Endpoint::BuildScan => "BUILD",
        Endpoint::DiffScan => "DIFF SCAN",
    }
}

pub trait OutputFormatter {
    fn write_report(
        &self,
        report: &ScanReport,
        writer: &mut dyn std::io::Write,
    ) -> std::io::Result<()>;

    fn write_triggered(
        &self,
        scan: Endpoint,
        id: &str,
        writer: &mut dyn std::io::Write,
    ) -> std::io::Result<()>;

    fn write_error(
        &self,
        error: &ErrorReport<'_>,
        writer: &mut dyn std::io::Write,
    ) -> std::io::Result<()>;
}

pub struct TextOutput;

impl OutputFormatter for TextOutput {
    fn write_report(
        &self,
        report: &ScanReport,
        writer: &mut dyn std::io::Write,
    ) -> std::io::Result<()> {
        let head = headline(report.scan);
        match report.status {
            ReportStatus::Passed => {
                writeln!(writer, "{head} PASSED - No blocking issues found")?;
            }
            ReportStatus::Failed => {
                writeln!(writer, "{head} FAILED - Blocking issues found")?;
                if let Some(reason) = &report.reason {
                    writeln!(writer, "  reason: {reason}")?;
                }
                for change in &report.blocking {
                    writeln!(writer, "  {change}")?;
                }
            }
            ReportStatus::Error => {
                let reason = report.reason.as_deref().unwrap_or("unknown error");
                writeln!(writer, "Error: {reason}")?;
            }
        }
        if let Some(url) = &report.scan_url {
            writeln!(writer, "  details: {url}")?;
        }
        Ok(())
    }

    fn write_triggered(
        &self,
        scan: Endpoint,
        id: &str,
        writer: &mut dyn std::io::Write,
    ) -> std::io::Result<()> {
        match scan {
            Endpoint::BuildScan => writeln!(writer, "Build ID: {id}"),
            Endpoint::DiffScan => writeln!(writer, "Job ID: {id}"),
        }
    }

    fn write_error(
        &self,
        error: &ErrorReport<'_>,
        writer: &mut dyn std::io::Write,
    ) -> std::io::Result<()> {
        writeln!(writer, "Error: {}", error.reason)
    }
}

pub struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn write_report(
        &self,
        report: &ScanReport,
        writer: &mut dyn std::io::Write,
    ) -> std::io::Result<()> {
        serde_json::to_writer_pretty(&mut *writer, report)?;
        writeln!(writer)?;
        Ok(())
    }

    fn write_triggered(
        &self,
        scan: Endpoint,
        id: &str,
        writer: &mut dyn std::io::Write,
    ) -> std::io::Result<()> {
        let body = serde_json::json!({ "scan": scan, (scan.output_key()): id });
        serde_json::to_writer_pretty(&mut *writer, &body)?;
        writeln!(writer)?;
        Ok(())
    }

    fn write_error(
        &self,
        error: &ErrorReport<'_>,
        writer: &mut dyn std::io::Write,
    ) -> std::io::Result<()> {
        serde_json::to_writer_pretty(&mut *writer, error)?;
        writeln!(writer)?;
        Ok(())
    }
}

pub fn formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonOutput)
    } else {
        Box::new(TextOutput)
    }
}
