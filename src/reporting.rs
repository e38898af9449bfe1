// Reporting and output for counterfeit
// Finding sinks plus CSV, Markdown and JSON export

use chrono::Local;
use std::fs::File;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing::warn;

use crate::models::Finding;

/// Receives each finding the moment it is raised
pub trait FindingSink: Send + Sync {
    fn report(&self, finding: Finding);
}

/// Keeps findings in memory for export once the scan is over
#[derive(Debug, Default)]
pub struct CollectingSink {
    findings: Mutex<Vec<Finding>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn findings(&self) -> Vec<Finding> {
        self.findings.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.findings.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FindingSink for CollectingSink {
    fn report(&self, finding: Finding) {
        match self.findings.lock() {
            Ok(mut findings) => findings.push(finding),
            Err(e) => warn!("[JWT] finding lost, sink poisoned: {}", e),
        }
    }
}

/// Writes findings to the log as they arrive
#[derive(Debug, Default)]
pub struct LogSink;

impl FindingSink for LogSink {
    fn report(&self, finding: Finding) {
        warn!(
            risk = %finding.risk,
            confidence = %finding.confidence,
            param = %finding.param,
            "[VULNERABLE] {} on {} {}",
            finding.name,
            finding.method,
            finding.url
        );
    }
}

/// Hands every finding to each inner sink in order
pub struct TeeSink {
    sinks: Vec<Arc<dyn FindingSink>>,
}

impl TeeSink {
    pub fn new(sinks: Vec<Arc<dyn FindingSink>>) -> Self {
        Self { sinks }
    }
}

impl FindingSink for TeeSink {
    fn report(&self, finding: Finding) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.report(finding.clone());
            }
            last.report(finding);
        }
    }
}

/// Escape CSV field to prevent formula injection attacks
/// Cells starting with =, +, -, @, or tab are prefixed with single quote
fn escape_csv_field(field: &str) -> String {
    let Some(first_char) = field.chars().next() else {
        return String::new();
    };
    let needs_escaping = matches!(first_char, '=' | '+' | '-' | '@' | '\t');

    // Also escape if field contains comma, quotes or line breaks
    if needs_escaping || field.contains(',') || field.contains('"') || field.contains('\n') {
        if needs_escaping {
            // Prefix with single quote to prevent formula injection
            format!("\"'{}\"", field.replace('"', "\"\""))
        } else {
            format!("\"{}\"", field.replace('"', "\"\""))
        }
    } else {
        field.to_string()
    }
}

// forged payloads may carry null bytes; keep exports printable
fn printable(s: &str) -> String {
    s.replace('\0', "\\0")
}

pub fn export_csv(findings: &[Finding]) -> Result<String, std::io::Error> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let filename = format!("counterfeit_report_{}.csv", timestamp);
    let mut file = File::create(&filename)?;

    writeln!(file, "Risk,Confidence,Name,Method,URL,Param,Attack")?;
    for f in findings {
        writeln!(
            file,
            "{},{},{},{},{},{},{}",
            f.risk,
            f.confidence,
            escape_csv_field(&f.name),
            escape_csv_field(&f.method),
            escape_csv_field(&f.url),
            escape_csv_field(&f.param),
            escape_csv_field(&printable(&f.attack))
        )?;
    }

    Ok(filename)
}

pub fn export_markdown(findings: &[Finding]) -> Result<String, std::io::Error> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let filename = format!("counterfeit_report_{}.md", timestamp);
    let mut file = File::create(&filename)?;

    writeln!(file, "# Counterfeit Report\n")?;
    if findings.is_empty() {
        writeln!(file, "No forged token was accepted.")?;
    }
    for f in findings {
        writeln!(file, "## [{}] {}\n", f.risk, f.name)?;
        writeln!(file, "- **Request**: {} {}", f.method, f.url)?;
        writeln!(file, "- **Parameter**: `{}`", f.param)?;
        writeln!(file, "- **Confidence**: {}", f.confidence)?;
        writeln!(file, "- **Attack**: `{}`", printable(&f.attack))?;
        if let Some(info) = &f.other_info {
            writeln!(file, "- **Details**: {}", printable(info))?;
        }
        writeln!(file, "\n{}\n\n**Solution**: {}\n\n**Reference**: {}\n", f.description, f.solution, f.reference)?;
    }

    Ok(filename)
}

pub fn export_json(findings: &[Finding]) -> Result<String, std::io::Error> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let filename = format!("counterfeit_report_{}.json", timestamp);
    let file = File::create(&filename)?;
    serde_json::to_writer_pretty(file, findings)?;
    Ok(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_escapes_formula_prefixes() {
        assert_eq!(escape_csv_field("=SUM(1)"), "\"'=SUM(1)\"");
        assert_eq!(escape_csv_field("-1"), "\"'-1\"");
        assert_eq!(escape_csv_field("a,b"), "\"a,b\"");
        assert_eq!(escape_csv_field("plain"), "plain");
        assert_eq!(escape_csv_field(""), "");
    }

    #[test]
    fn null_bytes_are_made_visible() {
        assert_eq!(printable("sig\0marker"), "sig\\0marker");
    }

    fn finding() -> Finding {
        Finding {
            vulnerability: crate::models::VulnerabilityType::EmptyTokens,
            technique: "misc".to_string(),
            risk: crate::models::Risk::Medium,
            confidence: crate::models::Confidence::Medium,
            name: "JWT Empty Token Accepted".to_string(),
            description: String::new(),
            solution: String::new(),
            reference: String::new(),
            cwe_id: 287,
            wasc_id: 1,
            param: "Authorization".to_string(),
            attack: "...".to_string(),
            other_info: None,
            method: "GET".to_string(),
            url: "http://api.test/me".to_string(),
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn tee_reaches_every_sink() {
        let first = Arc::new(CollectingSink::new());
        let second = Arc::new(CollectingSink::new());
        let sinks: Vec<Arc<dyn FindingSink>> = vec![Arc::new(LogSink), first.clone(), second.clone()];
        let tee = TeeSink::new(sinks);

        tee.report(finding());
        tee.report(finding());
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(second.findings()[0].attack, "...");
    }

    #[test]
    fn empty_tee_drops_findings() {
        TeeSink::new(Vec::new()).report(finding());
    }
}
