//! Structured diagnostic entries collected while an analysis runs.
//!
//! Every entry is also forwarded to the `log` facade at the matching level,
//! so a host application with a logger installed sees the same messages.

use std::fmt;

/// Severity of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Info,
    Warning,
}

/// Pipeline stage that produced a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticStage {
    Cleaning,
    Detection,
    Sampling,
    Summary,
}

impl fmt::Display for DiagnosticStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cleaning => "cleaning",
            Self::Detection => "detection",
            Self::Sampling => "sampling",
            Self::Summary => "summary",
        };
        f.write_str(name)
    }
}

/// Why the cleaner dropped rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemovalReason {
    Infinite,
    Missing,
    AboveMaximum(f64),
    BelowMinimum(f64),
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infinite => f.write_str("infinite values"),
            Self::Missing => f.write_str("missing values"),
            Self::AboveMaximum(bound) => write!(f, "values above {bound}"),
            Self::BelowMinimum(bound) => write!(f, "values below {bound}"),
        }
    }
}

/// One recorded diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticEntry {
    pub level: DiagnosticLevel,
    pub stage: DiagnosticStage,
    /// Column the entry refers to, when it concerns a single column.
    pub column: Option<String>,
    /// Rows removed by the step that produced the entry.
    pub removed_rows: usize,
    pub message: String,
}

/// Accumulator threaded through the pipeline and returned with the result.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<DiagnosticEntry>,
}

impl Diagnostics {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[DiagnosticEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries at warning level, in recording order.
    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.level == DiagnosticLevel::Warning)
    }

    /// Warnings produced by the cleaner for one column.
    pub fn removals_for<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a DiagnosticEntry> {
        self.entries.iter().filter(move |entry| {
            entry.stage == DiagnosticStage::Cleaning && entry.column.as_deref() == Some(column)
        })
    }

    pub fn info(&mut self, stage: DiagnosticStage, message: impl Into<String>) {
        self.push(DiagnosticEntry {
            level: DiagnosticLevel::Info,
            stage,
            column: None,
            removed_rows: 0,
            message: message.into(),
        });
    }

    pub fn warn(&mut self, stage: DiagnosticStage, message: impl Into<String>) {
        self.push(DiagnosticEntry {
            level: DiagnosticLevel::Warning,
            stage,
            column: None,
            removed_rows: 0,
            message: message.into(),
        });
    }

    /// Record rows dropped from `column` by one cleaning step.
    pub fn record_removal(&mut self, column: &str, removed_rows: usize, reason: RemovalReason) {
        let message = format!("removing {removed_rows} rows from {column} because of {reason}");
        self.push(DiagnosticEntry {
            level: DiagnosticLevel::Warning,
            stage: DiagnosticStage::Cleaning,
            column: Some(column.to_string()),
            removed_rows,
            message,
        });
    }

    fn push(&mut self, entry: DiagnosticEntry) {
        match entry.level {
            DiagnosticLevel::Info => log::info!("[{}] {}", entry.stage, entry.message),
            DiagnosticLevel::Warning => log::warn!("[{}] {}", entry.stage, entry.message),
        }
        self.entries.push(entry);
    }
}
