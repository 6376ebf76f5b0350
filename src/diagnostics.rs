//! The compile log (spec.md §6 "Diagnostics").
//!
//! Grounded on `original_source/src/libscc/Log.h` (five severities, each
//! message carrying an origin location and, when available, the enclosing
//! procedure's signature) and on the teacher's `compiler/error.rs` for the
//! general shape of a compiler error enum. Rendering uses `ariadne` so the
//! log can be printed the way `rustc`/`cargo` print diagnostics; `log`
//! crate macros additionally mirror every push at `log::Level::Trace` for
//! the ambient structured-logging channel (SPEC_FULL.md §3.2).

use std::fmt;

use ariadne::{Color, Label, Report, ReportKind, Source};

use crate::location::SourceLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl Severity {
    fn report_kind(self) -> ReportKind<'static> {
        match self {
            Severity::Debug => ReportKind::Custom("debug", Color::BrightBlack),
            Severity::Info => ReportKind::Advice,
            Severity::Warning => ReportKind::Warning,
            Severity::Error => ReportKind::Error,
            Severity::Fatal => ReportKind::Custom("fatal", Color::Red),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub location: SourceLocation,
    pub message: String,
    /// The enclosing procedure's signature, when one is known (spec.md §6).
    pub procedure: Option<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, location: SourceLocation, message: impl Into<String>) -> Self {
        Self {
            severity,
            location,
            message: message.into(),
            procedure: None,
        }
    }

    pub fn with_procedure(mut self, signature: impl Into<String>) -> Self {
        self.procedure = Some(signature.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.location, self.severity, self.message)?;
        if let Some(proc) = &self.procedure {
            write!(f, " (in {proc})")?;
        }
        Ok(())
    }
}

/// An append-only log of diagnostics for the current compilation. The
/// driver prints it after each pass (spec.md §6).
#[derive(Debug, Default)]
pub struct CompileLog {
    entries: Vec<Diagnostic>,
}

impl CompileLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        log::trace!(target: "secrec_core::diagnostics", "{diagnostic}");
        self.entries.push(diagnostic);
    }

    pub fn error(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.push(Diagnostic::new(Severity::Error, location, message));
    }

    pub fn fatal(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.push(Diagnostic::new(Severity::Fatal, location, message));
    }

    pub fn warning(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.push(Diagnostic::new(Severity::Warning, location, message));
    }

    pub fn info(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.push(Diagnostic::new(Severity::Info, location, message));
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|d| matches!(d.severity, Severity::Error | Severity::Fatal))
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|d| d.severity == severity).count()
    }

    /// Renders every diagnostic against `source_text` using `ariadne`,
    /// writing one report per entry to `out`. `source_text` is looked up by
    /// file name; entries whose file is not present in `sources` fall back
    /// to a plain single-line rendering.
    pub fn render(
        &self,
        sources: &[(String, String)],
        mut out: impl std::io::Write,
    ) -> std::io::Result<()> {
        for diag in &self.entries {
            let file_name = diag.location.file.to_string_lossy().to_string();
            let found = sources.iter().find(|(name, _)| *name == file_name);
            match found {
                Some((name, text)) => {
                    let span_start = byte_offset(text, diag.location.begin);
                    let span_end = byte_offset(text, diag.location.end).max(span_start + 1);
                    let report = Report::build(diag.severity.report_kind(), (name.clone(), span_start..span_end))
                        .with_message(&diag.message)
                        .with_label(
                            Label::new((name.clone(), span_start..span_end))
                                .with_message(&diag.message)
                                .with_color(Color::Red),
                        )
                        .finish();
                    let mut buf = Vec::new();
                    let _ = report.write((name.clone(), Source::from(text.as_str())), &mut buf);
                    out.write_all(&buf)?;
                }
                None => {
                    writeln!(out, "{diag}")?;
                }
            }
        }
        Ok(())
    }
}

/// Best-effort conversion from a line/column position to a byte offset,
/// used only for diagnostic rendering (never for semantic decisions).
fn byte_offset(text: &str, pos: crate::location::Position) -> usize {
    let mut offset = 0usize;
    for (line_idx, line) in text.split_inclusive('\n').enumerate() {
        if line_idx as u32 + 1 == pos.line {
            return offset + (pos.column as usize).min(line.len());
        }
        offset += line.len();
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn loc() -> SourceLocation {
        SourceLocation::new(
            Arc::new(PathBuf::from("test.sc")),
            crate::location::Position::new(1, 0),
            crate::location::Position::new(1, 5),
        )
    }

    #[test]
    fn has_errors_reflects_severity() {
        let mut log = CompileLog::new();
        assert!(!log.has_errors());
        log.warning(loc(), "just a warning");
        assert!(!log.has_errors());
        log.error(loc(), "broken");
        assert!(log.has_errors());
    }

    #[test]
    fn renders_known_and_unknown_files() {
        let mut log = CompileLog::new();
        log.error(loc(), "undefined name x");
        let mut out = Vec::new();
        log.render(&[("test.sc".to_string(), "int x = y;\n".to_string())], &mut out)
            .unwrap();
        assert!(!out.is_empty());
    }
}
