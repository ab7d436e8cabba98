use thiserror::Error;

/// Receiver for assembler diagnostics. Warnings never abort a build;
/// errors do, and the build also returns a [`BuildError`].
pub trait DiagnosticSink {
    fn warning(&mut self, line: usize, column: usize, message: &str);
    fn error(&mut self, line: usize, column: usize, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// Sink that keeps every diagnostic in emission order.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticLog {
    pub fn new() -> DiagnosticLog {
        DiagnosticLog::default()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }
}

impl DiagnosticSink for DiagnosticLog {
    fn warning(&mut self, line: usize, column: usize, message: &str) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            line,
            column,
            message: message.to_owned(),
        });
    }

    fn error(&mut self, line: usize, column: usize, message: &str) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            line,
            column,
            message: message.to_owned(),
        });
    }
}

/// Sink that forwards diagnostics to the `log` facade.
#[derive(Debug, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn warning(&mut self, line: usize, column: usize, message: &str) {
        log::warn!("({line},{column}): {message}");
    }

    fn error(&mut self, line: usize, column: usize, message: &str) {
        log::error!("({line},{column}): {message}");
    }
}

/// The fatal diagnostic that aborted a build.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("assembly failed at line {line}, column {column}: {message}")]
pub struct BuildError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}
