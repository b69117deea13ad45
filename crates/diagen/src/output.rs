//! Styled stderr output for diagen commands.

use std::fmt::Display;

use console::{Style, Term};
use diagen_build::{BuildReport, TaskFailure};

/// Writes command output to stderr.
pub(crate) struct Output {
    term: Term,
    ok: Style,
    warn: Style,
    err: Style,
    heading: Style,
    label: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            ok: Style::new().green(),
            warn: Style::new().yellow(),
            err: Style::new().red(),
            heading: Style::new().cyan().bold(),
            label: Style::new().bold(),
        }
    }

    fn line(&self, text: &str) {
        // Nothing sensible to do if stderr is gone
        let _ = self.term.write_line(text);
    }

    pub(crate) fn success(&self, msg: &str) {
        self.line(&self.ok.apply_to(msg).to_string());
    }

    pub(crate) fn warning(&self, msg: &str) {
        self.line(&self.warn.apply_to(msg).to_string());
    }

    pub(crate) fn error(&self, msg: &str) {
        self.line(&self.err.apply_to(msg).to_string());
    }

    pub(crate) fn highlight(&self, msg: &str) {
        self.line(&self.heading.apply_to(msg).to_string());
    }

    /// One `Label: value` line of a settings summary.
    pub(crate) fn setting(&self, label: &str, value: impl Display) {
        self.line(&format!("{}: {value}", self.label.apply_to(label)));
    }

    /// Summary of a finished run.
    pub(crate) fn build_report(&self, report: &BuildReport) {
        match &report.index_path {
            Some(index_path) => {
                self.success(&report_summary(report));
                self.setting("Index", index_path.display());
            }
            None => self.warning("Source directory does not exist, nothing generated"),
        }
    }

    /// Failed tasks, one per line, followed by a count.
    pub(crate) fn task_failures(&self, failures: &[TaskFailure]) {
        for failure in failures {
            self.warning(&format!("  {failure}"));
        }
        self.error(&failure_summary(failures.len()));
    }
}

fn report_summary(report: &BuildReport) -> String {
    format!(
        "Generated {} {} from {} {} ({} tasks)",
        report.artifacts.len(),
        plural(report.artifacts.len(), "diagram", "diagrams"),
        report.files,
        plural(report.files, "file", "files"),
        report.tasks
    )
}

fn failure_summary(count: usize) -> String {
    format!("{count} render {} failed", plural(count, "task", "tasks"))
}

fn plural<'a>(count: usize, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 { one } else { many }
}
