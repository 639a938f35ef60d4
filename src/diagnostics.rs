//! The single place that turns an error condition into the
//! `[CONCEPTUM-Runtime]` diagnostic line and, for fatal kinds, a process exit.
//!
//! Centralizing this (rather than calling `std::process::exit` at each call
//! site, as the original C sources do) keeps the exit-code table in one
//! place and makes the non-fatal `INFO` path testable without forking.

use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Fatal,
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Format (but do not emit) a `[CONCEPTUM-Runtime]` diagnostic line.
pub fn format_diagnostic(severity: Severity, msg: &str, code: i32) -> String {
    format!("[CONCEPTUM-Runtime] {}: {} {{{}}}", severity, msg, code)
}

/// Log the stack-underflow soft failure. Non-fatal: execution continues.
pub fn log_stack_underflow() {
    eprintln!(
        "{}",
        format_diagnostic(Severity::Info, "pop on empty stack, returning void", 0)
    );
}

/// Print the fatal diagnostic line and terminate the process with `code`.
/// This is the only place in the crate that calls `std::process::exit`.
pub fn fatal(msg: &str, code: i32) -> ! {
    eprintln!("{}", format_diagnostic(Severity::Fatal, msg, code));
    std::process::exit(code);
}

/// `halt` is program-directed and exits 0, but still emits the same
/// diagnostic line shape the rest of the fatal paths use.
pub fn halt() -> ! {
    eprintln!(
        "{}",
        format_diagnostic(Severity::Fatal, "halt instruction reached", 0)
    );
    std::process::exit(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_line_shape() {
        let line = format_diagnostic(Severity::Fatal, "stack overflow", 97);
        assert_eq!(line, "[CONCEPTUM-Runtime] FATAL: stack overflow {97}");
    }
}
