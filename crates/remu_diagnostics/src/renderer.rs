//! Diagnostic rendering backends.

use crate::diagnostic::Diagnostic;

const RESET: &str = "\x1b[0m";

/// Trait for rendering diagnostics into formatted output strings.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    fn render(&self, diag: &Diagnostic) -> String;
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// Produces output like:
/// ```text
/// error[E201]: flip-flop `state` has an asynchronous reset
///   --> top.u_core.state
///    = in module `core` (instance top.u_core)
///    = in module `top` (instance top)
///    = note: ...
///    = help: ...
/// ```
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes in output.
    pub color: bool,
    /// The terminal width; longer messages are wrapped onto continuation lines.
    pub width: u16,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool, width: u16) -> Self {
        Self { color, width }
    }

    fn wrap(&self, text: &str, indent: usize) -> String {
        let limit = (self.width as usize).saturating_sub(indent).max(20);
        let mut lines: Vec<String> = Vec::new();
        let mut current = String::new();
        for word in text.split_whitespace() {
            if !current.is_empty() && current.len() + 1 + word.len() > limit {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
        lines.join(&format!("\n{}", " ".repeat(indent)))
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        let mut out = String::new();

        let header = format!("{}[{}]", diag.severity, diag.code);
        if self.color {
            out.push_str(&format!("{}{header}{RESET}", diag.severity.ansi_style()));
        } else {
            out.push_str(&header);
        }
        let indent = header.len() + 2;
        out.push_str(&format!(": {}\n", self.wrap(&diag.message, indent)));

        if let Some(location) = &diag.location {
            out.push_str(&format!("  --> {location}\n"));
        }

        for frame in &diag.backtrace {
            out.push_str(&format!("   = in {frame}\n"));
        }

        for note in &diag.notes {
            out.push_str(&format!("   = note: {}\n", self.wrap(note, 11)));
        }

        for help in &diag.help {
            out.push_str(&format!("   = help: {}\n", self.wrap(help, 11)));
        }

        out
    }
}
