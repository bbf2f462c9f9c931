//! Output Control Module
//!
//! Terminal rendering for operation output, loop progress and failures:
//! - `quiet`: suppress operation output on stdout (JSON summaries)
//! - `color`: ANSI styling, off under `NO_COLOR` or `--no-color`
//! - `progress`: draw `progress_bar` loops on stderr

use colored::*;
use std::io::Write;

use crate::engine::context::ExecutionContext;

/// Whether the environment allows ANSI color
pub fn supports_color() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

/// Cheap, copyable output settings shared by the executor and background units
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub color: bool,
    pub progress: bool,
    pub quiet: bool,
    pub debug: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self {
            color: supports_color(),
            progress: true,
            quiet: false,
            debug: false,
        }
    }
}

impl Output {
    /// Output settings that write nothing to stdout
    pub fn quiet() -> Self {
        Self {
            color: false,
            progress: false,
            quiet: true,
            debug: false,
        }
    }

    /// Print an operation's output. In progress mode only the last line is
    /// shown, overwriting the previous one.
    pub fn emit(&self, ctx: &ExecutionContext, text: &str) {
        if self.quiet {
            return;
        }
        if ctx.progress_mode() {
            let line = text.lines().last().unwrap_or_default();
            let mut stdout = std::io::stdout().lock();
            let _ = write!(stdout, "\r\x1b[2K{}", line);
            let _ = stdout.flush();
        } else {
            println!("{}", text);
        }
    }

    /// Terminate a condensed progress line
    pub fn end_condensed(&self) {
        if !self.quiet {
            println!();
        }
    }

    /// `[#####-----] 5/10` on stderr
    pub fn progress_bar(&self, done: usize, total: usize) {
        if !self.progress || total == 0 {
            return;
        }
        const WIDTH: usize = 30;
        let filled = (done.min(total) * WIDTH) / total;
        let bar = format!("{}{}", "#".repeat(filled), "-".repeat(WIDTH - filled));
        let bar = if self.color { bar.cyan().to_string() } else { bar };
        eprint!("\r[{}] {}/{}", bar, done, total);
        if done >= total {
            eprintln!();
        }
        let _ = std::io::stderr().flush();
    }

    /// Report a failed operation
    pub fn failure(&self, label: &str, message: &str) {
        if self.color {
            eprintln!("{} {}: {}", "✗".red().bold(), label.bold(), message.red());
        } else {
            eprintln!("x {}: {}", label, message);
        }
    }

    /// Echo a rendered command when running with `--debug`
    pub fn trace_command(&self, label: &str, command: &str) {
        if !self.debug {
            return;
        }
        let line = format!("[debug] {}: {}", label, command);
        if self.color {
            eprintln!("{}", line.dimmed());
        } else {
            eprintln!("{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_output_has_no_color() {
        let out = Output::quiet();
        assert!(out.quiet);
        assert!(!out.color);
        assert!(!out.progress);
    }

    #[test]
    fn test_quiet_emit_does_not_panic_in_progress_mode() {
        let ctx = ExecutionContext::new(false);
        ctx.set_progress_mode(true);
        Output::quiet().emit(&ctx, "a\nb");
        Output::quiet().progress_bar(3, 10);
    }
}
