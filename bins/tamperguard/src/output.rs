//! Terminal output helpers

use owo_colors::OwoColorize;

/// Status message helpers
pub struct Status;

impl Status {
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{} {}", "ℹ".blue(), message);
    }

    /// Print a bold header underlined to its width
    pub fn header(message: &str) {
        println!();
        println!("{}", message.bold());
        println!("{}", "─".repeat(message.chars().count()));
    }
}

/// Print a multi-line security alert to stderr, first line highlighted
pub fn alert(message: &str) {
    let mut lines = message.lines();
    if let Some(title) = lines.next() {
        eprintln!("{}", title.red().bold());
    }
    for line in lines {
        eprintln!("{}", line);
    }
}

/// Format a count with singular/plural
pub fn format_count(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}
