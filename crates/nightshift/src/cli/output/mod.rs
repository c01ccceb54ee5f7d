//! Terminal output helpers

use console::{style, Style};

use nightshift_tasks::TaskStatus;

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

/// Print an error message to stderr
pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    println!("{} {}", style("!").yellow().bold(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", style("→").blue(), message);
}

pub fn header(text: &str) -> String {
    style(text).bold().to_string()
}

/// `  key: value` with a dimmed key
pub fn key_value(key: &str, value: &str) -> String {
    format!("  {}: {}", style(key).dim(), value)
}

pub fn revision_style() -> Style {
    Style::new().green().bold()
}

/// One line of the run report
pub fn task_line(name: &str, status: &TaskStatus) -> String {
    let name = Style::new().cyan().apply_to(name);
    match status {
        TaskStatus::Success => format!("  {} {}", style("✓").green(), name),
        TaskStatus::Failed(message) => {
            format!("  {} {} {}", style("✗").red(), name, style(message).dim())
        }
    }
}
