//! CLI output formatting utilities.

use console::style;

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print a provider test line.
    pub fn provider_result(name: &str, ok: bool, detail: &str) {
        let marker = if ok {
            style("ok").green().bold()
        } else {
            style("failed").red().bold()
        };
        println!("  {} {} - {}", style("*").cyan(), style(name).bold(), marker);
        if !detail.is_empty() {
            println!("      {}", style(detail).dim());
        }
    }

    /// Print a channel scrape summary line.
    pub fn channel_result(name: &str, found: usize, new: usize, cached: usize, errors: usize) {
        println!(
            "  {} {} ({} found, {} new, {} cached, {} errors)",
            style("*").cyan(),
            style(name).bold(),
            found,
            new,
            cached,
            errors
        );
    }
}
