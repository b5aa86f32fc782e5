use std::io::Write;

use console::{Emoji, style};

pub static GOAT: Emoji<'_, '_> = Emoji("🐐 ", "");
pub static SUCCESS_ICON: Emoji<'_, '_> = Emoji("✅ ", "");
pub static WARN_ICON: Emoji<'_, '_> = Emoji("⚠️  ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");

pub fn print_success(msg: &str) {
    println!("{} {}", SUCCESS_ICON, style(msg).green());
}

pub fn print_warn(msg: &str) {
    eprintln!("{} {}", WARN_ICON, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

pub fn print_banner() {
    println!("\n {}{}", GOAT, style("mailgoat").bold().cyan());
    println!(
        " {}\n",
        style("Batch email dispatch for the MailGoat API").dim()
    );
}

/// One-line progress bar rewritten in place as the batch advances.
pub fn print_progress(current: usize, total: usize, sent: usize, failed: usize) {
    let width = 24usize;
    let done = if total == 0 {
        width
    } else {
        (current * width / total).min(width)
    };
    print!(
        "\r[{}{}] {}/{} sent={} failed={}",
        "#".repeat(done),
        "-".repeat(width - done),
        current,
        total,
        sent,
        failed
    );
    let _ = std::io::stdout().flush();
}

/// Builder for the aligned help/usage blocks printed by the CLI.
pub struct GuideSection {
    title: String,
    lines: Vec<String>,
}

impl GuideSection {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            lines: Vec::new(),
        }
    }

    pub fn command(mut self, cmd: &str, desc: &str) -> Self {
        self.lines
            .push(format!("  {:<40} {}", format!("{}", style(cmd).green()), desc));
        self
    }

    pub fn text(mut self, line: &str) -> Self {
        self.lines.push(format!("  {}", line));
        self
    }

    pub fn hint(mut self, example: &str, desc: &str) -> Self {
        if desc.is_empty() {
            self.lines.push(format!("  {}", style(example).dim()));
        } else {
            self.lines
                .push(format!("  {}  {}", style(example).dim(), desc));
        }
        self
    }

    pub fn blank(mut self) -> Self {
        self.lines.push(String::new());
        self
    }

    pub fn print(self) {
        println!("\n {}", style(self.title).bold());
        for line in self.lines {
            println!("{}", line);
        }
    }
}
