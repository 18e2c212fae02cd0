//! iMessage Export - Export conversations and attachments from the macOS
//! Messages database.
//!
//! Reads `~/Library/Messages/chat.db` read-only, writes one `messages.txt`
//! transcript and mirrors attachments into per-conversation folders.
//! Re-running the export skips attachments that were already copied.
//!
//!   imessage-export                       # Export with defaults
//!   imessage-export --dry-run             # Show what would be exported
//!   imessage-export --output ~/Backup     # Choose the output directory
//!   imessage-export --write-config        # Create ~/.imessage-export/config.toml

mod application;
mod cli;
mod domain;
mod infrastructure;

use clap::Parser;
use colored::Colorize;

use application::{format_summary, Exporter};
use cli::Cli;
use domain::AppError;
use infrastructure::{init_logging, load_config, write_default_config};

fn main() {
    // Exit only after the log guard in `run` has flushed.
    std::process::exit(run(Cli::parse()));
}

/// Main application logic; returns the process exit code.
fn run(cli: Cli) -> i32 {
    if cli.write_config {
        return match write_default_config(cli.config.as_deref()) {
            Ok(path) => {
                println!("{} Config file: {}", "✓".green().bold(), path.display());
                0
            }
            Err(e) => report_error(&e),
        };
    }

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return report_error(&e),
    };
    cli.apply(&mut config);

    let log_dir = (!config.export.dry_run).then(|| config.export.output_dir.clone());
    let _guard = match init_logging(cli.verbose, log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => return report_error(&e),
    };

    print_banner();

    match Exporter::new(config).with_progress(!cli.no_progress).run() {
        Ok(report) => {
            println!();
            println!("{}", format_summary(&report));
            if let Some(messages) = &report.messages_file {
                println!("📝 Chat history: {}", messages.display());
            }
            println!("{} Export completed successfully!", "✅".green());
            0
        }
        Err(e) => {
            tracing::error!("Export failed: {e}");
            report_error(&e)
        }
    }
}

fn print_banner() {
    println!("{}", "📱 iMessage Export".bold());
    println!("{}", "=".repeat(50));

    if !cfg!(target_os = "macos") {
        tracing::warn!("⚠️  This tool is designed for macOS");
    }
}

/// Prints the error and any known fix; returns the failure exit code.
fn report_error(err: &AppError) -> i32 {
    eprintln!("{} {}", "Error:".red().bold(), err);
    if let Some(fix) = err.remediation() {
        eprintln!("{fix}");
    }
    1
}
