mod batch_cmd;
mod profile_cmd;
mod send_batch;

use anyhow::Result;
use console::style;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::core::terminal::{self, GuideSection, print_error};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Sending")
        .command(
            "send-batch (--csv F | --json F | --stdin)",
            "Render and dispatch a batch of emails",
        )
        .text("--profile <name>      Credential profile (default: MAILGOAT_PROFILE or stored default)")
        .text("--template <file>     JSON template with {{field}} placeholders")
        .text("--continue-on-error   Keep going past per-row failures")
        .text("--rate-limit <n>      Cap sends per second")
        .text("--error-log <file>    Append failed rows here (default: batch_<id>_errors.log)")
        .print();

    GuideSection::new("Batches")
        .command("batch status <batch_id>", "Show the stored result of a batch")
        .print();

    GuideSection::new("Profiles")
        .command("profile add <name> --server URL --api-key KEY", "Save a credential profile")
        .command("profile list", "List saved profiles")
        .command("profile use <name>", "Make a profile the default")
        .print();

    println!(
        "\n {} {} <command> [options]\n",
        style("Usage:").bold(),
        style("mailgoat").green()
    );
}

pub async fn run_main() -> Result<i32> {
    // Structured logs go to stderr so stdout stays machine-readable.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_help();
        return Ok(0);
    }

    match args[1].as_str() {
        "send-batch" => send_batch::run_send_batch(&args).await,
        "batch" => {
            let sub_cmd = if args.len() > 2 { args[2].as_str() } else { "" };
            match sub_cmd {
                "status" => batch_cmd::run_batch_status(&args).await,
                _ => {
                    print_error("Unknown or missing batch command. Expected: status");
                    GuideSection::new("mailgoat batch")
                        .command("status <batch_id>", "Show the stored result of a batch")
                        .print();
                    println!();
                    Ok(1)
                }
            }
        }
        "profile" => profile_cmd::run_profile_command(&args).await,
        "help" | "--help" | "-h" => {
            print_help();
            Ok(0)
        }
        cmd => {
            print_error(&format!("Unknown command: {}", cmd));
            print_help();
            Ok(1)
        }
    }
}
