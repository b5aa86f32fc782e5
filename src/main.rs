mod cli;
mod core;

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match cli::run_main().await {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => ExitCode::from(code.clamp(1, 255) as u8),
        Err(e) => {
            crate::core::terminal::print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
